use std::{
    collections::HashMap,
    path::{Path, PathBuf},
    sync::atomic::{AtomicU64, Ordering},
};

use icon_theme::IconThemes;

use crate::{
    bus::{PendingRequest, Requests},
    names, Error, FetchError, Flavor,
};

/// Address of a registered item, as found in the watcher's `RegisteredStatusNotifierItems`.
///
/// A plain bus name (`:1.50`, `org.example.App`) is an item of the `org.freedesktop` flavor served at
/// [`names::ITEM_OBJECT`]. Anything containing a `/` is an `org.kde` item, split at the first `/` into the bus
/// name and the object path (`:1.50/org/ayatana/NotificationItem/nm_applet`).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ItemId {
    Freedesktop { service: String },
    Kde { service: String, path: String },
}

impl ItemId {
    pub fn parse(id: &str) -> Result<ItemId, Error> {
        match id.find('/') {
            Some(0) => Err(Error::DbusAddressError(id.to_owned())),
            Some(idx) => Ok(ItemId::Kde { service: id[..idx].to_owned(), path: id[idx..].to_owned() }),
            None if id.is_empty() => Err(Error::DbusAddressError(id.to_owned())),
            None => Ok(ItemId::Freedesktop { service: id.to_owned() }),
        }
    }

    pub fn flavor(&self) -> Flavor {
        match self {
            ItemId::Freedesktop { .. } => Flavor::Freedesktop,
            ItemId::Kde { .. } => Flavor::Kde,
        }
    }

    pub fn service(&self) -> &str {
        match self {
            ItemId::Freedesktop { service } | ItemId::Kde { service, .. } => service,
        }
    }

    pub fn path(&self) -> &str {
        match self {
            ItemId::Freedesktop { .. } => names::ITEM_OBJECT,
            ItemId::Kde { path, .. } => path,
        }
    }

    pub fn interface(&self) -> &'static str {
        self.flavor().item_interface()
    }
}

impl std::fmt::Display for ItemId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ItemId::Freedesktop { service } => write!(f, "{}", service),
            ItemId::Kde { service, path } => write!(f, "{}{}", service, path),
        }
    }
}

/// Recognised values of [`org.freedesktop.StatusNotifierItem.Status`].
///
/// [`org.freedesktop.StatusNotifierItem.Status`]: https://www.freedesktop.org/wiki/Specifications/StatusNotifierItem/StatusNotifierItem/#org.freedesktop.statusnotifieritem.status
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    /// The item doesn't convey important information to the user. It is not shown in the tray.
    Passive,
    /// The item is active and shown with its regular icon.
    Active,
    /// The item carries really important information for the user, and is shown with its attention icon.
    NeedsAttention,
}

impl Status {
    /// Classify a raw status string. Only the first letter is looked at, and anything that is neither
    /// `P`assive nor `N`eedsAttention counts as active.
    pub fn from_prefix(status: &str) -> Status {
        match status.as_bytes().first() {
            Some(b'P') => Status::Passive,
            Some(b'N') => Status::NeedsAttention,
            _ => Status::Active,
        }
    }
}

/// One square frame of an item's [icon pixmap], with pixels in ARGB32, row-major order.
///
/// [icon pixmap]: https://freedesktop.org/wiki/Specifications/StatusNotifierItem/Icons/
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pixmap {
    pub size: i32,
    pub pixels: Vec<u32>,
}

/// Convert the raw `a(iiay)` frames of an `IconPixmap` property. Frames that are not square, have no height, or
/// carry fewer than `width * height * 4` bytes are dropped.
pub fn decode_pixmaps(frames: Vec<(i32, i32, Vec<u8>)>) -> Vec<Pixmap> {
    frames
        .into_iter()
        .filter_map(|(width, height, data)| {
            if height <= 0 || width != height {
                log::debug!("dropping {}x{} pixmap: not square", width, height);
                return None;
            }
            let len = width as usize * height as usize;
            if data.len() < len * 4 {
                log::debug!("dropping {}x{} pixmap: only {} bytes of data", width, height, data.len());
                return None;
            }
            // network byte order
            let pixels = data.chunks_exact(4).take(len).map(|c| u32::from_be_bytes([c[0], c[1], c[2], c[3]])).collect();
            Some(Pixmap { size: height, pixels })
        })
        .collect()
}

/// Index of the pixmap whose size is closest to `size`. The first one wins on ties.
pub fn closest_pixmap(pixmaps: &[Pixmap], size: i32) -> Option<usize> {
    pixmaps.iter().enumerate().min_by_key(|(_, pixmap)| (pixmap.size - size).abs()).map(|(idx, _)| idx)
}

/// The item properties the tray reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Property {
    Status,
    IconName,
    IconPixmap,
    AttentionIconName,
    AttentionIconPixmap,
    ItemIsMenu,
    Menu,
    IconThemePath,
}

impl Property {
    /// Name of the property on the bus.
    pub fn name(self) -> &'static str {
        match self {
            Property::Status => "Status",
            Property::IconName => "IconName",
            Property::IconPixmap => "IconPixmap",
            Property::AttentionIconName => "AttentionIconName",
            Property::AttentionIconPixmap => "AttentionIconPixmap",
            Property::ItemIsMenu => "ItemIsMenu",
            Property::Menu => "Menu",
            Property::IconThemePath => "IconThemePath",
        }
    }

    /// Properties fetched as soon as an item of `flavor` is added. `IconThemePath` only exists on `org.kde`
    /// items.
    pub fn initial(flavor: Flavor) -> &'static [Property] {
        use Property::*;
        match flavor {
            Flavor::Freedesktop => {
                &[Status, IconName, IconPixmap, AttentionIconName, AttentionIconPixmap, ItemIsMenu, Menu]
            }
            Flavor::Kde => {
                &[Status, IconName, IconPixmap, AttentionIconName, AttentionIconPixmap, ItemIsMenu, Menu, IconThemePath]
            }
        }
    }
}

/// A decoded property value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PropertyValue {
    Status(String),
    IconName(String),
    IconPixmap(Vec<Pixmap>),
    AttentionIconName(String),
    AttentionIconPixmap(Vec<Pixmap>),
    ItemIsMenu(bool),
    Menu(String),
    IconThemePath(String),
}

impl PropertyValue {
    pub fn property(&self) -> Property {
        match self {
            PropertyValue::Status(_) => Property::Status,
            PropertyValue::IconName(_) => Property::IconName,
            PropertyValue::IconPixmap(_) => Property::IconPixmap,
            PropertyValue::AttentionIconName(_) => Property::AttentionIconName,
            PropertyValue::AttentionIconPixmap(_) => Property::AttentionIconPixmap,
            PropertyValue::ItemIsMenu(_) => Property::ItemIsMenu,
            PropertyValue::Menu(_) => Property::Menu,
            PropertyValue::IconThemePath(_) => Property::IconThemePath,
        }
    }
}

/// Identifies one property fetch. Responses carrying an id the item no longer waits for are ignored.
///
/// Ids are unique within the process, so a response meant for a removed item can never be mistaken for one of
/// a later item registered under the same address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FetchId(pub u64);

impl FetchId {
    pub fn next() -> FetchId {
        static NEXT: AtomicU64 = AtomicU64::new(0);
        FetchId(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

/// Signals emitted by an item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemSignal {
    NewIcon,
    NewAttentionIcon,
    NewStatus(String),
}

/// Linux input event codes of the mouse buttons, and the pseudo-buttons scroll steps are reported as.
pub mod button {
    pub const LEFT: u32 = 0x110;
    pub const RIGHT: u32 = 0x111;
    pub const MIDDLE: u32 = 0x112;
    pub const SCROLL_UP: u32 = 0x300;
    pub const SCROLL_DOWN: u32 = 0x301;
    pub const SCROLL_LEFT: u32 = 0x302;
    pub const SCROLL_RIGHT: u32 = 0x303;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClickMethod {
    Activate,
    SecondaryActivate,
    ContextMenu,
    ScrollUp,
    ScrollDown,
    ScrollLeft,
    ScrollRight,
}

impl ClickMethod {
    pub fn from_button(code: u32) -> Option<ClickMethod> {
        match code {
            button::LEFT => Some(ClickMethod::Activate),
            button::RIGHT => Some(ClickMethod::ContextMenu),
            button::MIDDLE => Some(ClickMethod::SecondaryActivate),
            button::SCROLL_UP => Some(ClickMethod::ScrollUp),
            button::SCROLL_DOWN => Some(ClickMethod::ScrollDown),
            button::SCROLL_LEFT => Some(ClickMethod::ScrollLeft),
            button::SCROLL_RIGHT => Some(ClickMethod::ScrollRight),
            _ => None,
        }
    }

    /// The remote call this click turns into, at pointer position `x`, `y`.
    pub fn call(self, x: i32, y: i32) -> MethodCall {
        match self {
            ClickMethod::Activate => MethodCall::Activate { x, y },
            ClickMethod::SecondaryActivate => MethodCall::SecondaryActivate { x, y },
            ClickMethod::ContextMenu => MethodCall::ContextMenu { x, y },
            ClickMethod::ScrollUp => MethodCall::Scroll { delta: -1, orientation: Orientation::Vertical },
            ClickMethod::ScrollDown => MethodCall::Scroll { delta: 1, orientation: Orientation::Vertical },
            ClickMethod::ScrollLeft => MethodCall::Scroll { delta: -1, orientation: Orientation::Horizontal },
            ClickMethod::ScrollRight => MethodCall::Scroll { delta: 1, orientation: Orientation::Horizontal },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Orientation {
    Vertical,
    Horizontal,
}

impl Orientation {
    pub fn as_str(self) -> &'static str {
        match self {
            Orientation::Vertical => "vertical",
            Orientation::Horizontal => "horizontal",
        }
    }
}

/// A method call on an item. The caller never waits for its outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MethodCall {
    Activate { x: i32, y: i32 },
    SecondaryActivate { x: i32, y: i32 },
    ContextMenu { x: i32, y: i32 },
    Scroll { delta: i32, orientation: Orientation },
}

impl MethodCall {
    pub fn member(&self) -> &'static str {
        match self {
            MethodCall::Activate { .. } => "Activate",
            MethodCall::SecondaryActivate { .. } => "SecondaryActivate",
            MethodCall::ContextMenu { .. } => "ContextMenu",
            MethodCall::Scroll { .. } => "Scroll",
        }
    }
}

/// Area of the bar an item was last drawn in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Bounds {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl Bounds {
    /// Whether `(x, y)` lies strictly inside. Points on the edge belong to no one.
    pub fn contains(&self, x: f64, y: f64) -> bool {
        x > self.x as f64
            && y > self.y as f64
            && x < (self.x + self.width) as f64
            && y < (self.y + self.height) as f64
    }
}

/// Where the icon drawn for an item comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IconSource {
    File(PathBuf),
    Pixmap { attention: bool, index: usize },
    Placeholder,
}

#[derive(Debug)]
struct PendingFetch {
    property: Property,
    _request: PendingRequest,
}

/// A registered StatusNotifierItem, with the property values fetched so far.
///
/// All requests an item has in flight are cancelled when it is dropped.
#[derive(Debug)]
pub struct Item {
    id: ItemId,
    status: Option<String>,
    icon_name: Option<String>,
    icon_pixmap: Vec<Pixmap>,
    attention_icon_name: Option<String>,
    attention_icon_pixmap: Vec<Pixmap>,
    icon_theme_path: Option<String>,
    is_menu: bool,
    menu: Option<String>,

    pending: HashMap<FetchId, PendingFetch>,
    signals: Option<PendingRequest>,
    /// Icon properties whose refresh waits for the item to leave `Passive`.
    deferred: Vec<Property>,

    invalid: bool,
    icon: Option<IconSource>,
    bounds: Option<Bounds>,
}

impl Item {
    pub fn new(id: ItemId) -> Self {
        Item {
            id,
            status: None,
            icon_name: None,
            icon_pixmap: Vec::new(),
            attention_icon_name: None,
            attention_icon_pixmap: Vec::new(),
            icon_theme_path: None,
            is_menu: false,
            menu: None,
            pending: HashMap::new(),
            signals: None,
            deferred: Vec::new(),
            invalid: true,
            icon: None,
            bounds: None,
        }
    }

    /// Fetch the initial properties and start listening to the item's signals.
    pub fn start(&mut self, requests: &impl Requests) {
        for property in Property::initial(self.id.flavor()) {
            self.request(requests, *property);
        }
        self.signals = Some(requests.watch_signals(&self.id));
    }

    pub fn request(&mut self, requests: &impl Requests, property: Property) -> FetchId {
        let fetch = FetchId::next();
        let request = requests.fetch_property(&self.id, fetch, property);
        self.pending.insert(fetch, PendingFetch { property, _request: request });
        fetch
    }

    pub fn id(&self) -> &ItemId {
        &self.id
    }

    /// The raw status string, once fetched.
    pub fn raw_status(&self) -> Option<&str> {
        self.status.as_deref()
    }

    pub fn status(&self) -> Option<Status> {
        self.status.as_deref().map(Status::from_prefix)
    }

    pub fn is_passive(&self) -> bool {
        self.status() == Some(Status::Passive)
    }

    pub fn icon_name(&self) -> Option<&str> {
        self.icon_name.as_deref()
    }

    pub fn icon_pixmap(&self) -> &[Pixmap] {
        &self.icon_pixmap
    }

    pub fn attention_icon_name(&self) -> Option<&str> {
        self.attention_icon_name.as_deref()
    }

    pub fn attention_icon_pixmap(&self) -> &[Pixmap] {
        &self.attention_icon_pixmap
    }

    pub fn icon_theme_path(&self) -> Option<&str> {
        self.icon_theme_path.as_deref()
    }

    pub fn is_menu(&self) -> bool {
        self.is_menu
    }

    pub fn menu(&self) -> Option<&str> {
        self.menu.as_deref()
    }

    pub fn pending_fetches(&self) -> usize {
        self.pending.len()
    }

    pub fn is_pending(&self, property: Property) -> bool {
        self.pending.values().any(|pending| pending.property == property)
    }

    /// Whether the item has a status and something to draw for it: an icon name or at least one pixmap.
    pub fn is_ready(&self) -> bool {
        let (name, pixmaps) = match self.status() {
            None => return false,
            Some(Status::NeedsAttention) => (&self.attention_icon_name, &self.attention_icon_pixmap),
            Some(_) => (&self.icon_name, &self.icon_pixmap),
        };
        name.as_deref().is_some_and(|name| !name.is_empty()) || !pixmaps.is_empty()
    }

    pub fn is_invalid(&self) -> bool {
        self.invalid
    }

    pub fn invalidate(&mut self) {
        self.invalid = true;
    }

    /// Handle the response to a fetch. Returns whether the item changed.
    pub fn complete(
        &mut self,
        requests: &impl Requests,
        fetch: FetchId,
        result: std::result::Result<PropertyValue, FetchError>,
    ) -> bool {
        let Some(pending) = self.pending.remove(&fetch) else {
            log::debug!("dropping stale response for {}", self.id);
            return false;
        };
        match result {
            Ok(value) if value.property() != pending.property => {
                log::debug!(
                    "dropping {} value for {} fetch of {}",
                    value.property().name(),
                    pending.property.name(),
                    self.id
                );
                false
            }
            Ok(value) => {
                self.apply(value);
                self.flush_deferred(requests);
                self.invalidate();
                true
            }
            Err(e) => {
                log::debug!("failed to fetch {} of {}: {}", pending.property.name(), self.id, e);
                false
            }
        }
    }

    /// Handle a signal of the item. Returns whether the item changed.
    pub fn handle_signal(&mut self, requests: &impl Requests, signal: ItemSignal) -> bool {
        match signal {
            ItemSignal::NewIcon => {
                self.icon_pixmap.clear();
                let properties: &[Property] = match self.id.flavor() {
                    Flavor::Freedesktop => &[Property::IconName, Property::IconPixmap],
                    Flavor::Kde => &[Property::IconName, Property::IconPixmap, Property::IconThemePath],
                };
                self.refresh(requests, properties);
                false
            }
            ItemSignal::NewAttentionIcon => {
                self.attention_icon_pixmap.clear();
                self.refresh(requests, &[Property::AttentionIconName, Property::AttentionIconPixmap]);
                false
            }
            ItemSignal::NewStatus(status) => {
                log::debug!("{} is now {}", self.id, status);
                self.status = Some(status);
                self.flush_deferred(requests);
                self.invalidate();
                true
            }
        }
    }

    /// Ask the item what method `button` maps to and call it. Returns whether `button` means anything.
    pub fn click(&self, requests: &impl Requests, button: u32, x: i32, y: i32) -> bool {
        let Some(method) = ClickMethod::from_button(button) else {
            log::debug!("ignoring button {:#x} on {}", button, self.id);
            return false;
        };
        let method = match method {
            ClickMethod::Activate if self.is_menu => ClickMethod::ContextMenu,
            method => method,
        };
        requests.call_method(&self.id, method.call(x, y));
        true
    }

    /// Pick the icon to draw: the (attention) icon name, the best matching pixmap, or a placeholder.
    pub fn choose_icon(&self, icons: &IconThemes, theme: &str, size: i32) -> IconSource {
        let attention = self.status() == Some(Status::NeedsAttention);
        let (name, pixmaps) = if attention {
            (self.attention_icon_name.as_deref(), &self.attention_icon_pixmap)
        } else {
            (self.icon_name.as_deref(), &self.icon_pixmap)
        };

        if let Some(name) = name.filter(|name| !name.is_empty()) {
            let path = Path::new(name);
            if path.is_absolute() && path.is_file() {
                return IconSource::File(path.to_owned());
            }
            let found = match self.icon_theme_path.as_deref().filter(|dir| !dir.is_empty()) {
                Some(dir) => icons.lookup_with_dir(name, size, theme, Path::new(dir)),
                None => icons.lookup(name, size, theme),
            };
            if let Some(path) = found {
                return IconSource::File(path);
            }
            log::debug!("no icon {:?} found for {}", name, self.id);
        }

        match closest_pixmap(pixmaps, size) {
            Some(index) => IconSource::Pixmap { attention, index },
            None => IconSource::Placeholder,
        }
    }

    /// Re-resolve the icon if anything changed since it was last chosen.
    pub fn refresh_icon(&mut self, icons: &IconThemes, theme: &str, size: i32) {
        if self.invalid || self.icon.is_none() {
            self.icon = Some(self.choose_icon(icons, theme, size));
            self.invalid = false;
        }
    }

    pub fn icon(&self) -> crate::render::Icon<'_> {
        use crate::render::Icon;
        match &self.icon {
            Some(IconSource::File(path)) => Icon::File(path),
            Some(IconSource::Pixmap { attention, index }) => {
                let pixmaps = if *attention { &self.attention_icon_pixmap } else { &self.icon_pixmap };
                pixmaps.get(*index).map(Icon::Pixmap).unwrap_or(Icon::Placeholder)
            }
            Some(IconSource::Placeholder) | None => Icon::Placeholder,
        }
    }

    pub fn bounds(&self) -> Option<Bounds> {
        self.bounds
    }

    pub fn set_bounds(&mut self, bounds: Option<Bounds>) {
        self.bounds = bounds;
    }

    pub fn contains(&self, x: f64, y: f64) -> bool {
        self.bounds.is_some_and(|bounds| bounds.contains(x, y))
    }

    fn apply(&mut self, value: PropertyValue) {
        match value {
            PropertyValue::Status(status) => self.status = Some(status),
            PropertyValue::IconName(name) => self.icon_name = Some(name),
            PropertyValue::IconPixmap(pixmaps) => self.icon_pixmap = pixmaps,
            PropertyValue::AttentionIconName(name) => self.attention_icon_name = Some(name),
            PropertyValue::AttentionIconPixmap(pixmaps) => self.attention_icon_pixmap = pixmaps,
            PropertyValue::ItemIsMenu(is_menu) => self.is_menu = is_menu,
            PropertyValue::Menu(menu) => self.menu = Some(menu),
            PropertyValue::IconThemePath(path) => self.icon_theme_path = Some(path),
        }
    }

    fn refresh(&mut self, requests: &impl Requests, properties: &[Property]) {
        self.icon = None;
        if self.is_passive() {
            for property in properties {
                if !self.deferred.contains(property) {
                    self.deferred.push(*property);
                }
            }
            return;
        }
        for property in properties {
            self.request(requests, *property);
        }
    }

    fn flush_deferred(&mut self, requests: &impl Requests) {
        if self.deferred.is_empty() || self.is_passive() {
            return;
        }
        for property in std::mem::take(&mut self.deferred) {
            self.request(requests, property);
        }
    }
}

impl Drop for Item {
    fn drop(&mut self) {
        self.signals.take();
        self.pending.clear();
    }
}
