use icon_theme::IconThemes;
use tokio::sync::mpsc;

use crate::{
    bus::{ItemBus, Requests},
    render::{Canvas, HotspotListener, PipelineListener},
    *,
};

/// Everything that happens to the tray. Produced by the [`Host`]s and by item requests, consumed by
/// [`Tray::handle_event`].
#[derive(Debug)]
pub enum TrayEvent {
    /// The items a watcher had registered when we registered with it.
    RegisteredItems(Vec<ItemId>),
    ItemRegistered(ItemId),
    ItemUnregistered(ItemId),
    PropertyFetched { id: ItemId, fetch: FetchId, result: std::result::Result<PropertyValue, FetchError> },
    ItemSignal { id: ItemId, signal: ItemSignal },
}

pub type TrayEvents = mpsc::UnboundedReceiver<TrayEvent>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrayConfig {
    /// Name of the icon theme to look icons up in.
    pub icon_theme: String,
    pub icon_size: i32,
    /// Height of the bar.
    pub height: i32,
}

impl Default for TrayConfig {
    fn default() -> Self {
        TrayConfig { icon_theme: icon_theme::lookup::FALLBACK_THEME.to_owned(), icon_size: 16, height: 20 }
    }
}

/// The system tray: the watchers, the hosts, and every item they know of.
pub struct Tray<R = ItemBus> {
    requests: R,
    config: TrayConfig,
    icons: IconThemes,
    items: Vec<Item>,
    origin: (i32, i32),
    hosts: Vec<Host>,
    watchers: Vec<Watcher>,
}

impl Tray<ItemBus> {
    /// Serve a watcher and register a host of every flavor on `con`.
    ///
    /// Events for the tray arrive on the returned receiver and have to be fed to [`Tray::handle_event`].
    pub async fn connect(con: &zbus::Connection, config: TrayConfig, icons: IconThemes) -> Result<(Self, TrayEvents)> {
        let (tx, rx) = mpsc::unbounded_channel();

        let mut watchers = Vec::new();
        for flavor in Flavor::ALL {
            watchers.push(Watcher::attach(con, flavor).await?);
        }
        let mut hosts = Vec::new();
        for flavor in Flavor::ALL {
            hosts.push(Host::register(con, flavor, tx.clone()).await?);
        }

        let mut tray = Tray::new(ItemBus::new(con.clone(), tx), config, icons);
        tray.watchers = watchers;
        tray.hosts = hosts;
        Ok((tray, rx))
    }
}

impl<R: Requests> Tray<R> {
    pub fn new(requests: R, config: TrayConfig, icons: IconThemes) -> Self {
        Tray { requests, config, icons, items: Vec::new(), origin: (0, 0), hosts: Vec::new(), watchers: Vec::new() }
    }

    pub fn config(&self) -> &TrayConfig {
        &self.config
    }

    pub fn requests(&self) -> &R {
        &self.requests
    }

    pub fn items(&self) -> &[Item] {
        &self.items
    }

    pub fn item(&self, id: &ItemId) -> Option<&Item> {
        self.items.iter().find(|item| item.id() == id)
    }

    pub fn hosts(&self) -> &[Host] {
        &self.hosts
    }

    pub fn watchers(&self) -> &[Watcher] {
        &self.watchers
    }

    /// Apply an event. Returns whether the bar needs to be redrawn.
    pub fn handle_event(&mut self, event: TrayEvent) -> bool {
        match event {
            TrayEvent::RegisteredItems(ids) => {
                for id in ids {
                    self.add_item(id);
                }
                false
            }
            TrayEvent::ItemRegistered(id) => {
                self.add_item(id);
                false
            }
            TrayEvent::ItemUnregistered(id) => self.remove_item(&id),
            TrayEvent::PropertyFetched { id, fetch, result } => {
                let requests = &self.requests;
                match self.items.iter_mut().find(|item| item.id() == &id) {
                    Some(item) => item.complete(requests, fetch, result),
                    None => {
                        log::debug!("dropping response for unknown item {}", id);
                        false
                    }
                }
            }
            TrayEvent::ItemSignal { id, signal } => {
                let requests = &self.requests;
                match self.items.iter_mut().find(|item| item.id() == &id) {
                    Some(item) => item.handle_signal(requests, signal),
                    None => false,
                }
            }
        }
    }

    /// Start tracking `id`. Returns false if it is already tracked.
    pub fn add_item(&mut self, id: ItemId) -> bool {
        if self.item(&id).is_some() {
            log::debug!("already tracking {}", id);
            return false;
        }
        log::info!("adding item {}", id);
        let mut item = Item::new(id);
        item.start(&self.requests);
        self.items.push(item);
        true
    }

    /// Stop tracking `id`, cancelling all of its requests. Returns whether it was tracked.
    pub fn remove_item(&mut self, id: &ItemId) -> bool {
        match self.items.iter().position(|item| item.id() == id) {
            Some(idx) => {
                log::info!("removing item {}", id);
                self.items.remove(idx);
                true
            }
            None => false,
        }
    }

    fn shown(item: &Item) -> bool {
        item.is_ready() && !item.is_passive()
    }
}

impl<R: Requests> PipelineListener for Tray<R> {
    fn width(&self) -> i32 {
        let shown = self.items.iter().filter(|item| Self::shown(item)).count() as i32;
        self.config.icon_size.saturating_add(2).saturating_mul(shown)
    }

    fn render(&mut self, canvas: &mut dyn Canvas, x: &mut i32, y: &mut i32) {
        self.origin = (*x, *y);
        let size = self.config.icon_size;
        let height = self.config.height;

        for item in &mut self.items {
            if !Self::shown(item) {
                item.set_bounds(None);
                continue;
            }
            let bounds = Bounds { x: *x, y: *y, width: size + 2, height };
            item.set_bounds(Some(bounds));
            canvas.fill_background(bounds);

            item.refresh_icon(&self.icons, &self.config.icon_theme, size);
            canvas.draw_icon(item.icon(), *x + 1, height - size - 1, size);
            *x += size + 2;
        }
    }
}

impl<R: Requests> HotspotListener for Tray<R> {
    fn bounds(&self) -> Bounds {
        Bounds { x: self.origin.0, y: self.origin.1, width: self.width(), height: self.config.height }
    }

    fn click(&mut self, button: u32, x: f64, y: f64) {
        let Some(item) = self.items.iter().find(|item| item.contains(x, y)) else {
            return;
        };
        item.click(&self.requests, button, x as i32, y as i32);
    }
}
