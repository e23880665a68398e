use std::sync::{Arc, Mutex};

use futures::StreamExt;
use zbus::{interface, message::Header, Interface, SignalContext};

use crate::{names, Flavor};

/// Items and hosts registered with one watcher, in registration order and without duplicates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatcherState {
    flavor: Flavor,
    items: Vec<String>,
    hosts: Vec<String>,
}

/// What a [`WatcherState::service_lost`] call removed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ServiceLost {
    pub items: Vec<String>,
    /// The lost service was the last registered host.
    pub last_host: bool,
}

impl ServiceLost {
    pub fn is_empty(&self) -> bool {
        self.items.is_empty() && !self.last_host
    }
}

impl WatcherState {
    pub fn new(flavor: Flavor) -> Self {
        WatcherState { flavor, items: Vec::new(), hosts: Vec::new() }
    }

    pub fn flavor(&self) -> Flavor {
        self.flavor
    }

    pub fn items(&self) -> &[String] {
        &self.items
    }

    pub fn hosts(&self) -> &[String] {
        &self.hosts
    }

    pub fn is_host_registered(&self) -> bool {
        !self.hosts.is_empty()
    }

    /// Returns whether `id` is new.
    pub fn register_item(&mut self, id: &str) -> bool {
        if self.items.iter().any(|item| item == id) {
            return false;
        }
        self.items.push(id.to_owned());
        true
    }

    /// Returns whether `name` is new.
    pub fn register_host(&mut self, name: &str) -> bool {
        if self.hosts.iter().any(|host| host == name) {
            return false;
        }
        self.hosts.push(name.to_owned());
        true
    }

    /// Forget whatever `service` registered.
    ///
    /// `org.freedesktop` items are registered by their bus name, so at most one exactly matching item is removed.
    /// `org.kde` items may be `<service><path>`, so every item at `service` or below one of its paths goes.
    pub fn service_lost(&mut self, service: &str) -> ServiceLost {
        let mut lost = ServiceLost::default();
        match self.flavor {
            Flavor::Freedesktop => {
                if let Some(idx) = self.items.iter().position(|item| item == service) {
                    lost.items.push(self.items.remove(idx));
                }
            }
            Flavor::Kde => {
                let (gone, kept): (Vec<String>, Vec<String>) =
                    std::mem::take(&mut self.items).into_iter().partition(|item| kde_item_of(item, service));
                self.items = kept;
                lost.items = gone;
            }
        }

        if let Some(idx) = self.hosts.iter().position(|host| host == service) {
            self.hosts.remove(idx);
            lost.last_host = self.hosts.is_empty();
        }
        lost
    }
}

fn kde_item_of(item: &str, service: &str) -> bool {
    item.strip_prefix(service).is_some_and(|rest| rest.is_empty() || rest.starts_with('/'))
}

/// The id an item is registered under, given the argument of its `RegisterStatusNotifierItem` call.
///
/// `org.freedesktop` watchers take it verbatim. `org.kde` watchers complete it: a bare object path is prefixed with
/// the caller's bus name, and a bare bus name gets [`names::ITEM_OBJECT`] appended.
pub fn item_id(flavor: Flavor, service: &str, sender: Option<&str>) -> Option<String> {
    match flavor {
        Flavor::Freedesktop => Some(service.to_owned()),
        Flavor::Kde if service.starts_with('/') => sender.map(|sender| format!("{}{}", sender, service)),
        Flavor::Kde if service.contains('/') => Some(service.to_owned()),
        Flavor::Kde => Some(format!("{}{}", service, names::ITEM_OBJECT)),
    }
}

type SharedState = Arc<Mutex<WatcherState>>;

/// Implementation of the `StatusNotifierWatcher` service, for one flavor.
///
/// Methods and properties correspond to methods and properties on the DBus service that can be
/// used by others, while signals are events that we generate that other services listen to.
macro_rules! watcher_interface {
    ($(#[$meta:meta])* $name:ident, $interface:tt) => {
        $(#[$meta])*
        #[derive(Debug)]
        pub struct $name {
            // Intentionally using std::sync::Mutex instead of tokio's async mutex, since we don't need to
            // hold the mutex across an await.
            state: SharedState,
        }

        #[interface(name = $interface)]
        impl $name {
            /// RegisterStatusNotifierItem method
            async fn register_status_notifier_item(
                &self,
                service: &str,
                #[zbus(header)] hdr: Header<'_>,
                #[zbus(signal_context)] ctxt: SignalContext<'_>,
            ) -> zbus::fdo::Result<()> {
                let sender = hdr.sender().map(|sender| sender.as_str());
                let added = {
                    let mut state = self.state.lock().unwrap(); // unwrap: mutex poisoning is okay
                    item_id(state.flavor(), service, sender).map(|id| (state.register_item(&id), id))
                };
                let Some((added, id)) = added else {
                    log::warn!("unknown sender of item {:?}", service);
                    return Err(zbus::fdo::Error::InvalidArgs("Unknown bus address".into()));
                };
                if !added {
                    log::info!("new item: {} (duplicate)", id);
                    return Ok(());
                }
                log::info!("new item: {}", id);

                self.registered_status_notifier_items_changed(&ctxt).await?;
                Self::status_notifier_item_registered(&ctxt, &id).await?;
                Ok(())
            }

            /// RegisterStatusNotifierHost method
            async fn register_status_notifier_host(
                &self,
                service: &str,
                #[zbus(signal_context)] ctxt: SignalContext<'_>,
            ) -> zbus::fdo::Result<()> {
                let added_first = {
                    let mut state = self.state.lock().unwrap(); // unwrap: mutex poisoning is okay
                    if !state.register_host(service) {
                        // we're already tracking them
                        return Ok(());
                    }
                    state.hosts().len() == 1
                };
                log::info!("new host: {}", service);

                if added_first {
                    self.is_status_notifier_host_registered_changed(&ctxt).await?;
                }
                Self::status_notifier_host_registered(&ctxt).await?;
                Ok(())
            }

            /// StatusNotifierItemRegistered signal
            #[zbus(signal)]
            async fn status_notifier_item_registered(ctxt: &SignalContext<'_>, service: &str) -> zbus::Result<()>;

            /// StatusNotifierItemUnregistered signal
            #[zbus(signal)]
            async fn status_notifier_item_unregistered(ctxt: &SignalContext<'_>, service: &str) -> zbus::Result<()>;

            /// StatusNotifierHostRegistered signal
            #[zbus(signal)]
            async fn status_notifier_host_registered(ctxt: &SignalContext<'_>) -> zbus::Result<()>;

            /// RegisteredStatusNotifierItems property
            #[zbus(property)]
            async fn registered_status_notifier_items(&self) -> Vec<String> {
                self.state.lock().unwrap().items().to_vec() // unwrap: mutex poisoning is okay
            }

            /// IsStatusNotifierHostRegistered property
            #[zbus(property)]
            async fn is_status_notifier_host_registered(&self) -> bool {
                self.state.lock().unwrap().is_host_registered() // unwrap: mutex poisoning is okay
            }

            /// ProtocolVersion property
            #[zbus(property)]
            fn protocol_version(&self) -> i32 {
                0
            }
        }

        impl $name {
            /// Tell everyone listening what a lost service took with it.
            async fn announce_lost(ctxt: &SignalContext<'_>, lost: &ServiceLost) -> zbus::Result<()> {
                if !lost.items.is_empty() {
                    properties_changed(ctxt, Self::name(), "RegisteredStatusNotifierItems").await?;
                }
                for id in &lost.items {
                    Self::status_notifier_item_unregistered(ctxt, id).await?;
                }
                if lost.last_host {
                    properties_changed(ctxt, Self::name(), "IsStatusNotifierHostRegistered").await?;
                }
                Ok(())
            }
        }
    };
}

watcher_interface!(
    /// An instance of [`org.freedesktop.StatusNotifierWatcher`].
    ///
    /// [`org.freedesktop.StatusNotifierWatcher`]: https://freedesktop.org/wiki/Specifications/StatusNotifierItem/StatusNotifierWatcher/
    FreedesktopWatcher,
    "org.freedesktop.StatusNotifierWatcher"
);

watcher_interface!(
    /// An instance of `org.kde.StatusNotifierWatcher`, the flavor most applications actually use.
    KdeWatcher,
    "org.kde.StatusNotifierWatcher"
);

/// Equivalent to `<property>_invalidate`, but without requiring `self`.
async fn properties_changed(
    ctxt: &SignalContext<'_>,
    interface: zbus::names::InterfaceName<'_>,
    property: &str,
) -> zbus::Result<()> {
    zbus::fdo::Properties::properties_changed(ctxt, interface, &std::collections::HashMap::new(), &[property]).await
}

/// A StatusNotifierWatcher served on a connection. It only tracks what tray items and trays exist, and doesn't
/// have any logic for displaying items (for that, see [`Host`][`crate::Host`]).
///
/// Dropping it stops noticing services that go away.
#[derive(Debug)]
pub struct Watcher {
    flavor: Flavor,
    state: SharedState,
    monitor: tokio::task::JoinHandle<()>,
}

impl Watcher {
    /// Serve a watcher of `flavor` on `con` and request its well-known name.
    ///
    /// If another process already owns the name, we queue up behind it and take over once it exits.
    pub async fn attach(con: &zbus::Connection, flavor: Flavor) -> zbus::Result<Watcher> {
        let state = Arc::new(Mutex::new(WatcherState::new(flavor)));
        let served = match flavor {
            Flavor::Freedesktop => {
                con.object_server().at(names::WATCHER_OBJECT, FreedesktopWatcher { state: state.clone() }).await?
            }
            Flavor::Kde => con.object_server().at(names::WATCHER_OBJECT, KdeWatcher { state: state.clone() }).await?,
        };
        if !served {
            return Err(zbus::Error::Failure(format!(
                "Object already exists at {} on this connection -- is {} already running?",
                names::WATCHER_OBJECT,
                flavor.watcher_bus()
            )));
        }

        // subscribe before the name is ours, so no exit goes unnoticed
        let dbus = zbus::fdo::DBusProxy::new(con).await?;
        let owner_changes = dbus.receive_name_owner_changed().await?;

        // not AllowReplacement, not ReplaceExisting, not DoNotQueue
        let flags: [zbus::fdo::RequestNameFlags; 0] = [];
        match con.request_name_with_flags(flavor.watcher_bus(), flags.into_iter().collect()).await {
            Ok(zbus::fdo::RequestNameReply::PrimaryOwner) => log::info!("serving {}", flavor.watcher_bus()),
            Ok(_) | Err(zbus::Error::NameTaken) => {
                log::info!("{} is already served elsewhere, waiting in line", flavor.watcher_bus())
            }
            Err(e) => return Err(e),
        }

        let ctxt = SignalContext::new(con, names::WATCHER_OBJECT)?.into_owned();
        let monitor = tokio::spawn({
            let state = state.clone();
            async move {
                if let Err(e) = forget_lost_services(owner_changes, state, ctxt).await {
                    log::error!("failed to wait for service exit: {}", e);
                }
            }
        });

        Ok(Watcher { flavor, state, monitor })
    }

    pub fn flavor(&self) -> Flavor {
        self.flavor
    }

    /// A snapshot of the registered items and hosts.
    pub fn state(&self) -> WatcherState {
        self.state.lock().unwrap().clone() // unwrap: mutex poisoning is okay
    }
}

impl Drop for Watcher {
    fn drop(&mut self) {
        self.monitor.abort();
    }
}

async fn forget_lost_services(
    mut owner_changes: zbus::fdo::NameOwnerChangedStream<'static>,
    state: SharedState,
    ctxt: SignalContext<'static>,
) -> zbus::Result<()> {
    while let Some(sig) = owner_changes.next().await {
        let args = sig.args()?;
        if args.new_owner().is_some() {
            continue;
        }
        let service = args.name().as_str();

        let (flavor, lost) = {
            let mut state = state.lock().unwrap(); // unwrap: mutex poisoning is okay
            (state.flavor(), state.service_lost(service))
        };
        if lost.is_empty() {
            continue;
        }
        for id in &lost.items {
            log::info!("gone item: {}", id);
        }
        if lost.last_host {
            log::info!("lost last host: {}", service);
        }

        let announced = match flavor {
            Flavor::Freedesktop => FreedesktopWatcher::announce_lost(&ctxt, &lost).await,
            Flavor::Kde => KdeWatcher::announce_lost(&ctxt, &lost).await,
        };
        if let Err(e) = announced {
            log::error!("failed to signal Watcher: {}", e);
        }
    }
    Ok(())
}
