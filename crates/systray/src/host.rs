use futures::StreamExt;
use tokio::sync::mpsc::UnboundedSender;
use zbus::proxy::CacheProperties;

use crate::{
    dbus::{StatusNotifierItemRegisteredStream, StatusNotifierItemUnregisteredStream, StatusNotifierWatcherProxy},
    *,
};

/// Register as a StatusNotifierHost of `flavor`, under a fresh well-known name.
///
/// From <https://www.freedesktop.org/wiki/Specifications/StatusNotifierItem/StatusNotifierHost/>:
///
/// Instances of this service are registered on the Dbus session bus, under a name on the
/// form org.freedesktop.StatusNotifierHost-id where id is an unique identifier, that keeps
/// the names unique on the bus, such as the process-id of the application or another type
/// of identifier if more that one StatusNotifierHost is registered by the same process.
pub async fn request_host_name(con: &zbus::Connection, flavor: Flavor) -> zbus::Result<String> {
    let pid = std::process::id();
    let mut i = 0;
    loop {
        let wellknown_name = flavor.host_name(pid, i);
        let flags = [zbus::fdo::RequestNameFlags::DoNotQueue];

        use zbus::fdo::RequestNameReply::*;
        match con.request_name_with_flags(wellknown_name.as_str(), flags.into_iter().collect()).await {
            Ok(PrimaryOwner) => return Ok(wellknown_name),
            Ok(Exists) | Ok(AlreadyOwner) | Err(zbus::Error::NameTaken) => {}
            Ok(InQueue) => {
                return Err(zbus::Error::Failure(format!(
                    "request for {} was queued even though we specified DoNotQueue",
                    wellknown_name
                )))
            }
            Err(e) => return Err(e),
        };

        i += 1;
    }
}

/// A StatusNotifierHost of one flavor, forwarding the items its watcher knows about to the tray.
///
/// Whenever the watcher's bus name gets a new owner, the host registers itself again and reports the items of the
/// new watcher. Dropping the host stops all of this.
#[derive(Debug)]
pub struct Host {
    flavor: Flavor,
    name: String,
    task: tokio::task::JoinHandle<()>,
}

impl Host {
    pub async fn register(con: &zbus::Connection, flavor: Flavor, events: UnboundedSender<TrayEvent>) -> Result<Host> {
        let name = request_host_name(con, flavor).await?;
        log::info!("registered host name {}", name);

        let watcher = StatusNotifierWatcherProxy::builder(con)
            .destination(flavor.watcher_bus())?
            .path(names::WATCHER_OBJECT)?
            .interface(flavor.watcher_bus())?
            .cache_properties(CacheProperties::No)
            .build()
            .await?;
        let dbus = zbus::fdo::DBusProxy::new(con).await?;

        // start listening to these streams before registering, so no item goes missing in between
        let registered = watcher.receive_status_notifier_item_registered().await?;
        let unregistered = watcher.receive_status_notifier_item_unregistered().await?;
        let owner_changes = dbus.receive_name_owner_changed_with_args(&[(0, flavor.watcher_bus())]).await?;

        register_with_watcher(&watcher, &name, &events).await;

        let task = tokio::spawn({
            let name = name.clone();
            async move {
                let streams = HostStreams { registered, unregistered, owner_changes };
                if let Err(e) = serve_host(&watcher, &name, &events, streams).await {
                    log::error!("host {} stopped: {}", name, e);
                }
            }
        });

        Ok(Host { flavor, name, task })
    }

    pub fn flavor(&self) -> Flavor {
        self.flavor
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl Drop for Host {
    fn drop(&mut self) {
        self.task.abort();
    }
}

struct HostStreams {
    registered: StatusNotifierItemRegisteredStream<'static>,
    unregistered: StatusNotifierItemUnregisteredStream<'static>,
    owner_changes: zbus::fdo::NameOwnerChangedStream<'static>,
}

/// Register `name` with the watcher and report the items it already knows. Failures are only logged, the next
/// watcher to show up gets another try.
async fn register_with_watcher(
    watcher: &StatusNotifierWatcherProxy<'_>,
    name: &str,
    events: &UnboundedSender<TrayEvent>,
) {
    let interface = watcher.inner().interface();
    if let Err(e) = watcher.register_status_notifier_host(name).await {
        log::warn!("failed to register {} with {}: {}", name, interface, e);
    }

    let items = match watcher.registered_status_notifier_items().await {
        Ok(items) => items,
        Err(e) => {
            log::warn!("failed to get items of {}: {}", interface, e);
            return;
        }
    };

    let ids = items.iter().filter_map(|item| parse_item(item)).collect();
    let _ = events.send(TrayEvent::RegisteredItems(ids));
}

async fn serve_host(
    watcher: &StatusNotifierWatcherProxy<'_>,
    name: &str,
    events: &UnboundedSender<TrayEvent>,
    mut streams: HostStreams,
) -> zbus::Result<()> {
    loop {
        let event = tokio::select! {
            Some(sig) = streams.registered.next() => parse_item(sig.args()?.service).map(TrayEvent::ItemRegistered),
            Some(sig) = streams.unregistered.next() => parse_item(sig.args()?.service).map(TrayEvent::ItemUnregistered),
            Some(sig) = streams.owner_changes.next() => {
                let args = sig.args()?;
                if watcher_appeared(args.old_owner().as_deref(), args.new_owner().as_deref()) {
                    log::info!("{} appeared, registering {} again", watcher.inner().interface(), name);
                    register_with_watcher(watcher, name, events).await;
                }
                None
            },
            else => break,
        };

        if let Some(event) = event {
            if events.send(event).is_err() {
                break;
            }
        }
    }

    Ok(())
}

/// Whether an owner change of the watcher's bus name means a watcher took the previously unowned name.
fn watcher_appeared(old_owner: Option<&str>, new_owner: Option<&str>) -> bool {
    old_owner.is_none() && new_owner.is_some()
}

fn parse_item(item: &str) -> Option<ItemId> {
    match ItemId::parse(item) {
        Ok(id) => Some(id),
        Err(e) => {
            log::warn!("ignoring item: {}", e);
            None
        }
    }
}
