//! Talking to items over the bus.
//!
//! Every request runs as its own tokio task and reports back to the tray through a [`TrayEvent`], so the tray
//! itself never waits on the bus.

use std::future::Future;

use futures::StreamExt;
use tokio::sync::mpsc::UnboundedSender;
use zbus::proxy::CacheProperties;

use crate::{dbus::StatusNotifierItemProxy, *};

/// Handle of an in-flight request. Dropping it cancels the request.
#[derive(Debug)]
pub struct PendingRequest(tokio::task::AbortHandle);

impl PendingRequest {
    pub fn spawn<F>(future: F) -> Self
    where
        F: Future<Output = ()> + Send + 'static,
    {
        PendingRequest(tokio::spawn(future).abort_handle())
    }
}

impl Drop for PendingRequest {
    fn drop(&mut self) {
        self.0.abort();
    }
}

/// The requests an [`Item`] sends. Implemented by [`ItemBus`].
pub trait Requests {
    /// Fetch `property` of item `id`. The outcome arrives as [`TrayEvent::PropertyFetched`] carrying `fetch`.
    fn fetch_property(&self, id: &ItemId, fetch: FetchId, property: Property) -> PendingRequest;

    /// Forward the signals of item `id` as [`TrayEvent::ItemSignal`] until the returned handle is dropped.
    fn watch_signals(&self, id: &ItemId) -> PendingRequest;

    /// Call a method of item `id` without waiting for the reply.
    fn call_method(&self, id: &ItemId, call: MethodCall);
}

#[derive(Debug, Clone)]
pub struct ItemBus {
    con: zbus::Connection,
    events: UnboundedSender<TrayEvent>,
}

impl ItemBus {
    pub fn new(con: zbus::Connection, events: UnboundedSender<TrayEvent>) -> Self {
        ItemBus { con, events }
    }

    pub fn connection(&self) -> &zbus::Connection {
        &self.con
    }
}

impl Requests for ItemBus {
    fn fetch_property(&self, id: &ItemId, fetch: FetchId, property: Property) -> PendingRequest {
        let (con, events, id) = (self.con.clone(), self.events.clone(), id.clone());
        PendingRequest::spawn(async move {
            let result = fetch_item_property(&con, &id, property).await;
            // nobody listening anymore means the tray is shutting down
            let _ = events.send(TrayEvent::PropertyFetched { id, fetch, result });
        })
    }

    fn watch_signals(&self, id: &ItemId) -> PendingRequest {
        let (con, events, id) = (self.con.clone(), self.events.clone(), id.clone());
        PendingRequest::spawn(async move {
            if let Err(e) = forward_signals(&con, &id, &events).await {
                log::warn!("failed to watch signals of {}: {}", id, e);
            }
        })
    }

    fn call_method(&self, id: &ItemId, call: MethodCall) {
        let (con, id) = (self.con.clone(), id.clone());
        tokio::spawn(async move {
            if let Err(e) = invoke(&con, &id, call).await {
                log::warn!("{} on {} failed: {}", call.member(), id, e);
            }
        });
    }
}

/// A proxy for item `id`, of the item's flavor. Every property read goes to the item, nothing is cached.
pub async fn item_proxy(con: &zbus::Connection, id: &ItemId) -> zbus::Result<StatusNotifierItemProxy<'static>> {
    StatusNotifierItemProxy::builder(con)
        .destination(id.service().to_owned())?
        .path(id.path().to_owned())?
        .interface(id.interface())?
        .cache_properties(CacheProperties::No)
        .build()
        .await
}

pub async fn fetch_item_property(
    con: &zbus::Connection,
    id: &ItemId,
    property: Property,
) -> std::result::Result<PropertyValue, FetchError> {
    let item = item_proxy(con, id).await?;
    Ok(match property {
        Property::Status => PropertyValue::Status(item.status().await?),
        Property::IconName => PropertyValue::IconName(item.icon_name().await?),
        Property::IconPixmap => PropertyValue::IconPixmap(decode_pixmaps(item.icon_pixmap().await?)),
        Property::AttentionIconName => PropertyValue::AttentionIconName(item.attention_icon_name().await?),
        Property::AttentionIconPixmap => {
            PropertyValue::AttentionIconPixmap(decode_pixmaps(item.attention_icon_pixmap().await?))
        }
        Property::ItemIsMenu => PropertyValue::ItemIsMenu(item.item_is_menu().await?),
        Property::Menu => PropertyValue::Menu(item.menu().await?.as_str().to_owned()),
        Property::IconThemePath => PropertyValue::IconThemePath(item.icon_theme_path().await?),
    })
}

async fn forward_signals(
    con: &zbus::Connection,
    id: &ItemId,
    events: &UnboundedSender<TrayEvent>,
) -> zbus::Result<()> {
    let item = item_proxy(con, id).await?;
    let mut new_icon = item.receive_new_icon().await?;
    let mut new_attention_icon = item.receive_new_attention_icon().await?;
    let mut new_status = item.receive_new_status().await?;

    loop {
        let signal = tokio::select! {
            Some(_) = new_icon.next() => Some(ItemSignal::NewIcon),
            Some(_) = new_attention_icon.next() => Some(ItemSignal::NewAttentionIcon),
            Some(sig) = new_status.next() => match sig.args() {
                Ok(args) => Some(ItemSignal::NewStatus(args.status.to_owned())),
                Err(e) => {
                    log::debug!("malformed NewStatus from {}: {}", id, e);
                    None
                }
            },
            else => return Ok(()),
        };
        let Some(signal) = signal else { continue };
        if events.send(TrayEvent::ItemSignal { id: id.clone(), signal }).is_err() {
            return Ok(());
        }
    }
}

async fn invoke(con: &zbus::Connection, id: &ItemId, call: MethodCall) -> zbus::Result<()> {
    let item = item_proxy(con, id).await?;
    match call {
        MethodCall::Activate { x, y } => item.activate(x, y).await,
        MethodCall::SecondaryActivate { x, y } => item.secondary_activate(x, y).await,
        MethodCall::ContextMenu { x, y } => item.context_menu(x, y).await,
        MethodCall::Scroll { delta, orientation } => item.scroll(delta, orientation.as_str()).await,
    }
}
