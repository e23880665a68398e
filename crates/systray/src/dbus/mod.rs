//! # DBus interface proxies
//!
//! Both traits are declared with the `org.kde` interface names. Proxies of the `org.freedesktop` flavor are made
//! by overriding the interface on the builder, see [`Flavor::watcher_bus`](crate::Flavor::watcher_bus) and
//! [`Flavor::item_interface`](crate::Flavor::item_interface).

mod dbus_status_notifier_item;
pub use dbus_status_notifier_item::*;

mod dbus_status_notifier_watcher;
pub use dbus_status_notifier_watcher::*;
