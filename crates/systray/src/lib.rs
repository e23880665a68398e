//! System tray built on the [StatusNotifierItem] protocol.
//!
//! The [`Tray`] runs a [`Watcher`] and a [`Host`] for both the `org.freedesktop` and the `org.kde` flavor of
//! the protocol, tracks every registered [`Item`], and exposes the width/render and bounds/click contracts of
//! [`render`] to whatever draws the bar.
//!
//! [StatusNotifierItem]: https://freedesktop.org/wiki/Specifications/StatusNotifierItem/

pub mod bus;

pub mod dbus;

mod error;
pub use error::*;

mod host;
pub use host::*;

mod item;
pub use item::*;

pub mod names;
pub use names::Flavor;

pub mod render;

mod tray;
pub use tray::*;

mod watcher;
pub use watcher::*;
