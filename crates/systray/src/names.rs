//! Well-known bus names, interfaces and object paths of the StatusNotifier protocol.

/// Object path the watcher is served at, for both flavors.
pub const WATCHER_OBJECT: &str = "/StatusNotifierWatcher";

/// Object path of an item that only gave us its bus name.
pub const ITEM_OBJECT: &str = "/StatusNotifierItem";

/// The protocol exists twice, once under `org.freedesktop` and once under `org.kde`. Most applications only
/// talk to the `org.kde` one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Flavor {
    Freedesktop,
    Kde,
}

impl Flavor {
    pub const ALL: [Flavor; 2] = [Flavor::Freedesktop, Flavor::Kde];

    /// The `freedesktop` or `kde` in `org.freedesktop.StatusNotifierWatcher`.
    pub fn prefix(self) -> &'static str {
        match self {
            Flavor::Freedesktop => "freedesktop",
            Flavor::Kde => "kde",
        }
    }

    /// Well-known bus name of the watcher, which is also its interface name.
    pub fn watcher_bus(self) -> &'static str {
        match self {
            Flavor::Freedesktop => "org.freedesktop.StatusNotifierWatcher",
            Flavor::Kde => "org.kde.StatusNotifierWatcher",
        }
    }

    pub fn item_interface(self) -> &'static str {
        match self {
            Flavor::Freedesktop => "org.freedesktop.StatusNotifierItem",
            Flavor::Kde => "org.kde.StatusNotifierItem",
        }
    }

    /// The `n`th host name of process `pid`, e.g. `org.kde.StatusNotifierHost-4005-0`.
    pub fn host_name(self, pid: u32, n: u32) -> String {
        format!("org.{}.StatusNotifierHost-{}-{}", self.prefix(), pid, n)
    }
}

impl std::fmt::Display for Flavor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.prefix())
    }
}
