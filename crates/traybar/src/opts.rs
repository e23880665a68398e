use clap::{Parser, Subcommand};
use systray::TrayConfig;

/// Upper bound for pixel sizes given on the command line.
const MAX_SIZE: i64 = 1024;

/// Struct that gets generated from `RawOpt`.
#[derive(Debug, PartialEq, Eq)]
pub struct Opt {
    pub log_debug: bool,
    pub config: TrayConfig,
    pub action: Action,
}

#[derive(Parser, Debug, PartialEq, Eq)]
#[command(version, about, long_about = None)]
struct RawOpt {
    /// Write out debug logs.
    #[arg(long = "debug", global = true)]
    log_debug: bool,

    /// Icon theme to look icons up in
    #[arg(long, global = true, default_value = icon_theme::lookup::FALLBACK_THEME)]
    icon_theme: String,

    /// Size icons are drawn at, in pixels
    #[arg(long, global = true, default_value_t = 16, value_parser = clap::value_parser!(i32).range(1..=MAX_SIZE))]
    icon_size: i32,

    /// Height of the bar, in pixels
    #[arg(long, global = true, default_value_t = 20, value_parser = clap::value_parser!(i32).range(1..=MAX_SIZE))]
    height: i32,

    #[command(subcommand)]
    action: Option<Action>,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum Action {
    /// Serve the watchers and hosts, and log what the tray would draw. This is the default.
    #[command(name = "run")]
    Run,

    /// Print the file an icon name resolves to.
    #[command(name = "lookup")]
    Lookup {
        /// Name of the icon, e.g. `firefox`
        name: String,

        /// Size to look up, defaults to --icon-size
        #[arg(long, value_parser = clap::value_parser!(i32).range(1..=MAX_SIZE))]
        size: Option<i32>,
    },

    /// List the icon base directories and the themes found in them.
    #[command(name = "themes")]
    Themes,
}

impl Opt {
    pub fn from_env() -> Self {
        let raw: RawOpt = RawOpt::parse();
        raw.into()
    }
}

impl From<RawOpt> for Opt {
    fn from(other: RawOpt) -> Self {
        let RawOpt { log_debug, icon_theme, icon_size, height, action } = other;
        Opt { log_debug, config: TrayConfig { icon_theme, icon_size, height }, action: action.unwrap_or(Action::Run) }
    }
}
