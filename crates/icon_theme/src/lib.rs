//! Lookup of icon files following the [freedesktop.org Icon Theme Specification], restricted to
//! `.png` icons.
//!
//! [freedesktop.org Icon Theme Specification]: https://specifications.freedesktop.org/icon-theme-spec/latest/

pub mod basedirs;

mod error;
pub use error::*;

pub mod lookup;

mod theme;
pub use theme::*;

mod themes;
pub use themes::*;
