//! Terminal presentation: markdown styling and the CLI theme

pub mod markdown;
pub mod theme;

pub use markdown::format_markdown;
pub use theme::Theme;
