//! QMK-like JSON representation of layout sets.

mod core;
mod format;

pub use self::core::{decode, encode};
pub use format::RowFormatter;
