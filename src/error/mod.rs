//! Error types shared by every codec in the crate.

mod types;

pub use types::{LayoutError, Result};
