//! Physical layout data model.
//!
//! Codecs build these types on decode and read them on encode; the
//! normalizer is the only code that rewrites coordinates.

mod core;
mod normalize;
mod units;

pub use self::core::{DEFAULT_LAYOUT_NAME, Key, Layout, LayoutSet};
pub use normalize::{is_normalized, normalize, normalize_keys, normalize_set, origin_of};
pub use units::Units;
