//! ZMK devicetree representation of layout sets.

mod core;
pub mod tree;

pub use self::core::{PHYSICAL_LAYOUT_COMPATIBLE, PositionBinding, decode, decode_tree, encode};
pub use tree::{DeviceTree, DtsNode, PropertyItem, SourceNode, SourceTree};
