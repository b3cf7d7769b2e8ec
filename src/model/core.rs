use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use super::units::Units;
use crate::error::{LayoutError, Result};

/// Name given to a layout that was not declared under an explicit display name.
pub const DEFAULT_LAYOUT_NAME: &str = "Default";

/// One physical key: the unrotated bounding box plus an optional rotation.
///
/// Optional fields distinguish "absent" from an explicit value so encoders can
/// omit what the input omitted. Use the accessor methods to read effective
/// values with defaults applied.
///
/// Equality compares the described rectangle, not the representation: an
/// absent width equals an explicit width of 1, and the rotation origin only
/// takes part when the key is actually rotated.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Key {
    pub x: Units,
    pub y: Units,
    #[serde(default, skip_serializing_if = "is_default_size")]
    pub w: Option<Units>,
    #[serde(default, skip_serializing_if = "is_default_size")]
    pub h: Option<Units>,
    #[serde(default, skip_serializing_if = "is_default_rotation")]
    pub r: Option<Units>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rx: Option<Units>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ry: Option<Units>,
}

fn is_default_size(value: &Option<Units>) -> bool {
    value.is_none_or(|v| v == Units::ONE)
}

fn is_default_rotation(value: &Option<Units>) -> bool {
    value.is_none_or(Units::is_zero)
}

impl Key {
    pub fn new(x: Units, y: Units) -> Self {
        Self {
            x,
            y,
            w: None,
            h: None,
            r: None,
            rx: None,
            ry: None,
        }
    }

    pub fn with_size(mut self, w: Units, h: Units) -> Self {
        self.w = Some(w);
        self.h = Some(h);
        self
    }

    pub fn with_rotation(mut self, r: Units) -> Self {
        self.r = Some(r);
        self
    }

    pub fn with_origin(mut self, rx: Units, ry: Units) -> Self {
        self.rx = Some(rx);
        self.ry = Some(ry);
        self
    }

    pub fn w(&self) -> Units {
        self.w.unwrap_or(Units::ONE)
    }

    pub fn h(&self) -> Units {
        self.h.unwrap_or(Units::ONE)
    }

    pub fn r(&self) -> Units {
        self.r.unwrap_or(Units::ZERO)
    }

    pub fn rx(&self) -> Units {
        self.rx.unwrap_or(self.x)
    }

    pub fn ry(&self) -> Units {
        self.ry.unwrap_or(self.y)
    }

    pub fn is_rotated(&self) -> bool {
        !self.r().is_zero()
    }

    /// First constraint this key breaks, if any.
    pub fn violation(&self) -> Option<&'static str> {
        if self.w.is_some_and(|w| w <= Units::ZERO) {
            return Some("width must be positive");
        }
        if self.h.is_some_and(|h| h <= Units::ZERO) {
            return Some("height must be positive");
        }
        None
    }
}

impl PartialEq for Key {
    fn eq(&self, other: &Self) -> bool {
        let same_box = self.x == other.x
            && self.y == other.y
            && self.w() == other.w()
            && self.h() == other.h()
            && self.r() == other.r();
        same_box && (!self.is_rotated() || (self.rx() == other.rx() && self.ry() == other.ry()))
    }
}

impl Eq for Key {}

/// Ordered, non-empty sequence of keys. The position of a key is its index
/// in firmware and in rendered diagrams.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Layout {
    keys: Vec<Key>,
}

impl Layout {
    pub fn new(keys: Vec<Key>) -> Result<Self> {
        if keys.is_empty() {
            return Err(LayoutError::EmptyLayout);
        }
        if let Some((index, reason)) = keys
            .iter()
            .enumerate()
            .find_map(|(index, key)| key.violation().map(|reason| (index, reason)))
        {
            return Err(LayoutError::InvalidKey { index, reason });
        }
        Ok(Self { keys })
    }

    pub fn keys(&self) -> &[Key] {
        &self.keys
    }

    /// Mutable access for editors. Coordinates may leave the normalized range;
    /// encoders write whatever the keys currently hold.
    pub fn keys_mut(&mut self) -> &mut [Key] {
        &mut self.keys
    }

    pub fn into_keys(self) -> Vec<Key> {
        self.keys
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

/// Display name to layout mapping, iterated in insertion order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LayoutSet {
    layouts: IndexMap<String, Layout>,
}

impl LayoutSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set holding a single layout under [`DEFAULT_LAYOUT_NAME`].
    pub fn single(layout: Layout) -> Self {
        let mut layouts = IndexMap::new();
        layouts.insert(DEFAULT_LAYOUT_NAME.to_string(), layout);
        Self { layouts }
    }

    /// Insert a layout, replacing and returning any layout already stored
    /// under the same name.
    pub fn insert(&mut self, name: impl Into<String>, layout: Layout) -> Result<Option<Layout>> {
        let name = name.into();
        if name.is_empty() {
            return Err(LayoutError::malformed("layout display name is empty"));
        }
        Ok(self.layouts.insert(name, layout))
    }

    pub fn get(&self, name: &str) -> Option<&Layout> {
        self.layouts.get(name)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut Layout> {
        self.layouts.get_mut(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.layouts.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Layout)> {
        self.layouts.iter().map(|(name, layout)| (name.as_str(), layout))
    }

    pub fn len(&self) -> usize {
        self.layouts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layouts.is_empty()
    }
}

impl IntoIterator for LayoutSet {
    type Item = (String, Layout);
    type IntoIter = indexmap::map::IntoIter<String, Layout>;

    fn into_iter(self) -> Self::IntoIter {
        self.layouts.into_iter()
    }
}
