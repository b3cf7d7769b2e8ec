//! Seams for the layout generator and diagram renderer.
//!
//! Neither is implemented here. Generators hand back center-based key
//! rectangles, which [`layouts_from_rects`] turns into a `"Default"` set.

use crate::error::{LayoutError, Result};
use crate::model::{Key, Layout, LayoutSet, Units};

/// A generated key, positioned by its center.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KeyRect {
    pub center_x: f64,
    pub center_y: f64,
    pub width: f64,
    pub height: f64,
}

impl KeyRect {
    pub fn new(center_x: f64, center_y: f64, width: f64, height: f64) -> Self {
        Self {
            center_x,
            center_y,
            width,
            height,
        }
    }

    /// Top-left key with explicit size, rounded to hundredths.
    pub fn to_key(&self) -> Result<Key> {
        let x = units(self.center_x - self.width / 2.0)?;
        let y = units(self.center_y - self.height / 2.0)?;
        Ok(Key::new(x, y).with_size(units(self.width)?, units(self.height)?))
    }
}

fn units(value: f64) -> Result<Units> {
    Units::from_f64(value).ok_or_else(|| generator_error(format!("non-finite coordinate {value}")))
}

fn generator_error(message: String) -> LayoutError {
    LayoutError::Collaborator {
        collaborator: "generator",
        message,
    }
}

/// Procedural layout source, for example an ortho or split grid builder.
pub trait LayoutGenerator {
    fn generate(&self) -> Result<Vec<KeyRect>>;
}

impl<F> LayoutGenerator for F
where
    F: Fn() -> Result<Vec<KeyRect>>,
{
    fn generate(&self) -> Result<Vec<KeyRect>> {
        self()
    }
}

/// Draws a layout, returning the encoded image (SVG or otherwise).
pub trait LayoutRenderer {
    fn render(&self, layout: &Layout, key_count: usize) -> Result<Vec<u8>>;
}

/// Convert generated rectangles into a single-layout set. Coordinates are
/// kept as generated; no normalization.
pub fn layouts_from_rects(rects: &[KeyRect]) -> Result<LayoutSet> {
    let keys = rects
        .iter()
        .map(KeyRect::to_key)
        .collect::<Result<Vec<_>>>()?;
    Ok(LayoutSet::single(Layout::new(keys)?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::DEFAULT_LAYOUT_NAME;

    fn h(value: i64) -> Units {
        Units::from_hundredths(value)
    }

    #[test]
    fn rects_become_top_left_keys() {
        let set = layouts_from_rects(&[
            KeyRect::new(0.5, 0.5, 1.0, 1.0),
            KeyRect::new(2.25, 0.5, 1.5, 1.0),
            KeyRect::new(0.0, 0.0, 1.0, 2.0),
        ])
        .unwrap();
        let keys = set.get(DEFAULT_LAYOUT_NAME).unwrap().keys();
        assert_eq!((keys[0].x, keys[0].y), (h(0), h(0)));
        assert_eq!((keys[1].x, keys[1].w), (h(150), Some(h(150))));
        assert_eq!((keys[2].x, keys[2].y, keys[2].h), (h(-50), h(-100), Some(h(200))));
    }

    #[test]
    fn closures_act_as_generators() {
        let generator = || -> Result<Vec<KeyRect>> { Ok(vec![KeyRect::new(1.0, 1.0, 1.0, 1.0)]) };
        let rects = generator.generate().unwrap();
        assert_eq!(layouts_from_rects(&rects).unwrap().len(), 1);
    }

    #[test]
    fn rejects_empty_and_non_finite_output() {
        assert!(matches!(layouts_from_rects(&[]), Err(LayoutError::EmptyLayout)));
        assert!(matches!(
            layouts_from_rects(&[KeyRect::new(f64::NAN, 0.0, 1.0, 1.0)]),
            Err(LayoutError::Collaborator { collaborator: "generator", .. })
        ));
        assert!(matches!(
            layouts_from_rects(&[KeyRect::new(0.0, 0.0, 0.0, 1.0)]),
            Err(LayoutError::InvalidKey { index: 0, .. })
        ));
    }
}
