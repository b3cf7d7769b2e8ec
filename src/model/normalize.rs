use super::core::{Key, Layout, LayoutSet};
use super::units::Units;
use crate::error::{LayoutError, Result};

/// Smallest `x` and `y` over all keys.
pub fn origin_of(keys: &[Key]) -> Result<(Units, Units)> {
    let min_x = keys.iter().map(|key| key.x).min().ok_or(LayoutError::EmptyLayout)?;
    let min_y = keys.iter().map(|key| key.y).min().ok_or(LayoutError::EmptyLayout)?;
    Ok((min_x, min_y))
}

/// Shift keys in place so the smallest `x` and `y` become zero.
///
/// Rotation origins move by the same offset when present; absent origins stay
/// absent since they follow the key position anyway.
pub fn normalize_keys(keys: &mut [Key]) -> Result<()> {
    let (min_x, min_y) = origin_of(keys)?;
    for key in keys.iter_mut() {
        key.x = shift(key.x, min_x)?;
        key.y = shift(key.y, min_y)?;
        if let Some(rx) = key.rx.as_mut() {
            *rx = shift(*rx, min_x)?;
        }
        if let Some(ry) = key.ry.as_mut() {
            *ry = shift(*ry, min_y)?;
        }
    }
    Ok(())
}

fn shift(value: Units, origin: Units) -> Result<Units> {
    value.checked_sub(origin).ok_or_else(|| {
        LayoutError::malformed(format!(
            "coordinate {value} is out of range relative to origin {origin}"
        ))
    })
}

pub fn normalize(mut layout: Layout) -> Result<Layout> {
    normalize_keys(layout.keys_mut())?;
    Ok(layout)
}

pub fn normalize_set(set: LayoutSet) -> Result<LayoutSet> {
    let mut out = LayoutSet::new();
    for (name, layout) in set {
        out.insert(name, normalize(layout)?)?;
    }
    Ok(out)
}

pub fn is_normalized(layout: &Layout) -> bool {
    matches!(origin_of(layout.keys()), Ok((x, y)) if x.is_zero() && y.is_zero())
}
