//! Fixed-point cell encoding used by devicetree bindings.
//!
//! Values are written as integers in hundredths of a key unit. Negative
//! values are wrapped in parentheses (`(-100)`) because a bare unary minus
//! is not a valid cell inside `<...>`; the parentheses make it an expression
//! the devicetree compiler evaluates.

use crate::error::{LayoutError, Result};
use crate::model::Units;

pub fn encode(value: Units) -> String {
    let scaled = value.hundredths();
    if scaled >= 0 {
        scaled.to_string()
    } else {
        format!("({scaled})")
    }
}

/// Round `value` to hundredths, then encode it.
pub fn encode_f64(value: f64) -> Result<String> {
    Units::from_f64(value).map(encode).ok_or_else(|| LayoutError::MalformedNumber {
        token: value.to_string(),
    })
}

pub fn decode(token: &str) -> Result<Units> {
    let malformed = || LayoutError::MalformedNumber {
        token: token.to_string(),
    };
    let trimmed = token.trim();
    let inner = match (trimmed.strip_prefix('('), trimmed.ends_with(')')) {
        (Some(rest), true) => rest.strip_suffix(')').ok_or_else(malformed)?,
        (None, false) => trimmed,
        _ => return Err(malformed()),
    };
    inner
        .trim()
        .parse::<i64>()
        .map(Units::from_hundredths)
        .map_err(|_| malformed())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encodes_sign_with_parentheses() {
        assert_eq!(encode_f64(-1.0).unwrap(), "(-100)");
        assert_eq!(encode_f64(0.0).unwrap(), "0");
        assert_eq!(encode_f64(-0.0).unwrap(), "0");
        assert_eq!(encode_f64(1.25).unwrap(), "125");
        assert_eq!(encode(Units::from_hundredths(-5)), "(-5)");
    }

    #[test]
    fn encode_rounds_ties_away_from_zero() {
        assert_eq!(encode_f64(0.125).unwrap(), "13");
        assert_eq!(encode_f64(-0.125).unwrap(), "(-13)");
        assert!(encode_f64(f64::NAN).is_err());
    }

    #[test]
    fn decodes_plain_and_wrapped_tokens() {
        assert_eq!(decode("150").unwrap(), Units::from_hundredths(150));
        assert_eq!(decode("(-100)").unwrap(), Units::from_int(-1));
        assert_eq!(decode("( -25 )").unwrap(), Units::from_hundredths(-25));
        assert_eq!(decode("-7").unwrap(), Units::from_hundredths(-7));
    }

    #[test]
    fn rejects_unbalanced_or_non_numeric_tokens() {
        for token in ["(-100", "-100)", "()", "(", "abc", "1.5", ""] {
            assert!(
                matches!(decode(token), Err(LayoutError::MalformedNumber { .. })),
                "token {token:?} should be rejected"
            );
        }
    }

    #[test]
    fn decode_inverts_encode() {
        for hundredths in [-123_456, -100, -1, 0, 1, 29, 100, 150, 9_000] {
            let value = Units::from_hundredths(hundredths);
            assert_eq!(decode(&encode(value)).unwrap(), value);
        }
    }
}
