// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Generic number coercion shared by the numeric-based and type-aware
//! comparison modes (§4.2).

use flowlog_core::value::{LogValue, ValueType};

/// Parse `bytes` as either an integer or a double, the "generic number
/// parser" named in §4.2. Returns `NaN` on failure so callers can apply the
/// NaN comparison rules directly instead of threading an `Option`.
pub fn parse_number(bytes: &[u8]) -> f64 {
    let s = String::from_utf8_lossy(bytes);
    let trimmed = s.trim();
    trimmed.parse::<f64>().unwrap_or(f64::NAN)
}

/// Coerce a typed value to a number per §4.2's type-aware rule: booleans to
/// 0/1, datetimes to their stored milliseconds-since-epoch, null to 0,
/// everything else through the generic parser.
pub fn coerce_to_number(value: &LogValue) -> f64 {
    match value.value_type {
        ValueType::Boolean => {
            if value.as_str() == "true" {
                1.0
            } else {
                0.0
            }
        }
        ValueType::Null => 0.0,
        ValueType::DateTime | ValueType::Integer | ValueType::Double => parse_number(&value.bytes),
        ValueType::String | ValueType::Json | ValueType::List | ValueType::Bytes | ValueType::Protobuf => {
            parse_number(&value.bytes)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use yare::parameterized;

    #[parameterized(
        integer = { "42", 42.0 },
        double = { "3.5", 3.5 },
        garbage = { "nope", f64::NAN },
        whitespace = { "  7  ", 7.0 },
    )]
    fn parse_number_cases(raw: &str, expect: f64) {
        let got = parse_number(raw.as_bytes());
        if expect.is_nan() {
            assert!(got.is_nan());
        } else {
            assert_eq!(got, expect);
        }
    }

    #[test]
    fn boolean_coerces_to_zero_or_one() {
        assert_eq!(coerce_to_number(&LogValue::boolean(true)), 1.0);
        assert_eq!(coerce_to_number(&LogValue::boolean(false)), 0.0);
    }

    #[test]
    fn null_coerces_to_zero() {
        assert_eq!(coerce_to_number(&LogValue::null()), 0.0);
    }
}
