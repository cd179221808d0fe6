// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Comparison modes and the operator bitmask (§4.2).

use crate::numeric::coerce_to_number;
use flowlog_core::value::{LogValue, ValueType};
use std::cmp::Ordering;

/// How two template-evaluated operands are compared.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareMode {
    StringBased,
    NumericBased,
    TypeAware,
    TypeAndValueBased,
}

/// `op_mask` bit values -- {EQ, LT, GT} combine to form the six operators
/// named in §4.2 (`LT|GT` is `!=`).
pub mod op {
    pub const EQ: u8 = 1;
    pub const LT: u8 = 2;
    pub const GT: u8 = 4;
    pub const LE: u8 = LT | EQ;
    pub const GE: u8 = GT | EQ;
    pub const NE: u8 = LT | GT;
}

fn ordering_bit(ord: Ordering) -> u8 {
    match ord {
        Ordering::Equal => op::EQ,
        Ordering::Less => op::LT,
        Ordering::Greater => op::GT,
    }
}

fn compare_bytes(op_mask: u8, left: &[u8], right: &[u8]) -> bool {
    op_mask & ordering_bit(left.cmp(right)) != 0
}

/// NaN handling shared by numeric-based and type-aware fallback comparisons:
/// `!=` is true if either side is NaN, every other operator is false.
fn compare_numbers(op_mask: u8, left: f64, right: f64) -> bool {
    if left.is_nan() || right.is_nan() {
        return op_mask == op::NE;
    }
    let ord = left.partial_cmp(&right).unwrap_or(Ordering::Equal);
    op_mask & ordering_bit(ord) != 0
}

fn compare_type_and_value(op_mask: u8, left: &LogValue, right: &LogValue) -> bool {
    let strictly_equal = left.value_type == right.value_type && left.bytes == right.bytes;
    match op_mask {
        op::EQ => strictly_equal,
        op::NE => !strictly_equal,
        _ if left.value_type == right.value_type => compare_bytes(op_mask, &left.bytes, &right.bytes),
        _ => false,
    }
}

fn compare_type_aware(op_mask: u8, left: &LogValue, right: &LogValue) -> bool {
    if left.value_type.is_string_like() && right.value_type.is_string_like() {
        return compare_bytes(op_mask, &left.bytes, &right.bytes);
    }
    if left.value_type == ValueType::Null || right.value_type == ValueType::Null {
        let both_null = left.value_type == ValueType::Null && right.value_type == ValueType::Null;
        match op_mask {
            op::EQ => return both_null,
            op::NE => return left.value_type != right.value_type,
            _ => {}
        }
    }
    compare_numbers(op_mask, coerce_to_number(left), coerce_to_number(right))
}

/// Evaluate `left <op_mask> right` under `mode` (§4.2's "Comparison" node).
pub fn evaluate(mode: CompareMode, op_mask: u8, left: &LogValue, right: &LogValue) -> bool {
    match mode {
        CompareMode::StringBased => compare_bytes(op_mask, &left.bytes, &right.bytes),
        CompareMode::NumericBased => {
            compare_numbers(op_mask, coerce_to_number(left), coerce_to_number(right))
        }
        CompareMode::TypeAware => compare_type_aware(op_mask, left, right),
        CompareMode::TypeAndValueBased => compare_type_and_value(op_mask, left, right),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use yare::parameterized;

    #[parameterized(
        equal = { "abc", "abc", op::EQ, true },
        shorter_is_less = { "ab", "abc", op::LT, true },
        byte_order = { "b", "a", op::GT, true },
        not_equal = { "a", "b", op::NE, true },
    )]
    fn string_based_cases(left: &str, right: &str, op_mask: u8, expect: bool) {
        let got = evaluate(CompareMode::StringBased, op_mask, &LogValue::string(left), &LogValue::string(right));
        assert_eq!(got, expect);
    }

    #[test]
    fn numeric_based_parses_and_compares() {
        assert!(evaluate(CompareMode::NumericBased, op::LT, &LogValue::string("2"), &LogValue::string("10")));
    }

    #[test]
    fn numeric_nan_makes_ne_true_and_others_false() {
        let garbage = LogValue::string("nope");
        let five = LogValue::integer(5);
        assert!(evaluate(CompareMode::NumericBased, op::NE, &garbage, &five));
        assert!(!evaluate(CompareMode::NumericBased, op::EQ, &garbage, &five));
        assert!(!evaluate(CompareMode::NumericBased, op::LT, &garbage, &five));
    }

    #[test]
    fn type_aware_same_string_like_types_compare_as_bytes() {
        assert!(evaluate(CompareMode::TypeAware, op::EQ, &LogValue::string("x"), &LogValue::string("x")));
    }

    #[test]
    fn type_aware_null_vs_null_equal() {
        assert!(evaluate(CompareMode::TypeAware, op::EQ, &LogValue::null(), &LogValue::null()));
    }

    #[test]
    fn type_aware_null_vs_non_null_not_equal_by_type() {
        assert!(evaluate(CompareMode::TypeAware, op::NE, &LogValue::null(), &LogValue::integer(0)));
    }

    #[test]
    fn type_aware_falls_through_to_numeric_coercion() {
        assert!(evaluate(CompareMode::TypeAware, op::EQ, &LogValue::boolean(true), &LogValue::integer(1)));
    }

    #[test]
    fn type_and_value_requires_type_match() {
        assert!(!evaluate(CompareMode::TypeAndValueBased, op::EQ, &LogValue::string("1"), &LogValue::integer(1)));
        assert!(evaluate(CompareMode::TypeAndValueBased, op::NE, &LogValue::string("1"), &LogValue::integer(1)));
    }
}
