//! Numeric-to-Chinese-uppercase currency formatting.
//!
//! `1234.56` becomes `壹仟贰佰叁拾肆元伍角陆分`. The integer part is
//! grouped in 4-digit segments joined by 亿/万; a leading `壹拾` in a
//! segment collapses to `拾`; runs of 零 are squeezed to one and trailing
//! 零 stripped before the 元 suffix. Zero cents with a nonzero integer
//! part get the 整 suffix; an all-zero amount is 零元整.
//!
//! Pure and total over non-negative amounts below 10^12 yuan with at
//! most two fractional digits. Negative or out-of-range input is a
//! validation error, never nonsense output.

use rust_decimal::prelude::*;
use rust_decimal::{Decimal, RoundingStrategy};

use crate::error::WorkflowError;

const DIGITS: [&str; 10] = [
    "零", "壹", "贰", "叁", "肆", "伍", "陆", "柒", "捌", "玖",
];
const UNITS: [&str; 4] = ["", "拾", "佰", "仟"];

/// One beyond the largest supported integer part: 10^12 yuan.
const YUAN_LIMIT: u64 = 1_0000_0000_0000;

/// Convert up to four digits (个/拾/佰/仟). Interior zeros collapse to a
/// single 零; `壹拾` is written 拾 only when 1 is the segment's leading
/// digit in the tens place.
fn convert_four(segment: &str) -> String {
    let len = segment.len();
    let mut result = String::new();
    for (i, ch) in segment.chars().enumerate() {
        let d = ch.to_digit(10).unwrap_or(0) as usize;
        let pos = len - 1 - i;
        if d != 0 {
            if d == 1 && pos == 1 && i == 0 {
                result.push('拾');
            } else {
                result.push_str(DIGITS[d]);
                result.push_str(UNITS[pos]);
            }
        } else if !result.is_empty() && !result.ends_with('零') {
            result.push('零');
        }
    }
    if result.is_empty() {
        DIGITS[0].to_string()
    } else {
        result
    }
}

/// Convert the yuan integer part, grouped as [亿][万][个] segments.
fn convert_integer(yuan: u64) -> String {
    if yuan == 0 {
        return DIGITS[0].to_string();
    }
    let s = yuan.to_string();
    let mut rest = s.as_str();
    let mut out = String::new();

    if rest.len() > 8 {
        let (yi, tail) = rest.split_at(rest.len() - 8);
        out.push_str(&convert_four(yi));
        out.push('亿');
        rest = tail;
    }
    if rest.len() > 4 {
        let (wan, tail) = rest.split_at(rest.len() - 4);
        let wan_str = convert_four(wan);
        if wan_str != DIGITS[0] {
            out.push_str(&wan_str);
            out.push('万');
        }
        rest = tail;
    }
    let ge = convert_four(rest);
    if ge != DIGITS[0] {
        out.push_str(&ge);
    }

    // Squeeze runs of 零 and strip a trailing 零.
    let mut squeezed = String::with_capacity(out.len());
    for ch in out.chars() {
        if ch == '零' && squeezed.ends_with('零') {
            continue;
        }
        squeezed.push(ch);
    }
    let trimmed = squeezed.trim_end_matches('零');
    if trimmed.is_empty() {
        DIGITS[0].to_string()
    } else {
        trimmed.to_string()
    }
}

/// Format a decimal amount as a Chinese uppercase currency string.
pub fn to_chinese_amount(amount: Decimal) -> Result<String, WorkflowError> {
    if amount < Decimal::ZERO {
        return Err(WorkflowError::validation(format!(
            "amount must be non-negative, got {}",
            amount
        )));
    }

    let rounded = amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
    let cents = (rounded * Decimal::from(100))
        .to_u64()
        .ok_or_else(|| WorkflowError::validation(format!("amount {} not representable", amount)))?;

    let yuan = cents / 100;
    if yuan >= YUAN_LIMIT {
        return Err(WorkflowError::validation(format!(
            "amount {} exceeds the supported range (< 10^12 yuan)",
            amount
        )));
    }

    if cents == 0 {
        return Ok("零元整".to_string());
    }

    let mut result = convert_integer(yuan);
    result.push('元');

    let jiao = ((cents % 100) / 10) as usize;
    let fen = (cents % 10) as usize;
    if jiao == 0 && fen == 0 {
        result.push('整');
    } else {
        if jiao != 0 {
            result.push_str(DIGITS[jiao]);
            result.push('角');
        }
        if fen != 0 {
            result.push_str(DIGITS[fen]);
            result.push('分');
        }
    }

    Ok(result)
}
