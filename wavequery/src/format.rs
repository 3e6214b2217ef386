// Copyright 2025 Cornell University
// released under BSD 3-Clause License
// author: Kevin Laeufer <laeufer@cornell.edu>
//! # Value Formatting
//! Conversions between binary, hex, decimal and octal renderings of signal values,
//! including two's complement interpretation. Numbers are arbitrary width.

use crate::{QueryError, Result, Value};
use num::{BigInt, BigUint, Num, One, Signed, Zero};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// How the input text of [`format_value`] and [`format_as_signed`] is to be read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InputFormat {
    /// Detect `0x`, `0b` and `0o` prefixes, fall back to decimal.
    #[default]
    Auto,
    Binary,
    Hex,
    Decimal,
    Octal,
}

/// Output radix of [`format_value`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Radix {
    Binary,
    #[default]
    Hex,
    Decimal,
    Octal,
}

/// Rendering of values returned by point and range queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueFormat {
    /// Natural text of the value.
    #[default]
    Auto,
    Int,
    Hex,
    Bin,
    String,
}

impl FromStr for InputFormat {
    type Err = QueryError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "auto" => Ok(InputFormat::Auto),
            "binary" => Ok(InputFormat::Binary),
            "hex" => Ok(InputFormat::Hex),
            "decimal" => Ok(InputFormat::Decimal),
            "octal" => Ok(InputFormat::Octal),
            other => Err(invalid_enum("from_format", other, "auto, binary, hex, decimal, octal")),
        }
    }
}

impl FromStr for Radix {
    type Err = QueryError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "binary" => Ok(Radix::Binary),
            "hex" => Ok(Radix::Hex),
            "decimal" => Ok(Radix::Decimal),
            "octal" => Ok(Radix::Octal),
            other => Err(invalid_enum("to_format", other, "binary, hex, decimal, octal")),
        }
    }
}

impl FromStr for ValueFormat {
    type Err = QueryError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "auto" => Ok(ValueFormat::Auto),
            "int" => Ok(ValueFormat::Int),
            "hex" => Ok(ValueFormat::Hex),
            "bin" => Ok(ValueFormat::Bin),
            "string" => Ok(ValueFormat::String),
            other => Err(invalid_enum("format", other, "auto, int, hex, bin, string")),
        }
    }
}

fn invalid_enum(name: &'static str, value: &str, valid: &str) -> QueryError {
    QueryError::InvalidParameter {
        name,
        reason: format!("`{value}` is not one of {valid}"),
    }
}

impl InputFormat {
    fn radix(&self) -> Option<u32> {
        match self {
            InputFormat::Auto => None,
            InputFormat::Binary => Some(2),
            InputFormat::Hex => Some(16),
            InputFormat::Decimal => Some(10),
            InputFormat::Octal => Some(8),
        }
    }
}

/// Result of [`format_value`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FormattedValue {
    pub original: String,
    pub formatted: String,
    #[serde(with = "serde_int::option")]
    pub numeric: Option<BigInt>,
    pub format: Radix,
}

/// Result of [`format_as_signed`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SignedValue {
    #[serde(serialize_with = "serde_int::serialize_unsigned")]
    pub unsigned: BigUint,
    #[serde(serialize_with = "serde_int::serialize")]
    pub signed: BigInt,
    pub hex: String,
    pub binary: String,
    pub is_negative: bool,
}

fn strip_prefix_ignore_case<'a>(text: &'a str, prefix: &str) -> Option<&'a str> {
    let head = text.get(..prefix.len())?;
    if head.eq_ignore_ascii_case(prefix) {
        Some(&text[prefix.len()..])
    } else {
        None
    }
}

fn radix_prefix(radix: u32) -> Option<&'static str> {
    match radix {
        2 => Some("0b"),
        8 => Some("0o"),
        16 => Some("0x"),
        _ => None,
    }
}

/// Parses digits in the given radix, with an optional sign and an optional matching
/// `0b`/`0o`/`0x` prefix. Surrounding whitespace is ignored.
fn parse_radix(text: &str, radix: u32) -> Option<BigInt> {
    let text = text.trim();
    let (negative, unsigned) = match text.as_bytes().first() {
        Some(b'-') => (true, &text[1..]),
        Some(b'+') => (false, &text[1..]),
        _ => (false, text),
    };
    let digits = radix_prefix(radix)
        .and_then(|p| strip_prefix_ignore_case(unsigned, p))
        .unwrap_or(unsigned);
    if digits.is_empty() || !digits.chars().all(|c| c.is_digit(radix)) {
        return None;
    }
    let magnitude = BigInt::from(BigUint::from_str_radix(digits, radix).ok()?);
    Some(if negative { -magnitude } else { magnitude })
}

/// Detects the radix from a `0x`, `0b` or `0o` prefix, defaulting to decimal.
fn detect_radix(text: &str) -> u32 {
    if strip_prefix_ignore_case(text, "0x").is_some() {
        16
    } else if strip_prefix_ignore_case(text, "0b").is_some() {
        2
    } else if strip_prefix_ignore_case(text, "0o").is_some() {
        8
    } else {
        10
    }
}

/// Parses a prefixed (`0x`, `0b`, `0o`) or decimal integer.
pub fn parse_integer(text: &str) -> Option<BigInt> {
    let trimmed = text.trim();
    let unsigned = trimmed.trim_start_matches(['-', '+']);
    parse_radix(trimmed, detect_radix(unsigned))
}

/// Maps `x`, `z` and `-` to `0` and reads the result as binary.
fn parse_four_state(text: &str) -> Option<BigInt> {
    if text.is_empty() || !text.chars().all(|c| "01xXzZ-".contains(c)) {
        return None;
    }
    let clean: String = text
        .chars()
        .map(|c| if c == '1' { '1' } else { '0' })
        .collect();
    BigUint::from_str_radix(&clean, 2).ok().map(BigInt::from)
}

/// Renders `value` with the python-style prefix of the radix, e.g. `-0x1f`.
fn to_prefixed(value: &BigInt, radix: u32, pad_digits: Option<usize>) -> String {
    let digits = value.magnitude().to_str_radix(radix);
    let prefix = radix_prefix(radix).unwrap_or("");
    if value.is_negative() {
        format!("-{prefix}{digits}")
    } else {
        match pad_digits {
            Some(width) => format!("{prefix}{digits:0>width$}"),
            None => format!("{prefix}{digits}"),
        }
    }
}

/// Converts `value` between radices. Never fails: text that cannot be read as a number is
/// returned unchanged with `numeric == None`.
pub fn format_value(
    value: &str,
    from_format: InputFormat,
    to_format: Radix,
    bitwidth: Option<u32>,
) -> FormattedValue {
    let numeric = match from_format.radix() {
        Some(radix) => parse_radix(value, radix),
        None => {
            let text = value.trim();
            match detect_radix(text) {
                10 => parse_radix(text, 10).or_else(|| parse_four_state(text)),
                radix => parse_radix(text, radix),
            }
        }
    };

    let Some(numeric) = numeric else {
        return FormattedValue {
            original: value.to_string(),
            formatted: value.to_string(),
            numeric: None,
            format: to_format,
        };
    };

    let bitwidth = bitwidth.filter(|w| *w > 0).map(|w| w as usize);
    let formatted = match to_format {
        Radix::Binary => to_prefixed(&numeric, 2, bitwidth),
        Radix::Hex => to_prefixed(&numeric, 16, bitwidth.map(|w| w.div_ceil(4))),
        Radix::Decimal => numeric.to_string(),
        Radix::Octal => to_prefixed(&numeric, 8, None),
    };

    FormattedValue {
        original: value.to_string(),
        formatted,
        numeric: Some(numeric),
        format: to_format,
    }
}

/// Interprets `value` as a `bitwidth` wide two's complement number.
pub fn format_as_signed(value: &str, bitwidth: u32, input_format: InputFormat) -> Result<SignedValue> {
    if bitwidth == 0 {
        return Err(QueryError::InvalidParameter {
            name: "bitwidth",
            reason: "needs to be at least 1".to_string(),
        });
    }
    let parsed = match input_format {
        // only hex and binary prefixes are detected here
        InputFormat::Auto => match detect_radix(value.trim()) {
            radix @ (2 | 16) => parse_radix(value, radix),
            _ => parse_radix(value, 10),
        },
        other => other.radix().and_then(|radix| parse_radix(value, radix)),
    };
    let invalid = |reason: &str| QueryError::InvalidValue {
        value: value.to_string(),
        reason: reason.to_string(),
    };
    let parsed = parsed.ok_or_else(|| invalid("not a number in the given format"))?;
    let unsigned = parsed
        .to_biguint()
        .ok_or_else(|| invalid("negative values have no unsigned interpretation"))?;

    let max_unsigned = (BigUint::one() << bitwidth) - BigUint::one();
    if unsigned > max_unsigned {
        return Err(QueryError::ValueOverflow {
            value: unsigned.to_string(),
            bitwidth,
        });
    }

    let sign_bit = BigUint::one() << (bitwidth - 1);
    let is_negative = !(&unsigned & &sign_bit).is_zero();
    let signed = if is_negative {
        BigInt::from(unsigned.clone()) - (BigInt::one() << bitwidth)
    } else {
        BigInt::from(unsigned.clone())
    };

    let hex_digits = (bitwidth as usize).div_ceil(4);
    let bin_digits = bitwidth as usize;
    Ok(SignedValue {
        hex: format!("0x{:0>hex_digits$}", unsigned.to_str_radix(16)),
        binary: format!("0b{:0>bin_digits$}", unsigned.to_str_radix(2)),
        unsigned,
        signed,
        is_negative,
    })
}

/// Renders a signal value for point and range queries.
pub fn render(value: &Value, format: ValueFormat) -> String {
    let numeric = || value.to_integer();
    match format {
        ValueFormat::Auto | ValueFormat::String => None,
        ValueFormat::Int => numeric().map(|n| n.to_string()),
        ValueFormat::Hex => numeric().map(|n| to_prefixed(&n, 16, None)),
        ValueFormat::Bin => numeric().map(|n| to_prefixed(&n, 2, None)),
    }
    .unwrap_or_else(|| value.to_string())
}

/// Serializes arbitrary width integers as JSON numbers when they fit into 64 bits and as
/// decimal strings otherwise.
pub(crate) mod serde_int {
    use num::{BigInt, BigUint, ToPrimitive};
    use serde::Serializer;

    pub fn serialize<S: Serializer>(value: &BigInt, s: S) -> Result<S::Ok, S::Error> {
        match value.to_i64() {
            Some(v) => s.serialize_i64(v),
            None => s.serialize_str(&value.to_string()),
        }
    }

    pub fn serialize_unsigned<S: Serializer>(value: &BigUint, s: S) -> Result<S::Ok, S::Error> {
        match value.to_u64() {
            Some(v) => s.serialize_u64(v),
            None => s.serialize_str(&value.to_string()),
        }
    }

    pub mod option {
        use num::BigInt;
        use serde::Serializer;

        pub fn serialize<S: Serializer>(value: &Option<BigInt>, s: S) -> Result<S::Ok, S::Error> {
            match value {
                Some(v) => super::serialize(v, s),
                None => s.serialize_none(),
            }
        }
    }
}
