// 🧽 Operator Library - text normalization primitives
// Small pure functions the rule table composes per column

use crate::error::{EtlError, Result};
use encoding_rs::{UTF_8, WINDOWS_1252};
use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

/// Width used by `zero_pad` for cooperative and branch codes
pub const ZERO_PAD_WIDTH: usize = 4;

// ============================================================================
// OPERATOR
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    ZeroPad,
    Uppercase,
    Reencode,
    StripDiacriticsAndSymbols,
}

impl Operator {
    pub const ALL: [Operator; 4] = [
        Operator::ZeroPad,
        Operator::Uppercase,
        Operator::Reencode,
        Operator::StripDiacriticsAndSymbols,
    ];

    /// Name used in the rule table
    pub fn name(&self) -> &'static str {
        match self {
            Operator::ZeroPad => "zero_pad",
            Operator::Uppercase => "uppercase",
            Operator::Reencode => "reencode",
            Operator::StripDiacriticsAndSymbols => "strip_diacritics_and_symbols",
        }
    }

    /// Look up an operator by its rule-table name
    pub fn from_name(name: &str) -> Option<Operator> {
        Operator::ALL.iter().copied().find(|op| op.name() == name)
    }

    /// Apply this operator to a value
    pub fn apply(&self, value: &str) -> Result<String> {
        match self {
            Operator::ZeroPad => Ok(zero_pad(value)),
            Operator::Uppercase => Ok(uppercase(value)),
            Operator::Reencode => reencode(value),
            Operator::StripDiacriticsAndSymbols => Ok(strip_diacritics_and_symbols(value)),
        }
    }
}

// ============================================================================
// OPERATORS
// ============================================================================

/// Left-pad with '0' to `ZERO_PAD_WIDTH` characters. Longer input is kept as is.
pub fn zero_pad(value: &str) -> String {
    let len = value.chars().count();
    if len >= ZERO_PAD_WIDTH {
        return value.to_string();
    }

    let mut padded = "0".repeat(ZERO_PAD_WIDTH - len);
    padded.push_str(value);
    padded
}

/// Locale-invariant Unicode uppercase
pub fn uppercase(value: &str) -> String {
    value.to_uppercase()
}

/// Repair text that was UTF-8 on the wire but decoded as Windows-1252.
///
/// The value is encoded back to single-byte form and the bytes are decoded
/// as UTF-8, then title-cased: `"CRÃ©DITO"` → `"Crédito"`.
///
/// Fails with `MalformedInput` when a character has no Windows-1252 byte
/// or when the recovered bytes are not valid UTF-8.
pub fn reencode(value: &str) -> Result<String> {
    let (bytes, _, unmappable) = WINDOWS_1252.encode(value);
    if unmappable {
        return Err(EtlError::MalformedInput {
            value: value.to_string(),
            reason: "character not representable in windows-1252".to_string(),
        });
    }

    let decoded = UTF_8
        .decode_without_bom_handling_and_without_replacement(&bytes)
        .ok_or_else(|| EtlError::MalformedInput {
            value: value.to_string(),
            reason: "re-encoded bytes are not valid utf-8".to_string(),
        })?;

    Ok(title_case(&decoded))
}

/// Decompose, drop combining marks, keep only ASCII letters, digits and spaces.
/// Total and idempotent.
pub fn strip_diacritics_and_symbols(value: &str) -> String {
    value
        .nfd()
        .filter(|c| !is_combining_mark(*c))
        .filter(|c| c.is_ascii_alphanumeric() || *c == ' ')
        .collect()
}

/// First letter of every alphabetic run upper, the rest lower
fn title_case(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut in_word = false;

    for c in value.chars() {
        if c.is_alphabetic() {
            if in_word {
                out.extend(c.to_lowercase());
            } else {
                out.extend(c.to_uppercase());
            }
            in_word = true;
        } else {
            out.push(c);
            in_word = false;
        }
    }

    out
}

// ============================================================================
// TESTS
// ============================================================================
