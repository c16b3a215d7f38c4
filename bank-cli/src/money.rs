//! Decimal-string parsing into [`MinorUnits`], and the input-validation contract the core assumes
//! its caller already enforced (`WrongArguments`).

use bank_core::{BankError, MinorUnits, Result};

/// Parses a non-negative decimal amount with at most two fractional digits (e.g. `"12.34"`,
/// `"0"`, `"7.5"`) into minor units (cents). Anything else (negative amounts, more than two
/// fractional digits, empty input, garbage) is `WrongArguments`.
pub fn parse_decimal_to_minor_units(raw: &str) -> Result<MinorUnits> {
    let raw = raw.trim();
    if raw.is_empty() || raw.starts_with('-') {
        return Err(BankError::WrongArguments);
    }

    let (whole, frac) = match raw.split_once('.') {
        Some((whole, frac)) => (whole, frac),
        None => (raw, ""),
    };

    if frac.len() > 2 || (whole.is_empty() && frac.is_empty()) {
        return Err(BankError::WrongArguments);
    }

    let whole: u64 = if whole.is_empty() {
        0
    } else {
        whole.parse().map_err(|_| BankError::WrongArguments)?
    };
    let cents: u64 = match frac.len() {
        0 => 0,
        1 => frac.parse::<u64>().map_err(|_| BankError::WrongArguments)? * 10,
        2 => frac.parse().map_err(|_| BankError::WrongArguments)?,
        _ => unreachable!("checked above"),
    };

    whole
        .checked_mul(100)
        .and_then(|v| v.checked_add(cents))
        .map(MinorUnits)
        .ok_or(BankError::WrongArguments)
}

/// Rejects identifiers the core would otherwise accept verbatim but that are almost certainly
/// caller mistakes: empty strings and strings that are only whitespace.
pub fn validate_identifier(raw: &str) -> Result<&str> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        Err(BankError::WrongArguments)
    } else {
        Ok(trimmed)
    }
}
