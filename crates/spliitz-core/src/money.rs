//! # Money
//!
//! Amounts are whole cents held in an `i64`. Parsing and formatting go
//! through integer arithmetic only; there is no floating point anywhere in
//! the money path.

use crate::{Result, SpliitzError};
use serde::{Deserialize, Serialize};
use std::fmt;

/// An amount of money in cents.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Amount(i64);

impl Amount {
    /// Zero cents.
    pub const ZERO: Amount = Amount(0);

    /// Construct from a number of cents.
    #[must_use]
    pub const fn from_cents(cents: i64) -> Self {
        Self(cents)
    }

    /// The raw number of cents.
    #[must_use]
    pub const fn cents(self) -> i64 {
        self.0
    }

    #[must_use]
    pub fn is_zero(self) -> bool {
        self.0 == 0
    }

    #[must_use]
    pub fn is_positive(self) -> bool {
        self.0 > 0
    }

    #[must_use]
    pub fn is_negative(self) -> bool {
        self.0 < 0
    }

    #[must_use]
    pub fn checked_add(self, other: Amount) -> Option<Amount> {
        self.0.checked_add(other.0).map(Amount)
    }

    #[must_use]
    pub fn checked_sub(self, other: Amount) -> Option<Amount> {
        self.0.checked_sub(other.0).map(Amount)
    }

    #[must_use]
    pub fn checked_neg(self) -> Option<Amount> {
        self.0.checked_neg().map(Amount)
    }

    /// Sum a sequence of amounts, failing on overflow.
    pub fn sum<I>(amounts: I) -> Result<Amount>
    where
        I: IntoIterator<Item = Amount>,
    {
        amounts
            .into_iter()
            .try_fold(Amount::ZERO, |acc, a| acc.checked_add(a))
            .ok_or(SpliitzError::Overflow)
    }

    /// Parse a decimal string such as `"12"`, `"12.5"` or `"-0.05"`.
    ///
    /// At most two fraction digits are accepted. A trailing or leading dot
    /// is rejected.
    pub fn parse(input: &str) -> Result<Amount> {
        let invalid = || SpliitzError::InvalidAmount(input.to_string());

        let s = input.trim();
        let (negative, digits) = match s.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, s),
        };

        let (whole, frac) = match digits.split_once('.') {
            Some((w, f)) if !f.is_empty() => (w, f),
            Some(_) => return Err(invalid()),
            None => (digits, ""),
        };

        if whole.is_empty() || !whole.bytes().all(|b| b.is_ascii_digit()) {
            return Err(invalid());
        }
        if frac.len() > 2 || !frac.bytes().all(|b| b.is_ascii_digit()) {
            return Err(invalid());
        }

        let whole: i64 = whole.parse().map_err(|_| invalid())?;
        let frac_cents: i64 = match frac.len() {
            0 => 0,
            1 => frac.parse::<i64>().map_err(|_| invalid())? * 10,
            _ => frac.parse::<i64>().map_err(|_| invalid())?,
        };

        let cents = whole
            .checked_mul(100)
            .and_then(|c| c.checked_add(frac_cents))
            .ok_or_else(invalid)?;

        Ok(Amount(if negative { -cents } else { cents }))
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        write!(f, "{}{}.{:02}", sign, abs / 100, abs % 100)
    }
}

impl std::str::FromStr for Amount {
    type Err = SpliitzError;

    fn from_str(s: &str) -> Result<Self> {
        Amount::parse(s)
    }
}

/// Split `total` into `n` shares that sum to exactly `total`.
///
/// Leftover cents are handed out one each to the leading shares, so no two
/// shares differ by more than one cent.
pub fn split_evenly(total: Amount, n: usize) -> Result<Vec<Amount>> {
    if n == 0 {
        return Err(SpliitzError::NoSplits);
    }
    let count = i64::try_from(n).map_err(|_| SpliitzError::Overflow)?;
    let base = total.0.div_euclid(count);
    let remainder = total.0.rem_euclid(count);

    Ok((0..count)
        .map(|i| Amount(if i < remainder { base + 1 } else { base }))
        .collect())
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn parse_accepts_common_forms() {
        assert_eq!(Amount::parse("12").ok(), Some(Amount(1200)));
        assert_eq!(Amount::parse("12.3").ok(), Some(Amount(1230)));
        assert_eq!(Amount::parse("12.34").ok(), Some(Amount(1234)));
        assert_eq!(Amount::parse(" 0.05 ").ok(), Some(Amount(5)));
        assert_eq!(Amount::parse("-3.50").ok(), Some(Amount(-350)));
    }

    #[test]
    fn parse_rejects_malformed() {
        for bad in ["", "-", "abc", "1.234", "1.", ".5", "1,50", "1.2x", "--1"] {
            assert!(Amount::parse(bad).is_err(), "{bad:?} should be rejected");
        }
    }

    #[test]
    fn display_pads_cents() {
        assert_eq!(Amount(1205).to_string(), "12.05");
        assert_eq!(Amount(-5).to_string(), "-0.05");
        assert_eq!(Amount(0).to_string(), "0.00");
    }

    #[test]
    fn split_hands_remainder_to_leading_shares() {
        let shares = split_evenly(Amount(1000), 3).unwrap_or_default();
        assert_eq!(shares, vec![Amount(334), Amount(333), Amount(333)]);
    }

    #[test]
    fn split_into_zero_shares_fails() {
        assert!(split_evenly(Amount(100), 0).is_err());
    }

    #[test]
    fn sum_detects_overflow() {
        let result = Amount::sum([Amount(i64::MAX), Amount(1)]);
        assert_eq!(result, Err(SpliitzError::Overflow));
    }

    proptest! {
        #[test]
        fn split_sums_to_total(cents in -10_000_000i64..10_000_000, n in 1usize..40) {
            let shares = split_evenly(Amount(cents), n).unwrap_or_default();
            prop_assert_eq!(shares.len(), n);
            prop_assert_eq!(Amount::sum(shares.iter().copied()), Ok(Amount(cents)));

            let max = shares.iter().max().map(|a| a.cents()).unwrap_or(0);
            let min = shares.iter().min().map(|a| a.cents()).unwrap_or(0);
            prop_assert!(max - min <= 1);
        }

        #[test]
        fn display_parses_back(cents in -1_000_000_000i64..1_000_000_000) {
            let text = Amount(cents).to_string();
            prop_assert_eq!(Amount::parse(&text), Ok(Amount(cents)));
        }
    }
}
