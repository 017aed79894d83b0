//! Type-safe price representation using decimal arithmetic.
//!
//! Prices are stored in whole currency units (dollars, not cents). Payment
//! processors expect minor units, so conversion happens only at that boundary.

use core::fmt;
use core::str::FromStr;

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

/// Errors that can occur when building a [`Price`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum PriceError {
    /// The input is not a decimal number.
    #[error("price must be a number (got '{0}')")]
    Invalid(String),
    /// The amount is below zero.
    #[error("price cannot be negative")]
    Negative,
    /// The amount has sub-cent digits.
    #[error("price can have at most 2 decimal places")]
    TooPrecise,
    /// The amount does not fit the stored column or minor units.
    #[error("price must be less than 10000000000")]
    Overflow,
}

/// Exclusive upper bound (10^10), matching the `NUMERIC(12, 2)` price column.
pub const PRICE_LIMIT: Decimal = Decimal::from_parts(0x540B_E400, 0x2, 0, false, 0);

/// A non-negative amount in major currency units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "Decimal", into = "Decimal")]
pub struct Price(Decimal);

impl Price {
    /// Create a price from a decimal amount.
    ///
    /// # Errors
    ///
    /// Returns `PriceError::Negative` if the amount is below zero,
    /// `PriceError::TooPrecise` if it has more than two decimal places and
    /// `PriceError::Overflow` if it reaches [`PRICE_LIMIT`].
    pub fn new(amount: Decimal) -> Result<Self, PriceError> {
        if amount.is_sign_negative() && !amount.is_zero() {
            return Err(PriceError::Negative);
        }
        if amount.normalize().scale() > 2 {
            return Err(PriceError::TooPrecise);
        }
        if amount >= PRICE_LIMIT {
            return Err(PriceError::Overflow);
        }
        Ok(Self(amount))
    }

    /// Parse a price from user input such as `"25"` or `"$19.99"`.
    ///
    /// # Errors
    ///
    /// Returns `PriceError::Invalid` if the input is not a number, otherwise
    /// whatever [`Price::new`] rejects.
    pub fn parse(s: &str) -> Result<Self, PriceError> {
        let trimmed = s.trim();
        let digits = trimmed.strip_prefix('$').unwrap_or(trimmed);
        let amount =
            Decimal::from_str(digits).map_err(|_| PriceError::Invalid(trimmed.to_owned()))?;
        Self::new(amount)
    }

    /// Build a price back from minor units (e.g., cents).
    ///
    /// # Errors
    ///
    /// Returns `PriceError::Negative` for negative amounts and
    /// `PriceError::Overflow` past [`PRICE_LIMIT`].
    pub fn from_minor_units(minor: i64) -> Result<Self, PriceError> {
        Self::new(Decimal::new(minor, 2).normalize())
    }

    /// Convert to minor units, rounding half away from zero.
    ///
    /// # Errors
    ///
    /// Returns `PriceError::Overflow` if the result does not fit in an `i64`.
    pub fn to_minor_units(&self) -> Result<i64, PriceError> {
        self.0
            .checked_mul(Decimal::ONE_HUNDRED)
            .map(|cents| cents.round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero))
            .and_then(|cents| cents.to_i64())
            .ok_or(PriceError::Overflow)
    }

    /// The amount in major units.
    #[must_use]
    pub const fn amount(&self) -> Decimal {
        self.0
    }

    /// Format for display with a currency symbol (e.g., "$19.99").
    #[must_use]
    pub fn display(&self, currency: CurrencyCode) -> String {
        format!("{}{:.2}", currency.symbol(), self.0)
    }
}

impl TryFrom<Decimal> for Price {
    type Error = PriceError;

    fn try_from(amount: Decimal) -> Result<Self, Self::Error> {
        Self::new(amount)
    }
}

impl From<Price> for Decimal {
    fn from(price: Price) -> Self {
        price.0
    }
}

impl fmt::Display for Price {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.2}", self.0)
    }
}

impl FromStr for Price {
    type Err = PriceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

#[cfg(feature = "postgres")]
impl sqlx::Type<sqlx::Postgres> for Price {
    fn type_info() -> sqlx::postgres::PgTypeInfo {
        <Decimal as sqlx::Type<sqlx::Postgres>>::type_info()
    }

    fn compatible(ty: &sqlx::postgres::PgTypeInfo) -> bool {
        <Decimal as sqlx::Type<sqlx::Postgres>>::compatible(ty)
    }
}

#[cfg(feature = "postgres")]
impl<'r> sqlx::Decode<'r, sqlx::Postgres> for Price {
    fn decode(value: sqlx::postgres::PgValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        let amount = <Decimal as sqlx::Decode<sqlx::Postgres>>::decode(value)?;
        Ok(Self::new(amount)?)
    }
}

#[cfg(feature = "postgres")]
impl sqlx::Encode<'_, sqlx::Postgres> for Price {
    fn encode_by_ref(
        &self,
        buf: &mut sqlx::postgres::PgArgumentBuffer,
    ) -> Result<sqlx::encode::IsNull, sqlx::error::BoxDynError> {
        <Decimal as sqlx::Encode<sqlx::Postgres>>::encode_by_ref(&self.0, buf)
    }
}

/// ISO 4217 currency codes accepted by the payment processor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum CurrencyCode {
    #[default]
    Usd,
    Eur,
    Gbp,
    Cad,
    Aud,
}

impl CurrencyCode {
    /// Lowercase code as sent to the payment processor (e.g., "usd").
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Usd => "usd",
            Self::Eur => "eur",
            Self::Gbp => "gbp",
            Self::Cad => "cad",
            Self::Aud => "aud",
        }
    }

    /// Display symbol for the currency.
    #[must_use]
    pub const fn symbol(&self) -> &'static str {
        match self {
            Self::Usd | Self::Cad | Self::Aud => "$",
            Self::Eur => "€",
            Self::Gbp => "£",
        }
    }
}

impl fmt::Display for CurrencyCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CurrencyCode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "usd" => Ok(Self::Usd),
            "eur" => Ok(Self::Eur),
            "gbp" => Ok(Self::Gbp),
            "cad" => Ok(Self::Cad),
            "aud" => Ok(Self::Aud),
            other => Err(format!("unsupported currency '{other}'")),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_minor_units_whole_dollars() {
        let price = Price::parse("25").unwrap();
        assert_eq!(price.to_minor_units().unwrap(), 2500);
    }

    #[test]
    fn test_minor_units_keeps_cents() {
        assert_eq!(Price::parse("10.10").unwrap().to_minor_units().unwrap(), 1010);
        assert_eq!(Price::parse("0.01").unwrap().to_minor_units().unwrap(), 1);
    }

    #[test]
    fn test_sub_cent_digits_rejected() {
        assert_eq!(Price::parse("19.995"), Err(PriceError::TooPrecise));
        assert_eq!(Price::parse("0.001"), Err(PriceError::TooPrecise));
        assert_eq!(
            Price::new(Decimal::new(19_995, 3)),
            Err(PriceError::TooPrecise)
        );
    }

    #[test]
    fn test_trailing_zeros_not_counted_as_precision() {
        let price = Price::parse("19.9900").unwrap();
        assert_eq!(price.to_minor_units().unwrap(), 1999);
    }

    #[test]
    fn test_limit_matches_column_width() {
        assert_eq!(PRICE_LIMIT, Decimal::from(10_000_000_000_i64));
        assert_eq!(Price::parse("99999999999"), Err(PriceError::Overflow));
        assert_eq!(Price::parse("10000000000"), Err(PriceError::Overflow));
        assert_eq!(
            Price::parse("9999999999.99").unwrap().to_minor_units().unwrap(),
            999_999_999_999
        );
        assert_eq!(
            Price::from_minor_units(1_000_000_000_000),
            Err(PriceError::Overflow)
        );
    }

    #[test]
    fn test_deserialize_rejects_sub_cent_digits() {
        let result: Result<Price, _> = serde_json::from_str("\"19.995\"");
        assert!(result.is_err());
    }

    #[test]
    fn test_from_minor_units() {
        let price = Price::from_minor_units(2500).unwrap();
        assert_eq!(price.amount(), Decimal::from(25));
        assert_eq!(price.to_string(), "25.00");
    }

    #[test]
    fn test_negative_rejected() {
        assert_eq!(Price::parse("-1"), Err(PriceError::Negative));
        assert_eq!(Price::from_minor_units(-100), Err(PriceError::Negative));
    }

    #[test]
    fn test_zero_allowed() {
        assert!(Price::parse("0").is_ok());
        assert!(Price::parse("-0").is_ok());
    }

    #[test]
    fn test_invalid_input() {
        assert!(matches!(Price::parse("ten"), Err(PriceError::Invalid(_))));
        assert!(matches!(Price::parse(""), Err(PriceError::Invalid(_))));
    }

    #[test]
    fn test_dollar_prefix_accepted() {
        assert_eq!(Price::parse("$19.99").unwrap().to_minor_units().unwrap(), 1999);
    }

    #[test]
    fn test_display_with_symbol() {
        let price = Price::parse("7.5").unwrap();
        assert_eq!(price.display(CurrencyCode::Usd), "$7.50");
        assert_eq!(price.display(CurrencyCode::Gbp), "£7.50");
    }

    #[test]
    fn test_deserialize_rejects_negative() {
        let result: Result<Price, _> = serde_json::from_str("-5");
        assert!(result.is_err());
        let price: Price = serde_json::from_str("12.5").unwrap();
        assert_eq!(price.to_minor_units().unwrap(), 1250);
    }

    #[test]
    fn test_currency_code_parse() {
        assert_eq!("USD".parse::<CurrencyCode>().unwrap(), CurrencyCode::Usd);
        assert_eq!(" eur ".parse::<CurrencyCode>().unwrap(), CurrencyCode::Eur);
        assert!("btc".parse::<CurrencyCode>().is_err());
        assert_eq!(CurrencyCode::default().as_str(), "usd");
    }
}
