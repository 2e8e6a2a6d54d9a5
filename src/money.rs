//! Money
//!
//! An immutable `(amount, currency)` pair. Amounts are [`Decimal`] so no
//! floating point drift enters discount arithmetic; currencies come from the
//! ISO table shipped with `rusty_money`.

use std::{cmp::Ordering, fmt};

use rust_decimal::{Decimal, RoundingStrategy};
use rusty_money::{Findable, iso::Currency};
use thiserror::Error;

/// Errors raised by money arithmetic.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MoneyError {
    /// Two amounts in different currencies were combined or compared.
    #[error("currency mismatch: expected {expected}, found {actual}")]
    CurrencyMismatch {
        /// Currency of the left-hand operand.
        expected: &'static str,

        /// Currency of the right-hand operand.
        actual: &'static str,
    },

    /// The currency code is not an ISO 4217 code.
    #[error("unknown currency code: {0}")]
    UnknownCurrency(String),

    /// The result does not fit a decimal.
    #[error("money arithmetic overflowed")]
    Overflow,
}

/// A monetary amount in a single currency.
#[derive(Clone, Copy)]
pub struct Money {
    amount: Decimal,
    currency: &'static Currency,
}

impl Money {
    /// Creates money from a decimal amount.
    pub const fn new(amount: Decimal, currency: &'static Currency) -> Self {
        Self { amount, currency }
    }

    /// Zero in the given currency.
    pub const fn zero(currency: &'static Currency) -> Self {
        Self::new(Decimal::ZERO, currency)
    }

    /// Creates money from an ISO currency code such as `"TRY"`.
    ///
    /// # Errors
    ///
    /// Returns [`MoneyError::UnknownCurrency`] if the code is not recognised.
    pub fn from_code(amount: Decimal, code: &str) -> Result<Self, MoneyError> {
        Ok(Self::new(amount, find_currency(code)?))
    }

    /// The decimal amount.
    pub const fn amount(&self) -> Decimal {
        self.amount
    }

    /// The currency.
    pub const fn currency(&self) -> &'static Currency {
        self.currency
    }

    /// The ISO alpha code of the currency.
    pub fn currency_code(&self) -> &'static str {
        self.currency.iso_alpha_code
    }

    /// Whether both values share a currency.
    pub fn same_currency(&self, other: &Money) -> bool {
        self.currency_code() == other.currency_code()
    }

    /// Whether the amount is zero.
    pub fn is_zero(&self) -> bool {
        self.amount.is_zero()
    }

    /// Whether the amount is strictly greater than zero.
    pub fn is_positive(&self) -> bool {
        self.amount > Decimal::ZERO
    }

    /// Adds two amounts of the same currency.
    ///
    /// # Errors
    ///
    /// Returns an error on currency mismatch or overflow.
    pub fn add(self, other: Money) -> Result<Money, MoneyError> {
        self.ensure_same_currency(&other)?;

        let amount = self
            .amount
            .checked_add(other.amount)
            .ok_or(MoneyError::Overflow)?;

        Ok(Self::new(amount, self.currency))
    }

    /// Subtracts an amount of the same currency.
    ///
    /// # Errors
    ///
    /// Returns an error on currency mismatch or overflow.
    pub fn sub(self, other: Money) -> Result<Money, MoneyError> {
        self.ensure_same_currency(&other)?;

        let amount = self
            .amount
            .checked_sub(other.amount)
            .ok_or(MoneyError::Overflow)?;

        Ok(Self::new(amount, self.currency))
    }

    /// Multiplies the amount by a scalar.
    ///
    /// # Errors
    ///
    /// Returns [`MoneyError::Overflow`] if the product does not fit.
    pub fn mul(self, factor: Decimal) -> Result<Money, MoneyError> {
        let amount = self
            .amount
            .checked_mul(factor)
            .ok_or(MoneyError::Overflow)?;

        Ok(Self::new(amount, self.currency))
    }

    /// Divides the amount by a scalar.
    ///
    /// # Errors
    ///
    /// Returns [`MoneyError::Overflow`] when dividing by zero or on overflow.
    pub fn div(self, divisor: Decimal) -> Result<Money, MoneyError> {
        let amount = self
            .amount
            .checked_div(divisor)
            .ok_or(MoneyError::Overflow)?;

        Ok(Self::new(amount, self.currency))
    }

    /// Compares two amounts of the same currency.
    ///
    /// # Errors
    ///
    /// Returns [`MoneyError::CurrencyMismatch`] if currencies differ.
    pub fn compare(&self, other: &Money) -> Result<Ordering, MoneyError> {
        self.ensure_same_currency(other)?;

        Ok(self.amount.cmp(&other.amount))
    }

    /// The smaller of two amounts of the same currency.
    ///
    /// # Errors
    ///
    /// Returns [`MoneyError::CurrencyMismatch`] if currencies differ.
    pub fn min(self, other: Money) -> Result<Money, MoneyError> {
        Ok(match self.compare(&other)? {
            Ordering::Greater => other,
            Ordering::Less | Ordering::Equal => self,
        })
    }

    /// Rounds to the currency's minor unit, midpoints away from zero.
    #[must_use]
    pub fn round_to_currency(self) -> Money {
        let amount = self
            .amount
            .round_dp_with_strategy(self.currency.exponent, RoundingStrategy::MidpointAwayFromZero);

        Self::new(amount, self.currency)
    }

    /// Drops digits past the currency's minor unit.
    #[must_use]
    pub fn truncate_to_currency(self) -> Money {
        let amount = self
            .amount
            .round_dp_with_strategy(self.currency.exponent, RoundingStrategy::ToZero);

        Self::new(amount, self.currency)
    }

    fn ensure_same_currency(&self, other: &Money) -> Result<(), MoneyError> {
        if self.same_currency(other) {
            Ok(())
        } else {
            Err(MoneyError::CurrencyMismatch {
                expected: self.currency_code(),
                actual: other.currency_code(),
            })
        }
    }
}

impl PartialEq for Money {
    fn eq(&self, other: &Self) -> bool {
        self.same_currency(other) && self.amount == other.amount
    }
}

impl Eq for Money {}

impl fmt::Debug for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Money")
            .field("amount", &self.amount)
            .field("currency", &self.currency_code())
            .finish()
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.amount, self.currency_code())
    }
}

/// Look up an ISO currency by its alpha code.
///
/// # Errors
///
/// Returns [`MoneyError::UnknownCurrency`] if the code is not recognised.
pub fn find_currency(code: &str) -> Result<&'static Currency, MoneyError> {
    Currency::find(code).ok_or_else(|| MoneyError::UnknownCurrency(code.to_string()))
}
