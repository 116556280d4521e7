//! Authorization grants and their predicate interpreter
//!
//! An authorization is created once under a threshold signature and then
//! lets the account perform many calls without further signatures, as long
//! as every call payload satisfies all of the grant's predicates and the
//! grant has not expired.
//!
//! ## Predicates
//!
//! Each predicate reads `field_length` bytes at `field_offset` of the
//! transaction payload and compares them with a 32-byte bound:
//!
//! - **Equal**: the field equals the trailing `field_length` bytes of the bound
//! - **LessOrEqual**: the field, read as a big-endian integer, is at most the bound
//! - **DailySumLessOrEqual**: the running total for the current UTC day,
//!   including this call, is at most the bound
//!
//! Evaluation is split into a check phase ([`Authorization::evaluate`]) and an
//! apply phase ([`Authorization::record`]) so that a violated rule never
//! leaves a partially updated daily total behind.

use crate::types::WORD_LEN;
use crate::{Error, Result};
use alloy_primitives::{B256, U256};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Comparison applied by a predicate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Comparison {
    /// Byte-exact match
    Equal,
    /// Numeric upper bound per call
    LessOrEqual,
    /// Numeric upper bound on the sum of all calls in one UTC day
    DailySumLessOrEqual,
}

impl Comparison {
    /// Wire code of the comparison
    pub const fn code(self) -> u64 {
        match self {
            Comparison::Equal => 1,
            Comparison::LessOrEqual => 2,
            Comparison::DailySumLessOrEqual => 4,
        }
    }

    /// Parse a wire code
    pub fn from_code(code: u64) -> Result<Self> {
        match code {
            1 => Ok(Comparison::Equal),
            2 => Ok(Comparison::LessOrEqual),
            4 => Ok(Comparison::DailySumLessOrEqual),
            other => Err(Error::InvalidPredicate(format!(
                "unknown comparison code {}",
                other
            ))),
        }
    }
}

impl fmt::Display for Comparison {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Comparison::Equal => write!(f, "=="),
            Comparison::LessOrEqual => write!(f, "<="),
            Comparison::DailySumLessOrEqual => write!(f, "daily <="),
        }
    }
}

/// One rule of an authorization
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Predicate {
    /// Byte offset of the field in the transaction payload
    pub field_offset: u32,
    /// Field length in bytes (1..=32)
    pub field_length: u32,
    /// Comparison to apply
    pub comparison: Comparison,
    /// Right-aligned bound
    pub bound: B256,
}

impl Predicate {
    /// Create a predicate, rejecting unusable field lengths
    pub fn new(field_offset: u32, field_length: u32, comparison: Comparison, bound: B256) -> Result<Self> {
        let predicate = Self {
            field_offset,
            field_length,
            comparison,
            bound,
        };
        predicate.validate()?;
        Ok(predicate)
    }

    /// Field must equal the trailing bytes of `bound`
    pub fn equal(field_offset: u32, field_length: u32, bound: B256) -> Result<Self> {
        Self::new(field_offset, field_length, Comparison::Equal, bound)
    }

    /// Field must not exceed `bound`
    pub fn less_or_equal(field_offset: u32, field_length: u32, bound: U256) -> Result<Self> {
        Self::new(field_offset, field_length, Comparison::LessOrEqual, bound.into())
    }

    /// Daily sum of the field must not exceed `bound`
    pub fn daily_sum_less_or_equal(field_offset: u32, field_length: u32, bound: U256) -> Result<Self> {
        Self::new(
            field_offset,
            field_length,
            Comparison::DailySumLessOrEqual,
            bound.into(),
        )
    }

    /// Check that the predicate can be interpreted
    pub fn validate(&self) -> Result<()> {
        if self.field_length == 0 || self.field_length as usize > WORD_LEN {
            return Err(Error::InvalidPredicate(format!(
                "field length {} outside 1..={}",
                self.field_length, WORD_LEN
            )));
        }
        Ok(())
    }

    /// Bytes of the field inside `payload`, if in bounds
    fn field<'a>(&self, payload: &'a [u8]) -> Option<&'a [u8]> {
        let start = self.field_offset as usize;
        let end = start.checked_add(self.field_length as usize)?;
        payload.get(start..end)
    }

    fn bound_value(&self) -> U256 {
        U256::from_be_bytes(self.bound.0)
    }
}

/// Running total of one daily-sum rule
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailySpend {
    /// UTC day of the bucket
    pub day: NaiveDate,
    /// Sum of the field over the day
    pub total: U256,
}

/// Pending daily-total update produced by the check phase
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpendUpdate {
    index: usize,
    spend: DailySpend,
}

/// Stored authorization grant
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Authorization {
    expiry: i64,
    predicates: Vec<Predicate>,
    spent: Vec<Option<DailySpend>>,
}

impl Authorization {
    /// Create a grant valid up to and including `expiry`
    pub fn new(expiry: i64, predicates: Vec<Predicate>) -> Result<Self> {
        for predicate in &predicates {
            predicate.validate()?;
        }
        let spent = vec![None; predicates.len()];
        Ok(Self {
            expiry,
            predicates,
            spent,
        })
    }

    /// Expiry timestamp (unix seconds)
    pub fn expiry(&self) -> i64 {
        self.expiry
    }

    /// Rules of the grant
    pub fn predicates(&self) -> &[Predicate] {
        &self.predicates
    }

    /// Whether the grant is no longer usable at `now`
    pub fn is_expired(&self, now: i64) -> bool {
        now > self.expiry
    }

    /// Amount already counted against rule `index` on `day`
    pub fn spent_on(&self, index: usize, day: NaiveDate) -> U256 {
        match self.spent.get(index) {
            Some(Some(spend)) if spend.day == day => spend.total,
            _ => U256::ZERO,
        }
    }

    /// Check `payload` against every rule without changing state
    pub fn evaluate(&self, payload: &[u8], now: i64, today: NaiveDate) -> Result<Vec<SpendUpdate>> {
        if self.is_expired(now) {
            return Err(Error::AuthorizationExpired {
                expiry: self.expiry,
                now,
            });
        }

        let mut updates = Vec::new();
        for (index, predicate) in self.predicates.iter().enumerate() {
            let field = predicate.field(payload).ok_or_else(|| Error::PredicateViolation {
                index,
                reason: format!(
                    "field {}..+{} outside payload of {} bytes",
                    predicate.field_offset,
                    predicate.field_length,
                    payload.len()
                ),
            })?;

            match predicate.comparison {
                Comparison::Equal => {
                    let expected = &predicate.bound[WORD_LEN - field.len()..];
                    if field != expected {
                        return Err(Error::PredicateViolation {
                            index,
                            reason: format!(
                                "0x{} != 0x{}",
                                hex::encode(field),
                                hex::encode(expected)
                            ),
                        });
                    }
                }
                Comparison::LessOrEqual => {
                    let value = U256::from_be_slice(field);
                    let bound = predicate.bound_value();
                    if value > bound {
                        return Err(Error::PredicateViolation {
                            index,
                            reason: format!("{} exceeds {}", value, bound),
                        });
                    }
                }
                Comparison::DailySumLessOrEqual => {
                    let value = U256::from_be_slice(field);
                    let bound = predicate.bound_value();
                    let spent = self.spent_on(index, today);
                    let total = spent.checked_add(value).filter(|t| *t <= bound).ok_or_else(|| {
                        Error::PredicateViolation {
                            index,
                            reason: format!(
                                "daily total {} + {} exceeds {}",
                                spent, value, bound
                            ),
                        }
                    })?;
                    updates.push(SpendUpdate {
                        index,
                        spend: DailySpend { day: today, total },
                    });
                }
            }
        }

        Ok(updates)
    }

    /// Apply the updates returned by [`Authorization::evaluate`]
    pub fn record(&mut self, updates: Vec<SpendUpdate>) {
        for update in updates {
            if let Some(slot) = self.spent.get_mut(update.index) {
                *slot = Some(update.spend);
            }
        }
    }

    /// Evaluate and, when every rule passes, record the spend
    pub fn authorize(&mut self, payload: &[u8], now: i64, today: NaiveDate) -> Result<()> {
        let updates = self.evaluate(payload, now, today)?;
        self.record(updates);
        Ok(())
    }
}
