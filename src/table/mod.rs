//! Payment tables: one record per installment, built from [`LoanTerms`] and
//! re-derived in place when a prepayment or a rate change is applied.
//!
//! The amortization engines differ only in how a mutation cascades through
//! the remaining installments:
//!
//! - [`Engine::StandardAmortized`] keeps a level payment that may only be
//!   re-priced every [`SMOOTHING_INTERVAL`] installments, and by at most 25%
//!   upward. Interest the payment cannot cover is carried as accrued interest.
//!   Every mutation replays the whole table.
//! - [`Engine::SimpleAmortized`] re-prices the level payment as soon as the
//!   rate changes. It shares the initial build with the standard engine and
//!   replays only from the mutated installment.
//! - [`Engine::EqualPrincipal`] repays a level principal with interest on top.

mod equal_principal;
mod simple;
mod standard;

pub use standard::SMOOTHING_INTERVAL;

use crate::error::{LoanError, Result};
use crate::loan::{LoanTerms, Method, RateType};
use crate::record::{LoanResult, PaymentRecord};
use log::{debug, info};
use std::fmt;

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Engine {
    StandardAmortized,
    SimpleAmortized,
    EqualPrincipal,
}

impl Engine {
    /// Default engine for an amortization method.
    pub fn for_method(method: Method) -> Self {
        match method {
            Method::ConstantPayment => Engine::StandardAmortized,
            Method::EqualPrincipal => Engine::EqualPrincipal,
        }
    }

    pub fn method(&self) -> Method {
        match self {
            Engine::StandardAmortized | Engine::SimpleAmortized => Method::ConstantPayment,
            Engine::EqualPrincipal => Method::EqualPrincipal,
        }
    }
}

impl fmt::Display for Engine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Engine::StandardAmortized => write!(f, "standard amortized"),
            Engine::SimpleAmortized => write!(f, "simple amortized"),
            Engine::EqualPrincipal => write!(f, "equal principal"),
        }
    }
}

#[derive(Clone, PartialEq, Debug)]
pub struct PaymentTable {
    terms: LoanTerms,
    engine: Engine,
    /// installment amount at loan start: level payment or level principal
    initial_installment: i64,
    records: Vec<PaymentRecord>,
}

impl PaymentTable {
    /// Builds the table with the default engine for the terms' method.
    pub fn new(terms: LoanTerms) -> Self {
        let engine = Engine::for_method(terms.method());
        Self::build(terms, engine)
    }

    pub fn with_engine(terms: LoanTerms, engine: Engine) -> Result<Self> {
        if engine.method() != terms.method() {
            return Err(LoanError::InvalidArgument(format!(
                "{} engine cannot amortize a {} loan",
                engine,
                terms.method()
            )));
        }
        Ok(Self::build(terms, engine))
    }

    fn build(terms: LoanTerms, engine: Engine) -> Self {
        let initial_installment = match engine {
            Engine::StandardAmortized | Engine::SimpleAmortized => {
                standard::initial_installment(&terms)
            }
            Engine::EqualPrincipal => equal_principal::initial_installment(&terms),
        };
        let records = (0..terms.installments())
            .map(|i| PaymentRecord::new(i, terms.due_date(i), terms.annual_rate()))
            .collect();

        let mut table = Self {
            terms,
            engine,
            initial_installment,
            records,
        };
        match engine {
            Engine::StandardAmortized | Engine::SimpleAmortized => standard::build(&mut table),
            Engine::EqualPrincipal => equal_principal::cascade(&mut table, 0),
        }
        debug!(
            "built {} table: {}, initial installment {}",
            engine, table.terms, initial_installment
        );
        table
    }

    pub fn terms(&self) -> &LoanTerms {
        &self.terms
    }

    pub fn engine(&self) -> Engine {
        self.engine
    }

    /// Number of installments.
    pub fn size(&self) -> usize {
        self.records.len()
    }

    pub fn get(&self, index: usize) -> Result<&PaymentRecord> {
        self.records.get(index).ok_or(LoanError::OutOfRange {
            index,
            size: self.records.len(),
        })
    }

    pub fn iter(&self) -> std::slice::Iter<'_, PaymentRecord> {
        self.records.iter()
    }

    /// First installment after which nothing is owed, neither principal nor
    /// accrued interest.
    pub fn payoff_index(&self) -> Option<usize> {
        self.records
            .iter()
            .position(|r| r.balance == 0 && r.accrued_interest_balance == 0)
    }

    /// Schedules an extra principal payment of `amount` at installment `index`,
    /// replacing any earlier request at that installment. The amount actually
    /// applied is capped to what is outstanding.
    pub fn prepayment(&mut self, index: usize, amount: i64) -> Result<()> {
        self.check_index(index)?;
        if amount <= 0 {
            return Err(LoanError::InvalidArgument(format!(
                "prepayment must be positive, got {}",
                amount
            )));
        }
        info!("prepayment of {} at installment {}", amount, index);

        self.records[index].requested_prepayment = amount;
        self.cascade(index);
        Ok(())
    }

    /// Applies `rate` to installments `index..` and recomputes the schedule.
    pub fn change_rate(&mut self, index: usize, rate: f64) -> Result<()> {
        if self.terms.rate_type() == RateType::Fixed {
            return Err(LoanError::InvalidArgument(
                "rate of a fixed-rate loan cannot change".to_string(),
            ));
        }
        self.check_index(index)?;
        self.terms.check_rate(rate)?;
        info!("rate change to {} from installment {}", rate, index);

        for r in &mut self.records[index..] {
            r.rate = rate;
        }
        self.cascade(index);
        Ok(())
    }

    /// Totals over the table. Records are populated when the table is built,
    /// so the `InvalidState` checks only guard against a table whose length
    /// no longer matches its terms.
    pub fn get_result(&self) -> Result<LoanResult> {
        if self.records.len() != self.terms.installments() {
            return Err(LoanError::InvalidState(format!(
                "table holds {} of {} installments",
                self.records.len(),
                self.terms.installments()
            )));
        }
        let last = self
            .records
            .last()
            .ok_or_else(|| LoanError::InvalidState("table is empty".to_string()))?;

        let mut result = LoanResult {
            amount: self.terms.amount(),
            balance: last.balance,
            accrued_interest_balance: last.accrued_interest_balance,
            ..LoanResult::default()
        };
        for r in &self.records {
            result.add(r);
        }
        Ok(result)
    }

    fn check_index(&self, index: usize) -> Result<()> {
        if index >= self.records.len() {
            return Err(LoanError::InvalidArgument(format!(
                "installment {} is outside 0..{}",
                index,
                self.records.len()
            )));
        }
        Ok(())
    }

    /// Recomputes the consequences of a mutation at `index`.
    fn cascade(&mut self, index: usize) {
        match self.engine {
            Engine::StandardAmortized => standard::recompute(self),
            Engine::SimpleAmortized => simple::cascade(self, index),
            Engine::EqualPrincipal => equal_principal::cascade(self, index),
        }
    }
}

impl<'a> IntoIterator for &'a PaymentTable {
    type Item = &'a PaymentRecord;
    type IntoIter = std::slice::Iter<'a, PaymentRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.iter()
    }
}
