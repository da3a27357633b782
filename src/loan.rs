use crate::error::{LoanError, Result};
use chrono::{Months, NaiveDate};
use log::trace;
use std::fmt;

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum RateType {
    Variable,
    Fixed,
}

impl fmt::Display for RateType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RateType::Variable => write!(f, "variable"),
            RateType::Fixed => write!(f, "fixed"),
        }
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Method {
    /// level payment, principal share grows over time
    ConstantPayment,
    /// level principal, payment shrinks over time
    EqualPrincipal,
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Method::ConstantPayment => write!(f, "constant payment"),
            Method::EqualPrincipal => write!(f, "equal principal"),
        }
    }
}

/// What happens to the schedule after an extra principal payment.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum PrepaymentPolicy {
    /// keep the installment amount, finish early
    ShortenDuration,
    /// keep the term, lower the installment amount
    ReduceAmount,
}

impl fmt::Display for PrepaymentPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PrepaymentPolicy::ShortenDuration => write!(f, "duration-shortening"),
            PrepaymentPolicy::ReduceAmount => write!(f, "amount-reducing"),
        }
    }
}

/// Immutable loan inputs. Amounts are in minor currency units, the rate is an
/// annual decimal (0.00775 is 0.775%).
#[derive(Clone, PartialEq, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct LoanTerms {
    amount: i64,
    years: i32,
    months: i32,
    installments: usize,
    annual_rate: f64,
    rate_type: RateType,
    method: Method,
    prepayment_policy: PrepaymentPolicy,
    first_payment_date: Option<NaiveDate>,
}

impl LoanTerms {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        amount: i64,
        years: i32,
        months: i32,
        annual_rate: f64,
        rate_type: RateType,
        method: Method,
        prepayment_policy: PrepaymentPolicy,
    ) -> Result<Self> {
        if amount <= 0 {
            return Err(LoanError::InvalidArgument(format!(
                "loan amount must be positive, got {}",
                amount
            )));
        }
        if years < 0 || months < 0 {
            return Err(LoanError::InvalidArgument(format!(
                "term must not be negative, got {} years {} months",
                years, months
            )));
        }
        validate_rate(annual_rate)?;

        let installments = years
            .checked_mul(12)
            .and_then(|m| m.checked_add(months))
            .ok_or_else(|| {
                LoanError::InvalidArgument(format!(
                    "term of {} years {} months is too long",
                    years, months
                ))
            })? as usize;
        if installments == 0 {
            return Err(LoanError::InvalidArgument(
                "the number of installments is zero".to_string(),
            ));
        }
        check_money_range(amount, installments, annual_rate)?;

        Ok(Self {
            amount,
            years,
            months,
            installments,
            annual_rate,
            rate_type,
            method,
            prepayment_policy,
            first_payment_date: None,
        })
    }

    /// Anchors installment 0 to a calendar date; later installments fall due
    /// one calendar month apart.
    pub fn with_first_payment_date(mut self, date: NaiveDate) -> Self {
        self.first_payment_date = Some(date);
        self
    }

    pub fn amount(&self) -> i64 {
        self.amount
    }

    pub fn years(&self) -> i32 {
        self.years
    }

    pub fn months(&self) -> i32 {
        self.months
    }

    pub fn installments(&self) -> usize {
        self.installments
    }

    pub fn annual_rate(&self) -> f64 {
        self.annual_rate
    }

    pub fn rate_type(&self) -> RateType {
        self.rate_type
    }

    pub fn method(&self) -> Method {
        self.method
    }

    pub fn prepayment_policy(&self) -> PrepaymentPolicy {
        self.prepayment_policy
    }

    pub fn first_payment_date(&self) -> Option<NaiveDate> {
        self.first_payment_date
    }

    /// Validates a rate for installments of this loan.
    pub(crate) fn check_rate(&self, rate: f64) -> Result<()> {
        validate_rate(rate)?;
        check_money_range(self.amount, self.installments, rate)
    }

    /// Due date of installment `index`, if the terms carry a calendar anchor.
    pub fn due_date(&self, index: usize) -> Option<NaiveDate> {
        let first = self.first_payment_date?;
        let months = u32::try_from(index).ok()?;
        first.checked_add_months(Months::new(months))
    }
}

impl fmt::Display for LoanTerms {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "amount {}, term {}y{}m ({} installments), rate {:.3}% {}, {}, {} prepayment",
            self.amount,
            self.years,
            self.months,
            self.installments,
            self.annual_rate * 100.,
            self.rate_type,
            self.method,
            self.prepayment_policy
        )
    }
}

/// Bound on the money a table may handle, with headroom for the totals of
/// `LoanResult`.
const MONEY_LIMIT: f64 = (i64::MAX / 4) as f64;

fn validate_rate(rate: f64) -> Result<()> {
    if !rate.is_finite() || rate < 0. {
        return Err(LoanError::InvalidArgument(format!(
            "rate must be a non-negative number, got {}",
            rate
        )));
    }
    Ok(())
}

/// No payment exceeds the amount plus a month of interest on it, and each
/// installment charges at most that month of interest, so this product bounds
/// every payment, accrued interest balance and sum the tables compute.
fn check_money_range(amount: i64, installments: usize, rate: f64) -> Result<()> {
    let exposure = amount as f64 * (1. + rate / 12.) * installments as f64;
    if exposure >= MONEY_LIMIT {
        return Err(LoanError::InvalidArgument(format!(
            "amount {} at rate {} over {} installments is out of range",
            amount, rate, installments
        )));
    }
    Ok(())
}

/// Rounds to the nearest currency unit, halves away from zero.
pub(crate) fn round(amt: f64) -> i64 {
    amt.round() as i64
}

/// One month of interest on `balance` at `annual_rate`.
pub(crate) fn monthly_interest(balance: i64, annual_rate: f64) -> i64 {
    round(balance as f64 * annual_rate / 12.)
}

pub(crate) fn annuity_payment(balance: i64, annual_rate: f64, remaining: usize) -> i64 {
    if remaining == 0 {
        return balance;
    }
    let pmt_rate = annual_rate / 12.;
    if pmt_rate == 0. {
        return round(balance as f64 / remaining as f64);
    }

    // (1 + r)^-k, the discount over the remaining installments
    let factor = (1. + pmt_rate).powf(-(remaining as f64));
    let pmt = round(balance as f64 * pmt_rate / (1. - factor));
    trace!(
        "annuity on balance {} at {} over {} installments: {}",
        balance,
        annual_rate,
        remaining,
        pmt
    );
    pmt
}

#[cfg(test)]
mod tests {
    use super::{annuity_payment, monthly_interest, round, LoanTerms, Method, PrepaymentPolicy, RateType};
    use crate::error::LoanError;
    use chrono::NaiveDate;
    use test_log::test;

    fn terms(amount: i64, years: i32, months: i32, rate: f64) -> Result<LoanTerms, LoanError> {
        LoanTerms::new(
            amount,
            years,
            months,
            rate,
            RateType::Variable,
            Method::ConstantPayment,
            PrepaymentPolicy::ReduceAmount,
        )
    }

    #[test]
    fn test_installments_from_term() {
        assert_eq!(terms(30_000_000, 35, 0, 0.00775).unwrap().installments(), 420);
        assert_eq!(terms(1_000_000, 0, 7, 0.01).unwrap().installments(), 7);
        assert_eq!(terms(1_000_000, 2, 3, 0.01).unwrap().installments(), 27);
    }

    #[test]
    fn test_rejects_bad_terms() {
        assert!(matches!(terms(0, 35, 0, 0.01), Err(LoanError::InvalidArgument(_))));
        assert!(matches!(terms(-5, 35, 0, 0.01), Err(LoanError::InvalidArgument(_))));
        assert!(matches!(terms(100, -1, 0, 0.01), Err(LoanError::InvalidArgument(_))));
        assert!(matches!(terms(100, 1, -1, 0.01), Err(LoanError::InvalidArgument(_))));
        assert!(matches!(terms(100, 0, 0, 0.01), Err(LoanError::InvalidArgument(_))));
        assert!(matches!(terms(100, 1, 0, -0.01), Err(LoanError::InvalidArgument(_))));
        assert!(matches!(terms(100, 1, 0, f64::NAN), Err(LoanError::InvalidArgument(_))));
        assert!(matches!(terms(100, i32::MAX, 0, 0.01), Err(LoanError::InvalidArgument(_))));
    }

    #[test]
    fn test_rejects_terms_out_of_money_range() {
        assert!(matches!(terms(30_000_000, 35, 0, 1e13), Err(LoanError::InvalidArgument(_))));
        assert!(matches!(terms(i64::MAX, 0, 1, 0.), Err(LoanError::InvalidArgument(_))));
        assert!(terms(30_000_000, 35, 0, 5.0).is_ok());

        let t = terms(30_000_000, 35, 0, 0.00775).unwrap();
        assert!(t.check_rate(0.04).is_ok());
        assert!(matches!(t.check_rate(1e13), Err(LoanError::InvalidArgument(_))));
        assert!(matches!(t.check_rate(-0.01), Err(LoanError::InvalidArgument(_))));
    }

    #[test]
    fn test_zero_rate_is_allowed() {
        let t = terms(1_200_000, 1, 0, 0.).unwrap();
        assert_eq!(t.annual_rate(), 0.);
    }

    #[test]
    fn test_round_and_interest() {
        assert_eq!(round(2.5), 3);
        assert_eq!(round(2.49), 2);
        assert_eq!(monthly_interest(30_000_000, 0.00775), 19375);
        assert_eq!(monthly_interest(71249, 0.00775), 46);
        assert_eq!(monthly_interest(0, 0.04), 0);
    }

    #[test]
    fn test_annuity_payment() {
        assert_eq!(annuity_payment(30_000_000, 0.00775, 420), 81576);
        assert_eq!(annuity_payment(1_000_000, 0.01, 7), 143334);
        // no interest: straight division
        assert_eq!(annuity_payment(1_200_000, 0., 12), 100000);
        // nothing left to spread over
        assert_eq!(annuity_payment(5000, 0.02, 0), 5000);
        assert_eq!(annuity_payment(0, 0.02, 10), 0);
    }

    #[test]
    fn test_due_dates() {
        let t = terms(1_000_000, 1, 0, 0.01).unwrap();
        assert_eq!(t.due_date(0), None);

        let t = t.with_first_payment_date(NaiveDate::from_ymd_opt(2024, 1, 31).unwrap());
        assert_eq!(t.due_date(0), NaiveDate::from_ymd_opt(2024, 1, 31));
        assert_eq!(t.due_date(1), NaiveDate::from_ymd_opt(2024, 2, 29));
        assert_eq!(t.due_date(2), NaiveDate::from_ymd_opt(2024, 3, 31));
        assert_eq!(t.due_date(13), NaiveDate::from_ymd_opt(2025, 2, 28));
    }
}
