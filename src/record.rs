use chrono::NaiveDate;
use std::fmt;

/// State of one installment. Money fields are minor currency units.
///
/// `total` always equals `principal + interest + prepayment +
/// accrued_interest_paid`, and `accrued_interest_balance` equals the previous
/// installment's balance plus `accrued_interest_new` minus
/// `accrued_interest_paid`.
#[derive(Clone, PartialEq, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PaymentRecord {
    pub index: usize,
    pub due_date: Option<NaiveDate>,
    /// annual rate applied to this installment
    pub rate: f64,
    /// contractual installment amount in effect for this period
    pub installment: i64,
    pub principal: i64,
    pub interest: i64,
    pub prepayment: i64,
    pub total: i64,
    /// principal outstanding after this installment
    pub balance: i64,
    pub accrued_interest_new: i64,
    pub accrued_interest_paid: i64,
    pub accrued_interest_balance: i64,
    /// prepayment asked for at this installment, before capping
    #[cfg_attr(feature = "serde", serde(skip))]
    pub(crate) requested_prepayment: i64,
}

impl PaymentRecord {
    pub(crate) fn new(index: usize, due_date: Option<NaiveDate>, rate: f64) -> Self {
        Self {
            index,
            due_date,
            rate,
            installment: 0,
            principal: 0,
            interest: 0,
            prepayment: 0,
            total: 0,
            balance: 0,
            accrued_interest_new: 0,
            accrued_interest_paid: 0,
            accrued_interest_balance: 0,
            requested_prepayment: 0,
        }
    }

    /// Clears every computed field ahead of a recomputation, keeping the
    /// inputs (index, due date, rate, requested prepayment). The balance and
    /// accrued interest balance start from the opening values.
    pub(crate) fn reopen(&mut self, installment: i64, opening_balance: i64, accrued_balance: i64) {
        self.installment = installment;
        self.principal = 0;
        self.interest = 0;
        self.prepayment = 0;
        self.total = 0;
        self.balance = opening_balance;
        self.accrued_interest_new = 0;
        self.accrued_interest_paid = 0;
        self.accrued_interest_balance = accrued_balance;
    }

    pub(crate) fn update_total(&mut self) {
        self.total = self.principal + self.interest + self.prepayment + self.accrued_interest_paid;
    }

    /// Folds whatever principal is still outstanding into this installment.
    pub(crate) fn settle_remainder(&mut self) {
        self.principal += self.balance;
        self.total += self.balance;
        self.balance = 0;
    }
}

impl fmt::Display for PaymentRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "installment {}", self.index + 1)?;
        if let Some(date) = self.due_date {
            write!(f, ", date {}", date)?;
        }
        write!(
            f,
            ", rate {:.3}%, principal {}, interest {}, prepayment {}, total {}, ending balance {}",
            self.rate * 100.,
            self.principal,
            self.interest,
            self.prepayment,
            self.total,
            self.balance
        )?;
        if self.accrued_interest_new != 0
            || self.accrued_interest_paid != 0
            || self.accrued_interest_balance != 0
        {
            write!(
                f,
                ", accrued interest new {} paid {} balance {}",
                self.accrued_interest_new, self.accrued_interest_paid, self.accrued_interest_balance
            )?;
        }
        Ok(())
    }
}

/// Totals over a whole payment table.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct LoanResult {
    pub amount: i64,
    pub principal: i64,
    pub interest: i64,
    pub prepayment: i64,
    pub accrued_interest_paid: i64,
    pub total: i64,
    /// principal outstanding after the final installment
    pub balance: i64,
    pub accrued_interest_balance: i64,
    /// installments with a nonzero payment
    pub payments: usize,
}

impl LoanResult {
    pub(crate) fn add(&mut self, r: &PaymentRecord) {
        self.principal += r.principal;
        self.interest += r.interest;
        self.prepayment += r.prepayment;
        self.accrued_interest_paid += r.accrued_interest_paid;
        self.total += r.principal + r.interest + r.prepayment + r.accrued_interest_paid;
        if r.total != 0 {
            self.payments += 1;
        }
    }
}

impl fmt::Display for LoanResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "amount {}, principal {}, interest {}, accrued interest paid {}, prepayment {}, total {}, ending balance {}, accrued interest balance {}, {} payments",
            self.amount,
            self.principal,
            self.interest,
            self.accrued_interest_paid,
            self.prepayment,
            self.total,
            self.balance,
            self.accrued_interest_balance,
            self.payments
        )
    }
}
