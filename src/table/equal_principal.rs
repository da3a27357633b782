//! Equal principal repayment (constant amortization): the same principal each
//! installment, interest on the outstanding balance on top. There is nothing
//! to smooth and no accrued interest, so each record depends only on its
//! predecessor and a mutation replays the suffix it touches.

use super::PaymentTable;
use crate::loan::{monthly_interest, round, LoanTerms, PrepaymentPolicy};
use log::{debug, trace};

pub(super) fn initial_installment(terms: &LoanTerms) -> i64 {
    round(terms.amount() as f64 / terms.installments() as f64)
}

/// Recomputes installments `from..` from the state left by `from - 1`.
///
/// A prepayment is applied after the regular principal and capped to what
/// remains. Under the amount-reducing policy the principal is re-levelled
/// over the remaining term on the following installment; under
/// duration-shortening it is kept and the loan ends early.
pub(super) fn cascade(table: &mut PaymentTable, from: usize) {
    let installments = table.records.len();
    let policy = table.terms.prepayment_policy();

    let (mut balance, mut installment, mut prepaid) = if from == 0 {
        (table.terms.amount(), table.initial_installment, false)
    } else {
        let prev = &table.records[from - 1];
        (prev.balance, prev.installment, prev.prepayment > 0)
    };

    for (i, r) in table.records.iter_mut().enumerate().skip(from) {
        if prepaid && policy == PrepaymentPolicy::ReduceAmount {
            installment = round(balance as f64 / (installments - i) as f64);
            debug!(
                "principal from installment {} re-levelled to {} (balance {})",
                i, installment, balance
            );
        }

        r.reopen(installment, balance, 0);
        r.interest = monthly_interest(balance, r.rate);
        r.principal = installment.min(balance);
        r.prepayment = r.requested_prepayment.min(balance - r.principal);
        r.balance = balance - r.principal - r.prepayment;
        r.update_total();
        trace!("{}", r);

        balance = r.balance;
        prepaid = r.prepayment > 0;
    }

    if let Some(last) = table.records.last_mut() {
        if last.balance > 0 {
            trace!("folding remainder {} into the final installment", last.balance);
            last.settle_remainder();
        }
    }
}
