//! Constant payment under the smoothing rule.
//!
//! The level payment is fixed at loan start. It is only re-priced at a
//! smoothing boundary (every [`SMOOTHING_INTERVAL`] installments), and only if
//! the rate changed since the last boundary or accrued interest is
//! outstanding. A re-priced payment may not exceed 125% of the previous one.
//! When a period's interest exceeds the payment, the shortfall is accrued and
//! collected ahead of interest and principal in later periods.
//!
//! Because boundaries and accrued interest depend on everything before them,
//! every mutation replays the table from installment 0.

use super::PaymentTable;
use crate::loan::{annuity_payment, monthly_interest, round, LoanTerms, PrepaymentPolicy};
use crate::record::PaymentRecord;
use log::{debug, trace};

/// Installments between two smoothing boundaries.
pub const SMOOTHING_INTERVAL: usize = 60;

/// Largest allowed ratio between a re-priced payment and the previous one.
const INCREASE_CAP: f64 = 1.25;

pub(super) fn initial_installment(terms: &LoanTerms) -> i64 {
    annuity_payment(terms.amount(), terms.annual_rate(), terms.installments())
}

/// Lays out a table no event has touched. The only remainder left is the
/// rounding of the level payment, folded into the final principal whatever
/// its size.
pub(super) fn build(table: &mut PaymentTable) {
    replay(table, 0);
    if let Some(last) = table.records.last_mut() {
        if last.balance > 0 {
            trace!("folding remainder {} into the final installment", last.balance);
            last.settle_remainder();
        }
    }
}

/// Replays the whole table, then reconciles a balance left after the final
/// installment. A small remainder is folded into the last principal; a larger
/// one is retried from the boundary after the last re-pricing, where a raised
/// payment can still absorb it. Each retry starts strictly later, so the loop
/// runs at most once per boundary.
///
/// Without any rate change or prepayment the table is laid out as when it was
/// built.
pub(super) fn recompute(table: &mut PaymentTable) {
    if !has_events(table) {
        build(table);
        return;
    }

    let installments = table.records.len();
    let mut start = 0;

    loop {
        let last_adjustment = replay(table, start);
        let Some(last) = table.records.last_mut() else {
            return;
        };
        if last.balance <= 0 {
            break;
        }
        if last.balance < installments as i64 {
            trace!("folding remainder {} into the final installment", last.balance);
            last.settle_remainder();
            break;
        }

        let retry = last_adjustment + SMOOTHING_INTERVAL;
        if retry >= installments {
            debug!(
                "balance {} left after the final installment, no boundary to re-price at",
                last.balance
            );
            break;
        }
        debug!(
            "balance {} left after the final installment, replaying from boundary {}",
            last.balance, retry
        );
        start = retry;
    }
}

fn has_events(table: &PaymentTable) -> bool {
    let rate = table.terms.annual_rate();
    table
        .records
        .iter()
        .any(|r| r.requested_prepayment > 0 || r.rate != rate)
}

/// Recomputes installments `start..` from the state left by installment
/// `start - 1`. A replay that starts past 0 re-prices at `start`, which must
/// be a boundary. Returns the last boundary at which the payment was
/// re-priced, or `start` if none was.
fn replay(table: &mut PaymentTable, start: usize) -> usize {
    let installments = table.records.len();
    let policy = table.terms.prepayment_policy();

    let (mut balance, mut priced_rate, mut accrued, mut installment, mut rate_changed) =
        if start == 0 {
            (
                table.terms.amount(),
                table.terms.annual_rate(),
                0,
                table.initial_installment,
                false,
            )
        } else {
            let prev = &table.records[start - 1];
            (
                prev.balance,
                prev.rate,
                prev.accrued_interest_balance,
                prev.installment,
                true,
            )
        };
    let mut reprice_after_prepayment = false;
    let mut last_adjustment = start;

    for (i, r) in table.records.iter_mut().enumerate().skip(start) {
        if r.rate != priced_rate {
            rate_changed = true;
        }

        if i >= SMOOTHING_INTERVAL
            && i % SMOOTHING_INTERVAL == 0
            && (rate_changed || accrued > 0)
        {
            let previous = installment;
            installment =
                smoothed_installment(previous, balance, r.rate, installments - i, installments);
            debug!(
                "boundary {}: installment {} -> {} (rate {}, balance {}, accrued {})",
                i, previous, installment, r.rate, balance, accrued
            );
            reprice_after_prepayment = false;
            rate_changed = false;
            priced_rate = r.rate;
            last_adjustment = i;
        }

        if reprice_after_prepayment && accrued == 0 {
            installment = annuity_payment(balance, r.rate, installments - i);
            debug!("installment {} re-priced to {} after prepayment", i, installment);
            reprice_after_prepayment = false;
        }

        r.reopen(installment, balance, accrued);

        if r.requested_prepayment > 0 {
            apply_prepayment(r);
            if policy == PrepaymentPolicy::ReduceAmount {
                reprice_after_prepayment = true;
            }
        }

        let interest = monthly_interest(balance, r.rate);
        let budget = pay_accrued_interest(r, installment);
        split(r, budget, interest);
        trace!("{}", r);

        balance = r.balance;
        accrued = r.accrued_interest_balance;
    }
    last_adjustment
}

/// Payment re-priced at a boundary: the annuity over the remaining term,
/// capped at 125% of the current payment. A change so small that it moves the
/// remaining total by less than one unit per installment of the full term
/// (`|new - current| * remaining < installments`) keeps the current payment.
fn smoothed_installment(
    current: i64,
    balance: i64,
    rate: f64,
    remaining: usize,
    installments: usize,
) -> i64 {
    let ceiling = round(current as f64 * INCREASE_CAP);
    let next = annuity_payment(balance, rate, remaining).min(ceiling);
    if (current - next).abs() * (remaining as i64) < installments as i64 {
        current
    } else {
        next
    }
}

/// Pays the requested prepayment into accrued interest first, then into
/// principal up to the opening balance.
fn apply_prepayment(r: &mut PaymentRecord) {
    let mut available = r.requested_prepayment;

    if r.accrued_interest_balance > 0 {
        let paid = available.min(r.accrued_interest_balance);
        r.accrued_interest_paid += paid;
        r.accrued_interest_balance -= paid;
        available -= paid;
    }
    if available > 0 {
        r.prepayment = available.min(r.balance);
        r.balance -= r.prepayment;
    }
}

/// Collects outstanding accrued interest out of the payment. Returns what is
/// left of the payment for interest and principal.
fn pay_accrued_interest(r: &mut PaymentRecord, budget: i64) -> i64 {
    if r.accrued_interest_balance <= 0 {
        return budget;
    }
    let paid = budget.min(r.accrued_interest_balance);
    r.accrued_interest_paid += paid;
    r.accrued_interest_balance -= paid;
    budget - paid
}

fn split(r: &mut PaymentRecord, budget: i64, interest: i64) {
    if interest > budget {
        r.interest = budget;
        r.principal = 0;
        r.accrued_interest_new = interest - budget;
        r.accrued_interest_balance += r.accrued_interest_new;
    } else {
        r.interest = interest;
        r.principal = (budget - interest).min(r.balance);
        r.balance -= r.principal;
    }
    r.update_total();
}
