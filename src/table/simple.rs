//! Constant payment that follows the rate immediately: no smoothing boundary,
//! no cap and no accrued interest. The initial table is built by the standard
//! engine; mutations replay only the installments from the mutated one on.
//!
//! Under the duration-shortening policy a loan paid off early keeps its full
//! length, and the installments after payoff are zero-valued.

use super::PaymentTable;
use crate::loan::{annuity_payment, monthly_interest, PrepaymentPolicy};
use log::{debug, trace};

/// Recomputes installments `from..` from the state left by `from - 1`.
///
/// The level payment is re-priced over the remaining term whenever the rate
/// differs from the previous installment's, and after a prepayment under the
/// amount-reducing policy. A prepayment is applied after the regular
/// principal and capped to what remains.
pub(super) fn cascade(table: &mut PaymentTable, from: usize) {
    let installments = table.records.len();
    let policy = table.terms.prepayment_policy();

    let (mut balance, mut prev_rate, mut installment, mut prepaid) = if from == 0 {
        (
            table.terms.amount(),
            table.terms.annual_rate(),
            table.initial_installment,
            false,
        )
    } else {
        let prev = &table.records[from - 1];
        (prev.balance, prev.rate, prev.installment, prev.prepayment > 0)
    };

    for (i, r) in table.records.iter_mut().enumerate().skip(from) {
        let rate_changed = r.rate != prev_rate;
        if rate_changed || (prepaid && policy == PrepaymentPolicy::ReduceAmount) {
            installment = annuity_payment(balance, r.rate, installments - i);
            debug!(
                "installment {} re-priced to {} (rate {}, balance {})",
                i, installment, r.rate, balance
            );
        }

        r.reopen(installment, balance, 0);
        r.interest = monthly_interest(balance, r.rate);
        r.principal = (installment - r.interest).max(0).min(balance);
        r.prepayment = r.requested_prepayment.min(balance - r.principal);
        r.balance = balance - r.principal - r.prepayment;
        r.update_total();
        trace!("{}", r);

        balance = r.balance;
        prev_rate = r.rate;
        prepaid = r.prepayment > 0;
    }

    if let Some(last) = table.records.last_mut() {
        if last.balance > 0 {
            trace!("folding remainder {} into the final installment", last.balance);
            last.settle_remainder();
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::loan::{Method, PrepaymentPolicy};
    use crate::table::tests::{assert_balances_consistent, reference_terms, terms_at_rate};
    use crate::table::{Engine, PaymentTable};
    use test_log::test;

    fn table(policy: PrepaymentPolicy) -> PaymentTable {
        PaymentTable::with_engine(
            reference_terms(Method::ConstantPayment, policy),
            Engine::SimpleAmortized,
        )
        .unwrap()
    }

    #[test]
    fn test_initial_table_matches_standard() {
        let simple = table(PrepaymentPolicy::ReduceAmount);
        let standard = PaymentTable::new(reference_terms(
            Method::ConstantPayment,
            PrepaymentPolicy::ReduceAmount,
        ));
        assert!(simple.iter().eq(standard.iter()));
        assert_eq!(simple.get(0).unwrap().total, 81576);
    }

    #[test]
    fn test_rate_change_takes_effect_immediately() {
        let mut t = table(PrepaymentPolicy::ReduceAmount);
        let before = t.clone();
        t.change_rate(12, 0.04).unwrap();

        assert!(t.iter().take(12).eq(before.iter().take(12)));
        let r = t.get(12).unwrap();
        assert_eq!(r.installment, 131272);
        assert_eq!(r.interest, 97503);
        assert_eq!(r.principal, 33769);
        assert_eq!(t.get(419).unwrap().total, 131004);
        assert_eq!(t.get(419).unwrap().balance, 0);
        assert!(t.iter().all(|r| r.accrued_interest_new == 0 && r.accrued_interest_balance == 0));
        assert_balances_consistent(&t);
    }

    #[test]
    fn test_rate_changes_and_prepayment_shorten_duration() {
        let mut t = table(PrepaymentPolicy::ShortenDuration);
        t.change_rate(12, 0.01).unwrap();
        t.change_rate(24, 0.02).unwrap();
        t.prepayment(60, 1_000_000).unwrap();

        assert_eq!(t.get(12).unwrap().total, 84600);
        assert_eq!(t.get(60).unwrap().prepayment, 1_000_000);
        assert_eq!(t.get(61).unwrap().installment, 98457);
        assert_eq!(t.get(400).unwrap().balance, 78465);

        // paid off early, the rest of the table stays in place as zeros
        assert_eq!(t.payoff_index(), Some(401));
        let last_paid = t.get(401).unwrap();
        assert_eq!(last_paid.principal, 78465);
        assert_eq!(last_paid.interest, 131);
        assert_eq!(last_paid.total, 78596);
        assert_eq!(t.size(), 420);
        for r in t.iter().skip(402) {
            assert_eq!((r.principal, r.interest, r.prepayment, r.total, r.balance), (0, 0, 0, 0, 0));
            assert_eq!(r.rate, 0.02);
        }
        assert_eq!(t.get_result().unwrap().payments, 402);
        assert_balances_consistent(&t);
    }

    #[test]
    fn test_rate_changes_and_prepayment_reduce_amount() {
        let mut t = table(PrepaymentPolicy::ReduceAmount);
        t.change_rate(12, 0.01).unwrap();
        t.change_rate(24, 0.02).unwrap();
        t.prepayment(60, 1_000_000).unwrap();

        assert_eq!(t.get(12).unwrap().total, 84600);
        assert_eq!(t.get(24).unwrap().total, 98457);
        assert_eq!(t.get(60).unwrap().total, 1_098_457);
        assert_eq!(t.get(61).unwrap().installment, 94754);
        let last = t.get(419).unwrap();
        assert_eq!(last.principal, 94412);
        assert_eq!(last.interest, 157);
        assert_eq!(last.balance, 0);
        assert_balances_consistent(&t);
    }

    #[test]
    fn test_prepayment_larger_than_balance() {
        let mut t = table(PrepaymentPolicy::ReduceAmount);
        t.prepayment(0, 40_000_000).unwrap();
        let r = t.get(0).unwrap();
        assert_eq!(r.principal, 62201);
        assert_eq!(r.prepayment, 29_937_799);
        assert_eq!(r.balance, 0);
        assert!(t.iter().skip(1).all(|r| r.total == 0));
        assert_eq!(t.get_result().unwrap().payments, 1);
    }

    #[test]
    fn test_same_rate_is_a_no_op() {
        let mut t = table(PrepaymentPolicy::ShortenDuration);
        t.change_rate(12, 0.01).unwrap();
        let before = t.clone();
        t.change_rate(200, 0.01).unwrap();
        assert_eq!(t, before);
    }

    #[test]
    fn test_mutation_leaves_prefix_alone() {
        let mut t = table(PrepaymentPolicy::ReduceAmount);
        t.change_rate(12, 0.01).unwrap();
        let before = t.clone();
        t.prepayment(100, 500_000).unwrap();
        assert!(t.iter().take(100).eq(before.iter().take(100)));
        assert!(t.get(101).unwrap().installment < before.get(101).unwrap().installment);
    }

    #[test]
    fn test_level_payment_at_other_rates() {
        // remainders over the term are folded at build, never re-priced
        for (rate, installment, principal, interest, payoff, last_total) in [
            (0.0365, 126608, 126650, 385, 411, 92195),
            (0.0504, 152172, 152103, 639, 412, 148677),
        ] {
            let terms = terms_at_rate(rate, Method::ConstantPayment, PrepaymentPolicy::ShortenDuration);
            let mut t = PaymentTable::with_engine(terms, Engine::SimpleAmortized).unwrap();
            assert!(t.iter().all(|r| r.installment == installment), "rate {}", rate);
            assert_eq!(t.get(419).unwrap().principal, principal);
            assert_eq!(t.get(419).unwrap().interest, interest);
            assert_balances_consistent(&t);

            t.prepayment(400, 1_000_000).unwrap();
            assert!(t.iter().all(|r| r.installment == installment), "rate {}", rate);
            assert_eq!(t.payoff_index(), Some(payoff));
            assert_eq!(t.get(payoff).unwrap().total, last_total);
            assert_balances_consistent(&t);
        }
    }
}
