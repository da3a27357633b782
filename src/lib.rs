//! Amortization schedules for installment loans.
//!
//! A [`PaymentTable`] is built once from [`LoanTerms`] and then mutated with
//! prepayments and rate changes; [`PaymentTable::get_result`] sums it up.

pub mod error;
pub mod loan;
pub mod record;
pub mod table;

pub use error::LoanError;
pub use loan::{LoanTerms, Method, PrepaymentPolicy, RateType};
pub use record::{LoanResult, PaymentRecord};
pub use table::{Engine, PaymentTable, SMOOTHING_INTERVAL};
