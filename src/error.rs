use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum LoanError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("installment {index} is out of range (table has {size} installments)")]
    OutOfRange { index: usize, size: usize },

    #[error("invalid state: {0}")]
    InvalidState(String),
}

pub type Result<T> = std::result::Result<T, LoanError>;
