use crate::domain::memory::MemoryFault;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum HazardError {
    #[error("identity tokens from different slots are not comparable: {left} vs {right}")]
    IncomparableTokens {
        left: &'static str,
        right: &'static str,
    },
    #[error("{requested} insertions are too few to force a reallocation, need at least {minimum}")]
    TooFewInsertions { requested: usize, minimum: usize },
    #[error("{requested} insertions exceed the limit of {maximum}")]
    TooManyInsertions { requested: usize, maximum: usize },
    #[error("capacity of {requested} elements exceeds the limit of {maximum}")]
    CapacityOverflow { requested: usize, maximum: usize },
    #[error("no element at index {index}")]
    NoElement { index: usize },
    #[error("{step}: expected {expected} but memory reported none")]
    MissingFault {
        step: &'static str,
        expected: &'static str,
    },
    #[error(transparent)]
    Fault(#[from] MemoryFault),
    #[error("failed to write report: {0}")]
    Report(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, HazardError>;
