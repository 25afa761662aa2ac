//! Permission matrix and outcome classification.

mod matrix;
mod outcome;

pub use matrix::{Account, BucketRole, COPY_PAIRS, Operation, copy_allowed, is_allowed};
pub use outcome::{CheckOutcome, OutcomeKind, Report};
