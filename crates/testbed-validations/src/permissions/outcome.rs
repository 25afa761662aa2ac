//! Classification and logging of permission check outcomes.

use std::fmt;

use strum::Display;
use testbed_storage::StorageError;
use tracing::Level;

use super::Operation;
use crate::TRACING_TARGET_PERMISSIONS;

/// How an operation's result relates to its expected permission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
#[strum(serialize_all = "snake_case")]
pub enum OutcomeKind {
    /// Allowed and succeeded.
    ExpectedSuccess,
    /// Denied and failed.
    ExpectedFailure,
    /// Denied but succeeded.
    UnexpectedSuccess,
    /// Allowed but failed.
    UnexpectedFailure,
    /// Not attempted because a prerequisite failed.
    Skipped,
}

impl OutcomeKind {
    /// Classifies a result against its expectation.
    pub fn classify(expected: bool, succeeded: bool) -> Self {
        match (expected, succeeded) {
            (true, true) => Self::ExpectedSuccess,
            (false, false) => Self::ExpectedFailure,
            (false, true) => Self::UnexpectedSuccess,
            (true, false) => Self::UnexpectedFailure,
        }
    }

    /// Returns whether the outcome matches the permission matrix.
    pub fn is_expected(self) -> bool {
        matches!(self, Self::ExpectedSuccess | Self::ExpectedFailure)
    }

    /// Returns the level the outcome is logged at.
    pub fn level(self) -> Level {
        if self.is_expected() {
            Level::INFO
        } else {
            Level::ERROR
        }
    }
}

/// The outcome of one operation attempted by one account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckOutcome {
    /// Name of the account that attempted the operation.
    pub account: String,
    /// The attempted operation.
    pub operation: Operation,
    /// Bucket the operation targeted, `source -> destination` for copies.
    pub bucket: String,
    /// Object key, for object-level operations.
    pub key: Option<String>,
    /// Classification against the permission matrix.
    pub kind: OutcomeKind,
    /// Failure or skip reason.
    pub reason: Option<String>,
    /// Whether the failure was an access denial.
    pub access_denied: bool,
}

impl CheckOutcome {
    /// Classifies the result of an attempted operation.
    pub fn evaluate<T>(
        account: &str,
        operation: Operation,
        bucket: impl Into<String>,
        key: Option<&str>,
        expected: bool,
        result: &Result<T, StorageError>,
    ) -> Self {
        Self {
            account: account.to_string(),
            operation,
            bucket: bucket.into(),
            key: key.map(str::to_string),
            kind: OutcomeKind::classify(expected, result.is_ok()),
            reason: result.as_ref().err().map(StorageError::reason),
            access_denied: result.as_ref().is_err_and(StorageError::is_access_denied),
        }
    }

    /// Records an operation that was not attempted.
    pub fn skipped(
        account: &str,
        operation: Operation,
        bucket: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self {
            account: account.to_string(),
            operation,
            bucket: bucket.into(),
            key: None,
            kind: OutcomeKind::Skipped,
            reason: Some(reason.into()),
            access_denied: false,
        }
    }

    /// Returns the log message for this outcome.
    pub fn message(&self) -> String {
        let reason = self.reason.as_deref().unwrap_or_default();
        let target = match &self.key {
            Some(key) => format!("{}/{key}", self.bucket),
            None => self.bucket.clone(),
        };

        match self.kind {
            OutcomeKind::ExpectedSuccess => format!(
                "Successful operation \"{}\" to \"{target}\" bucket using \"{}\"",
                self.operation, self.account
            ),
            OutcomeKind::ExpectedFailure => format!(
                "Expected fail on operation \"{}\" to \"{}\" bucket using \"{}\". Reason: \"{reason}\"",
                self.operation, self.bucket, self.account
            ),
            OutcomeKind::UnexpectedSuccess => format!(
                "Unexpected success on operation \"{}\" to \"{target}\" bucket using \"{}\"",
                self.operation, self.account
            ),
            OutcomeKind::UnexpectedFailure => format!(
                "\"{}\" failed for \"{target}\" bucket using \"{}\". Reason: \"{reason}\"",
                self.operation, self.account
            ),
            OutcomeKind::Skipped => format!(
                "Skipped operation \"{}\" to \"{target}\" bucket using \"{}\". Reason: \"{reason}\"",
                self.operation, self.account
            ),
        }
    }

    /// Returns a hint for unexpected denials, pointing at policies and ownership.
    pub fn hint(&self) -> Option<String> {
        (self.kind == OutcomeKind::UnexpectedFailure && self.access_denied).then(|| {
            format!(
                "Check the bucket policy of \"{}\" and the ownership of its objects for account \"{}\"",
                self.bucket, self.account
            )
        })
    }

    /// Logs the outcome at its level, followed by the hint if there is one.
    pub fn log(&self) {
        let message = self.message();
        if self.kind.level() == Level::INFO {
            tracing::info!(
                target: TRACING_TARGET_PERMISSIONS,
                account = %self.account,
                operation = %self.operation,
                bucket = %self.bucket,
                outcome = %self.kind,
                "{message}"
            );
            return;
        }

        tracing::error!(
            target: TRACING_TARGET_PERMISSIONS,
            account = %self.account,
            operation = %self.operation,
            bucket = %self.bucket,
            outcome = %self.kind,
            "{message}"
        );
        if let Some(hint) = self.hint() {
            tracing::error!(target: TRACING_TARGET_PERMISSIONS, "{hint}");
        }
    }
}

impl fmt::Display for CheckOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message())
    }
}

/// All outcomes of one permission validation run.
#[derive(Debug, Clone, Default)]
pub struct Report {
    outcomes: Vec<CheckOutcome>,
}

impl Report {
    /// Creates an empty report.
    pub fn new() -> Self {
        Self::default()
    }

    /// Logs and records an outcome.
    pub fn record(&mut self, outcome: CheckOutcome) {
        outcome.log();
        self.outcomes.push(outcome);
    }

    /// Returns every recorded outcome in check order.
    pub fn outcomes(&self) -> &[CheckOutcome] {
        &self.outcomes
    }

    /// Returns the number of recorded checks.
    pub fn total(&self) -> usize {
        self.outcomes.len()
    }

    /// Returns the number of outcomes that match the matrix.
    pub fn expected(&self) -> usize {
        self.outcomes.iter().filter(|o| o.kind.is_expected()).count()
    }

    /// Returns the number of outcomes that contradict the matrix or were skipped.
    pub fn unexpected(&self) -> usize {
        self.total() - self.expected()
    }

    /// Returns whether any outcome contradicts the matrix.
    pub fn has_unexpected(&self) -> bool {
        self.unexpected() > 0
    }

    /// Logs the totals of the run.
    pub fn log_summary(&self) {
        if self.has_unexpected() {
            tracing::error!(
                target: TRACING_TARGET_PERMISSIONS,
                total = self.total(),
                expected = self.expected(),
                unexpected = self.unexpected(),
                "Storage permission validation finished with {} unexpected outcome(s) out of {} checks",
                self.unexpected(),
                self.total(),
            );
        } else {
            tracing::info!(
                target: TRACING_TARGET_PERMISSIONS,
                total = self.total(),
                expected = self.expected(),
                "Storage permission validation passed: all {} checks as expected",
                self.total(),
            );
        }
    }
}
