//! # AppError
//!
//! Centralized error handling for the breachlog ecosystem. Every
//! repository operation carries a generic, human-readable message;
//! detailed diagnostics only go through the tracing debug channel.

use std::fmt;

use thiserror::Error;

/// Aggregated per-step failures from a bootstrap run. Up to three
/// slots, one per install step, in the order the steps execute.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InstallFailure {
    pub user: Option<String>,
    pub post: Option<String>,
    pub settings: Option<String>,
}

impl InstallFailure {
    pub fn is_failure(&self) -> bool {
        self.user.is_some() || self.post.is_some() || self.settings.is_some()
    }
}

impl fmt::Display for InstallFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let slots = [&self.user, &self.post, &self.settings];
        let mut first = true;
        for msg in slots.into_iter().flatten() {
            if !first {
                write!(f, "; ")?;
            }
            write!(f, "{msg}")?;
            first = false;
        }
        Ok(())
    }
}

/// The primary error type for all repository operations.
#[derive(Error, Debug)]
pub enum AppError {
    /// Lookup or listing found nothing, or the store faulted. Surfaced
    /// identically on purpose.
    #[error("{0}")]
    NotFound(String),

    /// Sanitization or parse failure on a required field.
    #[error("validation error: {0}")]
    Validation(String),

    /// Create/delete store fault.
    #[error("{0}")]
    Write(String),

    /// Update store fault, or update before install.
    #[error("{0}")]
    Update(String),

    /// Aggregate of the install step failures; triggers rollback.
    #[error("installation error: {0}")]
    Install(InstallFailure),

    /// Infrastructure failure outside the taxonomy above.
    #[error("internal service error: {0}")]
    Internal(String),
}

/// A specialized Result type for breachlog logic.
pub type Result<T> = std::result::Result<T, AppError>;
