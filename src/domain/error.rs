//! Domain error types.

use crate::domain::decision::Side;

/// Top-level error type for investr.
///
/// `InsufficientData` and `MarketRejected` are recoverable: the first degrades
/// a signal to HOLD, the second leaves the strategy in its prior state.
/// `InvariantViolation` means ledger or pipeline state can no longer be
/// trusted and the run must stop.
#[derive(Debug, thiserror::Error)]
pub enum InvestrError {
    #[error("insufficient data for {context}: have {have} candles, need {need}")]
    InsufficientData {
        context: String,
        have: usize,
        need: usize,
    },

    #[error("market rejected {side} order: {reason}")]
    MarketRejected { side: Side, reason: String },

    #[error("invariant violation: {reason}")]
    InvariantViolation { reason: String },

    #[error("config parse error in {file}: {reason}")]
    ConfigParse { file: String, reason: String },

    #[error("missing config key [{section}] {key}")]
    ConfigMissing { section: String, key: String },

    #[error("invalid config value [{section}] {key}: {reason}")]
    ConfigInvalid {
        section: String,
        key: String,
        reason: String,
    },

    #[error("data source error: {reason}")]
    DataSource { reason: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl InvestrError {
    pub fn invariant(reason: impl Into<String>) -> Self {
        InvestrError::InvariantViolation {
            reason: reason.into(),
        }
    }

    /// True for errors a run can continue past.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            InvestrError::InsufficientData { .. } | InvestrError::MarketRejected { .. }
        )
    }
}

impl From<&InvestrError> for std::process::ExitCode {
    fn from(err: &InvestrError) -> Self {
        let code: u8 = match err {
            InvestrError::Io(_) => 1,
            InvestrError::ConfigParse { .. }
            | InvestrError::ConfigMissing { .. }
            | InvestrError::ConfigInvalid { .. } => 2,
            InvestrError::DataSource { .. } | InvestrError::InsufficientData { .. } => 3,
            InvestrError::MarketRejected { .. } => 4,
            InvestrError::InvariantViolation { .. } => 5,
        };
        std::process::ExitCode::from(code)
    }
}
