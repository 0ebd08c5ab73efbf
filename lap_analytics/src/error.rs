use thiserror::Error;

/// Failures surfaced by the scoring entry points. None of them are transient,
/// so callers should not retry.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum AnalyticsError {
    #[error("insufficient data: no {context} supplied")]
    InsufficientData { context: &'static str },

    #[error("invalid feature row for lap {lap_number}: {field} {reason}")]
    InvalidFeatureRow {
        lap_number: u32,
        field: &'static str,
        reason: String,
    },

    #[error("no valid laps: {total_laps} laps supplied, none valid with complete sector times")]
    NoValidLaps { total_laps: usize },

    #[error("numeric overflow: {context} is not representable")]
    NumericOverflow { context: &'static str },
}

impl AnalyticsError {
    pub(crate) fn invalid_row(lap_number: u32, field: &'static str, reason: impl Into<String>) -> Self {
        AnalyticsError::InvalidFeatureRow {
            lap_number,
            field,
            reason: reason.into(),
        }
    }

    /// Short machine-readable tag for transport layers.
    pub fn kind(&self) -> &'static str {
        match self {
            AnalyticsError::InsufficientData { .. } => "insufficient_data",
            AnalyticsError::InvalidFeatureRow { .. } => "invalid_feature_row",
            AnalyticsError::NoValidLaps { .. } => "no_valid_laps",
            AnalyticsError::NumericOverflow { .. } => "numeric_overflow",
        }
    }
}
