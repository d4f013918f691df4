//! Domain error types.

/// Top-level error type for navtrader.
#[derive(Debug, thiserror::Error)]
pub enum NavtraderError {
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

    #[error("rebalance plan is empty")]
    EmptyPlan,

    #[error("plan parse error in {file} line {line}: {reason}")]
    PlanParse {
        file: String,
        line: usize,
        reason: String,
    },

    #[error("data unavailable: {what}")]
    DataUnavailable { what: String },

    #[error(transparent)]
    Csv(#[from] csv::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl NavtraderError {
    /// Whether retrying the same call could succeed. Parse and config
    /// errors repeat deterministically.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            NavtraderError::DataUnavailable { .. } | NavtraderError::Io(_)
        )
    }

    pub(crate) fn invalid(section: &str, key: &str, reason: impl Into<String>) -> Self {
        NavtraderError::ConfigInvalid {
            section: section.to_string(),
            key: key.to_string(),
            reason: reason.into(),
        }
    }

    pub(crate) fn missing(section: &str, key: &str) -> Self {
        NavtraderError::ConfigMissing {
            section: section.to_string(),
            key: key.to_string(),
        }
    }
}

impl From<&NavtraderError> for std::process::ExitCode {
    fn from(err: &NavtraderError) -> Self {
        let code: u8 = match err {
            NavtraderError::Io(_) | NavtraderError::Csv(_) | NavtraderError::Json(_) => 1,
            NavtraderError::ConfigParse { .. }
            | NavtraderError::ConfigMissing { .. }
            | NavtraderError::ConfigInvalid { .. } => 2,
            NavtraderError::EmptyPlan | NavtraderError::PlanParse { .. } => 3,
            NavtraderError::DataUnavailable { .. } => 5,
        };
        std::process::ExitCode::from(code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_data_and_io_errors_are_transient() {
        let err = NavtraderError::DataUnavailable {
            what: "close prices for 2024-01-02".into(),
        };
        assert!(err.is_transient());
        assert!(NavtraderError::Io(std::io::Error::other("reset")).is_transient());
        assert!(!NavtraderError::EmptyPlan.is_transient());
        assert!(!NavtraderError::invalid("execution", "lot_size", "must be positive").is_transient());
    }

    #[test]
    fn messages_name_section_and_key() {
        let err = NavtraderError::missing("data", "dir");
        assert_eq!(err.to_string(), "missing config key [data] dir");

        let err = NavtraderError::invalid("execution", "fee_rate_buy", "must be in [0, 1)");
        assert_eq!(
            err.to_string(),
            "invalid config value [execution] fee_rate_buy: must be in [0, 1)"
        );
    }

    #[test]
    fn plan_parse_reports_line() {
        let err = NavtraderError::PlanParse {
            file: "pool.csv".into(),
            line: 4,
            reason: "invalid date".into(),
        };
        assert_eq!(err.to_string(), "plan parse error in pool.csv line 4: invalid date");
    }
}
