//! Domain error types.

/// Top-level error type for trendfilter.
#[derive(Debug, thiserror::Error)]
pub enum TrendfilterError {
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

    #[error("no data for {symbol} ({interval})")]
    NoData { symbol: String, interval: String },

    #[error("insufficient data for {symbol}: have {bars} bars, need {minimum}")]
    InsufficientData {
        symbol: String,
        bars: usize,
        minimum: usize,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl From<&TrendfilterError> for std::process::ExitCode {
    fn from(err: &TrendfilterError) -> Self {
        let code: u8 = match err {
            TrendfilterError::Io(_) => 1,
            TrendfilterError::ConfigParse { .. }
            | TrendfilterError::ConfigMissing { .. }
            | TrendfilterError::ConfigInvalid { .. } => 2,
            TrendfilterError::DataSource { .. } => 3,
            TrendfilterError::NoData { .. } | TrendfilterError::InsufficientData { .. } => 5,
        };
        std::process::ExitCode::from(code)
    }
}
