use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValuationError {
    /// The symbol produced no usable record; the batch skips it.
    #[error("Data unavailable for {symbol}: {reason}")]
    DataUnavailable { symbol: String, reason: String },

    #[error("No exchange rate available for {from}->{to}")]
    RateUnavailable { from: String, to: String },

    #[error("Provider error: {0}")]
    ProviderError(String),

    #[error("Persistence error: {0}")]
    PersistenceError(String),

    #[error("Invalid data: {0}")]
    InvalidData(String),
}

impl ValuationError {
    pub fn data_unavailable(symbol: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::DataUnavailable {
            symbol: symbol.into(),
            reason: reason.into(),
        }
    }
}
