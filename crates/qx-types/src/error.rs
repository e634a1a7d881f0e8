use thiserror::Error;

/// Top-level error type for the simulation core. Wraps domain-specific
/// sub-errors; infrastructure errors (`Io`, `Serialization`) are kept at
/// this level since they don't belong to any one component.
#[derive(Error, Debug)]
pub enum QxError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Data(#[from] DataError),

    #[error(transparent)]
    Order(#[from] OrderError),

    #[error(transparent)]
    Account(#[from] AccountError),

    #[error(transparent)]
    Persist(#[from] PersistError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("internal error: {0}")]
    Internal(String),
}

pub type QxResult<T> = Result<T, QxError>;

/// Malformed or incomplete configuration. Fatal at startup.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("missing required configuration key: {key}")]
    MissingKey { key: String },

    #[error("invalid value for {key}: {reason}")]
    InvalidValue { key: String, reason: String },
}

/// Missing or corrupt market data for a required instrument.
#[derive(Error, Debug)]
pub enum DataError {
    #[error("no data for {order_book_id} in range {start} - {end}")]
    NoDataInRange {
        order_book_id: String,
        start: String,
        end: String,
    },

    #[error("unknown instrument: {order_book_id}")]
    UnknownInstrument { order_book_id: String },

    #[error("market data producer for {order_book_id} failed: {reason}")]
    ProducerFailed { order_book_id: String, reason: String },
}

/// Order fails validation or is unfillable under the configured policy.
/// The order itself transitions to REJECTED/CANCELLED; this variant
/// carries the reason through to logging and the emitted event.
#[derive(Error, Debug)]
pub enum OrderError {
    #[error("missing market data for {order_book_id}")]
    MissingMarketData { order_book_id: String },

    #[error("cannot trade {order_book_id} on its listed date")]
    ListedDateRestriction { order_book_id: String },

    #[error("{order_book_id} at or beyond limit_up")]
    LimitUpBreach { order_book_id: String },

    #[error("{order_book_id} at or beyond limit_down")]
    LimitDownBreach { order_book_id: String },

    #[error("no liquidity on the counterparty side for {order_book_id}")]
    NoLiquidity { order_book_id: String },

    #[error("volume cap exhausted for {order_book_id}")]
    VolumeLimitExceeded { order_book_id: String },

    #[error("order {order_id} not found")]
    NotFound { order_id: u64 },
}

/// Account-level failures: a position lookup miss (the fixed
/// `MixedPositions` behavior — see design notes) or a blown account.
#[derive(Error, Debug)]
pub enum AccountError {
    #[error("no position for {order_book_id}")]
    PositionNotFound { order_book_id: String },

    #[error("account {account_id} blown: total_value {total_value} <= 0")]
    Blown {
        account_id: String,
        total_value: rust_decimal::Decimal,
    },

    #[error("unknown account type: {account_type}")]
    UnknownAccountType { account_type: String },
}

/// Store/load failure. Non-fatal; the next persistence tick retries.
#[derive(Error, Debug)]
pub enum PersistError {
    #[error("failed to store key {key}: {reason}")]
    StoreFailed { key: String, reason: String },

    #[error("failed to load key {key}: {reason}")]
    LoadFailed { key: String, reason: String },

    #[error("duplicate registration for key {key}")]
    DuplicateKey { key: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn displays_wrapped_error_message() {
        let err: QxError = DataError::UnknownInstrument {
            order_book_id: "XYZ".into(),
        }
        .into();
        assert_eq!(err.to_string(), "unknown instrument: XYZ");
    }

    #[test]
    fn account_error_converts_into_qx_result() {
        let result: QxResult<()> = Err(AccountError::PositionNotFound {
            order_book_id: "IF2009".into(),
        }
        .into());
        assert!(result.is_err());
    }
}
