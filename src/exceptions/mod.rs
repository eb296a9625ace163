//! Historical transaction exceptions

pub mod historical;
pub mod registry;

pub use historical::{historical_registry, register_historical, HistoricalException, HISTORICAL_EXCEPTIONS};
pub use registry::{ExceptionAction, ExceptionHandler, ExceptionPoint, ExceptionRegistry, TxIdentity};
