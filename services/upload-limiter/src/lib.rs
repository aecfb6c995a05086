pub mod api;
pub mod config;
pub mod storage;
pub mod telemetry;
pub mod tracker;

pub use api::{create_router, ApiState, ErrorResponse};
pub use config::{LedgerBackend, UploadLimiterConfig};
pub use storage::{InMemoryLedger, LedgerDatabase, LedgerStore, StorageError};
pub use tracker::{
    FixedClock, Hour, HourClock, LimitCheck, ProviderRecord, UsageError, UsageTracker,
    HOURS_PER_DAY,
};
