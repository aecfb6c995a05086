pub mod clock;
pub mod error;
pub mod manager;
pub mod record;

pub use clock::{ClockKind, FixedClock, Hour, HourClock, LocalClock, UtcClock};
pub use error::UsageError;
pub use manager::UsageTracker;
pub use record::{HourlySlots, LimitCheck, ProviderRecord};

/// Number of hour-of-day buckets kept per provider.
pub const HOURS_PER_DAY: usize = 24;
