use serde::{Deserialize, Serialize};

use super::clock::Hour;
use super::HOURS_PER_DAY;

pub type HourlySlots = [i64; HOURS_PER_DAY];

/// Upload usage and configured limits of one storage provider, one slot per
/// hour of the day. Slots carry no date, so the same hour on different days
/// shares a bucket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderRecord {
    id: String,
    usage: HourlySlots,
    limit: HourlySlots,
}

impl ProviderRecord {
    pub fn new(id: impl Into<String>) -> Self {
        Self::from_parts(id, [0; HOURS_PER_DAY], [0; HOURS_PER_DAY])
    }

    pub fn from_parts(id: impl Into<String>, usage: HourlySlots, limit: HourlySlots) -> Self {
        Self {
            id: id.into(),
            usage,
            limit,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn usage(&self) -> &HourlySlots {
        &self.usage
    }

    pub fn limit(&self) -> &HourlySlots {
        &self.limit
    }

    pub fn usage_at(&self, hour: Hour) -> i64 {
        self.usage[hour.index()]
    }

    pub fn limit_at(&self, hour: Hour) -> i64 {
        self.limit[hour.index()]
    }

    /// Replaces the limit for `hour`, returning the previous value.
    pub fn set_limit(&mut self, hour: Hour, value: i64) -> i64 {
        std::mem::replace(&mut self.limit[hour.index()], value)
    }

    /// Adds to the usage for `hour`, returning the new total.
    pub fn add_usage(&mut self, hour: Hour, amount: i64) -> i64 {
        let slot = &mut self.usage[hour.index()];
        *slot = slot.saturating_add(amount);
        *slot
    }

    /// Usage equal to the limit is still within budget.
    pub fn is_exceeded(&self, hour: Hour) -> bool {
        self.usage_at(hour) > self.limit_at(hour)
    }
}

/// Outcome of comparing a provider's usage against its limit for one hour.
#[derive(Debug, Clone, Serialize)]
pub struct LimitCheck {
    pub record: ProviderRecord,
    pub hour: Hour,
    pub usage: i64,
    pub limit: i64,
    pub exceeded: bool,
}

impl LimitCheck {
    pub fn evaluate(record: ProviderRecord, hour: Hour) -> Self {
        Self {
            usage: record.usage_at(hour),
            limit: record.limit_at(hour),
            exceeded: record.is_exceeded(hour),
            hour,
            record,
        }
    }
}
