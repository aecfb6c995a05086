use std::sync::Arc;

pub mod handlers;
pub mod router;
pub mod types;

pub use handlers::*;
pub use router::create_router;
pub use types::*;

use crate::config::UploadLimiterConfig;
use crate::tracker::UsageTracker;

pub struct ApiState {
    pub tracker: Arc<UsageTracker>,
    pub config: Arc<UploadLimiterConfig>,
}

impl ApiState {
    pub fn new(tracker: Arc<UsageTracker>, config: UploadLimiterConfig) -> Self {
        Self {
            tracker,
            config: Arc::new(config),
        }
    }
}
