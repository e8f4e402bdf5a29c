use serde::{Deserialize, Serialize};

use super::question::TestLevel;

pub const DEFAULT_DURATION_MINUTES: i32 = 30;

/// Allotted duration per difficulty level. At most one row per level.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestConfig {
    pub id: i64,
    pub level: TestLevel,
    pub duration_minutes: i32,
}
