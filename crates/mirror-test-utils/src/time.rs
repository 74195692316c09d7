//! Fixed timestamps for deterministic reconciliation tests.

use chrono::{DateTime, TimeZone, Utc};

/// A registration date safely before [`last_sync`].
pub fn before_sync() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap()
}

/// The reference last-sync timestamp used by test runs.
pub fn last_sync() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap()
}

/// A registration date safely after [`last_sync`].
pub fn after_sync() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 7, 1, 0, 0, 0).unwrap()
}
