//! Wall-clock access shared by every component that stamps a bucket refill
//! or a metadata access time.

use chrono::Utc;

#[must_use]
pub fn now_ms() -> u64 {
    Utc::now().timestamp_millis().max(0) as u64
}
