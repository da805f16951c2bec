use std::time::{Duration, SystemTime, UNIX_EPOCH};

pub(crate) const SECONDS_PER_DAY: u64 = 24 * 60 * 60;

pub fn utc_now() -> Duration {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
}

pub fn utc_now_secs() -> u64 {
    utc_now().as_secs()
}
