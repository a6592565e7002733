//! Wall-clock helpers. A single place to get "now" as a float Unix
//! timestamp, matching the Python reference's pervasive `time.time()`.

use std::time::{SystemTime, UNIX_EPOCH};

pub fn unix_timestamp() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs_f64()
}
