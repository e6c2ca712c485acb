use std::time::{SystemTime, UNIX_EPOCH};

/// Seconds since the Unix epoch, as a floating point wall-clock reading.
///
/// Used for the datagram hop timestamp and the service packet send/latency
/// timestamp; never for anything requiring monotonicity.
pub fn now_seconds() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system clock is before the Unix epoch")
        .as_secs_f64()
}
