use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

const STOP_CHECK: Duration = Duration::from_millis(200);

/// Sleeps for `total` in short steps. Returns false as soon as `stop` is raised.
pub(crate) fn sleep_with_stop(stop: &AtomicBool, total: Duration) -> bool {
    let mut remaining = total;
    while remaining > Duration::ZERO {
        if stop.load(Ordering::Relaxed) {
            return false;
        }
        let step = remaining.min(STOP_CHECK);
        thread::sleep(step);
        remaining = remaining.saturating_sub(step);
    }
    !stop.load(Ordering::Relaxed)
}
