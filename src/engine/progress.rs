//! Progress bar utilities for displaying analysis status

use kdam::{Animation, Bar, BarExt};
use std::sync::{Arc, Mutex};

// Progress bar type alias
pub type ProgressBar = Arc<Mutex<Bar>>;

/// Create a progress bar for a known item total.
pub fn create_progress_bar(total: usize, desc: &'static str) -> ProgressBar {
    Arc::new(Mutex::new(kdam::tqdm!(
        total = total,
        desc = desc,
        animation = Animation::Classic
    )))
}

/// Set the bar position to an absolute processed count.
/// Uses try_lock so the event consumer is never blocked on the display.
pub fn update_progress_to(pb: &ProgressBar, n: usize) {
    if let Ok(mut bar) = pb.try_lock() {
        let _ = bar.update_to(n);
    }
}

/// Force a refresh of the bar (e.g. so it shows 0 immediately).
pub fn refresh_bar(pb: &ProgressBar) {
    if let Ok(mut bar) = pb.try_lock() {
        let _ = bar.refresh();
    }
}
