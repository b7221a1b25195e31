use std::time::{Duration, Instant};
use tracing::info;

/// A simple wall-clock timer for logging elapsed time.
pub struct Timer {
    label: String,
    start: Instant,
}

impl Timer {
    pub fn start(label: impl Into<String>) -> Self {
        let label = label.into();
        info!("⏱  Starting: {}", label);
        Self {
            label,
            start: Instant::now(),
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }
}

impl Drop for Timer {
    fn drop(&mut self) {
        info!("⏱  Finished: {} (took {:.2?})", self.label, self.elapsed());
    }
}

/// Cut `s` to at most `max` characters, ending in "…" when shortened.
pub fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    let kept: String = s.chars().take(max.saturating_sub(1)).collect();
    format!("{}…", kept.trim_end())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("Annual Report", 20), "Annual Report");
        assert_eq!(truncate("Annual Report", 8), "Annual…");
        assert_eq!(truncate("€€€€", 3), "€€…");
        assert_eq!(truncate("", 0), "");
    }

    #[test]
    fn test_timer_elapsed_grows() {
        let timer = Timer::start("test");
        let first = timer.elapsed();
        assert!(timer.elapsed() >= first);
    }
}
