use std::time::{Duration, Instant};

/// Wall-clock timer for one stage invocation, retries included.
#[derive(Debug)]
pub struct StageTimer {
    start: Instant,
    stage_id: String,
}

impl StageTimer {
    /// Starts timing `stage_id`.
    #[must_use]
    pub fn start(stage_id: impl Into<String>) -> Self {
        Self {
            start: Instant::now(),
            stage_id: stage_id.into(),
        }
    }

    /// Returns the stage id being timed.
    #[must_use]
    pub fn stage_id(&self) -> &str {
        &self.stage_id
    }

    /// Returns the elapsed time.
    #[must_use]
    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    /// Returns the elapsed time in whole milliseconds.
    #[must_use]
    pub fn elapsed_ms(&self) -> u64 {
        u64::try_from(self.start.elapsed().as_millis()).unwrap_or(u64::MAX)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_timer() {
        let timer = StageTimer::start("intake");
        std::thread::sleep(Duration::from_millis(10));
        assert!(timer.elapsed_ms() >= 10);
        assert_eq!(timer.stage_id(), "intake");
    }
}
