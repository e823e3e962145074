use std::time::{Duration, Instant};

/// Tracks rendered frames per second over a reporting interval.
pub struct FpsCounter {
    frame_count: u32,
    total_frames: u64,
    last_time: Instant,
    interval: Duration,
}

impl FpsCounter {
    /// Create a counter reporting once per second.
    pub fn new() -> Self {
        Self::with_interval(Duration::from_secs(1))
    }

    pub fn with_interval(interval: Duration) -> Self {
        Self {
            frame_count: 0,
            total_frames: 0,
            last_time: Instant::now(),
            interval,
        }
    }

    /// Count one frame.
    /// Returns Some(fps) if the reporting interval has passed, otherwise None.
    pub fn update(&mut self) -> Option<f32> {
        self.frame_count += 1;
        self.total_frames += 1;
        let elapsed = self.last_time.elapsed();

        if elapsed >= self.interval {
            let fps = self.frame_count as f32 / elapsed.as_secs_f32();
            self.frame_count = 0;
            self.last_time = Instant::now();
            Some(fps)
        } else {
            None
        }
    }

    pub fn total_frames(&self) -> u64 {
        self.total_frames
    }
}

impl Default for FpsCounter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reports_after_interval() {
        let mut counter = FpsCounter::with_interval(Duration::ZERO);
        assert!(counter.update().is_some());
        assert_eq!(counter.total_frames(), 1);

        let mut counter = FpsCounter::with_interval(Duration::from_secs(3600));
        assert!(counter.update().is_none());
        assert!(counter.update().is_none());
        assert_eq!(counter.total_frames(), 2);
    }
}
