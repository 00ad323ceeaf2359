use std::time::{Duration, Instant};

/// Counts presented frames and reports a rate once per second.
#[derive(Debug)]
pub struct FrameCounter {
    last: Instant,
    frames: u32,
}

impl FrameCounter {
    pub fn new(now: Instant) -> Self {
        Self { last: now, frames: 0 }
    }

    /// Records one frame. Returns the frame rate whenever a full second has
    /// passed since the last report.
    pub fn tick(&mut self, now: Instant) -> Option<u32> {
        self.frames += 1;

        let elapsed = now.duration_since(self.last);
        if elapsed < Duration::from_secs(1) {
            return None;
        }

        let rate = (f64::from(self.frames) / elapsed.as_secs_f64()) as u32;
        self.last = now;
        self.frames = 0;
        Some(rate.max(1))
    }
}

pub fn title_with_rate(title: &str, rate: u32) -> String {
    format!("{} -- FPS: {}", title, rate)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reports_once_per_second() {
        let start = Instant::now();
        let mut counter = FrameCounter::new(start);

        for i in 1..60 {
            assert_eq!(counter.tick(start + Duration::from_millis(i * 16)), None);
        }
        assert_eq!(counter.tick(start + Duration::from_secs(1)), Some(60));
        assert_eq!(counter.tick(start + Duration::from_millis(1100)), None);
    }

    #[test]
    fn slow_frames_still_report_at_least_one() {
        let start = Instant::now();
        let mut counter = FrameCounter::new(start);
        assert_eq!(counter.tick(start + Duration::from_secs(5)), Some(1));
    }

    #[test]
    fn title_includes_rate() {
        assert_eq!(title_with_rate("DOOM Engine", 144), "DOOM Engine -- FPS: 144");
    }
}
