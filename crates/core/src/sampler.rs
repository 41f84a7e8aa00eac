//! Voice-activity driven video sampling.
//!
//! Frames from the display surface are expensive for the model to consume, so
//! only a trickle is forwarded: one rate while the user is speaking, another
//! while silent.

use std::time::Duration;
use tokio::time::Instant;

#[derive(Debug, Clone)]
pub struct VideoSampler {
    speaking_interval: Option<Duration>,
    silent_interval: Option<Duration>,
    last_sample: Option<Instant>,
}

impl VideoSampler {
    /// An fps of zero (or less) disables forwarding in that state, as does a
    /// rate so low its interval does not fit in a [`Duration`].
    pub fn new(speaking_fps: f64, silent_fps: f64) -> Self {
        Self {
            speaking_interval: interval_for(speaking_fps),
            silent_interval: interval_for(silent_fps),
            last_sample: None,
        }
    }

    /// Whether the frame arriving now should be forwarded.
    pub fn should_sample(&mut self, user_speaking: bool) -> bool {
        self.should_sample_at(Instant::now(), user_speaking)
    }

    fn should_sample_at(&mut self, now: Instant, user_speaking: bool) -> bool {
        let interval = if user_speaking {
            self.speaking_interval
        } else {
            self.silent_interval
        };
        let Some(interval) = interval else {
            return false;
        };

        let due = match self.last_sample {
            Some(last) => now.saturating_duration_since(last) >= interval,
            None => true,
        };
        if due {
            self.last_sample = Some(now);
        }
        due
    }
}

fn interval_for(fps: f64) -> Option<Duration> {
    if !fps.is_finite() || fps <= 0.0 {
        return None;
    }
    Duration::try_from_secs_f64(1.0 / fps).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_first_frame_is_always_sampled() {
        let mut sampler = VideoSampler::new(0.2, 0.1);
        assert!(sampler.should_sample(false));
        assert!(!sampler.should_sample(false));
    }

    #[tokio::test(start_paused = true)]
    async fn test_speaking_rate_is_faster() {
        let mut sampler = VideoSampler::new(0.2, 0.1);
        assert!(sampler.should_sample(true));

        tokio::time::advance(Duration::from_secs(5)).await;
        assert!(sampler.should_sample(true));

        tokio::time::advance(Duration::from_secs(5)).await;
        // 5 s is enough while speaking but not while silent.
        assert!(!sampler.should_sample(false));
        tokio::time::advance(Duration::from_secs(5)).await;
        assert!(sampler.should_sample(false));
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_fps_disables_state() {
        let mut sampler = VideoSampler::new(1.0, 0.0);
        assert!(!sampler.should_sample(false));
        assert!(sampler.should_sample(true));
    }

    #[tokio::test(start_paused = true)]
    async fn test_vanishing_fps_disables_state() {
        let mut sampler = VideoSampler::new(1e-20, 0.1);
        assert!(!sampler.should_sample(true));
        assert!(sampler.should_sample(false));

        let mut sampler = VideoSampler::new(f64::MIN_POSITIVE, f64::NAN);
        assert!(!sampler.should_sample(true));
        assert!(!sampler.should_sample(false));
    }
}
