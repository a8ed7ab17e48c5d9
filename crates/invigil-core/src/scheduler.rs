//! Per-frame cadence of the expensive perception services.
//!
//! Object detection refreshes every `object_interval` frames and its result is
//! reused in between. Emotion classification is dispatched every
//! `emotion_interval` frames as a background task; the frame loop never waits
//! for it and fuses whatever label was last written.

pub const DEFAULT_OBJECT_INTERVAL: u64 = 2;
pub const DEFAULT_EMOTION_INTERVAL: u64 = 30;

/// What to refresh on a given frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FramePlan {
    pub run_object_detection: bool,
    pub dispatch_emotion: bool,
}

#[derive(Debug, Clone)]
pub struct FrameScheduler {
    object_interval: u64,
    emotion_interval: u64,
    frames_planned: u64,
    object_runs: u64,
    emotion_dispatches: u64,
}

impl FrameScheduler {
    /// Intervals of zero are treated as one (every frame).
    pub fn new(object_interval: u64, emotion_interval: u64) -> Self {
        Self {
            object_interval: object_interval.max(1),
            emotion_interval: emotion_interval.max(1),
            frames_planned: 0,
            object_runs: 0,
            emotion_dispatches: 0,
        }
    }

    pub fn plan(&mut self, frame_index: u64) -> FramePlan {
        let plan = FramePlan {
            run_object_detection: frame_index % self.object_interval == 0,
            dispatch_emotion: frame_index % self.emotion_interval == 0,
        };

        self.frames_planned += 1;
        if plan.run_object_detection {
            self.object_runs += 1;
        }
        if plan.dispatch_emotion {
            self.emotion_dispatches += 1;
            tracing::debug!(frame = frame_index, "emotion refresh due");
        }

        plan
    }

    pub fn stats(&self) -> SchedulerStats {
        SchedulerStats {
            frames_planned: self.frames_planned,
            object_runs: self.object_runs,
            emotion_dispatches: self.emotion_dispatches,
        }
    }
}

impl Default for FrameScheduler {
    fn default() -> Self {
        Self::new(DEFAULT_OBJECT_INTERVAL, DEFAULT_EMOTION_INTERVAL)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchedulerStats {
    pub frames_planned: u64,
    pub object_runs: u64,
    pub emotion_dispatches: u64,
}
