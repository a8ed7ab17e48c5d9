//! Suspicion fusion: per-frame verdicts in, debounced alert state out.
//!
//! Each frame is first reduced to at most one [`CheatReason`] by walking
//! [`RULES`] in order; the first rule that fires wins. The reason then drives a
//! counter: +1 on a suspicious frame, -4 (floored at zero) otherwise. Only a
//! counter strictly above [`SUSPICION_THRESHOLD`] raises the alert, so a brief
//! glance decays away while a sustained violation accumulates.
//!
//! Emotion never moves the counter. A fearful or sad expression only adds a
//! "(Nervous?)" annotation to whatever status is shown.

use serde::Serialize;
use std::fmt;

use crate::gaze::GazeDirection;
use crate::head_pose::HeadDirection;

/// The alert is raised when the buffer is strictly greater than this.
pub const SUSPICION_THRESHOLD: u32 = 8;
/// Buffer increment on a suspicious frame.
pub const ACCUMULATION_STEP: u32 = 1;
/// Buffer decrement on a non-suspicious frame.
pub const RECOVERY_STEP: u32 = 4;

/// Emotion labels that earn the nervous annotation.
const NERVOUS_EMOTIONS: &[&str] = &["fear", "sad"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum CheatReason {
    MobileDetected,
    LookingAway,
    EyeAveraging,
}

impl CheatReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MobileDetected => "Mobile Detected",
            Self::LookingAway => "Looking Away",
            Self::EyeAveraging => "Eye Averaging",
        }
    }
}

impl fmt::Display for CheatReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Everything the fusion step looks at for one frame.
#[derive(Debug, Clone, Copy)]
pub struct FrameSignals<'a> {
    pub phone_detected: bool,
    /// Head direction from calibrated deltas.
    pub head: HeadDirection,
    /// Gaze direction from the smoothed ratio.
    pub gaze: GazeDirection,
    /// Latest emotion label; may be stale.
    pub emotion: &'a str,
}

/// One row of the decision table.
pub struct Rule {
    pub reason: CheatReason,
    pub fires: fn(&FrameSignals<'_>) -> bool,
}

/// Decision table in precedence order. Looking down never fires the head rule.
pub const RULES: &[Rule] = &[
    Rule {
        reason: CheatReason::MobileDetected,
        fires: phone_in_view,
    },
    Rule {
        reason: CheatReason::LookingAway,
        fires: head_turned_away,
    },
    Rule {
        reason: CheatReason::EyeAveraging,
        fires: eyes_averted,
    },
];

fn phone_in_view(s: &FrameSignals<'_>) -> bool {
    s.phone_detected
}

fn head_turned_away(s: &FrameSignals<'_>) -> bool {
    matches!(
        s.head,
        HeadDirection::LookingLeft | HeadDirection::LookingRight | HeadDirection::LookingUp
    )
}

fn eyes_averted(s: &FrameSignals<'_>) -> bool {
    matches!(s.gaze, GazeDirection::Left | GazeDirection::Right)
}

/// Reason this single frame is suspicious, if any.
pub fn frame_reason(signals: &FrameSignals<'_>) -> Option<CheatReason> {
    RULES
        .iter()
        .find(|rule| (rule.fires)(signals))
        .map(|rule| rule.reason)
}

pub fn is_nervous(emotion: &str) -> bool {
    NERVOUS_EMOTIONS
        .iter()
        .any(|e| e.eq_ignore_ascii_case(emotion.trim()))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum AlertState {
    Safe,
    Suspicious(CheatReason),
}

impl AlertState {
    pub fn is_suspicious(&self) -> bool {
        matches!(self, Self::Suspicious(_))
    }
}

/// Outcome of fusing one frame.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Verdict {
    pub state: AlertState,
    /// Instantaneous reason for this frame alone.
    pub frame_reason: Option<CheatReason>,
    pub buffer: u32,
    pub nervous: bool,
}

impl Verdict {
    /// Operator-facing status line, e.g. `Suspicious: Looking Away (Nervous?)`.
    pub fn status_text(&self) -> String {
        let mut status = match self.state {
            AlertState::Safe => "Safe".to_string(),
            AlertState::Suspicious(reason) => format!("Suspicious: {reason}"),
        };
        if self.nervous {
            status.push_str(" (Nervous?)");
        }
        status
    }
}

/// Debounce buffer plus the reason that last pushed it up.
#[derive(Debug, Clone, Default)]
pub struct SuspicionFusionEngine {
    buffer: u32,
    last_reason: Option<CheatReason>,
}

impl SuspicionFusionEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn update(&mut self, signals: &FrameSignals<'_>) -> Verdict {
        let was_suspicious = self.state().is_suspicious();
        let reason = frame_reason(signals);

        match reason {
            Some(r) => {
                self.buffer = self.buffer.saturating_add(ACCUMULATION_STEP);
                self.last_reason = Some(r);
            }
            None => {
                self.buffer = self.buffer.saturating_sub(RECOVERY_STEP);
            }
        }

        let state = self.state();
        if state.is_suspicious() != was_suspicious {
            match state {
                AlertState::Suspicious(r) => {
                    tracing::info!(reason = %r, buffer = self.buffer, "alert raised")
                }
                AlertState::Safe => tracing::info!(buffer = self.buffer, "alert cleared"),
            }
        }

        Verdict {
            state,
            frame_reason: reason,
            buffer: self.buffer,
            nervous: is_nervous(signals.emotion),
        }
    }

    pub fn buffer(&self) -> u32 {
        self.buffer
    }

    /// Alert state derived from the buffer alone.
    pub fn state(&self) -> AlertState {
        match self.last_reason {
            Some(reason) if self.buffer > SUSPICION_THRESHOLD => AlertState::Suspicious(reason),
            _ => AlertState::Safe,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn signals(phone: bool, head: HeadDirection, gaze: GazeDirection) -> FrameSignals<'static> {
        FrameSignals {
            phone_detected: phone,
            head,
            gaze,
            emotion: "Neutral",
        }
    }

    fn suspicious() -> FrameSignals<'static> {
        signals(false, HeadDirection::LookingLeft, GazeDirection::Center)
    }

    fn calm() -> FrameSignals<'static> {
        signals(false, HeadDirection::Forward, GazeDirection::Center)
    }

    #[test]
    fn test_phone_has_priority_over_head() {
        let s = signals(true, HeadDirection::LookingLeft, GazeDirection::Left);
        assert_eq!(frame_reason(&s), Some(CheatReason::MobileDetected));
    }

    #[test]
    fn test_head_has_priority_over_gaze() {
        let s = signals(false, HeadDirection::LookingUp, GazeDirection::Right);
        assert_eq!(frame_reason(&s), Some(CheatReason::LookingAway));
    }

    #[test]
    fn test_gaze_alone() {
        let s = signals(false, HeadDirection::Forward, GazeDirection::Right);
        assert_eq!(frame_reason(&s), Some(CheatReason::EyeAveraging));
    }

    #[test]
    fn test_looking_down_is_not_suspicious() {
        let s = signals(false, HeadDirection::LookingDown, GazeDirection::Center);
        assert_eq!(frame_reason(&s), None);
    }

    #[test]
    fn test_unknown_signals_are_not_suspicious() {
        let s = signals(false, HeadDirection::Unknown, GazeDirection::Unknown);
        assert_eq!(frame_reason(&s), None);
    }

    #[test]
    fn test_rule_table_order() {
        let order: Vec<_> = RULES.iter().map(|r| r.reason).collect();
        assert_eq!(
            order,
            vec![
                CheatReason::MobileDetected,
                CheatReason::LookingAway,
                CheatReason::EyeAveraging
            ]
        );
    }

    #[test]
    fn test_buffer_increments_by_one() {
        let mut engine = SuspicionFusionEngine::new();
        for expected in 1..=5 {
            assert_eq!(engine.update(&suspicious()).buffer, expected);
        }
    }

    #[test]
    fn test_recovery_floors_at_zero() {
        let mut engine = SuspicionFusionEngine::new();
        for _ in 0..6 {
            engine.update(&suspicious());
        }
        assert_eq!(engine.update(&calm()).buffer, 2);
        assert_eq!(engine.update(&calm()).buffer, 0);
        assert_eq!(engine.update(&calm()).buffer, 0);
    }

    #[test]
    fn test_threshold_is_strict() {
        let mut engine = SuspicionFusionEngine::new();
        for _ in 0..8 {
            let v = engine.update(&suspicious());
            assert_eq!(v.state, AlertState::Safe);
        }
        assert_eq!(engine.buffer(), 8);

        let v = engine.update(&suspicious());
        assert_eq!(v.buffer, 9);
        assert_eq!(v.state, AlertState::Suspicious(CheatReason::LookingAway));
    }

    #[test]
    fn test_brief_glance_never_alerts() {
        let mut engine = SuspicionFusionEngine::new();
        for _ in 0..20 {
            let v = engine.update(&suspicious());
            assert_eq!(v.state, AlertState::Safe);
            for _ in 0..3 {
                let v = engine.update(&calm());
                assert_eq!(v.state, AlertState::Safe);
            }
            assert_eq!(engine.buffer(), 0);
        }
    }

    #[test]
    fn test_alert_keeps_reason_that_raised_it() {
        let mut engine = SuspicionFusionEngine::new();
        for _ in 0..20 {
            engine.update(&suspicious());
        }
        // One calm frame: 20 -> 16, still above threshold
        let v = engine.update(&calm());
        assert_eq!(v.frame_reason, None);
        assert_eq!(v.state, AlertState::Suspicious(CheatReason::LookingAway));
        assert_eq!(v.status_text(), "Suspicious: Looking Away");
    }

    #[test]
    fn test_latest_reason_is_displayed() {
        let mut engine = SuspicionFusionEngine::new();
        for _ in 0..9 {
            engine.update(&suspicious());
        }
        let v = engine.update(&signals(true, HeadDirection::Forward, GazeDirection::Center));
        assert_eq!(v.state, AlertState::Suspicious(CheatReason::MobileDetected));
    }

    #[test]
    fn test_nervous_annotation_is_independent_of_alert() {
        let mut engine = SuspicionFusionEngine::new();
        let mut s = calm();
        s.emotion = "fear";
        let v = engine.update(&s);
        assert_eq!(v.state, AlertState::Safe);
        assert!(v.nervous);
        assert_eq!(v.status_text(), "Safe (Nervous?)");
        assert_eq!(engine.buffer(), 0);
    }

    #[test]
    fn test_is_nervous() {
        assert!(is_nervous("fear"));
        assert!(is_nervous("sad"));
        assert!(is_nervous("Sad"));
        assert!(!is_nervous("happy"));
        assert!(!is_nervous("Neutral"));
        assert!(!is_nervous(""));
    }
}
