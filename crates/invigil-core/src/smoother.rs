use std::collections::HashMap;

/// Weight of the newest observation in the moving average.
pub const SMOOTHING_ALPHA: f32 = 0.4;

/// Continuous signals that are smoothed across frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SignalId {
    Yaw,
    Pitch,
    Gaze,
}

impl SignalId {
    /// Value reported for a signal that has never been observed.
    pub fn neutral(self) -> f32 {
        match self {
            Self::Yaw | Self::Pitch => 0.0,
            Self::Gaze => crate::gaze::NO_INFORMATION,
        }
    }

    /// A gaze reading of exactly zero means both eye estimates failed; it is
    /// not a measurement and must not enter the average.
    fn is_failure_artifact(self, raw: f32) -> bool {
        matches!(self, Self::Gaze) && raw == 0.0
    }
}

/// Exponential moving average per signal.
///
/// The first accepted observation of a signal seeds the average directly, so
/// there is no warm-up bias toward zero. Values persist for the lifetime of the
/// smoother; nothing resets them.
#[derive(Debug, Clone)]
pub struct SignalSmoother {
    alpha: f32,
    values: HashMap<SignalId, f32>,
}

impl SignalSmoother {
    pub fn new() -> Self {
        Self::with_alpha(SMOOTHING_ALPHA)
    }

    pub fn with_alpha(alpha: f32) -> Self {
        Self {
            alpha,
            values: HashMap::new(),
        }
    }

    /// Fold `raw` into the running average and return the smoothed value.
    ///
    /// Non-finite inputs and gaze failure artifacts leave the average untouched.
    pub fn update(&mut self, signal: SignalId, raw: f32) -> f32 {
        if !raw.is_finite() || signal.is_failure_artifact(raw) {
            tracing::trace!(?signal, raw, "smoother: skipping update");
            return self.value_or_neutral(signal);
        }

        let alpha = self.alpha;
        let smoothed = self
            .values
            .entry(signal)
            .and_modify(|prev| *prev = alpha * raw + (1.0 - alpha) * *prev)
            .or_insert(raw);
        *smoothed
    }

    /// Current smoothed value, if the signal has been observed.
    pub fn value(&self, signal: SignalId) -> Option<f32> {
        self.values.get(&signal).copied()
    }

    pub fn value_or_neutral(&self, signal: SignalId) -> f32 {
        self.value(signal).unwrap_or_else(|| signal.neutral())
    }
}

impl Default for SignalSmoother {
    fn default() -> Self {
        Self::new()
    }
}
