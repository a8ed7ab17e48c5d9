use std::sync::Arc;

use invigil_core::{EmotionClassifier, Frame, NEUTRAL_EMOTION};
use tokio::runtime::Handle;
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// Fire-and-forget emotion classification feeding a single "latest" slot.
///
/// `dispatch` runs the classifier on the blocking pool and returns at once.
/// Results are written with last-write-wins semantics, so a slow task that
/// finishes after a newer one overwrites it; the label is advisory and the
/// frame loop accepts that. A failed classification leaves the slot untouched.
/// Tasks still running at shutdown are abandoned, not awaited; `main` shuts
/// the runtime down in the background.
pub struct EmotionTask {
    classifier: Arc<dyn EmotionClassifier>,
    slot: Arc<watch::Sender<String>>,
    latest: watch::Receiver<String>,
    runtime: Handle,
}

impl EmotionTask {
    pub fn new(classifier: Arc<dyn EmotionClassifier>, runtime: Handle) -> Self {
        let (tx, rx) = watch::channel(NEUTRAL_EMOTION.to_string());
        Self {
            classifier,
            slot: Arc::new(tx),
            latest: rx,
            runtime,
        }
    }

    /// Start classifying `frame` in the background. The returned handle may be
    /// dropped; the task is never cancelled.
    pub fn dispatch(&self, frame: &Frame) -> JoinHandle<()> {
        let frame = frame.clone();
        let classifier = Arc::clone(&self.classifier);
        let slot = Arc::clone(&self.slot);

        self.runtime.spawn_blocking(move || match classifier.classify(&frame) {
            Ok(label) => {
                tracing::debug!(frame = frame.index, emotion = %label, "emotion updated");
                slot.send_replace(label);
            }
            Err(e) => {
                tracing::warn!(frame = frame.index, error = %e, "emotion classification failed");
            }
        })
    }

    /// Most recently written label. Never waits for an in-flight task.
    pub fn latest(&self) -> String {
        self.latest.borrow().clone()
    }
}
