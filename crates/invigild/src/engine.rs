use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use invigil_core::{
    Baseline, EmotionClassifier, FaceDetection, FrameScheduler, LandmarkDetector, ObjectDetection,
    ObjectDetector, RenderPayload, SchedulerStats, Session,
};
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};

use crate::config::Config;
use crate::emotion::EmotionTask;
use crate::source::{DirectoryFrameSource, SourceError};

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("frame source error: {0}")]
    Source(#[from] SourceError),
    #[error("failed to spawn engine thread: {0}")]
    Spawn(#[source] std::io::Error),
    #[error("engine thread exited")]
    ChannelClosed,
}

/// The external perception services the engine drives.
pub struct Collaborators {
    pub landmarks: Box<dyn LandmarkDetector + Send>,
    pub objects: Box<dyn ObjectDetector + Send>,
    pub emotion: Arc<dyn EmotionClassifier>,
}

/// Totals reported when the frame source is exhausted.
#[derive(Debug, Clone)]
pub struct EngineSummary {
    pub frames: u64,
    pub alert_frames: u64,
    pub skipped_frames: usize,
    pub scheduler: SchedulerStats,
    pub final_buffer: u32,
}

/// Messages sent from request handlers to the engine thread.
enum EngineRequest {
    Calibrate {
        reply: oneshot::Sender<Baseline>,
    },
    Status {
        reply: oneshot::Sender<Option<RenderPayload>>,
    },
}

/// Clone-safe handle to the engine thread.
#[derive(Clone)]
pub struct EngineHandle {
    tx: mpsc::Sender<EngineRequest>,
}

impl EngineHandle {
    /// Capture the current smoothed head pose as the neutral baseline.
    /// Takes effect from the next frame.
    pub async fn calibrate(&self) -> Result<Baseline, EngineError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(EngineRequest::Calibrate { reply: reply_tx })
            .await
            .map_err(|_| EngineError::ChannelClosed)?;
        reply_rx.await.map_err(|_| EngineError::ChannelClosed)
    }

    /// Most recent render payload, if any frame has been processed.
    pub async fn status(&self) -> Result<Option<RenderPayload>, EngineError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(EngineRequest::Status { reply: reply_tx })
            .await
            .map_err(|_| EngineError::ChannelClosed)?;
        reply_rx.await.map_err(|_| EngineError::ChannelClosed)
    }
}

/// Spawn the engine on a dedicated OS thread, inside the caller's span.
///
/// Opens the frame source synchronously so that a missing or empty source
/// fails fast, then runs the frame loop until the source is exhausted. The
/// summary is delivered on the returned receiver when the loop ends.
pub fn spawn_engine(
    config: &Config,
    collaborators: Collaborators,
    runtime: tokio::runtime::Handle,
) -> Result<(EngineHandle, oneshot::Receiver<EngineSummary>), EngineError> {
    let source = DirectoryFrameSource::open(&config.frames_dir, config.mirror)?;

    let (tx, rx) = mpsc::channel::<EngineRequest>(4);
    let (done_tx, done_rx) = oneshot::channel();

    let frame_loop = FrameLoop {
        source,
        landmarks: collaborators.landmarks,
        objects: collaborators.objects,
        emotion: EmotionTask::new(collaborators.emotion, runtime),
        scheduler: FrameScheduler::new(config.object_interval, config.emotion_interval),
        session: Session::new(),
        requests: rx,
        calibrate_at_frame: config.calibrate_at_frame,
        frame_interval: Duration::from_millis(config.frame_interval_ms),
        emit_payloads: config.emit_payloads,
    };

    let span = tracing::Span::current();
    std::thread::Builder::new()
        .name("invigil-engine".into())
        .spawn(move || {
            let _guard = span.enter();
            tracing::info!("engine thread started");
            let summary = frame_loop.run();
            tracing::info!(
                frames = summary.frames,
                alert_frames = summary.alert_frames,
                skipped = summary.skipped_frames,
                "engine thread exiting"
            );
            let _ = done_tx.send(summary);
        })
        .map_err(EngineError::Spawn)?;

    Ok((EngineHandle { tx }, done_rx))
}

struct FrameLoop {
    source: DirectoryFrameSource,
    landmarks: Box<dyn LandmarkDetector + Send>,
    objects: Box<dyn ObjectDetector + Send>,
    emotion: EmotionTask,
    scheduler: FrameScheduler,
    session: Session,
    requests: mpsc::Receiver<EngineRequest>,
    calibrate_at_frame: Option<u64>,
    frame_interval: Duration,
    emit_payloads: bool,
}

impl FrameLoop {
    fn run(mut self) -> EngineSummary {
        let mut frames = 0u64;
        let mut alert_frames = 0u64;
        let mut last_payload: Option<RenderPayload> = None;

        while let Some(frame) = self.source.next() {
            let plan = self.scheduler.plan(frame.index);

            if plan.run_object_detection {
                let objects = self.objects.detect_target(&frame).unwrap_or_else(|e| {
                    tracing::warn!(frame = frame.index, error = %e, "object detection failed");
                    ObjectDetection::default()
                });
                self.session.update_objects(objects);
            }

            let faces: Vec<FaceDetection> = self.landmarks.detect(&frame).unwrap_or_else(|e| {
                tracing::warn!(frame = frame.index, error = %e, "landmark detection failed");
                Vec::new()
            });

            if plan.dispatch_emotion {
                drop(self.emotion.dispatch(&frame));
            }
            let emotion = self.emotion.latest();

            let report = self.session.process(&frame, faces.first(), &emotion);
            frames += 1;
            if report.verdict.state.is_suspicious() {
                alert_frames += 1;
            }

            if self.calibrate_at_frame == Some(frame.index) {
                self.session.calibrate();
            }

            let payload = RenderPayload::from_report(&report, Utc::now());
            if self.emit_payloads {
                emit(&payload);
            }
            last_payload = Some(payload);

            self.drain_requests(&last_payload);

            if !self.frame_interval.is_zero() {
                std::thread::sleep(self.frame_interval);
            }
        }

        EngineSummary {
            frames,
            alert_frames,
            skipped_frames: self.source.skipped(),
            scheduler: self.scheduler.stats(),
            final_buffer: self.session.buffer(),
        }
    }

    /// Answer pending requests without blocking the frame loop.
    fn drain_requests(&mut self, last_payload: &Option<RenderPayload>) {
        while let Ok(req) = self.requests.try_recv() {
            match req {
                EngineRequest::Calibrate { reply } => {
                    let baseline = self.session.calibrate();
                    let _ = reply.send(baseline);
                }
                EngineRequest::Status { reply } => {
                    let _ = reply.send(last_payload.clone());
                }
            }
        }
    }
}

/// Write one payload as a JSON line on stdout.
fn emit(payload: &RenderPayload) {
    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    let written = serde_json::to_writer(&mut out, payload)
        .map_err(std::io::Error::from)
        .and_then(|()| out.write_all(b"\n"));
    if let Err(e) = written {
        tracing::warn!(frame = payload.frame, error = %e, "failed to emit payload");
    }
}
