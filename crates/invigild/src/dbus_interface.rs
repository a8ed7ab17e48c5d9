use zbus::interface;

use crate::engine::EngineHandle;

pub const BUS_NAME: &str = "org.freedesktop.Invigil1";
pub const OBJECT_PATH: &str = "/org/freedesktop/Invigil1";

/// D-Bus interface for the proctoring daemon.
///
/// Bus name: org.freedesktop.Invigil1
/// Object path: /org/freedesktop/Invigil1
pub struct InvigilService {
    pub engine: EngineHandle,
    pub session_id: String,
}

#[interface(name = "org.freedesktop.Invigil1")]
impl InvigilService {
    /// Capture the current smoothed head pose as the neutral baseline.
    ///
    /// Returns the stored (yaw, pitch).
    async fn calibrate(&self) -> zbus::fdo::Result<(f64, f64)> {
        tracing::info!("calibration requested");
        let baseline = self.engine.calibrate().await.map_err(|e| {
            tracing::error!(error = %e, "calibration failed");
            zbus::fdo::Error::Failed(e.to_string())
        })?;
        Ok((f64::from(baseline.yaw), f64::from(baseline.pitch)))
    }

    /// Return daemon status and the latest render payload as JSON.
    async fn status(&self) -> zbus::fdo::Result<String> {
        let payload = self
            .engine
            .status()
            .await
            .map_err(|e| zbus::fdo::Error::Failed(e.to_string()))?;

        Ok(serde_json::json!({
            "version": env!("CARGO_PKG_VERSION"),
            "session": self.session_id,
            "payload": payload,
        })
        .to_string())
    }
}
