use anyhow::{bail, Context, Result};
use log::info;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::capture::recorder::recorder_loop;
use crate::capture::sources::CaptureDevices;
use crate::capture::RecorderConfig;
use crate::db::Database;

/// Owns the recorder task and its cancellation token.
pub struct RecorderController {
    handle: Option<JoinHandle<()>>,
    cancel_token: Option<CancellationToken>,
}

impl RecorderController {
    pub fn new() -> Self {
        Self {
            handle: None,
            cancel_token: None,
        }
    }

    pub fn start(
        &mut self,
        devices: CaptureDevices,
        db: Database,
        config: RecorderConfig,
    ) -> Result<()> {
        if self.handle.is_some() {
            bail!("recorder already active");
        }

        let cancel_token = CancellationToken::new();
        let token_clone = cancel_token.clone();

        let handle = tokio::spawn(recorder_loop(devices, db, config, token_clone));

        self.handle = Some(handle);
        self.cancel_token = Some(cancel_token);
        info!("Recorder started");
        Ok(())
    }

    /// Cancel the loop and wait for the in-flight capture to finish.
    pub async fn stop(&mut self) -> Result<()> {
        if let Some(token) = self.cancel_token.take() {
            token.cancel();
        }

        if let Some(handle) = self.handle.take() {
            handle
                .await
                .context("recorder loop task failed to join")
                .map(|_| ())
        } else {
            Ok(())
        }
    }

    pub fn is_running(&self) -> bool {
        self.handle.is_some()
    }
}

impl Default for RecorderController {
    fn default() -> Self {
        Self::new()
    }
}
