use std::{fs, path::Path, sync::Arc};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use log::{error, info, warn};
use tokio::time::{Duration, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::capture::sources::{CaptureDevices, WindowInfo};
use crate::capture::RecorderConfig;
use crate::db::{ActivityRecord, Database};

/// Drive the capture devices on a fixed interval until cancelled.
///
/// Each tick produces at most one activity record. A capture that fails
/// or overruns the timeout is logged and dropped; the loop itself never
/// dies, because a tracker that silently stops recording is worse than
/// one that misses a tick.
pub async fn recorder_loop(
    devices: CaptureDevices,
    db: Database,
    config: RecorderConfig,
    cancel_token: CancellationToken,
) {
    let mut ticker = tokio::time::interval(Duration::from_secs(config.interval_secs));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let timestamp = Utc::now();
                let fut = capture_once(&devices, &db, &config, timestamp);

                match tokio::time::timeout(Duration::from_secs(config.capture_timeout_secs), fut).await {
                    Ok(Ok(())) => {}
                    Ok(Err(err)) => error!("Capture failed: {err:?}"),
                    Err(_) => warn!("Capture timeout (> {}s)", config.capture_timeout_secs),
                }
            }
            _ = cancel_token.cancelled() => {
                info!("Recorder loop shutting down");
                break;
            }
        }
    }
}

/// Run one capture tick: screenshot, window metadata, OCR, embedding,
/// then a single row in the activity log.
///
/// Degradation policy: only a database failure aborts the tick. A window
/// inspector failure records "Unknown"; a screen failure records the
/// metadata without screenshot, OCR or embedding; OCR and embedder
/// failures leave their columns NULL.
async fn capture_once(
    devices: &CaptureDevices,
    db: &Database,
    config: &RecorderConfig,
    timestamp: DateTime<Utc>,
) -> Result<()> {
    let window = match devices.windows.active_window() {
        Ok(info) => info,
        Err(err) => {
            warn!("Active window lookup failed: {err}");
            WindowInfo {
                app_name: "Unknown".to_string(),
                title: "Unknown".to_string(),
            }
        }
    };

    let screen = Arc::clone(&devices.screen);
    let png_bytes = match tokio::task::spawn_blocking(move || screen.capture())
        .await
        .context("screenshot worker join failed")?
    {
        Ok(bytes) => Some(bytes),
        Err(err) => {
            error!("Screen capture failed: {err:?}");
            None
        }
    };

    let screenshot_path = match &png_bytes {
        Some(bytes) => match save_screenshot(&config.screenshots_dir, timestamp, bytes) {
            Ok(path) => Some(path),
            Err(err) => {
                error!("Failed to save screenshot: {err:?}");
                None
            }
        },
        None => None,
    };

    let (ocr_text, embedding) = match png_bytes {
        Some(bytes) => {
            let bytes = Arc::new(bytes);

            let ocr_text = match tokio::task::spawn_blocking({
                let ocr = Arc::clone(&devices.ocr);
                let bytes = Arc::clone(&bytes);
                move || ocr.extract_text(&bytes)
            })
            .await
            .context("ocr worker join failed")?
            {
                Ok(text) if !text.trim().is_empty() => Some(text),
                Ok(_) => None,
                Err(err) => {
                    warn!("OCR failed: {err}");
                    None
                }
            };

            let embedding = match tokio::task::spawn_blocking({
                let embedder = Arc::clone(&devices.embedder);
                let bytes = Arc::clone(&bytes);
                move || embedder.embed_image(&bytes)
            })
            .await
            .context("embedding worker join failed")?
            {
                Ok(vector) => Some(vector),
                Err(err) => {
                    warn!("Image embedding failed: {err}");
                    None
                }
            };

            (ocr_text, embedding)
        }
        None => (None, None),
    };

    let record = ActivityRecord {
        id: None,
        timestamp,
        app_name: window.app_name,
        window_title: window.title,
        screenshot_path,
        ocr_text,
        embedding,
    };

    db.insert_activity_record(&record)
        .await
        .context("failed to persist activity record")?;

    Ok(())
}

/// Store PNG bytes under `<root>/<YYYY-MM-DD>/<HH-MM-SS>.png` and return
/// the path as recorded in the log.
fn save_screenshot(root: &Path, timestamp: DateTime<Utc>, png_bytes: &[u8]) -> Result<String> {
    let day_dir = root.join(timestamp.format("%Y-%m-%d").to_string());
    fs::create_dir_all(&day_dir)
        .with_context(|| format!("failed to create screenshot directory {}", day_dir.display()))?;

    let path = day_dir.join(format!("{}.png", timestamp.format("%H-%M-%S")));
    fs::write(&path, png_bytes)
        .with_context(|| format!("failed to write screenshot {}", path.display()))?;

    Ok(path.display().to_string())
}
