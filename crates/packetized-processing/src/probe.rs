use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use std::path::Path;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;

use crate::encoder::validate_program_path;

/// Reads the playback duration of a staged input.
#[async_trait]
pub trait DurationProbe: Send + Sync {
    async fn duration_seconds(&self, input: &Path) -> Result<f64>;
}

/// ffprobe-backed duration probe. A probe that outlives `timeout` is killed.
#[derive(Debug, Clone)]
pub struct FfprobeProbe {
    ffprobe_path: String,
    timeout: Duration,
}

impl FfprobeProbe {
    pub fn new(ffprobe_path: String, timeout: Duration) -> Result<Self> {
        validate_program_path(&ffprobe_path).context("Invalid ffprobe_path")?;
        if timeout.is_zero() {
            return Err(anyhow!("probe timeout must be greater than zero"));
        }
        Ok(Self {
            ffprobe_path,
            timeout,
        })
    }
}

#[async_trait]
impl DurationProbe for FfprobeProbe {
    #[tracing::instrument(skip(self), fields(
        process.executable.name = "ffprobe",
        process.executable.path = %self.ffprobe_path,
    ))]
    async fn duration_seconds(&self, input: &Path) -> Result<f64> {
        let start = std::time::Instant::now();

        let child = Command::new(&self.ffprobe_path)
            .args(["-v", "quiet", "-print_format", "json", "-show_format"])
            .arg(input)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output();

        // Dropping the timed-out future drops the child, which kills it.
        let output = tokio::time::timeout(self.timeout, child)
            .await
            .map_err(|_| anyhow!("ffprobe timed out after {:?}", self.timeout))?
            .context("Failed to execute ffprobe")?;

        if !output.status.success() {
            return Err(anyhow!(
                "ffprobe failed: {}",
                String::from_utf8_lossy(&output.stderr)
            ));
        }

        let duration = parse_ffprobe_duration(&output.stdout)?;

        tracing::info!(
            duration_ms = start.elapsed().as_millis(),
            video_duration = duration,
            "Duration probe completed"
        );

        Ok(duration)
    }
}

/// Extract `format.duration` from ffprobe's JSON output.
pub fn parse_ffprobe_duration(stdout: &[u8]) -> Result<f64> {
    let probe_data: serde_json::Value =
        serde_json::from_slice(stdout).context("Failed to parse ffprobe output")?;

    let duration = &probe_data["format"]["duration"];
    duration
        .as_str()
        .and_then(|d| d.parse::<f64>().ok())
        .or_else(|| duration.as_f64())
        .filter(|d| d.is_finite() && *d >= 0.0)
        .ok_or_else(|| anyhow!("Could not parse duration"))
}
