//! Encoder invocation: run the external transcoder as a child process.
//!
//! The encoder is a black box. Success is decided by exit status alone; progress
//! output is never parsed, only forwarded to tracing.

use async_trait::async_trait;
use packetized_core::StreamFormat;
use std::collections::VecDeque;
use std::path::Path;
use std::process::{ExitStatus, Stdio};
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tokio::task::JoinHandle;

use crate::profile::EncodeProfile;

/// Number of trailing stderr lines kept for error messages.
const STDERR_TAIL_LINES: usize = 20;

#[derive(Debug, Error)]
pub enum EncodeError {
    #[error("failed to spawn {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("encoder exited with {status}: {stderr_tail}")]
    NonZeroExit {
        status: ExitStatus,
        stderr_tail: String,
    },

    #[error("encoder timed out after {0:?} and was killed")]
    Timeout(Duration),

    #[error("encoder I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid encoder configuration: {0}")]
    Config(String),
}

/// What the encoder printed, for logs and diagnostics.
#[derive(Debug, Clone, Default)]
pub struct EncodeOutput {
    pub stdout_lines: usize,
    pub stderr_tail: String,
    pub elapsed: Duration,
}

/// Produces a local output tree for one format from a local input file.
#[async_trait]
pub trait Encoder: Send + Sync {
    async fn invoke(
        &self,
        input: &Path,
        output_dir: &Path,
        format: StreamFormat,
        profile: &EncodeProfile,
    ) -> Result<EncodeOutput, EncodeError>;
}

/// ffmpeg-backed encoder with a hard deadline per invocation.
#[derive(Debug, Clone)]
pub struct FfmpegEncoder {
    ffmpeg_path: String,
    timeout: Duration,
}

impl FfmpegEncoder {
    pub fn new(ffmpeg_path: String, timeout: Duration) -> Result<Self, EncodeError> {
        validate_program_path(&ffmpeg_path)?;
        if timeout.is_zero() {
            return Err(EncodeError::Config(
                "encode timeout must be greater than zero".to_string(),
            ));
        }
        Ok(Self {
            ffmpeg_path,
            timeout,
        })
    }
}

#[async_trait]
impl Encoder for FfmpegEncoder {
    #[tracing::instrument(skip(self, input, output_dir, profile), fields(
        process.executable.path = %self.ffmpeg_path,
        format = %format,
        profile = profile.version,
    ))]
    async fn invoke(
        &self,
        input: &Path,
        output_dir: &Path,
        format: StreamFormat,
        profile: &EncodeProfile,
    ) -> Result<EncodeOutput, EncodeError> {
        tokio::fs::create_dir_all(output_dir).await?;
        if format == StreamFormat::Hls {
            for rung in &profile.ladder {
                tokio::fs::create_dir_all(output_dir.join(EncodeProfile::hls_variant_dir(rung)))
                    .await?;
            }
        }

        let args = profile.ffmpeg_args(format, input, output_dir);
        run_with_deadline(&self.ffmpeg_path, &args, self.timeout).await
    }
}

/// Reject program paths with shell metacharacters.
pub(crate) fn validate_program_path(path: &str) -> Result<(), EncodeError> {
    if path.is_empty() {
        return Err(EncodeError::Config("program path is empty".to_string()));
    }
    if !path.chars().all(|c| {
        c.is_alphanumeric() || matches!(c, '/' | '-' | '_' | '.' | '\\' | ':' | ' ')
    }) {
        return Err(EncodeError::Config(format!(
            "program path contains unsafe characters: {}",
            path
        )));
    }
    Ok(())
}

/// Spawn `program`, forward its output to tracing and wait at most `timeout`.
///
/// On expiry the child is killed and reaped before returning `EncodeError::Timeout`.
pub async fn run_with_deadline(
    program: &str,
    args: &[String],
    timeout: Duration,
) -> Result<EncodeOutput, EncodeError> {
    let start = Instant::now();
    tracing::debug!(command = %format!("{} {}", program, args.join(" ")), "Spawning encoder");

    let mut child = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|source| EncodeError::Spawn {
            program: program.to_string(),
            source,
        })?;

    let stdout_handle = child.stdout.take().map(|stdout| forward_lines(stdout, "stdout", 0));
    let stderr_handle = child
        .stderr
        .take()
        .map(|stderr| forward_lines(stderr, "stderr", STDERR_TAIL_LINES));

    let status = match tokio::time::timeout(timeout, child.wait()).await {
        Ok(status) => status?,
        Err(_) => {
            if let Err(e) = child.kill().await {
                tracing::error!(error = %e, "Failed to kill timed out encoder");
            }
            tracing::error!(
                timeout_secs = timeout.as_secs_f64(),
                "Encoder exceeded deadline and was killed"
            );
            if let Some(handle) = stdout_handle {
                handle.abort();
            }
            if let Some(handle) = stderr_handle {
                handle.abort();
            }
            return Err(EncodeError::Timeout(timeout));
        }
    };

    let stdout_lines = match stdout_handle {
        Some(handle) => handle.await.map(|(count, _)| count).unwrap_or(0),
        None => 0,
    };
    let stderr_tail = match stderr_handle {
        Some(handle) => handle.await.map(|(_, tail)| tail).unwrap_or_default(),
        None => String::new(),
    };

    let output = EncodeOutput {
        stdout_lines,
        stderr_tail,
        elapsed: start.elapsed(),
    };

    if !status.success() {
        tracing::warn!(
            exit_code = ?status.code(),
            duration_ms = output.elapsed.as_secs_f64() * 1000.0,
            "Encoder exited unsuccessfully"
        );
        return Err(EncodeError::NonZeroExit {
            status,
            stderr_tail: output.stderr_tail,
        });
    }

    tracing::info!(
        duration_ms = output.elapsed.as_secs_f64() * 1000.0,
        "Encoder finished"
    );

    Ok(output)
}

/// Forward each line of `reader` to tracing, returning the line count and the last
/// `keep` lines joined by newlines.
///
/// Reads to EOF whatever the bytes are. Lines that are not UTF-8 are decoded lossily;
/// stopping early would close the pipe and kill the child with SIGPIPE.
fn forward_lines<R>(reader: R, stream: &'static str, keep: usize) -> JoinHandle<(usize, String)>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut reader = BufReader::new(reader);
        let mut buf = Vec::with_capacity(256);
        let mut tail: VecDeque<String> = VecDeque::with_capacity(keep);
        let mut count = 0usize;

        loop {
            buf.clear();
            match reader.read_until(b'\n', &mut buf).await {
                Ok(0) => break,
                Ok(_) => {}
                Err(e) => {
                    tracing::warn!(stream, error = %e, "Failed to read encoder output");
                    break;
                }
            }

            let line = String::from_utf8_lossy(&buf);
            let line = line.trim_end_matches(['\n', '\r']);
            count += 1;
            tracing::debug!(target: "packetized::encoder", stream, "{}", line);
            if keep > 0 {
                if tail.len() == keep {
                    tail.pop_front();
                }
                tail.push_back(line.to_string());
            }
        }

        (count, Vec::from(tail).join("\n"))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_program_path_validation() {
        assert!(validate_program_path("ffmpeg").is_ok());
        assert!(validate_program_path("/usr/local/bin/ffmpeg").is_ok());
        assert!(validate_program_path("C:\\tools\\ffmpeg.exe").is_ok());
        assert!(validate_program_path("ffmpeg; rm -rf /").is_err());
        assert!(validate_program_path("$(whoami)").is_err());
        assert!(validate_program_path("").is_err());
    }

    #[test]
    fn test_zero_timeout_rejected() {
        assert!(FfmpegEncoder::new("ffmpeg".to_string(), Duration::ZERO).is_err());
    }

    #[tokio::test]
    async fn test_spawn_failure_is_reported() {
        let result = run_with_deadline(
            "/definitely/not/a/real/encoder",
            &[],
            Duration::from_secs(5),
        )
        .await;
        assert!(matches!(result, Err(EncodeError::Spawn { .. })));
    }

    #[cfg(unix)]
    mod unix {
        use super::*;
        use std::os::unix::fs::PermissionsExt;
        use tempfile::TempDir;

        fn script(dir: &TempDir, body: &str) -> String {
            let path = dir.path().join("fake-encoder.sh");
            std::fs::write(&path, format!("#!/bin/sh\n{}\n", body)).unwrap();
            std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
            path.to_string_lossy().to_string()
        }

        #[tokio::test]
        async fn test_success_counts_output() {
            let dir = tempfile::tempdir().unwrap();
            let program = script(&dir, "echo one\necho two\necho warn >&2\nexit 0");

            let output = run_with_deadline(&program, &[], Duration::from_secs(10))
                .await
                .unwrap();
            assert_eq!(output.stdout_lines, 2);
            assert_eq!(output.stderr_tail, "warn");
        }

        #[tokio::test]
        async fn test_nonzero_exit_keeps_stderr_tail() {
            let dir = tempfile::tempdir().unwrap();
            let program = script(&dir, "echo 'Invalid data found' >&2\nexit 1");

            let err = run_with_deadline(&program, &[], Duration::from_secs(10))
                .await
                .unwrap_err();
            match err {
                EncodeError::NonZeroExit { status, stderr_tail } => {
                    assert_eq!(status.code(), Some(1));
                    assert!(stderr_tail.contains("Invalid data found"));
                }
                other => panic!("unexpected error: {other:?}"),
            }
        }

        #[tokio::test]
        async fn test_non_utf8_stderr_is_drained() {
            let dir = tempfile::tempdir().unwrap();
            let program = script(
                &dir,
                "printf 'title: \\377\\376\\n' >&2\n\
                 i=0\n\
                 while [ $i -lt 2000 ]; do echo \"frame=$i\" >&2; i=$((i+1)); done\n\
                 exit 0",
            );

            let output = run_with_deadline(&program, &[], Duration::from_secs(30))
                .await
                .unwrap();
            assert_eq!(output.stderr_tail.lines().count(), STDERR_TAIL_LINES);
            assert!(output.stderr_tail.ends_with("frame=1999"));
        }

        #[tokio::test]
        async fn test_deadline_kills_child() {
            let dir = tempfile::tempdir().unwrap();
            let program = script(&dir, "exec sleep 30");

            let start = Instant::now();
            let err = run_with_deadline(&program, &[], Duration::from_millis(200))
                .await
                .unwrap_err();
            assert!(matches!(err, EncodeError::Timeout(_)));
            assert!(start.elapsed() < Duration::from_secs(10));
        }

        #[tokio::test]
        async fn test_ffmpeg_encoder_creates_hls_variant_dirs() {
            let dir = tempfile::tempdir().unwrap();
            let program = script(&dir, "exit 0");
            let encoder = FfmpegEncoder::new(program, Duration::from_secs(10)).unwrap();
            let out = dir.path().join("out").join("HLS");

            encoder
                .invoke(
                    &dir.path().join("input.mp4"),
                    &out,
                    StreamFormat::Hls,
                    &EncodeProfile::v1(),
                )
                .await
                .unwrap();

            for rung in ["360p", "720p", "1080p"] {
                assert!(out.join(rung).is_dir());
            }
        }
    }
}
