//! LibreOffice conversion engine.
//!
//! Handles the low-level details of invoking the headless converter and
//! waiting for its output file.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tokio::time::{self, Instant};

use super::traits::DocumentConverter;
use super::GeneratorError;
use crate::metrics;

/// Interval between existence checks for the converted file.
pub const POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Runs `<program> --headless --convert-to <format> <input> --outdir <dir>`.
///
/// One timeout bounds the whole call: whatever the process does not use of
/// it is left for polling the output file, never more.
#[derive(Debug, Clone)]
pub struct LibreOfficeEngine {
    program: PathBuf,
    timeout: Duration,
    poll_interval: Duration,
}

impl LibreOfficeEngine {
    pub fn new(program: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            program: program.into(),
            timeout,
            poll_interval: POLL_INTERVAL,
        }
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Where the converter is expected to put its output for `input`.
    pub fn expected_output(input: &Path, target_format: &str) -> PathBuf {
        input.with_extension(target_format)
    }

    async fn run(&self, input: &Path, target_format: &str) -> Result<PathBuf, GeneratorError> {
        let started = Instant::now();
        let deadline = started + self.timeout;
        let out_dir = match input.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
            _ => PathBuf::from("."),
        };

        log::debug!(
            "Converting {} to {} with {}",
            input.display(),
            target_format,
            self.program.display()
        );

        let child = Command::new(&self.program)
            .arg("--headless")
            .arg("--convert-to")
            .arg(target_format)
            .arg(input)
            .arg("--outdir")
            .arg(&out_dir)
            .current_dir(&out_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(GeneratorError::ConversionIo)?;

        // Dropping the wait future on timeout drops the child, which kills it.
        let output = match time::timeout_at(deadline, child.wait_with_output()).await {
            Ok(result) => result.map_err(GeneratorError::ConversionIo)?,
            Err(_) => {
                log::warn!(
                    "Conversion of {} exceeded {:?}, process killed",
                    input.display(),
                    self.timeout
                );
                return Err(GeneratorError::ConversionTimeout(self.timeout));
            }
        };

        let stdout = String::from_utf8_lossy(&output.stdout);
        if !stdout.trim().is_empty() {
            log::debug!("Converter stdout: {}", stdout.trim());
        }

        if !output.status.success() {
            let code = output.status.code().unwrap_or(-1);
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            return Err(GeneratorError::ConversionFailed { code, stderr });
        }

        let expected = Self::expected_output(input, target_format);
        let expected = Self::wait_for_artifact(expected, deadline, self.poll_interval).await?;
        metrics::CONVERSION_SECONDS.observe(started.elapsed().as_secs_f64());
        Ok(expected)
    }

    /// Poll for `expected` until `deadline`.
    ///
    /// The first check runs unbounded: a process that exited cleanly just
    /// before the deadline still gets its output seen.
    async fn wait_for_artifact(
        expected: PathBuf,
        deadline: Instant,
        poll_interval: Duration,
    ) -> Result<PathBuf, GeneratorError> {
        if tokio::fs::try_exists(&expected).await.unwrap_or(false) {
            return Ok(expected);
        }

        loop {
            let now = Instant::now();
            if now >= deadline {
                return Err(GeneratorError::ArtifactNotProduced(expected));
            }
            time::sleep(poll_interval.min(deadline - now)).await;

            if time::timeout_at(deadline, tokio::fs::try_exists(&expected))
                .await
                .is_ok_and(|exists| exists.unwrap_or(false))
            {
                return Ok(expected);
            }
        }
    }
}

#[async_trait]
impl DocumentConverter for LibreOfficeEngine {
    async fn convert(&self, input: &Path, target_format: &str) -> Result<PathBuf, GeneratorError> {
        self.run(input, target_format).await
    }
}
