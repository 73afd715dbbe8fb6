//! Fetch-Script Provider
//!
//! Runs an external data-fetch script and reads its JSON envelope from stdout:
//! `<python> <script> <code> [start] [end]`.

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;

use super::{DateRange, FundCode, PriceProvider, decode_envelope};
use crate::error::{BacktestError, Result};
use crate::model::PricePoint;

const DATE_ARG_FORMAT: &str = "%Y-%m-%d";

/// Provider backed by a local fetch script
pub struct ScriptProvider {
    interpreter: String,
    script: PathBuf,
    timeout: Duration,
}

impl ScriptProvider {
    pub fn new(interpreter: impl Into<String>, script: impl Into<PathBuf>) -> Self {
        Self {
            interpreter: interpreter.into(),
            script: script.into(),
            timeout: Duration::from_secs(60),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn script(&self) -> &Path {
        &self.script
    }

    fn command(&self, code: &FundCode, range: DateRange) -> Command {
        let mut command = Command::new(&self.interpreter);
        command.arg(&self.script).arg(code.as_str());

        // The script takes dates positionally, so an end date needs a start
        match (range.start, range.end) {
            (Some(start), Some(end)) => {
                command
                    .arg(start.format(DATE_ARG_FORMAT).to_string())
                    .arg(end.format(DATE_ARG_FORMAT).to_string());
            }
            (Some(start), None) => {
                command.arg(start.format(DATE_ARG_FORMAT).to_string());
            }
            (None, _) => {}
        }
        command.kill_on_drop(true);
        command
    }
}

#[async_trait]
impl PriceProvider for ScriptProvider {
    async fn fetch(&self, code: &FundCode, range: DateRange) -> Result<Vec<PricePoint>> {
        tracing::debug!(%code, script = %self.script.display(), "running fetch script");

        let output = tokio::time::timeout(self.timeout, self.command(code, range).output())
            .await
            .map_err(|_| {
                BacktestError::Upstream(format!(
                    "fetch script timed out after {}s",
                    self.timeout.as_secs()
                ))
            })?
            .map_err(|e| {
                tracing::warn!(%code, interpreter = %self.interpreter, error = %e, "fetch script did not start");
                BacktestError::Upstream(format!(
                    "could not run fetch script with {}: {e}",
                    self.interpreter
                ))
            })?;

        // The script prints its envelope even when it exits non-zero
        match decode_envelope(&output.stdout, range) {
            Ok(points) => {
                tracing::info!(%code, points = points.len(), "fetched price series");
                Ok(points)
            }
            Err(BacktestError::Serialization(e)) => {
                let stderr = String::from_utf8_lossy(&output.stderr);
                tracing::warn!(%code, status = %output.status, %stderr, "unreadable fetch script output");
                Err(BacktestError::Upstream(format!(
                    "fetch script exited with {}: {}",
                    output.status,
                    if stderr.trim().is_empty() {
                        e.to_string()
                    } else {
                        stderr.trim().to_string()
                    }
                )))
            }
            Err(e) => Err(e),
        }
    }

    async fn health_check(&self) -> bool {
        tokio::fs::metadata(&self.script)
            .await
            .is_ok_and(|m| m.is_file())
    }

    fn name(&self) -> &str {
        "script"
    }
}
