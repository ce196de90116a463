//! Sandboxed execution of model-generated analysis code.
//!
//! The generated script runs in a subprocess with:
//! - Pre-execution safety validation of the source
//! - An isolated scratch directory per run (process CWD set there)
//! - A sanitized environment (API keys, tokens, credentials stripped)
//! - An output size cap and a hard timeout
//!
//! The API is infallible: execution errors, rejected code, spawn
//! failures, and timeouts all become captured text, so the pipeline
//! always proceeds to interpretation.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::process::Stdio;
use std::time::{Duration, Instant};
use tokio::process::Command as AsyncCommand;

/// Environment variable name prefixes stripped from the interpreter
/// process.
const SENSITIVE_ENV_PREFIXES: &[&str] = &[
    "API_KEY",
    "API_SECRET",
    "SECRET",
    "TOKEN",
    "PASSWORD",
    "CREDENTIAL",
    "AWS_",
    "AZURE_",
    "GCP_",
    "OPENAI_",
    "ANTHROPIC_",
    "DATABASE_URL",
    "REDIS_URL",
];

/// Result of one sandboxed run. Every failure mode is folded into
/// `output`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SandboxOutput {
    pub output: String,
    pub success: bool,
    pub duration_ms: u64,
}

impl SandboxOutput {
    fn error(message: impl Into<String>, started: Instant) -> Self {
        Self {
            output: format!("Error executing code: {}", message.into()),
            success: false,
            duration_ms: started.elapsed().as_millis() as u64,
        }
    }
}

/// An isolated evaluation context for model-generated code.
#[async_trait]
pub trait CodeSandbox: Send + Sync {
    /// Execute `code`, returning whatever it printed. Never raises:
    /// execution errors become part of the captured text.
    async fn run(&self, code: &str) -> SandboxOutput;
}

#[derive(Debug, Clone)]
pub struct SandboxConfig {
    pub python_bin: String,
    pub timeout: Duration,
    pub max_output_bytes: usize,
}

impl Default for SandboxConfig {
    fn default() -> Self {
        Self {
            python_bin: "python".to_string(),
            timeout: Duration::from_secs(30),
            max_output_bytes: 1_048_576,
        }
    }
}

/// Runs generated Python in an isolated interpreter process.
pub struct PythonSandbox {
    config: SandboxConfig,
}

impl PythonSandbox {
    pub fn new(config: SandboxConfig) -> Self {
        Self { config }
    }

    async fn run_script(&self, code: &str) -> SandboxOutput {
        let started = Instant::now();

        if let Err(reason) = validate_code_safety(code) {
            tracing::warn!(%reason, "generated code rejected before execution");
            return SandboxOutput::error(reason, started);
        }

        let scratch_dir =
            std::env::temp_dir().join(format!("parakh_sandbox_{}", uuid::Uuid::new_v4()));
        if let Err(e) = std::fs::create_dir_all(&scratch_dir) {
            return SandboxOutput::error(e.to_string(), started);
        }
        let script_path = scratch_dir.join("analysis.py");
        if let Err(e) = std::fs::write(&script_path, code) {
            let _ = std::fs::remove_dir_all(&scratch_dir);
            return SandboxOutput::error(e.to_string(), started);
        }

        let result = self.execute(&script_path, &scratch_dir, started).await;

        // Always clean up the scratch directory
        let _ = std::fs::remove_dir_all(&scratch_dir);
        result
    }

    async fn execute(&self, script: &Path, scratch_dir: &Path, started: Instant) -> SandboxOutput {
        let mut cmd = AsyncCommand::new(&self.config.python_bin);
        cmd.arg("-I") // Isolated mode: no user site-packages, no PYTHON* env vars
            .arg("-B") // Don't write .pyc files
            .arg("-S") // Don't import the site module
            .arg(script)
            .current_dir(scratch_dir)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        cmd.env_clear();
        for (key, value) in std::env::vars() {
            if !is_sensitive_env_var(&key) {
                cmd.env(&key, &value);
            }
        }

        let output = match tokio::time::timeout(self.config.timeout, cmd.output()).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => {
                return SandboxOutput::error(
                    format!("failed to start {}: {}", self.config.python_bin, e),
                    started,
                );
            }
            Err(_) => {
                return SandboxOutput::error(
                    format!("timed out after {:?}", self.config.timeout),
                    started,
                );
            }
        };

        let cap = self.config.max_output_bytes;
        let stdout =
            String::from_utf8_lossy(&output.stdout[..output.stdout.len().min(cap)]).to_string();
        let stderr =
            String::from_utf8_lossy(&output.stderr[..output.stderr.len().min(cap)]).to_string();
        let success = output.status.success();

        let mut text = stdout.trim().to_string();
        if !success {
            let stderr = stderr.trim();
            if !text.is_empty() {
                text.push('\n');
            }
            text.push_str("Error executing code: ");
            text.push_str(if stderr.is_empty() {
                "interpreter exited with a failure status"
            } else {
                stderr
            });
        }

        SandboxOutput {
            output: text,
            success,
            duration_ms: started.elapsed().as_millis() as u64,
        }
    }
}

#[async_trait]
impl CodeSandbox for PythonSandbox {
    async fn run(&self, code: &str) -> SandboxOutput {
        self.run_script(code).await
    }
}

/// Check if an environment variable name matches sensitive patterns.
fn is_sensitive_env_var(name: &str) -> bool {
    let upper = name.to_uppercase();
    SENSITIVE_ENV_PREFIXES
        .iter()
        .any(|prefix| upper.starts_with(prefix))
}

/// Reject obviously dangerous constructs before the interpreter sees
/// them. Called on every run and cannot be bypassed.
fn validate_code_safety(code: &str) -> Result<(), String> {
    if code.len() > 100_000 {
        return Err("script exceeds the 100KB size limit".to_string());
    }

    let lower = code.to_lowercase();
    const BLOCKED_PATTERNS: &[&str] = &[
        "import os",
        "from os",
        "import subprocess",
        "from subprocess",
        "import socket",
        "from socket",
        "import shutil",
        "from shutil",
        "import ctypes",
        "from ctypes",
        "os.system",
        "eval(",
        "exec(",
        "__import__",
    ];

    for pattern in BLOCKED_PATTERNS {
        if lower.contains(pattern) {
            return Err(format!("blocked pattern '{}'", pattern));
        }
    }

    Ok(())
}
