//! Runs an external shader compiler as a child process.
//!
//! The argument template comes from the `[compiler]` section of `kiln.toml`.
//! Placeholders are substituted per request and each define is passed after
//! `define_flag`. The compiler writes its bytecode to a scratch file that is
//! read back and removed.

use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::atomic::{AtomicU64, Ordering};

use kiln::{CompileRequest, ShaderCompiler};
use kiln_config::CompilerConfig;

/// A [`ShaderCompiler`] that shells out to `fxc`, `dxc` or similar.
pub struct CommandCompiler {
    config: CompilerConfig,
    scratch_dir: PathBuf,
    sequence: AtomicU64,
}

impl CommandCompiler {
    /// Creates a compiler writing scratch output to the system temp directory.
    pub fn new(config: CompilerConfig) -> Self {
        Self::with_scratch_dir(config, std::env::temp_dir())
    }

    /// Creates a compiler writing scratch output under `scratch_dir`.
    pub fn with_scratch_dir(config: CompilerConfig, scratch_dir: impl Into<PathBuf>) -> Self {
        Self {
            config,
            scratch_dir: scratch_dir.into(),
            sequence: AtomicU64::new(0),
        }
    }

    /// Builds the argument list for `request`, writing to `output`.
    pub fn build_args(&self, request: &CompileRequest, output: &Path) -> Vec<String> {
        let source = request.source_path.display().to_string();
        let output = output.display().to_string();
        let mut args: Vec<String> = self
            .config
            .args
            .iter()
            .map(|arg| {
                arg.replace("{source}", &source)
                    .replace("{output}", &output)
                    .replace("{profile}", request.profile)
                    .replace("{entry}", request.entry_point)
            })
            .collect();
        for define in &request.defines {
            args.push(self.config.define_flag.clone());
            args.push(define.to_string());
        }
        args
    }

    fn scratch_path(&self, request: &CompileRequest) -> PathBuf {
        let n = self.sequence.fetch_add(1, Ordering::Relaxed);
        self.scratch_dir.join(format!(
            "kiln-{}-{}-{}-{}-{n}.{}",
            std::process::id(),
            request.family,
            request.stage,
            request.descriptor,
            request.stage.disk_extension()
        ))
    }
}

impl ShaderCompiler for CommandCompiler {
    fn compile(&self, request: &CompileRequest) -> Result<Vec<u8>, String> {
        let output_path = self.scratch_path(request);
        let args = self.build_args(request, &output_path);
        log::debug!("{} {}", self.config.program, args.join(" "));

        let output = Command::new(&self.config.program)
            .args(&args)
            .output()
            .map_err(|e| format!("failed to run `{}`: {e}", self.config.program))?;

        if !output.status.success() {
            let _ = std::fs::remove_file(&output_path);
            let mut message = String::from_utf8_lossy(&output.stderr).trim().to_string();
            if message.is_empty() {
                message = String::from_utf8_lossy(&output.stdout).trim().to_string();
            }
            return Err(format!("{} exited with {}: {message}", self.config.program, output.status));
        }

        let bytecode = std::fs::read(&output_path)
            .map_err(|e| format!("compiler produced no output at {}: {e}", output_path.display()))?;
        let _ = std::fs::remove_file(&output_path);
        Ok(bytecode)
    }
}
