//! Shared setup: locating `kiln.toml`, resolving paths and opening the cache.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use kiln::ShaderCache;
use kiln_config::{KilnConfig, CONFIG_FILE};

use crate::compiler::CommandCompiler;
use crate::GlobalArgs;

/// Walks up from `start` looking for `kiln.toml`.
pub fn find_project_root(start: &Path) -> Result<PathBuf, Box<dyn std::error::Error>> {
    let mut current = start.to_path_buf();
    loop {
        if current.join(CONFIG_FILE).exists() {
            return Ok(current);
        }
        if !current.pop() {
            return Err(format!(
                "could not find {CONFIG_FILE} in {} or any parent directory",
                start.display()
            )
            .into());
        }
    }
}

/// Resolves the config file and the directory relative paths are taken from.
///
/// `--config` may name the file itself or the directory holding it.
pub fn resolve_config_path(
    global: &GlobalArgs,
) -> Result<(PathBuf, PathBuf), Box<dyn std::error::Error>> {
    match global.config {
        Some(ref config_path) => {
            let p = PathBuf::from(config_path);
            if p.is_file() {
                let root = p
                    .parent()
                    .map(|p| p.to_path_buf())
                    .unwrap_or_else(|| PathBuf::from("."));
                Ok((p, root))
            } else {
                Ok((p.join(CONFIG_FILE), p))
            }
        }
        None => {
            let root = find_project_root(&std::env::current_dir()?)?;
            Ok((root.join(CONFIG_FILE), root))
        }
    }
}

/// Loads the configuration and anchors its directories at the project root.
pub fn load_project(global: &GlobalArgs) -> Result<KilnConfig, Box<dyn std::error::Error>> {
    let (config_path, root) = resolve_config_path(global)?;
    let mut config = kiln_config::load_config_file(&config_path)?;
    anchor_paths(&mut config, &root);
    log::debug!(
        "loaded {} (shaders: {}, cache: {})",
        config_path.display(),
        config.cache.shader_dir.display(),
        config.cache.cache_dir.display()
    );
    Ok(config)
}

fn anchor_paths(config: &mut KilnConfig, root: &Path) {
    if config.cache.shader_dir.is_relative() {
        config.cache.shader_dir = root.join(&config.cache.shader_dir);
    }
    if config.cache.cache_dir.is_relative() {
        config.cache.cache_dir = root.join(&config.cache.cache_dir);
    }
}

/// Opens a cache backed by the configured external compiler.
pub fn open_cache(config: &KilnConfig) -> Result<ShaderCache, Box<dyn std::error::Error>> {
    let compiler_config = config.compiler.clone().ok_or_else(|| {
        format!("no [compiler] section in {CONFIG_FILE}; cannot compile shaders")
    })?;
    let compiler = CommandCompiler::new(compiler_config);
    Ok(ShaderCache::new(config, Arc::new(compiler))?)
}

/// Runs the `kiln clear-disk` command.
pub fn clear_disk(global: &GlobalArgs) -> Result<i32, Box<dyn std::error::Error>> {
    let config = load_project(global)?;
    let disk = kiln_cache::DiskCache::new(config.cache.cache_dir.clone());
    disk.delete_all()?;
    if !global.quiet {
        eprintln!("    Removed {}", config.cache.cache_dir.display());
    }
    Ok(0)
}
