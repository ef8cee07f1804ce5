//! `kiln compile`: compile one variant on the calling thread.

use kiln::ShaderError;

use crate::project::{load_project, open_cache};
use crate::{CompileArgs, GlobalArgs};

/// Runs the `kiln compile` command.
///
/// Returns exit code 0 when the variant compiled (or was already cached) and
/// 1 when the compiler rejected it.
pub fn run(args: &CompileArgs, global: &GlobalArgs) -> Result<i32, Box<dyn std::error::Error>> {
    let mut config = load_project(global)?;
    config.watch.enabled = false;
    if args.no_disk_cache {
        config.cache.disk_cache = false;
    }
    let cache = open_cache(&config)?;

    let v = &args.variant;
    let key = cache.cache_key(v.stage, v.family, v.descriptor);
    if !global.quiet {
        eprintln!("   Compiling {key}");
    }

    let artifact = match cache.compile_now(v.stage, v.family, v.descriptor) {
        Ok(artifact) => artifact,
        Err(ShaderError::CompileFailure { message, .. }) => {
            eprintln!("{message}");
            return Ok(1);
        }
        Err(e) => return Err(e.into()),
    };

    if let Some(ref output) = args.output {
        std::fs::write(output, &artifact.bytecode)?;
    }
    if !global.quiet {
        let hits = cache.stats().cache_hits;
        eprintln!(
            "    Finished {} bytes, hash {}{}",
            artifact.bytecode.len(),
            artifact.hash.short(),
            if hits > 0 { " (cached)" } else { "" }
        );
    }
    Ok(0)
}
