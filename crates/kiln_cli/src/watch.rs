//! `kiln watch`: report and apply source invalidations as they happen.

use std::io::BufRead;
use std::time::Duration;

use crate::project::{load_project, open_cache};
use crate::{GlobalArgs, WatchArgs};

/// Runs the `kiln watch` command.
///
/// Starts the file watcher on the configured shader directory and keeps the
/// cache alive until `--duration` elapses or stdin reaches end of file.
/// Family edits and shared-include edits are logged as they are applied.
pub fn run(args: &WatchArgs, global: &GlobalArgs) -> Result<i32, Box<dyn std::error::Error>> {
    let mut config = load_project(global)?;
    config.watch.enabled = false;
    let cache = open_cache(&config)?;
    cache.set_file_watcher(true)?;

    if !global.quiet {
        eprintln!(
            "    Watching {} (stop with Ctrl-D)",
            config.cache.shader_dir.display()
        );
    }

    match args.duration {
        Some(secs) => std::thread::sleep(Duration::from_secs(secs)),
        None => {
            let stdin = std::io::stdin();
            for line in stdin.lock().lines() {
                if line?.trim() == "stats" {
                    println!("{}", cache.stats_string(false));
                }
            }
        }
    }

    cache.set_file_watcher(false)?;
    Ok(0)
}
