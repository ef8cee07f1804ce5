//! `kiln precompile`: fill the disk cache with many variants of one family.

use std::collections::BTreeSet;
use std::time::{Duration, Instant};

use kiln::{CompilationStats, VariantDescriptor};

use crate::project::{load_project, open_cache};
use crate::{GlobalArgs, PrecompileArgs, ReportFormat};

const PROGRESS_INTERVAL: Duration = Duration::from_secs(2);
const POLL: Duration = Duration::from_millis(20);

/// Runs the `kiln precompile` command.
///
/// Queues every requested descriptor on the background workers, waits for
/// the queue to drain, and reports the final statistics. Returns exit code 1
/// if any variant failed to compile.
pub fn run(args: &PrecompileArgs, global: &GlobalArgs) -> Result<i32, Box<dyn std::error::Error>> {
    let mut config = load_project(global)?;
    config.watch.enabled = false;
    config.cache.async_compile = true;
    let cache = open_cache(&config)?;
    cache.set_background_compilation(args.background);

    let descriptors = collect_descriptors(&args.descriptors, args.range);
    if descriptors.is_empty() {
        if !global.quiet {
            eprintln!("warning: no descriptors given; pass them explicitly or use --range");
        }
        return Ok(0);
    }

    let mut queued = 0usize;
    for descriptor in &descriptors {
        if cache.enqueue(args.stage, args.family, *descriptor) {
            queued += 1;
        }
    }
    if !global.quiet {
        eprintln!(
            " Precompiling {queued} {} {} variant(s)",
            args.stage, args.family
        );
    }

    let mut last_report = Instant::now();
    while cache.is_compiling() {
        std::thread::sleep(POLL);
        if !global.quiet && last_report.elapsed() >= PROGRESS_INTERVAL {
            let stats = cache.stats();
            eprintln!(
                "    Progress {}/{} {}",
                stats.completed + stats.failed,
                stats.total,
                stats.time_only()
            );
            last_report = Instant::now();
        }
    }

    let stats = cache.stats();
    match args.format {
        ReportFormat::Text => {
            if !global.quiet {
                eprintln!("    Finished {stats}");
            }
        }
        ReportFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&stats_json(&stats))?);
        }
    }
    Ok(if stats.failed > 0 { 1 } else { 0 })
}

/// Explicit descriptors plus `0..range`, deduplicated and sorted.
fn collect_descriptors(explicit: &[VariantDescriptor], range: Option<u32>) -> Vec<VariantDescriptor> {
    let mut all: BTreeSet<VariantDescriptor> = explicit.iter().copied().collect();
    if let Some(end) = range {
        all.extend((0..end).map(VariantDescriptor));
    }
    all.into_iter().collect()
}

fn stats_json(stats: &CompilationStats) -> serde_json::Value {
    serde_json::json!({
        "completed": stats.completed,
        "failed": stats.failed,
        "total": stats.total,
        "cache_hits": stats.cache_hits,
        "elapsed_ms": stats.elapsed.as_millis() as u64,
        "eta_ms": stats.eta.as_millis() as u64,
        "summary": stats.time_only(),
    })
}
