//! `kiln defines`: show what a variant would be compiled with.

use crate::project::load_project;
use crate::{GlobalArgs, VariantArgs};

/// Runs the `kiln defines` command.
///
/// Prints the cache key on the first line and each define on its own line.
/// Needs no compiler and does not touch the disk cache.
pub fn run(args: &VariantArgs, global: &GlobalArgs) -> Result<i32, Box<dyn std::error::Error>> {
    let config = load_project(global)?;
    let generator = kiln::define_generator(&config);

    println!("{}", generator.cache_key(args.stage, args.family, args.descriptor));
    for define in generator.compile_defines(args.stage, args.family, args.descriptor) {
        println!("{define}");
    }
    Ok(0)
}
