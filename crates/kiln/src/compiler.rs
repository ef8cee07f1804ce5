//! The boundary to the external shader compiler.

use std::path::PathBuf;

use kiln_common::{ShaderFamily, ShaderStage, VariantDescriptor};
use kiln_defines::Define;

/// Entry point compiled for every variant.
pub const ENTRY_POINT: &str = "main";

/// Everything the compiler needs for one variant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompileRequest {
    /// The family source file.
    pub source_path: PathBuf,
    /// Pipeline stage.
    pub stage: ShaderStage,
    /// Shader family.
    pub family: ShaderFamily,
    /// Variant descriptor.
    pub descriptor: VariantDescriptor,
    /// Family, feature and global defines, in order.
    pub defines: Vec<Define>,
    /// Function to compile.
    pub entry_point: &'static str,
    /// Target profile, e.g. `ps_5_0`.
    pub profile: &'static str,
}

/// Compiles one variant to opaque bytecode.
///
/// Called concurrently from worker threads and from the render thread in
/// blocking mode. An `Err` carries the compiler's diagnostic output.
pub trait ShaderCompiler: Send + Sync {
    /// Compiles `request`.
    fn compile(&self, request: &CompileRequest) -> Result<Vec<u8>, String>;
}

impl<F> ShaderCompiler for F
where
    F: Fn(&CompileRequest) -> Result<Vec<u8>, String> + Send + Sync,
{
    fn compile(&self, request: &CompileRequest) -> Result<Vec<u8>, String> {
        self(request)
    }
}
