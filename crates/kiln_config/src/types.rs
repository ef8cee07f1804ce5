//! Configuration types deserialized from `kiln.toml`.

use kiln_common::ShaderFamily;
use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// The top-level configuration parsed from `kiln.toml`.
///
/// Every section is optional; an empty file yields a usable configuration
/// with asynchronous compilation and the disk cache enabled.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct KilnConfig {
    /// Source and cache locations, async and disk toggles.
    #[serde(default)]
    pub cache: CacheConfig,
    /// Worker thread budgets.
    #[serde(default)]
    pub compilation: CompilationConfig,
    /// Build-wide flags that feed global defines.
    #[serde(default)]
    pub build: BuildConfig,
    /// Source file watching.
    #[serde(default)]
    pub watch: WatchConfig,
    /// Extra global preprocessor defines, in order.
    #[serde(default)]
    pub defines: Vec<DefineSpec>,
    /// Renderer features contributing a define to some families.
    #[serde(default)]
    pub features: BTreeMap<String, FeatureSpec>,
    /// Administratively disabled families.
    #[serde(default)]
    pub families: FamilyConfig,
    /// External compiler command (used by the CLI).
    #[serde(default)]
    pub compiler: Option<CompilerConfig>,
}

/// Cache locations and mode toggles.
#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
    /// Compile on background workers instead of the requesting thread.
    #[serde(default = "default_true", rename = "async")]
    pub async_compile: bool,
    /// Persist compiled artifacts to `cache_dir`.
    #[serde(default = "default_true")]
    pub disk_cache: bool,
    /// Directory holding `<Family>.hlsl` sources and shared includes.
    #[serde(default = "default_shader_dir")]
    pub shader_dir: PathBuf,
    /// Root of the on-disk artifact cache.
    #[serde(default = "default_cache_dir")]
    pub cache_dir: PathBuf,
    /// Seconds after which a failed compile may be retried. `None` keeps
    /// failures until an explicit clear.
    #[serde(default)]
    pub failed_retry_secs: Option<u64>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            async_compile: true,
            disk_cache: true,
            shader_dir: default_shader_dir(),
            cache_dir: default_cache_dir(),
            failed_retry_secs: None,
        }
    }
}

/// Worker thread budgets.
///
/// The foreground budget applies while the renderer is actively drawing; the
/// larger background budget applies when compiling opportunistically.
#[derive(Debug, Clone, Deserialize)]
pub struct CompilationConfig {
    /// Maximum concurrent compiles while rendering.
    #[serde(default = "default_foreground_threads")]
    pub foreground_threads: usize,
    /// Maximum concurrent compiles in background mode.
    #[serde(default = "default_background_threads")]
    pub background_threads: usize,
    /// Start in background mode.
    #[serde(default)]
    pub background: bool,
}

impl Default for CompilationConfig {
    fn default() -> Self {
        Self {
            foreground_threads: default_foreground_threads(),
            background_threads: default_background_threads(),
            background: false,
        }
    }
}

/// Build-wide flags.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BuildConfig {
    /// Compile with debug information and no optimisation.
    #[serde(default)]
    pub developer_mode: bool,
    /// Target a VR runtime.
    #[serde(default)]
    pub vr: bool,
}

/// File watching settings.
#[derive(Debug, Clone, Deserialize)]
pub struct WatchConfig {
    /// Start the source watcher on cache construction.
    #[serde(default)]
    pub enabled: bool,
    /// Polling tick of the invalidation listener, in milliseconds.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            poll_interval_ms: default_poll_interval_ms(),
        }
    }
}

/// One extra global define.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct DefineSpec {
    /// Preprocessor symbol.
    pub name: String,
    /// Optional value; `NAME=VALUE` when present.
    #[serde(default)]
    pub value: Option<String>,
}

/// A renderer feature that contributes a define to selected families.
#[derive(Debug, Clone, Deserialize)]
pub struct FeatureSpec {
    /// The define the feature adds, e.g. `WETNESS_EFFECTS`.
    pub define: String,
    /// Family names, or `"all"`. Accepts a single string or a list.
    #[serde(default, deserialize_with = "deserialize_string_or_vec")]
    pub families: Vec<String>,
    /// Whether the feature is loaded.
    #[serde(default = "default_true")]
    pub enabled: bool,
}

impl FeatureSpec {
    /// Resolves the family list. `"all"` (or an empty list) selects every family.
    pub fn resolved_families(&self) -> Result<Vec<ShaderFamily>, String> {
        if self.families.is_empty() || self.families.iter().any(|f| f.eq_ignore_ascii_case("all")) {
            return Ok(ShaderFamily::ALL.to_vec());
        }
        self.families
            .iter()
            .map(|name| name.parse::<ShaderFamily>().map_err(|e| e.to_string()))
            .collect()
    }
}

/// Families the cache refuses to serve.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FamilyConfig {
    /// Requests for these families return nothing.
    #[serde(default)]
    pub disabled: Vec<ShaderFamily>,
}

/// External compiler invocation.
///
/// Arguments may contain the placeholders `{source}`, `{output}`,
/// `{profile}` and `{entry}`. Each define is passed as `define_flag`
/// followed by `NAME` or `NAME=VALUE`.
#[derive(Debug, Clone, Deserialize)]
pub struct CompilerConfig {
    /// Program to run, e.g. `fxc` or `dxc`.
    pub program: String,
    /// Argument template.
    #[serde(default)]
    pub args: Vec<String>,
    /// Flag preceding each define.
    #[serde(default = "default_define_flag")]
    pub define_flag: String,
}

/// Deserializes a field that can be either a single string or a list of strings.
///
/// Allows `families = "all"` as well as `families = ["water", "lighting"]`.
fn deserialize_string_or_vec<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    struct StringOrVec;

    impl<'de> Visitor<'de> for StringOrVec {
        type Value = Vec<String>;

        fn expecting(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            formatter.write_str("a family name or a list of family names")
        }

        fn visit_str<E: de::Error>(self, v: &str) -> Result<Self::Value, E> {
            Ok(vec![v.to_string()])
        }

        fn visit_seq<A: de::SeqAccess<'de>>(self, mut seq: A) -> Result<Self::Value, A::Error> {
            let mut families = Vec::new();
            while let Some(name) = seq.next_element::<String>()? {
                families.push(name);
            }
            Ok(families)
        }
    }

    deserializer.deserialize_any(StringOrVec)
}

fn default_true() -> bool {
    true
}

fn default_shader_dir() -> PathBuf {
    PathBuf::from("Data/Shaders")
}

fn default_cache_dir() -> PathBuf {
    PathBuf::from("Data/ShaderCache")
}

fn available_threads() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(4)
}

fn default_foreground_threads() -> usize {
    (available_threads() / 2).max(1)
}

fn default_background_threads() -> usize {
    available_threads().saturating_sub(1).max(1)
}

fn default_poll_interval_ms() -> u64 {
    100
}

fn default_define_flag() -> String {
    "/D".to_string()
}
