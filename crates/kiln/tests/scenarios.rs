//! End-to-end behaviour of the shader cache with a fake compiler.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::{Duration, Instant, SystemTime};

use kiln::{
    CompileRequest, KilnConfig, Lookup, ShaderCache, ShaderCompiler, ShaderFamily, ShaderStage,
    VariantDescriptor,
};
use kiln_watch::{ChangeKind, FileChange, InvalidationListener};

/// Counts invocations; fails descriptors listed in `fail`.
struct FakeCompiler {
    calls: AtomicUsize,
    delay: Duration,
    fail: Vec<u32>,
}

impl FakeCompiler {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
            delay: Duration::ZERO,
            fail: Vec::new(),
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl ShaderCompiler for FakeCompiler {
    fn compile(&self, request: &CompileRequest) -> Result<Vec<u8>, String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            thread::sleep(self.delay);
        }
        if self.fail.contains(&request.descriptor.bits()) {
            return Err(format!("error X3000: cannot compile {}", request.descriptor));
        }
        let defines: Vec<String> = request.defines.iter().map(|d| d.to_string()).collect();
        Ok(format!("{}|{}|{}", request.profile, request.family, defines.join(" ")).into_bytes())
    }
}

/// Returns the source text it read, after waiting for one release per call.
struct GatedCompiler {
    started: flume::Sender<()>,
    release: flume::Receiver<()>,
}

impl GatedCompiler {
    fn new() -> (Arc<Self>, flume::Receiver<()>, flume::Sender<()>) {
        let (started_tx, started_rx) = flume::unbounded();
        let (release_tx, release_rx) = flume::unbounded();
        let compiler = Arc::new(Self {
            started: started_tx,
            release: release_rx,
        });
        (compiler, started_rx, release_tx)
    }
}

impl ShaderCompiler for GatedCompiler {
    fn compile(&self, request: &CompileRequest) -> Result<Vec<u8>, String> {
        let source = std::fs::read(&request.source_path).map_err(|e| e.to_string())?;
        let _ = self.started.send(());
        self.release
            .recv_timeout(Duration::from_secs(10))
            .map_err(|e| e.to_string())?;
        Ok(source)
    }
}

struct Fixture {
    _dir: tempfile::TempDir,
    config: KilnConfig,
}

impl Fixture {
    fn new(async_compile: bool) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let shaders = dir.path().join("Shaders");
        std::fs::create_dir_all(shaders.join("Common")).unwrap();
        for family in ShaderFamily::ALL {
            std::fs::write(shaders.join(family.source_file()), "// source").unwrap();
        }
        std::fs::write(shaders.join("Common").join("Shared.hlsli"), "// shared").unwrap();

        let mut config = KilnConfig::default();
        config.cache.async_compile = async_compile;
        config.cache.shader_dir = shaders;
        config.cache.cache_dir = dir.path().join("ShaderCache");
        config.compilation.foreground_threads = 2;
        config.compilation.background_threads = 4;
        Self { _dir: dir, config }
    }

    fn shaders(&self) -> PathBuf {
        self.config.cache.shader_dir.clone()
    }

    fn cache(&self, compiler: Arc<dyn ShaderCompiler>) -> ShaderCache {
        ShaderCache::new(&self.config, compiler).unwrap()
    }

    fn cache_dir(&self) -> &Path {
        &self.config.cache.cache_dir
    }
}

fn wait_idle(cache: &ShaderCache) {
    let deadline = Instant::now() + Duration::from_secs(10);
    while cache.is_compiling() && Instant::now() < deadline {
        thread::sleep(Duration::from_millis(5));
    }
    assert!(!cache.is_compiling(), "compilation did not finish");
}

const VS: ShaderStage = ShaderStage::Vertex;
const PS: ShaderStage = ShaderStage::Pixel;

#[test]
fn sync_miss_compiles_once_then_hits() {
    let fixture = Fixture::new(false);
    let compiler = FakeCompiler::new();
    let cache = fixture.cache(compiler.clone());

    assert!(matches!(
        cache.lookup(VS, ShaderFamily::Lighting, VariantDescriptor(0)),
        Lookup::Miss
    ));
    let first = cache
        .get_compiled_shader(VS, ShaderFamily::Lighting, VariantDescriptor(0), false)
        .unwrap();
    let second = cache
        .get_compiled_shader(VS, ShaderFamily::Lighting, VariantDescriptor(0), false)
        .unwrap();
    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(compiler.calls(), 1);
    assert!(String::from_utf8_lossy(&first.bytecode).starts_with("vs_5_0|Lighting|VSHADER"));
}

#[test]
fn concurrent_async_requests_dispatch_one_task() {
    let fixture = Fixture::new(true);
    let compiler = Arc::new(FakeCompiler {
        calls: AtomicUsize::new(0),
        delay: Duration::from_millis(50),
        fail: Vec::new(),
    });
    let cache = Arc::new(fixture.cache(compiler.clone()));
    let barrier = Arc::new(Barrier::new(8));

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let cache = Arc::clone(&cache);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                let deadline = Instant::now() + Duration::from_secs(10);
                loop {
                    if let Some(artifact) =
                        cache.get_compiled_shader(PS, ShaderFamily::Water, VariantDescriptor(0x4), false)
                    {
                        return artifact;
                    }
                    assert!(Instant::now() < deadline, "artifact never published");
                    thread::sleep(Duration::from_millis(5));
                }
            })
        })
        .collect();

    let artifacts: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    assert!(artifacts.iter().all(|a| Arc::ptr_eq(a, &artifacts[0])));
    wait_idle(&cache);
    assert_eq!(compiler.calls(), 1);
    let stats = cache.stats();
    assert_eq!(stats.total, 1);
    assert_eq!(stats.completed, 1);
}

#[test]
fn family_source_edit_makes_entries_stale() {
    let fixture = Fixture::new(false);
    let compiler = FakeCompiler::new();
    let cache = fixture.cache(compiler.clone());
    cache.set_file_watcher(true).unwrap();

    cache
        .get_compiled_shader(PS, ShaderFamily::Lighting, VariantDescriptor(1), true)
        .unwrap();
    cache
        .get_compiled_shader(PS, ShaderFamily::Water, VariantDescriptor(0), true)
        .unwrap();
    thread::sleep(Duration::from_millis(10));
    cache.record_source_modification(ShaderFamily::Lighting, SystemTime::now());

    assert!(matches!(
        cache.lookup(PS, ShaderFamily::Lighting, VariantDescriptor(1)),
        Lookup::Stale
    ));
    assert!(matches!(
        cache.lookup(PS, ShaderFamily::Water, VariantDescriptor(0)),
        Lookup::Hit(_)
    ));

    // the disk copy predates the edit too, so this recompiles
    cache
        .get_compiled_shader(PS, ShaderFamily::Lighting, VariantDescriptor(1), true)
        .unwrap();
    assert_eq!(compiler.calls(), 3);
    assert!(matches!(
        cache.lookup(PS, ShaderFamily::Lighting, VariantDescriptor(1)),
        Lookup::Hit(_)
    ));
}

#[test]
fn failed_compile_is_not_retried_until_clear() {
    let fixture = Fixture::new(false);
    let compiler = Arc::new(FakeCompiler {
        calls: AtomicUsize::new(0),
        delay: Duration::ZERO,
        fail: vec![0x5],
    });
    let cache = fixture.cache(compiler.clone());

    for _ in 0..3 {
        assert!(cache
            .get_compiled_shader(PS, ShaderFamily::Lighting, VariantDescriptor(0x5), true)
            .is_none());
    }
    assert!(matches!(
        cache.lookup(PS, ShaderFamily::Lighting, VariantDescriptor(0x5)),
        Lookup::Failed
    ));
    assert_eq!(compiler.calls(), 1);

    cache.clear();
    assert!(cache
        .get_compiled_shader(PS, ShaderFamily::Lighting, VariantDescriptor(0x5), true)
        .is_none());
    assert_eq!(compiler.calls(), 2);
}

#[test]
fn failed_async_task_counts_as_failed() {
    let fixture = Fixture::new(true);
    let compiler = Arc::new(FakeCompiler {
        calls: AtomicUsize::new(0),
        delay: Duration::ZERO,
        fail: vec![0x5],
    });
    let cache = fixture.cache(compiler.clone());

    assert!(cache
        .get_compiled_shader(PS, ShaderFamily::Sky, VariantDescriptor(0x5), false)
        .is_none());
    wait_idle(&cache);
    assert!(cache
        .get_compiled_shader(PS, ShaderFamily::Sky, VariantDescriptor(0x5), false)
        .is_none());
    let stats = cache.stats();
    assert_eq!((stats.failed, stats.total), (1, 1));
    assert_eq!(compiler.calls(), 1);
    assert!(cache.stats_string(false).contains("failed: 1"));
}

#[test]
fn clear_family_leaves_other_families() {
    let fixture = Fixture::new(false);
    let compiler = FakeCompiler::new();
    let cache = fixture.cache(compiler);

    for family in [ShaderFamily::Sky, ShaderFamily::Grass, ShaderFamily::Water] {
        cache
            .get_compiled_shader(PS, family, VariantDescriptor(0), true)
            .unwrap();
    }
    cache.clear_family(ShaderFamily::Grass);

    assert!(matches!(
        cache.lookup(PS, ShaderFamily::Grass, VariantDescriptor(0)),
        Lookup::Miss
    ));
    assert!(matches!(cache.lookup(PS, ShaderFamily::Sky, VariantDescriptor(0)), Lookup::Hit(_)));
    assert!(matches!(cache.lookup(PS, ShaderFamily::Water, VariantDescriptor(0)), Lookup::Hit(_)));
    assert_eq!(cache.len(), 2);
}

#[test]
fn disk_cache_survives_restart() {
    let fixture = Fixture::new(false);
    let first = FakeCompiler::new();
    let original = {
        let cache = fixture.cache(first.clone());
        cache
            .get_compiled_shader(PS, ShaderFamily::Particle, VariantDescriptor(3), true)
            .unwrap()
    };
    assert_eq!(first.calls(), 1);
    assert!(fixture.cache_dir().join("Particle").join("3.pso").exists());
    assert!(fixture.cache_dir().join("info.json").exists());

    let second = FakeCompiler::new();
    let cache = fixture.cache(second.clone());
    let loaded = cache
        .get_compiled_shader(PS, ShaderFamily::Particle, VariantDescriptor(3), true)
        .unwrap();
    assert_eq!(loaded.bytecode, original.bytecode);
    assert_eq!(second.calls(), 0);
    assert_eq!(cache.stats().cache_hits, 1);
}

#[test]
fn stale_disk_entry_is_recompiled() {
    let fixture = Fixture::new(false);
    drop({
        let cache = fixture.cache(FakeCompiler::new());
        cache
            .get_compiled_shader(PS, ShaderFamily::Grass, VariantDescriptor(8), true)
            .unwrap()
    });

    let compiler = FakeCompiler::new();
    let cache = fixture.cache(compiler.clone());
    cache.set_file_watcher(true).unwrap();
    cache.record_source_modification(ShaderFamily::Grass, SystemTime::now() + Duration::from_secs(3600));

    cache
        .get_compiled_shader(PS, ShaderFamily::Grass, VariantDescriptor(8), true)
        .unwrap();
    assert_eq!(compiler.calls(), 1);
    assert_eq!(cache.stats().cache_hits, 0);
}

#[test]
fn changed_environment_discards_disk_cache() {
    let mut fixture = Fixture::new(false);
    drop(fixture.cache(FakeCompiler::new()).get_compiled_shader(
        PS,
        ShaderFamily::Sky,
        VariantDescriptor(1),
        true,
    ));
    assert!(fixture.cache_dir().join("Sky").exists());

    fixture.config.build.vr = true;
    let compiler = FakeCompiler::new();
    let cache = fixture.cache(compiler.clone());
    assert!(!fixture.cache_dir().join("Sky").exists());
    cache
        .get_compiled_shader(PS, ShaderFamily::Sky, VariantDescriptor(1), true)
        .unwrap();
    assert_eq!(compiler.calls(), 1);
}

#[test]
fn missing_source_publishes_failure() {
    let fixture = Fixture::new(false);
    std::fs::remove_file(fixture.shaders().join("Sky.hlsl")).unwrap();
    let compiler = FakeCompiler::new();
    let cache = fixture.cache(compiler.clone());

    assert!(cache
        .get_compiled_shader(PS, ShaderFamily::Sky, VariantDescriptor(0), true)
        .is_none());
    assert!(matches!(cache.lookup(PS, ShaderFamily::Sky, VariantDescriptor(0)), Lookup::Failed));
    assert_eq!(compiler.calls(), 0);
    assert!(matches!(
        cache.compile_now(PS, ShaderFamily::Sky, VariantDescriptor(0)),
        Err(kiln::ShaderError::SourceMissing { .. })
    ));
}

#[test]
fn listener_batch_invalidates_family_then_everything() {
    let fixture = Fixture::new(false);
    let compiler = FakeCompiler::new();
    let cache = fixture.cache(compiler);
    let shaders = fixture.shaders();

    for family in [ShaderFamily::Water, ShaderFamily::Lighting] {
        cache
            .get_compiled_shader(PS, family, VariantDescriptor(0), true)
            .unwrap();
    }

    let (tx, rx) = flume::unbounded();
    let mut listener = InvalidationListener::new(&shaders, rx);
    let target = cache.invalidation_target();

    tx.send(FileChange::new(shaders.join("Water.hlsl"), ChangeKind::Modified)).unwrap();
    assert!(listener.tick(target.as_ref()).is_none());
    let report = listener.tick(target.as_ref()).unwrap();
    assert_eq!(report.families, vec![ShaderFamily::Water]);
    assert!(matches!(cache.lookup(PS, ShaderFamily::Water, VariantDescriptor(0)), Lookup::Miss));
    assert!(matches!(
        cache.lookup(PS, ShaderFamily::Lighting, VariantDescriptor(0)),
        Lookup::Hit(_)
    ));

    tx.send(FileChange::new(shaders.join("Common/Shared.hlsli"), ChangeKind::Modified)).unwrap();
    listener.tick(target.as_ref());
    assert!(listener.tick(target.as_ref()).unwrap().global);
    assert!(cache.is_empty());
    assert!(!fixture.cache_dir().exists());
}

#[test]
fn equivalent_descriptors_share_one_artifact() {
    let fixture = Fixture::new(false);
    let compiler = FakeCompiler::new();
    let cache = fixture.cache(compiler.clone());

    // bits 4..7 of a grass descriptor are not decoded
    let a = cache
        .get_compiled_shader(VS, ShaderFamily::Grass, VariantDescriptor(0x08), true)
        .unwrap();
    let b = cache
        .get_compiled_shader(VS, ShaderFamily::Grass, VariantDescriptor(0xF8), true)
        .unwrap();
    assert!(Arc::ptr_eq(&a, &b));
    assert_eq!(compiler.calls(), 1);
    assert_eq!(
        cache.defines_string(ShaderFamily::Grass, VariantDescriptor(0xF8)),
        "RENDER_DEPTH"
    );
}

/// Starts an async compile of Lighting 0x1 that holds the "// v1" source,
/// then rewrites the file to "// v2". Returns the new file's mtime.
fn start_compile_then_edit(
    fixture: &Fixture,
    cache: &ShaderCache,
    started: &flume::Receiver<()>,
) -> SystemTime {
    let source = fixture.shaders().join("Lighting.hlsl");
    std::fs::write(&source, "// v1").unwrap();
    assert!(cache
        .get_compiled_shader(PS, ShaderFamily::Lighting, VariantDescriptor(1), false)
        .is_none());
    started.recv_timeout(Duration::from_secs(10)).unwrap();

    std::fs::write(&source, "// v2").unwrap();
    std::fs::metadata(&source).unwrap().modified().unwrap()
}

#[test]
fn family_invalidated_mid_compile_drops_result() {
    let fixture = Fixture::new(true);
    let (compiler, started, release) = GatedCompiler::new();
    let cache = fixture.cache(compiler);

    let modified = start_compile_then_edit(&fixture, &cache, &started);
    cache
        .invalidation_target()
        .invalidate_family(ShaderFamily::Lighting, modified);
    release.send(()).unwrap();
    // returns once the running compile has published
    cache.shutdown();

    assert!(matches!(
        cache.lookup(PS, ShaderFamily::Lighting, VariantDescriptor(1)),
        Lookup::Miss
    ));
    assert!(!fixture.cache_dir().join("Lighting").join("1.pso").exists());

    release.send(()).unwrap();
    let fresh = cache
        .get_compiled_shader(PS, ShaderFamily::Lighting, VariantDescriptor(1), true)
        .unwrap();
    assert_eq!(fresh.bytecode, b"// v2");
}

#[test]
fn global_invalidation_mid_compile_keeps_disk_clean() {
    let fixture = Fixture::new(true);
    let (compiler, started, release) = GatedCompiler::new();
    let cache = fixture.cache(compiler);

    start_compile_then_edit(&fixture, &cache, &started);
    cache.invalidation_target().invalidate_all();
    release.send(()).unwrap();
    cache.shutdown();

    assert!(cache.is_empty());
    assert!(!fixture.cache_dir().join("Lighting").exists());

    release.send(()).unwrap();
    let fresh = cache
        .get_compiled_shader(PS, ShaderFamily::Lighting, VariantDescriptor(1), true)
        .unwrap();
    assert_eq!(fresh.bytecode, b"// v2");
}

#[test]
fn direct_compile_and_enqueue_check_source_mtime() {
    let mut fixture = Fixture::new(false);
    drop({
        let cache = fixture.cache(FakeCompiler::new());
        for d in [0x7, 0x3] {
            cache.compile_now(PS, ShaderFamily::Sky, VariantDescriptor(d)).unwrap();
        }
        cache
    });
    assert!(fixture.cache_dir().join("Sky").join("7.pso").exists());

    let source = fixture.shaders().join("Sky.hlsl");
    std::fs::write(&source, "// v2").unwrap();
    std::fs::File::options()
        .write(true)
        .open(&source)
        .unwrap()
        .set_modified(SystemTime::now() + Duration::from_secs(60))
        .unwrap();

    fixture.config.watch.enabled = true;
    let compiler = FakeCompiler::new();
    let cache = fixture.cache(compiler.clone());

    cache.compile_now(PS, ShaderFamily::Sky, VariantDescriptor(0x7)).unwrap();
    assert_eq!(compiler.calls(), 1);

    assert!(cache.enqueue(PS, ShaderFamily::Sky, VariantDescriptor(0x3)));
    wait_idle(&cache);
    assert_eq!(compiler.calls(), 2);
    assert_eq!(cache.stats().cache_hits, 0);
}
