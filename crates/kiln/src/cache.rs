//! The renderer-facing cache.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use kiln_cache::{
    Artifact, ArtifactStore, CompileTicket, DiskCache, DiskCacheInfo, Lookup, ModificationTracker,
};
use kiln_common::{ShaderFamily, ShaderStage, VariantDescriptor};
use kiln_config::KilnConfig;
use kiln_defines::families::EFFECT_LIGHTING;
use kiln_defines::{CacheKey, Define, DefineGenerator, FeatureRegistry, GlobalDefines};
use kiln_scheduler::{
    CompilationSet, CompilationStats, CompilationTask, CompilationWorkers, TaskOutcome, TaskRunner,
};
use kiln_watch::{InvalidationTarget, SourceWatcher};
use parking_lot::Mutex;

use crate::blocker::VariantBlocker;
use crate::compiler::{CompileRequest, ShaderCompiler, ENTRY_POINT};
use crate::error::ShaderError;

/// State shared with the compile workers and the watcher thread.
struct CacheCore {
    generator: DefineGenerator,
    store: ArtifactStore,
    tracker: Arc<ModificationTracker>,
    disk: DiskCache,
    set: Arc<CompilationSet>,
    compiler: Arc<dyn ShaderCompiler>,
    shader_dir: PathBuf,
    disabled: Vec<ShaderFamily>,
    async_compile: AtomicBool,
    disk_enabled: AtomicBool,
    blocker: Mutex<VariantBlocker>,
}

/// Compiles, caches and invalidates shader variants.
///
/// Construct one per renderer and keep it for the renderer's lifetime.
/// Lookups are safe from any thread; in asynchronous mode misses are queued
/// for the background workers and the request returns `None` until the
/// artifact is published.
///
/// Dropping the cache stops the watcher, waits for running compiles and then
/// writes the disk cache metadata.
pub struct ShaderCache {
    core: Arc<CacheCore>,
    workers: Mutex<Option<CompilationWorkers>>,
    watcher: Mutex<Option<SourceWatcher>>,
    poll_interval: Duration,
}

impl ShaderCache {
    /// Builds a cache from configuration and starts the compile workers.
    ///
    /// The disk cache is validated against the current environment and
    /// deleted when it was produced under different settings. The file
    /// watcher is started when `watch.enabled` is set.
    pub fn new(config: &KilnConfig, compiler: Arc<dyn ShaderCompiler>) -> Result<Self, ShaderError> {
        let generator = define_generator(config);
        let tracker = Arc::new(ModificationTracker::new(config.watch.enabled));
        let failed_retry = config.cache.failed_retry_secs.map(Duration::from_secs);
        let set = Arc::new(CompilationSet::new(
            config.compilation.foreground_threads,
            config.compilation.background_threads,
        ));
        set.set_background(config.compilation.background);

        let core = Arc::new(CacheCore {
            generator,
            store: ArtifactStore::new(Arc::clone(&tracker), failed_retry),
            tracker,
            disk: DiskCache::new(&config.cache.cache_dir),
            set: Arc::clone(&set),
            compiler,
            shader_dir: config.cache.shader_dir.clone(),
            disabled: config.families.disabled.clone(),
            async_compile: AtomicBool::new(config.cache.async_compile),
            disk_enabled: AtomicBool::new(config.cache.disk_cache),
            blocker: Mutex::new(VariantBlocker::default()),
        });

        if config.cache.disk_cache {
            if let Err(e) = core.validate_disk_cache() {
                log::warn!("could not validate disk cache: {e}");
            }
        }

        let pool_threads = config
            .compilation
            .foreground_threads
            .max(config.compilation.background_threads);
        let runner: Arc<dyn TaskRunner> = core.clone();
        let workers = CompilationWorkers::start(set, runner, pool_threads)?;

        let cache = Self {
            core,
            workers: Mutex::new(Some(workers)),
            watcher: Mutex::new(None),
            poll_interval: Duration::from_millis(config.watch.poll_interval_ms),
        };
        if config.watch.enabled {
            if let Err(e) = cache.set_file_watcher(true) {
                log::warn!("file watcher not started: {e}");
            }
        }
        log::info!(
            "shader cache ready (async: {}, disk: {}, shaders: {})",
            config.cache.async_compile,
            config.cache.disk_cache,
            config.cache.shader_dir.display()
        );
        Ok(cache)
    }

    /// Returns the compiled artifact for a variant, or `None`.
    ///
    /// `None` means the variant is disabled, blocked, failed, or (in
    /// asynchronous mode without `blocking`) queued for compilation. With
    /// `blocking`, or when asynchronous mode is off, a miss is compiled on
    /// the calling thread.
    pub fn get_compiled_shader(
        &self,
        stage: ShaderStage,
        family: ShaderFamily,
        descriptor: VariantDescriptor,
        blocking: bool,
    ) -> Option<Arc<Artifact>> {
        match self.core.request(stage, family, descriptor, blocking) {
            Ok(artifact) => artifact,
            Err(e) => {
                log::debug!("no shader for {stage} {family} {descriptor}: {e}");
                None
            }
        }
    }

    /// Compiles a variant on the calling thread, bypassing the disabled,
    /// blocked and render-stage checks. Memory and disk hits are returned
    /// without compiling.
    ///
    /// If the family is invalidated while the compile runs, the result is
    /// returned to the caller but not cached.
    pub fn compile_now(
        &self,
        stage: ShaderStage,
        family: ShaderFamily,
        descriptor: VariantDescriptor,
    ) -> Result<Arc<Artifact>, ShaderError> {
        self.core.compile_now(stage, family, descriptor)
    }

    /// Queues a variant for the background workers without looking it up.
    /// Returns `true` if a new task was queued.
    pub fn enqueue(&self, stage: ShaderStage, family: ShaderFamily, descriptor: VariantDescriptor) -> bool {
        self.core.enqueue(stage, family, descriptor)
    }

    /// Looks up a variant without compiling or queuing anything.
    pub fn lookup(&self, stage: ShaderStage, family: ShaderFamily, descriptor: VariantDescriptor) -> Lookup {
        let key = self.core.generator.cache_key(stage, family, descriptor);
        self.core.store.lookup(&key)
    }

    /// The cache key of a variant.
    pub fn cache_key(&self, stage: ShaderStage, family: ShaderFamily, descriptor: VariantDescriptor) -> CacheKey {
        self.core.generator.cache_key(stage, family, descriptor)
    }

    /// The ordered defines a variant is compiled with.
    pub fn compile_defines(
        &self,
        stage: ShaderStage,
        family: ShaderFamily,
        descriptor: VariantDescriptor,
    ) -> Vec<Define> {
        self.core.generator.compile_defines(stage, family, descriptor)
    }

    /// Sorted family and feature defines of a variant, space separated.
    pub fn defines_string(&self, family: ShaderFamily, descriptor: VariantDescriptor) -> String {
        self.core.generator.defines_string(family, descriptor)
    }

    /// Whether background work is outstanding.
    pub fn is_compiling(&self) -> bool {
        self.core.set.is_compiling()
    }

    /// Compilation progress.
    pub fn stats(&self) -> CompilationStats {
        self.core.set.stats()
    }

    /// Progress as text; `time_only` gives just `elapsed/estimated`.
    pub fn stats_string(&self, time_only: bool) -> String {
        let stats = self.stats();
        if time_only {
            stats.time_only()
        } else {
            stats.to_string()
        }
    }

    /// Number of entries in the memory table.
    pub fn len(&self) -> usize {
        self.core.store.len()
    }

    /// Returns `true` if the memory table is empty.
    pub fn is_empty(&self) -> bool {
        self.core.store.is_empty()
    }

    /// Drops every memory entry and resets the task set.
    pub fn clear(&self) {
        self.core.clear();
    }

    /// Drops one family's memory entries and forgets its tasks.
    pub fn clear_family(&self, family: ShaderFamily) {
        self.core.clear_family(family);
    }

    /// Whether misses are compiled in the background.
    pub fn is_async(&self) -> bool {
        self.core.async_compile.load(Ordering::SeqCst)
    }

    /// Switches between background and inline compilation.
    pub fn set_async(&self, async_compile: bool) {
        self.core.async_compile.store(async_compile, Ordering::SeqCst);
    }

    /// Whether compiled artifacts are persisted and reused.
    pub fn is_disk_cache_enabled(&self) -> bool {
        self.core.disk_enabled.load(Ordering::SeqCst)
    }

    /// Turns the disk cache on or off. Existing files are kept.
    pub fn set_disk_cache_enabled(&self, enabled: bool) {
        self.core.disk_enabled.store(enabled, Ordering::SeqCst);
    }

    /// Removes the disk cache directory.
    pub fn delete_disk_cache(&self) -> Result<(), ShaderError> {
        self.core.disk.delete_all()?;
        Ok(())
    }

    /// Checks `info.json` and deletes an incompatible disk cache.
    /// Returns `true` if the existing cache was kept.
    pub fn validate_disk_cache(&self) -> Result<bool, ShaderError> {
        self.core.validate_disk_cache()
    }

    /// Writes `info.json` for the current environment.
    pub fn write_disk_cache_info(&self) -> Result<(), ShaderError> {
        self.core.write_disk_cache_info()
    }

    /// The disk cache directory.
    pub fn disk_cache_dir(&self) -> &Path {
        self.core.disk.root()
    }

    /// Selects the background (larger) or foreground concurrency budget.
    pub fn set_background_compilation(&self, background: bool) {
        self.core.set.set_background(background);
    }

    /// Whether the background budget is active.
    pub fn is_background_compilation(&self) -> bool {
        self.core.set.is_background()
    }

    /// Starts or stops watching the shader directory. While watching,
    /// lookups also check the family source file's modification time.
    pub fn set_file_watcher(&self, enabled: bool) -> Result<(), ShaderError> {
        let mut watcher = self.watcher.lock();
        if enabled {
            if watcher.is_none() {
                let target: Arc<dyn InvalidationTarget> = self.core.clone();
                *watcher = Some(SourceWatcher::start(&self.core.shader_dir, target, self.poll_interval)?);
            }
            self.core.tracker.set_enabled(true);
        } else {
            if let Some(mut w) = watcher.take() {
                w.stop();
            }
            self.core.tracker.set_enabled(false);
        }
        Ok(())
    }

    /// Whether the file watcher is running.
    pub fn is_file_watcher_enabled(&self) -> bool {
        self.watcher.lock().is_some()
    }

    /// Records a source modification without clearing anything. While the
    /// watcher is on, entries compiled before `modified` turn stale.
    pub fn record_source_modification(&self, family: ShaderFamily, modified: SystemTime) {
        self.core.tracker.record(family, modified);
    }

    /// A handle for applying invalidations from an external change feed.
    pub fn invalidation_target(&self) -> Arc<dyn InvalidationTarget> {
        self.core.clone()
    }

    /// Blocks the next populated key. Returns the newly blocked key.
    pub fn block_next(&self) -> Option<CacheKey> {
        self.core.step_block(true)
    }

    /// Blocks the previous populated key. Returns the newly blocked key.
    pub fn block_previous(&self) -> Option<CacheKey> {
        self.core.step_block(false)
    }

    /// Stops blocking.
    pub fn disable_blocking(&self) {
        self.core.blocker.lock().disable();
    }

    /// The blocked key, if any.
    pub fn blocked_key(&self) -> Option<CacheKey> {
        self.core.blocker.lock().key().cloned()
    }

    /// Descriptors rejected under the blocked key.
    pub fn blocked_descriptors(&self) -> Vec<VariantDescriptor> {
        self.core.blocker.lock().descriptors().to_vec()
    }

    /// Stops the watcher and the workers. Returns once in-flight compiles
    /// have published; queued tasks are dropped.
    pub fn shutdown(&self) {
        if let Some(mut watcher) = self.watcher.lock().take() {
            watcher.stop();
        }
        if let Some(mut workers) = self.workers.lock().take() {
            workers.shutdown();
        }
    }
}

impl Drop for ShaderCache {
    fn drop(&mut self) {
        self.shutdown();
        if self.is_disk_cache_enabled() {
            if let Err(e) = self.core.write_disk_cache_info() {
                log::warn!("could not write disk cache info: {e}");
            }
        }
    }
}

impl CacheCore {
    fn source_path(&self, family: ShaderFamily) -> PathBuf {
        self.shader_dir.join(family.source_file())
    }

    /// Picks up edits the watcher has not reported yet.
    fn refresh_source(&self, family: ShaderFamily) {
        if self.tracker.is_enabled() {
            self.tracker.refresh_from_source(family, &self.source_path(family));
        }
    }

    /// Whether a compile that took `ticket` still reflects the current source.
    fn is_fresh(&self, family: ShaderFamily, ticket: &CompileTicket) -> bool {
        self.store.is_current(family, ticket) && !self.tracker.modified_since(family, ticket.started)
    }

    fn is_served(&self, stage: ShaderStage, family: ShaderFamily, descriptor: VariantDescriptor) -> bool {
        if !stage.is_render_stage() || self.disabled.contains(&family) {
            return false;
        }
        // unlit effect meshes are drawn by the engine's built-in programs
        family != ShaderFamily::Effect || descriptor.has(EFFECT_LIGHTING)
    }

    fn request(
        &self,
        stage: ShaderStage,
        family: ShaderFamily,
        descriptor: VariantDescriptor,
        blocking: bool,
    ) -> Result<Option<Arc<Artifact>>, ShaderError> {
        if !self.is_served(stage, family, descriptor) {
            return Err(ShaderError::Disabled { family, stage });
        }

        let key = self.generator.cache_key(stage, family, descriptor);
        if self.blocker.lock().check(&key, descriptor) {
            return Err(ShaderError::Blocked {
                key: key.to_string(),
            });
        }

        self.refresh_source(family);
        match self.store.lookup(&key) {
            Lookup::Hit(artifact) => return Ok(Some(artifact)),
            Lookup::Failed => return Ok(None),
            Lookup::Stale => {
                log::debug!("evicting stale {key}");
                self.store.evict(&key);
                self.set
                    .forget(&CompilationTask::new(stage, family, descriptor, key.clone()));
            }
            Lookup::Pending | Lookup::Miss => {}
        }

        if self.async_compile.load(Ordering::SeqCst) && !blocking {
            let task = CompilationTask::new(stage, family, descriptor, key.clone());
            self.set.add(task, || self.store.is_resolved(&key));
            return Ok(None);
        }
        self.compile_now(stage, family, descriptor).map(Some)
    }

    fn enqueue(&self, stage: ShaderStage, family: ShaderFamily, descriptor: VariantDescriptor) -> bool {
        let key = self.generator.cache_key(stage, family, descriptor);
        let task = CompilationTask::new(stage, family, descriptor, key.clone());
        self.set.add(task, || self.store.is_resolved(&key))
    }

    fn compile_now(
        &self,
        stage: ShaderStage,
        family: ShaderFamily,
        descriptor: VariantDescriptor,
    ) -> Result<Arc<Artifact>, ShaderError> {
        self.refresh_source(family);
        let key = self.generator.cache_key(stage, family, descriptor);
        match self.store.lookup(&key) {
            Lookup::Hit(artifact) => {
                self.set.record_cache_hit();
                return Ok(artifact);
            }
            Lookup::Stale => {
                self.store.evict(&key);
            }
            Lookup::Failed | Lookup::Pending | Lookup::Miss => {}
        }
        self.store.mark_pending(&key, family);
        let ticket = self.store.begin(family);

        if self.disk_enabled.load(Ordering::SeqCst) {
            if let Some(bytecode) = self.disk.load(family, stage, descriptor, key.as_str(), &self.tracker) {
                log::debug!("loaded {key} from disk");
                let artifact = Arc::new(Artifact::new(family, stage, descriptor, bytecode));
                self.store.publish(&key, family, Some(Arc::clone(&artifact)), ticket);
                self.set.record_cache_hit();
                return Ok(artifact);
            }
        }

        let source_path = self.source_path(family);
        if !source_path.exists() {
            log::error!("shader source {} is missing", source_path.display());
            self.store.publish(&key, family, None, ticket);
            return Err(ShaderError::SourceMissing { path: source_path });
        }

        let request = CompileRequest {
            source_path,
            stage,
            family,
            descriptor,
            defines: self.generator.compile_defines(stage, family, descriptor),
            entry_point: ENTRY_POINT,
            profile: stage.profile(),
        };
        let diagnostic = self.generator.diagnostic_key(stage, family, descriptor);
        log::debug!("compiling {diagnostic}");

        let bytecode = match self.compiler.compile(&request) {
            Ok(bytecode) => bytecode,
            Err(message) => {
                log::error!("failed to compile {diagnostic}:\n{message}");
                self.store.publish(&key, family, None, ticket);
                return Err(ShaderError::CompileFailure {
                    key: diagnostic.to_string(),
                    message,
                });
            }
        };

        // a source edited mid-compile must not reach the disk
        let mut saved = false;
        if self.disk_enabled.load(Ordering::SeqCst) && self.is_fresh(family, &ticket) {
            match self
                .disk
                .save(family, stage, descriptor, key.as_str(), &bytecode, ticket.started)
            {
                Ok(_) => saved = true,
                Err(e) => log::warn!("could not write {diagnostic} to disk: {e}"),
            }
        }
        let artifact = Arc::new(Artifact::new(family, stage, descriptor, bytecode));
        if self.store.publish(&key, family, Some(Arc::clone(&artifact)), ticket).is_none() {
            if saved {
                if let Err(e) = self.disk.remove(family, stage, descriptor) {
                    log::warn!("could not remove outdated {diagnostic} from disk: {e}");
                }
            }
            return Ok(artifact);
        }
        log::debug!("compiled {diagnostic} ({})", artifact.hash.short());
        Ok(artifact)
    }

    fn clear(&self) {
        self.store.clear();
        self.set.clear();
    }

    fn clear_family(&self, family: ShaderFamily) {
        let removed = self.store.clear_family(family);
        self.set.forget_family(family);
        log::debug!("cleared {removed} {family} entries");
    }

    fn step_block(&self, forward: bool) -> Option<CacheKey> {
        let keys = self.store.keys();
        self.blocker.lock().step(&keys, forward).cloned()
    }

    fn disk_info(&self) -> DiskCacheInfo {
        DiskCacheInfo::current(self.generator.fingerprint())
    }

    fn validate_disk_cache(&self) -> Result<bool, ShaderError> {
        Ok(self.disk.validate(&self.disk_info())?)
    }

    fn write_disk_cache_info(&self) -> Result<(), ShaderError> {
        self.disk.write_info(&self.disk_info())?;
        Ok(())
    }
}

impl TaskRunner for CacheCore {
    fn run(&self, task: &CompilationTask) -> TaskOutcome {
        match self.compile_now(task.stage, task.family, task.descriptor) {
            Ok(_) => TaskOutcome::Succeeded,
            Err(_) => TaskOutcome::Failed,
        }
    }
}

impl InvalidationTarget for CacheCore {
    fn invalidate_family(&self, family: ShaderFamily, modified: SystemTime) {
        self.tracker.record(family, modified);
        self.clear_family(family);
    }

    fn invalidate_all(&self) {
        // clear first: a compile that publishes before this saved its file
        // before the directory is deleted
        self.clear();
        if let Err(e) = self.disk.delete_all() {
            log::warn!("could not delete disk cache: {e}");
        }
    }
}

/// The define generator a cache built from `config` uses.
pub fn define_generator(config: &KilnConfig) -> DefineGenerator {
    DefineGenerator::new(feature_registry(config), global_defines(config))
}

fn feature_registry(config: &KilnConfig) -> FeatureRegistry {
    let mut registry = FeatureRegistry::new();
    for (name, feature) in &config.features {
        if !feature.enabled {
            continue;
        }
        match feature.resolved_families() {
            Ok(families) => registry.register(Define::flag(feature.define.as_str()), &families),
            Err(e) => log::warn!("skipping feature '{name}': {e}"),
        }
    }
    registry
}

fn global_defines(config: &KilnConfig) -> GlobalDefines {
    GlobalDefines {
        developer_mode: config.build.developer_mode,
        vr: config.build.vr,
        extra: config
            .defines
            .iter()
            .map(|d| Define {
                name: d.name.clone(),
                value: d.value.clone(),
            })
            .collect(),
    }
}
