//! Pipeline and material lookup cache.
//!
//! Cross-pipeline checks (dependency targets, fetch sources, edit-time
//! name clashes) would otherwise rescan every group on every lookup. The
//! cache indexes one configuration snapshot three ways: pipeline name to
//! pipeline, material fingerprint to the materials carrying it, and
//! pipeline name to its dependency materials. A whole-configuration
//! reload publishes the new snapshot together with a fresh, unfilled
//! index set; the set fills lazily on the next lookup. Saving a single
//! pipeline patches just that pipeline's entries instead of rebuilding,
//! and after any sequence of patches the indexes hold exactly what a
//! fresh build from the patched tree would hold.
//!
//! A lookup pins the current index set first and reads only from that
//! set, so a concurrent reload can never empty the maps out from under
//! it; the set it pinned stays whole even when a newer one has already
//! been published. A single update lock orders snapshot swaps, priming
//! and patches with respect to one another. The cache is an ordinary
//! value handed to whoever needs it, so tests can run reload/patch
//! interleavings against their own instance.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::{Mutex, RwLock};
use tracing::{debug, instrument};

use crate::config::ConveyorConfig;
use crate::context::CrossPipelineLookup;
use crate::materials::{DependencyMaterialConfig, MaterialConfig};
use crate::name::CaseInsensitiveName;
use crate::origin::ConfigOrigin;
use crate::pipeline::PipelineConfig;

/// One generation of indexes over one configuration snapshot.
///
/// Fingerprint entries are tagged with the owning pipeline so a patch can
/// drop one pipeline's materials without touching identical materials
/// contributed by other pipelines.
#[derive(Debug, Default)]
struct CacheIndexes {
    pipelines: DashMap<CaseInsensitiveName, PipelineConfig>,
    materials_by_fingerprint: DashMap<String, Vec<(CaseInsensitiveName, MaterialConfig)>>,
    dependencies: DashMap<CaseInsensitiveName, Vec<DependencyMaterialConfig>>,
    primed: AtomicBool,
}

impl CacheIndexes {
    fn index_pipeline(&self, pipeline: &PipelineConfig) {
        self.pipelines.insert(pipeline.name.clone(), pipeline.clone());
        self.dependencies.insert(
            pipeline.name.clone(),
            pipeline.materials.dependencies().cloned().collect(),
        );
        for material in &pipeline.materials.materials {
            self.materials_by_fingerprint
                .entry(material.fingerprint())
                .or_default()
                .push((pipeline.name.clone(), material.clone()));
        }
    }
}

/// Name and fingerprint indexes over one configuration snapshot.
///
/// The snapshot and its index generation are swapped together under the
/// update lock, so the current pairing is always consistent.
#[derive(Debug, Default)]
pub struct PipelineLookupCache {
    config: RwLock<Arc<ConveyorConfig>>,
    indexes: RwLock<Arc<CacheIndexes>>,
    update_lock: Mutex<()>,
}

impl PipelineLookupCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// A cache already pointed at `config`. Indexes fill on first lookup.
    pub fn for_config(config: Arc<ConveyorConfig>) -> Self {
        let cache = Self::new();
        cache.on_config_change(config);
        cache
    }

    /// Swaps in a freshly loaded configuration and a fresh index
    /// generation. Lookups already holding the previous generation keep
    /// reading its complete view.
    #[instrument(skip(self, config))]
    pub fn on_config_change(&self, config: Arc<ConveyorConfig>) {
        let _guard = self.update_lock.lock();
        *self.config.write() = config;
        *self.indexes.write() = Arc::new(CacheIndexes::default());
        debug!("lookup cache invalidated for a new configuration snapshot");
    }

    /// Patches the indexes for one saved pipeline: its dependency entry is
    /// recomputed, its old materials leave the fingerprint index, its
    /// current materials enter it, and the name entry is replaced.
    #[instrument(skip(self, pipeline), fields(pipeline = %pipeline.name))]
    pub fn on_pipeline_config_change(&self, pipeline: &PipelineConfig) {
        let _guard = self.update_lock.lock();
        let indexes = self.indexes.read().clone();
        self.prime_if_needed(&indexes);

        for mut entry in indexes.materials_by_fingerprint.iter_mut() {
            entry.value_mut().retain(|(owner, _)| owner != &pipeline.name);
        }
        indexes.materials_by_fingerprint.retain(|_, entries| !entries.is_empty());

        indexes.index_pipeline(pipeline);
        debug!("lookup cache patched for pipeline '{}'", pipeline.name);
    }

    pub fn pipeline_config(&self, name: &CaseInsensitiveName) -> Option<PipelineConfig> {
        let indexes = self.primed_indexes();
        indexes.pipelines.get(name).map(|entry| entry.value().clone())
    }

    /// Every material in the configuration whose fingerprint matches.
    pub fn matching_materials(&self, fingerprint: &str) -> Vec<MaterialConfig> {
        let indexes = self.primed_indexes();
        indexes
            .materials_by_fingerprint
            .get(fingerprint)
            .map(|entry| {
                entry
                    .value()
                    .iter()
                    .map(|(_, material)| material.clone())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// The dependency materials of the named pipeline, empty when the name
    /// is unknown.
    pub fn dependency_materials_for(
        &self,
        name: &CaseInsensitiveName,
    ) -> Vec<DependencyMaterialConfig> {
        let indexes = self.primed_indexes();
        indexes
            .dependencies
            .get(name)
            .map(|entry| entry.value().clone())
            .unwrap_or_default()
    }

    /// Pins the current index generation, filling it first when no lookup
    /// has touched it yet.
    fn primed_indexes(&self) -> Arc<CacheIndexes> {
        let indexes = self.indexes.read().clone();
        if indexes.primed.load(Ordering::Acquire) {
            return indexes;
        }
        let _guard = self.update_lock.lock();
        // A reload may have published a newer generation while this lookup
        // waited for the lock; prime whichever generation is current now.
        let indexes = self.indexes.read().clone();
        self.prime_if_needed(&indexes);
        indexes
    }

    // Caller holds the update lock, and `indexes` is the current
    // generation re-read under it.
    fn prime_if_needed(&self, indexes: &CacheIndexes) {
        if indexes.primed.load(Ordering::Acquire) {
            return;
        }
        let config = self.config.read().clone();
        for pipeline in config.all_pipelines() {
            indexes.index_pipeline(pipeline);
        }
        indexes.primed.store(true, Ordering::Release);
        debug!(
            "lookup cache primed: {} pipelines, {} distinct fingerprints",
            indexes.pipelines.len(),
            indexes.materials_by_fingerprint.len()
        );
    }
}

/// Lets a pipeline being edited validate against the cached snapshot
/// instead of a live tree it is not part of.
impl CrossPipelineLookup for PipelineLookupCache {
    fn pipeline_exists(&self, pipeline: &CaseInsensitiveName) -> bool {
        self.primed_indexes().pipelines.contains_key(pipeline)
    }

    // The name index holds one entry per name, so a hit counts as one.
    fn pipeline_count(&self, pipeline: &CaseInsensitiveName) -> usize {
        usize::from(self.pipeline_exists(pipeline))
    }

    fn pipeline_origin(&self, pipeline: &CaseInsensitiveName) -> Option<ConfigOrigin> {
        self.primed_indexes()
            .pipelines
            .get(pipeline)
            .map(|entry| entry.value().origin.clone())
    }

    fn stage_index(
        &self,
        pipeline: &CaseInsensitiveName,
        stage: &CaseInsensitiveName,
    ) -> Option<usize> {
        self.primed_indexes()
            .pipelines
            .get(pipeline)?
            .value()
            .stage_index_of(stage)
    }

    fn job_exists(
        &self,
        pipeline: &CaseInsensitiveName,
        stage: &CaseInsensitiveName,
        job: &CaseInsensitiveName,
    ) -> bool {
        self.primed_indexes().pipelines.get(pipeline).is_some_and(|entry| {
            entry
                .value()
                .stage_named(stage)
                .is_some_and(|found| found.job_named(job).is_some())
        })
    }

    fn template_exists(&self, template: &CaseInsensitiveName) -> bool {
        self.config.read().template_by_name(template).is_some()
    }

    fn role_exists(&self, role: &CaseInsensitiveName) -> bool {
        self.config.read().security.has_role(role)
    }

    fn has_agent(&self, uuid: &str) -> bool {
        let config = self.config.read();
        config.agents().iter().any(|agent| agent.uuid == uuid)
    }
}

#[cfg(test)]
#[path = "cache_tests.rs"]
mod tests;
