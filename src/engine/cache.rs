//! Resource Cache
//!
//! Engine-side shadow of the top-level pipeline list. Each top-level item
//! owns one [`CachedItem`] holding its GPU handles; records live in a
//! [`SlotMap`] arena and are ordered by a separate key list that mirrors the
//! last reconciled pipeline.
//!
//! Reconciliation is split in two halves:
//!
//! - [`ResourceCache::plan`] compares the records against a candidate list and
//!   returns a [`ReconcilePlan`]. It is pure: nothing is compiled or released.
//! - The engine applies the plan, building records for additions, releasing
//!   removed ones and finally calling [`ResourceCache::reorder`].
//!
//! Records are matched by [`ItemId`], never by position, so moving an item in
//! the pipeline keeps its compiled programs.

use std::path::PathBuf;
use std::time::{Duration, Instant};

use rustc_hash::{FxHashMap, FxHashSet};
use slotmap::{SlotMap, new_key_type};

use super::framebuffers::PassFramebuffers;
use crate::device::{GpuDevice, ProgramId};
use crate::pipeline::{ItemId, ItemType, PipelineItem};
use crate::shader::{ComputeSource, PassSources};

new_key_type! {
    /// Arena key of a cached record.
    pub struct CacheKey;
}

// ─── Records ─────────────────────────────────────────────────────────────────

/// GPU state of a shader pass.
#[derive(Debug, Default)]
pub struct PassResources {
    /// Stage sources of the last successful load. Kept so single stages can be
    /// replaced without reading files again.
    pub sources: Option<PassSources>,
    pub program: Option<ProgramId>,
    pub debug_program: Option<ProgramId>,
    pub framebuffers: Option<PassFramebuffers>,
}

/// GPU state of a compute pass.
#[derive(Debug, Default)]
pub struct ComputeResources {
    pub source: Option<ComputeSource>,
    pub program: Option<ProgramId>,
}

/// Files an audio pass was compiled from. The program itself belongs to the
/// pass's stream.
#[derive(Debug, Default)]
pub struct AudioResources {
    pub files: Vec<PathBuf>,
}

/// Type-specific payload of a record.
#[derive(Debug)]
pub enum CachedResources {
    ShaderPass(PassResources),
    ComputePass(ComputeResources),
    AudioPass(AudioResources),
    /// Plugin items and stray top-level leaf items own nothing.
    Empty,
}

impl CachedResources {
    /// An empty payload matching `item_type`.
    #[must_use]
    pub fn empty_for(item_type: ItemType) -> Self {
        match item_type {
            ItemType::ShaderPass => Self::ShaderPass(PassResources::default()),
            ItemType::ComputePass => Self::ComputePass(ComputeResources::default()),
            ItemType::AudioPass => Self::AudioPass(AudioResources::default()),
            _ => Self::Empty,
        }
    }
}

/// Engine-owned record of one top-level pipeline item.
#[derive(Debug)]
pub struct CachedItem {
    pub id: ItemId,
    /// Name at the last reconciliation. Used as the message group.
    pub name: String,
    pub item_type: ItemType,
    pub resources: CachedResources,
}

impl CachedItem {
    #[must_use]
    pub fn new(item: &PipelineItem) -> Self {
        Self {
            id: item.id,
            name: item.name.clone(),
            item_type: item.item_type(),
            resources: CachedResources::empty_for(item.item_type()),
        }
    }

    #[must_use]
    pub fn pass(&self) -> Option<&PassResources> {
        match &self.resources {
            CachedResources::ShaderPass(pass) => Some(pass),
            _ => None,
        }
    }

    pub fn pass_mut(&mut self) -> Option<&mut PassResources> {
        match &mut self.resources {
            CachedResources::ShaderPass(pass) => Some(pass),
            _ => None,
        }
    }

    /// Whether a recompile of `path` affects this record.
    #[must_use]
    pub fn depends_on(&self, path: &std::path::Path) -> bool {
        match &self.resources {
            CachedResources::ShaderPass(pass) => {
                pass.sources.as_ref().is_some_and(|s| s.depends_on(path))
            }
            CachedResources::ComputePass(compute) => compute
                .source
                .as_ref()
                .is_some_and(|s| s.files.iter().any(|f| f == path)),
            CachedResources::AudioPass(audio) => audio.files.iter().any(|f| f == path),
            CachedResources::Empty => false,
        }
    }

    /// Destroys the programs of this record, keeping framebuffers.
    pub fn release_programs(&mut self, device: &mut dyn GpuDevice) {
        match &mut self.resources {
            CachedResources::ShaderPass(pass) => {
                if let Some(program) = pass.program.take() {
                    device.destroy_program(program);
                }
                if let Some(program) = pass.debug_program.take() {
                    device.destroy_program(program);
                }
            }
            CachedResources::ComputePass(compute) => {
                if let Some(program) = compute.program.take() {
                    device.destroy_program(program);
                }
            }
            CachedResources::AudioPass(_) | CachedResources::Empty => {}
        }
    }

    /// Destroys every GPU handle owned by this record.
    pub fn release(&mut self, device: &mut dyn GpuDevice) {
        self.release_programs(device);
        if let CachedResources::ShaderPass(pass) = &mut self.resources
            && let Some(framebuffers) = pass.framebuffers.take()
        {
            framebuffers.release(device);
        }
    }
}

// ─── Reconciliation ──────────────────────────────────────────────────────────

/// Work needed to bring the cache in line with a candidate list.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcilePlan {
    /// Candidate positions without a record, in list order.
    pub added: Vec<usize>,
    /// Records whose item is gone.
    pub removed: Vec<CacheKey>,
    /// Whether the surviving records appear in a different order.
    pub reordered: bool,
}

impl ReconcilePlan {
    #[must_use]
    pub fn is_noop(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty() && !self.reordered
    }
}

/// Arena of [`CachedItem`]s in pipeline order.
#[derive(Debug)]
pub struct ResourceCache {
    records: SlotMap<CacheKey, CachedItem>,
    order: Vec<CacheKey>,
    by_id: FxHashMap<ItemId, CacheKey>,
    last_sync: Instant,
}

impl Default for ResourceCache {
    fn default() -> Self {
        Self::new()
    }
}

impl ResourceCache {
    #[must_use]
    pub fn new() -> Self {
        Self {
            records: SlotMap::with_key(),
            order: Vec::new(),
            by_id: FxHashMap::default(),
            last_sync: Instant::now(),
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.order.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Decides whether a reconciliation should run now.
    ///
    /// A size change always syncs. Equal sizes only sync once `debounce` has
    /// passed since the last same-size sync, which then restarts the timer.
    pub fn should_sync(&mut self, candidates: usize, debounce: Duration, now: Instant) -> bool {
        if candidates != self.order.len() {
            return true;
        }
        if now.saturating_duration_since(self.last_sync) >= debounce {
            self.last_sync = now;
            return true;
        }
        false
    }

    /// Compares the records against `candidates`.
    ///
    /// Only the first item of each id is considered; later duplicates are
    /// logged and ignored.
    #[must_use]
    pub fn plan(&self, candidates: &[PipelineItem]) -> ReconcilePlan {
        let mut seen = FxHashSet::default();
        let mut added = Vec::new();
        let mut survivors = Vec::new();
        let mut retyped = FxHashSet::default();

        for (index, item) in candidates.iter().enumerate() {
            if !seen.insert(item.id) {
                log::warn!("Duplicate pipeline item id {} ('{}') ignored", item.id, item.name);
                continue;
            }
            match self.by_id.get(&item.id) {
                Some(&key) if self.records.get(key).is_some_and(|r| r.item_type == item.item_type()) => {
                    survivors.push(key);
                }
                // same id, different payload type: rebuild from scratch
                Some(_) => {
                    retyped.insert(item.id);
                    added.push(index);
                }
                None => added.push(index),
            }
        }

        let removed: Vec<CacheKey> = self
            .order
            .iter()
            .copied()
            .filter(|key| {
                self.records
                    .get(*key)
                    .is_some_and(|r| !seen.contains(&r.id) || retyped.contains(&r.id))
            })
            .collect();

        let reordered = self
            .order
            .iter()
            .filter(|key| !removed.contains(*key))
            .ne(survivors.iter());

        ReconcilePlan {
            added,
            removed,
            reordered,
        }
    }

    /// Adds a record at the end of the order. Returns the existing key if a
    /// record with the same id is already present.
    pub fn insert(&mut self, record: CachedItem) -> CacheKey {
        if let Some(&key) = self.by_id.get(&record.id) {
            return key;
        }
        let id = record.id;
        let key = self.records.insert(record);
        self.by_id.insert(id, key);
        self.order.push(key);
        key
    }

    /// Detaches a record. The caller releases its handles.
    pub fn remove(&mut self, key: CacheKey) -> Option<CachedItem> {
        let record = self.records.remove(key)?;
        self.by_id.remove(&record.id);
        self.order.retain(|k| *k != key);
        Some(record)
    }

    /// Rebuilds the order from `candidates` and refreshes record names.
    /// Candidates without a record are skipped.
    pub fn reorder(&mut self, candidates: &[PipelineItem]) {
        let mut order = Vec::with_capacity(candidates.len());
        for item in candidates {
            let Some(&key) = self.by_id.get(&item.id) else {
                continue;
            };
            if order.contains(&key) {
                continue;
            }
            if let Some(record) = self.records.get_mut(key) {
                record.name.clone_from(&item.name);
            }
            order.push(key);
        }
        self.order = order;
    }

    /// Detaches every record, in order.
    pub fn drain(&mut self) -> Vec<CachedItem> {
        self.by_id.clear();
        let order = std::mem::take(&mut self.order);
        let records = order
            .into_iter()
            .filter_map(|key| self.records.remove(key))
            .collect();
        self.records.clear();
        records
    }

    /// Keys in pipeline order.
    #[must_use]
    pub fn keys(&self) -> &[CacheKey] {
        &self.order
    }

    /// Item ids in pipeline order.
    pub fn ids(&self) -> impl Iterator<Item = ItemId> + '_ {
        self.order.iter().filter_map(|key| self.records.get(*key).map(|r| r.id))
    }

    pub fn iter(&self) -> impl Iterator<Item = &CachedItem> {
        self.order.iter().filter_map(|key| self.records.get(*key))
    }

    #[must_use]
    pub fn get(&self, key: CacheKey) -> Option<&CachedItem> {
        self.records.get(key)
    }

    pub fn get_mut(&mut self, key: CacheKey) -> Option<&mut CachedItem> {
        self.records.get_mut(key)
    }

    #[must_use]
    pub fn key_of(&self, id: ItemId) -> Option<CacheKey> {
        self.by_id.get(&id).copied()
    }

    #[must_use]
    pub fn record(&self, id: ItemId) -> Option<&CachedItem> {
        self.key_of(id).and_then(|key| self.records.get(key))
    }

    pub fn record_mut(&mut self, id: ItemId) -> Option<&mut CachedItem> {
        let key = self.key_of(id)?;
        self.records.get_mut(key)
    }
}
