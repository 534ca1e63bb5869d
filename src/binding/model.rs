//! Backend Binding Models
//!
//! Divergent native binding APIs are abstracted as one capability set —
//! build from stage layouts, finalize, report the compatibility hash, and
//! report the required cache shape — with one variant per backend family:
//!
//! - [`DescriptorTableModel`]: explicit descriptor tables under a root
//!   signature. Tables are scoped per `(stage, variable type)` and sampler
//!   tables are segregated from the rest, the way descriptor heaps demand.
//! - [`DescriptorSetModel`]: descriptor sets under a pipeline layout. One
//!   set per variable type; a resource declared by several stages under one
//!   name merges into a single slot with combined visibility.
//! - [`FlatSlotModel`]: flat slot binding. A single table with contiguous
//!   slot ranges per resource kind, merged program-globally.
//!
//! Everything above this module — pipelines, bindings, caches — is
//! backend-agnostic and only ever sees the finalized [`BindingLayout`].
//!
//! Finalization is a one-way gate: cache shape and slot offsets exist only
//! after `finalize`, and building is rejected afterwards.

use rustc_hash::FxHashMap;

use crate::binding::layout::{
    dedup_static_samplers, hash_signature, signature_of_stages, BindingLayout, CacheLayout,
    ResourceSlot, SlotRange, SlotSignature,
};
use crate::reflection::{
    ResourceKind, ShaderResourceDesc, ShaderStages, StageResourceLayout, StaticSamplerDesc,
    VariableType,
};

/// The binding model family a device backend speaks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BindingModelKind {
    /// Descriptor tables + root signature.
    DescriptorTable,
    /// Descriptor sets + pipeline layout.
    DescriptorSet,
    /// Flat slot binding.
    FlatSlot,
}

/// The polymorphic layout-construction capability set.
///
/// Call order is fixed: `build_from_stages`, then `finalize`, then the
/// accessors; `take_layout` consumes the built state.
pub(crate) trait BindingModel {
    /// Merge the per-stage declarations into model-native assignments.
    fn build_from_stages(
        &mut self,
        stages: &[StageResourceLayout],
        static_samplers: Vec<StaticSamplerDesc>,
    );

    /// Close the layout: compute slot ranges and cache offsets.
    fn finalize(&mut self);

    /// Compatibility hash; valid after `build_from_stages`.
    fn compatibility_hash(&self) -> u64;

    /// Cache backing shape; valid after `finalize`.
    fn required_cache_layout(&self) -> &CacheLayout;

    /// Move the finalized state out as an immutable [`BindingLayout`].
    fn take_layout(&mut self) -> BindingLayout;
}

/// Instantiate the layout-construction variant for a backend family.
pub(crate) fn model_for(kind: BindingModelKind) -> Box<dyn BindingModel> {
    match kind {
        BindingModelKind::DescriptorTable => Box::new(DescriptorTableModel::new()),
        BindingModelKind::DescriptorSet => Box::new(DescriptorSetModel::new()),
        BindingModelKind::FlatSlot => Box::new(FlatSlotModel::new()),
    }
}

// ─── Shared Construction State ───────────────────────────────────────────────

/// State every model variant accumulates identically; only the slot
/// assignment strategy differs between variants.
struct ModelCore {
    kind: BindingModelKind,
    signature: Vec<SlotSignature>,
    compatibility_hash: u64,
    static_samplers: Vec<StaticSamplerDesc>,
    slots: Vec<ResourceSlot>,
    cache: CacheLayout,
    built: bool,
    finalized: bool,
}

impl ModelCore {
    fn new(kind: BindingModelKind) -> Self {
        Self {
            kind,
            signature: Vec::new(),
            compatibility_hash: 0,
            static_samplers: Vec::new(),
            slots: Vec::new(),
            cache: CacheLayout::default(),
            built: false,
            finalized: false,
        }
    }

    /// Signature, hash and sampler dedup — identical for every model, and
    /// the reason compatibility is model-independent.
    fn collect(&mut self, stages: &[StageResourceLayout], samplers: Vec<StaticSamplerDesc>) {
        debug_assert!(!self.built, "build_from_stages called twice");
        self.signature = signature_of_stages(stages);
        self.compatibility_hash = hash_signature(&self.signature);
        self.static_samplers = dedup_static_samplers(samplers.iter());
        self.built = true;
    }

    /// Whether a sampler slot declared by `stage` is satisfied by a baked
    /// static sampler and therefore receives no cache slot.
    fn matches_static_sampler(&self, stage: ShaderStages, name: &str) -> bool {
        self.static_samplers
            .iter()
            .any(|s| s.visibility.intersects(stage) && s.name == name)
    }

    fn push_slot(
        &mut self,
        resource: &ShaderResourceDesc,
        visibility: ShaderStages,
        table: u32,
        first_slot: u32,
    ) {
        debug_assert!(!self.finalized, "layout is finalized");
        self.slots.push(ResourceSlot {
            name: resource.name.clone(),
            kind: resource.kind,
            visibility,
            variable_type: resource.variable_type,
            array_size: resource.array_size,
            table,
            first_slot,
            cache_offset: 0, // assigned in finalize_core
        });
    }

    /// Group the assigned slots into variable-type ranges and lay the cache
    /// out as one contiguous descriptor array.
    fn finalize_core(&mut self) {
        debug_assert!(self.built, "finalize before build_from_stages");
        debug_assert!(!self.finalized, "finalize called twice");

        let mut ranges: Vec<SlotRange> = Vec::new();
        let mut total: u32 = 0;

        for slot in &mut self.slots {
            let extend = ranges.last().is_some_and(|r| {
                r.table == slot.table
                    && r.variable_type == slot.variable_type
                    && slot.first_slot == r.first_slot + r.slot_count
            });
            if extend {
                let range = ranges.last_mut().expect("checked non-empty");
                slot.cache_offset = range.cache_offset + (slot.first_slot - range.first_slot);
                range.slot_count += slot.array_size;
            } else {
                debug_assert!(
                    ranges
                        .last()
                        .is_none_or(|r| (r.table, r.variable_type)
                            != (slot.table, slot.variable_type)
                            || slot.first_slot >= r.first_slot + r.slot_count),
                    "models must assign scope slots contiguously"
                );
                slot.cache_offset = total;
                ranges.push(SlotRange {
                    table: slot.table,
                    variable_type: slot.variable_type,
                    first_slot: slot.first_slot,
                    slot_count: slot.array_size,
                    cache_offset: total,
                });
            }
            total += slot.array_size;
        }

        self.cache = CacheLayout {
            ranges,
            total_slots: total,
        };
        self.finalized = true;
    }

    fn take_layout(&mut self) -> BindingLayout {
        debug_assert!(self.finalized, "take_layout before finalize");
        BindingLayout::new(
            self.kind,
            std::mem::take(&mut self.slots),
            std::mem::take(&mut self.static_samplers),
            std::mem::take(&mut self.cache),
            std::mem::take(&mut self.signature),
            self.compatibility_hash,
        )
    }
}

/// Forward the trait boilerplate shared by all three variants.
macro_rules! forward_core {
    () => {
        fn finalize(&mut self) {
            self.core.finalize_core();
        }

        fn compatibility_hash(&self) -> u64 {
            debug_assert!(self.core.built, "hash before build_from_stages");
            self.core.compatibility_hash
        }

        fn required_cache_layout(&self) -> &CacheLayout {
            debug_assert!(self.core.finalized, "cache layout before finalize");
            &self.core.cache
        }

        fn take_layout(&mut self) -> BindingLayout {
            self.core.take_layout()
        }
    };
}

// ─── Descriptor Tables + Root Signature ──────────────────────────────────────

/// Root-signature style assignment: every `(stage, variable type)` scope
/// gets its own table(s), samplers segregated from the rest.
pub(crate) struct DescriptorTableModel {
    core: ModelCore,
}

impl DescriptorTableModel {
    fn new() -> Self {
        Self {
            core: ModelCore::new(BindingModelKind::DescriptorTable),
        }
    }
}

impl BindingModel for DescriptorTableModel {
    fn build_from_stages(
        &mut self,
        stages: &[StageResourceLayout],
        static_samplers: Vec<StaticSamplerDesc>,
    ) {
        self.core.collect(stages, static_samplers);

        const VIEW_KINDS: [ResourceKind; 3] = [
            ResourceKind::ConstantBuffer,
            ResourceKind::ShaderResource,
            ResourceKind::UnorderedAccess,
        ];

        let mut next_table = 0u32;
        for stage in stages {
            for variable_type in VariableType::ALL {
                // CBV/SRV/UAV table of this scope
                let mut table = None;
                let mut next_slot = 0u32;
                for kind in VIEW_KINDS {
                    for resource in stage
                        .resources
                        .iter()
                        .filter(|r| r.kind == kind && r.variable_type == variable_type)
                    {
                        let t = *table.get_or_insert_with(|| {
                            let t = next_table;
                            next_table += 1;
                            t
                        });
                        self.core.push_slot(resource, stage.stage, t, next_slot);
                        next_slot += resource.array_size;
                    }
                }

                // sampler table of this scope
                let mut table = None;
                let mut next_slot = 0u32;
                for resource in stage.resources.iter().filter(|r| {
                    r.kind == ResourceKind::Sampler && r.variable_type == variable_type
                }) {
                    if self.core.matches_static_sampler(stage.stage, &resource.name) {
                        continue;
                    }
                    let t = *table.get_or_insert_with(|| {
                        let t = next_table;
                        next_table += 1;
                        t
                    });
                    self.core.push_slot(resource, stage.stage, t, next_slot);
                    next_slot += resource.array_size;
                }
            }
        }
    }

    forward_core!();
}

// ─── Descriptor Sets + Pipeline Layout ───────────────────────────────────────

/// Pipeline-layout style assignment: one set per variable type, same-name
/// declarations merged across stages with combined visibility.
pub(crate) struct DescriptorSetModel {
    core: ModelCore,
}

impl DescriptorSetModel {
    fn new() -> Self {
        Self {
            core: ModelCore::new(BindingModelKind::DescriptorSet),
        }
    }
}

impl BindingModel for DescriptorSetModel {
    fn build_from_stages(
        &mut self,
        stages: &[StageResourceLayout],
        static_samplers: Vec<StaticSamplerDesc>,
    ) {
        self.core.collect(stages, static_samplers);

        let mut merged: FxHashMap<(String, ResourceKind, VariableType), usize> =
            FxHashMap::default();

        for variable_type in VariableType::ALL {
            let table = variable_type as u32;
            let mut next_slot = 0u32;
            for kind in ResourceKind::MERGE_ORDER {
                for stage in stages {
                    for resource in stage
                        .resources
                        .iter()
                        .filter(|r| r.kind == kind && r.variable_type == variable_type)
                    {
                        if kind == ResourceKind::Sampler
                            && self.core.matches_static_sampler(stage.stage, &resource.name)
                        {
                            continue;
                        }
                        let key = (resource.name.clone(), kind, variable_type);
                        if let Some(&index) = merged.get(&key) {
                            let slot = &mut self.core.slots[index];
                            debug_assert_eq!(
                                slot.array_size, resource.array_size,
                                "stages disagree on array size of '{}'",
                                resource.name
                            );
                            slot.visibility |= stage.stage;
                            continue;
                        }
                        merged.insert(key, self.core.slots.len());
                        self.core.push_slot(resource, stage.stage, table, next_slot);
                        next_slot += resource.array_size;
                    }
                }
            }
        }
    }

    forward_core!();
}

// ─── Flat Slot Binding ───────────────────────────────────────────────────────

/// Flat-slot style assignment: a single table, contiguous slot ranges per
/// resource kind, declarations merged program-globally.
pub(crate) struct FlatSlotModel {
    core: ModelCore,
}

impl FlatSlotModel {
    fn new() -> Self {
        Self {
            core: ModelCore::new(BindingModelKind::FlatSlot),
        }
    }
}

impl BindingModel for FlatSlotModel {
    fn build_from_stages(
        &mut self,
        stages: &[StageResourceLayout],
        static_samplers: Vec<StaticSamplerDesc>,
    ) {
        self.core.collect(stages, static_samplers);

        let mut merged: FxHashMap<(String, ResourceKind, VariableType), usize> =
            FxHashMap::default();
        let mut next_slot = 0u32;

        for kind in ResourceKind::MERGE_ORDER {
            for variable_type in VariableType::ALL {
                for stage in stages {
                    for resource in stage
                        .resources
                        .iter()
                        .filter(|r| r.kind == kind && r.variable_type == variable_type)
                    {
                        if kind == ResourceKind::Sampler
                            && self.core.matches_static_sampler(stage.stage, &resource.name)
                        {
                            continue;
                        }
                        let key = (resource.name.clone(), kind, variable_type);
                        if let Some(&index) = merged.get(&key) {
                            let slot = &mut self.core.slots[index];
                            debug_assert_eq!(
                                slot.array_size, resource.array_size,
                                "stages disagree on array size of '{}'",
                                resource.name
                            );
                            slot.visibility |= stage.stage;
                            continue;
                        }
                        merged.insert(key, self.core.slots.len());
                        self.core.push_slot(resource, stage.stage, 0, next_slot);
                        next_slot += resource.array_size;
                    }
                }
            }
        }
    }

    forward_core!();
}
