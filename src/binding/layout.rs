//! Binding Layout
//!
//! The merged, backend-native description of every resource slot a pipeline
//! binds, produced from the per-stage reflection layouts by one of the
//! [`BindingModelKind`] variants and immutable once finalized.
//!
//! # Compatibility
//!
//! Two layouts are *compatible* iff they were built from an identical
//! ordered sequence of `(kind, visibility, variable_type, array_size)`
//! tuples. That sequence is canonical — stage order, then declaration order
//! — so the hash is identical across backend models. Release builds compare
//! only the 64-bit xxh3 hash; [`BindingLayout::deep_compatible_with`] walks
//! the full sequence and exists for diagnostics and for the debug-build
//! cross-check of the hash path.

use rustc_hash::FxHashMap;
use smallvec::SmallVec;
use xxhash_rust::xxh3::Xxh3;

use crate::binding::BindingModelKind;
use crate::reflection::{
    ResourceKind, ShaderStages, StageResourceLayout, StaticSamplerDesc, VariableType,
};

/// The compatibility tuple of one declared slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SlotSignature {
    pub kind: ResourceKind,
    pub visibility: ShaderStages,
    pub variable_type: VariableType,
    pub array_size: u32,
}

/// One merged resource slot with its backend-native assignment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceSlot {
    /// Declared name (merged slots keep the shared name).
    pub name: String,
    pub kind: ResourceKind,
    /// Union of the declaring stages.
    pub visibility: ShaderStages,
    pub variable_type: VariableType,
    pub array_size: u32,
    /// Binding table / set index.
    pub table: u32,
    /// First slot inside the table; arrays occupy `array_size` slots.
    pub first_slot: u32,
    /// Precomputed descriptor location inside the resource cache.
    pub cache_offset: u32,
}

/// A contiguous run of same-variable-type slots inside one table.
///
/// Ranges partition every table by [`VariableType`] so static content can
/// be bound once while mutable and dynamic content is rewritten
/// independently.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlotRange {
    pub table: u32,
    pub variable_type: VariableType,
    /// First slot of the run inside its table.
    pub first_slot: u32,
    /// Slots in the run, counting array elements.
    pub slot_count: u32,
    /// Descriptor location of the run's first slot inside the cache.
    pub cache_offset: u32,
}

/// The backing-store shape a resource cache needs for one layout.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheLayout {
    /// Every slot range, in cache order.
    pub ranges: Vec<SlotRange>,
    /// Total cache slots, counting array elements.
    pub total_slots: u32,
}

impl CacheLayout {
    /// Total slots of the given variable type.
    #[must_use]
    pub fn slots_of(&self, variable_type: VariableType) -> u32 {
        self.ranges
            .iter()
            .filter(|r| r.variable_type == variable_type)
            .map(|r| r.slot_count)
            .sum()
    }
}

// ─── Binding Layout ──────────────────────────────────────────────────────────

/// The finalized binding description of one pipeline.
///
/// Construction goes through a [`BindingModelKind`] variant; once this
/// struct exists it never changes, and any number of threads may read it.
#[derive(Debug)]
pub struct BindingLayout {
    model: BindingModelKind,
    slots: Vec<ResourceSlot>,
    /// Declared name → indices into `slots` (textures and samplers may
    /// legitimately collide across kinds or stages).
    name_lookup: FxHashMap<String, SmallVec<[u32; 2]>>,
    static_samplers: Vec<StaticSamplerDesc>,
    cache: CacheLayout,
    signature: Vec<SlotSignature>,
    compatibility_hash: u64,
}

impl BindingLayout {
    pub(crate) fn new(
        model: BindingModelKind,
        slots: Vec<ResourceSlot>,
        static_samplers: Vec<StaticSamplerDesc>,
        cache: CacheLayout,
        signature: Vec<SlotSignature>,
        compatibility_hash: u64,
    ) -> Self {
        let mut name_lookup: FxHashMap<String, SmallVec<[u32; 2]>> = FxHashMap::default();
        for (index, slot) in slots.iter().enumerate() {
            name_lookup
                .entry(slot.name.clone())
                .or_default()
                .push(index as u32);
        }
        Self {
            model,
            slots,
            name_lookup,
            static_samplers,
            cache,
            signature,
            compatibility_hash,
        }
    }

    /// The binding model this layout was built for.
    #[must_use]
    pub fn model(&self) -> BindingModelKind {
        self.model
    }

    /// Every merged slot, in assignment order.
    #[must_use]
    pub fn slots(&self) -> &[ResourceSlot] {
        &self.slots
    }

    /// Samplers baked into the layout.
    #[must_use]
    pub fn static_samplers(&self) -> &[StaticSamplerDesc] {
        &self.static_samplers
    }

    /// The cache backing shape this layout requires.
    #[must_use]
    pub fn cache_layout(&self) -> &CacheLayout {
        &self.cache
    }

    /// The 64-bit compatibility hash.
    #[must_use]
    pub fn compatibility_hash(&self) -> u64 {
        self.compatibility_hash
    }

    /// The canonical signature sequence the hash was computed over.
    #[must_use]
    pub fn signature(&self) -> &[SlotSignature] {
        &self.signature
    }

    /// Number of cache slots of the given variable type.
    #[must_use]
    pub fn slot_count_of(&self, variable_type: VariableType) -> u32 {
        self.cache.slots_of(variable_type)
    }

    /// Whether any mutable or dynamic slot exists.
    #[must_use]
    pub fn has_non_static(&self) -> bool {
        self.slot_count_of(VariableType::Mutable) != 0
            || self.slot_count_of(VariableType::Dynamic) != 0
    }

    /// Find the first slot named `name` visible to `stage`.
    #[must_use]
    pub fn find_slot(&self, stage: ShaderStages, name: &str) -> Option<(u32, &ResourceSlot)> {
        let indices = self.name_lookup.get(name)?;
        indices
            .iter()
            .map(|&i| (i, &self.slots[i as usize]))
            .find(|(_, slot)| slot.visibility.intersects(stage))
    }

    /// Full per-resource compatibility comparison.
    ///
    /// Diagnostic path only; release-build compatibility checks trust the
    /// hash. The two are asserted to agree on debug commit paths.
    #[must_use]
    pub fn deep_compatible_with(&self, other: &BindingLayout) -> bool {
        self.signature == other.signature
    }
}

// ─── Construction Helpers ────────────────────────────────────────────────────

/// The canonical signature sequence of a stage set: stage order, then
/// declaration order. Identical for every binding model by construction.
#[must_use]
pub(crate) fn signature_of_stages(stages: &[StageResourceLayout]) -> Vec<SlotSignature> {
    let mut signature = Vec::new();
    for stage in stages {
        for resource in &stage.resources {
            signature.push(SlotSignature {
                kind: resource.kind,
                visibility: stage.stage,
                variable_type: resource.variable_type,
                array_size: resource.array_size,
            });
        }
    }
    signature
}

/// xxh3-64 over the packed byte encoding of a signature sequence.
#[must_use]
pub(crate) fn hash_signature(signature: &[SlotSignature]) -> u64 {
    let mut hasher = Xxh3::new();
    for slot in signature {
        hasher.update(&[slot.kind as u8, slot.variable_type as u8]);
        hasher.update(&slot.visibility.bits().to_le_bytes());
        hasher.update(&slot.array_size.to_le_bytes());
    }
    hasher.digest()
}

/// Deduplicate static sampler declarations by `(visibility, name)`,
/// keeping the first occurrence.
#[must_use]
pub(crate) fn dedup_static_samplers<'a>(
    samplers: impl IntoIterator<Item = &'a StaticSamplerDesc>,
) -> Vec<StaticSamplerDesc> {
    let mut seen: FxHashMap<(u32, &str), ()> = FxHashMap::default();
    let mut deduped = Vec::new();
    for sampler in samplers {
        if seen
            .insert((sampler.visibility.bits(), sampler.name.as_str()), ())
            .is_none()
        {
            deduped.push(sampler.clone());
        }
    }
    deduped
}
