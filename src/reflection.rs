//! Shader Reflection Contract
//!
//! Types consumed from the shader-reflection collaborator: per-stage tables
//! of declared resource slots plus immutable (static) sampler declarations.
//!
//! The reflection collaborator guarantees that repeated reflection of the
//! same shader yields the *same ordered* declaration list. The binding
//! compatibility hash is computed over that order, so stability here is a
//! hard requirement, not an optimization.
//!
//! Shader compilation itself is out of scope; [`Shader`] carries the
//! compiled bytecode as an opaque blob for the device backend.

use bitflags::bitflags;

bitflags! {
    /// Shader stages a resource may be visible to.
    ///
    /// A [`StageResourceLayout`] always belongs to exactly one stage; merged
    /// binding slots may carry a union of stages as their visibility.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ShaderStages: u32 {
        const VERTEX   = 1 << 0;
        const FRAGMENT = 1 << 1;
        const GEOMETRY = 1 << 2;
        const COMPUTE  = 1 << 3;
    }
}

/// Number of distinct shader stages representable in [`ShaderStages`].
pub const MAX_SHADER_STAGES: usize = 4;

impl ShaderStages {
    /// Dense index of a single-stage flag, for per-stage arrays.
    ///
    /// # Panics
    ///
    /// Panics if `self` is not exactly one stage bit.
    #[must_use]
    pub fn stage_index(self) -> usize {
        assert_eq!(self.bits().count_ones(), 1, "expected a single stage bit");
        self.bits().trailing_zeros() as usize
    }

    /// Whether exactly one stage bit is set.
    #[must_use]
    pub fn is_single_stage(self) -> bool {
        self.bits().count_ones() == 1
    }
}

/// Kind of a declared shader resource slot.
///
/// The variant order here is the fixed, stable order the binding-layout
/// merge walks kinds in; changing it changes every compatibility hash.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ResourceKind {
    /// Uniform/constant buffer.
    ConstantBuffer = 0,
    /// Read-only shader resource (sampled texture or read-only buffer).
    ShaderResource = 1,
    /// Read-write storage resource.
    UnorderedAccess = 2,
    /// Texture sampler.
    Sampler = 3,
}

impl ResourceKind {
    /// All kinds in the fixed merge order.
    pub const MERGE_ORDER: [ResourceKind; 4] = [
        ResourceKind::ConstantBuffer,
        ResourceKind::ShaderResource,
        ResourceKind::UnorderedAccess,
        ResourceKind::Sampler,
    ];
}

/// How often the resource bound to a slot may change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u8)]
pub enum VariableType {
    /// Bound once on the pipeline itself, never changes afterwards.
    Static = 0,
    /// Bound once per shader resource binding.
    Mutable = 1,
    /// May be rebound between draws.
    Dynamic = 2,
}

impl VariableType {
    /// All variable types, static first.
    pub const ALL: [VariableType; 3] = [
        VariableType::Static,
        VariableType::Mutable,
        VariableType::Dynamic,
    ];
}

/// One resource slot declared by a shader stage.
///
/// Visibility is implied by the declaring stage and is not part of this
/// struct; merged layouts attach it explicitly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShaderResourceDesc {
    /// Name the shader declares the resource under.
    pub name: String,
    /// Slot kind.
    pub kind: ResourceKind,
    /// Rebind frequency class.
    pub variable_type: VariableType,
    /// Array size; 1 for non-arrays.
    pub array_size: u32,
}

impl ShaderResourceDesc {
    /// Convenience constructor for a non-array slot.
    #[must_use]
    pub fn new(name: &str, kind: ResourceKind, variable_type: VariableType) -> Self {
        Self::with_array(name, kind, variable_type, 1)
    }

    /// Constructor for an array slot.
    #[must_use]
    pub fn with_array(
        name: &str,
        kind: ResourceKind,
        variable_type: VariableType,
        array_size: u32,
    ) -> Self {
        Self {
            name: name.to_string(),
            kind,
            variable_type,
            array_size: array_size.max(1),
        }
    }
}

// ─── Static Samplers ─────────────────────────────────────────────────────────

/// Texture filtering mode for an immutable sampler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum FilterMode {
    Nearest,
    #[default]
    Linear,
}

/// Texture addressing mode for an immutable sampler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum AddressMode {
    #[default]
    ClampToEdge,
    Repeat,
    MirrorRepeat,
}

/// Fixed sampler state baked into a binding layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct SamplerDesc {
    pub min_filter: FilterMode,
    pub mag_filter: FilterMode,
    pub address_mode: AddressMode,
    /// Depth-comparison sampler when set.
    pub comparison: bool,
}

/// A sampler declared in reflection as immutable.
///
/// Static samplers are baked into the binding layout at merge time; a
/// declared `Sampler` slot whose `(visibility, name)` matches one of these
/// receives no cache slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StaticSamplerDesc {
    /// Declared sampler name.
    pub name: String,
    /// Stages the sampler is visible to.
    pub visibility: ShaderStages,
    /// Baked sampler state.
    pub sampler: SamplerDesc,
}

// ─── Per-Stage Layout ────────────────────────────────────────────────────────

/// The ordered table of resource slots one shader stage declares.
///
/// Built once from reflection and immutable thereafter. The pipeline owns
/// one per stage in a contiguous array sized to its stage count.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageResourceLayout {
    /// The declaring stage (exactly one bit).
    pub stage: ShaderStages,
    /// Declared slots, in reflection order.
    pub resources: Vec<ShaderResourceDesc>,
}

impl StageResourceLayout {
    /// Build a per-stage layout from a reflection declaration list.
    ///
    /// # Panics
    ///
    /// Panics if `stage` is not a single stage bit.
    #[must_use]
    pub fn new(stage: ShaderStages, resources: Vec<ShaderResourceDesc>) -> Self {
        assert!(stage.is_single_stage(), "stage layout requires a single stage");
        Self { stage, resources }
    }

    /// Number of declared slots of the given variable type.
    #[must_use]
    pub fn count_of(&self, variable_type: VariableType) -> usize {
        self.resources
            .iter()
            .filter(|r| r.variable_type == variable_type)
            .count()
    }
}

// ─── Shader Object ───────────────────────────────────────────────────────────

/// A compiled shader stage as delivered by the reflection collaborator.
///
/// The bytecode is opaque to this core; only the device backend interprets
/// it. The resource table and static samplers drive layout construction.
#[derive(Debug, Clone)]
pub struct Shader {
    /// The stage this shader runs at (exactly one bit).
    pub stage: ShaderStages,
    /// Declared resource slots, in stable reflection order.
    pub resources: Vec<ShaderResourceDesc>,
    /// Samplers reflection marked as immutable.
    pub static_samplers: Vec<StaticSamplerDesc>,
    /// Compiled bytecode, opaque to this crate.
    pub bytecode: Vec<u8>,
}

impl Shader {
    /// Create a shader with no declared resources.
    ///
    /// # Panics
    ///
    /// Panics if `stage` is not a single stage bit.
    #[must_use]
    pub fn new(stage: ShaderStages, bytecode: Vec<u8>) -> Self {
        assert!(stage.is_single_stage(), "a shader belongs to a single stage");
        Self {
            stage,
            resources: Vec::new(),
            static_samplers: Vec::new(),
            bytecode,
        }
    }

    /// Builder-style: append a declared resource slot.
    #[must_use]
    pub fn with_resource(mut self, resource: ShaderResourceDesc) -> Self {
        self.resources.push(resource);
        self
    }

    /// Builder-style: append an immutable sampler declaration.
    #[must_use]
    pub fn with_static_sampler(mut self, sampler: StaticSamplerDesc) -> Self {
        self.static_samplers.push(sampler);
        self
    }

    /// The per-stage resource layout this shader induces.
    #[must_use]
    pub fn stage_layout(&self) -> StageResourceLayout {
        StageResourceLayout::new(self.stage, self.resources.clone())
    }
}
