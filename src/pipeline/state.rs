//! Pipeline State
//!
//! [`PipelineState`] owns the shader set, the finalized binding layout, the
//! native pipeline object and the pools its bindings allocate from.
//!
//! Construction is a linear state machine — parse the per-stage layouts,
//! finalize the binding layout, create the native object, then bindings can
//! be allocated — and is terminal: a constructed pipeline never changes its
//! layout, and a failed construction leaves nothing observable.
//!
//! The default binding is materialized lazily on first use, so pipelines
//! whose resources are all static never force callers to allocate one.

use std::sync::Arc;
use std::sync::OnceLock;

use smallvec::SmallVec;

use crate::alloc::BindingMemoryAllocator;
use crate::binding::cache::ResourceCache;
use crate::binding::layout::BindingLayout;
use crate::binding::model::model_for;
use crate::binding::srb::{BindFlags, ResourceMapping, ShaderResourceBinding};
use crate::context::{Command, CommandContext};
use crate::device::{DeviceBackend, GpuResource, NativePipeline, NativePipelineDesc, ResourceState};
use crate::errors::{Result, SigilError};
use crate::pipeline::desc::{PipelineDesc, PipelineKind};
use crate::reflection::{
    Shader, ShaderStages, StageResourceLayout, StaticSamplerDesc, VariableType, MAX_SHADER_STAGES,
};

/// An immutable pipeline state object.
pub struct PipelineState {
    name: String,
    kind: PipelineKind,
    shaders: SmallVec<[Arc<Shader>; MAX_SHADER_STAGES]>,
    /// Per-stage reflection layouts, contiguous, in shader order.
    stage_layouts: Box<[StageResourceLayout]>,
    layout: Arc<BindingLayout>,
    /// Static variable values, indexed parallel to `layout.slots()`; only
    /// entries of static slots are ever set.
    static_values: Vec<Option<Arc<dyn GpuResource>>>,
    backend: Arc<dyn DeviceBackend>,
    native: NativePipeline,
    srb_memory: BindingMemoryAllocator,
    default_srb: OnceLock<ShaderResourceBinding>,
    compatibility_hash: u64,
}

impl PipelineState {
    /// Construct a pipeline: parse stage layouts, finalize the binding
    /// layout, create the native object.
    ///
    /// Fatal failures — a missing required stage, a stage the pipeline kind
    /// does not support, backend rejection — return `Err` and leave no
    /// partially constructed pipeline behind.
    pub fn new(backend: Arc<dyn DeviceBackend>, desc: PipelineDesc) -> Result<Self> {
        validate_stages(&desc)?;

        // ParseLayouts
        let shaders: SmallVec<[Arc<Shader>; MAX_SHADER_STAGES]> =
            desc.shaders.iter().cloned().collect();
        let stage_layouts: Box<[StageResourceLayout]> =
            shaders.iter().map(|s| s.stage_layout()).collect();
        let static_samplers: Vec<StaticSamplerDesc> = shaders
            .iter()
            .flat_map(|s| s.static_samplers.iter().cloned())
            .collect();

        // FinalizeBindingLayout: must complete before any cache sizing below.
        let mut model = model_for(backend.binding_model());
        model.build_from_stages(&stage_layouts, static_samplers);
        model.finalize();
        let cache_backing =
            ResourceCache::backing_layout(model.required_cache_layout().total_slots);
        let layout = Arc::new(model.take_layout());
        let compatibility_hash = layout.compatibility_hash();

        // CreateNativePipelineObject
        let native = backend
            .create_pipeline(&NativePipelineDesc {
                name: &desc.name,
                shaders: &shaders,
                layout: &layout,
                graphics: desc.kind.graphics_state(),
            })
            .map_err(|e| SigilError::PipelineCreationFailed {
                pipeline: desc.name.clone(),
                reason: e.to_string(),
            })?;

        let granularity = desc.srb_allocation_granularity.max(1) as usize;
        let srb_memory = BindingMemoryAllocator::new(granularity, [cache_backing]);
        let static_values = vec![None; layout.slots().len()];

        log::debug!(
            "Created pipeline '{}' ({} slots, hash {compatibility_hash:#018x})",
            desc.name,
            layout.slots().len()
        );

        Ok(Self {
            name: desc.name,
            kind: desc.kind,
            shaders,
            stage_layouts,
            layout,
            static_values,
            backend,
            native,
            srb_memory,
            default_srb: OnceLock::new(),
            compatibility_hash,
        })
    }

    // ── Accessors ────────────────────────────────────────────────────────────

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn kind(&self) -> &PipelineKind {
        &self.kind
    }

    /// The finalized binding layout.
    #[must_use]
    pub fn layout(&self) -> &Arc<BindingLayout> {
        &self.layout
    }

    /// The native pipeline handle the backend issued.
    #[must_use]
    pub fn native_pipeline(&self) -> NativePipeline {
        self.native
    }

    /// The 64-bit binding-compatibility hash.
    #[must_use]
    pub fn compatibility_hash(&self) -> u64 {
        self.compatibility_hash
    }

    /// The per-stage reflection layout of `stage`, if that stage is present.
    #[must_use]
    pub fn stage_layout(&self, stage: ShaderStages) -> Option<&StageResourceLayout> {
        self.stage_layouts.iter().find(|l| l.stage == stage)
    }

    /// Number of static variables visible to `stage`.
    #[must_use]
    pub fn static_variable_count(&self, stage: ShaderStages) -> usize {
        self.layout
            .slots()
            .iter()
            .filter(|s| s.variable_type == VariableType::Static && s.visibility.intersects(stage))
            .count()
    }

    /// The pools this pipeline's bindings allocate from.
    #[must_use]
    pub fn binding_memory(&self) -> &BindingMemoryAllocator {
        &self.srb_memory
    }

    // ── Compatibility ────────────────────────────────────────────────────────

    /// Whether bindings created for `other` may be committed against this
    /// pipeline. Hash comparison; reflexive and symmetric.
    #[must_use]
    pub fn is_compatible_with(&self, other: &PipelineState) -> bool {
        let compatible = self.compatibility_hash == other.compatibility_hash;
        debug_assert_eq!(
            compatible,
            self.layout.deep_compatible_with(&other.layout),
            "compatibility hash disagrees with the deep comparison \
             ('{}' vs '{}')",
            self.name,
            other.name
        );
        compatible
    }

    // ── Static Resources ─────────────────────────────────────────────────────

    /// Resolve every static slot by declared name.
    ///
    /// This is the pipeline's own default binding path: values set here are
    /// copied into every binding's static region on its one-shot
    /// initialization. Resolution semantics and flags match
    /// [`ShaderResourceBinding::bind_shader_resources`].
    pub fn bind_shader_resources(
        &mut self,
        mapping: &ResourceMapping,
        flags: BindFlags,
    ) -> Result<()> {
        let mut unresolved: Vec<String> = Vec::new();

        for (index, slot) in self.layout.slots().iter().enumerate() {
            if slot.variable_type != VariableType::Static {
                continue;
            }
            match mapping.get(&slot.name) {
                Some(resource) => {
                    if flags.contains(BindFlags::KEEP_EXISTING)
                        && self.static_values[index].is_some()
                    {
                        continue;
                    }
                    self.static_values[index] = Some(Arc::clone(resource));
                }
                None => {
                    if self.static_values[index].is_none() {
                        unresolved.push(slot.name.clone());
                    }
                }
            }
        }

        self.refresh_default_srb();

        if unresolved.is_empty() {
            return Ok(());
        }
        if flags.contains(BindFlags::VERIFY_ALL_RESOLVED) {
            return Err(SigilError::UnresolvedResources {
                pipeline: self.name.clone(),
                names: unresolved,
            });
        }
        for name in &unresolved {
            log::warn!("Static shader resource '{name}' of pipeline '{}' was not resolved", self.name);
        }
        Ok(())
    }

    /// Bind a single static variable by stage and name.
    ///
    /// Returns `false` (with a warning) if no matching static slot exists.
    pub fn set_static_variable(
        &mut self,
        stage: ShaderStages,
        name: &str,
        resource: Arc<dyn GpuResource>,
    ) -> bool {
        match self.layout.find_slot(stage, name) {
            Some((index, slot)) if slot.variable_type == VariableType::Static => {
                self.static_values[index as usize] = Some(resource);
                self.refresh_default_srb();
                true
            }
            Some(_) => {
                log::warn!(
                    "'{name}' in pipeline '{}' is not a static variable; bind it on a binding instance",
                    self.name
                );
                false
            }
            None => {
                log::warn!("Shader resource '{name}' is not declared by pipeline '{}'", self.name);
                false
            }
        }
    }

    // ── Bindings ─────────────────────────────────────────────────────────────

    /// Allocate a new binding instance for this pipeline. Its static region
    /// is populated on its first commit.
    pub fn create_shader_resource_binding(&self) -> Result<ShaderResourceBinding> {
        ShaderResourceBinding::new(
            &self.name,
            self.compatibility_hash,
            Arc::clone(&self.layout),
            &self.srb_memory,
        )
    }

    /// The lazily materialized default binding.
    fn default_srb(&self) -> &ShaderResourceBinding {
        self.default_srb.get_or_init(|| {
            let mut srb = ShaderResourceBinding::new(
                &self.name,
                self.compatibility_hash,
                Arc::clone(&self.layout),
                &self.srb_memory,
            )
            .expect("default binding pools are presized at construction");
            srb.copy_static_resources(&self.static_values);
            srb.mark_statics_initialized();
            srb
        })
    }

    fn refresh_default_srb(&mut self) {
        // &mut self: nothing can observe the default binding concurrently.
        if let Some(srb) = self.default_srb.get_mut() {
            srb.copy_static_resources(&self.static_values);
        }
    }

    // ── Commit ───────────────────────────────────────────────────────────────

    /// Resolve the binding (explicit or default), lazily populate its
    /// static region, then record transitions and/or binding commands.
    ///
    /// With `transition_resources` set, pending state transitions are
    /// recorded on `ctx` strictly before any binding command. With
    /// `commit_resources` unset, only transitions are recorded (pre-pass
    /// barrier batching). Requesting neither is a programming error:
    /// a debug assertion, and a warned no-op returning `None` in release.
    ///
    /// A binding whose compatibility hash differs from this pipeline's is
    /// rejected with a warning and `None`; the stream is left untouched.
    pub fn commit_and_transition_shader_resources<'a>(
        &'a self,
        srb: Option<&'a mut ShaderResourceBinding>,
        ctx: &mut CommandContext,
        commit_resources: bool,
        transition_resources: bool,
    ) -> Option<&'a ResourceCache> {
        debug_assert!(
            commit_resources || transition_resources,
            "commit on '{}' requests neither resource commit nor transitions",
            self.name
        );
        if !commit_resources && !transition_resources {
            log::warn!("Commit on pipeline '{}' requested no work; ignored", self.name);
            return None;
        }

        let cache: &ResourceCache = match srb {
            Some(srb) => {
                if srb.compatibility_hash() != self.compatibility_hash {
                    log::warn!(
                        "Shader resource binding is incompatible with pipeline '{}'; commit ignored",
                        self.name
                    );
                    return None;
                }
                // First commit only: copy the static region from this pipeline.
                srb.initialize_static_resources(&self.static_values);
                (*srb).cache()
            }
            None => {
                debug_assert!(
                    !self.layout.has_non_static(),
                    "pipeline '{}' declares mutable/dynamic resources and requires an explicit \
                     shader resource binding to commit",
                    self.name
                );
                self.default_srb().cache()
            }
        };

        if transition_resources {
            self.record_transitions(cache, ctx);
        }
        if commit_resources {
            self.record_bindings(ctx);
        }
        Some(cache)
    }

    /// Record state transitions for every bound resource that is not yet in
    /// the state its slot kind requires.
    fn record_transitions(&self, cache: &ResourceCache, ctx: &mut CommandContext) {
        for slot in self.layout.slots() {
            let Some(required) = ResourceState::for_kind(slot.kind) else {
                continue; // samplers carry no state
            };
            for element in 0..slot.array_size {
                if let Some(resource) = cache.resource_at(slot.cache_offset + element) {
                    ctx.transition_resource(resource, required);
                }
            }
        }
    }

    fn record_bindings(&self, ctx: &mut CommandContext) {
        ctx.record(Command::SetBindingLayout {
            compatibility_hash: self.compatibility_hash,
        });
        for range in &self.layout.cache_layout().ranges {
            ctx.record(Command::BindTable {
                table: range.table,
                first_descriptor: range.cache_offset,
                descriptor_count: range.slot_count,
            });
        }
    }
}

impl Drop for PipelineState {
    fn drop(&mut self) {
        // The native object may still be referenced by in-flight GPU work;
        // actual destruction waits for the device's completion counter.
        self.backend.release_queue().enqueue(self.native);
    }
}

impl std::fmt::Debug for PipelineState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PipelineState")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("shaders", &self.shaders.len())
            .field("hash", &format_args!("{:#018x}", self.compatibility_hash))
            .finish_non_exhaustive()
    }
}

/// Stage validation for the pipeline kind: required stages present, no
/// foreign or duplicated stages.
fn validate_stages(desc: &PipelineDesc) -> Result<()> {
    let mut seen = ShaderStages::empty();
    for shader in &desc.shaders {
        if seen.intersects(shader.stage) {
            return Err(SigilError::DuplicateShaderStage {
                pipeline: desc.name.clone(),
                stage: shader.stage,
            });
        }
        seen |= shader.stage;

        let allowed = match desc.kind {
            PipelineKind::Compute => shader.stage == ShaderStages::COMPUTE,
            PipelineKind::Graphics(_) => shader.stage != ShaderStages::COMPUTE,
        };
        if !allowed {
            return Err(SigilError::StageNotSupported {
                pipeline: desc.name.clone(),
                stage: shader.stage,
            });
        }
    }

    let required = if desc.kind.is_compute() {
        ShaderStages::COMPUTE
    } else {
        ShaderStages::VERTEX
    };
    if !seen.contains(required) {
        return Err(SigilError::MissingShaderStage {
            pipeline: desc.name.clone(),
            stage: required,
        });
    }
    Ok(())
}
