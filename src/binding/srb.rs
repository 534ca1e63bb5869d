//! Shader Resource Binding
//!
//! The user-facing handle pairing one [`ResourceCache`] with its owning
//! pipeline. A binding belongs to one command-generation thread; all
//! mutation goes through `&mut self`, so concurrent writers are rejected at
//! compile time instead of by runtime locks.
//!
//! Lifecycle: `Created → StaticsBound → Ready`. The static region is copied
//! from the owning pipeline exactly once, on first commit; mutable and
//! dynamic slots may be rewritten any time afterwards through
//! [`ShaderResourceBinding::bind_shader_resources`].

use std::sync::Arc;

use bitflags::bitflags;
use rustc_hash::FxHashMap;

use crate::alloc::BindingMemoryAllocator;
use crate::binding::cache::ResourceCache;
use crate::binding::layout::BindingLayout;
use crate::device::GpuResource;
use crate::errors::{Result, SigilError};
use crate::reflection::{ShaderStages, VariableType};

bitflags! {
    /// Flags steering name-based resource binding.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct BindFlags: u32 {
        /// Fail with [`SigilError::UnresolvedResources`] if any targeted
        /// slot stays unbound after the call.
        const VERIFY_ALL_RESOLVED = 1 << 0;
        /// Leave slots that already hold a resource untouched.
        const KEEP_EXISTING = 1 << 1;
    }
}

/// A caller-supplied name → resource mapping.
#[derive(Default)]
pub struct ResourceMapping {
    entries: FxHashMap<String, Arc<dyn GpuResource>>,
}

impl ResourceMapping {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a named resource; returns `self` for chaining.
    #[must_use]
    pub fn with(mut self, name: &str, resource: Arc<dyn GpuResource>) -> Self {
        self.insert(name, resource);
        self
    }

    /// Insert or replace a named resource.
    pub fn insert(&mut self, name: &str, resource: Arc<dyn GpuResource>) {
        self.entries.insert(name.to_string(), resource);
    }

    /// Remove a named resource.
    pub fn remove(&mut self, name: &str) -> Option<Arc<dyn GpuResource>> {
        self.entries.remove(name)
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Arc<dyn GpuResource>> {
        self.entries.get(name)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl std::fmt::Debug for ResourceMapping {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResourceMapping")
            .field("entries", &self.entries.len())
            .finish()
    }
}

/// A binding instance of one pipeline: its resource cache plus the one-shot
/// statics flag.
#[derive(Debug)]
pub struct ShaderResourceBinding {
    /// Owning pipeline's name, for diagnostics.
    pipeline_name: String,
    /// Owning pipeline's compatibility hash; commits against a pipeline
    /// with a different hash are rejected with a warning.
    compatibility_hash: u64,
    cache: ResourceCache,
    statics_initialized: bool,
}

impl ShaderResourceBinding {
    pub(crate) fn new(
        pipeline_name: &str,
        compatibility_hash: u64,
        layout: Arc<BindingLayout>,
        memory: &BindingMemoryAllocator,
    ) -> Result<Self> {
        let cache = ResourceCache::new(layout, memory)?;
        Ok(Self {
            pipeline_name: pipeline_name.to_string(),
            compatibility_hash,
            cache,
            statics_initialized: false,
        })
    }

    /// The layout this binding is shaped by.
    #[must_use]
    pub fn layout(&self) -> &Arc<BindingLayout> {
        self.cache.layout()
    }

    /// Compatibility hash of the owning pipeline.
    #[must_use]
    pub fn compatibility_hash(&self) -> u64 {
        self.compatibility_hash
    }

    /// The bound-resource cache.
    #[must_use]
    pub fn cache(&self) -> &ResourceCache {
        &self.cache
    }

    /// Whether the static region has been populated.
    #[must_use]
    pub fn statics_initialized(&self) -> bool {
        self.statics_initialized
    }

    /// Resolve every mutable and dynamic slot by declared name.
    ///
    /// A resolved slot is rewritten (releasing the previously cached view)
    /// unless [`BindFlags::KEEP_EXISTING`] is set and it already holds a
    /// resource. An unresolved slot that is already bound is left
    /// untouched; an unresolved, still-unbound slot is logged as a warning
    /// — or fails the call when [`BindFlags::VERIFY_ALL_RESOLVED`] is set.
    /// Slots that were bound are unaffected by a failure.
    pub fn bind_shader_resources(
        &mut self,
        mapping: &ResourceMapping,
        flags: BindFlags,
    ) -> Result<()> {
        let layout = Arc::clone(self.cache.layout());
        let mut unresolved: Vec<String> = Vec::new();

        for slot in layout.slots() {
            if slot.variable_type == VariableType::Static {
                continue;
            }
            let offset = slot.cache_offset;
            match mapping.get(&slot.name) {
                Some(resource) => {
                    if flags.contains(BindFlags::KEEP_EXISTING)
                        && self.cache.resource_at(offset).is_some()
                    {
                        continue;
                    }
                    self.cache.set_resource(offset, Some(Arc::clone(resource)));
                }
                None => {
                    if self.cache.resource_at(offset).is_none() {
                        unresolved.push(slot.name.clone());
                    }
                }
            }
        }

        self.report_unresolved(unresolved, flags)
    }

    /// Bind a single mutable or dynamic variable by stage and name.
    ///
    /// Returns `false` (with a warning) if no matching non-static slot is
    /// declared.
    pub fn set_variable(
        &mut self,
        stage: ShaderStages,
        name: &str,
        resource: Arc<dyn GpuResource>,
    ) -> bool {
        let layout = Arc::clone(self.cache.layout());
        match layout.find_slot(stage, name) {
            Some((_, slot)) if slot.variable_type != VariableType::Static => {
                self.cache.set_resource(slot.cache_offset, Some(resource));
                true
            }
            Some(_) => {
                log::warn!(
                    "'{name}' in pipeline '{}' is a static variable; bind it on the pipeline",
                    self.pipeline_name
                );
                false
            }
            None => {
                log::warn!(
                    "Shader resource '{name}' is not declared by pipeline '{}'",
                    self.pipeline_name
                );
                false
            }
        }
    }

    /// One-shot copy of the pipeline's static resource references into the
    /// static region. Idempotent: repeated calls are no-ops.
    ///
    /// `static_values` is indexed parallel to the layout's slot list.
    pub(crate) fn initialize_static_resources(
        &mut self,
        static_values: &[Option<Arc<dyn GpuResource>>],
    ) {
        if self.statics_initialized {
            return;
        }
        self.copy_static_resources(static_values);
        self.statics_initialized = true;
    }

    /// Unconditional static-region copy, used by the owning pipeline to
    /// refresh an already-initialized default binding.
    pub(crate) fn copy_static_resources(
        &mut self,
        static_values: &[Option<Arc<dyn GpuResource>>],
    ) {
        let layout = Arc::clone(self.cache.layout());
        debug_assert_eq!(static_values.len(), layout.slots().len());
        for (slot, value) in layout.slots().iter().zip(static_values) {
            if slot.variable_type == VariableType::Static {
                self.cache.set_resource(slot.cache_offset, value.clone());
            }
        }
    }

    pub(crate) fn mark_statics_initialized(&mut self) {
        self.statics_initialized = true;
    }

    fn report_unresolved(&self, unresolved: Vec<String>, flags: BindFlags) -> Result<()> {
        if unresolved.is_empty() {
            return Ok(());
        }
        if flags.contains(BindFlags::VERIFY_ALL_RESOLVED) {
            return Err(SigilError::UnresolvedResources {
                pipeline: self.pipeline_name.clone(),
                names: unresolved,
            });
        }
        for name in &unresolved {
            log::warn!(
                "Shader resource '{name}' of pipeline '{}' was not resolved",
                self.pipeline_name
            );
        }
        Ok(())
    }
}
