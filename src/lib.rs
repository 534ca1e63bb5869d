#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::too_many_arguments)]

//! Backend-agnostic pipeline-state and shader-resource-binding core.
//!
//! GPU APIs disagree on how shaders reach their resources: explicit
//! descriptor tables under a root signature, descriptor sets under a
//! pipeline layout, or flat slot binding. This crate unifies the three
//! behind one contract:
//!
//! - Per-stage reflection tables merge into a [`BindingLayout`] through a
//!   per-backend binding model, with a 64-bit compatibility hash deciding
//!   when two layouts are interchangeable.
//! - A [`PipelineState`] owns its shaders, the finalized layout and the
//!   native pipeline object, and hands out [`ShaderResourceBinding`]
//!   instances whose caches live in presized pools.
//! - At draw time, [`PipelineState::commit_and_transition_shader_resources`]
//!   resolves the binding, performs the one-shot static-resource copy,
//!   records resource-state transitions ahead of the binding commands, and
//!   commits the descriptor data to the [`CommandContext`] stream.
//!
//! Shader compilation/reflection, device and swapchain creation, and
//! resource upload live outside this crate and are reached only through the
//! narrow interfaces in [`device`] and [`reflection`].
//!
//! [`PipelineState::commit_and_transition_shader_resources`]:
//!     pipeline::PipelineState::commit_and_transition_shader_resources

pub mod alloc;
pub mod binding;
pub mod context;
pub mod device;
pub mod errors;
pub mod pipeline;
pub mod reflection;

pub use alloc::{BindingMemoryAllocator, FixedBlockAllocator};
pub use binding::{
    BindFlags, BindingLayout, BindingModelKind, ResourceCache, ResourceMapping,
    ShaderResourceBinding,
};
pub use context::{Command, CommandContext};
pub use device::{
    BackendError, DeviceBackend, GpuResource, NativePipeline, NativePipelineDesc, NullBackend,
    ReleaseQueue, ResourceState,
};
pub use errors::{Result, SigilError};
pub use pipeline::{GraphicsStateDesc, PipelineDesc, PipelineKind, PipelineState, PrimitiveTopology};
pub use reflection::{
    ResourceKind, SamplerDesc, Shader, ShaderResourceDesc, ShaderStages, StageResourceLayout,
    StaticSamplerDesc, VariableType,
};
