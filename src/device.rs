//! Device Collaborator Boundary
//!
//! The narrow interfaces this core consumes from the rest of a renderer:
//!
//! - [`DeviceBackend`]: native pipeline-object creation plus the deferred
//!   release queue. The backend also names the binding model its API speaks
//!   ([`BindingModelKind`]), which selects the layout variant a pipeline
//!   builds.
//! - [`GpuResource`]: the minimal view of a bindable resource — a name for
//!   diagnostics and a usage state for transition recording. Reference
//!   counting and upload plumbing stay outside this crate; resources arrive
//!   as `Arc<dyn GpuResource>`.
//! - [`ReleaseQueue`]: native objects are destroyed only after the device
//!   reports that all GPU work referencing them has retired, keyed by a
//!   monotonically increasing completion counter.
//!
//! [`NullBackend`] is an inert implementation used by the test suite.

use std::collections::VecDeque;
use std::num::NonZeroU64;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use bitflags::bitflags;
use parking_lot::Mutex;

use crate::binding::{BindingLayout, BindingModelKind};
use crate::pipeline::GraphicsStateDesc;
use crate::reflection::Shader;

bitflags! {
    /// Usage state of a bindable resource, for transition recording.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ResourceState: u32 {
        const CONSTANT_BUFFER  = 1 << 0;
        const SHADER_RESOURCE  = 1 << 1;
        const UNORDERED_ACCESS = 1 << 2;
        const RENDER_TARGET    = 1 << 3;
        const COPY_SOURCE      = 1 << 4;
        const COPY_DEST        = 1 << 5;
    }
}

impl ResourceState {
    /// The state a resource must be in to be read through a slot of the
    /// given kind. Samplers carry no state and need no transitions.
    #[must_use]
    pub fn for_kind(kind: crate::reflection::ResourceKind) -> Option<Self> {
        use crate::reflection::ResourceKind;
        match kind {
            ResourceKind::ConstantBuffer => Some(Self::CONSTANT_BUFFER),
            ResourceKind::ShaderResource => Some(Self::SHADER_RESOURCE),
            ResourceKind::UnorderedAccess => Some(Self::UNORDERED_ACCESS),
            ResourceKind::Sampler => None,
        }
    }
}

/// The minimal contract a bindable resource exposes to this core.
///
/// Implementors track their state with interior mutability (typically an
/// atomic); the binding core reads and advances it when recording
/// transitions.
pub trait GpuResource: Send + Sync {
    /// Diagnostic name.
    fn name(&self) -> &str;
    /// Current usage state.
    fn state(&self) -> ResourceState;
    /// Record the resource as now being in `state`.
    fn set_state(&self, state: ResourceState);
}

impl std::fmt::Debug for dyn GpuResource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GpuResource")
            .field("name", &self.name())
            .field("state", &self.state())
            .finish()
    }
}

// ─── Native Pipeline Handles ─────────────────────────────────────────────────

/// Opaque handle to a backend-native pipeline object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NativePipeline(NonZeroU64);

impl NativePipeline {
    /// Wrap a backend-issued raw handle.
    #[must_use]
    pub fn from_raw(raw: NonZeroU64) -> Self {
        Self(raw)
    }

    /// The raw handle value.
    #[must_use]
    pub fn raw(self) -> NonZeroU64 {
        self.0
    }
}

/// Everything a backend needs to create a native pipeline object.
///
/// Borrowed from the pipeline under construction; the backend must not
/// retain references past the call.
pub struct NativePipelineDesc<'a> {
    /// Pipeline name, for backend-side labels.
    pub name: &'a str,
    /// The compiled shader set.
    pub shaders: &'a [Arc<Shader>],
    /// The finalized binding layout.
    pub layout: &'a BindingLayout,
    /// Fixed-function state for graphics pipelines, `None` for compute.
    pub graphics: Option<&'a GraphicsStateDesc>,
}

/// Reason a backend rejected native pipeline creation.
#[derive(Debug, Clone)]
pub struct BackendError(pub String);

impl std::fmt::Display for BackendError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// The device collaborator: creates native pipeline objects and owns the
/// deferred release machinery.
pub trait DeviceBackend: Send + Sync {
    /// The binding model this backend's API speaks.
    fn binding_model(&self) -> BindingModelKind;

    /// Create the native pipeline object. Failure is fatal to pipeline
    /// construction.
    fn create_pipeline(
        &self,
        desc: &NativePipelineDesc<'_>,
    ) -> std::result::Result<NativePipeline, BackendError>;

    /// The queue native handles are retired through.
    fn release_queue(&self) -> &ReleaseQueue;
}

// ─── Deferred Release ────────────────────────────────────────────────────────

/// Deferred-release queue for native objects still referenced by in-flight
/// GPU work.
///
/// Every enqueued handle is tagged with the current submission counter
/// value. [`ReleaseQueue::purge`] pops the handles whose tag is at or below
/// the completed counter the device reports; only those may be destroyed.
pub struct ReleaseQueue {
    /// Value the next enqueued handle is tagged with.
    submission: AtomicU64,
    pending: Mutex<VecDeque<(u64, NativePipeline)>>,
}

impl Default for ReleaseQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl ReleaseQueue {
    #[must_use]
    pub fn new() -> Self {
        Self {
            submission: AtomicU64::new(1),
            pending: Mutex::new(VecDeque::new()),
        }
    }

    /// Tag `handle` with the current submission counter and park it.
    pub fn enqueue(&self, handle: NativePipeline) {
        let tag = self.submission.load(Ordering::Acquire);
        self.pending.lock().push_back((tag, handle));
    }

    /// Mark a submission boundary; handles enqueued afterwards retire later.
    /// Returns the new counter value.
    pub fn advance(&self) -> u64 {
        self.submission.fetch_add(1, Ordering::AcqRel) + 1
    }

    /// Pop every handle whose tag is `<= completed`. The caller (the device)
    /// destroys the returned handles.
    pub fn purge(&self, completed: u64) -> Vec<NativePipeline> {
        let mut pending = self.pending.lock();
        let mut released = Vec::new();
        while let Some(&(tag, handle)) = pending.front() {
            if tag > completed {
                break;
            }
            pending.pop_front();
            released.push(handle);
        }
        released
    }

    /// Number of handles still awaiting GPU completion.
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.pending.lock().len()
    }
}

// ─── Null Backend ────────────────────────────────────────────────────────────

/// An inert backend that issues sequential handles and never touches a GPU.
///
/// Used by the test suite; also handy as a headless stand-in during layout
/// debugging.
pub struct NullBackend {
    model: BindingModelKind,
    next_handle: AtomicU64,
    fail_creation: bool,
    release_queue: ReleaseQueue,
}

impl NullBackend {
    /// A null backend speaking the given binding model.
    #[must_use]
    pub fn new(model: BindingModelKind) -> Self {
        Self {
            model,
            next_handle: AtomicU64::new(1),
            fail_creation: false,
            release_queue: ReleaseQueue::new(),
        }
    }

    /// A null backend that rejects every pipeline creation.
    #[must_use]
    pub fn failing(model: BindingModelKind) -> Self {
        Self {
            fail_creation: true,
            ..Self::new(model)
        }
    }

    /// Number of pipelines created so far.
    #[must_use]
    pub fn created_count(&self) -> u64 {
        self.next_handle.load(Ordering::Relaxed) - 1
    }
}

impl DeviceBackend for NullBackend {
    fn binding_model(&self) -> BindingModelKind {
        self.model
    }

    fn create_pipeline(
        &self,
        desc: &NativePipelineDesc<'_>,
    ) -> std::result::Result<NativePipeline, BackendError> {
        if self.fail_creation {
            return Err(BackendError(format!(
                "null backend configured to reject '{}'",
                desc.name
            )));
        }
        let raw = self.next_handle.fetch_add(1, Ordering::Relaxed);
        let raw = NonZeroU64::new(raw).expect("handle counter starts at 1");
        Ok(NativePipeline::from_raw(raw))
    }

    fn release_queue(&self) -> &ReleaseQueue {
        &self.release_queue
    }
}
