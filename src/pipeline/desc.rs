//! Pipeline Descriptors
//!
//! Plain-data descriptions consumed by [`PipelineState::new`]. Fixed
//! function state is deliberately thin: attachment and upload plumbing
//! live outside this core, so the backend only receives what it needs to
//! create the native object.
//!
//! [`PipelineState::new`]: crate::pipeline::PipelineState::new

use std::sync::Arc;

use crate::reflection::Shader;

/// Primitive assembly topology of a graphics pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum PrimitiveTopology {
    PointList,
    LineList,
    #[default]
    TriangleList,
    TriangleStrip,
}

/// Fixed-function state of a graphics pipeline, passed through to the
/// device backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GraphicsStateDesc {
    pub topology: PrimitiveTopology,
    pub sample_count: u32,
}

impl Default for GraphicsStateDesc {
    fn default() -> Self {
        Self {
            topology: PrimitiveTopology::default(),
            sample_count: 1,
        }
    }
}

/// The kind of pipeline being described.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipelineKind {
    Graphics(GraphicsStateDesc),
    Compute,
}

impl PipelineKind {
    #[must_use]
    pub fn is_compute(&self) -> bool {
        matches!(self, Self::Compute)
    }

    /// The graphics fixed-function state, `None` for compute.
    #[must_use]
    pub fn graphics_state(&self) -> Option<&GraphicsStateDesc> {
        match self {
            Self::Graphics(state) => Some(state),
            Self::Compute => None,
        }
    }
}

/// Everything needed to construct a [`PipelineState`].
///
/// [`PipelineState`]: crate::pipeline::PipelineState
#[derive(Debug, Clone)]
pub struct PipelineDesc {
    /// Diagnostic name; appears in every warning about this pipeline.
    pub name: String,
    /// Compiled shader set, one entry per stage.
    pub shaders: Vec<Arc<Shader>>,
    pub kind: PipelineKind,
    /// Number of shader resource bindings co-located per allocator page.
    pub srb_allocation_granularity: u32,
}

impl PipelineDesc {
    /// A graphics pipeline with default fixed-function state.
    #[must_use]
    pub fn graphics(name: &str, shaders: Vec<Arc<Shader>>) -> Self {
        Self {
            name: name.to_string(),
            shaders,
            kind: PipelineKind::Graphics(GraphicsStateDesc::default()),
            srb_allocation_granularity: 1,
        }
    }

    /// A graphics pipeline with explicit fixed-function state.
    #[must_use]
    pub fn graphics_with_state(
        name: &str,
        shaders: Vec<Arc<Shader>>,
        state: GraphicsStateDesc,
    ) -> Self {
        Self {
            kind: PipelineKind::Graphics(state),
            ..Self::graphics(name, shaders)
        }
    }

    /// A compute pipeline.
    #[must_use]
    pub fn compute(name: &str, shader: Arc<Shader>) -> Self {
        Self {
            name: name.to_string(),
            shaders: vec![shader],
            kind: PipelineKind::Compute,
            srb_allocation_granularity: 1,
        }
    }

    /// Set the binding co-location granularity.
    #[must_use]
    pub fn with_granularity(mut self, granularity: u32) -> Self {
        self.srb_allocation_granularity = granularity;
        self
    }
}
