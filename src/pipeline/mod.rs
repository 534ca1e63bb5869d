//! Pipeline State Objects
//!
//! Descriptor types and the [`PipelineState`] itself: an immutable bundle
//! of compiled shader stages, fixed-function state and a finalized resource
//! binding layout.

pub mod desc;
pub mod state;

pub use desc::{GraphicsStateDesc, PipelineDesc, PipelineKind, PrimitiveTopology};
pub use state::PipelineState;
