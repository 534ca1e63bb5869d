//! Error Types
//!
//! This module defines the error types used throughout the crate.
//!
//! # Overview
//!
//! The main error type [`SigilError`] covers the fatal failure modes:
//! - Pipeline construction errors (missing shader stages, backend rejection)
//! - Strict resource-binding failures (only when demanded by flags)
//! - Allocator configuration errors
//!
//! Non-fatal binding problems (an unresolved resource name, a commit against
//! an incompatible binding) are *not* errors: they are logged through `log`
//! and the affected operation is skipped, leaving unrelated draws intact.
//!
//! All fallible public APIs return [`Result<T>`], an alias for
//! `std::result::Result<T, SigilError>`.

use thiserror::Error;

use crate::reflection::ShaderStages;

/// The main error type for the binding core.
///
/// Each variant provides specific context about what went wrong. Variants in
/// the construction group abort pipeline creation; no partially constructed
/// pipeline is ever observable.
#[derive(Error, Debug)]
pub enum SigilError {
    // ========================================================================
    // Pipeline Construction Errors (fatal)
    // ========================================================================
    /// A shader stage required by the pipeline kind was not supplied.
    #[error("Pipeline '{pipeline}' is missing required shader stage {stage:?}")]
    MissingShaderStage {
        /// Name of the pipeline being constructed.
        pipeline: String,
        /// The stage the pipeline kind requires.
        stage: ShaderStages,
    },

    /// A supplied shader stage is not valid for the pipeline kind.
    #[error("Pipeline '{pipeline}' does not support shader stage {stage:?}")]
    StageNotSupported {
        /// Name of the pipeline being constructed.
        pipeline: String,
        /// The offending stage.
        stage: ShaderStages,
    },

    /// The same shader stage was supplied more than once.
    #[error("Pipeline '{pipeline}' declares shader stage {stage:?} twice")]
    DuplicateShaderStage {
        /// Name of the pipeline being constructed.
        pipeline: String,
        /// The duplicated stage.
        stage: ShaderStages,
    },

    /// The device backend rejected native pipeline-object creation.
    #[error("Failed to create native pipeline object for '{pipeline}': {reason}")]
    PipelineCreationFailed {
        /// Name of the pipeline being constructed.
        pipeline: String,
        /// Backend-reported reason.
        reason: String,
    },

    // ========================================================================
    // Resource Binding Errors (only under VERIFY_ALL_RESOLVED)
    // ========================================================================
    /// One or more declared resource names could not be resolved and the
    /// caller requested that all of them must be.
    #[error("Unresolved shader resources in '{pipeline}': {names:?}")]
    UnresolvedResources {
        /// Name of the owning pipeline.
        pipeline: String,
        /// Declared names that stayed unbound.
        names: Vec<String>,
    },

    // ========================================================================
    // Allocator Errors
    // ========================================================================
    /// A pool allocation was requested for a size the binding-memory
    /// allocator was not presized for.
    #[error("No pool presized for allocations of {size} bytes")]
    NoMatchingPool {
        /// The requested allocation size.
        size: usize,
    },
}

/// Alias for `Result<T, SigilError>`.
pub type Result<T> = std::result::Result<T, SigilError>;
