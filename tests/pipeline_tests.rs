//! Pipeline State Tests
//!
//! Tests for:
//! - Construction state machine: stage validation, backend rejection,
//!   no partially constructed pipeline
//! - Default-binding commits for static-only pipelines
//! - Transition ordering: state transitions strictly before binding
//!   commands; transition-only commits
//! - Deferred native-object release through the completion counter

mod common;

use std::sync::Arc;

use common::{compute_shader, fragment_shader, slot, vertex_shader, TestResource};
use sigil::{
    BindFlags, BindingModelKind, Command, CommandContext, DeviceBackend, NullBackend, PipelineDesc,
    PipelineKind, PipelineState, ResourceKind, ResourceMapping, ResourceState, ShaderStages,
    SigilError, VariableType,
};

fn backend(model: BindingModelKind) -> Arc<NullBackend> {
    Arc::new(NullBackend::new(model))
}

/// VS + FS pipeline whose resources are all static.
fn static_only_pso() -> PipelineState {
    let shaders = vec![
        vertex_shader(vec![slot(
            "globals",
            ResourceKind::ConstantBuffer,
            VariableType::Static,
        )]),
        fragment_shader(vec![slot(
            "lut",
            ResourceKind::ShaderResource,
            VariableType::Static,
        )]),
    ];
    PipelineState::new(
        backend(BindingModelKind::DescriptorSet),
        PipelineDesc::graphics("static_only", shaders),
    )
    .unwrap()
}

// ============================================================================
// Construction
// ============================================================================

#[test]
fn compute_pipeline_without_compute_shader_is_fatal() {
    let desc = PipelineDesc {
        name: "bad_compute".to_string(),
        shaders: vec![],
        kind: PipelineKind::Compute,
        srb_allocation_granularity: 1,
    };
    let err = PipelineState::new(backend(BindingModelKind::FlatSlot), desc).unwrap_err();
    assert!(matches!(
        err,
        SigilError::MissingShaderStage { stage, .. } if stage == ShaderStages::COMPUTE
    ));
}

#[test]
fn compute_pipeline_rejects_graphics_stages() {
    let desc = PipelineDesc::compute("bad_compute", vertex_shader(vec![]));
    let err = PipelineState::new(backend(BindingModelKind::FlatSlot), desc).unwrap_err();
    assert!(matches!(
        err,
        SigilError::StageNotSupported { stage, .. } if stage == ShaderStages::VERTEX
    ));
}

#[test]
fn graphics_pipeline_requires_a_vertex_shader() {
    let desc = PipelineDesc::graphics("no_vs", vec![fragment_shader(vec![])]);
    let err = PipelineState::new(backend(BindingModelKind::DescriptorTable), desc).unwrap_err();
    assert!(matches!(
        err,
        SigilError::MissingShaderStage { stage, .. } if stage == ShaderStages::VERTEX
    ));
}

#[test]
fn duplicate_stages_are_rejected() {
    let desc = PipelineDesc::graphics("twice", vec![vertex_shader(vec![]), vertex_shader(vec![])]);
    let err = PipelineState::new(backend(BindingModelKind::DescriptorSet), desc).unwrap_err();
    assert!(matches!(err, SigilError::DuplicateShaderStage { .. }));
}

#[test]
fn backend_rejection_is_fatal_and_leaves_nothing_behind() {
    let failing = Arc::new(NullBackend::failing(BindingModelKind::DescriptorSet));
    let desc = PipelineDesc::graphics("rejected", vec![vertex_shader(vec![])]);
    let err = PipelineState::new(failing.clone(), desc).unwrap_err();
    assert!(matches!(err, SigilError::PipelineCreationFailed { .. }));
    assert_eq!(failing.created_count(), 0);
    assert_eq!(failing.release_queue().pending_count(), 0);
}

#[test]
fn compute_pipeline_constructs_and_commits() {
    let shaders = compute_shader(vec![
        slot("params", ResourceKind::ConstantBuffer, VariableType::Static),
        slot("output", ResourceKind::UnorderedAccess, VariableType::Mutable),
    ]);
    let pso = PipelineState::new(
        backend(BindingModelKind::DescriptorTable),
        PipelineDesc::compute("blur", shaders),
    )
    .unwrap();
    assert!(pso.kind().is_compute());
    assert_eq!(pso.static_variable_count(ShaderStages::COMPUTE), 1);

    let mut srb = pso.create_shader_resource_binding().unwrap();
    srb.bind_shader_resources(
        &ResourceMapping::new().with("output", TestResource::new("out_buffer")),
        BindFlags::empty(),
    )
    .unwrap();

    let mut ctx = CommandContext::new("compute");
    let cache = pso.commit_and_transition_shader_resources(Some(&mut srb), &mut ctx, true, true);
    assert!(cache.is_some());
}

// ============================================================================
// Default Binding
// ============================================================================

#[test]
fn static_only_pipeline_commits_through_its_default_binding() {
    let mut pso = static_only_pso();
    let globals = TestResource::new("globals_buf");
    let lut = TestResource::new("lut_tex");
    let mapping = ResourceMapping::new()
        .with("globals", Arc::clone(&globals))
        .with("lut", Arc::clone(&lut));
    pso.bind_shader_resources(&mapping, BindFlags::VERIFY_ALL_RESOLVED)
        .unwrap();

    let mut ctx = CommandContext::new("main");
    let cache = pso
        .commit_and_transition_shader_resources(None, &mut ctx, true, true)
        .expect("default binding substitutes for None");
    assert_eq!(cache.bound_count(), 2);
}

#[test]
fn default_binding_tracks_later_static_rebinds() {
    let mut pso = static_only_pso();
    let first = TestResource::new("first");
    let second = TestResource::new("second");
    let offset = pso
        .layout()
        .find_slot(ShaderStages::VERTEX, "globals")
        .unwrap()
        .1
        .cache_offset;

    pso.bind_shader_resources(
        &ResourceMapping::new().with("globals", Arc::clone(&first)),
        BindFlags::empty(),
    )
    .unwrap();

    let mut ctx = CommandContext::new("main");
    {
        let cache = pso
            .commit_and_transition_shader_resources(None, &mut ctx, true, false)
            .unwrap();
        assert!(Arc::ptr_eq(cache.resource_at(offset).unwrap(), &first));
    }

    // The default binding belongs to the pipeline, so a later static rebind
    // must be visible through it.
    assert!(pso.set_static_variable(ShaderStages::VERTEX, "globals", Arc::clone(&second)));
    let cache = pso
        .commit_and_transition_shader_resources(None, &mut ctx, true, false)
        .unwrap();
    assert!(Arc::ptr_eq(cache.resource_at(offset).unwrap(), &second));
}

// ============================================================================
// Transition Ordering
// ============================================================================

fn command_kinds(ctx: &CommandContext) -> Vec<&'static str> {
    ctx.commands()
        .iter()
        .map(|c| match c {
            Command::TransitionResource { .. } => "transition",
            Command::SetBindingLayout { .. } => "layout",
            Command::BindTable { .. } => "table",
        })
        .collect()
}

#[test]
fn transitions_are_recorded_strictly_before_binding_commands() {
    let mut pso = static_only_pso();
    let globals = TestResource::new("globals_buf");
    let lut = TestResource::new("lut_tex");
    pso.bind_shader_resources(
        &ResourceMapping::new()
            .with("globals", Arc::clone(&globals))
            .with("lut", Arc::clone(&lut)),
        BindFlags::empty(),
    )
    .unwrap();

    let mut ctx = CommandContext::new("main");
    pso.commit_and_transition_shader_resources(None, &mut ctx, true, true)
        .unwrap();

    // Both static slots share descriptor set 0, so one table bind follows
    // the two transitions.
    let kinds = command_kinds(&ctx);
    assert_eq!(kinds, ["transition", "transition", "layout", "table"]);

    // The tracked states advanced to what the slots require.
    assert_eq!(globals.state(), ResourceState::CONSTANT_BUFFER);
    assert_eq!(lut.state(), ResourceState::SHADER_RESOURCE);

    // A second commit finds everything already in state: no new transitions.
    let mut ctx2 = CommandContext::new("main");
    pso.commit_and_transition_shader_resources(None, &mut ctx2, true, true)
        .unwrap();
    assert_eq!(command_kinds(&ctx2), ["layout", "table"]);
}

#[test]
fn transition_only_commits_emit_no_binding_commands() {
    let mut pso = static_only_pso();
    pso.bind_shader_resources(
        &ResourceMapping::new()
            .with("globals", TestResource::new("globals_buf"))
            .with("lut", TestResource::new("lut_tex")),
        BindFlags::empty(),
    )
    .unwrap();

    let mut ctx = CommandContext::new("prepass");
    let cache = pso.commit_and_transition_shader_resources(None, &mut ctx, false, true);
    assert!(cache.is_some());
    assert_eq!(command_kinds(&ctx), ["transition", "transition"]);
}

#[cfg(debug_assertions)]
#[test]
#[should_panic(expected = "neither")]
fn requesting_neither_commit_nor_transition_asserts() {
    let pso = static_only_pso();
    let mut ctx = CommandContext::new("main");
    let _ = pso.commit_and_transition_shader_resources(None, &mut ctx, false, false);
}

// ============================================================================
// Deferred Release
// ============================================================================

#[test]
fn dropped_pipelines_retire_through_the_release_queue() {
    let backend = Arc::new(NullBackend::new(BindingModelKind::FlatSlot));
    let queue_backend = Arc::clone(&backend);

    let pso = PipelineState::new(
        backend,
        PipelineDesc::graphics("transient", vec![vertex_shader(vec![])]),
    )
    .unwrap();
    let native = pso.native_pipeline();
    drop(pso);

    let queue = queue_backend.release_queue();
    assert_eq!(queue.pending_count(), 1);

    // The GPU has not confirmed completion of the first submission yet.
    assert!(queue.purge(0).is_empty());
    assert_eq!(queue.pending_count(), 1);

    let released = queue.purge(1);
    assert_eq!(released, vec![native]);
    assert_eq!(queue.pending_count(), 0);
}

#[test]
fn release_tags_follow_the_submission_counter() {
    let backend = Arc::new(NullBackend::new(BindingModelKind::FlatSlot));

    let first = PipelineState::new(
        backend.clone(),
        PipelineDesc::graphics("first", vec![vertex_shader(vec![])]),
    )
    .unwrap();
    let first_native = first.native_pipeline();
    drop(first);

    assert_eq!(backend.release_queue().advance(), 2);

    let second = PipelineState::new(
        backend.clone(),
        PipelineDesc::graphics("second", vec![vertex_shader(vec![])]),
    )
    .unwrap();
    drop(second);

    // Completing submission 1 releases only the first handle.
    let released = backend.release_queue().purge(1);
    assert_eq!(released, vec![first_native]);
    assert_eq!(backend.release_queue().pending_count(), 1);
}

// ============================================================================
// Allocation Granularity
// ============================================================================

#[test]
fn binding_creation_cycles_reuse_pooled_storage() {
    let shaders = vec![vertex_shader(vec![slot(
        "albedo",
        ResourceKind::ShaderResource,
        VariableType::Mutable,
    )])];
    let pso = PipelineState::new(
        backend(BindingModelKind::DescriptorSet),
        PipelineDesc::graphics("pooled", shaders).with_granularity(16),
    )
    .unwrap();

    assert_eq!(pso.binding_memory().granularity(), 16);
    assert_eq!(pso.binding_memory().pool_count(), 1);

    // Create-and-drop churn runs entirely inside the presized pool.
    for _ in 0..64 {
        let srb = pso.create_shader_resource_binding().unwrap();
        drop(srb);
    }
    let _live: Vec<_> = (0..16)
        .map(|_| pso.create_shader_resource_binding().unwrap())
        .collect();
}
