//! Shared test fixtures: a state-tracking resource double and shader
//! construction helpers.

#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use sigil::{
    GpuResource, ResourceKind, ResourceState, Shader, ShaderResourceDesc, ShaderStages,
    VariableType,
};

/// A bindable resource double tracking its usage state in an atomic.
pub struct TestResource {
    name: String,
    state: AtomicU32,
}

impl TestResource {
    pub fn new(name: &str) -> Arc<dyn GpuResource> {
        Arc::new(Self {
            name: name.to_string(),
            state: AtomicU32::new(0),
        })
    }

    pub fn in_state(name: &str, state: ResourceState) -> Arc<dyn GpuResource> {
        Arc::new(Self {
            name: name.to_string(),
            state: AtomicU32::new(state.bits()),
        })
    }
}

impl GpuResource for TestResource {
    fn name(&self) -> &str {
        &self.name
    }

    fn state(&self) -> ResourceState {
        ResourceState::from_bits_retain(self.state.load(Ordering::Acquire))
    }

    fn set_state(&self, state: ResourceState) {
        self.state.store(state.bits(), Ordering::Release);
    }
}

pub fn slot(name: &str, kind: ResourceKind, variable_type: VariableType) -> ShaderResourceDesc {
    ShaderResourceDesc::new(name, kind, variable_type)
}

pub fn shader_with(stage: ShaderStages, resources: Vec<ShaderResourceDesc>) -> Arc<Shader> {
    let mut shader = Shader::new(stage, vec![0xB0, 0x0C]);
    shader.resources = resources;
    Arc::new(shader)
}

pub fn vertex_shader(resources: Vec<ShaderResourceDesc>) -> Arc<Shader> {
    shader_with(ShaderStages::VERTEX, resources)
}

pub fn fragment_shader(resources: Vec<ShaderResourceDesc>) -> Arc<Shader> {
    shader_with(ShaderStages::FRAGMENT, resources)
}

pub fn compute_shader(resources: Vec<ShaderResourceDesc>) -> Arc<Shader> {
    shader_with(ShaderStages::COMPUTE, resources)
}
