//! Command Context
//!
//! CPU-side recording of the per-thread command stream this core feeds:
//! resource-state transitions and binding commands. One context belongs to
//! one command-generation thread; contexts never synchronize with each
//! other here.
//!
//! The recorded stream preserves the ordering guarantee the commit path
//! relies on: transition commands for a draw are recorded strictly before
//! the binding commands that depend on the new states.

use std::sync::Arc;

use crate::device::{GpuResource, ResourceState};

/// One recorded command.
#[derive(Debug)]
pub enum Command {
    /// A resource changes usage state before the next dependent binding.
    TransitionResource {
        resource: Arc<dyn GpuResource>,
        old_state: ResourceState,
        new_state: ResourceState,
    },
    /// Select the binding layout the following tables are interpreted under.
    SetBindingLayout {
        /// Compatibility hash of the committing pipeline's layout.
        compatibility_hash: u64,
    },
    /// Bind one contiguous descriptor range of the committed cache.
    BindTable {
        /// Backend table / set index.
        table: u32,
        /// First descriptor location inside the committed cache.
        first_descriptor: u32,
        /// Number of descriptors in the range.
        descriptor_count: u32,
    },
}

/// A per-thread command stream recorder.
#[derive(Debug, Default)]
pub struct CommandContext {
    label: String,
    commands: Vec<Command>,
}

impl CommandContext {
    #[must_use]
    pub fn new(label: &str) -> Self {
        Self {
            label: label.to_string(),
            commands: Vec::new(),
        }
    }

    /// Diagnostic label of this context.
    #[must_use]
    pub fn label(&self) -> &str {
        &self.label
    }

    /// The commands recorded so far, in order.
    #[must_use]
    pub fn commands(&self) -> &[Command] {
        &self.commands
    }

    /// Drop all recorded commands, keeping the allocation.
    pub fn reset(&mut self) {
        self.commands.clear();
    }

    pub(crate) fn record(&mut self, command: Command) {
        self.commands.push(command);
    }

    /// Record a state transition for `resource` if it is not already in
    /// `new_state`, and advance the resource's tracked state.
    pub fn transition_resource(&mut self, resource: &Arc<dyn GpuResource>, new_state: ResourceState) {
        let old_state = resource.state();
        if old_state == new_state {
            return;
        }
        resource.set_state(new_state);
        log::debug!(
            "[{}] transition '{}' {:?} -> {:?}",
            self.label,
            resource.name(),
            old_state,
            new_state
        );
        self.commands.push(Command::TransitionResource {
            resource: Arc::clone(resource),
            old_state,
            new_state,
        });
    }
}
