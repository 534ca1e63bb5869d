//! Pool Allocation
//!
//! Fixed-size block pooling for binding instances:
//! - [`FixedBlockAllocator`]: free-list pool over pages of equal-size blocks.
//! - [`BindingMemoryAllocator`]: per-pipeline pools presized for resource
//!   cache and layout backing storage, so repeated binding creation and
//!   destruction never round-trips through the general-purpose allocator.

mod binding_memory;
mod fixed_block;

pub use binding_memory::{BindingMemoryAllocator, PoolAllocation};
pub use fixed_block::FixedBlockAllocator;
