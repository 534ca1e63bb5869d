//! Binding-Memory Allocator
//!
//! Per-pipeline pools for the backing storage of shader resource bindings.
//! A pipeline knows every sub-allocation size its bindings will ever need
//! (one per stage layout plus one for the resource cache), so it presizes
//! one [`FixedBlockAllocator`] per distinct size up front. The batching
//! granularity decides how many bindings co-locate on one page.
//!
//! Allocations are handed out as RAII [`PoolAllocation`] guards that return
//! their block to the owning pool on drop.

use std::alloc::Layout;
use std::ptr::NonNull;
use std::sync::Arc;

use parking_lot::Mutex;
use rustc_hash::FxHashMap;

use crate::alloc::FixedBlockAllocator;
use crate::errors::{Result, SigilError};

type SharedPool = Arc<Mutex<FixedBlockAllocator>>;

/// Pools presized for a pipeline's binding storage needs.
///
/// One pool exists per distinct `(size, align)` sub-allocation; requesting
/// any other layout is a [`SigilError::NoMatchingPool`] error.
pub struct BindingMemoryAllocator {
    granularity: usize,
    pools: FxHashMap<(usize, usize), SharedPool>,
}

impl BindingMemoryAllocator {
    /// Presize one pool per distinct layout in `layouts`.
    ///
    /// `granularity` is the number of bindings co-located per pool page.
    /// Zero-size layouts are skipped: nothing needs backing storage.
    ///
    /// # Panics
    ///
    /// Panics if `granularity` is zero.
    #[must_use]
    pub fn new(granularity: usize, layouts: impl IntoIterator<Item = Layout>) -> Self {
        assert!(granularity > 0, "granularity must be at least one binding per page");
        let mut pools = FxHashMap::default();
        for layout in layouts {
            if layout.size() == 0 {
                continue;
            }
            let padded = layout.pad_to_align();
            pools
                .entry((padded.size(), padded.align()))
                .or_insert_with(|| {
                    Arc::new(Mutex::new(FixedBlockAllocator::new(padded, granularity)))
                });
        }
        Self { granularity, pools }
    }

    /// Number of bindings co-located per page.
    #[must_use]
    pub fn granularity(&self) -> usize {
        self.granularity
    }

    /// Number of distinct presized pools.
    #[must_use]
    pub fn pool_count(&self) -> usize {
        self.pools.len()
    }

    /// Allocate a block matching `layout` from its presized pool.
    pub fn allocate(&self, layout: Layout) -> Result<PoolAllocation> {
        let padded = layout.pad_to_align();
        let pool = self
            .pools
            .get(&(padded.size(), padded.align()))
            .ok_or(SigilError::NoMatchingPool { size: padded.size() })?;
        let ptr = pool.lock().allocate();
        Ok(PoolAllocation {
            ptr,
            size: padded.size(),
            pool: Arc::clone(pool),
        })
    }
}

impl std::fmt::Debug for BindingMemoryAllocator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BindingMemoryAllocator")
            .field("granularity", &self.granularity)
            .field("pools", &self.pools.len())
            .finish()
    }
}

/// An RAII block issued by a [`BindingMemoryAllocator`] pool.
///
/// The block is uninitialized raw memory of the requested padded size; the
/// owner is responsible for constructing into it and tearing down before
/// the guard drops. Dropping the guard returns the block to its pool.
pub struct PoolAllocation {
    ptr: NonNull<u8>,
    size: usize,
    pool: SharedPool,
}

// The guard is an inert memory handle: it never dereferences its pointer,
// and aliasing discipline over the block is enforced by the single owner.
unsafe impl Send for PoolAllocation {}
unsafe impl Sync for PoolAllocation {}

impl PoolAllocation {
    /// Base pointer of the block.
    #[must_use]
    pub fn as_ptr(&self) -> NonNull<u8> {
        self.ptr
    }

    /// Padded size of the block in bytes.
    #[must_use]
    pub fn size(&self) -> usize {
        self.size
    }
}

impl Drop for PoolAllocation {
    fn drop(&mut self) {
        self.pool.lock().free(self.ptr);
    }
}

impl std::fmt::Debug for PoolAllocation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PoolAllocation")
            .field("size", &self.size)
            .finish_non_exhaustive()
    }
}
