//! Resource Cache
//!
//! The mutable table of actually-bound resource references behind one
//! shader resource binding. Storage is a single contiguous block drawn from
//! the owning pipeline's [`BindingMemoryAllocator`], constructed in place
//! and torn down explicitly: slots are dropped first, then the block
//! returns to its pool.
//!
//! The static region of a cache is populated exactly once from the owning
//! pipeline and is read-only afterwards; mutable and dynamic regions are
//! rewritten through `&mut` access, so the single-writer rule is enforced
//! by the borrow checker rather than by locks.

use std::alloc::Layout;
use std::ptr;
use std::sync::Arc;

use crate::alloc::{BindingMemoryAllocator, PoolAllocation};
use crate::binding::layout::BindingLayout;
use crate::device::GpuResource;
use crate::errors::Result;

/// One descriptor location: the bound resource reference plus its
/// backend-native descriptor index.
pub struct CachedSlot {
    resource: Option<Arc<dyn GpuResource>>,
    descriptor_offset: u32,
}

impl CachedSlot {
    /// The resource currently bound here, if any.
    #[must_use]
    pub fn resource(&self) -> Option<&Arc<dyn GpuResource>> {
        self.resource.as_ref()
    }

    /// Backend-native descriptor location of this slot.
    #[must_use]
    pub fn descriptor_offset(&self) -> u32 {
        self.descriptor_offset
    }
}

impl std::fmt::Debug for CachedSlot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CachedSlot")
            .field("descriptor_offset", &self.descriptor_offset)
            .field("bound", &self.resource.is_some())
            .finish()
    }
}

/// The bound-resource table of one shader resource binding.
pub struct ResourceCache {
    layout: Arc<BindingLayout>,
    /// Pool block holding `total_slots` [`CachedSlot`]s; `None` when the
    /// layout declares no cache-backed slots.
    storage: Option<PoolAllocation>,
    len: u32,
}

impl ResourceCache {
    /// The block layout a cache of `slot_count` slots needs from the pool.
    pub(crate) fn backing_layout(slot_count: u32) -> Layout {
        Layout::array::<CachedSlot>(slot_count as usize).expect("cache backing layout overflow")
    }

    /// Allocate and initialize a cache shaped by `layout`.
    ///
    /// Requires the layout to be finalized (guaranteed by construction:
    /// a [`BindingLayout`] only exists finalized).
    pub(crate) fn new(
        layout: Arc<BindingLayout>,
        memory: &BindingMemoryAllocator,
    ) -> Result<Self> {
        let len = layout.cache_layout().total_slots;
        let storage = if len == 0 {
            None
        } else {
            let block = memory.allocate(Self::backing_layout(len))?;
            let base = block.as_ptr().cast::<CachedSlot>();
            for i in 0..len {
                // SAFETY: the block was sized for `len` CachedSlots; each
                // write targets a distinct, in-bounds, uninitialized slot.
                unsafe {
                    base.add(i as usize).write(CachedSlot {
                        resource: None,
                        descriptor_offset: i,
                    });
                }
            }
            Some(block)
        };
        Ok(Self { layout, storage, len })
    }

    /// The layout this cache is shaped by.
    #[must_use]
    pub fn layout(&self) -> &Arc<BindingLayout> {
        &self.layout
    }

    /// Total descriptor slots, counting array elements.
    #[must_use]
    pub fn len(&self) -> u32 {
        self.len
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// All slots, in descriptor order.
    #[must_use]
    pub fn slots(&self) -> &[CachedSlot] {
        match &self.storage {
            // SAFETY: new() initialized exactly `len` slots in this block,
            // and &self guarantees no concurrent mutation.
            Some(block) => unsafe {
                std::slice::from_raw_parts(block.as_ptr().cast::<CachedSlot>().as_ptr(), self.len as usize)
            },
            None => &[],
        }
    }

    fn slots_mut(&mut self) -> &mut [CachedSlot] {
        match &self.storage {
            // SAFETY: same as slots(); &mut self guarantees exclusivity.
            Some(block) => unsafe {
                std::slice::from_raw_parts_mut(
                    block.as_ptr().cast::<CachedSlot>().as_ptr(),
                    self.len as usize,
                )
            },
            None => &mut [],
        }
    }

    /// The resource bound at a descriptor offset.
    #[must_use]
    pub fn resource_at(&self, descriptor_offset: u32) -> Option<&Arc<dyn GpuResource>> {
        self.slots()
            .get(descriptor_offset as usize)
            .and_then(CachedSlot::resource)
    }

    /// Number of slots currently holding a resource.
    #[must_use]
    pub fn bound_count(&self) -> usize {
        self.slots().iter().filter(|s| s.resource.is_some()).count()
    }

    /// Bind (or unbind) the resource at a descriptor offset, releasing any
    /// previously cached reference and its derived view.
    pub(crate) fn set_resource(
        &mut self,
        descriptor_offset: u32,
        resource: Option<Arc<dyn GpuResource>>,
    ) {
        let slot = &mut self.slots_mut()[descriptor_offset as usize];
        slot.resource = resource;
    }
}

impl Drop for ResourceCache {
    fn drop(&mut self) {
        // Ordered teardown: drop every slot (releasing resource refs), then
        // the storage block returns to its pool via PoolAllocation::drop.
        if let Some(block) = &self.storage {
            let base = block.as_ptr().cast::<CachedSlot>();
            for i in 0..self.len {
                // SAFETY: every slot was initialized in new() and is
                // dropped exactly once here.
                unsafe { ptr::drop_in_place(base.add(i as usize).as_ptr()) };
            }
        }
    }
}

impl std::fmt::Debug for ResourceCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResourceCache")
            .field("slots", &self.len)
            .field("bound", &self.bound_count())
            .finish()
    }
}
