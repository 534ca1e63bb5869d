//! Fixed-Block Pool Allocator
//!
//! A free-list pool over pages of N equal-size blocks. `allocate` returns
//! the most-recently-freed block when one exists (LIFO reuse), otherwise it
//! carves a fresh block from the current page, allocating a new page when
//! the current one is exhausted. Blocks are never coalesced and pages are
//! never returned until the allocator itself is dropped.
//!
//! Every returned block has exactly the configured size and alignment and
//! stays valid until passed back to [`FixedBlockAllocator::free`]; the
//! allocator must outlive every block it issued.

use std::alloc::{self, Layout};
use std::ptr::NonNull;

#[cfg(debug_assertions)]
use rustc_hash::FxHashSet;

/// Free-list pool allocator for many same-size objects.
pub struct FixedBlockAllocator {
    /// Layout of a single block, padded so blocks tile a page contiguously.
    block_layout: Layout,
    blocks_per_page: usize,
    /// Layout of one page (`blocks_per_page` blocks).
    page_layout: Layout,
    /// Base pointers of all pages, in allocation order.
    pages: Vec<NonNull<u8>>,
    /// LIFO stack of freed blocks.
    free_list: Vec<NonNull<u8>>,
    /// Blocks already carved from the last page.
    carved_in_page: usize,
    /// Blocks currently issued and not yet freed.
    live: usize,
    #[cfg(debug_assertions)]
    dbg_live: FxHashSet<usize>,
}

// The raw page pointers are owned exclusively by this allocator; nothing
// aliases them outside the issued blocks, whose lifetime callers manage.
unsafe impl Send for FixedBlockAllocator {}

impl FixedBlockAllocator {
    /// Create a pool issuing blocks of `block` layout, `blocks_per_page`
    /// blocks per page.
    ///
    /// # Panics
    ///
    /// Panics if `blocks_per_page` is zero or `block` has zero size.
    #[must_use]
    pub fn new(block: Layout, blocks_per_page: usize) -> Self {
        assert!(blocks_per_page > 0, "a page must hold at least one block");
        assert!(block.size() > 0, "zero-size blocks are not poolable");

        let block_layout = block.pad_to_align();
        let page_layout = Layout::from_size_align(
            block_layout.size() * blocks_per_page,
            block_layout.align(),
        )
        .expect("page layout overflow");

        Self {
            block_layout,
            blocks_per_page,
            page_layout,
            pages: Vec::new(),
            free_list: Vec::new(),
            carved_in_page: blocks_per_page, // forces a page on first allocate
            live: 0,
            #[cfg(debug_assertions)]
            dbg_live: FxHashSet::default(),
        }
    }

    /// Size in bytes of every block this pool issues.
    #[must_use]
    pub fn block_size(&self) -> usize {
        self.block_layout.size()
    }

    /// Configured number of blocks per page.
    #[must_use]
    pub fn blocks_per_page(&self) -> usize {
        self.blocks_per_page
    }

    /// Number of blocks currently issued and not yet freed.
    #[must_use]
    pub fn live_blocks(&self) -> usize {
        self.live
    }

    /// Number of pages currently backing the pool.
    #[must_use]
    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    /// Allocate one block.
    ///
    /// Reuses the most-recently-freed block when the free list is non-empty;
    /// otherwise carves from the current page, growing by one page on demand.
    pub fn allocate(&mut self) -> NonNull<u8> {
        let ptr = if let Some(reused) = self.free_list.pop() {
            reused
        } else {
            if self.carved_in_page == self.blocks_per_page {
                self.grow();
            }
            let page = *self.pages.last().expect("grow() pushes a page");
            // SAFETY: carved_in_page < blocks_per_page, so the offset stays
            // inside the page allocation.
            let block = unsafe { page.add(self.carved_in_page * self.block_layout.size()) };
            self.carved_in_page += 1;
            block
        };

        self.live += 1;
        #[cfg(debug_assertions)]
        {
            let fresh = self.dbg_live.insert(ptr.as_ptr() as usize);
            debug_assert!(fresh, "pool issued a block that is already live");
        }
        ptr
    }

    /// Return a block to the pool.
    ///
    /// The block becomes the first candidate for the next [`allocate`] call.
    /// `ptr` must be a block previously returned by this allocator's
    /// [`allocate`] and must not be freed twice; debug builds verify both.
    ///
    /// [`allocate`]: FixedBlockAllocator::allocate
    pub fn free(&mut self, ptr: NonNull<u8>) {
        #[cfg(debug_assertions)]
        {
            let was_live = self.dbg_live.remove(&(ptr.as_ptr() as usize));
            debug_assert!(was_live, "freeing a block this pool did not issue, or double free");
        }
        debug_assert!(self.live > 0, "free without a matching allocate");
        self.live -= 1;
        self.free_list.push(ptr);
    }

    fn grow(&mut self) {
        // SAFETY: page_layout has non-zero size (checked in new()).
        let raw = unsafe { alloc::alloc(self.page_layout) };
        let page = NonNull::new(raw).unwrap_or_else(|| alloc::handle_alloc_error(self.page_layout));
        self.pages.push(page);
        self.carved_in_page = 0;
    }
}

impl Drop for FixedBlockAllocator {
    fn drop(&mut self) {
        debug_assert_eq!(self.live, 0, "dropping pool with live blocks");
        for page in &self.pages {
            // SAFETY: every page was allocated with page_layout in grow().
            unsafe { alloc::dealloc(page.as_ptr(), self.page_layout) };
        }
    }
}

impl std::fmt::Debug for FixedBlockAllocator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FixedBlockAllocator")
            .field("block_size", &self.block_layout.size())
            .field("blocks_per_page", &self.blocks_per_page)
            .field("pages", &self.pages.len())
            .field("live", &self.live)
            .field("free", &self.free_list.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn layout(size: usize) -> Layout {
        Layout::from_size_align(size, 8).unwrap()
    }

    #[test]
    fn lifo_reuse_returns_last_freed_block() {
        let mut pool = FixedBlockAllocator::new(layout(32), 4);
        let a = pool.allocate();
        let b = pool.allocate();
        pool.free(a);
        pool.free(b);
        assert_eq!(pool.allocate(), b);
        assert_eq!(pool.allocate(), a);
        pool.free(a);
        pool.free(b);
    }

    #[test]
    fn page_exhaustion_grows_a_new_page() {
        let mut pool = FixedBlockAllocator::new(layout(16), 2);
        let blocks: Vec<_> = (0..5).map(|_| pool.allocate()).collect();
        assert_eq!(pool.page_count(), 3);
        for b in blocks {
            pool.free(b);
        }
    }
}
