//! Allocator Tests
//!
//! Tests for:
//! - FixedBlockAllocator: LIFO block reuse, address-set equality across
//!   free/reallocate cycles, page growth, no duplicate issuance
//! - BindingMemoryAllocator: one pool per distinct size, RAII block return,
//!   rejection of unsized requests

use std::alloc::Layout;
use std::collections::HashSet;
use std::ptr::NonNull;

use sigil::{BindingMemoryAllocator, FixedBlockAllocator, SigilError};

fn block_layout(size: usize) -> Layout {
    Layout::from_size_align(size, 8).unwrap()
}

fn addresses(blocks: &[NonNull<u8>]) -> HashSet<usize> {
    blocks.iter().map(|p| p.as_ptr() as usize).collect()
}

// ============================================================================
// FixedBlockAllocator
// ============================================================================

#[test]
fn allocate_issues_distinct_blocks() {
    let mut pool = FixedBlockAllocator::new(block_layout(32), 16);
    let blocks: Vec<_> = (0..48).map(|_| pool.allocate()).collect();

    assert_eq!(addresses(&blocks).len(), 48, "live blocks must be distinct");
    assert_eq!(pool.live_blocks(), 48);

    for b in blocks {
        pool.free(b);
    }
    assert_eq!(pool.live_blocks(), 0);
}

#[test]
fn freed_blocks_are_reused_in_lifo_order() {
    let mut pool = FixedBlockAllocator::new(block_layout(64), 16);
    let blocks: Vec<_> = (0..16).map(|_| pool.allocate()).collect();

    // Free slots 0, 5 and 10, in that order.
    pool.free(blocks[0]);
    pool.free(blocks[5]);
    pool.free(blocks[10]);

    // LIFO: the next three allocations replay 10, 5, 0.
    assert_eq!(pool.allocate(), blocks[10]);
    assert_eq!(pool.allocate(), blocks[5]);
    assert_eq!(pool.allocate(), blocks[0]);

    for b in blocks {
        pool.free(b);
    }
}

#[test]
fn reallocation_returns_exactly_the_freed_address_set() {
    let mut pool = FixedBlockAllocator::new(block_layout(48), 16);
    let first: Vec<_> = (0..40).map(|_| pool.allocate()).collect();
    let first_addresses = addresses(&first);

    // Free in a scrambled (strided) order.
    for stride in 0..5 {
        for i in (stride..40).step_by(5) {
            pool.free(first[i]);
        }
    }
    assert_eq!(pool.live_blocks(), 0);

    let second: Vec<_> = (0..40).map(|_| pool.allocate()).collect();
    assert_eq!(
        addresses(&second),
        first_addresses,
        "reallocation must reuse the freed blocks, nothing else"
    );

    for b in second {
        pool.free(b);
    }
}

#[test]
fn exhausting_a_page_grows_a_new_one() {
    let mut pool = FixedBlockAllocator::new(block_layout(16), 4);
    assert_eq!(pool.page_count(), 0);

    let blocks: Vec<_> = (0..9).map(|_| pool.allocate()).collect();
    assert_eq!(pool.page_count(), 3);

    // Freeing shrinks nothing.
    for b in blocks {
        pool.free(b);
    }
    assert_eq!(pool.page_count(), 3);
}

#[test]
fn block_size_is_padded_to_alignment() {
    let pool = FixedBlockAllocator::new(Layout::from_size_align(20, 8).unwrap(), 4);
    assert_eq!(pool.block_size(), 24);
    assert_eq!(pool.blocks_per_page(), 4);
}

// ============================================================================
// BindingMemoryAllocator
// ============================================================================

#[test]
fn one_pool_per_distinct_size() {
    let sizes = [
        block_layout(48),
        block_layout(128),
        block_layout(48), // duplicate collapses
    ];
    let memory = BindingMemoryAllocator::new(4, sizes);
    assert_eq!(memory.pool_count(), 2);
    assert_eq!(memory.granularity(), 4);
}

#[test]
fn zero_size_layouts_need_no_pool() {
    let memory = BindingMemoryAllocator::new(1, [Layout::from_size_align(0, 1).unwrap()]);
    assert_eq!(memory.pool_count(), 0);
}

#[test]
fn unsized_request_is_rejected() {
    let memory = BindingMemoryAllocator::new(2, [block_layout(64)]);
    let err = memory.allocate(block_layout(96)).unwrap_err();
    assert!(matches!(err, SigilError::NoMatchingPool { size: 96 }));
}

#[test]
fn dropping_an_allocation_returns_its_block() {
    let memory = BindingMemoryAllocator::new(8, [block_layout(64)]);

    let first = memory.allocate(block_layout(64)).unwrap();
    let first_address = first.as_ptr().as_ptr() as usize;
    drop(first);

    // LIFO reuse straight through the pool.
    let second = memory.allocate(block_layout(64)).unwrap();
    assert_eq!(second.as_ptr().as_ptr() as usize, first_address);
}

#[test]
fn allocations_of_different_sizes_come_from_different_pools() {
    let memory = BindingMemoryAllocator::new(4, [block_layout(32), block_layout(256)]);

    let small = memory.allocate(block_layout(32)).unwrap();
    let large = memory.allocate(block_layout(256)).unwrap();
    assert_eq!(small.size(), 32);
    assert_eq!(large.size(), 256);
    assert_ne!(
        small.as_ptr().as_ptr() as usize,
        large.as_ptr().as_ptr() as usize
    );
}
