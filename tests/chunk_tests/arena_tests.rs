//! Chunk Arena Tests
//!
//! Tests verify:
//! - Region geometry
//! - Chained storage of values larger than one chunk
//! - Free list accounting
//! - Stale handle detection after free and reset
//! - Out-of-space reporting

use multikv::chunk::{ChunkArena, CHUNK_HEADER_SIZE};
use multikv::MultiKvError;

const PAYLOAD: usize = 8;

fn arena(chunks: usize) -> ChunkArena {
    ChunkArena::new(chunks * (CHUNK_HEADER_SIZE + PAYLOAD), PAYLOAD).unwrap()
}

// =============================================================================
// Geometry Tests
// =============================================================================

#[test]
fn test_new_arena_is_all_free() {
    let arena = arena(10);
    assert_eq!(arena.chunk_count(), 10);
    assert_eq!(arena.free_chunks(), 10);
    assert_eq!(arena.used_chunks(), 0);
    assert_eq!(arena.payload_size(), PAYLOAD);
    assert_eq!(arena.available(), 10 * PAYLOAD);
}

#[test]
fn test_partial_chunk_is_not_counted() {
    let arena = ChunkArena::new(3 * (CHUNK_HEADER_SIZE + PAYLOAD) + 5, PAYLOAD).unwrap();
    assert_eq!(arena.chunk_count(), 3);
}

#[test]
fn test_region_too_small() {
    let result = ChunkArena::new(CHUNK_HEADER_SIZE + PAYLOAD - 1, PAYLOAD);
    assert!(matches!(result, Err(MultiKvError::Config(_))));

    let result = ChunkArena::new(1024, 0);
    assert!(matches!(result, Err(MultiKvError::Config(_))));
}

#[test]
fn test_chunks_for() {
    let arena = arena(4);
    assert_eq!(arena.chunks_for(0), 1);
    assert_eq!(arena.chunks_for(1), 1);
    assert_eq!(arena.chunks_for(8), 1);
    assert_eq!(arena.chunks_for(9), 2);
    assert_eq!(arena.chunks_for(24), 3);
}

// =============================================================================
// Store / Read Tests
// =============================================================================

#[test]
fn test_store_and_read_single_chunk() {
    let mut arena = arena(4);
    let handle = arena.store(b"lionel").unwrap();

    assert_eq!(arena.read(handle).unwrap(), b"lionel");
    assert_eq!(arena.len(handle).unwrap(), 6);
    assert_eq!(arena.capacity(handle).unwrap(), PAYLOAD);
    assert_eq!(arena.used_chunks(), 1);
}

#[test]
fn test_store_spans_chain() {
    let mut arena = arena(10);
    let value = b"a value longer than two chunks";
    let handle = arena.store(value).unwrap();

    assert_eq!(arena.used_chunks(), arena.chunks_for(value.len()));
    assert_eq!(arena.read(handle).unwrap(), value);
    assert_eq!(arena.len(handle).unwrap(), value.len());
    assert!(arena.matches(handle, value).unwrap());
}

#[test]
fn test_empty_value_takes_one_chunk() {
    let mut arena = arena(2);
    let handle = arena.store(b"").unwrap();
    assert_eq!(arena.used_chunks(), 1);
    assert!(arena.read(handle).unwrap().is_empty());
    assert!(arena.matches(handle, b"").unwrap());
}

#[test]
fn test_matches_rejects_prefixes_and_extensions() {
    let mut arena = arena(6);
    let handle = arena.store(b"messi-10-barcelona").unwrap();

    assert!(arena.matches(handle, b"messi-10-barcelona").unwrap());
    assert!(!arena.matches(handle, b"messi-10").unwrap());
    assert!(!arena.matches(handle, b"messi-10-barcelona!").unwrap());
    assert!(!arena.matches(handle, b"messi-30-barcelona").unwrap());
}

#[test]
fn test_write_in_place() {
    let mut arena = arena(6);
    let handle = arena.store(b"0123456789abcdef").unwrap();

    arena.write(handle, b"short").unwrap();
    assert_eq!(arena.read(handle).unwrap(), b"short");
    assert_eq!(arena.capacity(handle).unwrap(), 2 * PAYLOAD);

    let result = arena.write(handle, b"far too long for two chunks");
    assert!(matches!(result, Err(MultiKvError::OutOfSpace { .. })));
    assert_eq!(arena.read(handle).unwrap(), b"short");
}

// =============================================================================
// Free List Tests
// =============================================================================

#[test]
fn test_free_returns_whole_chain() {
    let mut arena = arena(10);
    let handle = arena.store(&[7u8; 30]).unwrap();
    assert_eq!(arena.free_chunks(), 6);

    arena.free(handle).unwrap();
    assert_eq!(arena.free_chunks(), 10);
}

#[test]
fn test_stale_handle_rejected() {
    let mut arena = arena(4);
    let handle = arena.store(b"gone").unwrap();
    arena.free(handle).unwrap();

    assert!(matches!(arena.read(handle), Err(MultiKvError::InvalidHandle(_))));
    assert!(matches!(arena.free(handle), Err(MultiKvError::InvalidHandle(_))));

    // Reallocating the same slot does not revive the old handle
    let again = arena.store(b"new").unwrap();
    assert_eq!(again.index(), handle.index());
    assert!(arena.read(handle).is_err());
    assert_eq!(arena.read(again).unwrap(), b"new");
}

#[test]
fn test_reset_invalidates_all_handles() {
    let mut arena = arena(4);
    let a = arena.store(b"a").unwrap();
    let b = arena.store(b"b").unwrap();

    arena.reset().unwrap();
    assert_eq!(arena.free_chunks(), 4);
    assert!(arena.read(a).is_err());
    assert!(arena.read(b).is_err());
}

#[test]
fn test_out_of_space() {
    let mut arena = arena(3);
    arena.store(b"12345678").unwrap();

    let result = arena.store(&[0u8; 20]);
    assert_eq!(
        result,
        Err(MultiKvError::OutOfSpace {
            requested: 20,
            available: 2 * PAYLOAD
        })
    );
    // A failed allocation takes nothing
    assert_eq!(arena.free_chunks(), 2);
    assert!(arena.store(&[0u8; 16]).is_ok());
    assert_eq!(arena.free_chunks(), 0);
}

#[test]
fn test_interleaved_alloc_free_keeps_data_intact() {
    let mut arena = arena(32);
    let mut live = Vec::new();

    for i in 0..12u8 {
        let value = vec![i; 3 + i as usize];
        live.push((arena.store(&value).unwrap(), value));
        if i % 3 == 0 {
            let (handle, _) = live.remove(0);
            arena.free(handle).unwrap();
        }
    }

    for (handle, value) in &live {
        assert_eq!(&arena.read(*handle).unwrap(), value);
    }
    let used: usize = live.iter().map(|(_, v)| arena.chunks_for(v.len())).sum();
    assert_eq!(arena.used_chunks(), used);
}
