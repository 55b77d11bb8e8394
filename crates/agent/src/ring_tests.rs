use super::*;

#[test]
fn empty_buffer_drains_empty() {
    let mut ring = RingBuffer::new(16);
    assert!(ring.is_empty());
    assert_eq!(ring.drain(), Vec::<u8>::new());
}

#[test]
fn sequential_writes_concatenate() {
    let mut ring = RingBuffer::new(1024);
    ring.write(b"line1");
    ring.write(b"line2");
    assert_eq!(ring.len(), 10);
    assert_eq!(ring.drain(), b"line1line2".to_vec());
    assert!(ring.is_empty());
}

#[test]
fn drain_resets_the_buffer() {
    let mut ring = RingBuffer::new(1024);
    ring.write(b"abc");
    assert_eq!(ring.drain(), b"abc".to_vec());
    assert_eq!(ring.drain(), Vec::<u8>::new());
}

#[test]
fn eviction_drops_oldest_whole_chunks_first() {
    let mut ring = RingBuffer::new(10);
    ring.write(b"aaaaa"); // 5
    ring.write(b"bbbbb"); // 10, at capacity
    ring.write(b"ccccc"); // 15 -> evict "aaaaa", left with 10
    assert_eq!(ring.len(), 10);
    assert_eq!(ring.drain(), b"bbbbbccccc".to_vec());
}

#[test]
fn single_oversized_write_is_clamped_to_its_own_tail() {
    let mut ring = RingBuffer::new(4);
    ring.write(b"abcdefgh");
    assert_eq!(ring.len(), 4);
    assert_eq!(ring.drain(), b"efgh".to_vec());
}

#[test]
fn oversized_write_after_existing_data_still_clamps_to_capacity() {
    let mut ring = RingBuffer::new(4);
    ring.write(b"ab");
    ring.write(b"0123456789");
    assert_eq!(ring.len(), 4);
    assert_eq!(ring.drain(), b"6789".to_vec());
}

#[test]
fn total_size_never_exceeds_capacity_across_many_writes() {
    let mut ring = RingBuffer::new(7);
    let mut expected = Vec::new();
    for i in 0..20u8 {
        let chunk = vec![i; 3];
        ring.write(&chunk);
        expected.extend_from_slice(&chunk);
        assert!(ring.len() <= 7);
    }
    let tail = &expected[expected.len() - ring.len()..];
    assert_eq!(ring.drain(), tail);
}
