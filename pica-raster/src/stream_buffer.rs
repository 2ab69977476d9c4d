// Streaming ring buffer.
//
// All per-draw data (vertices, indices, uniforms, lookup tables) is
// written into reusable rings that are uploaded to the GPU at submission
// time. Allocation is a cursor bump; when a request does not fit before
// the end of the ring the cursor wraps to zero and the mapping reports it,
// because every GPU-side offset handed out earlier may now be overwritten
// and must be refreshed.

/// Round `value` up to a multiple of `align` (a power of two).
pub fn align_up(value: usize, align: usize) -> usize {
    debug_assert!(align.is_power_of_two());
    (value + align - 1) & !(align - 1)
}

pub struct StreamBuffer {
    data: Box<[u8]>,
    cursor: usize,
}

impl StreamBuffer {
    pub fn new(capacity: usize) -> Self {
        Self {
            data: vec![0u8; capacity].into_boxed_slice(),
            cursor: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.data.len()
    }

    /// Current cursor; the offset the next unaligned mapping would get.
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// Reserve `size` bytes at `align` alignment. Returns the writable
    /// region, its byte offset within the ring, and whether the cursor
    /// wrapped (invalidating all previously returned offsets).
    ///
    /// The caller must fully write the region before committing and must
    /// not commit more than `size`.
    pub fn map(&mut self, size: usize, align: usize) -> (&mut [u8], u64, bool) {
        debug_assert!(size <= self.data.len());
        let align = align.max(1);
        let mut offset = align_up(self.cursor, align);
        let mut invalidated = false;
        if offset + size > self.data.len() {
            offset = 0;
            invalidated = true;
        }
        self.cursor = offset;
        (&mut self.data[offset..offset + size], offset as u64, invalidated)
    }

    /// Consume `size` bytes of the most recent mapping.
    pub fn commit(&mut self, size: usize) {
        debug_assert!(self.cursor + size <= self.data.len());
        self.cursor += size;
    }

    /// Committed contents of the ring, for upload at submission time.
    pub fn contents(&self) -> &[u8] {
        &self.data
    }
}

// ── Tests ───────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn align_up_powers_of_two() {
        assert_eq!(align_up(0, 16), 0);
        assert_eq!(align_up(1, 16), 16);
        assert_eq!(align_up(16, 16), 16);
        assert_eq!(align_up(17, 4), 20);
    }

    #[test]
    fn sequential_commits_advance() {
        let mut ring = StreamBuffer::new(256);
        let (_, offset, wrapped) = ring.map(64, 16);
        assert_eq!(offset, 0);
        assert!(!wrapped);
        ring.commit(64);

        let (_, offset, wrapped) = ring.map(32, 16);
        assert_eq!(offset, 64);
        assert!(!wrapped);
        ring.commit(32);
        assert_eq!(ring.cursor(), 96);
    }

    #[test]
    fn mapping_aligns_cursor() {
        let mut ring = StreamBuffer::new(256);
        ring.map(10, 1);
        ring.commit(10);
        let (_, offset, _) = ring.map(16, 16);
        assert_eq!(offset, 16);
    }

    #[test]
    fn wrap_reports_invalidation() {
        let mut ring = StreamBuffer::new(128);
        ring.map(100, 1);
        ring.commit(100);
        let (_, offset, wrapped) = ring.map(64, 1);
        assert_eq!(offset, 0);
        assert!(wrapped);
    }

    #[test]
    fn commit_less_than_mapped() {
        let mut ring = StreamBuffer::new(128);
        let (_, _, _) = ring.map(64, 1);
        ring.commit(24);
        let (_, offset, _) = ring.map(8, 1);
        assert_eq!(offset, 24);
    }

    #[test]
    fn mapped_region_is_writable() {
        let mut ring = StreamBuffer::new(64);
        let (slice, _, _) = ring.map(4, 1);
        slice.copy_from_slice(&[1, 2, 3, 4]);
        ring.commit(4);
        assert_eq!(&ring.contents()[..4], &[1, 2, 3, 4]);
    }
}
