//! # Byte Ring Buffer
//!
//! Fixed-capacity circular buffer between a stream producer (reactor thread)
//! and its consumer.
//!
//! ## Design
//!
//! - **Positions**: read and write positions are monotonic `u64` counters;
//!   the storage index is the position modulo capacity. `write - read` is the
//!   occupancy and never exceeds the capacity.
//! - **No overwrite**: a full buffer rejects further writes. Backpressure is
//!   the caller's job.
//! - **No locking**: the buffer lives inside the stream state and is only
//!   touched under the stream lock.
//!
//! ## Usage
//!
//! ```rust
//! use core_input::ring_buffer::RingBuffer;
//!
//! let mut buffer = RingBuffer::new(8);
//! assert_eq!(buffer.write(b"hello world"), 8);
//!
//! let mut output = [0u8; 5];
//! assert_eq!(buffer.read(&mut output), 5);
//! assert_eq!(&output, b"hello");
//! assert_eq!(buffer.len(), 3);
//! ```

pub struct RingBuffer {
    storage: Box<[u8]>,
    read_pos: u64,
    write_pos: u64,
}

impl RingBuffer {
    /// Create a new ring buffer holding at most `capacity` bytes.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is zero.
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "ring buffer capacity must be non-zero");
        Self {
            storage: vec![0u8; capacity].into_boxed_slice(),
            read_pos: 0,
            write_pos: 0,
        }
    }

    /// Returns the total capacity of the buffer in bytes.
    pub fn capacity(&self) -> usize {
        self.storage.len()
    }

    /// Returns the number of bytes currently available to read.
    pub fn len(&self) -> usize {
        (self.write_pos - self.read_pos) as usize
    }

    /// Returns the number of bytes that can be written.
    pub fn free_space(&self) -> usize {
        self.capacity() - self.len()
    }

    pub fn is_empty(&self) -> bool {
        self.write_pos == self.read_pos
    }

    pub fn is_full(&self) -> bool {
        self.len() == self.capacity()
    }

    fn index(&self, pos: u64) -> usize {
        (pos % self.storage.len() as u64) as usize
    }

    /// Copies as much of `data` as fits. Returns the number of bytes accepted.
    pub fn write(&mut self, data: &[u8]) -> usize {
        let mut written = 0;
        while written < data.len() {
            let region = self.write_region();
            if region.is_empty() {
                break;
            }
            let n = region.len().min(data.len() - written);
            region[..n].copy_from_slice(&data[written..written + n]);
            self.commit(n);
            written += n;
        }
        written
    }

    /// Largest contiguous writable region, for producers that fill in place.
    ///
    /// Data placed there becomes readable after [`commit`](Self::commit).
    /// The region may be shorter than [`free_space`](Self::free_space) when
    /// the free space wraps around the end of the storage.
    pub fn write_region(&mut self) -> &mut [u8] {
        let free = self.free_space();
        let start = self.index(self.write_pos);
        let end = (start + free).min(self.storage.len());
        &mut self.storage[start..end]
    }

    /// Publishes `count` bytes previously placed in the write region.
    ///
    /// # Panics
    ///
    /// Panics if `count` exceeds the free space.
    pub fn commit(&mut self, count: usize) {
        assert!(
            count <= self.free_space(),
            "commit of {} bytes exceeds free space {}",
            count,
            self.free_space()
        );
        self.write_pos += count as u64;
    }

    /// Copies up to `output.len()` bytes out, across the wrap point.
    /// Returns the number of bytes read.
    pub fn read(&mut self, output: &mut [u8]) -> usize {
        let to_read = self.len().min(output.len());
        let start = self.index(self.read_pos);
        let first = to_read.min(self.storage.len() - start);

        output[..first].copy_from_slice(&self.storage[start..start + first]);
        output[first..to_read].copy_from_slice(&self.storage[..to_read - first]);

        self.read_pos += to_read as u64;
        to_read
    }

    /// Discards up to `count` buffered bytes. Returns the number discarded.
    pub fn consume(&mut self, count: usize) -> usize {
        let count = count.min(self.len());
        self.read_pos += count as u64;
        count
    }

    /// Drops all buffered bytes.
    pub fn clear(&mut self) {
        self.read_pos = 0;
        self.write_pos = 0;
    }
}

impl std::fmt::Debug for RingBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RingBuffer")
            .field("capacity", &self.capacity())
            .field("len", &self.len())
            .finish()
    }
}
