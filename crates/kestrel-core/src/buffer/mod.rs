//! Hardware-mapped circular buffers.
//!
//! A [`Buffer`] moves samples from exactly one writer to exactly one reader.
//! Neither side copies through an intermediate: a writer reserves a
//! [`WriteWindow`] over free space, fills it in place and commits; a reader
//! reserves a [`ReadWindow`] over occupied space, consumes it in place and
//! commits.
//!
//! # Cursors
//!
//! `head` is advanced only by write commits, `tail` only by read commits. Both
//! run over `0..2 * capacity` so that a full buffer and an empty buffer are
//! distinguishable without a shared counter:
//!
//! ```text
//! occupied = (head - tail) mod (2 * capacity)    // always in 0..=capacity
//! ```
//!
//! # Windows
//!
//! Each role owns one mapping flag. Reserving sets it and maps the region;
//! committing, releasing or dropping the window clears it and unmaps. A window
//! that is leaked (for example with [`core::mem::forget`]) keeps the flag set
//! and the next reserve on that role fails with
//! [`BufferError::WindowAlreadyOpen`] until [`Buffer::reclaim_windows`] runs.

mod port;
mod window;

pub use port::{HeapAllocator, HeapRegion, MemoryPort, RegionAllocator, RegionPool};
pub use window::{ReadWindow, WriteWindow};

#[cfg(not(feature = "std"))]
use alloc::boxed::Box;

/// Access granularity of a buffer, in bytes per sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SampleSize {
    /// 8-bit samples (byte stream).
    #[default]
    Bits8,
    /// 16-bit samples.
    Bits16,
    /// 32-bit samples.
    Bits32,
}

impl SampleSize {
    /// Width of one sample in bytes.
    pub const fn bytes(self) -> usize {
        match self {
            Self::Bits8 => 1,
            Self::Bits16 => 2,
            Self::Bits32 => 4,
        }
    }

    /// Parses a width in bytes.
    pub const fn from_bytes(bytes: usize) -> Option<Self> {
        match bytes {
            1 => Some(Self::Bits8),
            2 => Some(Self::Bits16),
            4 => Some(Self::Bits32),
            _ => None,
        }
    }

    /// Returns `true` if `n` bytes is a whole number of samples.
    pub const fn is_aligned(self, n: usize) -> bool {
        n % self.bytes() == 0
    }
}

impl core::fmt::Display for SampleSize {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}-bit", self.bytes() * 8)
    }
}

/// Errors from reserving or committing buffer windows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BufferError {
    /// Free space is smaller than the requested write.
    InsufficientSpace {
        /// Bytes requested.
        requested: usize,
        /// Bytes free.
        available: usize,
    },
    /// Occupied space is smaller than the requested read.
    InsufficientData {
        /// Bytes requested.
        requested: usize,
        /// Bytes occupied.
        available: usize,
    },
    /// A window is already outstanding for this role.
    WindowAlreadyOpen,
    /// The byte count is not a whole number of samples.
    Misaligned {
        /// Offending byte count.
        bytes: usize,
        /// Buffer granularity.
        sample_size: SampleSize,
    },
    /// Commit amount exceeds the reserved window.
    InvalidCommit {
        /// Bytes the caller tried to commit.
        used: usize,
        /// Size of the reservation.
        reserved: usize,
    },
}

impl BufferError {
    /// Shortfalls are expected in steady state and retried next tick.
    pub fn is_shortfall(&self) -> bool {
        matches!(
            self,
            Self::InsufficientSpace { .. } | Self::InsufficientData { .. }
        )
    }
}

impl core::fmt::Display for BufferError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::InsufficientSpace {
                requested,
                available,
            } => write!(
                f,
                "insufficient space: requested {requested} bytes, {available} free"
            ),
            Self::InsufficientData {
                requested,
                available,
            } => write!(
                f,
                "insufficient data: requested {requested} bytes, {available} available"
            ),
            Self::WindowAlreadyOpen => write!(f, "a mapped window is already open"),
            Self::Misaligned { bytes, sample_size } => {
                write!(f, "{bytes} bytes is not a multiple of {sample_size} samples")
            }
            Self::InvalidCommit { used, reserved } => {
                write!(f, "commit of {used} bytes exceeds {reserved}-byte window")
            }
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for BufferError {}

/// Read/write cursors and per-role mapping flags.
#[derive(Debug, Default, Clone, Copy)]
pub(crate) struct Cursors {
    pub(crate) head: usize,
    pub(crate) tail: usize,
    pub(crate) write_open: bool,
    pub(crate) read_open: bool,
}

/// Fixed-capacity single-producer/single-consumer circular byte store.
pub struct Buffer {
    port: Box<dyn MemoryPort>,
    capacity: usize,
    sample_size: SampleSize,
    cursors: Cursors,
}

impl core::fmt::Debug for Buffer {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Buffer")
            .field("capacity", &self.capacity)
            .field("sample_size", &self.sample_size)
            .field("occupied", &self.occupied())
            .field("write_open", &self.cursors.write_open)
            .field("read_open", &self.cursors.read_open)
            .finish_non_exhaustive()
    }
}

impl Buffer {
    /// Wraps a mapped region.
    ///
    /// Capacity is the region length rounded down to a whole number of
    /// samples.
    pub fn new(port: Box<dyn MemoryPort>, sample_size: SampleSize) -> Self {
        let capacity = port.len() - port.len() % sample_size.bytes();
        Self {
            port,
            capacity,
            sample_size,
            cursors: Cursors::default(),
        }
    }

    /// Heap-backed byte buffer, mostly for tests and host-side staging.
    pub fn with_capacity(capacity: usize) -> Self {
        Self::new(Box::new(HeapRegion::new(capacity)), SampleSize::Bits8)
    }

    /// Total size in bytes.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Access granularity.
    pub fn sample_size(&self) -> SampleSize {
        self.sample_size
    }

    /// Bytes written but not yet read.
    pub fn occupied(&self) -> usize {
        if self.capacity == 0 {
            return 0;
        }
        let span = 2 * self.capacity;
        (self.cursors.head + span - self.cursors.tail) % span
    }

    /// Bytes that can be written.
    pub fn space(&self) -> usize {
        self.capacity - self.occupied()
    }

    /// Returns `true` if nothing is waiting to be read.
    pub fn is_empty(&self) -> bool {
        self.occupied() == 0
    }

    /// Returns `true` if no more bytes can be written.
    pub fn is_full(&self) -> bool {
        self.occupied() == self.capacity
    }

    /// Whether a write window is outstanding.
    pub fn is_write_open(&self) -> bool {
        self.cursors.write_open
    }

    /// Whether a read window is outstanding.
    pub fn is_read_open(&self) -> bool {
        self.cursors.read_open
    }

    fn check_aligned(&self, bytes: usize) -> Result<(), BufferError> {
        if self.sample_size.is_aligned(bytes) {
            Ok(())
        } else {
            Err(BufferError::Misaligned {
                bytes,
                sample_size: self.sample_size,
            })
        }
    }

    /// Reserves `n` bytes of free space for writing.
    pub fn write_reserve(&mut self, n: usize) -> Result<WriteWindow<'_>, BufferError> {
        if self.cursors.write_open {
            return Err(BufferError::WindowAlreadyOpen);
        }
        self.check_aligned(n)?;
        let available = self.space();
        if n > available {
            return Err(BufferError::InsufficientSpace {
                requested: n,
                available,
            });
        }
        let start = self.cursors.head % self.capacity.max(1);
        self.cursors.write_open = true;
        self.port.open();
        Ok(WriteWindow::new(
            &mut *self.port,
            &mut self.cursors,
            self.capacity,
            self.sample_size,
            start,
            n,
        ))
    }

    /// Reserves `n` occupied bytes for reading, starting at the tail.
    pub fn read_reserve(&mut self, n: usize) -> Result<ReadWindow<'_>, BufferError> {
        if self.cursors.read_open {
            return Err(BufferError::WindowAlreadyOpen);
        }
        self.check_aligned(n)?;
        let available = self.occupied();
        if n > available {
            return Err(BufferError::InsufficientData {
                requested: n,
                available,
            });
        }
        let start = self.cursors.tail % self.capacity.max(1);
        self.cursors.read_open = true;
        self.port.open();
        Ok(ReadWindow::new(
            &mut *self.port,
            &mut self.cursors,
            self.capacity,
            self.sample_size,
            start,
            n,
        ))
    }

    /// Copies `data` in and commits it. All or nothing.
    pub fn write(&mut self, data: &[u8]) -> Result<(), BufferError> {
        let mut window = self.write_reserve(data.len())?;
        window.copy_from_slice(0, data);
        window.commit(data.len())
    }

    /// Fills `out` from the tail and commits. All or nothing.
    pub fn read(&mut self, out: &mut [u8]) -> Result<(), BufferError> {
        let mut window = self.read_reserve(out.len())?;
        window.copy_to_slice(0, out);
        window.commit(out.len())
    }

    /// Drops `n` bytes from the tail without mapping them.
    pub fn discard(&mut self, n: usize) -> Result<(), BufferError> {
        self.read_reserve(n)?.commit(n)
    }

    /// Empties the buffer. Leaves any outstanding flags untouched.
    pub fn clear(&mut self) {
        self.cursors.tail = self.cursors.head;
    }

    /// Force-closes windows that were leaked instead of committed or released.
    ///
    /// Returns `true` if anything had to be reclaimed.
    pub fn reclaim_windows(&mut self) -> bool {
        let mut leaked = false;
        if self.cursors.write_open {
            self.cursors.write_open = false;
            self.port.close();
            leaked = true;
        }
        if self.cursors.read_open {
            self.cursors.read_open = false;
            self.port.close();
            leaked = true;
        }
        leaked
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_buffer_is_empty() {
        let buf = Buffer::with_capacity(256);
        assert_eq!(buf.capacity(), 256);
        assert_eq!(buf.occupied(), 0);
        assert_eq!(buf.space(), 256);
        assert!(buf.is_empty());
        assert!(!buf.is_full());
    }

    #[test]
    fn capacity_rounds_down_to_sample_size() {
        let buf = Buffer::new(Box::new(HeapRegion::new(255)), SampleSize::Bits16);
        assert_eq!(buf.capacity(), 254);
    }

    #[test]
    fn write_then_read_round_trips() {
        let mut buf = Buffer::with_capacity(8);
        buf.write(&[1, 2, 3, 4, 5]).unwrap();
        assert_eq!(buf.occupied(), 5);
        let mut out = [0u8; 5];
        buf.read(&mut out).unwrap();
        assert_eq!(out, [1, 2, 3, 4, 5]);
        assert!(buf.is_empty());
    }

    #[test]
    fn fills_to_capacity() {
        let mut buf = Buffer::with_capacity(4);
        buf.write(&[9; 4]).unwrap();
        assert!(buf.is_full());
        assert_eq!(
            buf.write(&[1]),
            Err(BufferError::InsufficientSpace {
                requested: 1,
                available: 0
            })
        );
    }

    #[test]
    fn read_beyond_occupied_fails() {
        let mut buf = Buffer::with_capacity(8);
        buf.write(&[1, 2]).unwrap();
        assert_eq!(
            buf.read_reserve(3).err(),
            Some(BufferError::InsufficientData {
                requested: 3,
                available: 2
            })
        );
        assert_eq!(buf.occupied(), 2);
    }

    #[test]
    fn wraps_around_boundary() {
        let mut buf = Buffer::with_capacity(8);
        buf.write(&[0; 6]).unwrap();
        buf.discard(6).unwrap();
        buf.write(&[1, 2, 3, 4, 5]).unwrap();

        let mut window = buf.read_reserve(5).unwrap();
        let (first, second) = window.as_slices();
        assert_eq!(first, &[1, 2]);
        assert_eq!(second, &[3, 4, 5]);
        window.commit(5).unwrap();
        assert!(buf.is_empty());
    }

    #[test]
    fn second_reserve_on_same_role_fails() {
        let mut buf = Buffer::with_capacity(8);
        core::mem::forget(buf.write_reserve(4).unwrap());
        assert!(buf.is_write_open());
        assert_eq!(
            buf.write_reserve(4).err(),
            Some(BufferError::WindowAlreadyOpen)
        );
        // Read side is independent.
        assert!(buf.read_reserve(0).is_ok());
        assert!(buf.reclaim_windows());
        assert!(buf.write_reserve(4).is_ok());
    }

    #[test]
    fn dropped_window_releases() {
        let mut buf = Buffer::with_capacity(8);
        {
            let mut window = buf.write_reserve(4).unwrap();
            window.copy_from_slice(0, &[1, 2, 3, 4]);
        }
        assert!(!buf.is_write_open());
        assert_eq!(buf.occupied(), 0);
        assert!(!buf.reclaim_windows());
    }

    #[test]
    fn partial_commit_advances_by_used() {
        let mut buf = Buffer::with_capacity(16);
        let mut window = buf.write_reserve(8).unwrap();
        window.copy_from_slice(0, &[7, 7, 7]);
        window.commit(3).unwrap();
        assert_eq!(buf.occupied(), 3);
    }

    #[test]
    fn over_commit_is_rejected() {
        let mut buf = Buffer::with_capacity(16);
        let window = buf.write_reserve(4).unwrap();
        assert_eq!(
            window.commit(5),
            Err(BufferError::InvalidCommit {
                used: 5,
                reserved: 4
            })
        );
        assert_eq!(buf.occupied(), 0);
        assert!(!buf.is_write_open());
    }

    #[test]
    fn misaligned_reserve_is_rejected() {
        let mut buf = Buffer::new(Box::new(HeapRegion::new(16)), SampleSize::Bits16);
        assert_eq!(
            buf.write_reserve(3).err(),
            Some(BufferError::Misaligned {
                bytes: 3,
                sample_size: SampleSize::Bits16
            })
        );
    }

    #[test]
    fn shortfalls_are_classified() {
        assert!(
            BufferError::InsufficientData {
                requested: 1,
                available: 0
            }
            .is_shortfall()
        );
        assert!(!BufferError::WindowAlreadyOpen.is_shortfall());
    }

    #[test]
    fn sample_size_conversions() {
        assert_eq!(SampleSize::from_bytes(2), Some(SampleSize::Bits16));
        assert_eq!(SampleSize::from_bytes(3), None);
        assert_eq!(SampleSize::Bits32.bytes(), 4);
        assert!(SampleSize::Bits16.is_aligned(64));
        assert!(!SampleSize::Bits32.is_aligned(6));
    }
}
