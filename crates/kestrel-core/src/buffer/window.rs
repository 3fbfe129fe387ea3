//! Scoped mapped windows over a [`Buffer`](super::Buffer).
//!
//! A window borrows its buffer mutably, so it cannot outlive the call that
//! reserved it and no cursor can move while it is open. Windows are move-only:
//! [`commit`](WriteWindow::commit) consumes the window, and dropping an
//! uncommitted window is a release (cursor unchanged).
//!
//! The reserved range may straddle the end of the region. Accessors either
//! hand out the two halves ([`as_mut_slices`](WriteWindow::as_mut_slices)) or
//! take window-relative offsets and handle the split internally.

use super::{BufferError, Cursors, MemoryPort, SampleSize};

/// Location of a reservation inside the region.
#[derive(Debug, Clone, Copy)]
struct Span {
    start: usize,
    len: usize,
    capacity: usize,
}

impl Span {
    /// Lengths of the contiguous part and the wrapped part.
    fn split(self) -> (usize, usize) {
        let first = self.len.min(self.capacity - self.start);
        (first, self.len - first)
    }

    /// Region index of the window-relative offset.
    fn index(self, offset: usize) -> usize {
        let idx = self.start + offset;
        if idx >= self.capacity {
            idx - self.capacity
        } else {
            idx
        }
    }

    fn halves(self, bytes: &mut [u8]) -> (&mut [u8], &mut [u8]) {
        let (first, second) = self.split();
        let (head, tail) = bytes[..self.capacity].split_at_mut(self.start);
        (&mut tail[..first], &mut head[..second])
    }
}

/// Advances a cursor that runs over `0..2 * capacity`.
fn advance(cursor: usize, by: usize, capacity: usize) -> usize {
    (cursor + by) % (2 * capacity).max(1)
}

/// Exclusive view over reserved free space.
pub struct WriteWindow<'a> {
    port: &'a mut dyn MemoryPort,
    cursors: &'a mut Cursors,
    span: Span,
    sample_size: SampleSize,
}

impl<'a> WriteWindow<'a> {
    pub(super) fn new(
        port: &'a mut dyn MemoryPort,
        cursors: &'a mut Cursors,
        capacity: usize,
        sample_size: SampleSize,
        start: usize,
        len: usize,
    ) -> Self {
        Self {
            port,
            cursors,
            span: Span {
                start,
                len,
                capacity,
            },
            sample_size,
        }
    }

    /// Reserved size in bytes.
    pub fn len(&self) -> usize {
        self.span.len
    }

    /// Returns `true` for a zero-byte reservation.
    pub fn is_empty(&self) -> bool {
        self.span.len == 0
    }

    /// Granularity of the underlying buffer.
    pub fn sample_size(&self) -> SampleSize {
        self.sample_size
    }

    /// The window as two raw slices; the second is empty unless the window
    /// wraps.
    pub fn as_mut_slices(&mut self) -> (&mut [u8], &mut [u8]) {
        let span = self.span;
        span.halves(self.port.mapped())
    }

    /// Writes `data` starting at `offset` bytes into the window.
    ///
    /// # Panics
    ///
    /// Panics if the data would run past the end of the window.
    pub fn copy_from_slice(&mut self, offset: usize, data: &[u8]) {
        assert!(offset + data.len() <= self.span.len, "write past window end");
        let span = self.span;
        let bytes = self.port.mapped();
        let start = span.index(offset);
        let first = data.len().min(span.capacity - start);
        bytes[start..start + first].copy_from_slice(&data[..first]);
        bytes[..data.len() - first].copy_from_slice(&data[first..]);
    }

    /// Writes one little-endian 16-bit sample at sample index `index`.
    pub fn put_i16(&mut self, index: usize, sample: i16) {
        self.copy_from_slice(index * 2, &sample.to_le_bytes());
    }

    /// Fills the whole window with `byte`.
    pub fn fill(&mut self, byte: u8) {
        let (first, second) = self.as_mut_slices();
        first.fill(byte);
        second.fill(byte);
    }

    /// Copies `len` bytes from a read window into this one, starting at the
    /// beginning of both.
    ///
    /// # Panics
    ///
    /// Panics if `len` exceeds either window.
    pub fn copy_from_window(&mut self, source: &mut ReadWindow<'_>, len: usize) {
        assert!(len <= self.span.len && len <= source.len(), "copy past window end");
        let (a, b) = source.as_slices();
        let split = a.len().min(len);
        self.copy_from_slice(0, &a[..split]);
        self.copy_from_slice(split, &b[..len - split]);
    }

    /// Publishes the first `used` bytes to the reader and closes the window.
    pub fn commit(self, used: usize) -> Result<(), BufferError> {
        if used > self.span.len {
            return Err(BufferError::InvalidCommit {
                used,
                reserved: self.span.len,
            });
        }
        if !self.sample_size.is_aligned(used) {
            return Err(BufferError::Misaligned {
                bytes: used,
                sample_size: self.sample_size,
            });
        }
        self.cursors.head = advance(self.cursors.head, used, self.span.capacity);
        Ok(())
    }

    /// Closes the window without publishing anything.
    pub fn release(self) {}
}

impl Drop for WriteWindow<'_> {
    fn drop(&mut self) {
        self.cursors.write_open = false;
        self.port.close();
    }
}

impl core::fmt::Debug for WriteWindow<'_> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("WriteWindow")
            .field("start", &self.span.start)
            .field("len", &self.span.len)
            .finish()
    }
}

/// Exclusive view over reserved occupied space.
pub struct ReadWindow<'a> {
    port: &'a mut dyn MemoryPort,
    cursors: &'a mut Cursors,
    span: Span,
    sample_size: SampleSize,
}

impl<'a> ReadWindow<'a> {
    pub(super) fn new(
        port: &'a mut dyn MemoryPort,
        cursors: &'a mut Cursors,
        capacity: usize,
        sample_size: SampleSize,
        start: usize,
        len: usize,
    ) -> Self {
        Self {
            port,
            cursors,
            span: Span {
                start,
                len,
                capacity,
            },
            sample_size,
        }
    }

    /// Reserved size in bytes.
    pub fn len(&self) -> usize {
        self.span.len
    }

    /// Returns `true` for a zero-byte reservation.
    pub fn is_empty(&self) -> bool {
        self.span.len == 0
    }

    /// Granularity of the underlying buffer.
    pub fn sample_size(&self) -> SampleSize {
        self.sample_size
    }

    /// The window as two raw slices; the second is empty unless the window
    /// wraps.
    pub fn as_slices(&mut self) -> (&[u8], &[u8]) {
        let span = self.span;
        let (a, b) = span.halves(self.port.mapped());
        (a, b)
    }

    /// Copies bytes starting at `offset` into `out`.
    ///
    /// # Panics
    ///
    /// Panics if the read would run past the end of the window.
    pub fn copy_to_slice(&mut self, offset: usize, out: &mut [u8]) {
        assert!(offset + out.len() <= self.span.len, "read past window end");
        let span = self.span;
        let bytes = self.port.mapped();
        let start = span.index(offset);
        let first = out.len().min(span.capacity - start);
        let rest = out.len() - first;
        out[..first].copy_from_slice(&bytes[start..start + first]);
        out[first..].copy_from_slice(&bytes[..rest]);
    }

    /// Reads one byte at `offset`.
    pub fn byte(&mut self, offset: usize) -> u8 {
        let idx = self.span.index(offset);
        self.port.mapped()[idx]
    }

    /// Reads the little-endian 16-bit sample at sample index `index`.
    pub fn get_i16(&mut self, index: usize) -> i16 {
        let mut raw = [0u8; 2];
        self.copy_to_slice(index * 2, &mut raw);
        i16::from_le_bytes(raw)
    }

    /// Consumes the first `used` bytes and closes the window.
    pub fn commit(self, used: usize) -> Result<(), BufferError> {
        if used > self.span.len {
            return Err(BufferError::InvalidCommit {
                used,
                reserved: self.span.len,
            });
        }
        if !self.sample_size.is_aligned(used) {
            return Err(BufferError::Misaligned {
                bytes: used,
                sample_size: self.sample_size,
            });
        }
        self.cursors.tail = advance(self.cursors.tail, used, self.span.capacity);
        Ok(())
    }

    /// Closes the window without consuming anything.
    pub fn release(self) {}
}

impl Drop for ReadWindow<'_> {
    fn drop(&mut self) {
        self.cursors.read_open = false;
        self.port.close();
    }
}

impl core::fmt::Debug for ReadWindow<'_> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ReadWindow")
            .field("start", &self.span.start)
            .field("len", &self.span.len)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use crate::buffer::{Buffer, HeapRegion, SampleSize};

    #[test]
    fn split_write_lands_on_both_halves() {
        let mut buf = Buffer::with_capacity(6);
        buf.write(&[0; 4]).unwrap();
        buf.discard(4).unwrap();

        let mut window = buf.write_reserve(5).unwrap();
        {
            let (first, second) = window.as_mut_slices();
            assert_eq!(first.len(), 2);
            assert_eq!(second.len(), 3);
        }
        window.copy_from_slice(0, &[10, 11, 12, 13, 14]);
        window.commit(5).unwrap();

        let mut out = [0u8; 5];
        buf.read(&mut out).unwrap();
        assert_eq!(out, [10, 11, 12, 13, 14]);
    }

    #[test]
    fn offset_reads_cross_the_boundary() {
        let mut buf = Buffer::with_capacity(4);
        buf.write(&[0; 3]).unwrap();
        buf.discard(3).unwrap();
        buf.write(&[1, 2, 3, 4]).unwrap();

        let mut window = buf.read_reserve(4).unwrap();
        assert_eq!(window.byte(0), 1);
        assert_eq!(window.byte(1), 2);
        assert_eq!(window.byte(3), 4);
        let mut mid = [0u8; 2];
        window.copy_to_slice(1, &mut mid);
        assert_eq!(mid, [2, 3]);
        window.release();
        assert_eq!(buf.occupied(), 4);
    }

    #[test]
    fn i16_samples_round_trip() {
        let mut buf = Buffer::new(Box::new(HeapRegion::new(8)), SampleSize::Bits16);
        let mut window = buf.write_reserve(4).unwrap();
        window.put_i16(0, -2);
        window.put_i16(1, 300);
        window.commit(4).unwrap();

        let mut window = buf.read_reserve(4).unwrap();
        assert_eq!(window.get_i16(0), -2);
        assert_eq!(window.get_i16(1), 300);
        window.commit(4).unwrap();
    }

    #[test]
    fn misaligned_commit_is_rejected() {
        let mut buf = Buffer::new(Box::new(HeapRegion::new(8)), SampleSize::Bits16);
        let window = buf.write_reserve(4).unwrap();
        assert!(window.commit(3).is_err());
        assert_eq!(buf.occupied(), 0);
    }

    #[test]
    fn window_to_window_copy() {
        let mut src = Buffer::with_capacity(8);
        let mut dst = Buffer::with_capacity(8);
        dst.write(&[0; 7]).unwrap();
        dst.discard(7).unwrap();
        src.write(&[5, 6, 7, 8]).unwrap();

        let mut reader = src.read_reserve(4).unwrap();
        let mut writer = dst.write_reserve(4).unwrap();
        writer.copy_from_window(&mut reader, 4);
        writer.commit(4).unwrap();
        reader.commit(4).unwrap();

        let mut out = [0u8; 4];
        dst.read(&mut out).unwrap();
        assert_eq!(out, [5, 6, 7, 8]);
        assert!(src.is_empty());
    }

    #[test]
    fn fill_covers_the_window() {
        let mut buf = Buffer::with_capacity(4);
        let mut window = buf.write_reserve(3).unwrap();
        window.fill(0xAB);
        window.commit(3).unwrap();
        let mut out = [0u8; 3];
        buf.read(&mut out).unwrap();
        assert_eq!(out, [0xAB; 3]);
    }
}
