//! Memory ports: the storage behind a [`Buffer`](super::Buffer).
//!
//! A port models one hardware-mapped memory region. Raw access goes through a
//! mapping register that must be opened before the bytes are touched and closed
//! afterwards. The buffer layer guarantees that `open`/`close` calls are paired,
//! so implementations only need to program the register.
//!
//! Two allocators are provided:
//!
//! - [`HeapAllocator`] - unbounded, backed by the global allocator
//! - [`RegionPool`] - fixed byte budget shared by every region it hands out

#[cfg(not(feature = "std"))]
use alloc::{boxed::Box, vec, vec::Vec};

use alloc::sync::Arc;
use core::sync::atomic::{AtomicUsize, Ordering};

/// A mapped memory region owned by exactly one buffer.
pub trait MemoryPort: Send {
    /// Size of the region in bytes.
    fn len(&self) -> usize;

    /// Returns `true` if the region has no storage.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Claims a mapping register for this region. Called once per window;
    /// the reader and the writer may each hold one.
    fn open(&mut self);

    /// Releases one mapping register.
    fn close(&mut self);

    /// The mapped bytes. Only called between [`open`](Self::open) and
    /// [`close`](Self::close).
    fn mapped(&mut self) -> &mut [u8];
}

/// Hands out regions for new connections.
pub trait RegionAllocator: Send {
    /// Allocates a region of `len` bytes, or `None` when out of memory.
    fn allocate(&mut self, len: usize) -> Option<Box<dyn MemoryPort>>;
}

/// Heap-backed region with open counters for diagnostics.
///
/// The reader and the writer each hold their own mapping, so up to two
/// mappings may be live at once.
#[derive(Debug)]
pub struct HeapRegion {
    data: Vec<u8>,
    mappings: u8,
    opens: u64,
}

impl HeapRegion {
    /// Creates a zeroed region of `len` bytes.
    pub fn new(len: usize) -> Self {
        Self {
            data: vec![0; len],
            mappings: 0,
            opens: 0,
        }
    }

    /// Creates a zeroed region of `len` bytes, or `None` if the global
    /// allocator cannot supply them.
    pub fn try_new(len: usize) -> Option<Self> {
        let mut data = Vec::new();
        data.try_reserve_exact(len).ok()?;
        data.resize(len, 0);
        Some(Self {
            data,
            mappings: 0,
            opens: 0,
        })
    }

    /// Whether any mapping is currently held.
    pub fn is_open(&self) -> bool {
        self.mappings > 0
    }

    /// Number of times the region has been opened.
    pub fn open_count(&self) -> u64 {
        self.opens
    }
}

impl MemoryPort for HeapRegion {
    fn len(&self) -> usize {
        self.data.len()
    }

    fn open(&mut self) {
        debug_assert!(self.mappings < 2, "more than one mapping per role");
        self.mappings += 1;
        self.opens += 1;
    }

    fn close(&mut self) {
        self.mappings = self.mappings.saturating_sub(1);
    }

    fn mapped(&mut self) -> &mut [u8] {
        debug_assert!(self.mappings > 0, "region accessed while unmapped");
        &mut self.data
    }
}

/// Allocator with no budget.
#[derive(Debug, Default, Clone, Copy)]
pub struct HeapAllocator;

impl RegionAllocator for HeapAllocator {
    fn allocate(&mut self, len: usize) -> Option<Box<dyn MemoryPort>> {
        Some(Box::new(HeapRegion::try_new(len)?))
    }
}

/// Fixed-budget allocator.
///
/// Bytes are returned to the pool when a region is dropped, so a torn-down
/// connection frees its share for the next one.
#[derive(Debug, Clone)]
pub struct RegionPool {
    budget: usize,
    used: Arc<AtomicUsize>,
}

impl RegionPool {
    /// Creates a pool holding `budget` bytes.
    pub fn new(budget: usize) -> Self {
        Self {
            budget,
            used: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Total pool size in bytes.
    pub fn budget(&self) -> usize {
        self.budget
    }

    /// Bytes currently handed out.
    pub fn used(&self) -> usize {
        self.used.load(Ordering::Acquire)
    }

    /// Bytes still available.
    pub fn available(&self) -> usize {
        self.budget.saturating_sub(self.used())
    }
}

impl RegionAllocator for RegionPool {
    fn allocate(&mut self, len: usize) -> Option<Box<dyn MemoryPort>> {
        let claimed = self
            .used
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |used| {
                let next = used.checked_add(len)?;
                (next <= self.budget).then_some(next)
            });
        claimed.ok()?;
        let Some(inner) = HeapRegion::try_new(len) else {
            self.used.fetch_sub(len, Ordering::AcqRel);
            return None;
        };
        Some(Box::new(PooledRegion {
            inner,
            used: Arc::clone(&self.used),
        }))
    }
}

/// Region carved out of a [`RegionPool`].
#[derive(Debug)]
struct PooledRegion {
    inner: HeapRegion,
    used: Arc<AtomicUsize>,
}

impl Drop for PooledRegion {
    fn drop(&mut self) {
        self.used.fetch_sub(self.inner.len(), Ordering::AcqRel);
    }
}

impl MemoryPort for PooledRegion {
    fn len(&self) -> usize {
        self.inner.len()
    }

    fn open(&mut self) {
        self.inner.open();
    }

    fn close(&mut self) {
        self.inner.close();
    }

    fn mapped(&mut self) -> &mut [u8] {
        self.inner.mapped()
    }
}
