use std::alloc::{alloc_zeroed, dealloc, Layout};
use std::ptr;
use std::slice;
use std::sync::atomic::{AtomicU64, Ordering};

use crossbeam_utils::CachePadded;

// # Memory Ordering Strategy
//
// One producer thread, one consumer thread, two monotonically increasing
// 64-bit positions:
//
// - The producer writes record bytes, then publishes `produce_pos` with
//   Release. The consumer loads `produce_pos` with Acquire before touching
//   any bytes below it.
// - The consumer publishes `consume_pos` with Release after a handler
//   accepts a record. The producer loads it with Acquire to compute free
//   space, which also licenses reuse of the consumed region.
// - Each side loads its own position with Relaxed; nobody else writes it.
//
// Record headers and payloads are plain (non-atomic) memory. Every byte is
// ordered through one of the two position pairs above, so neither side ever
// reads bytes the other is still writing.

/// Size in bytes of a record length header. Headers, payload starts, and
/// record strides are all multiples of this.
pub const HEADER_SIZE: usize = std::mem::size_of::<i64>();

/// Alignment of the byte region and of each position counter.
const ALIGN: usize = 64;

#[inline(always)]
fn round_up(length: usize) -> usize {
    (length + HEADER_SIZE - 1) & !(HEADER_SIZE - 1)
}

/// Single-producer single-consumer ring buffer for variable-length records.
///
/// Records are stored as a signed length header followed by the payload. A
/// negative header is a wrap marker: its magnitude is the number of bytes to
/// skip to reach the start of the byte region again. Capacity is
/// `1 << SIZE_LOG2` bytes.
///
/// The type itself does not enforce the single-producer/single-consumer
/// discipline; callers must guarantee at most one thread produces and at most
/// one thread consumes at any time.
pub struct SpscRingBuffer<const SIZE_LOG2: usize = 20> {
    buffer: *mut u8,
    produce_pos: CachePadded<AtomicU64>,
    consume_pos: CachePadded<AtomicU64>,
}

// SAFETY: the buffer pointer is exclusively owned and all cross-thread access
// to its bytes is ordered through the atomic positions (see the ordering
// notes above).
unsafe impl<const SIZE_LOG2: usize> Send for SpscRingBuffer<SIZE_LOG2> {}
unsafe impl<const SIZE_LOG2: usize> Sync for SpscRingBuffer<SIZE_LOG2> {}

impl<const SIZE_LOG2: usize> SpscRingBuffer<SIZE_LOG2> {
    /// Capacity of the byte region.
    pub const SIZE: usize = 1 << SIZE_LOG2;
    const MASK: u64 = (Self::SIZE - 1) as u64;

    /// Allocates an empty ring buffer, or returns `None` when the allocator
    /// refuses.
    pub fn new() -> Option<Self> {
        let layout = Layout::from_size_align(Self::SIZE, ALIGN).ok()?;
        // SAFETY: layout has non-zero size and valid power-of-two alignment.
        let buffer = unsafe { alloc_zeroed(layout) };
        if buffer.is_null() {
            return None;
        }
        Some(Self {
            buffer,
            produce_pos: CachePadded::new(AtomicU64::new(0)),
            consume_pos: CachePadded::new(AtomicU64::new(0)),
        })
    }

    /// Attempts to reserve a record of `length` payload bytes.
    ///
    /// On success `filler` is called exactly once with the writable payload
    /// slice; returning `true` from it commits the record, returning `false`
    /// abandons the reservation. The call fails without side effects when
    /// `length` is zero, when the record (header included) cannot fit the
    /// byte region at all, or when the buffer currently lacks space for the
    /// record plus any wrap marker it would need.
    pub fn produce<F>(&self, length: usize, filler: F) -> bool
    where
        F: FnOnce(&mut [u8]) -> bool,
    {
        let rounded = round_up(length);
        if length == 0 || rounded + HEADER_SIZE > Self::SIZE {
            return false;
        }
        let need = (rounded + HEADER_SIZE) as u64;

        let consume_pos = self.consume_pos.load(Ordering::Acquire);
        let mut produce_pos = self.produce_pos.load(Ordering::Relaxed);

        if produce_pos - consume_pos > Self::SIZE as u64 - need {
            return false;
        }

        let wrap_distance = Self::SIZE as u64 - (produce_pos & Self::MASK);
        if wrap_distance < need {
            if produce_pos + wrap_distance - consume_pos > Self::SIZE as u64 - need {
                return false;
            }
            // SAFETY: the region `[produce_pos, produce_pos + wrap_distance)`
            // is unoccupied (checked above) and the offset is header-aligned.
            unsafe { self.write_header(produce_pos, -(wrap_distance as i64)) };
            produce_pos += wrap_distance;
        }

        // SAFETY: `[produce_pos, produce_pos + need)` is unoccupied and does
        // not cross the end of the byte region.
        unsafe {
            self.write_header(produce_pos, length as i64);
            let payload = slice::from_raw_parts_mut(
                self.buffer
                    .add((produce_pos & Self::MASK) as usize + HEADER_SIZE),
                length,
            );
            if filler(payload) {
                self.produce_pos
                    .store(produce_pos + need, Ordering::Release);
                return true;
            }
        }

        false
    }

    /// Peeks at the oldest record, if any, and passes its payload to
    /// `handler`. The record is released only when the handler returns
    /// `true`; otherwise the position does not move and the record will be
    /// seen again.
    pub fn consume<F>(&self, handler: F) -> bool
    where
        F: FnOnce(&[u8]) -> bool,
    {
        let mut consume_pos = self.consume_pos.load(Ordering::Relaxed);
        let produce_pos = self.produce_pos.load(Ordering::Acquire);

        if produce_pos == consume_pos {
            return false;
        }

        // SAFETY: positions differ, so a committed header exists at
        // `consume_pos`; a wrap marker is always followed by a real record
        // at the region origin.
        let mut length = unsafe { self.read_header(consume_pos) };
        if length < 0 {
            consume_pos += (-length) as u64;
            length = unsafe { self.read_header(consume_pos) };
        }

        // SAFETY: the committed record spans `length` bytes after its header.
        let payload = unsafe {
            slice::from_raw_parts(
                self.buffer
                    .add((consume_pos & Self::MASK) as usize + HEADER_SIZE),
                length as usize,
            )
        };

        if handler(payload) {
            self.consume_pos.store(
                consume_pos + (HEADER_SIZE + round_up(length as usize)) as u64,
                Ordering::Release,
            );
            return true;
        }

        false
    }

    /// Repeatedly consumes until the buffer observes empty, re-checking for
    /// records committed while draining. Returns `true` iff the final
    /// observation found the buffer empty; a handler rejection publishes the
    /// progress made so far and returns `false`.
    pub fn consume_all<F>(&self, mut handler: F) -> bool
    where
        F: FnMut(&[u8]) -> bool,
    {
        let mut consume_pos = self.consume_pos.load(Ordering::Relaxed);
        let mut produce_pos = self.produce_pos.load(Ordering::Acquire);

        if produce_pos == consume_pos {
            return true;
        }

        while consume_pos != produce_pos {
            while consume_pos != produce_pos {
                // SAFETY: as in `consume`.
                let mut length = unsafe { self.read_header(consume_pos) };
                if length < 0 {
                    consume_pos += (-length) as u64;
                    length = unsafe { self.read_header(consume_pos) };
                }

                // SAFETY: as in `consume`.
                let payload = unsafe {
                    slice::from_raw_parts(
                        self.buffer
                            .add((consume_pos & Self::MASK) as usize + HEADER_SIZE),
                        length as usize,
                    )
                };

                if !handler(payload) {
                    self.consume_pos.store(consume_pos, Ordering::Release);
                    return false;
                }

                consume_pos += (HEADER_SIZE + round_up(length as usize)) as u64;
            }

            produce_pos = self.produce_pos.load(Ordering::Acquire);
        }

        self.consume_pos.store(consume_pos, Ordering::Release);
        true
    }

    /// Snapshot emptiness check; not a synchronization point.
    pub fn is_empty(&self) -> bool {
        self.produce_pos.load(Ordering::Relaxed) == self.consume_pos.load(Ordering::Relaxed)
    }

    /// # Safety
    /// `pos & MASK` must be a header-aligned offset the caller may write.
    unsafe fn write_header(&self, pos: u64, value: i64) {
        ptr::write(
            self.buffer.add((pos & Self::MASK) as usize) as *mut i64,
            value,
        );
    }

    /// # Safety
    /// `pos & MASK` must be a header-aligned offset holding a committed
    /// header.
    unsafe fn read_header(&self, pos: u64) -> i64 {
        ptr::read(self.buffer.add((pos & Self::MASK) as usize) as *const i64)
    }
}

impl<const SIZE_LOG2: usize> Drop for SpscRingBuffer<SIZE_LOG2> {
    fn drop(&mut self) {
        // SAFETY: the layout matches the constructor's allocation.
        unsafe {
            let layout = Layout::from_size_align_unchecked(Self::SIZE, ALIGN);
            dealloc(self.buffer, layout);
        }
    }
}
