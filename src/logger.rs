//! The producer-side surface: thread registration, the `log!` macro family,
//! and shutdown signalling.

use std::ptr;
use std::sync::atomic::{AtomicPtr, Ordering};

use crate::clock;
use crate::consumer::EMERGENCY;
use crate::ring_buffer::SpscRingBuffer;
use crate::segment::Segment;
use crate::thread_registry;

/// log2 of each producer's ring capacity in bytes (1 MiB).
pub const BUFFER_SIZE_LOG2: usize = 20;

/// Upper bound on registered producer threads; ids past it cannot publish.
pub const MAX_PRODUCERS: usize = 256;

/// Every line starts with an 8-byte tick header.
pub(crate) const LINE_HEADER_SIZE: usize = 8;

/// Tick header value marking "this producer has quiesced".
pub(crate) const SHUTDOWN_SENTINEL: u64 = u64::MAX;

/// Ring buffer type owned by each producer thread.
pub type ThreadBuffer = SpscRingBuffer<BUFFER_SIZE_LOG2>;

/// Producer id -> ring buffer handle. Producers install their buffer once;
/// the consumer reads handles with Acquire. Published buffers are never
/// freed, so a recycled id adopts its predecessor's buffer.
static THREAD_BUFFERS: [AtomicPtr<ThreadBuffer>; MAX_PRODUCERS] =
    [const { AtomicPtr::new(ptr::null_mut()) }; MAX_PRODUCERS];

pub(crate) fn buffer_for_thread(tid: u32) -> Option<&'static ThreadBuffer> {
    if tid == 0 || tid as usize >= MAX_PRODUCERS {
        return None;
    }
    let handle = THREAD_BUFFERS[tid as usize].load(Ordering::Acquire);
    // SAFETY: installed buffers stay alive for the rest of the process.
    unsafe { handle.as_ref() }
}

/// Registers the calling thread as a producer, allocating and publishing its
/// ring buffer if it does not have one yet. Returns `false` when the id
/// space is exhausted or the buffer cannot be allocated.
pub fn enable() -> bool {
    let tid = thread_registry::assign_current();
    if tid as usize >= MAX_PRODUCERS {
        return false;
    }

    let slot = &THREAD_BUFFERS[tid as usize];
    if !slot.load(Ordering::Relaxed).is_null() {
        return true;
    }

    let Some(buffer) = ThreadBuffer::new() else {
        return false;
    };
    let handle = Box::into_raw(Box::new(buffer));
    if slot
        .compare_exchange(ptr::null_mut(), handle, Ordering::AcqRel, Ordering::Acquire)
        .is_err()
    {
        // A previous owner of this recycled id already published a buffer.
        // SAFETY: `handle` was never published, this thread still owns it.
        unsafe { drop(Box::from_raw(handle)) };
    }
    true
}

/// Enqueues one line built from the given segments. Fails without side
/// effects when the thread is not enabled or its buffer lacks space; the
/// line is then dropped, which is the "best effort" in the name.
pub fn log_line<const N: usize>(segments: [Segment; N]) -> bool {
    let Some(buffer) = buffer_for_thread(thread_registry::id()) else {
        return false;
    };

    let mut length = LINE_HEADER_SIZE;
    for segment in &segments {
        length += segment.encoded_size();
    }

    buffer.produce(length, move |record| {
        record[..LINE_HEADER_SIZE].copy_from_slice(&clock::now().to_ne_bytes());
        let mut offset = LINE_HEADER_SIZE;
        for segment in segments {
            offset += segment.encode(&mut record[offset..]);
        }
        true
    })
}

/// Enqueues the shutdown sentinel for the calling thread. Returns `false`
/// when the buffer is full; callers may retry or fall back to
/// [`emergency_shutdown`].
pub fn shutdown() -> bool {
    let Some(buffer) = buffer_for_thread(thread_registry::id()) else {
        return false;
    };

    buffer.produce(LINE_HEADER_SIZE, |record| {
        record[..LINE_HEADER_SIZE].copy_from_slice(&SHUTDOWN_SENTINEL.to_ne_bytes());
        true
    })
}

/// Forces the drain loop to return within one pass, abandoning whatever is
/// still buffered. Never blocks.
pub fn emergency_shutdown() {
    EMERGENCY.store(true, Ordering::Release);
}

/// Enqueues one log line from the calling thread.
///
/// Every argument becomes one segment: string literals stay by-reference,
/// `String`s transfer their allocation, integers and floats are stored raw
/// and formatted by the consumer. Wrap a value in [`fmt`](crate::segment::fmt)
/// to attach formatting attributes. Evaluates to `false` when the line was
/// dropped.
#[macro_export]
macro_rules! log {
    ($($segment:expr),+ $(,)?) => {
        $crate::logger::log_line([$($crate::segment::IntoSegment::into_segment($segment)),+])
    };
}

/// `log!` with an `"[E] (<file>:<line>) "` prefix.
#[macro_export]
macro_rules! log_error {
    ($($segment:expr),+ $(,)?) => {
        $crate::log!(concat!("[E] (", file!(), ":", line!(), ") "), $($segment),+)
    };
}

/// `log!` with a `"[W] (<file>:<line>) "` prefix.
#[macro_export]
macro_rules! log_warn {
    ($($segment:expr),+ $(,)?) => {
        $crate::log!(concat!("[W] (", file!(), ":", line!(), ") "), $($segment),+)
    };
}

/// `log!` with an `"[I] (<file>:<line>) "` prefix.
#[macro_export]
macro_rules! log_info {
    ($($segment:expr),+ $(,)?) => {
        $crate::log!(concat!("[I] (", file!(), ":", line!(), ") "), $($segment),+)
    };
}

/// `log!` with a `"[D] (<file>:<line>) "` prefix. Evaluates to `true`
/// without enqueueing anything in release builds.
#[macro_export]
macro_rules! log_debug {
    ($($segment:expr),+ $(,)?) => {
        !cfg!(debug_assertions)
            || $crate::log!(concat!("[D] (", file!(), ":", line!(), ") "), $($segment),+)
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn logging_without_enable_fails_cleanly() {
        // This thread never called enable(); id 0 has no buffer slot.
        let done = std::thread::spawn(|| {
            assert!(!crate::log!("never stored"));
            assert!(!shutdown());
        });
        done.join().expect("join");
    }

    #[test]
    fn line_length_counts_header_and_all_segments() {
        use crate::segment::{IntoSegment, Segment};
        let segments: [Segment; 3] = [
            "a".into_segment(),
            1u8.into_segment(),
            1.0f32.into_segment(),
        ];
        let total: usize = segments.iter().map(Segment::encoded_size).sum();
        assert_eq!(total, 24 + 24 + 32);
    }
}
