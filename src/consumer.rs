//! The drain loop: a single consumer thread that visits every published
//! producer buffer round-robin, decodes one line per buffer per pass, and
//! writes formatted bytes to the sink.

use std::io::{self, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

use crate::clock;
use crate::logger::{self, LINE_HEADER_SIZE, MAX_PRODUCERS, SHUTDOWN_SENTINEL};
use crate::number_format::{format_float, format_integer, INT_SCRATCH};
use crate::segment::{
    read_u64, FloatAttributes, IntAttributes, FLOAT_SEGMENT_SIZE, INT_SEGMENT_SIZE,
    LITERAL_SEGMENT_SIZE, OWNED_SEGMENT_SIZE, TAG_FLOAT, TAG_INT, TAG_LITERAL, TAG_OWNED,
    UNTERMINATED,
};
use crate::thread_registry;

/// Empty polling rounds in the spin state before the loop starts sleeping.
pub const SPIN_MAX: u32 = 2000;

/// Sleep per empty round once spinning has given up.
pub const SLEEP_MS: u64 = 100;

/// Raised by `emergency_shutdown`; the loop returns within one pass without
/// draining further. Cleared when a drain run starts.
pub(crate) static EMERGENCY: AtomicBool = AtomicBool::new(false);

/// How a drain run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DrainSummary {
    /// The run was cut short by `emergency_shutdown`; records may remain.
    pub emergency: bool,
    /// Distinct producers whose shutdown sentinel was observed.
    pub quiesced_producers: usize,
}

enum BackOff {
    Spin,
    Sleep,
}

enum LineOutcome {
    Line,
    ShutdownMarker,
}

/// Runs the drain loop against standard output. Returns after a shutdown
/// sentinel has been observed and every buffer reads empty, or as soon as
/// the emergency flag is raised.
pub fn do_logging() -> DrainSummary {
    do_logging_to(io::stdout().lock())
}

/// Runs the drain loop against an arbitrary sink. Sink errors are the
/// sink's responsibility and do not stop the loop.
pub fn do_logging_to<W: Write>(mut sink: W) -> DrainSummary {
    EMERGENCY.store(false, Ordering::Relaxed);
    thread_registry::assign_current();

    let inv_freq = 1.0 / clock::freq() as f64;
    let start_tick = clock::now();

    let mut state = BackOff::Spin;
    let mut spin_counter: u32 = 0;
    let mut shutdown_requested = false;
    let mut quiesced = [false; MAX_PRODUCERS];
    let mut quiesced_count = 0usize;
    let mut float_scratch = String::new();

    loop {
        if EMERGENCY.load(Ordering::Acquire) {
            return DrainSummary {
                emergency: true,
                quiesced_producers: quiesced_count,
            };
        }

        let mut all_empty = true;
        let max_id = thread_registry::max_assigned().min(MAX_PRODUCERS as u32);
        for id in 0..max_id {
            let Some(buffer) = logger::buffer_for_thread(id) else {
                continue;
            };

            let consumed = buffer.consume(|payload| {
                let outcome =
                    drain_record(id, payload, start_tick, inv_freq, &mut sink, &mut float_scratch);
                if let LineOutcome::ShutdownMarker = outcome {
                    shutdown_requested = true;
                    if !quiesced[id as usize] {
                        quiesced[id as usize] = true;
                        quiesced_count += 1;
                    }
                }
                true
            });

            if consumed {
                all_empty = false;
            }
        }

        if all_empty {
            if shutdown_requested {
                return DrainSummary {
                    emergency: false,
                    quiesced_producers: quiesced_count,
                };
            }
            match state {
                BackOff::Spin => {
                    spin_counter += 1;
                    if spin_counter >= SPIN_MAX {
                        state = BackOff::Sleep;
                    }
                }
                BackOff::Sleep => thread::sleep(Duration::from_millis(SLEEP_MS)),
            }
        } else {
            spin_counter = 0;
            state = BackOff::Spin;
        }
    }
}

/// Decodes one ring record: either a shutdown marker or a line, in which
/// case the prefix and every segment are written to the sink.
fn drain_record<W: Write>(
    id: u32,
    payload: &[u8],
    start_tick: u64,
    inv_freq: f64,
    sink: &mut W,
    float_scratch: &mut String,
) -> LineOutcome {
    let tick = read_u64(payload, 0);
    if tick == SHUTDOWN_SENTINEL {
        return LineOutcome::ShutdownMarker;
    }

    // Signed difference: lines enqueued before the drain started render as
    // small negative offsets instead of wrapping.
    let seconds = tick.wrapping_sub(start_tick) as i64 as f64 * inv_freq;
    let _ = write!(sink, "\n[{}] {:13.6}: ", id, seconds);

    let mut segments = &payload[LINE_HEADER_SIZE..];
    let mut int_scratch = [0u8; INT_SCRATCH];
    while !segments.is_empty() {
        let consumed = drain_segment(segments, sink, &mut int_scratch, float_scratch);
        if consumed == 0 {
            break;
        }
        segments = &segments[consumed..];
    }

    LineOutcome::Line
}

/// Writes one segment to the sink and returns its encoded size, or 0 when
/// the bytes do not hold a well-formed segment.
fn drain_segment<W: Write>(
    bytes: &[u8],
    sink: &mut W,
    int_scratch: &mut [u8; INT_SCRATCH],
    float_scratch: &mut String,
) -> usize {
    if bytes.len() < 8 {
        return 0;
    }

    match read_u64(bytes, 0) {
        TAG_LITERAL if bytes.len() >= LITERAL_SEGMENT_SIZE => {
            let addr = read_u64(bytes, 8) as *const u8;
            let len = read_u64(bytes, 16);
            // SAFETY: literal segments reference `'static` bytes; an
            // unterminated one is NUL-terminated by construction.
            let text = unsafe {
                if len == UNTERMINATED {
                    let mut scan = 0usize;
                    while *addr.add(scan) != 0 {
                        scan += 1;
                    }
                    std::slice::from_raw_parts(addr, scan)
                } else {
                    std::slice::from_raw_parts(addr, len as usize)
                }
            };
            let _ = sink.write_all(text);
            LITERAL_SEGMENT_SIZE
        }
        TAG_OWNED if bytes.len() >= OWNED_SEGMENT_SIZE => {
            let ptr = read_u64(bytes, 8) as *mut u8;
            let len = read_u64(bytes, 16) as usize;
            let capacity = read_u64(bytes, 24) as usize;
            // SAFETY: the producer transferred this allocation into the
            // record at enqueue time; nobody else will reclaim it.
            let string = unsafe { String::from_raw_parts(ptr, len, capacity) };
            let _ = sink.write_all(string.as_bytes());
            OWNED_SEGMENT_SIZE
        }
        TAG_INT if bytes.len() >= INT_SEGMENT_SIZE => {
            let attrs = IntAttributes(read_u64(bytes, 8));
            let mut raw = [0u8; 8];
            raw.copy_from_slice(&bytes[16..24]);
            let len = format_integer(attrs, &raw, int_scratch);
            let _ = sink.write_all(&int_scratch[..len]);
            INT_SEGMENT_SIZE
        }
        TAG_FLOAT if bytes.len() >= FLOAT_SEGMENT_SIZE => {
            let attrs = FloatAttributes(read_u64(bytes, 8));
            let mut raw = [0u8; 16];
            raw.copy_from_slice(&bytes[16..32]);
            float_scratch.clear();
            format_float(attrs, &raw, float_scratch);
            let _ = sink.write_all(float_scratch.as_bytes());
            FLOAT_SEGMENT_SIZE
        }
        _ => 0,
    }
}
