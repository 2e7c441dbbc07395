//! Best-effort, low-latency structured logging: producer threads enqueue
//! typed line segments into per-thread lock-free ring buffers, a dedicated
//! consumer thread drains, formats and writes them. Lines are dropped rather
//! than ever blocking a producer.

pub mod clock;
pub mod consumer;
pub mod logger;
pub mod number_format;
pub mod ring_buffer;
pub mod segment;
pub mod thread_registry;

pub use consumer::{do_logging, do_logging_to, DrainSummary};
pub use logger::{
    emergency_shutdown, enable, log_line, shutdown, ThreadBuffer, BUFFER_SIZE_LOG2, MAX_PRODUCERS,
};
pub use ring_buffer::SpscRingBuffer;
pub use segment::{
    fmt, Adaptive, Hex, IntoSegment, PadSign, Padding, Precision, Scientific, Segment, ShowPoint,
    ShowSign, Uppercase,
};
