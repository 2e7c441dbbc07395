#[cfg(target_arch = "x86_64")]
use std::arch::x86_64::_rdtsc;

use lazy_static::lazy_static;

/// Returns the current value of the monotonic tick counter with the highest
/// precision available for the architecture.
#[inline(always)]
pub fn now() -> u64 {
    #[cfg(target_arch = "x86_64")]
    unsafe {
        _rdtsc()
    }

    #[cfg(target_arch = "aarch64")]
    unsafe {
        let mut value: u64;
        std::arch::asm!("mrs {}, cntvct_el0", out(reg) value);
        value
    }

    #[cfg(not(any(target_arch = "x86_64", target_arch = "aarch64")))]
    {
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_nanos() as u64)
            .unwrap_or(0)
    }
}

/// Ticks per second of the counter behind [`now`]. Measured once on first use
/// and cached for the lifetime of the process.
pub fn freq() -> u64 {
    *TICKS_PER_SECOND
}

lazy_static! {
    static ref TICKS_PER_SECOND: u64 = measure_frequency();
}

#[cfg(target_arch = "aarch64")]
fn measure_frequency() -> u64 {
    // The generic timer exposes its frequency directly.
    unsafe {
        let mut value: u64;
        std::arch::asm!("mrs {}, cntfrq_el0", out(reg) value);
        value
    }
}

#[cfg(not(target_arch = "aarch64"))]
fn measure_frequency() -> u64 {
    let wall = std::time::Instant::now();
    let first = now();
    std::thread::sleep(std::time::Duration::from_millis(20));
    let ticks = now().wrapping_sub(first);
    let nanos = wall.elapsed().as_nanos().max(1);
    ((ticks as u128 * 1_000_000_000) / nanos).max(1) as u64
}
