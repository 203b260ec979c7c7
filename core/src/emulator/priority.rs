//! Real-time scheduling for the emulation thread
//!
//! - **macOS**: Mach time-constraint policy sized to the frame period
//! - **Linux**: `SCHED_FIFO` (needs `CAP_SYS_NICE` or an rtprio rlimit)
//!
//! Requested again whenever the tick length changes. Failure is never fatal.

use std::time::Duration;

use tracing::{debug, warn};

/// Result of a priority request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PriorityResult {
    Success,
    /// Non-fatal, the thread keeps its normal priority
    Failed,
    Unsupported,
}

/// Ask the OS to schedule the calling thread for a periodic real-time workload.
///
/// `computation` is the expected work per period and `constraint` the latest
/// it may finish; both are clamped so `computation <= constraint`.
pub fn request_realtime(period: Duration, computation: Duration, constraint: Duration) -> PriorityResult {
    let constraint = constraint.max(computation);
    let result = platform_request(period, computation, constraint);

    match result {
        PriorityResult::Success => {
            debug!("Emulation thread real-time for period {:?}", period);
        }
        PriorityResult::Failed => {
            warn!("Failed to set real-time thread priority (non-fatal)");
        }
        PriorityResult::Unsupported => {
            debug!("Real-time priority not supported on this platform");
        }
    }

    result
}

#[cfg(target_os = "macos")]
fn platform_request(period: Duration, computation: Duration, constraint: Duration) -> PriorityResult {
    use std::mem::MaybeUninit;

    const THREAD_TIME_CONSTRAINT_POLICY: u32 = 2;
    const THREAD_TIME_CONSTRAINT_POLICY_COUNT: u32 = 4;

    #[repr(C)]
    struct ThreadTimeConstraintPolicy {
        period: u32,
        computation: u32,
        constraint: u32,
        preemptible: i32,
    }

    #[repr(C)]
    struct MachTimebaseInfo {
        numer: u32,
        denom: u32,
    }

    unsafe extern "C" {
        fn mach_thread_self() -> u32;
        fn mach_timebase_info(info: *mut MachTimebaseInfo) -> i32;
        fn thread_policy_set(
            thread: u32,
            flavor: u32,
            policy_info: *const ThreadTimeConstraintPolicy,
            count: u32,
        ) -> i32;
    }

    let mut timebase = MaybeUninit::<MachTimebaseInfo>::uninit();
    // SAFETY: mach_timebase_info fills the struct and cannot fail on a live system.
    let timebase = unsafe {
        if mach_timebase_info(timebase.as_mut_ptr()) != 0 {
            return PriorityResult::Failed;
        }
        timebase.assume_init()
    };
    if timebase.numer == 0 {
        return PriorityResult::Failed;
    }

    let to_abs = |d: Duration| -> u32 {
        let ticks = d.as_nanos() * timebase.denom as u128 / timebase.numer as u128;
        ticks.min(u32::MAX as u128) as u32
    };

    let policy = ThreadTimeConstraintPolicy {
        period: to_abs(period),
        computation: to_abs(computation),
        constraint: to_abs(constraint),
        preemptible: 1,
    };

    // SAFETY: policy is a valid THREAD_TIME_CONSTRAINT_POLICY for the current thread.
    let result = unsafe {
        thread_policy_set(
            mach_thread_self(),
            THREAD_TIME_CONSTRAINT_POLICY,
            &policy,
            THREAD_TIME_CONSTRAINT_POLICY_COUNT,
        )
    };

    if result == 0 {
        PriorityResult::Success
    } else {
        debug!("thread_policy_set failed: {}", result);
        PriorityResult::Failed
    }
}

#[cfg(target_os = "linux")]
fn platform_request(_period: Duration, _computation: Duration, _constraint: Duration) -> PriorityResult {
    use libc::{SCHED_FIFO, pthread_self, pthread_setschedparam, sched_get_priority_max, sched_param};

    // SAFETY: querying the priority range has no side effects.
    let max = unsafe { sched_get_priority_max(SCHED_FIFO) };
    if max < 0 {
        return PriorityResult::Failed;
    }
    // Below the top of the range so kernel threads and audio servers still preempt us
    let param = sched_param {
        sched_priority: (max - 10).max(1),
    };

    // SAFETY: pthread_self is always valid for the calling thread.
    let result = unsafe { pthread_setschedparam(pthread_self(), SCHED_FIFO, &param) };
    if result == 0 {
        PriorityResult::Success
    } else {
        debug!("pthread_setschedparam(SCHED_FIFO) failed: {}", result);
        PriorityResult::Failed
    }
}

#[cfg(not(any(target_os = "macos", target_os = "linux")))]
fn platform_request(_period: Duration, _computation: Duration, _constraint: Duration) -> PriorityResult {
    PriorityResult::Unsupported
}
