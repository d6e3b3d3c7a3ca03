/// The fixed progress schedule a `RemoteProcess::execute` template publishes,
/// pinned exactly from the `REMOTE_JOB_PROGRESS_*` constants in the original
/// implementation. `START` is set by the engine before dispatch, not by the
/// adapter itself.
pub mod schedule {
    pub const START: u8 = 1;
    pub const PREPARE: u8 = 2;
    pub const READY: u8 = 5;
    pub const STAGE_IN: u8 = 10;
    pub const FORMAT_IO: u8 = 12;
    pub const EXECUTE: u8 = 15;
    pub const MONITOR: u8 = 20;
    pub const RESULTS: u8 = 85;
    pub const STAGE_OUT: u8 = 90;
    pub const CLEANUP: u8 = 95;
    pub const COMPLETED: u8 = 100;
}

/// The WPS-1 adapter's fixed polling cadence (seconds), repeating the final
/// value indefinitely once exhausted.
pub const WPS1_POLL_SCHEDULE_SECS: &[u64] = &[
    2, 2, 2, 2, 2, 5, 5, 5, 5, 5, 10, 10, 10, 10, 10, 20, 20, 20, 20, 20, 30,
];

pub fn wps1_poll_delay_secs(attempt: usize) -> u64 {
    WPS1_POLL_SCHEDULE_SECS
        .get(attempt)
        .copied()
        .unwrap_or(*WPS1_POLL_SCHEDULE_SECS.last().unwrap())
}

/// Remaps a 0-100 adapter-local progress value into the enclosing job's
/// step window `[lo, hi]`.
pub fn remap(progress: u8, lo: u8, hi: u8) -> u8 {
    let progress = progress.min(100) as u32;
    let lo = lo as u32;
    let hi = hi as u32;
    (lo + progress * (hi - lo) / 100) as u8
}

/// The `[lo, hi]` window step `k` of `n` (1-based) occupies within
/// `[cwl_start, cwl_done]`.
pub fn step_window(step_1based: u32, total_steps: u32, cwl_start: u8, cwl_done: u8) -> (u8, u8) {
    let total_steps = total_steps.max(1);
    let span = (cwl_done as u32 - cwl_start as u32) / total_steps;
    let lo = cwl_start as u32 + (step_1based - 1) * span;
    let hi = cwl_start as u32 + step_1based * span;
    (lo as u8, hi as u8)
}
