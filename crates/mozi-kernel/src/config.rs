//! Tuning knobs the kernel needs at construction time. Deliberately a local,
//! dependency-free struct rather than a dependency on the config loader
//! crate: the process-wiring binary is the only place that needs to know
//! about both layered TOML config and the kernel's constructor.

use mozi_core::handler::AdmissionMode;

/// Admission and pump tuning for a [`crate::Kernel`].
#[derive(Debug, Clone)]
pub struct KernelTuning {
    /// Which of the five admission modes governs `enqueue_inbound`.
    pub mode: AdmissionMode,
    /// Width of the collect-mode merge window, in milliseconds.
    pub collect_window_ms: i64,
    /// Maximum pending queue items per session; `None` disables the cap.
    pub max_backlog: Option<u32>,
    /// Pump poll interval when no wakeup arrives sooner, in milliseconds.
    pub poll_interval_ms: u64,
}

impl Default for KernelTuning {
    fn default() -> Self {
        Self { mode: AdmissionMode::default(), collect_window_ms: 400, max_backlog: None, poll_interval_ms: 250 }
    }
}
