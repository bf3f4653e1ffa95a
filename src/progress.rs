//! Progress reporting for long-running engine calls.
//!
//! Every stage that hands work to GDAL receives a `&mut dyn ProgressReporter`.
//! [`GdalProgress`] adapts that reporter to GDAL's `GDALProgressFunc`
//! callback so the same value observes translate, warp, statistics and
//! overview builds.

use std::ffi::{c_char, c_int, c_void};
use std::time::Instant;

use crate::utils::_string;

/// Receives progress updates from long-running operations.
pub trait ProgressReporter {
    /// Called when a named unit of work starts.
    fn begin(&mut self, _label: &str) {}

    /// `fraction` is in `0.0..=1.0`. Returning `false` asks GDAL to abort the
    /// running operation.
    fn update(&mut self, fraction: f64, message: &str) -> bool;
}

/// Discards all updates.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoProgress;

impl ProgressReporter for NoProgress {
    fn update(&mut self, _fraction: f64, _message: &str) -> bool {
        true
    }
}

/// Emits a `tracing` event each time another tenth of the current unit of work completes.
#[derive(Debug)]
pub struct LogProgress {
    label: String,
    started: Instant,
    last_decile: i32,
}

impl LogProgress {
    pub fn new() -> Self {
        Self {
            label: String::new(),
            started: Instant::now(),
            last_decile: -1,
        }
    }
}

impl Default for LogProgress {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressReporter for LogProgress {
    fn begin(&mut self, label: &str) {
        self.label = label.to_string();
        self.started = Instant::now();
        self.last_decile = -1;
    }

    fn update(&mut self, fraction: f64, message: &str) -> bool {
        let decile = (fraction.clamp(0.0, 1.0) * 10.0).floor() as i32;
        if decile > self.last_decile {
            self.last_decile = decile;
            tracing::info!(
                task = %self.label,
                percent = decile * 10,
                elapsed_ms = self.started.elapsed().as_millis() as u64,
                "{message}"
            );
        }
        true
    }
}

/// Bridges a [`ProgressReporter`] to a GDAL progress callback for one call.
pub(crate) struct GdalProgress<'r> {
    reporter: &'r mut dyn ProgressReporter,
}

impl<'r> GdalProgress<'r> {
    pub(crate) fn new(reporter: &'r mut dyn ProgressReporter) -> Self {
        Self { reporter }
    }

    pub(crate) fn callback(&self) -> gdal_sys::GDALProgressFunc {
        Some(progress_trampoline)
    }

    /// Opaque pointer handed to GDAL as `pProgressData`; valid while `self` is borrowed.
    pub(crate) fn user_data(&mut self) -> *mut c_void {
        &mut self.reporter as *mut &mut dyn ProgressReporter as *mut c_void
    }
}

unsafe extern "C" fn progress_trampoline(
    complete: f64,
    message: *const c_char,
    user_data: *mut c_void,
) -> c_int {
    if user_data.is_null() {
        return 1;
    }
    let reporter = &mut *(user_data as *mut &mut dyn ProgressReporter);
    let message = _string(message).unwrap_or_default();
    c_int::from(reporter.update(complete, &message))
}
