use tracing::info;

/// Receives progress while downloads run.
pub trait ProgressSink: Send {
    /// `fraction` is in `[0, 1]` and never decreases within one resolution.
    fn report_progress(&mut self, fraction: f64);

    fn report_complete(&mut self);

    /// Polled between progress reports; `true` aborts the resolution.
    fn close_requested(&self) -> bool {
        false
    }
}

/// Logs whole-percent progress changes.
#[derive(Debug, Default)]
pub struct LogProgressSink {
    last_percent: Option<u32>,
}

impl ProgressSink for LogProgressSink {
    fn report_progress(&mut self, fraction: f64) {
        let percent = (fraction.clamp(0.0, 1.0) * 100.0).floor() as u32;
        if self.last_percent != Some(percent) {
            info!("Progress: {}%", percent);
            self.last_percent = Some(percent);
        }
    }

    fn report_complete(&mut self) {
        info!("All jars resolved");
    }
}
