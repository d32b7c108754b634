use std::time::Instant;

/// Logs how long a labelled scope took once the guard is dropped.
pub struct LogDuration {
    id: String,
    start: Instant,
}

impl LogDuration {
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into(), start: Instant::now() }
    }

    pub fn elapsed_ms(&self) -> u128 {
        self.start.elapsed().as_millis()
    }
}

impl Drop for LogDuration {
    fn drop(&mut self) {
        tracing::info!(operation = %self.id, elapsed_ms = self.elapsed_ms(), "operation time");
    }
}

/// Times the rest of the enclosing scope: `log_duration!("search");`
#[macro_export]
macro_rules! log_duration {
    ($id:expr) => {
        let _log_duration_guard = $crate::log_duration::LogDuration::new($id);
    };
}
