//! Progress-callback trait for conversion events.
//!
//! Inject an [`Arc<dyn ConversionProgressCallback>`] via
//! [`crate::config::ConversionConfigBuilder::progress_callback`] to observe the
//! fallback chain as it runs: each model attempt, each failure, the switch to
//! the non-AI converter, and the final result.
//!
//! # Example
//!
//! ```rust
//! use edgequake_pdf2docx::{ConversionConfig, ConversionProgressCallback};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct FailureCounter {
//!     failures: AtomicUsize,
//! }
//!
//! impl ConversionProgressCallback for FailureCounter {
//!     fn on_attempt_failed(&self, model: &str, _attempt: usize, error: String) {
//!         self.failures.fetch_add(1, Ordering::SeqCst);
//!         eprintln!("{model} failed: {error}");
//!     }
//! }
//!
//! let counter = Arc::new(FailureCounter { failures: AtomicUsize::new(0) });
//!
//! let config = ConversionConfig::builder()
//!     .progress_callback(counter as Arc<dyn ConversionProgressCallback>)
//!     .build()
//!     .unwrap();
//! ```

use crate::request::ConversionMode;
use std::sync::Arc;

/// Called by the conversion pipeline at each stage.
///
/// Implementations must be `Send + Sync`: independent conversions may share one
/// callback across tasks. All methods default to no-ops.
pub trait ConversionProgressCallback: Send + Sync {
    /// Called once, after the mode is known.
    fn on_conversion_start(&self, mode: ConversionMode) {
        let _ = mode;
    }

    /// Called before a model is invoked.
    ///
    /// # Arguments
    /// * `model`: model label, e.g. `gemini/gemini-2.5-flash`
    /// * `attempt`: 1-indexed attempt number
    /// * `total`: number of configured models
    fn on_attempt_start(&self, model: &str, attempt: usize, total: usize) {
        let _ = (model, attempt, total);
    }

    /// Called when an attempt fails (transport, timeout or schema error).
    fn on_attempt_failed(&self, model: &str, attempt: usize, error: String) {
        let _ = (model, attempt, error);
    }

    /// Called when a model produced a schema-valid extraction.
    ///
    /// # Arguments
    /// * `structure_nodes`: number of structural nodes
    /// * `content_items`: number of styled text runs
    fn on_extraction_complete(&self, model: &str, structure_nodes: usize, content_items: usize) {
        let _ = (model, structure_nodes, content_items);
    }

    /// Called when the pipeline switches to the non-AI converter.
    ///
    /// `reason` is `None` in `no_ocr` mode and the AI path's error otherwise.
    fn on_fallback(&self, reason: Option<String>) {
        let _ = reason;
    }

    /// Called once when a document was produced.
    fn on_conversion_complete(&self, document_uri_len: usize) {
        let _ = document_uri_len;
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl ConversionProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::ConversionConfig`].
pub type ProgressCallback = Arc<dyn ConversionProgressCallback>;

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    #[derive(Default)]
    struct RecordingCallback {
        events: Mutex<Vec<String>>,
    }

    impl ConversionProgressCallback for RecordingCallback {
        fn on_attempt_start(&self, model: &str, attempt: usize, total: usize) {
            self.events
                .lock()
                .push(format!("start {model} {attempt}/{total}"));
        }

        fn on_attempt_failed(&self, model: &str, _attempt: usize, error: String) {
            self.events.lock().push(format!("fail {model}: {error}"));
        }

        fn on_fallback(&self, reason: Option<String>) {
            self.events
                .lock()
                .push(format!("fallback {}", reason.unwrap_or_default()));
        }
    }

    #[test]
    fn noop_callback_does_not_panic() {
        let cb = NoopProgressCallback;
        cb.on_conversion_start(ConversionMode::Ocr);
        cb.on_attempt_start("m", 1, 2);
        cb.on_attempt_failed("m", 1, "boom".into());
        cb.on_extraction_complete("m", 3, 4);
        cb.on_fallback(None);
        cb.on_conversion_complete(100);
    }

    #[test]
    fn recording_callback_receives_events_in_order() {
        let cb = RecordingCallback::default();
        cb.on_attempt_start("primary", 1, 2);
        cb.on_attempt_failed("primary", 1, "HTTP 503".into());
        cb.on_attempt_start("secondary", 2, 2);
        cb.on_fallback(Some("all failed".into()));
        cb.on_extraction_complete("ignored", 0, 0);

        assert_eq!(
            *cb.events.lock(),
            vec![
                "start primary 1/2",
                "fail primary: HTTP 503",
                "start secondary 2/2",
                "fallback all failed",
            ]
        );
    }

    #[test]
    fn arc_dyn_callback_works() {
        let cb: ProgressCallback = Arc::new(NoopProgressCallback);
        cb.on_conversion_start(ConversionMode::NoOcr);
        cb.on_conversion_complete(1);
    }
}
