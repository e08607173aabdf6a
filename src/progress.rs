//! Progress-callback trait for analysis pipeline events.
//!
//! Inject an [`Arc<dyn AnalysisProgressCallback>`] via
//! [`crate::config::AnalysisConfigBuilder::progress_callback`] to observe each
//! stage. The CLI uses it to drive a spinner; a server could forward the
//! events to a websocket. The trait is `Send + Sync` because files are
//! encoded concurrently.
//!
//! # Example
//!
//! ```rust
//! use verifica_itp::{AnalysisConfig, AnalysisProgressCallback};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct CountingCallback {
//!     encoded: AtomicUsize,
//! }
//!
//! impl AnalysisProgressCallback for CountingCallback {
//!     fn on_file_encoded(&self, _index: usize, name: &str, bytes: usize) {
//!         self.encoded.fetch_add(1, Ordering::SeqCst);
//!         eprintln!("{name}: {bytes} bytes");
//!     }
//! }
//!
//! let cb = Arc::new(CountingCallback { encoded: AtomicUsize::new(0) });
//! let config = AnalysisConfig::builder()
//!     .progress_callback(cb as Arc<dyn AnalysisProgressCallback>)
//!     .build()
//!     .unwrap();
//! ```

use std::sync::Arc;

/// Called by the pipeline as an analysis moves through its stages.
///
/// All methods default to no-ops so implementors override only what they need.
/// `on_file_encoded` may be called from concurrently running encode tasks and
/// in completion order, not input order.
pub trait AnalysisProgressCallback: Send + Sync {
    /// Called once validation has passed, before any file is read.
    fn on_analysis_start(&self, total_files: usize) {
        let _ = total_files;
    }

    /// Called when one file has been read and base64-encoded.
    ///
    /// `index` is the file's 0-based position in the input list and `bytes`
    /// its raw (pre-encoding) size.
    fn on_file_encoded(&self, index: usize, name: &str, bytes: usize) {
        let _ = (index, name, bytes);
    }

    /// Called just before the inference request goes out.
    fn on_request_sent(&self, parts: usize) {
        let _ = parts;
    }

    /// Called when the provider returned a text candidate.
    fn on_response_received(&self, text_len: usize) {
        let _ = text_len;
    }

    /// Called after the result has been normalised.
    fn on_analysis_complete(&self, conforme: bool) {
        let _ = conforme;
    }

    /// Called when any stage after validation fails.
    fn on_analysis_error(&self, message: &str) {
        let _ = message;
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl AnalysisProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::AnalysisConfig`].
pub type ProgressCallback = Arc<dyn AnalysisProgressCallback>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct TrackingCallback {
        encoded: AtomicUsize,
        sent_parts: AtomicUsize,
        errors: AtomicUsize,
    }

    impl AnalysisProgressCallback for TrackingCallback {
        fn on_file_encoded(&self, _index: usize, _name: &str, _bytes: usize) {
            self.encoded.fetch_add(1, Ordering::SeqCst);
        }

        fn on_request_sent(&self, parts: usize) {
            self.sent_parts.store(parts, Ordering::SeqCst);
        }

        fn on_analysis_error(&self, _message: &str) {
            self.errors.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn noop_callback_does_not_panic() {
        let cb = NoopProgressCallback;
        cb.on_analysis_start(2);
        cb.on_file_encoded(0, "a.pdf", 10);
        cb.on_request_sent(3);
        cb.on_response_received(42);
        cb.on_analysis_complete(true);
        cb.on_analysis_error("boom");
    }

    #[test]
    fn tracking_callback_receives_events() {
        let tracker = TrackingCallback::default();
        tracker.on_file_encoded(0, "a.pdf", 1);
        tracker.on_file_encoded(1, "b.pdf", 2);
        tracker.on_request_sent(3);
        tracker.on_analysis_error("quota exceeded");

        assert_eq!(tracker.encoded.load(Ordering::SeqCst), 2);
        assert_eq!(tracker.sent_parts.load(Ordering::SeqCst), 3);
        assert_eq!(tracker.errors.load(Ordering::SeqCst), 1);
    }
}
