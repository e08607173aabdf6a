//! Pipeline stages for document conformity analysis.
//!
//! Each submodule implements exactly one transformation step and is
//! independently testable.
//!
//! ## Data Flow
//!
//! ```text
//! files ──▶ encode ──▶ inference ──▶ normalize ──▶ (caller) ──▶ report
//!           (base64)   (one POST)    (strict JSON)              (xlsx)
//! ```
//!
//! 1. [`encode`]   : read every file and base64-wrap it, order preserved
//! 2. [`inference`]: one `generateContent` request with the prompt and all
//!    documents; the only stage with network I/O
//! 3. [`normalize`]: strip code fences and validate the result shape
//! 4. [`report`]   : lay out the result and hand it to a spreadsheet writer

pub mod encode;
pub mod inference;
pub mod normalize;
pub mod report;
