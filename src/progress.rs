//! Progress reporting for mesh-to-PDF conversion.
//!
//! Each conversion stage reports a stage-local percentage (0–100). The
//! orchestrator maps it onto one global 0–100 scale with a fixed table of
//! disjoint ranges, so that a progress bar or the HTTP progress stream never
//! has to know which stage is running:
//!
//! ```text
//!  0        30    40    50    60    70                 100
//!  ├─upload──┼load─┼deci─┼norm─┼enc──┼──────embed────────┤complete
//! ```
//!
//! Inject an [`Arc<dyn ConversionProgressCallback>`] via
//! [`crate::config::ConversionConfigBuilder::progress_callback`] to receive
//! updates.
//!
//! # Example
//!
//! ```rust
//! use mesh2pdf::{ConversionConfig, ConversionProgressCallback, ProgressUpdate};
//! use std::sync::{Arc, atomic::{AtomicU8, Ordering}};
//!
//! struct LastPercent(AtomicU8);
//!
//! impl ConversionProgressCallback for LastPercent {
//!     fn on_progress(&self, update: &ProgressUpdate) {
//!         self.0.store(update.percent, Ordering::SeqCst);
//!     }
//! }
//!
//! let config = ConversionConfig::builder()
//!     .progress_callback(Arc::new(LastPercent(AtomicU8::new(0))))
//!     .build()
//!     .unwrap();
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

/// A conversion stage with its fixed slice of the global progress scale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    /// Receiving and storing the upload (HTTP service only).
    Upload,
    /// Reading the OBJ file.
    Load,
    /// Reducing the triangle count.
    Decimate,
    /// Recomputing vertex normals.
    Normals,
    /// Writing the U3D file.
    Encode,
    /// Typesetting the PDF around the U3D scene.
    Embed,
    /// Output confirmed on disk.
    Complete,
}

impl Stage {
    /// Global `[start, end)` range owned by this stage.
    pub const fn range(self) -> (u8, u8) {
        match self {
            Stage::Upload => (0, 30),
            Stage::Load => (30, 40),
            Stage::Decimate => (40, 50),
            Stage::Normals => (50, 60),
            Stage::Encode => (60, 70),
            Stage::Embed => (70, 100),
            Stage::Complete => (100, 100),
        }
    }

    /// Map a stage-local percentage onto the global scale.
    ///
    /// `local` is clamped to 0–100. A stage never reaches its `end` value;
    /// only [`Stage::Complete`] yields 100.
    pub fn global_percent(self, local: u8) -> u8 {
        let (start, end) = self.range();
        if start == end {
            return end;
        }
        let local = u32::from(local.min(100));
        let span = u32::from(end - start);
        let mapped = u32::from(start) + span * local / 100;
        (mapped as u8).min(end - 1)
    }

    /// Parse the stage names printed by external tools.
    pub fn from_tool_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "upload" => Some(Stage::Upload),
            "load" | "loading" => Some(Stage::Load),
            "decimate" | "decimation" | "simplify" => Some(Stage::Decimate),
            "normals" | "normal" => Some(Stage::Normals),
            "encode" | "export" | "write" => Some(Stage::Encode),
            "embed" | "pdf" | "latex" => Some(Stage::Embed),
            "complete" | "done" => Some(Stage::Complete),
            _ => None,
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Stage::Upload => "upload",
            Stage::Load => "load",
            Stage::Decimate => "decimate",
            Stage::Normals => "normals",
            Stage::Encode => "encode",
            Stage::Embed => "embed",
            Stage::Complete => "complete",
        };
        f.write_str(s)
    }
}

/// One progress event, already mapped to the global scale.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressUpdate {
    pub stage: Stage,
    /// Percentage within the stage, 0–100.
    pub stage_percent: u8,
    /// Percentage of the whole conversion, 0–100.
    pub percent: u8,
    pub message: String,
}

/// Receives progress from the conversion pipeline.
///
/// Implementations must be `Send + Sync`: the HTTP service invokes callbacks
/// from worker tasks while progress streams read the recorded state.
pub trait ConversionProgressCallback: Send + Sync {
    /// Called for every progress update. Percentages never decrease within
    /// one conversion.
    fn on_progress(&self, update: &ProgressUpdate);

    /// Called once if the conversion fails, with the error message.
    fn on_failure(&self, message: &str) {
        let _ = message;
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl ConversionProgressCallback for NoopProgressCallback {
    fn on_progress(&self, _update: &ProgressUpdate) {}
}

/// Convenience alias matching the type stored in [`crate::config::ConversionConfig`].
pub type ProgressCallback = Arc<dyn ConversionProgressCallback>;

/// Forwards stage events to a callback while enforcing monotonic progress.
///
/// Converters receive a `&StageReporter` rather than the raw callback, so an
/// out-of-order line from an external tool cannot move the bar backwards.
pub struct StageReporter {
    callback: Option<ProgressCallback>,
    high_water: AtomicU8,
}

impl StageReporter {
    pub fn new(callback: Option<ProgressCallback>) -> Self {
        Self {
            callback,
            high_water: AtomicU8::new(0),
        }
    }

    /// A reporter that discards everything.
    pub fn silent() -> Self {
        Self::new(None)
    }

    /// Report `local` percent of `stage`. Returns the global percentage
    /// actually published.
    pub fn report(&self, stage: Stage, local: u8, message: impl Into<String>) -> u8 {
        let mapped = stage.global_percent(local);
        let previous = self.high_water.fetch_max(mapped, Ordering::SeqCst);
        let percent = previous.max(mapped);

        if let Some(ref cb) = self.callback {
            cb.on_progress(&ProgressUpdate {
                stage,
                stage_percent: local.min(100),
                percent,
                message: message.into(),
            });
        }
        percent
    }

    /// Forward a failure to the callback.
    pub fn fail(&self, message: &str) {
        if let Some(ref cb) = self.callback {
            cb.on_failure(message);
        }
    }

    /// Highest global percentage published so far.
    pub fn percent(&self) -> u8 {
        self.high_water.load(Ordering::SeqCst)
    }
}
