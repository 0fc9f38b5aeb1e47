//! Scroll position tracking for long record lists
//!
//! Turns raw `(offset, content, viewport)` samples into the values a custom
//! scroll indicator binds to, and decides where the jump button goes.

use tokio::sync::watch;

/// Offset below which a list counts as scrolled to the top
pub const AT_TOP_THRESHOLD: f64 = 50.0;
/// Smallest indicator extent
pub const MIN_INDICATOR_EXTENT: f64 = 30.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScrollSample {
    pub offset: f64,
    pub content_extent: f64,
    pub viewport_extent: f64,
}

/// Derived display values for one sample
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScrollMetrics {
    pub at_top: bool,
    pub indicator_extent: f64,
    pub indicator_offset: f64,
}

impl ScrollMetrics {
    pub fn from_sample(sample: &ScrollSample) -> Self {
        let content = sample.content_extent.max(1.0);
        let viewport = sample.viewport_extent.max(0.0);

        let indicator_extent = (viewport * viewport / content).max(MIN_INDICATOR_EXTENT);
        let scrollable = (content - viewport).max(1.0);
        let track = (viewport - indicator_extent).max(0.0);
        let progress = (sample.offset / scrollable).clamp(0.0, 1.0);

        Self {
            at_top: sample.offset < AT_TOP_THRESHOLD,
            indicator_extent,
            indicator_offset: progress * track,
        }
    }
}

/// Where the jump button should scroll to
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ScrollCommand {
    ToStart,
    ToEnd { offset: f64 },
}

pub struct ScrollSyncController {
    sample: ScrollSample,
    metrics: watch::Sender<ScrollMetrics>,
}

impl ScrollSyncController {
    pub fn new() -> Self {
        let sample = ScrollSample {
            offset: 0.0,
            content_extent: 1.0,
            viewport_extent: 0.0,
        };
        let (metrics, _) = watch::channel(ScrollMetrics::from_sample(&sample));
        Self { sample, metrics }
    }

    /// Record a new sample and publish its metrics
    pub fn observe(&mut self, sample: ScrollSample) -> ScrollMetrics {
        self.sample = sample;
        let metrics = ScrollMetrics::from_sample(&sample);
        self.metrics.send_replace(metrics);
        metrics
    }

    pub fn metrics(&self) -> ScrollMetrics {
        *self.metrics.borrow()
    }

    /// Bindable feed of metrics updates
    pub fn watch(&self) -> watch::Receiver<ScrollMetrics> {
        self.metrics.subscribe()
    }

    /// Jump to the end when at the top, otherwise back to the start
    pub fn toggle(&self) -> ScrollCommand {
        if self.metrics().at_top {
            let end = (self.sample.content_extent.max(1.0) - self.sample.viewport_extent).max(0.0);
            ScrollCommand::ToEnd { offset: end }
        } else {
            ScrollCommand::ToStart
        }
    }
}

impl Default for ScrollSyncController {
    fn default() -> Self {
        Self::new()
    }
}
