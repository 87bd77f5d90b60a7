use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Tunables for one feed. Every field has a default, so a config file only
/// needs to name what it changes.
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct RollupConfig {
    /// Messages requested per backward page.
    pub batch_limit: usize,
    /// Coalescing window of the displayed update counter.
    pub throttle_ms: u64,
    /// The spinner stays up while fewer than this many items are queued.
    pub loading_queue_threshold: usize,
    /// Scroll offsets below this count as "at the top".
    pub top_threshold: f64,
    /// Distance from the end of the content that counts as "near the bottom".
    pub bottom_threshold: f64,
    /// Parallel root and reply lookups.
    pub lookup_concurrency: usize,
    /// Items fetched ahead of rendering before the scan pauses.
    pub queue_high_water: usize,
    /// Items rendered for the first screen.
    pub initial_render: usize,
    /// Items rendered each time the view nears the bottom.
    pub render_step: usize,
    /// Replies shown inline under a root.
    pub reply_previews: usize,
    /// Highlighted replies needed before "view full thread" anchors at the first new one.
    pub highlight_anchor_min: usize,
}

impl RollupConfig {
    pub fn throttle(&self) -> Duration {
        Duration::from_millis(self.throttle_ms)
    }
}

impl Default for RollupConfig {
    fn default() -> Self {
        Self {
            batch_limit: 50,
            throttle_ms: 200,
            loading_queue_threshold: 5,
            top_threshold: 20.0,
            bottom_threshold: 200.0,
            lookup_concurrency: 8,
            queue_high_water: 10,
            initial_render: 10,
            render_step: 5,
            reply_previews: 3,
            highlight_anchor_min: 3,
        }
    }
}
