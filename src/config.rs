//! Engine configuration threaded through accessor construction.

/// Tunables for the versioned-object core.
///
/// A copy of this value is handed to every accessor at construction; there is
/// no process-wide configuration state.
#[derive(Clone, Copy, Debug)]
pub struct Config {
    /// Whether edges carry a property map. When off, edge property writes
    /// fail with `PropertiesDisabled` and edge property reads yield nothing.
    pub properties_on_edges: bool,
    /// Committed writes per object between anchor snapshots.
    pub anchor_interval: u64,
    /// Whether anchor snapshots are captured into the transaction archive.
    pub anchor_snapshots: bool,
    /// Whether committed-edit notifications are appended to the transaction
    /// change buffer.
    pub change_feed: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            properties_on_edges: true,
            anchor_interval: 64,
            anchor_snapshots: true,
            change_feed: false,
        }
    }
}

impl Config {
    /// Enables or disables edge properties.
    pub fn properties_on_edges(mut self, enabled: bool) -> Self {
        self.properties_on_edges = enabled;
        self
    }

    /// Sets the number of committed writes between anchor snapshots.
    pub fn anchor_interval(mut self, interval: u64) -> Self {
        self.anchor_interval = interval;
        self
    }

    /// Enables or disables anchor snapshot capture.
    pub fn anchor_snapshots(mut self, enabled: bool) -> Self {
        self.anchor_snapshots = enabled;
        self
    }

    /// Enables or disables the change-notification buffer.
    pub fn change_feed(mut self, enabled: bool) -> Self {
        self.change_feed = enabled;
        self
    }
}
