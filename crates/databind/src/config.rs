use serde::Deserialize;
use std::time::Duration;

/// Engine settings. Every field has a default, so a partial document
/// such as `{"frame_rate": 30}` deserializes.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Flushes per second at most; `0` flushes on every tick.
    pub frame_rate: u32,
    /// Name under which a repeated item is visible to its template.
    pub item_name: String,
    pub index_name: String,
    /// Name of the extra argument event handlers receive.
    pub event_name: String,
    /// Diagnostics kept until the host drains them; older ones are dropped.
    pub diagnostic_limit: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            frame_rate: 60,
            item_name: "item".to_owned(),
            index_name: "index".to_owned(),
            event_name: "event".to_owned(),
            diagnostic_limit: 256,
        }
    }
}

impl EngineConfig {
    pub fn frame_interval(&self) -> Duration {
        if self.frame_rate == 0 {
            Duration::ZERO
        } else {
            Duration::from_secs_f64(1.0 / f64::from(self.frame_rate))
        }
    }
}
