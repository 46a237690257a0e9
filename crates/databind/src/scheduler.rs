use crate::watcher::WatcherId;
use indexmap::IndexMap;
use std::time::Duration;

/// Tolerance for frame timestamps arriving a little early.
const FRAME_SLACK: Duration = Duration::from_millis(1);

/// Coalesces invalidations into at most one flush per frame.
///
/// Invalidating the same watcher repeatedly between frames queues it once.
/// A flush takes the whole queue; anything invalidated while the flush runs
/// waits for the next frame.
#[derive(Debug)]
pub struct RenderScheduler {
    pending: IndexMap<WatcherId, u64>,
    frame_interval: Duration,
    last_flush: Option<Duration>,
    flushes: u64,
}

impl RenderScheduler {
    /// A zero interval disables frame gating.
    pub fn new(frame_interval: Duration) -> Self {
        Self {
            pending: IndexMap::new(),
            frame_interval,
            last_flush: None,
            flushes: 0,
        }
    }

    pub fn frame_interval(&self) -> Duration {
        self.frame_interval
    }

    /// Queues a watcher. Returns `false` if it was already queued.
    pub fn schedule(&mut self, id: WatcherId, sequence: u64) -> bool {
        self.pending.insert(id, sequence).is_none()
    }

    pub fn cancel(&mut self, id: WatcherId) -> bool {
        self.pending.swap_remove(&id).is_some()
    }

    pub fn is_pending(&self, id: WatcherId) -> bool {
        self.pending.contains_key(&id)
    }

    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Whether a frame at `now` may flush.
    pub fn frame_due(&self, now: Duration) -> bool {
        match self.last_flush {
            None => true,
            Some(last) => now.saturating_sub(last) + FRAME_SLACK >= self.frame_interval,
        }
    }

    pub fn mark_frame(&mut self, now: Duration) {
        self.last_flush = Some(now);
    }

    /// Empties the queue, returning the watchers in discovery order.
    pub fn take_batch(&mut self) -> Vec<WatcherId> {
        let mut batch = std::mem::take(&mut self.pending)
            .into_iter()
            .collect::<Vec<_>>();
        batch.sort_by_key(|(_, sequence)| *sequence);
        self.flushes += 1;
        batch.into_iter().map(|(id, _)| id).collect()
    }

    /// Number of batches taken so far.
    pub fn flushes(&self) -> u64 {
        self.flushes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::context::Scope;
    use crate::directive::{Directive, DirectiveKind};
    use crate::engine::Render;
    use crate::watcher::{Registry, TemplateId};
    use databind_scene::Document;

    fn watchers(count: usize) -> Vec<WatcherId> {
        let mut document = Document::new();
        let node = document.create_element("div");
        let mut registry = Registry::default();
        (0..count)
            .map(|_| {
                registry.create(
                    TemplateId(0),
                    node,
                    Directive {
                        kind: DirectiveKind::Prop,
                        marker: "propId".to_owned(),
                        expression: "id".to_owned(),
                        target: Some("id".to_owned()),
                    },
                    Scope::root(),
                    Render::Binding,
                )
            })
            .collect()
    }

    #[test]
    fn test_repeated_invalidations_queue_once() {
        let ids = watchers(1);
        let mut scheduler = RenderScheduler::new(EngineConfig::default().frame_interval());
        assert!(scheduler.schedule(ids[0], 0));
        assert!(!scheduler.schedule(ids[0], 0));
        assert_eq!(scheduler.take_batch(), vec![ids[0]]);
        assert!(!scheduler.has_pending());
    }

    #[test]
    fn test_batches_run_in_discovery_order() {
        let ids = watchers(3);
        let mut scheduler = RenderScheduler::new(EngineConfig::default().frame_interval());
        scheduler.schedule(ids[2], 2);
        scheduler.schedule(ids[0], 0);
        scheduler.schedule(ids[1], 1);
        scheduler.cancel(ids[1]);
        assert_eq!(scheduler.take_batch(), vec![ids[0], ids[2]]);
        assert_eq!(scheduler.flushes(), 1);
    }

    #[test]
    fn test_at_most_one_flush_per_frame() {
        let mut scheduler = RenderScheduler::new(EngineConfig::default().frame_interval());
        assert!(scheduler.frame_due(Duration::ZERO));
        scheduler.mark_frame(Duration::ZERO);
        assert!(!scheduler.frame_due(Duration::from_millis(5)));
        assert!(!scheduler.frame_due(Duration::from_millis(14)));
        assert!(scheduler.frame_due(Duration::from_millis(16)));
        assert!(scheduler.frame_due(Duration::from_millis(17)));
    }

    #[test]
    fn test_zero_frame_rate_never_gates() {
        let mut scheduler = RenderScheduler::new(Duration::ZERO);
        scheduler.mark_frame(Duration::from_millis(3));
        assert!(scheduler.frame_due(Duration::from_millis(3)));
    }
}
