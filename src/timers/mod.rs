//! Scheduled one-shot actions owned by a simulator.
//!
//! Polled once per tick against the actor clock. Cancelling removes the entry,
//! so a cancelled action can never fire late.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TimedAction {
    /// Re-latch a teleport press that arrived during cooldown
    TeleportCooldownFinished,
    /// Close the late-jump grace window after a wall-run
    LateJumpFinished,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TimerHandle(u64);

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
struct ScheduledEvent {
    handle: TimerHandle,
    fire_at: f32,
    action: TimedAction,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScheduledEvents {
    entries: Vec<ScheduledEvent>,
    next_id: u64,
}

impl ScheduledEvents {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn schedule(&mut self, fire_at: f32, action: TimedAction) -> TimerHandle {
        let handle = TimerHandle(self.next_id);
        self.next_id += 1;
        self.entries.push(ScheduledEvent {
            handle,
            fire_at,
            action,
        });
        handle
    }

    /// Replace any pending entry for `action`
    pub fn reschedule(&mut self, fire_at: f32, action: TimedAction) -> TimerHandle {
        self.cancel_action(action);
        self.schedule(fire_at, action)
    }

    pub fn cancel(&mut self, handle: TimerHandle) -> bool {
        let before = self.entries.len();
        self.entries.retain(|e| e.handle != handle);
        self.entries.len() != before
    }

    pub fn cancel_action(&mut self, action: TimedAction) -> usize {
        let before = self.entries.len();
        self.entries.retain(|e| e.action != action);
        before - self.entries.len()
    }

    pub fn is_pending(&self, action: TimedAction) -> bool {
        self.entries.iter().any(|e| e.action == action)
    }

    pub fn fire_time(&self, action: TimedAction) -> Option<f32> {
        self.entries
            .iter()
            .filter(|e| e.action == action)
            .map(|e| e.fire_at)
            .reduce(f32::min)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Remove and return every action due at `now`, earliest first
    pub fn poll(&mut self, now: f32) -> Vec<TimedAction> {
        let mut due: Vec<ScheduledEvent> = Vec::new();
        self.entries.retain(|e| {
            if e.fire_at <= now {
                due.push(*e);
                false
            } else {
                true
            }
        });
        due.sort_by(|a, b| a.fire_at.total_cmp(&b.fire_at).then(a.handle.0.cmp(&b.handle.0)));
        due.into_iter().map(|e| e.action).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_poll_fires_due_in_order() {
        let mut timers = ScheduledEvents::new();
        timers.schedule(2.0, TimedAction::LateJumpFinished);
        timers.schedule(1.0, TimedAction::TeleportCooldownFinished);
        timers.schedule(5.0, TimedAction::LateJumpFinished);

        assert!(timers.poll(0.5).is_empty());
        let fired = timers.poll(2.0);
        assert_eq!(
            fired,
            vec![TimedAction::TeleportCooldownFinished, TimedAction::LateJumpFinished]
        );
        assert_eq!(timers.len(), 1);
    }

    #[test]
    fn test_cancel_by_handle() {
        let mut timers = ScheduledEvents::new();
        let handle = timers.schedule(1.0, TimedAction::LateJumpFinished);
        assert!(timers.cancel(handle));
        assert!(!timers.cancel(handle));
        assert!(timers.poll(10.0).is_empty());
    }

    #[test]
    fn test_reschedule_replaces_pending() {
        let mut timers = ScheduledEvents::new();
        timers.schedule(1.0, TimedAction::TeleportCooldownFinished);
        timers.reschedule(3.0, TimedAction::TeleportCooldownFinished);
        assert_eq!(timers.len(), 1);
        assert_eq!(timers.fire_time(TimedAction::TeleportCooldownFinished), Some(3.0));
        assert!(timers.poll(2.0).is_empty());
    }

    #[test]
    fn test_cancel_action() {
        let mut timers = ScheduledEvents::new();
        timers.schedule(1.0, TimedAction::LateJumpFinished);
        timers.schedule(1.5, TimedAction::TeleportCooldownFinished);
        assert_eq!(timers.cancel_action(TimedAction::LateJumpFinished), 1);
        assert!(!timers.is_pending(TimedAction::LateJumpFinished));
        assert!(timers.is_pending(TimedAction::TeleportCooldownFinished));
    }
}
