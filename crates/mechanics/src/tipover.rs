use log::info;
use simcore::Model;

use crate::stability::TipoverCause;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TipoverStatus {
    #[default]
    Upright,
    /// Terminal until an explicit reset
    TippedOver,
}

/// Snapshot taken when the tipover condition was detected.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TipoverEvent {
    pub cause: TipoverCause,
    pub speed: f64,
    pub lean_angle: f64,
    pub threshold: f64,
}

/// Two-state fall detector.
///
/// `trip` hands back the event only on the Upright -> TippedOver transition,
/// so a breach that persists across ticks is reported once.
#[derive(Debug, Clone, Default)]
pub struct TipoverFsm {
    status: TipoverStatus,
    transitions: u64,
}

impl TipoverFsm {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn status(&self) -> TipoverStatus {
        self.status
    }

    pub fn is_tipped_over(&self) -> bool {
        self.status == TipoverStatus::TippedOver
    }

    /// Number of Upright -> TippedOver transitions since construction.
    pub fn transitions(&self) -> u64 {
        self.transitions
    }

    /// Raises the tipover condition; returns the notification if this tick caused the fall.
    pub fn trip(&mut self, event: TipoverEvent) -> Option<TipoverEvent> {
        if self.is_tipped_over() {
            return None;
        }

        self.status = TipoverStatus::TippedOver;
        self.transitions += 1;
        info!(
            "Bicycle tipped over ({:?}): speed {:.2}, lean {:.2}°, threshold {:.2}°",
            event.cause, event.speed, event.lean_angle, event.threshold
        );
        Some(event)
    }
}

impl Model for TipoverFsm {
    fn reset(&mut self) {
        self.status = TipoverStatus::Upright;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event() -> TipoverEvent {
        TipoverEvent {
            cause: TipoverCause::Threshold,
            speed: 15.0,
            lean_angle: 61.0,
            threshold: 60.0,
        }
    }

    #[test]
    fn test_starts_upright() {
        assert_eq!(TipoverFsm::new().status(), TipoverStatus::Upright);
    }

    #[test]
    fn test_notifies_once_while_breach_persists() {
        let mut fsm = TipoverFsm::new();
        let notifications = (0..50).filter_map(|_| fsm.trip(event())).count();

        assert_eq!(notifications, 1);
        assert_eq!(fsm.transitions(), 1);
        assert!(fsm.is_tipped_over());
    }

    #[test]
    fn test_reset_rearms_notification() {
        let mut fsm = TipoverFsm::new();
        assert!(fsm.trip(event()).is_some());
        fsm.reset();
        assert_eq!(fsm.status(), TipoverStatus::Upright);
        assert!(fsm.trip(event()).is_some());
        assert_eq!(fsm.transitions(), 2);
    }
}
