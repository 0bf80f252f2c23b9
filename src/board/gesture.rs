//! Threshold-gated drag recognition.
//!
//! A press only becomes a drag once it clears an activation constraint:
//! pointer input must travel a minimum distance, touch input must be held
//! for a short delay while staying inside a movement tolerance (so the
//! gesture never hijacks a scroll). Releases over a slot produce a drop
//! event; everything else discards the gesture without mutating anything.

use crate::core::config::GestureSettings;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum PointerKind {
    Mouse,
    Touch,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum DragState {
    Idle,
    Pending,
    Active,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct DropEvent {
    pub(crate) item_id: String,
    pub(crate) slot_id: String,
}

#[derive(Debug)]
enum Tracking {
    Idle,
    Pending { kind: PointerKind, item_id: String, origin: (f64, f64), pressed_at_ms: u64 },
    Active { item_id: String },
}

#[derive(Debug)]
pub(crate) struct DragRecognizer {
    pointer_distance_px: f64,
    touch_delay_ms: u64,
    touch_tolerance_px: f64,
    tracking: Tracking,
}

impl DragRecognizer {
    pub(crate) fn new(settings: &GestureSettings) -> Self {
        Self {
            pointer_distance_px: settings.pointer_distance_px,
            touch_delay_ms: settings.touch_delay_ms,
            touch_tolerance_px: settings.touch_tolerance_px,
            tracking: Tracking::Idle,
        }
    }

    /// Starts tracking a press on a draggable item. A new press always
    /// replaces whatever was tracked before; input devices only ever deliver
    /// one active pointer.
    pub(crate) fn press(&mut self, kind: PointerKind, item_id: &str, x: f64, y: f64, at_ms: u64) {
        self.tracking = Tracking::Pending {
            kind,
            item_id: item_id.to_string(),
            origin: (x, y),
            pressed_at_ms: at_ms,
        };
    }

    pub(crate) fn moved(&mut self, x: f64, y: f64, at_ms: u64) -> DragState {
        let tracking = std::mem::replace(&mut self.tracking, Tracking::Idle);
        let (next, state) = match tracking {
            Tracking::Idle => (Tracking::Idle, DragState::Idle),
            Tracking::Active { item_id } => (Tracking::Active { item_id }, DragState::Active),
            Tracking::Pending { kind, item_id, origin, pressed_at_ms } => {
                let travelled = distance(origin, (x, y));
                match kind {
                    PointerKind::Mouse if travelled >= self.pointer_distance_px => {
                        (Tracking::Active { item_id }, DragState::Active)
                    }
                    PointerKind::Touch => {
                        let held_ms = at_ms.saturating_sub(pressed_at_ms);
                        if held_ms >= self.touch_delay_ms {
                            (Tracking::Active { item_id }, DragState::Active)
                        } else if travelled > self.touch_tolerance_px {
                            // The finger is scrolling, not dragging.
                            (Tracking::Idle, DragState::Idle)
                        } else {
                            (
                                Tracking::Pending { kind, item_id, origin, pressed_at_ms },
                                DragState::Pending,
                            )
                        }
                    }
                    _ => (
                        Tracking::Pending { kind, item_id, origin, pressed_at_ms },
                        DragState::Pending,
                    ),
                }
            }
        };
        self.tracking = next;
        state
    }

    /// Timer hook for the touch press-delay: promotes a held press once the
    /// delay elapses with the finger staying put.
    pub(crate) fn poll(&mut self, at_ms: u64) -> DragState {
        let tracking = std::mem::replace(&mut self.tracking, Tracking::Idle);
        let (next, state) = match tracking {
            Tracking::Pending { kind: PointerKind::Touch, item_id, origin: _, pressed_at_ms }
                if at_ms.saturating_sub(pressed_at_ms) >= self.touch_delay_ms =>
            {
                (Tracking::Active { item_id }, DragState::Active)
            }
            other => {
                let state = match &other {
                    Tracking::Idle => DragState::Idle,
                    Tracking::Pending { .. } => DragState::Pending,
                    Tracking::Active { .. } => DragState::Active,
                };
                (other, state)
            }
        };
        self.tracking = next;
        state
    }

    /// Ends the gesture. A drop event is produced only when the drag had
    /// activated and the release happened over a slot.
    pub(crate) fn release(&mut self, over_slot: Option<&str>) -> Option<DropEvent> {
        let tracking = std::mem::replace(&mut self.tracking, Tracking::Idle);
        match (tracking, over_slot) {
            (Tracking::Active { item_id }, Some(slot_id)) => {
                Some(DropEvent { item_id, slot_id: slot_id.to_string() })
            }
            _ => None,
        }
    }

    pub(crate) fn cancel(&mut self) {
        self.tracking = Tracking::Idle;
    }

    pub(crate) fn state(&self) -> DragState {
        match self.tracking {
            Tracking::Idle => DragState::Idle,
            Tracking::Pending { .. } => DragState::Pending,
            Tracking::Active { .. } => DragState::Active,
        }
    }
}

fn distance(from: (f64, f64), to: (f64, f64)) -> f64 {
    let dx = to.0 - from.0;
    let dy = to.1 - from.1;
    (dx * dx + dy * dy).sqrt()
}
