//! Pointer input and the two controllers competing for it.
//!
//! [`orbit::OrbitControls`] moves the camera, [`drag::DragControls`] moves
//! props. [`arbiter::InteractionArbiter`] decides which of them receives each
//! pointer event.

use winit::{dpi::LogicalPosition, event::MouseButton};

pub mod arbiter;
pub mod drag;
pub mod orbit;

/// Pointer input in logical window pixels, already decoupled from the windowing events.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum PointerEvent {
    Pressed {
        button: MouseButton,
        position: LogicalPosition<f64>,
    },
    Moved {
        position: LogicalPosition<f64>,
    },
    Released {
        button: MouseButton,
        position: LogicalPosition<f64>,
    },
    /// Positive values scroll away from the user (zoom in).
    Wheel { delta: f32 },
}

impl PointerEvent {
    pub fn is_primary_press(&self) -> bool {
        matches!(
            self,
            PointerEvent::Pressed {
                button: MouseButton::Left,
                ..
            }
        )
    }
}
