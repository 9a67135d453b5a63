use log::{debug, warn};

use crate::{
    controls::{
        PointerEvent,
        drag::{DragController, DragEvent, DragView},
        orbit::NavigationController,
    },
    data_structures::scene_graph::SceneGraph,
};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum InteractionMode {
    #[default]
    Navigate,
    Dragging,
}

/// Who received a pointer event.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PointerConsumer {
    Navigation,
    Drag,
    Nobody,
}

/// Gives pointer input to exactly one of navigation and dragging.
///
/// While navigating, a primary press is first offered to the drag side; if
/// that starts a drag the press is consumed there and navigation is switched
/// off until the drag ends. Every other event goes to the side that owns the
/// current mode.
#[derive(Debug, Default)]
pub struct InteractionArbiter {
    mode: InteractionMode,
}

impl InteractionArbiter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mode(&self) -> InteractionMode {
        self.mode
    }

    pub fn route(
        &mut self,
        event: &PointerEvent,
        navigation: &mut dyn NavigationController,
        drag: &mut dyn DragController,
        view: &DragView<'_>,
        graph: &mut SceneGraph,
    ) -> PointerConsumer {
        match self.mode {
            InteractionMode::Navigate => {
                if event.is_primary_press() {
                    if let Some(lifecycle) = drag.handle_pointer(event, view, graph) {
                        self.on_drag_event(lifecycle, navigation);
                        return PointerConsumer::Drag;
                    }
                }
                if navigation.handle_pointer(event) {
                    PointerConsumer::Navigation
                } else {
                    PointerConsumer::Nobody
                }
            }
            InteractionMode::Dragging => {
                if let Some(lifecycle) = drag.handle_pointer(event, view, graph) {
                    self.on_drag_event(lifecycle, navigation);
                }
                PointerConsumer::Drag
            }
        }
    }

    /// Applies a drag lifecycle event to the mode and the navigation switch.
    pub fn on_drag_event(&mut self, event: DragEvent, navigation: &mut dyn NavigationController) {
        match (self.mode, event) {
            (InteractionMode::Navigate, DragEvent::Start(node)) => {
                debug!("dragging {:?}, navigation off", node);
                self.mode = InteractionMode::Dragging;
                navigation.set_enabled(false);
            }
            (InteractionMode::Dragging, DragEvent::End(node)) => {
                debug!("released {:?}, navigation on", node);
                self.mode = InteractionMode::Navigate;
                navigation.set_enabled(true);
            }
            (mode, event) => warn!("ignoring {:?} while in {:?}", event, mode),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use crate::{camera::Camera, data_structures::scene_graph::NodeId};

    use super::*;

    #[derive(Default)]
    struct FakeNavigation {
        enabled: bool,
        events: usize,
    }

    impl NavigationController for FakeNavigation {
        fn handle_pointer(&mut self, _event: &PointerEvent) -> bool {
            if self.enabled {
                self.events += 1;
            }
            self.enabled
        }
        fn update(&mut self, _camera: &mut Camera, _dt: Duration) {}
        fn enabled(&self) -> bool {
            self.enabled
        }
        fn set_enabled(&mut self, enabled: bool) {
            self.enabled = enabled;
        }
    }

    fn node() -> NodeId {
        SceneGraph::new().root()
    }

    #[test]
    fn start_and_end_toggle_navigation() {
        let mut nav = FakeNavigation {
            enabled: true,
            ..Default::default()
        };
        let mut arbiter = InteractionArbiter::new();
        assert_eq!(arbiter.mode(), InteractionMode::Navigate);

        arbiter.on_drag_event(DragEvent::Start(node()), &mut nav);
        assert_eq!(arbiter.mode(), InteractionMode::Dragging);
        assert!(!nav.enabled());

        arbiter.on_drag_event(DragEvent::End(node()), &mut nav);
        assert_eq!(arbiter.mode(), InteractionMode::Navigate);
        assert!(nav.enabled());
    }

    #[test]
    fn out_of_order_events_are_ignored() {
        let mut nav = FakeNavigation {
            enabled: true,
            ..Default::default()
        };
        let mut arbiter = InteractionArbiter::new();
        arbiter.on_drag_event(DragEvent::End(node()), &mut nav);
        assert_eq!(arbiter.mode(), InteractionMode::Navigate);
        assert!(nav.enabled());
        assert_eq!(nav.events, 0);
    }
}
