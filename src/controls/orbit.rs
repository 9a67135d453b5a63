use std::{f32::consts::PI, time::Duration};

use cgmath::{InnerSpace, Point3, Vector3};
use winit::{dpi::LogicalPosition, event::MouseButton};

use crate::{camera::Camera, config::ControlsConfig, controls::PointerEvent};

/// Moves the viewport camera in response to pointer input.
///
/// Input is accumulated by `handle_pointer` and applied once per frame by
/// `update`.
pub trait NavigationController {
    /// Returns whether the event was used.
    fn handle_pointer(&mut self, event: &PointerEvent) -> bool;

    fn update(&mut self, camera: &mut Camera, dt: Duration);

    fn enabled(&self) -> bool;

    fn set_enabled(&mut self, enabled: bool);

    /// Called whenever the view is resized, with its logical size.
    fn set_viewport(&mut self, _width: u32, _height: u32) {}
}

const MIN_POLAR: f32 = 1e-4;

/// Orbits the camera around a fixed target.
///
/// Left-drag rotates, the wheel dollies. Auto-rotation keeps turning the
/// camera even while pointer input is disabled.
#[derive(Debug)]
pub struct OrbitControls {
    pub target: Point3<f32>,
    pub auto_rotate: bool,
    /// 2.0 is one full turn every 30 seconds.
    pub auto_rotate_speed: f32,
    pub rotate_speed: f32,
    pub zoom_speed: f32,
    pub min_distance: f32,
    pub max_distance: f32,
    enabled: bool,
    viewport_height: f32,
    rotating_from: Option<LogicalPosition<f64>>,
    theta_delta: f32,
    phi_delta: f32,
    scale: f32,
}

impl OrbitControls {
    pub fn new(target: impl Into<Point3<f32>>) -> Self {
        Self {
            target: target.into(),
            auto_rotate: false,
            auto_rotate_speed: 2.0,
            rotate_speed: 1.0,
            zoom_speed: 1.0,
            min_distance: 0.0,
            max_distance: f32::INFINITY,
            enabled: true,
            viewport_height: 720.0,
            rotating_from: None,
            theta_delta: 0.0,
            phi_delta: 0.0,
            scale: 1.0,
        }
    }

    pub fn from_config(target: impl Into<Point3<f32>>, config: &ControlsConfig) -> Self {
        Self {
            auto_rotate: config.auto_rotate,
            auto_rotate_speed: config.auto_rotate_speed,
            rotate_speed: config.rotate_speed,
            zoom_speed: config.zoom_speed,
            min_distance: config.min_distance,
            max_distance: config.max_distance.unwrap_or(f32::INFINITY),
            ..Self::new(target)
        }
    }

    /// Drag distances are measured relative to the viewport height.
    pub fn set_viewport_height(&mut self, height: u32) {
        self.viewport_height = height.max(1) as f32;
    }

    pub fn is_rotating(&self) -> bool {
        self.rotating_from.is_some()
    }

    fn auto_rotation_angle(&self, dt: Duration) -> f32 {
        2.0 * PI / 60.0 * self.auto_rotate_speed * dt.as_secs_f32()
    }

    fn dolly_scale(&self) -> f32 {
        0.95f32.powf(self.zoom_speed)
    }
}

impl NavigationController for OrbitControls {
    fn handle_pointer(&mut self, event: &PointerEvent) -> bool {
        if !self.enabled {
            return false;
        }
        match *event {
            PointerEvent::Pressed {
                button: MouseButton::Left,
                position,
            } => {
                self.rotating_from = Some(position);
                true
            }
            PointerEvent::Moved { position } => {
                let Some(from) = self.rotating_from else {
                    return false;
                };
                let dx = (position.x - from.x) as f32;
                let dy = (position.y - from.y) as f32;
                self.theta_delta -= 2.0 * PI * dx / self.viewport_height * self.rotate_speed;
                self.phi_delta -= 2.0 * PI * dy / self.viewport_height * self.rotate_speed;
                self.rotating_from = Some(position);
                true
            }
            PointerEvent::Released {
                button: MouseButton::Left,
                ..
            } => self.rotating_from.take().is_some(),
            PointerEvent::Wheel { delta } if delta != 0.0 => {
                if delta > 0.0 {
                    self.scale *= self.dolly_scale();
                } else {
                    self.scale /= self.dolly_scale();
                }
                true
            }
            _ => false,
        }
    }

    fn update(&mut self, camera: &mut Camera, dt: Duration) {
        let offset = camera.position - self.target;
        let radius = offset.magnitude();
        let (mut theta, mut phi) = if radius > 0.0 {
            (offset.x.atan2(offset.z), (offset.y / radius).clamp(-1.0, 1.0).acos())
        } else {
            (0.0, PI / 2.0)
        };

        if self.auto_rotate && self.rotating_from.is_none() {
            theta -= self.auto_rotation_angle(dt);
        }
        theta += self.theta_delta;
        phi = (phi + self.phi_delta).clamp(MIN_POLAR, PI - MIN_POLAR);
        let radius = (radius * self.scale).clamp(self.min_distance, self.max_distance);

        let offset = Vector3::new(
            radius * phi.sin() * theta.sin(),
            radius * phi.cos(),
            radius * phi.sin() * theta.cos(),
        );
        camera.position = self.target + offset;
        camera.target = self.target;

        self.theta_delta = 0.0;
        self.phi_delta = 0.0;
        self.scale = 1.0;
    }

    fn enabled(&self) -> bool {
        self.enabled
    }

    fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
        if !enabled {
            self.rotating_from = None;
        }
    }

    fn set_viewport(&mut self, _width: u32, height: u32) {
        self.set_viewport_height(height);
    }
}
