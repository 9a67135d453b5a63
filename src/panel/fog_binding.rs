use crate::{
    data_structures::{
        color::Rgb,
        fog::{Background, Fog},
        scene_graph::Scene,
    },
    panel::{Bindable, BindError, ParamValue, PropertyDesc, expect_color, expect_number},
};

/// Exposes fog `near`, `far` and `color` over the live fog and background.
///
/// `near <= far` holds after every write: raising `near` past `far` drags
/// `far` along, lowering `far` below `near` drags `near` along. The color is
/// written to the fog and the background together.
pub struct FogBinding<'a> {
    fog: &'a mut Fog,
    background: &'a mut Background,
    slider_range: (f32, f32),
}

impl<'a> FogBinding<'a> {
    pub fn new(fog: &'a mut Fog, background: &'a mut Background) -> Self {
        Self {
            fog,
            background,
            slider_range: (20.0, 70.0),
        }
    }

    pub fn for_scene(scene: &'a mut Scene) -> Self {
        Self::new(&mut scene.fog, &mut scene.background)
    }

    /// Range offered by the near/far sliders. Direct writes are not limited to it.
    pub fn with_slider_range(mut self, min: f32, max: f32) -> Self {
        self.slider_range = (min.min(max), min.max(max));
        self
    }

    pub fn near(&self) -> f32 {
        self.fog.near
    }

    pub fn set_near(&mut self, near: f32) {
        self.fog.near = near;
        self.fog.far = self.fog.far.max(near);
    }

    pub fn far(&self) -> f32 {
        self.fog.far
    }

    pub fn set_far(&mut self, far: f32) {
        self.fog.far = far;
        self.fog.near = self.fog.near.min(far);
    }

    pub fn color(&self) -> Rgb {
        self.fog.color
    }

    pub fn set_color(&mut self, color: Rgb) {
        self.fog.color = color;
        self.background.color = color;
    }
}

impl Bindable for FogBinding<'_> {
    fn folder(&self) -> &str {
        "fog"
    }

    fn properties(&self) -> Vec<PropertyDesc> {
        let (min, max) = self.slider_range;
        vec![
            PropertyDesc::slider("near", min, max, 0.1),
            PropertyDesc::slider("far", min, max, 0.1),
            PropertyDesc::color("color"),
        ]
    }

    fn get(&self, name: &str) -> Result<ParamValue, BindError> {
        match name {
            "near" => Ok(ParamValue::Number(self.near())),
            "far" => Ok(ParamValue::Number(self.far())),
            "color" => Ok(ParamValue::Color(self.color())),
            _ => Err(BindError::unknown(self.folder(), name)),
        }
    }

    fn set(&mut self, name: &str, value: ParamValue) -> Result<(), BindError> {
        match name {
            "near" => self.set_near(expect_number(name, value)?),
            "far" => self.set_far(expect_number(name, value)?),
            "color" => self.set_color(expect_color(name, value)?),
            _ => return Err(BindError::unknown(self.folder(), name)),
        }
        Ok(())
    }
}
