use crate::{
    data_structures::{
        light::Light,
        scene_graph::{NodeId, Scene, SceneNode},
    },
    panel::{Bindable, BindError, ParamValue, PropertyDesc, expect_bool, expect_number},
};

const PROPERTIES: [PropertyDesc; 5] = [
    PropertyDesc::toggle("visible"),
    PropertyDesc::slider("x", -500.0, 500.0, 10.0),
    PropertyDesc::slider("y", -500.0, 500.0, 10.0),
    PropertyDesc::slider("z", -500.0, 500.0, 10.0),
    PropertyDesc::slider("intensity", 0.0, 10.0, 0.1),
];

/// Exposes a directional light's switch, position and intensity.
pub struct DirectionalLightBinding<'a> {
    node: &'a mut SceneNode,
}

impl<'a> DirectionalLightBinding<'a> {
    /// `None` unless the node holds a directional light.
    pub fn new(node: &'a mut SceneNode) -> Option<Self> {
        let directional = matches!(node.light(), Some(Light::Directional { .. }));
        directional.then_some(Self { node })
    }

    pub fn for_scene(scene: &'a mut Scene, light: NodeId) -> Option<Self> {
        scene.graph.node_mut(light).and_then(Self::new)
    }

    pub fn visible(&self) -> bool {
        matches!(
            self.node.light(),
            Some(Light::Directional { visible: true, .. })
        )
    }

    pub fn set_visible(&mut self, on: bool) {
        if let Some(Light::Directional { visible, .. }) = self.node.light_mut() {
            *visible = on;
        }
    }

    pub fn intensity(&self) -> f32 {
        match self.node.light() {
            Some(Light::Directional { intensity, .. }) => *intensity,
            _ => 0.0,
        }
    }

    pub fn set_intensity(&mut self, value: f32) {
        if let Some(Light::Directional { intensity, .. }) = self.node.light_mut() {
            *intensity = value;
        }
    }

    pub fn position(&self) -> [f32; 3] {
        self.node.local.position.into()
    }

    pub fn set_position(&mut self, position: [f32; 3]) {
        self.node.local.position = position.into();
    }
}

impl Bindable for DirectionalLightBinding<'_> {
    fn folder(&self) -> &str {
        "light"
    }

    fn properties(&self) -> Vec<PropertyDesc> {
        PROPERTIES.to_vec()
    }

    fn get(&self, name: &str) -> Result<ParamValue, BindError> {
        let position = self.node.local.position;
        match name {
            "visible" => Ok(ParamValue::Bool(self.visible())),
            "x" => Ok(ParamValue::Number(position.x)),
            "y" => Ok(ParamValue::Number(position.y)),
            "z" => Ok(ParamValue::Number(position.z)),
            "intensity" => Ok(ParamValue::Number(self.intensity())),
            _ => Err(BindError::unknown(self.folder(), name)),
        }
    }

    fn set(&mut self, name: &str, value: ParamValue) -> Result<(), BindError> {
        match name {
            "visible" => self.set_visible(expect_bool(name, value)?),
            "x" => self.node.local.position.x = expect_number(name, value)?,
            "y" => self.node.local.position.y = expect_number(name, value)?,
            "z" => self.node.local.position.z = expect_number(name, value)?,
            "intensity" => self.set_intensity(expect_number(name, value)?),
            _ => return Err(BindError::unknown(self.folder(), name)),
        }
        Ok(())
    }
}
