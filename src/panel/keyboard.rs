//! A control panel driven from the keyboard.
//!
//! `Tab` walks through every property of every bound surface, `=` and `-`
//! step the selected one and `P` logs the lot. Every change goes through the
//! surface's setter, so the surface's own rules apply.

use log::info;
use winit::keyboard::KeyCode;

use crate::{
    data_structures::color::Rgb,
    panel::{Bindable, BindError, ParamValue, PropertyDesc, PropertyKind},
};

/// Colors offered when stepping a color property.
pub const COLOR_PALETTE: [u32; 6] = [0xadd8e6, 0xffffff, 0xffa07a, 0x708090, 0x2f4f4f, 0x000000];

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PanelKey {
    NextProperty,
    Increase,
    Decrease,
    PrintAll,
}

impl PanelKey {
    pub fn from_key_code(code: KeyCode) -> Option<Self> {
        match code {
            KeyCode::Tab => Some(PanelKey::NextProperty),
            KeyCode::Equal | KeyCode::NumpadAdd => Some(PanelKey::Increase),
            KeyCode::Minus | KeyCode::NumpadSubtract => Some(PanelKey::Decrease),
            KeyCode::KeyP => Some(PanelKey::PrintAll),
            _ => None,
        }
    }
}

/// A property write made through the panel, with the value read back afterwards.
#[derive(Clone, Debug, PartialEq)]
pub struct PanelChange {
    pub folder: String,
    pub name: &'static str,
    pub value: ParamValue,
}

#[derive(Debug, Default)]
pub struct KeyboardPanel {
    selected: usize,
}

impl KeyboardPanel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Folder and descriptor of the selected property.
    pub fn selected(&self, surfaces: &[&mut dyn Bindable]) -> Option<(String, PropertyDesc)> {
        self.locate(surfaces)
            .map(|(i, desc)| (surfaces[i].folder().to_string(), desc))
    }

    pub fn handle(
        &mut self,
        key: PanelKey,
        surfaces: &mut [&mut dyn Bindable],
    ) -> Result<Option<PanelChange>, BindError> {
        match key {
            PanelKey::NextProperty => {
                let total = total_properties(surfaces);
                if total > 0 {
                    self.selected = (self.selected + 1) % total;
                }
                if let Some((folder, desc)) = self.selected(surfaces) {
                    info!("panel: selected {}.{}", folder, desc.name);
                }
                Ok(None)
            }
            PanelKey::Increase => self.step(surfaces, 1.0),
            PanelKey::Decrease => self.step(surfaces, -1.0),
            PanelKey::PrintAll => {
                for (folder, name, value) in snapshot(surfaces) {
                    info!("panel: {}.{} = {}", folder, name, value);
                }
                Ok(None)
            }
        }
    }

    fn step(
        &mut self,
        surfaces: &mut [&mut dyn Bindable],
        direction: f32,
    ) -> Result<Option<PanelChange>, BindError> {
        let Some((i, desc)) = self.locate(surfaces) else {
            return Ok(None);
        };
        let surface = &mut *surfaces[i];
        let current = surface.get(desc.name)?;
        surface.set(desc.name, step_value(desc.kind, current, direction))?;
        let change = PanelChange {
            folder: surface.folder().to_string(),
            name: desc.name,
            value: surface.get(desc.name)?,
        };
        info!("panel: {}.{} = {}", change.folder, change.name, change.value);
        Ok(Some(change))
    }

    fn locate(&self, surfaces: &[&mut dyn Bindable]) -> Option<(usize, PropertyDesc)> {
        let total = total_properties(surfaces);
        if total == 0 {
            return None;
        }
        let mut index = self.selected % total;
        for (i, surface) in surfaces.iter().enumerate() {
            let properties = surface.properties();
            if index < properties.len() {
                return Some((i, properties[index]));
            }
            index -= properties.len();
        }
        None
    }
}

/// Every property of every surface with its current value.
pub fn snapshot(surfaces: &[&mut dyn Bindable]) -> Vec<(String, &'static str, ParamValue)> {
    let mut out = Vec::new();
    for surface in surfaces {
        for desc in surface.properties() {
            if let Ok(value) = surface.get(desc.name) {
                out.push((surface.folder().to_string(), desc.name, value));
            }
        }
    }
    out
}

fn total_properties(surfaces: &[&mut dyn Bindable]) -> usize {
    surfaces.iter().map(|s| s.properties().len()).sum()
}

fn step_value(kind: PropertyKind, current: ParamValue, direction: f32) -> ParamValue {
    match (kind, current) {
        (PropertyKind::Slider { min, max, step }, ParamValue::Number(v)) => {
            ParamValue::Number((v + direction * step).clamp(min, max))
        }
        (PropertyKind::Toggle, ParamValue::Bool(b)) => ParamValue::Bool(!b),
        (PropertyKind::Color, ParamValue::Color(c)) => {
            let n = COLOR_PALETTE.len();
            let next = match COLOR_PALETTE.iter().position(|hex| *hex == c.to_hex()) {
                Some(i) if direction > 0.0 => (i + 1) % n,
                Some(i) => (i + n - 1) % n,
                None => 0,
            };
            ParamValue::Color(Rgb::from_hex(COLOR_PALETTE[next]))
        }
        (_, other) => other,
    }
}

#[cfg(test)]
mod tests {
    use crate::{
        data_structures::{fog::Fog, scene_graph::Scene},
        panel::fog_binding::FogBinding,
    };

    use super::*;

    fn scene() -> Scene {
        Scene::new(Fog::new(Rgb::from_hex(0xadd8e6), 20.0, 70.0))
    }

    #[test]
    fn steps_are_clamped_to_the_slider_range() {
        let mut scene = scene();
        let mut fog = FogBinding::for_scene(&mut scene);
        let mut panel = KeyboardPanel::new();
        // "near" is selected first and sits at the bottom of its range
        let change = panel
            .handle(PanelKey::Decrease, &mut [&mut fog])
            .unwrap()
            .unwrap();
        assert_eq!(change.name, "near");
        assert_eq!(change.value, ParamValue::Number(20.0));
    }

    #[test]
    fn tab_walks_and_wraps() {
        let mut scene = scene();
        let mut fog = FogBinding::for_scene(&mut scene);
        let mut panel = KeyboardPanel::new();
        let mut names = Vec::new();
        for _ in 0..4 {
            let surfaces: &mut [&mut dyn Bindable] = &mut [&mut fog];
            names.push(panel.selected(surfaces).unwrap().1.name);
            panel.handle(PanelKey::NextProperty, surfaces).unwrap();
        }
        assert_eq!(names, ["near", "far", "color", "near"]);
    }

    #[test]
    fn color_cycles_through_the_palette_and_background_follows() {
        let mut scene = scene();
        {
            let mut fog = FogBinding::for_scene(&mut scene);
            let mut panel = KeyboardPanel::new();
            panel.handle(PanelKey::NextProperty, &mut [&mut fog]).unwrap();
            panel.handle(PanelKey::NextProperty, &mut [&mut fog]).unwrap();
            panel.handle(PanelKey::Increase, &mut [&mut fog]).unwrap();
        }
        assert_eq!(scene.fog.color, Rgb::from_hex(0xffffff));
        assert_eq!(scene.background.color, Rgb::from_hex(0xffffff));
    }

    #[test]
    fn snapshot_lists_every_property() {
        let mut scene = scene();
        let mut fog = FogBinding::for_scene(&mut scene);
        let all = snapshot(&[&mut fog]);
        assert_eq!(all.len(), 3);
        assert_eq!(all[0], ("fog".to_string(), "near", ParamValue::Number(20.0)));
    }
}
