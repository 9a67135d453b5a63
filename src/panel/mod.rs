//! Live parameter panel.
//!
//! Scene state that an operator may tune is exposed through [`Bindable`]
//! surfaces: a folder name, a flat list of typed properties and get/set by
//! name. Adapters like [`fog_binding::FogBinding`] borrow the live values for
//! the duration of an edit and enforce cross-field rules in their setters.

use std::fmt;

use thiserror::Error;

use crate::data_structures::color::Rgb;

pub mod fog_binding;
pub mod keyboard;
pub mod light_binding;

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum PropertyKind {
    Slider { min: f32, max: f32, step: f32 },
    Color,
    Toggle,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PropertyDesc {
    pub name: &'static str,
    pub kind: PropertyKind,
}

impl PropertyDesc {
    pub const fn slider(name: &'static str, min: f32, max: f32, step: f32) -> Self {
        Self {
            name,
            kind: PropertyKind::Slider { min, max, step },
        }
    }

    pub const fn color(name: &'static str) -> Self {
        Self {
            name,
            kind: PropertyKind::Color,
        }
    }

    pub const fn toggle(name: &'static str) -> Self {
        Self {
            name,
            kind: PropertyKind::Toggle,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ParamValue {
    Number(f32),
    Color(Rgb),
    Bool(bool),
}

impl ParamValue {
    pub fn type_name(&self) -> &'static str {
        match self {
            ParamValue::Number(_) => "number",
            ParamValue::Color(_) => "color",
            ParamValue::Bool(_) => "bool",
        }
    }

    pub fn as_number(&self) -> Option<f32> {
        match self {
            ParamValue::Number(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_color(&self) -> Option<Rgb> {
        match self {
            ParamValue::Color(c) => Some(*c),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            ParamValue::Bool(b) => Some(*b),
            _ => None,
        }
    }
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamValue::Number(v) => write!(f, "{v:.2}"),
            ParamValue::Color(c) => write!(f, "{c}"),
            ParamValue::Bool(b) => write!(f, "{b}"),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Error)]
pub enum BindError {
    #[error("'{folder}' has no property '{name}'")]
    UnknownProperty { folder: String, name: String },
    #[error("property '{name}' expects a {expected}, got a {}", got.type_name())]
    WrongType {
        name: String,
        expected: &'static str,
        got: ParamValue,
    },
}

impl BindError {
    pub(crate) fn unknown(folder: &str, name: &str) -> Self {
        BindError::UnknownProperty {
            folder: folder.to_string(),
            name: name.to_string(),
        }
    }

    pub(crate) fn wrong_type(name: &str, expected: &'static str, got: ParamValue) -> Self {
        BindError::WrongType {
            name: name.to_string(),
            expected,
            got,
        }
    }
}

/// A flat property surface over live state.
///
/// Reads always reflect the current state. A failed write leaves the state
/// unchanged.
pub trait Bindable {
    fn folder(&self) -> &str;

    fn properties(&self) -> Vec<PropertyDesc>;

    fn get(&self, name: &str) -> Result<ParamValue, BindError>;

    fn set(&mut self, name: &str, value: ParamValue) -> Result<(), BindError>;

    fn describe(&self, name: &str) -> Option<PropertyDesc> {
        self.properties().into_iter().find(|p| p.name == name)
    }
}

pub(crate) fn expect_number(name: &str, value: ParamValue) -> Result<f32, BindError> {
    value
        .as_number()
        .ok_or_else(|| BindError::wrong_type(name, "number", value))
}

pub(crate) fn expect_color(name: &str, value: ParamValue) -> Result<Rgb, BindError> {
    value
        .as_color()
        .ok_or_else(|| BindError::wrong_type(name, "color", value))
}

pub(crate) fn expect_bool(name: &str, value: ParamValue) -> Result<bool, BindError> {
    value
        .as_bool()
        .ok_or_else(|| BindError::wrong_type(name, "bool", value))
}
