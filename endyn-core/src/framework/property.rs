//! Exposed read and write accessors of a model.

use super::blueprint::CheckFailure;
use super::component::ComponentId;
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};

/// Value exchanged through properties.
///
/// Reads always return copies, so callers can never alias the model's storage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PropertyValue {
    Scalar(f64),
    Size(usize),
    Vector(Array1<f64>),
    Matrix(Array2<f64>),
    Mask(Array1<bool>),
    Adjacency(Array2<bool>),
    Labels(Vec<String>),
    Text(String),
}

impl PropertyValue {
    pub fn kind(&self) -> &'static str {
        match self {
            PropertyValue::Scalar(_) => "scalar",
            PropertyValue::Size(_) => "size",
            PropertyValue::Vector(_) => "vector",
            PropertyValue::Matrix(_) => "matrix",
            PropertyValue::Mask(_) => "mask",
            PropertyValue::Adjacency(_) => "adjacency",
            PropertyValue::Labels(_) => "labels",
            PropertyValue::Text(_) => "text",
        }
    }

    pub fn as_scalar(&self) -> Option<f64> {
        match self {
            PropertyValue::Scalar(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_size(&self) -> Option<usize> {
        match self {
            PropertyValue::Size(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_vector(&self) -> Option<&Array1<f64>> {
        match self {
            PropertyValue::Vector(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_matrix(&self) -> Option<&Array2<f64>> {
        match self {
            PropertyValue::Matrix(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_mask(&self) -> Option<&Array1<bool>> {
        match self {
            PropertyValue::Mask(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_adjacency(&self) -> Option<&Array2<bool>> {
        match self {
            PropertyValue::Adjacency(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_labels(&self) -> Option<&[String]> {
        match self {
            PropertyValue::Labels(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            PropertyValue::Text(v) => Some(v),
            _ => None,
        }
    }

    pub fn into_vector(self) -> Option<Array1<f64>> {
        match self {
            PropertyValue::Vector(v) => Some(v),
            _ => None,
        }
    }

    pub fn into_matrix(self) -> Option<Array2<f64>> {
        match self {
            PropertyValue::Matrix(v) => Some(v),
            _ => None,
        }
    }
}

impl From<f64> for PropertyValue {
    fn from(value: f64) -> Self {
        PropertyValue::Scalar(value)
    }
}

impl From<usize> for PropertyValue {
    fn from(value: usize) -> Self {
        PropertyValue::Size(value)
    }
}

impl From<Array1<f64>> for PropertyValue {
    fn from(value: Array1<f64>) -> Self {
        PropertyValue::Vector(value)
    }
}

impl From<Vec<f64>> for PropertyValue {
    fn from(value: Vec<f64>) -> Self {
        PropertyValue::Vector(Array1::from(value))
    }
}

impl From<Array2<f64>> for PropertyValue {
    fn from(value: Array2<f64>) -> Self {
        PropertyValue::Matrix(value)
    }
}

impl From<Array1<bool>> for PropertyValue {
    fn from(value: Array1<bool>) -> Self {
        PropertyValue::Mask(value)
    }
}

impl From<Array2<bool>> for PropertyValue {
    fn from(value: Array2<bool>) -> Self {
        PropertyValue::Adjacency(value)
    }
}

impl From<Vec<String>> for PropertyValue {
    fn from(value: Vec<String>) -> Self {
        PropertyValue::Labels(value)
    }
}

impl From<&str> for PropertyValue {
    fn from(value: &str) -> Self {
        PropertyValue::Text(value.to_string())
    }
}

pub type Getter<V> = fn(&V) -> Option<PropertyValue>;
pub type WriteCheck<V> = fn(&V, &PropertyValue) -> Result<(), CheckFailure>;
pub type WriteFn<V> = fn(&mut V, PropertyValue);

/// A write accessor: the check runs against the current model
/// and the write only happens once it passed.
pub struct Writer<V> {
    pub check: WriteCheck<V>,
    pub write: WriteFn<V>,
}

impl<V> Clone for Writer<V> {
    fn clone(&self) -> Self {
        Self {
            check: self.check,
            write: self.write,
        }
    }
}

/// Named accessor exposed by a component.
pub struct Property<V> {
    pub name: &'static str,
    pub aliases: Vec<&'static str>,
    /// Components that must be present for the property to be readable,
    /// in addition to the component exposing it.
    pub depends: Vec<ComponentId>,
    pub getter: Getter<V>,
    pub writer: Option<Writer<V>>,
}

impl<V> Clone for Property<V> {
    fn clone(&self) -> Self {
        Self {
            name: self.name,
            aliases: self.aliases.clone(),
            depends: self.depends.clone(),
            getter: self.getter,
            writer: self.writer.clone(),
        }
    }
}

impl<V> std::fmt::Debug for Property<V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Property")
            .field("name", &self.name)
            .field("aliases", &self.aliases)
            .field("depends", &self.depends)
            .field("writable", &self.writer.is_some())
            .finish()
    }
}

impl<V> Property<V> {
    pub fn read(name: &'static str, getter: Getter<V>) -> Self {
        Self {
            name,
            aliases: vec![],
            depends: vec![],
            getter,
            writer: None,
        }
    }

    pub fn alias(mut self, alias: &'static str) -> Self {
        self.aliases.push(alias);
        self
    }

    pub fn depends(mut self, component: ComponentId) -> Self {
        self.depends.push(component);
        self
    }

    pub fn write(mut self, check: WriteCheck<V>, write: WriteFn<V>) -> Self {
        self.writer = Some(Writer { check, write });
        self
    }
}
