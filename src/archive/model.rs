//! Serde model of an exported output database.
//!
//! The layout mirrors the solver's object tree: an assembly of instances with
//! assembly-level node and element sets, and an ordered list of steps, each
//! holding frames of named field outputs plus history regions.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ArchiveData {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub assembly: Assembly,
    #[serde(default)]
    pub steps: Vec<Step>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Assembly {
    #[serde(default)]
    pub instances: Vec<Instance>,
    #[serde(default)]
    pub node_sets: BTreeMap<String, Vec<SetMember>>,
    #[serde(default)]
    pub element_sets: BTreeMap<String, Vec<SetMember>>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Instance {
    pub name: String,
    #[serde(default)]
    pub nodes: Vec<MeshNode>,
    #[serde(default)]
    pub elements: Vec<MeshElement>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MeshNode {
    pub label: i64,
    pub coordinates: Vec<f64>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MeshElement {
    pub label: i64,
    #[serde(rename = "type", default)]
    pub element_type: String,
    pub connectivity: Vec<i64>,
}

/// The part of a set that lives in one instance.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct SetMember {
    pub instance: String,
    pub labels: Vec<i64>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Step {
    pub name: String,
    /// Step duration in analysis time. Absent in older exports.
    #[serde(default)]
    pub time_period: Option<f64>,
    #[serde(default)]
    pub frames: Vec<Frame>,
    #[serde(default)]
    pub history_regions: BTreeMap<String, HistoryRegion>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Frame {
    pub frame_value: f64,
    #[serde(default)]
    pub field_outputs: BTreeMap<String, FieldOutput>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct FieldOutput {
    #[serde(default)]
    pub component_labels: Vec<String>,
    #[serde(default)]
    pub values: Vec<FieldValue>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Position {
    Nodal,
    ElementNodal,
    IntegrationPoint,
    Centroid,
    WholeElement,
}

/// A recorded payload: scalars are stored bare, vectors and tensors as arrays.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(untagged)]
pub enum Payload {
    Scalar(f64),
    Vector(Vec<f64>),
}

impl Payload {
    pub fn as_slice(&self) -> &[f64] {
        match self {
            Payload::Scalar(v) => std::slice::from_ref(v),
            Payload::Vector(v) => v,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct FieldValue {
    pub instance: String,
    pub position: Position,
    #[serde(default)]
    pub node_label: Option<i64>,
    #[serde(default)]
    pub element_label: Option<i64>,
    #[serde(default)]
    pub integration_point: Option<u32>,
    /// Single precision analyses fill `data`.
    #[serde(default)]
    pub data: Option<Payload>,
    /// Double precision analyses fill `data_double` instead.
    #[serde(default)]
    pub data_double: Option<Payload>,
    #[serde(default)]
    pub mises: Option<f64>,
    #[serde(default)]
    pub press: Option<f64>,
    #[serde(default)]
    pub inv3: Option<f64>,
}

impl FieldValue {
    /// Whichever precision the analysis wrote.
    pub fn payload(&self) -> Option<&[f64]> {
        self.data
            .as_ref()
            .or(self.data_double.as_ref())
            .map(Payload::as_slice)
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct HistoryRegion {
    /// Kept as a list: the solver's output order is meaningful for contours.
    #[serde(default)]
    pub outputs: Vec<HistoryOutput>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct HistoryOutput {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub data: Vec<(f64, f64)>,
}
