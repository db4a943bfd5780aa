use crate::archive::model::{
    ArchiveData, FieldValue, HistoryRegion, Instance, Position, SetMember,
};
use crate::error::{ExtractError, Result};
use std::collections::HashSet;
use std::fmt;
use std::ops::Deref;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SetKind {
    Node,
    Element,
}

impl fmt::Display for SetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SetKind::Node => write!(f, "node"),
            SetKind::Element => write!(f, "element"),
        }
    }
}

/// Address of one frame: step index in archive order, frame index within it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FrameRef {
    pub step: usize,
    pub frame: usize,
}

/// What the frame sequencer needs to know about a step.
#[derive(Debug, Clone, PartialEq)]
pub struct PhaseInfo {
    pub name: String,
    pub time_period: Option<f64>,
    pub frame_values: Vec<f64>,
}

/// Read-only access to a result archive.
///
/// Set names passed in are expected upper-case; callers normalise them.
pub trait ResultArchive {
    fn name(&self) -> &str;

    fn phases(&self) -> Vec<PhaseInfo>;

    fn node_set(&self, name: &str) -> Option<&[SetMember]>;

    fn element_set(&self, name: &str) -> Option<&[SetMember]>;

    fn instance(&self, name: &str) -> Option<&Instance>;

    fn instance_names(&self) -> Vec<&str>;

    fn has_field(&self, frame: FrameRef, key: &str) -> bool;

    fn component_labels(&self, frame: FrameRef, key: &str) -> Option<&[String]>;

    /// Values of `key` in `frame` restricted to a set region and, optionally,
    /// to one output position. Archive order is preserved and unspecified.
    fn field_values(
        &self,
        frame: FrameRef,
        key: &str,
        kind: SetKind,
        region: &[SetMember],
        position: Option<Position>,
    ) -> Result<Vec<&FieldValue>>;

    fn step_index(&self, name: &str) -> Option<usize>;

    fn history_region(&self, step: usize, region: &str) -> Option<&HistoryRegion>;

    fn set(&self, kind: SetKind, name: &str) -> Option<&[SetMember]> {
        match kind {
            SetKind::Node => self.node_set(name),
            SetKind::Element => self.element_set(name),
        }
    }

    fn close(&mut self) {}
}

/// An archive exported to JSON and held in memory.
#[derive(Debug)]
pub struct JsonArchive {
    path: PathBuf,
    name: String,
    data: ArchiveData,
    closed: bool,
}

impl JsonArchive {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = resolve_archive_path(path.as_ref());
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| path.display().to_string());

        let content = std::fs::read_to_string(&path)?;
        let data: ArchiveData =
            serde_json::from_str(&content).map_err(|e| ExtractError::Archive {
                archive: name.clone(),
                message: e.to_string(),
            })?;

        tracing::debug!(archive = %name, steps = data.steps.len(), "opened archive");

        Ok(Self {
            path,
            name,
            data,
            closed: false,
        })
    }

    pub fn from_data<S: Into<String>>(name: S, data: ArchiveData) -> Self {
        let name = name.into();
        Self {
            path: PathBuf::from(&name),
            name,
            data,
            closed: false,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    fn data(&self) -> &ArchiveData {
        &self.data
    }

    fn frame(&self, frame: FrameRef) -> Option<&crate::archive::model::Frame> {
        self.data()
            .steps
            .get(frame.step)
            .and_then(|s| s.frames.get(frame.frame))
    }
}

impl ResultArchive for JsonArchive {
    fn name(&self) -> &str {
        &self.name
    }

    fn phases(&self) -> Vec<PhaseInfo> {
        self.data()
            .steps
            .iter()
            .map(|step| PhaseInfo {
                name: step.name.clone(),
                time_period: step.time_period,
                frame_values: step.frames.iter().map(|f| f.frame_value).collect(),
            })
            .collect()
    }

    fn node_set(&self, name: &str) -> Option<&[SetMember]> {
        self.data().assembly.node_sets.get(name).map(Vec::as_slice)
    }

    fn element_set(&self, name: &str) -> Option<&[SetMember]> {
        self.data().assembly.element_sets.get(name).map(Vec::as_slice)
    }

    fn instance(&self, name: &str) -> Option<&Instance> {
        self.data().assembly.instances.iter().find(|i| i.name == name)
    }

    fn instance_names(&self) -> Vec<&str> {
        self.data()
            .assembly
            .instances
            .iter()
            .map(|i| i.name.as_str())
            .collect()
    }

    fn has_field(&self, frame: FrameRef, key: &str) -> bool {
        self.frame(frame)
            .is_some_and(|f| f.field_outputs.contains_key(key))
    }

    fn component_labels(&self, frame: FrameRef, key: &str) -> Option<&[String]> {
        self.frame(frame)
            .and_then(|f| f.field_outputs.get(key))
            .map(|o| o.component_labels.as_slice())
    }

    fn field_values(
        &self,
        frame: FrameRef,
        key: &str,
        kind: SetKind,
        region: &[SetMember],
        position: Option<Position>,
    ) -> Result<Vec<&FieldValue>> {
        let output = self
            .frame(frame)
            .and_then(|f| f.field_outputs.get(key))
            .ok_or_else(|| ExtractError::KeyNotDefined {
                key: key.to_string(),
                archive: self.name.clone(),
            })?;

        let members: HashSet<(&str, i64)> = region
            .iter()
            .flat_map(|m| m.labels.iter().map(move |l| (m.instance.as_str(), *l)))
            .collect();

        let values = output
            .values
            .iter()
            .filter(|v| position.map_or(true, |p| v.position == p))
            .filter(|v| {
                let label = match kind {
                    SetKind::Node => v.node_label,
                    SetKind::Element => v.element_label,
                };
                label.is_some_and(|l| members.contains(&(v.instance.as_str(), l)))
            })
            .collect();

        Ok(values)
    }

    fn step_index(&self, name: &str) -> Option<usize> {
        self.data().steps.iter().position(|s| s.name == name)
    }

    fn history_region(&self, step: usize, region: &str) -> Option<&HistoryRegion> {
        self.data()
            .steps
            .get(step)
            .and_then(|s| s.history_regions.get(region))
    }

    fn close(&mut self) {
        self.data = ArchiveData::default();
        self.closed = true;
    }
}

/// Owns an open archive for the length of one request and closes it on drop.
pub struct ArchiveHandle<A: ResultArchive = JsonArchive> {
    inner: A,
}

impl ArchiveHandle<JsonArchive> {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Ok(Self::new(JsonArchive::open(path)?))
    }
}

impl<A: ResultArchive> ArchiveHandle<A> {
    pub fn new(inner: A) -> Self {
        Self { inner }
    }
}

impl<A: ResultArchive> Deref for ArchiveHandle<A> {
    type Target = A;

    fn deref(&self) -> &A {
        &self.inner
    }
}

impl<A: ResultArchive> Drop for ArchiveHandle<A> {
    fn drop(&mut self) {
        tracing::debug!(archive = %self.inner.name(), "closing archive");
        self.inner.close();
    }
}

fn resolve_archive_path(path: &Path) -> PathBuf {
    if path.exists() || path.extension().is_some() {
        return path.to_path_buf();
    }
    path.with_extension("odb")
}
