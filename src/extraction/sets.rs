use crate::archive::{ResultArchive, SetKind, SetMember};
use crate::error::{ExtractError, Result};
use std::collections::BTreeMap;
use std::fmt;

/// Identifies one column of a result table.
///
/// `corner` is only set for unaveraged element-nodal output, where it holds
/// the node label of the element corner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntityKey {
    pub label: i64,
    pub corner: Option<i64>,
}

impl EntityKey {
    pub fn new(label: i64) -> Self {
        Self {
            label,
            corner: None,
        }
    }

    pub fn corner(element: i64, node: i64) -> Self {
        Self {
            label: element,
            corner: Some(node),
        }
    }
}

impl fmt::Display for EntityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.corner {
            Some(node) => write!(f, "{}:{}", self.label, node),
            None => write!(f, "{}", self.label),
        }
    }
}

/// A named set, resolved once per request.
#[derive(Debug, Clone)]
pub struct ResolvedSet {
    pub name: String,
    pub kind: SetKind,
    /// Region to hand back to the archive for subset queries.
    pub members: Vec<SetMember>,
    /// Sorted ascending, no duplicates.
    pub labels: Vec<i64>,
    /// Element label to corner node labels, for element sets that asked for it.
    pub connectivity: Option<BTreeMap<i64, Vec<i64>>>,
}

impl ResolvedSet {
    pub fn instances(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.members.iter().map(|m| m.instance.as_str()).collect();
        names.sort_unstable();
        names.dedup();
        names
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// Column order for a result table over this set.
    ///
    /// With connectivity, one column per element corner: elements ascending,
    /// corners in connectivity order. Otherwise one column per label.
    pub fn entity_keys(&self) -> Vec<EntityKey> {
        match &self.connectivity {
            Some(connectivity) => connectivity
                .iter()
                .flat_map(|(element, nodes)| {
                    nodes.iter().map(move |node| EntityKey::corner(*element, *node))
                })
                .collect(),
            None => self.labels.iter().copied().map(EntityKey::new).collect(),
        }
    }

    pub fn tag(&self) -> &'static str {
        match self.kind {
            SetKind::Node => "NODE",
            SetKind::Element => "ELEM",
        }
    }
}

/// Turns a set name into its members and sorted label list.
pub struct EntitySetResolver<'a, A: ResultArchive> {
    archive: &'a A,
    require_single_instance: bool,
}

impl<'a, A: ResultArchive> EntitySetResolver<'a, A> {
    pub fn new(archive: &'a A) -> Self {
        Self {
            archive,
            require_single_instance: true,
        }
    }

    pub fn with_single_instance(mut self, required: bool) -> Self {
        self.require_single_instance = required;
        self
    }

    /// Resolves `name` (case-insensitive) to a set of the given kind.
    pub fn resolve(&self, kind: SetKind, name: &str, with_connectivity: bool) -> Result<ResolvedSet> {
        let name = name.trim().to_uppercase();
        let members = self
            .archive
            .set(kind, &name)
            .ok_or_else(|| ExtractError::SetNotFound {
                kind: kind.to_string(),
                set: name.clone(),
                archive: self.archive.name().to_string(),
            })?
            .to_vec();

        let mut labels: Vec<i64> = members.iter().flat_map(|m| m.labels.iter().copied()).collect();
        labels.sort_unstable();
        labels.dedup();

        let mut resolved = ResolvedSet {
            name,
            kind,
            members,
            labels,
            connectivity: None,
        };

        let instances: Vec<String> = resolved.instances().into_iter().map(str::to_string).collect();
        if self.require_single_instance && instances.len() > 1 {
            return Err(ExtractError::MultiInstanceSet {
                set: resolved.name.clone(),
                instances: instances.clone(),
            });
        }

        if instances.len() > 1 {
            check_distinct_labels(&resolved)?;
        }

        if with_connectivity && kind == SetKind::Element {
            resolved.connectivity = Some(self.connectivity(&resolved)?);
        }

        tracing::debug!(
            set = %resolved.name,
            kind = %kind,
            entities = resolved.len(),
            instances = instances.len(),
            "resolved set"
        );

        Ok(resolved)
    }

    fn connectivity(&self, set: &ResolvedSet) -> Result<BTreeMap<i64, Vec<i64>>> {
        let mut connectivity = BTreeMap::new();

        for member in &set.members {
            let instance = self.archive.instance(&member.instance).ok_or_else(|| {
                ExtractError::InstanceNotFound {
                    instance: member.instance.clone(),
                }
            })?;

            for label in &member.labels {
                let element = instance
                    .elements
                    .iter()
                    .find(|e| e.label == *label)
                    .ok_or_else(|| ExtractError::InconsistentMesh {
                        instance: member.instance.clone(),
                        message: format!("element {} of set {} is not defined", label, set.name),
                    })?;
                connectivity.insert(*label, element.connectivity.clone());
            }
        }

        Ok(connectivity)
    }
}

/// Columns are keyed by label alone, so a label owned by two instances of
/// the same set would merge unrelated entities.
fn check_distinct_labels(set: &ResolvedSet) -> Result<()> {
    let mut owners: BTreeMap<i64, Vec<&str>> = BTreeMap::new();
    for member in &set.members {
        for label in &member.labels {
            let names = owners.entry(*label).or_default();
            if !names.contains(&member.instance.as_str()) {
                names.push(member.instance.as_str());
            }
        }
    }

    match owners.into_iter().find(|(_, names)| names.len() > 1) {
        Some((label, names)) => Err(ExtractError::LabelCollision {
            set: set.name.clone(),
            label,
            instances: names.into_iter().map(str::to_string).collect(),
        }),
        None => Ok(()),
    }
}
