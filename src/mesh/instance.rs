use crate::archive::{ArchiveHandle, ResultArchive};
use crate::error::{ExtractError, Result};
use crate::mesh::MeshTables;
use std::path::Path;

pub fn fetch_instance_mesh<P: AsRef<Path>>(archive: P, instance: &str, exact: bool) -> Result<MeshTables> {
    let archive = ArchiveHandle::open(archive)?;
    fetch_instance_mesh_from(&*archive, instance, exact)
}

/// Copies one assembly instance's mesh out of the archive.
///
/// With `exact` the upper-cased name must match; otherwise the first instance
/// whose name contains it is taken. Coordinates are padded to three columns.
pub fn fetch_instance_mesh_from<A: ResultArchive>(
    archive: &A,
    instance: &str,
    exact: bool,
) -> Result<MeshTables> {
    let wanted = instance.trim().to_uppercase();

    let name = if exact {
        archive.instance(&wanted).map(|i| i.name.clone())
    } else {
        archive
            .instance_names()
            .into_iter()
            .find(|name| name.contains(&wanted))
            .map(str::to_string)
    };

    let found = name
        .as_deref()
        .and_then(|name| archive.instance(name))
        .ok_or(ExtractError::InstanceNotFound { instance: wanted })?;

    let mut nodes: Vec<_> = found.nodes.iter().collect();
    nodes.sort_by_key(|n| n.label);
    let mut elements: Vec<_> = found.elements.iter().collect();
    elements.sort_by_key(|e| e.label);

    let mesh = MeshTables {
        name: found.name.clone(),
        element_type: elements
            .first()
            .map(|e| e.element_type.clone())
            .unwrap_or_default(),
        node_labels: nodes.iter().map(|n| n.label).collect(),
        coordinates: nodes
            .iter()
            .map(|n| {
                let mut xyz = n.coordinates.clone();
                xyz.resize(3.max(xyz.len()), 0.0);
                xyz
            })
            .collect(),
        element_labels: elements.iter().map(|e| e.label).collect(),
        connectivity: elements.iter().map(|e| e.connectivity.clone()).collect(),
    };
    mesh.check_consistent()?;

    tracing::debug!(
        instance = %mesh.name,
        nodes = mesh.node_count(),
        elements = mesh.element_count(),
        "fetched instance mesh"
    );

    Ok(mesh)
}
