//! Mesh tables: node coordinates and element connectivity, read either from
//! an archive instance or from a part definition in a solver input file.

pub mod inp;
pub mod instance;

pub use inp::{parse_inp, read_inp_parts};
pub use instance::{fetch_instance_mesh, fetch_instance_mesh_from};

use crate::error::{ExtractError, Result};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct MeshTables {
    /// Instance or part name, used in output file names.
    pub name: String,
    pub element_type: String,
    pub node_labels: Vec<i64>,
    /// One row per node, same order as `node_labels`.
    pub coordinates: Vec<Vec<f64>>,
    pub element_labels: Vec<i64>,
    /// One row per element, same order as `element_labels`.
    pub connectivity: Vec<Vec<i64>>,
}

impl MeshTables {
    pub fn node_count(&self) -> usize {
        self.node_labels.len()
    }

    pub fn element_count(&self) -> usize {
        self.element_labels.len()
    }

    pub fn nodes_per_element(&self) -> usize {
        self.connectivity.first().map_or(0, Vec::len)
    }

    /// Every element must have the same number of nodes and every node the
    /// same number of coordinates.
    pub fn check_consistent(&self) -> Result<()> {
        let expected = self.nodes_per_element();
        if let Some(i) = self.connectivity.iter().position(|c| c.len() != expected) {
            return Err(ExtractError::InconsistentMesh {
                instance: self.name.clone(),
                message: format!(
                    "element {} has {} nodes, expected {}",
                    self.element_labels[i],
                    self.connectivity[i].len(),
                    expected
                ),
            });
        }

        let dimensions = self.coordinates.first().map_or(0, Vec::len);
        if let Some(i) = self.coordinates.iter().position(|c| c.len() != dimensions) {
            return Err(ExtractError::InconsistentMesh {
                instance: self.name.clone(),
                message: format!(
                    "node {} has {} coordinates, expected {}",
                    self.node_labels[i],
                    self.coordinates[i].len(),
                    dimensions
                ),
            });
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mixed_element_sizes_are_rejected() {
        let mesh = MeshTables {
            name: "PLATE".to_string(),
            element_type: "CPE4".to_string(),
            node_labels: vec![1, 2, 3, 4],
            coordinates: vec![vec![0.0, 0.0]; 4],
            element_labels: vec![1, 2],
            connectivity: vec![vec![1, 2, 3, 4], vec![1, 2, 3]],
        };

        match mesh.check_consistent() {
            Err(ExtractError::InconsistentMesh { instance, message }) => {
                assert_eq!(instance, "PLATE");
                assert!(message.contains("element 2"));
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }
}
