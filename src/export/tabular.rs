//! CSV writers for field tables, history tables and mesh tables.
//!
//! Field table layout, one file per component:
//!
//! ```text
//! "node (right):", 10, 11
//! "frame (below):", "", ""
//! 0.0, 4.0, 7.0
//! 0.5, 5.0, 8.0
//! ```

use crate::error::Result;
use crate::export::output_manager::{archive_stem, OutputManager};
use crate::extraction::{CrackHistory, FieldResult};
use crate::mesh::MeshTables;
use std::io::Write;
use std::path::PathBuf;

pub struct TabularExporter<'a> {
    output: &'a OutputManager,
}

impl<'a> TabularExporter<'a> {
    pub fn new(output: &'a OutputManager) -> Self {
        Self { output }
    }

    /// Writes a field result. Reduced results go to one file with a column
    /// per component; otherwise each component gets its own file. Every
    /// target is checked and written before any of them is replaced.
    pub fn export_field(&self, result: &FieldResult) -> Result<Vec<PathBuf>> {
        let files = field_file_names(result);
        let targets = self.output.prepare_all(files.iter().map(|(name, _)| name))?;

        let mut staged = Vec::with_capacity(targets.len());
        for (path, (_, component)) in targets.into_iter().zip(&files) {
            staged.push(
                self.output
                    .stage(path, |out| write_field_table(out, result, *component))?,
            );
        }

        let written = self.output.commit(staged)?;
        for path in &written {
            tracing::info!(path = %path.display(), "wrote field table");
        }
        Ok(written)
    }

    pub fn export_history(&self, archive: &str, history: &CrackHistory) -> Result<PathBuf> {
        let name = format!(
            "{}_{}_{}.csv",
            archive_stem(archive),
            crate::extraction::history::J_INTEGRAL,
            history.crack
        );
        let path = self
            .output
            .write_file(&name, |out| write_history_table(out, history))?;
        tracing::info!(path = %path.display(), "wrote history table");
        Ok(path)
    }

    /// Writes `<source>_<NAME>_nodesCoords.csv` and `<source>_<NAME>_elemConnect.csv`.
    pub fn export_mesh(&self, source: &str, mesh: &MeshTables) -> Result<Vec<PathBuf>> {
        let stem = archive_stem(source);
        let nodes_path = self
            .output
            .prepare(&format!("{}_{}_nodesCoords.csv", stem, mesh.name))?;
        let elements_path = self
            .output
            .prepare(&format!("{}_{}_elemConnect.csv", stem, mesh.name))?;

        let nodes = self.output.stage(nodes_path, |out| {
            write_indexed_rows(out, &mesh.coordinates, |v| format!("{:?}", v))
        })?;
        let elements = self.output.stage(elements_path, |out| {
            write_indexed_rows(out, &mesh.connectivity, |v| v.to_string())
        })?;
        let written = self.output.commit(vec![nodes, elements])?;

        tracing::info!(
            mesh = %mesh.name,
            nodes = mesh.node_count(),
            elements = mesh.element_count(),
            "wrote mesh tables"
        );
        Ok(written)
    }
}

/// File names for a field result, paired with the component each holds
/// (`None` for a reduced table holding all components).
pub fn field_file_names(result: &FieldResult) -> Vec<(String, Option<usize>)> {
    let prefix = format!(
        "{}_{}-{}",
        archive_stem(&result.archive),
        result.set,
        match result.kind {
            crate::archive::SetKind::Node => "NODE",
            crate::archive::SetKind::Element => "ELEM",
        }
    );

    if let Some(reduction) = result.reduction {
        return vec![(
            format!("{}_{}{}.csv", prefix, reduction.prefix(), result.quantity),
            None,
        )];
    }

    if result.component_labels.len() == 1 {
        return vec![(format!("{}_{}.csv", prefix, result.component_labels[0]), Some(0))];
    }

    result
        .component_labels
        .iter()
        .enumerate()
        .map(|(i, label)| (format!("{}_{}.csv", prefix, label), Some(i)))
        .collect()
}

pub fn write_field_table<W: Write>(out: &mut W, result: &FieldResult, component: Option<usize>) -> Result<()> {
    let headers: Vec<String> = match component {
        Some(_) => result.columns.iter().map(|c| c.to_string()).collect(),
        None => result.component_labels.clone(),
    };
    write_table_header(out, result.column_heading(), &headers)?;

    for (row, marker) in result.markers.iter().enumerate() {
        write!(out, "{:?}", marker)?;
        match component {
            Some(c) => {
                for entity in 0..result.columns.len() {
                    write!(out, ", {:?}", result.values.get(row, entity, c))?;
                }
            }
            None => {
                for c in 0..result.component_labels.len() {
                    write!(out, ", {:?}", result.values.get(row, 0, c))?;
                }
            }
        }
        writeln!(out)?;
    }

    Ok(())
}

fn write_table_header<W: Write>(out: &mut W, heading: &str, headers: &[String]) -> Result<()> {
    write!(out, "\"{} (right):\"", heading)?;
    for header in headers {
        write!(out, ", {}", header)?;
    }
    writeln!(out)?;

    write!(out, "\"frame (below):\"")?;
    for _ in headers {
        write!(out, ", \"\"")?;
    }
    writeln!(out)?;
    Ok(())
}

pub fn write_history_table<W: Write>(out: &mut W, history: &CrackHistory) -> Result<()> {
    write!(out, "\"\"")?;
    for label in &history.contour_labels {
        write!(out, ", {}", label)?;
    }
    writeln!(out)?;

    write!(out, "\"\"")?;
    for number in &history.contour_numbers {
        write!(out, ", {}", number)?;
    }
    writeln!(out)?;

    for (marker, row) in history.markers.iter().zip(&history.rows) {
        write!(out, "{:?}", marker)?;
        for value in row {
            write!(out, ", {:?}", value)?;
        }
        writeln!(out)?;
    }

    Ok(())
}

/// One line per row, prefixed with its 1-based position.
pub fn write_indexed_rows<W, T, F>(out: &mut W, rows: &[Vec<T>], format: F) -> Result<()>
where
    W: Write,
    F: Fn(&T) -> String,
{
    for (i, row) in rows.iter().enumerate() {
        write!(out, "{}", i + 1)?;
        for value in row {
            write!(out, ", {}", format(value))?;
        }
        writeln!(out)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::archive::fixtures;
    use crate::extraction::{
        fetch_j_integral_from, ExtractionMode, ExtractionRequest, FieldExtractor, Reduction,
    };
    use tempfile::TempDir;

    fn extract(set: &str, quantity: &str, mode: Option<ExtractionMode>, reduction: Option<Reduction>) -> FieldResult {
        let archive = fixtures::two_element_archive();
        let request = ExtractionRequest::new("plate.odb", set, quantity)
            .and_then(|r| r.with_mode(mode))
            .and_then(|r| r.with_reduction(reduction))
            .unwrap();
        FieldExtractor::default()
            .extract_from(&archive, &request, None)
            .unwrap()
    }

    fn render(result: &FieldResult, component: Option<usize>) -> String {
        let mut out = Vec::new();
        write_field_table(&mut out, result, component).unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn test_nodal_average_table() {
        let result = extract("TIP", "MISES", None, None);
        let text = render(&result, Some(0));
        let lines: Vec<&str> = text.lines().collect();

        assert_eq!(lines[0], "\"node (right):\", 10, 11");
        assert_eq!(lines[1], "\"frame (below):\", \"\", \"\"");
        assert_eq!(lines[2], "0.0, 4.0, 7.0");
        assert_eq!(lines[3], "0.5, 5.0, 8.0");
        assert_eq!(lines[5], "2.0, 8.0, 11.0");
        assert_eq!(lines.len(), 6);
    }

    #[test]
    fn test_file_names() {
        let result = extract("TIP", "MISES", None, None);
        assert_eq!(
            field_file_names(&result),
            vec![("plate_TIP-NODE_MISES.csv".to_string(), Some(0))]
        );

        let body = extract("BODY", "PEEQ", Some(ExtractionMode::ElementAverage), None);
        assert_eq!(field_file_names(&body)[0].0, "plate_BODY-ELEM_PEEQ.csv");

        let vectors = extract("TIP", "U", None, None);
        let names: Vec<String> = field_file_names(&vectors).into_iter().map(|(n, _)| n).collect();
        assert_eq!(names, vec!["plate_TIP-NODE_U1.csv", "plate_TIP-NODE_U2.csv"]);

        let summed = extract("TIP", "RF", None, Some(Reduction::Sum));
        assert_eq!(field_file_names(&summed)[0].0, "plate_TIP-NODE_summedRF.csv");
    }

    #[test]
    fn test_reduced_table_has_component_columns() {
        let result = extract("TIP", "RF", None, Some(Reduction::Sum));
        let text = render(&result, None);
        let lines: Vec<&str> = text.lines().collect();

        assert_eq!(lines[0], "\"component (right):\", summedRF1, summedRF2");
        assert_eq!(lines[3], "0.5, 21.0, 42.0");
    }

    #[test]
    fn test_corner_table_headers() {
        let result = extract("BODY", "MISES", Some(ExtractionMode::NodalExtrapolated), None);
        let text = render(&result, Some(0));
        assert!(text.starts_with("\"element:node (right):\", 1:10, 1:11, 1:21, 1:20, 2:12, 2:10"));
    }

    #[test]
    fn test_history_table() {
        let archive = fixtures::two_element_archive();
        let history = fetch_j_integral_from(&archive, "Step-2", "CRACK-1").unwrap();
        let mut out = Vec::new();
        write_history_table(&mut out, &history).unwrap();
        let text = String::from_utf8(out).unwrap();

        assert_eq!(
            text,
            "\"\", Contour_1, Contour_2\n\"\", 1, 2\n1.0, 0.0, 0.0\n1.5, 1.0, 1.1\n2.0, 2.0, 2.2\n"
        );
    }

    #[test]
    fn test_export_writes_files() {
        let temp_dir = TempDir::new().unwrap();
        let manager = OutputManager::new(temp_dir.path());
        let exporter = TabularExporter::new(&manager);

        let written = exporter.export_field(&extract("ALL", "U", None, None)).unwrap();
        assert_eq!(written.len(), 2);
        assert!(temp_dir.path().join("plate_ALL-NODE_U2.csv").exists());

        let archive = fixtures::two_element_archive();
        let mesh = crate::mesh::fetch_instance_mesh_from(&archive, "PART-1-1", true).unwrap();
        let written = exporter.export_mesh("plate.odb", &mesh).unwrap();
        let nodes = std::fs::read_to_string(&written[0]).unwrap();
        assert!(written[0].ends_with("plate_PART-1-1_nodesCoords.csv"));
        assert_eq!(nodes.lines().nth(1), Some("2, 1.0, 0.0, 0.0"));
        let elements = std::fs::read_to_string(&written[1]).unwrap();
        assert_eq!(elements.lines().next(), Some("1, 10, 11, 21, 20"));
    }
}
