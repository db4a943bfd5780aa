//! Line-oriented reader for part meshes in a solver input deck.
//!
//! Only `*Part`, `*End Part`, `*Node` and `*Element` are interpreted; every
//! other keyword ends the current data block. Keywords and parameter names
//! are case-insensitive, `**` starts a comment line.

use crate::error::{ExtractError, Result};
use crate::mesh::MeshTables;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Block {
    None,
    Nodes,
    Elements,
}

/// Value of a `key=value` keyword parameter, matched case-insensitively.
fn parameter(line: &str, key: &str) -> Option<String> {
    line.split(',').skip(1).find_map(|p| {
        let (name, value) = p.split_once('=')?;
        name.trim()
            .eq_ignore_ascii_case(key)
            .then(|| value.trim().trim_matches('"').to_string())
    })
}

#[derive(Debug, Default)]
pub struct InpParser;

impl InpParser {
    pub fn new() -> Self {
        Self
    }

    /// Parses every part, or only `part` when given (case-insensitive).
    pub fn parse<R: BufRead>(&self, reader: R, part: Option<&str>) -> Result<Vec<MeshTables>> {
        let mut parts = Vec::new();
        let mut current: Option<MeshTables> = None;
        let mut block = Block::None;
        let mut pending: Option<(usize, String)> = None;

        for (index, line) in reader.lines().enumerate() {
            let line = line?;
            let number = index + 1;
            let trimmed = line.trim();

            if trimmed.is_empty() || trimmed.starts_with("**") {
                continue;
            }

            if trimmed.starts_with('*') {
                if let Some((start, text)) = pending.take() {
                    if let Some(mesh) = current.as_mut() {
                        push_element(mesh, &text, start)?;
                    }
                }

                let keyword = trimmed
                    .split(',')
                    .next()
                    .unwrap_or_default()
                    .trim()
                    .to_lowercase();

                match keyword.as_str() {
                    "*part" => {
                        if let Some(mesh) = current.take() {
                            finish_part(mesh, &mut parts)?;
                        }
                        let name = parameter(trimmed, "name").ok_or_else(|| {
                            ExtractError::MeshParse {
                                line: number,
                                message: "*Part without a name".to_string(),
                            }
                        })?;
                        current = Some(MeshTables {
                            name,
                            ..Default::default()
                        });
                        block = Block::None;
                    }
                    "*end part" => {
                        if let Some(mesh) = current.take() {
                            finish_part(mesh, &mut parts)?;
                        }
                        block = Block::None;
                    }
                    "*node" if current.is_some() => block = Block::Nodes,
                    "*element" if current.is_some() => {
                        let element_type = parameter(trimmed, "type").ok_or_else(|| {
                            ExtractError::MeshParse {
                                line: number,
                                message: "*Element without a type".to_string(),
                            }
                        })?;
                        if let Some(mesh) = current.as_mut() {
                            if mesh.element_type.is_empty() {
                                mesh.element_type = element_type;
                            }
                        }
                        block = Block::Elements;
                    }
                    _ => block = Block::None,
                }
                continue;
            }

            let Some(mesh) = current.as_mut() else {
                continue;
            };

            match block {
                Block::Nodes => {
                    let fields = split_fields(trimmed);
                    let (label, coords) = fields.split_first().ok_or_else(|| ExtractError::MeshParse {
                        line: number,
                        message: "empty node line".to_string(),
                    })?;
                    mesh.node_labels.push(parse_label(label, number)?);
                    mesh.coordinates.push(
                        coords
                            .iter()
                            .map(|c| parse_coordinate(c, number))
                            .collect::<Result<Vec<f64>>>()?,
                    );
                }
                Block::Elements => {
                    // a trailing comma continues the element on the next line
                    let (start, mut text) = pending.take().unwrap_or((number, String::new()));
                    text.push_str(trimmed);
                    if trimmed.ends_with(',') {
                        pending = Some((start, text));
                    } else {
                        push_element(mesh, &text, start)?;
                    }
                }
                Block::None => {}
            }
        }

        if let Some(mut mesh) = current.take() {
            if let Some((start, text)) = pending.take() {
                push_element(&mut mesh, &text, start)?;
            }
            finish_part(mesh, &mut parts)?;
        }

        match part {
            Some(wanted) => {
                let found: Vec<MeshTables> = parts
                    .into_iter()
                    .filter(|p| p.name.eq_ignore_ascii_case(wanted.trim()))
                    .collect();
                if found.is_empty() {
                    return Err(ExtractError::PartNotFound {
                        part: wanted.to_string(),
                        path: String::new(),
                    });
                }
                Ok(found)
            }
            None => Ok(parts),
        }
    }
}

pub fn parse_inp<R: BufRead>(reader: R, part: Option<&str>) -> Result<Vec<MeshTables>> {
    InpParser::new().parse(reader, part)
}

/// Reads part meshes from an input file on disk.
pub fn read_inp_parts<P: AsRef<Path>>(path: P, part: Option<&str>) -> Result<Vec<MeshTables>> {
    let path = path.as_ref();
    let file = File::open(path)?;

    parse_inp(BufReader::new(file), part).map_err(|e| match e {
        ExtractError::PartNotFound { part, .. } => ExtractError::PartNotFound {
            part,
            path: path.display().to_string(),
        },
        other => other,
    })
}

fn split_fields(line: &str) -> Vec<&str> {
    line.split(',')
        .map(str::trim)
        .filter(|f| !f.is_empty())
        .collect()
}

fn parse_label(field: &str, line: usize) -> Result<i64> {
    field.parse().map_err(|_| ExtractError::MeshParse {
        line,
        message: format!("expected an integer label, found '{}'", field),
    })
}

fn parse_coordinate(field: &str, line: usize) -> Result<f64> {
    field.parse().map_err(|_| ExtractError::MeshParse {
        line,
        message: format!("expected a coordinate, found '{}'", field),
    })
}

fn push_element(mesh: &mut MeshTables, text: &str, line: usize) -> Result<()> {
    let fields = split_fields(text);
    let (label, nodes) = fields.split_first().ok_or_else(|| ExtractError::MeshParse {
        line,
        message: "empty element line".to_string(),
    })?;

    mesh.element_labels.push(parse_label(label, line)?);
    mesh.connectivity.push(
        nodes
            .iter()
            .map(|n| parse_label(n, line))
            .collect::<Result<Vec<i64>>>()?,
    );
    Ok(())
}

fn finish_part(mesh: MeshTables, parts: &mut Vec<MeshTables>) -> Result<()> {
    mesh.check_consistent()?;
    tracing::debug!(
        part = %mesh.name,
        nodes = mesh.node_count(),
        elements = mesh.element_count(),
        "parsed part"
    );
    parts.push(mesh);
    Ok(())
}
