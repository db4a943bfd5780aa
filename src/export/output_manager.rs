use crate::error::{ExtractError, Result};
use crate::extraction::{FieldResult, MarkerRule};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tempfile::NamedTempFile;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionReport {
    pub archive: String,
    pub set: String,
    pub set_kind: String,
    pub quantity: String,
    pub mode: String,
    pub reduction: Option<String>,
    pub frames: usize,
    pub entities: usize,
    pub components: Vec<String>,
    pub skipped_frames: usize,
    pub files: Vec<String>,
    pub extraction_time: DateTime<Utc>,
    pub extraction_duration: Duration,
    pub config_used: ConfigSnapshot,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigSnapshot {
    pub marker_rule: MarkerRule,
    pub require_single_instance: bool,
    pub overwrite: bool,
}

/// Owns the output directory and the overwrite policy for every file written.
pub struct OutputManager {
    output_directory: PathBuf,
    overwrite: bool,
}

impl OutputManager {
    pub fn new<P: Into<PathBuf>>(output_directory: P) -> Self {
        Self {
            output_directory: output_directory.into(),
            overwrite: true,
        }
    }

    pub fn with_overwrite(mut self, overwrite: bool) -> Self {
        self.overwrite = overwrite;
        self
    }

    pub fn initialize(&self) -> Result<()> {
        if !self.output_directory.exists() {
            fs::create_dir_all(&self.output_directory)?;
        }
        Ok(())
    }

    pub fn output_directory(&self) -> &Path {
        &self.output_directory
    }

    /// Path for `file_name` inside the output directory. Fails if the file
    /// exists and overwriting is disabled. Nothing is touched on disk.
    pub fn prepare(&self, file_name: &str) -> Result<PathBuf> {
        let path = self.output_directory.join(safe_filename(file_name));

        if !self.overwrite && path.exists() {
            return Err(ExtractError::OutputExists {
                path: path.display().to_string(),
            });
        }

        Ok(path)
    }

    /// Checks every target before any of them is written.
    pub fn prepare_all<I>(&self, file_names: I) -> Result<Vec<PathBuf>>
    where
        I: IntoIterator,
        I::Item: AsRef<str>,
    {
        file_names
            .into_iter()
            .map(|name| self.prepare(name.as_ref()))
            .collect()
    }

    /// Writes the contents of `path` into a temporary file in the output
    /// directory. The target only appears once the staged file is committed.
    pub fn stage<F>(&self, path: PathBuf, write: F) -> Result<StagedFile>
    where
        F: FnOnce(&mut BufWriter<&fs::File>) -> Result<()>,
    {
        let temp = NamedTempFile::new_in(&self.output_directory)?;
        {
            let mut out = BufWriter::new(temp.as_file());
            write(&mut out)?;
            out.flush()?;
        }
        Ok(StagedFile { path, temp })
    }

    /// Moves staged files onto their targets. Dropping a `StagedFile`
    /// without committing it deletes the temporary file.
    pub fn commit(&self, staged: Vec<StagedFile>) -> Result<Vec<PathBuf>> {
        staged.into_iter().map(|file| self.persist(file)).collect()
    }

    /// Prepares, stages and commits a single file.
    pub fn write_file<F>(&self, file_name: &str, write: F) -> Result<PathBuf>
    where
        F: FnOnce(&mut BufWriter<&fs::File>) -> Result<()>,
    {
        let path = self.prepare(file_name)?;
        let staged = self.stage(path, write)?;
        self.persist(staged)
    }

    fn persist(&self, StagedFile { path, temp }: StagedFile) -> Result<PathBuf> {
        let persisted = if self.overwrite {
            temp.persist(&path)
        } else {
            temp.persist_noclobber(&path)
        };
        persisted.map_err(|e| match e.error.kind() {
            std::io::ErrorKind::AlreadyExists => ExtractError::OutputExists {
                path: path.display().to_string(),
            },
            _ => ExtractError::Io(e.error),
        })?;
        tracing::debug!(path = %path.display(), "committed output");
        Ok(path)
    }

    pub fn create_extraction_report(
        &self,
        result: &FieldResult,
        files: &[PathBuf],
        duration: Duration,
        config: &ConfigSnapshot,
    ) -> Result<(PathBuf, ExtractionReport)> {
        let report = ExtractionReport {
            archive: result.archive.clone(),
            set: result.set.clone(),
            set_kind: result.kind.to_string(),
            quantity: result.quantity.to_string(),
            mode: result.mode.to_string(),
            reduction: result.reduction.map(|r| r.prefix().to_string()),
            frames: result.frame_count(),
            entities: result.columns.len(),
            components: result.component_labels.clone(),
            skipped_frames: result.skipped_frames,
            files: files
                .iter()
                .filter_map(|p| p.file_name())
                .map(|n| n.to_string_lossy().to_string())
                .collect(),
            extraction_time: Utc::now(),
            extraction_duration: duration,
            config_used: config.clone(),
        };

        let path = self.save_report_json(&archive_stem(&result.archive), &report)?;
        Ok((path, report))
    }

    fn save_report_json(&self, stem: &str, report: &ExtractionReport) -> Result<PathBuf> {
        let json_content =
            serde_json::to_string_pretty(report).map_err(|e| ExtractError::Config {
                message: format!("Failed to serialize report to JSON: {}", e),
            })?;

        self.write_file(
            &report_file_name(stem, &report.set, &report.quantity),
            |out| Ok(out.write_all(json_content.as_bytes())?),
        )
    }
}

/// A fully written temporary file waiting to be moved onto its target.
#[derive(Debug)]
pub struct StagedFile {
    path: PathBuf,
    temp: NamedTempFile,
}

impl StagedFile {
    pub fn path(&self) -> &Path {
        &self.path
    }
}

pub fn report_file_name(stem: &str, set: &str, quantity: &str) -> String {
    format!("{}_{}_{}_report.json", stem, set, quantity)
}

/// File name of the archive without its extension.
pub fn archive_stem(archive: &str) -> String {
    Path::new(archive)
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| archive.to_string())
}

/// Strips characters that are not allowed in Windows file names.
pub fn safe_filename(name: &str) -> String {
    name.chars()
        .filter(|c| !matches!(c, '<' | '>' | ':' | '"' | '/' | '\\' | '|' | '?' | '*'))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_safe_filename() {
        assert_eq!(safe_filename("plate_TIP-NODE_MISES.csv"), "plate_TIP-NODE_MISES.csv");
        assert_eq!(safe_filename("a<b>c:d\"e/f\\g|h?i*j.csv"), "abcdefghij.csv");
    }

    #[test]
    fn test_archive_stem() {
        assert_eq!(archive_stem("plate.odb"), "plate");
        assert_eq!(archive_stem("plate"), "plate");
    }

    #[test]
    fn test_write_file_replaces_existing_file() {
        let temp_dir = TempDir::new().unwrap();
        let manager = OutputManager::new(temp_dir.path());
        let existing = temp_dir.path().join("old.csv");
        fs::write(&existing, "stale").unwrap();

        assert_eq!(manager.prepare("old.csv").unwrap(), existing);
        assert_eq!(fs::read_to_string(&existing).unwrap(), "stale");

        let path = manager
            .write_file("old.csv", |out| Ok(out.write_all(b"fresh")?))
            .unwrap();
        assert_eq!(path, existing);
        assert_eq!(fs::read_to_string(&existing).unwrap(), "fresh");
    }

    #[test]
    fn test_prepare_refuses_without_overwrite() {
        let temp_dir = TempDir::new().unwrap();
        let manager = OutputManager::new(temp_dir.path()).with_overwrite(false);
        fs::write(temp_dir.path().join("old.csv"), "stale").unwrap();

        assert!(matches!(
            manager.prepare_all(["new.csv", "old.csv"]),
            Err(ExtractError::OutputExists { .. })
        ));
        assert_eq!(fs::read_to_string(temp_dir.path().join("old.csv")).unwrap(), "stale");
        assert!(!temp_dir.path().join("new.csv").exists());
    }

    #[test]
    fn test_failed_write_leaves_no_file() {
        let temp_dir = TempDir::new().unwrap();
        let manager = OutputManager::new(temp_dir.path());

        let result = manager.write_file("broken.csv", |out| {
            out.write_all(b"0.0, 1.0\n")?;
            Err(ExtractError::Config {
                message: "interrupted".to_string(),
            })
        });

        assert!(result.is_err());
        assert_eq!(fs::read_dir(temp_dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_staged_files_appear_on_commit() {
        let temp_dir = TempDir::new().unwrap();
        let manager = OutputManager::new(temp_dir.path());
        let target = manager.prepare("a.csv").unwrap();

        let staged = manager
            .stage(target.clone(), |out| Ok(out.write_all(b"1")?))
            .unwrap();
        assert_eq!(staged.path(), target.as_path());
        assert!(!target.exists());

        assert_eq!(manager.commit(vec![staged]).unwrap(), vec![target.clone()]);
        assert_eq!(fs::read_to_string(&target).unwrap(), "1");
    }

    #[test]
    fn test_initialize_creates_directory() {
        let temp_dir = TempDir::new().unwrap();
        let nested = temp_dir.path().join("results").join("run-1");
        let manager = OutputManager::new(&nested);

        manager.initialize().unwrap();
        assert!(nested.is_dir());
        assert_eq!(manager.output_directory(), nested.as_path());
    }
}
