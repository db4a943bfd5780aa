pub mod archive;
pub mod cli;
pub mod config;
pub mod error;
pub mod export;
pub mod extraction;
pub mod mesh;
pub mod ui;

// Public API re-exports
pub use cli::{Cli, Command, OutputFormat};
pub use config::{CliOverrides, Config, ExtractionConfig, MeshConfig, OutputConfig};
pub use error::{ExtractError, Result, UserFriendlyError};

// Core functionality re-exports
pub use archive::{ArchiveHandle, JsonArchive, ResultArchive, SetKind};
pub use export::{ConfigSnapshot, ExtractionReport, OutputManager, TabularExporter};
pub use extraction::{
    CrackHistory, ExtractionMode, ExtractionOptions, ExtractionPlan, ExtractionProgress,
    ExtractionRequest, FieldExtractor, FieldResult, MarkerRule, Reduction,
};
pub use mesh::MeshTables;
pub use ui::{OutputFormatter, OutputMode, ProgressManager};

use export::output_manager::{archive_stem, report_file_name};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

/// Files and timings produced by one field extraction.
#[derive(Debug)]
pub struct FieldExport {
    pub result: FieldResult,
    pub files: Vec<PathBuf>,
    pub report: Option<PathBuf>,
    pub duration: Duration,
}

/// Main library interface tying extraction, export and terminal output together.
pub struct OdbExtract {
    config: Config,
    output_formatter: OutputFormatter,
    progress_manager: ProgressManager,
}

impl OdbExtract {
    pub fn new(config: Config, output_mode: OutputMode, verbose: u8, quiet: bool) -> Self {
        let output_formatter = OutputFormatter::new(output_mode, verbose, quiet);
        let progress_manager = ProgressManager::new(!quiet && output_mode == OutputMode::Human);

        Self {
            config,
            output_formatter,
            progress_manager,
        }
    }

    pub fn from_cli(cli_args: &Cli) -> Result<Self> {
        let config = cli_args.load_config()?;
        let output_mode = match cli_args.output_format {
            OutputFormat::Human => OutputMode::Human,
            OutputFormat::Json => OutputMode::Json,
            OutputFormat::Plain => OutputMode::Plain,
        };

        Ok(Self::new(config, output_mode, cli_args.verbose, cli_args.quiet))
    }

    /// Builds a validated request from command-line strings.
    pub fn field_request<P: Into<PathBuf>>(
        archive: P,
        set: &str,
        quantity: &str,
        mode: Option<&str>,
        reduction: Option<Reduction>,
    ) -> Result<ExtractionRequest> {
        let mode = mode.map(str::parse::<ExtractionMode>).transpose()?;
        ExtractionRequest::new(archive, set, quantity)?
            .with_mode(mode)?
            .with_reduction(reduction)
    }

    /// Extracts one quantity over one set and writes its CSV tables and report.
    pub fn extract_field(&self, request: &ExtractionRequest) -> Result<FieldExport> {
        let start_time = Instant::now();
        self.output_formatter.start_operation(&format!(
            "Extracting {} over set {}",
            request.quantity.name, request.set
        ));

        let frame_progress = self.progress_manager.create_frame_progress(0);
        let progress_callback = {
            let pb = frame_progress.clone();
            move |progress: &ExtractionProgress| {
                ui::progress::update_frame_progress(&pb, progress);
            }
        };

        let extractor = FieldExtractor::new(self.config.extraction_options());
        let result = extractor.extract(request, Some(&progress_callback));
        let result = match result {
            Ok(result) => result,
            Err(e) => {
                frame_progress.abandon();
                self.progress_manager.clear();
                return Err(e);
            }
        };

        ui::progress::finish_progress_with_summary(
            &frame_progress,
            &format!("Read {} frames", result.frame_count()),
            start_time.elapsed(),
        );

        if result.skipped_frames > 0 {
            self.output_formatter.info(&format!(
                "Skipped {} frames whose marker repeated an earlier one",
                result.skipped_frames
            ));
        }

        let output_manager = self.setup_output_directory()?;
        if self.config.output.write_report {
            output_manager.prepare(&report_file_name(
                &archive_stem(&result.archive),
                &result.set,
                result.quantity,
            ))?;
        }
        let files = TabularExporter::new(&output_manager).export_field(&result)?;
        let duration = start_time.elapsed();

        let report = if self.config.output.write_report {
            let (path, _) = output_manager.create_extraction_report(
                &result,
                &files,
                duration,
                &self.create_config_snapshot(),
            )?;
            Some(path)
        } else {
            None
        };

        Ok(FieldExport {
            result,
            files,
            report,
            duration,
        })
    }

    /// Resolves the set and frame axis without reading any values.
    pub fn plan_field(&self, request: &ExtractionRequest) -> Result<ExtractionPlan> {
        FieldExtractor::new(self.config.extraction_options()).plan(request)
    }

    pub fn extract_history<P: AsRef<Path>>(
        &self,
        archive: P,
        step: &str,
        crack: &str,
    ) -> Result<(CrackHistory, PathBuf)> {
        let archive = archive.as_ref();
        self.output_formatter
            .start_operation(&format!("Reading J-integral history for {} in {}", crack, step));

        let spinner = self.progress_manager.create_spinner("Reading history output");
        let history = extraction::fetch_j_integral(archive, step, crack);
        spinner.finish_and_clear();
        let history = history?;

        let output_manager = self.setup_output_directory()?;
        let path = TabularExporter::new(&output_manager)
            .export_history(&archive.to_string_lossy(), &history)?;

        Ok((history, path))
    }

    pub fn export_instance_mesh<P: AsRef<Path>>(
        &self,
        archive: P,
        instance: &str,
    ) -> Result<Vec<PathBuf>> {
        let archive = archive.as_ref();
        self.output_formatter
            .start_operation(&format!("Reading mesh of instance {}", instance));

        let mesh = mesh::fetch_instance_mesh(archive, instance, self.config.mesh.exact_instance_key)?;
        self.output_formatter.info(&format!(
            "{}: {} nodes, {} {} elements",
            mesh.name,
            mesh.node_count(),
            mesh.element_count(),
            mesh.element_type
        ));

        let output_manager = self.setup_output_directory()?;
        TabularExporter::new(&output_manager).export_mesh(&archive.to_string_lossy(), &mesh)
    }

    pub fn export_inp_mesh<P: AsRef<Path>>(&self, input: P, part: Option<&str>) -> Result<Vec<PathBuf>> {
        let input = input.as_ref();
        self.output_formatter
            .start_operation(&format!("Parsing input file {}", input.display()));

        let parts = mesh::read_inp_parts(input, part)?;
        let output_manager = self.setup_output_directory()?;
        let exporter = TabularExporter::new(&output_manager);

        let mut written = Vec::new();
        for mesh in &parts {
            self.output_formatter.info(&format!(
                "Part {}: {} nodes, {} elements",
                mesh.name,
                mesh.node_count(),
                mesh.element_count()
            ));
            written.extend(exporter.export_mesh(&input.to_string_lossy(), mesh)?);
        }

        Ok(written)
    }

    fn setup_output_directory(&self) -> Result<OutputManager> {
        let output_manager = OutputManager::new(self.config.output.directory.clone())
            .with_overwrite(self.config.output.overwrite);
        output_manager.initialize()?;
        Ok(output_manager)
    }

    fn create_config_snapshot(&self) -> ConfigSnapshot {
        ConfigSnapshot {
            marker_rule: self.config.extraction.marker_rule,
            require_single_instance: self.config.extraction.require_single_instance,
            overwrite: self.config.output.overwrite,
        }
    }

    pub fn generate_sample_config<P: AsRef<Path>>(output_path: P) -> Result<()> {
        let sample_config = Config::create_sample_config();
        std::fs::write(output_path.as_ref(), sample_config)?;
        Ok(())
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn output_formatter(&self) -> &OutputFormatter {
        &self.output_formatter
    }

    pub fn progress_manager(&self) -> &ProgressManager {
        &self.progress_manager
    }

    pub fn handle_error(&self, error: &ExtractError) {
        self.output_formatter.print_user_friendly_error(error);
    }
}

pub fn version_info() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

pub fn build_info() -> BuildInfo {
    BuildInfo {
        version: env!("CARGO_PKG_VERSION"),
        git_hash: option_env!("GIT_HASH").unwrap_or("unknown"),
        build_date: option_env!("BUILD_DATE").unwrap_or("unknown"),
        target: std::env::consts::ARCH.to_string(),
    }
}

#[derive(Debug, Clone)]
pub struct BuildInfo {
    pub version: &'static str,
    pub git_hash: &'static str,
    pub build_date: &'static str,
    pub target: String,
}

impl std::fmt::Display for BuildInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "odb-extract {} ({}) built on {} for {}",
            self.version, self.git_hash, self.build_date, self.target
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::archive::fixtures;
    use tempfile::TempDir;

    fn write_archive(dir: &Path) -> PathBuf {
        let path = dir.join("plate.odb");
        let json = serde_json::to_string(&fixtures::two_element_archive_data()).unwrap();
        std::fs::write(&path, json).unwrap();
        path
    }

    fn quiet_extractor(output: &Path) -> OdbExtract {
        let mut config = Config::default();
        config.output.directory = output.to_path_buf();
        OdbExtract::new(config, OutputMode::Plain, 0, true)
    }

    #[test]
    fn test_field_request_parsing() {
        let request =
            OdbExtract::field_request("plate.odb", "tip", "mises", Some("element-average"), None)
                .unwrap();
        assert_eq!(request.set, "TIP");
        assert_eq!(request.mode, ExtractionMode::ElementAverage);

        assert!(matches!(
            OdbExtract::field_request("plate.odb", "TIP", "MISES", Some("corner"), None),
            Err(ExtractError::UnknownMode { .. })
        ));
        assert!(matches!(
            OdbExtract::field_request("plate.odb", "TIP", "MISES", None, Some(Reduction::Sum)),
            Err(ExtractError::IncompatibleMode { .. })
        ));
    }

    #[test]
    fn test_extract_field_writes_tables_and_report() {
        let temp_dir = TempDir::new().unwrap();
        let archive = write_archive(temp_dir.path());
        let output = temp_dir.path().join("out");
        let app = quiet_extractor(&output);

        let request = OdbExtract::field_request(&archive, "TIP", "MISES", None, None).unwrap();
        let export = app.extract_field(&request).unwrap();

        assert_eq!(export.result.frame_count(), 4);
        assert_eq!(export.files, vec![output.join("plate_TIP-NODE_MISES.csv")]);

        let report_path = export.report.unwrap();
        assert!(report_path.ends_with("plate_TIP_MISES_report.json"));
        let report: ExtractionReport =
            serde_json::from_str(&std::fs::read_to_string(report_path).unwrap()).unwrap();
        assert_eq!(report.frames, 4);
        assert_eq!(report.entities, 2);
        assert_eq!(report.files, vec!["plate_TIP-NODE_MISES.csv".to_string()]);
    }

    #[test]
    fn test_existing_component_file_blocks_whole_export() {
        let temp_dir = TempDir::new().unwrap();
        let archive = write_archive(temp_dir.path());
        let output = temp_dir.path().join("out");
        std::fs::create_dir_all(&output).unwrap();
        std::fs::write(output.join("plate_ALL-NODE_U2.csv"), "kept").unwrap();

        let mut config = Config::default();
        config.output.directory = output.clone();
        config.output.overwrite = false;
        let app = OdbExtract::new(config, OutputMode::Plain, 0, true);

        let request = OdbExtract::field_request(&archive, "ALL", "U", None, None).unwrap();
        assert!(matches!(
            app.extract_field(&request),
            Err(ExtractError::OutputExists { .. })
        ));

        let mut remaining: Vec<String> = std::fs::read_dir(&output)
            .unwrap()
            .map(|entry| entry.unwrap().file_name().to_string_lossy().to_string())
            .collect();
        remaining.sort();
        assert_eq!(remaining, vec!["plate_ALL-NODE_U2.csv".to_string()]);
        assert_eq!(
            std::fs::read_to_string(output.join("plate_ALL-NODE_U2.csv")).unwrap(),
            "kept"
        );
    }

    #[test]
    fn test_existing_report_blocks_tables() {
        let temp_dir = TempDir::new().unwrap();
        let archive = write_archive(temp_dir.path());
        let output = temp_dir.path().join("out");
        std::fs::create_dir_all(&output).unwrap();
        std::fs::write(output.join("plate_TIP_MISES_report.json"), "{}").unwrap();

        let mut config = Config::default();
        config.output.directory = output.clone();
        config.output.overwrite = false;
        let app = OdbExtract::new(config, OutputMode::Plain, 0, true);

        let request = OdbExtract::field_request(&archive, "TIP", "MISES", None, None).unwrap();
        assert!(app.extract_field(&request).is_err());
        assert!(!output.join("plate_TIP-NODE_MISES.csv").exists());
    }

    #[test]
    fn test_report_can_be_disabled() {
        let temp_dir = TempDir::new().unwrap();
        let archive = write_archive(temp_dir.path());
        let output = temp_dir.path().join("out");
        let mut config = Config::default();
        config.output.directory = output.clone();
        config.output.write_report = false;
        let app = OdbExtract::new(config, OutputMode::Plain, 0, true);

        let request = OdbExtract::field_request(&archive, "ALL", "U", None, None).unwrap();
        let export = app.extract_field(&request).unwrap();
        assert!(export.report.is_none());
        assert_eq!(export.files.len(), 2);
    }

    #[test]
    fn test_failed_extraction_writes_nothing() {
        let temp_dir = TempDir::new().unwrap();
        let archive = write_archive(temp_dir.path());
        let output = temp_dir.path().join("out");
        let app = quiet_extractor(&output);

        let request = OdbExtract::field_request(&archive, "NOPE", "MISES", None, None).unwrap();
        assert!(matches!(
            app.extract_field(&request),
            Err(ExtractError::SetNotFound { .. })
        ));
        assert!(!output.exists());
    }

    #[test]
    fn test_plan_field() {
        let temp_dir = TempDir::new().unwrap();
        let archive = write_archive(temp_dir.path());
        let app = quiet_extractor(temp_dir.path());

        let request = OdbExtract::field_request(&archive, "TIP", "U", None, None).unwrap();
        let plan = app.plan_field(&request).unwrap();
        assert_eq!(plan.frames, 4);
        assert_eq!(plan.entities, 2);
    }

    #[test]
    fn test_history_and_mesh_exports() {
        let temp_dir = TempDir::new().unwrap();
        let archive = write_archive(temp_dir.path());
        let output = temp_dir.path().join("out");
        let app = quiet_extractor(&output);

        let (history, path) = app.extract_history(&archive, "Step-2", "crack-1").unwrap();
        assert_eq!(history.contour_count(), 2);
        assert!(path.ends_with("plate_J-integral_CRACK-1.csv"));

        let files = app.export_instance_mesh(&archive, "part-1-1").unwrap();
        assert_eq!(files.len(), 2);
        assert!(output.join("plate_PART-1-1_elemConnect.csv").exists());
    }

    #[test]
    fn test_sample_config_generation() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("sample.toml");

        OdbExtract::generate_sample_config(&config_path).unwrap();

        let content = std::fs::read_to_string(&config_path).unwrap();
        assert!(content.contains("[extraction]"));
        assert!(content.contains("[output]"));
        assert!(content.contains("[mesh]"));
    }

    #[test]
    fn test_build_info_display() {
        assert!(!version_info().is_empty());
        let build_info = build_info();
        let display_string = build_info.to_string();
        assert!(display_string.contains("odb-extract"));
        assert!(display_string.contains(build_info.version));
    }
}
