use crate::error::{ExtractError, Result};
use crate::extraction::{ExtractionOptions, MarkerRule};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub extraction: ExtractionConfig,
    #[serde(default)]
    pub output: OutputConfig,
    #[serde(default)]
    pub mesh: MeshConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ExtractionConfig {
    pub marker_rule: MarkerRule,
    pub require_single_instance: bool,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct OutputConfig {
    pub directory: PathBuf,
    pub overwrite: bool,
    pub write_report: bool,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct MeshConfig {
    pub exact_instance_key: bool,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            marker_rule: MarkerRule::StepIndex,
            require_single_instance: true,
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            directory: PathBuf::from("."),
            overwrite: true,
            write_report: true,
        }
    }
}

impl Default for MeshConfig {
    fn default() -> Self {
        Self {
            exact_instance_key: true,
        }
    }
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(ExtractError::Config {
                message: format!("Configuration file not found: {}", path.display()),
            });
        }

        let content = std::fs::read_to_string(path).map_err(|e| ExtractError::Config {
            message: format!("Failed to read config file {}: {}", path.display(), e),
        })?;

        let config: Config = toml::from_str(&content).map_err(|e| ExtractError::Config {
            message: format!("Failed to parse config file {}: {}", path.display(), e),
        })?;

        tracing::debug!(path = %path.display(), "loaded configuration");
        Ok(config)
    }

    pub fn load_with_defaults<P: AsRef<Path>>(config_path: Option<P>) -> Result<Self> {
        match config_path {
            Some(path) => Self::load_from_file(path),
            None => {
                let default_paths = ["odb-extract.toml", ".odb-extract.toml"];

                for default_path in &default_paths {
                    if Path::new(default_path).exists() {
                        return Self::load_from_file(default_path);
                    }
                }

                Ok(Self::default())
            }
        }
    }

    pub fn merge_with_cli_args(&mut self, cli_args: &CliOverrides) {
        if let Some(ref output_dir) = cli_args.output_dir {
            self.output.directory = output_dir.clone();
        }

        if let Some(overwrite) = cli_args.overwrite {
            self.output.overwrite = overwrite;
        }

        if let Some(write_report) = cli_args.write_report {
            self.output.write_report = write_report;
        }

        if let Some(marker_rule) = cli_args.marker_rule {
            self.extraction.marker_rule = marker_rule;
        }

        if let Some(required) = cli_args.require_single_instance {
            self.extraction.require_single_instance = required;
        }

        if let Some(exact) = cli_args.exact_instance_key {
            self.mesh.exact_instance_key = exact;
        }
    }

    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let content = toml::to_string_pretty(self).map_err(|e| ExtractError::Config {
            message: format!("Failed to serialize config: {}", e),
        })?;

        std::fs::write(path, content).map_err(|e| ExtractError::Config {
            message: format!("Failed to write config file {}: {}", path.display(), e),
        })?;

        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.output.directory.as_os_str().is_empty() {
            return Err(ExtractError::Config {
                message: "Output directory must not be empty".to_string(),
            });
        }

        if self.output.directory.is_file() {
            return Err(ExtractError::Config {
                message: format!(
                    "Output directory is an existing file: {}",
                    self.output.directory.display()
                ),
            });
        }

        Ok(())
    }

    pub fn extraction_options(&self) -> ExtractionOptions {
        ExtractionOptions {
            marker_rule: self.extraction.marker_rule,
            require_single_instance: self.extraction.require_single_instance,
        }
    }

    pub fn create_sample_config() -> String {
        let sample_config = Self::default();
        toml::to_string_pretty(&sample_config).unwrap_or_else(|_| String::new())
    }
}

#[derive(Debug, Default)]
pub struct CliOverrides {
    pub output_dir: Option<PathBuf>,
    pub overwrite: Option<bool>,
    pub write_report: Option<bool>,
    pub marker_rule: Option<MarkerRule>,
    pub require_single_instance: Option<bool>,
    pub exact_instance_key: Option<bool>,
}

impl CliOverrides {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_output_dir(mut self, output_dir: Option<PathBuf>) -> Self {
        self.output_dir = output_dir;
        self
    }

    pub fn with_overwrite(mut self, overwrite: Option<bool>) -> Self {
        self.overwrite = overwrite;
        self
    }

    pub fn with_write_report(mut self, write_report: Option<bool>) -> Self {
        self.write_report = write_report;
        self
    }

    pub fn with_marker_rule(mut self, marker_rule: Option<MarkerRule>) -> Self {
        self.marker_rule = marker_rule;
        self
    }

    pub fn with_require_single_instance(mut self, required: Option<bool>) -> Self {
        self.require_single_instance = required;
        self
    }

    pub fn with_exact_instance_key(mut self, exact: Option<bool>) -> Self {
        self.exact_instance_key = exact;
        self
    }
}
