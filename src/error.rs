use thiserror::Error;

#[derive(Error, Debug)]
pub enum ExtractError {
    #[error("IO operation failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("Assembly level {kind} set named {set} does not exist in the output database {archive}")]
    SetNotFound {
        kind: String,
        set: String,
        archive: String,
    },

    #[error("{key} output request is not defined for all (or any?) steps of {archive}")]
    KeyNotDefined { key: String, archive: String },

    #[error("Unsupported quantity: {name}")]
    UnsupportedQuantity { name: String },

    #[error("{kind} {label} has no {key} samples in frame {frame} (set {set})")]
    MissingSample {
        kind: String,
        label: i64,
        key: String,
        frame: usize,
        set: String,
    },

    #[error("Set {set} spans more than one instance: {}", .instances.join(", "))]
    MultiInstanceSet { set: String, instances: Vec<String> },

    #[error("Label {label} of set {set} belongs to several instances: {}", .instances.join(", "))]
    LabelCollision {
        set: String,
        label: i64,
        instances: Vec<String>,
    },

    #[error("Unknown extraction mode: {mode}")]
    UnknownMode { mode: String },

    #[error("Extraction mode {mode} cannot be used with {quantity}")]
    IncompatibleMode { mode: String, quantity: String },

    #[error("Malformed archive {archive}: {message}")]
    Archive { archive: String, message: String },

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Step {step} does not exist in {archive}")]
    StepNotFound { step: String, archive: String },

    #[error("No usable history region in step {step}")]
    HistoryRegionNotFound { step: String, tried: Vec<String> },

    #[error("No J-integral history output found for crack {crack}")]
    CrackNotFound { crack: String },

    #[error("Instance {instance} is not defined in the assembly")]
    InstanceNotFound { instance: String },

    #[error("Inconsistent mesh in {instance}: {message}")]
    InconsistentMesh { instance: String, message: String },

    #[error("Part {part} not found in {path}")]
    PartNotFound { part: String, path: String },

    #[error("Input file parse error at line {line}: {message}")]
    MeshParse { line: usize, message: String },

    #[error("Output file already exists: {path}")]
    OutputExists { path: String },
}

pub trait UserFriendlyError {
    fn user_message(&self) -> String;
    fn suggestion(&self) -> Option<String>;
}

impl UserFriendlyError for ExtractError {
    fn user_message(&self) -> String {
        match self {
            ExtractError::SetNotFound { kind, set, archive } => {
                format!("No {} set named {} in {}", kind, set, archive)
            }
            ExtractError::KeyNotDefined { key, archive } => {
                format!("Field output {} is not recorded in {}", key, archive)
            }
            ExtractError::UnsupportedQuantity { name } => {
                format!("Quantity {} is not supported", name)
            }
            ExtractError::MissingSample {
                kind, label, key, set, ..
            } => {
                format!("{} {} of set {} carries no {} values", kind, label, set, key)
            }
            ExtractError::MultiInstanceSet { set, instances } => {
                format!(
                    "Set {} references {} instances ({})",
                    set,
                    instances.len(),
                    instances.join(", ")
                )
            }
            ExtractError::Archive { archive, message } => {
                format!("Could not read {}: {}", archive, message)
            }
            ExtractError::OutputExists { path } => {
                format!("Refusing to overwrite {}", path)
            }
            _ => self.to_string(),
        }
    }

    fn suggestion(&self) -> Option<String> {
        match self {
            ExtractError::SetNotFound { .. } => Some(
                "Set names are looked up at assembly level. Check the name, or define the set on the assembly rather than the part.".to_string()
            ),
            ExtractError::KeyNotDefined { .. } => Some(
                "Add the quantity to the field output request of every step and rerun the analysis.".to_string()
            ),
            ExtractError::UnsupportedQuantity { .. } => Some(
                "Supported quantities: PEEQ, MISES, PRESS, INV3, COORD, U, RF, EVOL.".to_string()
            ),
            ExtractError::MissingSample { .. } => Some(
                "The set probably touches elements that do not carry this quantity, or spans several instances.".to_string()
            ),
            ExtractError::MultiInstanceSet { .. } => Some(
                "Labels are local to an instance. Split the set per instance, or set extraction.require_single_instance = false at your own risk.".to_string()
            ),
            ExtractError::LabelCollision { .. } => Some(
                "Labels are only unique within an instance. Split the set so each instance is extracted on its own.".to_string()
            ),
            ExtractError::UnknownMode { .. } | ExtractError::IncompatibleMode { .. } => Some(
                "Integration point quantities accept nodal-average, element-average and nodal-extrapolated; nodal quantities accept nodal.".to_string()
            ),
            ExtractError::Config { .. } => Some(
                "Check your configuration file syntax and ensure all required fields are present.".to_string()
            ),
            ExtractError::InstanceNotFound { .. } => Some(
                "Instance names are upper-case. Use --partial to match on a fragment of the name.".to_string()
            ),
            ExtractError::OutputExists { .. } => Some(
                "Remove the file, choose another --output directory, or drop --no-overwrite.".to_string()
            ),
            _ => None,
        }
    }
}

impl From<toml::de::Error> for ExtractError {
    fn from(error: toml::de::Error) -> Self {
        ExtractError::Config {
            message: error.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, ExtractError>;
