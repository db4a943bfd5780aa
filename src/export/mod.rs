pub mod output_manager;
pub mod tabular;

pub use output_manager::{archive_stem, safe_filename, ConfigSnapshot, ExtractionReport, OutputManager};
pub use tabular::{field_file_names, TabularExporter};
