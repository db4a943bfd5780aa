use crate::config::{CliOverrides, Config};
use crate::error::Result;
use crate::extraction::{MarkerRule, Reduction};
use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "odb-extract")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Extract field and history output from finite-element result archives")]
#[command(
    long_about = "odb-extract reads a result archive, resolves an assembly-level node or element set, \
                  and writes per-frame tables of averaged field output, J-integral contours or mesh \
                  tables as CSV files."
)]
#[command(after_help = "EXAMPLES:\n  \
    odb-extract field plate.odb TIP MISES\n  \
    odb-extract field plate.odb BODY PEEQ --mode element-average\n  \
    odb-extract field plate.odb TIP RF --reduce sum --output results\n  \
    odb-extract history plate.odb Step-2 crack-1\n  \
    odb-extract mesh plate.odb PART-1-1\n  \
    odb-extract inp plate.inp --part Plate\n  \
    odb-extract config odb-extract.toml")]
#[command(arg_required_else_help = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Configuration file path
    #[arg(short, long, global = true, help = "Path to TOML configuration file")]
    pub config: Option<PathBuf>,

    /// Directory the CSV files are written to
    #[arg(short, long, global = true)]
    pub output: Option<PathBuf>,

    /// Output format for results
    #[arg(long, global = true, value_enum, default_value_t = OutputFormat::Human)]
    pub output_format: OutputFormat,

    /// Verbose output level (-v, -vv)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Quiet mode (suppress non-essential output)
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Fail instead of replacing existing output files
    #[arg(long, global = true)]
    pub no_overwrite: bool,

    /// Skip the JSON extraction report
    #[arg(long, global = true)]
    pub no_report: bool,

    /// How frame markers are derived from step and frame values
    #[arg(long, global = true, value_enum)]
    pub marker_rule: Option<MarkerRule>,

    /// Accept sets whose members span several instances
    #[arg(long, global = true)]
    pub allow_multi_instance: bool,

    /// Show what would be extracted without writing anything
    #[arg(long, global = true)]
    pub dry_run: bool,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Extract a field quantity over a node or element set
    Field(FieldArgs),
    /// Extract J-integral contours for a crack
    History(HistoryArgs),
    /// Export node coordinates and connectivity of an assembly instance
    Mesh(MeshArgs),
    /// Export node coordinates and connectivity of parts in an input file
    Inp(InpArgs),
    /// Write a sample configuration file
    Config(ConfigArgs),
}

#[derive(Args, Debug)]
pub struct FieldArgs {
    /// Result archive (".odb" is appended when the path has no extension)
    pub archive: PathBuf,

    /// Assembly-level set name
    pub set: String,

    /// Quantity name (PEEQ, MISES, PRESS, INV3, COORD, U, RF, EVOL)
    pub quantity: String,

    /// Extraction mode (nodal-average, element-average, nodal-extrapolated, nodal, initial-element)
    #[arg(short, long)]
    pub mode: Option<String>,

    /// Collapse the set to one column per component
    #[arg(long, value_enum)]
    pub reduce: Option<Reduction>,
}

#[derive(Args, Debug)]
pub struct HistoryArgs {
    pub archive: PathBuf,

    /// Step holding the history output
    pub step: String,

    /// Crack name as used in the history output names
    pub crack: String,
}

#[derive(Args, Debug)]
pub struct MeshArgs {
    pub archive: PathBuf,

    /// Instance name
    pub instance: String,

    /// Match the first instance whose name contains INSTANCE
    #[arg(long)]
    pub partial: bool,
}

#[derive(Args, Debug)]
pub struct InpArgs {
    /// Solver input file
    pub input: PathBuf,

    /// Only export the named part
    #[arg(long)]
    pub part: Option<String>,
}

#[derive(Args, Debug)]
pub struct ConfigArgs {
    /// Where to write the sample (defaults to odb-extract.toml)
    pub path: Option<PathBuf>,
}

#[derive(Debug, Clone, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable colored output
    Human,
    /// JSON formatted output
    Json,
    /// Plain text output
    Plain,
}

impl Cli {
    pub fn load_config(&self) -> Result<Config> {
        let mut config = Config::load_with_defaults(self.config.as_ref())?;

        let overrides = self.create_cli_overrides();
        config.merge_with_cli_args(&overrides);
        config.validate()?;

        Ok(config)
    }

    pub fn create_cli_overrides(&self) -> CliOverrides {
        let exact_instance_key = match &self.command {
            Command::Mesh(args) if args.partial => Some(false),
            _ => None,
        };

        CliOverrides::new()
            .with_output_dir(self.output.clone())
            .with_overwrite(self.no_overwrite.then_some(false))
            .with_write_report(self.no_report.then_some(false))
            .with_marker_rule(self.marker_rule)
            .with_require_single_instance(self.allow_multi_instance.then_some(false))
            .with_exact_instance_key(exact_instance_key)
    }

    pub fn is_verbose(&self) -> bool {
        self.verbose > 0 && !self.quiet
    }

    pub fn verbosity_level(&self) -> u8 {
        if self.quiet {
            0
        } else {
            self.verbose
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(args).unwrap()
    }

    #[test]
    fn test_field_command() {
        let cli = parse(&[
            "odb-extract", "field", "plate.odb", "tip", "mises", "--mode", "element-average",
        ]);

        match cli.command {
            Command::Field(args) => {
                assert_eq!(args.archive, PathBuf::from("plate.odb"));
                assert_eq!(args.set, "tip");
                assert_eq!(args.quantity, "mises");
                assert_eq!(args.mode.as_deref(), Some("element-average"));
                assert!(args.reduce.is_none());
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = parse(&[
            "odb-extract", "field", "plate.odb", "TIP", "RF", "--reduce", "sum", "-o", "out",
            "--no-overwrite", "--marker-rule", "total-time",
        ]);

        assert_eq!(cli.output, Some(PathBuf::from("out")));
        assert!(cli.no_overwrite);
        assert_eq!(cli.marker_rule, Some(MarkerRule::TotalTime));
        match cli.command {
            Command::Field(args) => assert_eq!(args.reduce, Some(Reduction::Sum)),
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_missing_positional_is_rejected() {
        assert!(Cli::try_parse_from(["odb-extract", "history", "plate.odb", "Step-2"]).is_err());
        assert!(Cli::try_parse_from(["odb-extract", "field", "plate.odb", "TIP", "U", "--reduce", "max"]).is_err());
    }

    #[test]
    fn test_quiet_conflicts_with_verbose() {
        assert!(Cli::try_parse_from(["odb-extract", "-q", "-v", "config"]).is_err());
    }

    #[test]
    fn test_cli_overrides() {
        let cli = parse(&[
            "odb-extract", "mesh", "plate.odb", "part", "--partial", "--allow-multi-instance",
        ]);
        let overrides = cli.create_cli_overrides();

        assert_eq!(overrides.exact_instance_key, Some(false));
        assert_eq!(overrides.require_single_instance, Some(false));
        assert!(overrides.overwrite.is_none());
        assert!(overrides.output_dir.is_none());
    }

    #[test]
    fn test_verbosity_level() {
        let cli = parse(&["odb-extract", "-vv", "config"]);
        assert!(cli.is_verbose());
        assert_eq!(cli.verbosity_level(), 2);

        let cli = parse(&["odb-extract", "--quiet", "config"]);
        assert!(!cli.is_verbose());
        assert_eq!(cli.verbosity_level(), 0);
    }
}
