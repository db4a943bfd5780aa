use clap::Parser;
use odb_extract::{
    Cli, Command, ExtractError, OdbExtract, OutputFormatter, OutputMode, UserFriendlyError,
};
use std::path::PathBuf;
use std::process;
use tracing_subscriber::EnvFilter;

fn main() {
    let exit_code = run();
    process::exit(exit_code);
}

fn run() -> i32 {
    let cli = Cli::parse();
    setup_logging(cli.verbosity_level());

    if let Command::Config(args) = &cli.command {
        return handle_generate_config(args.path.clone());
    }

    let app = match OdbExtract::from_cli(&cli) {
        Ok(app) => app,
        Err(e) => {
            print_startup_error(&e);
            return exit_code(&e);
        }
    };

    if cli.dry_run {
        return handle_dry_run(&cli, &app);
    }

    let outcome = match &cli.command {
        Command::Field(args) => OdbExtract::field_request(
            &args.archive,
            &args.set,
            &args.quantity,
            args.mode.as_deref(),
            args.reduce,
        )
        .and_then(|request| app.extract_field(&request))
        .map(|export| {
            let mut files = export.files.clone();
            files.extend(export.report.clone());
            app.output_formatter()
                .print_field_summary(&export.result, &files, export.duration);
        }),
        Command::History(args) => app
            .extract_history(&args.archive, &args.step, &args.crack)
            .map(|(history, path)| {
                app.output_formatter().print_written_files(
                    &format!(
                        "{} J-integral contours for {}",
                        history.contour_count(),
                        history.crack
                    ),
                    &[path],
                );
            }),
        Command::Mesh(args) => app
            .export_instance_mesh(&args.archive, &args.instance)
            .map(|files| {
                app.output_formatter()
                    .print_written_files(&format!("Mesh of {}", args.instance), &files);
            }),
        Command::Inp(args) => app
            .export_inp_mesh(&args.input, args.part.as_deref())
            .map(|files| {
                app.output_formatter().print_written_files(
                    &format!("Mesh tables from {}", args.input.display()),
                    &files,
                );
            }),
        Command::Config(_) => Ok(()),
    };

    match outcome {
        Ok(()) => 0,
        Err(e) => {
            tracing::debug!(error = ?e, "command failed");
            app.handle_error(&e);
            exit_code(&e)
        }
    }
}

fn exit_code(error: &ExtractError) -> i32 {
    match error {
        ExtractError::UnsupportedQuantity { .. }
        | ExtractError::UnknownMode { .. }
        | ExtractError::IncompatibleMode { .. } => 2,
        ExtractError::SetNotFound { .. } => 3,
        ExtractError::KeyNotDefined { .. } => 4,
        ExtractError::MissingSample { .. } => 5,
        ExtractError::MultiInstanceSet { .. } | ExtractError::LabelCollision { .. } => 6,
        ExtractError::OutputExists { .. } => 7,
        _ => 1,
    }
}

fn handle_generate_config(path: Option<PathBuf>) -> i32 {
    let config_path = path.unwrap_or_else(|| PathBuf::from("odb-extract.toml"));

    match OdbExtract::generate_sample_config(&config_path) {
        Ok(()) => {
            println!("Generated sample configuration file: {}", config_path.display());
            println!("\nTo use this configuration:");
            println!(
                "  odb-extract --config {} field <ARCHIVE> <SET> <QUANTITY>",
                config_path.display()
            );
            0
        }
        Err(e) => {
            eprintln!("Failed to generate configuration file: {}", e.user_message());
            if let Some(suggestion) = e.suggestion() {
                eprintln!("Suggestion: {}", suggestion);
            }
            1
        }
    }
}

fn handle_dry_run(cli: &Cli, app: &OdbExtract) -> i32 {
    let formatter = app.output_formatter();
    let config = app.config();

    formatter.info("DRY RUN MODE - No files will be written");

    match &cli.command {
        Command::Field(args) => {
            let plan = OdbExtract::field_request(
                &args.archive,
                &args.set,
                &args.quantity,
                args.mode.as_deref(),
                args.reduce,
            )
            .and_then(|request| app.plan_field(&request));

            match plan {
                Ok(plan) => formatter.print_plan(&plan),
                Err(e) => {
                    app.handle_error(&e);
                    return exit_code(&e);
                }
            }
        }
        Command::History(args) => {
            formatter.info(&format!(
                "Would read J-integral contours of {} in step {} from {}",
                args.crack,
                args.step,
                args.archive.display()
            ));
        }
        Command::Mesh(args) => {
            formatter.info(&format!(
                "Would export the mesh of instance {} ({} match) from {}",
                args.instance,
                if config.mesh.exact_instance_key { "exact" } else { "partial" },
                args.archive.display()
            ));
        }
        Command::Inp(args) => {
            formatter.info(&format!(
                "Would export {} from {}",
                args.part.as_deref().unwrap_or("every part"),
                args.input.display()
            ));
        }
        Command::Config(_) => {}
    }

    formatter.info(&format!("Output directory: {}", config.output.directory.display()));
    formatter.info(&format!("Marker rule: {}", config.extraction.marker_rule.as_str()));
    if !config.output.overwrite {
        formatter.warning("Existing output files will not be replaced");
    }

    0
}

fn print_startup_error(error: &ExtractError) {
    let formatter = OutputFormatter::new(OutputMode::Human, 0, false);
    formatter.print_user_friendly_error(error);
}

fn setup_logging(verbosity: u8) {
    let default_directive = match verbosity {
        0 => "odb_extract=warn",
        1 => "odb_extract=info",
        _ => "odb_extract=debug",
    };

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_generate_config_command() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("test.toml");

        let exit_code = handle_generate_config(Some(config_path.clone()));
        assert_eq!(exit_code, 0);

        let content = std::fs::read_to_string(&config_path).unwrap();
        assert!(content.contains("[extraction]"));
    }

    #[test]
    fn test_exit_codes() {
        let missing_set = ExtractError::SetNotFound {
            kind: "node".to_string(),
            set: "TIP".to_string(),
            archive: "plate.odb".to_string(),
        };
        assert_eq!(exit_code(&missing_set), 3);

        let unsupported = ExtractError::UnsupportedQuantity {
            name: "S11".to_string(),
        };
        assert_eq!(exit_code(&unsupported), 2);

        let exists = ExtractError::OutputExists {
            path: "a.csv".to_string(),
        };
        assert_eq!(exit_code(&exists), 7);

        let collision = ExtractError::LabelCollision {
            set: "ALL".to_string(),
            label: 10,
            instances: vec!["PART-1-1".to_string(), "PART-2-1".to_string()],
        };
        assert_eq!(exit_code(&collision), 6);

        let config = ExtractError::Config {
            message: "bad".to_string(),
        };
        assert_eq!(exit_code(&config), 1);
    }
}
