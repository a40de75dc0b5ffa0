// tests/config_tests.rs

use std::io::Write;
use std::path::Path;
use std::time::Duration;

use clap::Parser;
use tempfile::{tempdir, NamedTempFile};

use GeoBlaster::config::{Cli, CliCommand, RunConfig};
use GeoBlaster::data_model::Command;
use GeoBlaster::error::PipelineError;
use GeoBlaster::pipeline::OutputOrder;

const KEY: &str = "0123456789abcdef0123456789abcdef";

fn create_temp_file(content: &str) -> NamedTempFile {
    let mut temp_file = NamedTempFile::new().expect("Failed to create temp file");
    write!(temp_file, "{}", content).expect("Failed to write to temp file");
    temp_file
}

fn parse(command: &str, input: &Path, output: &Path, extra: &[&str]) -> Result<Cli, clap::Error> {
    let mut argv = vec![
        "geoblaster".to_string(),
        command.to_string(),
        "--api-key".to_string(),
        KEY.to_string(),
        "--input".to_string(),
        input.display().to_string(),
        "--output".to_string(),
        output.display().to_string(),
    ];
    argv.extend(extra.iter().map(|s| s.to_string()));
    Cli::try_parse_from(argv)
}

#[test]
fn forward_defaults() {
    let input = create_temp_file("Berlin\n");
    let dir = tempdir().unwrap();
    let output = dir.path().join("out.csv");

    let cli = parse("forward", input.path(), &output, &[]).unwrap();
    assert!(matches!(cli.command, CliCommand::Forward(_)));
    let config = RunConfig::resolve(&cli.command).unwrap();

    assert_eq!(config.options.command, Command::Forward);
    assert_eq!(config.options.input_columns, vec![1]);
    assert_eq!(config.options.workers, 1);
    assert_eq!(config.options.retry.max_tries, 10);
    assert_eq!(config.options.order, OutputOrder::Ordered);
    assert_eq!(config.options.add_columns[0], "lat");
    assert_eq!(config.options.add_columns.len(), 14);
    assert_eq!(config.geocoder.api_domain, "api.opencagedata.com");
    assert_eq!(config.geocoder.request_timeout, Duration::from_secs(10));
    assert!(config.options.show_progress);
}

#[test]
fn reverse_defaults_to_two_columns() {
    let input = create_temp_file("51.9,7.6\n");
    let dir = tempdir().unwrap();
    let cli = parse("reverse", input.path(), &dir.path().join("out.csv"), &[]).unwrap();
    let config = RunConfig::resolve(&cli.command).unwrap();
    assert_eq!(config.options.input_columns, vec![1, 2]);
}

#[test]
fn flags_override_defaults() {
    let input = create_temp_file("1,Berlin\n");
    let dir = tempdir().unwrap();
    let cli = parse(
        "forward",
        input.path(),
        &dir.path().join("out.csv"),
        &[
            "--headers",
            "--input-columns",
            "2",
            "--add-columns",
            "lat,lng,formatted",
            "--workers",
            "5",
            "--timeout",
            "3",
            "--retries",
            "2",
            "--api-domain",
            "localhost:8080",
            "--optional-api-params",
            "language=fr,no_annotations=0",
            "--limit",
            "10",
            "--unordered",
            "--quiet",
            "--verbose",
        ],
    )
    .unwrap();
    let config = RunConfig::resolve(&cli.command).unwrap();
    let options = &config.options;

    assert!(options.headers);
    assert_eq!(options.input_columns, vec![2]);
    assert_eq!(options.add_columns, vec!["lat", "lng", "formatted"]);
    assert_eq!(options.workers, 5);
    assert_eq!(options.retry.max_tries, 2);
    assert_eq!(options.limit, 10);
    assert_eq!(options.order, OutputOrder::Unordered);
    assert!(!options.show_progress);
    assert!(options.verbose);
    assert!(config.quiet);
    assert_eq!(options.api_params.get("language").map(String::as_str), Some("fr"));
    assert_eq!(options.api_params.get("no_annotations").map(String::as_str), Some("0"));
    assert_eq!(config.geocoder.api_domain, "localhost:8080");
    assert_eq!(config.geocoder.request_timeout, Duration::from_secs(3));
}

#[test]
fn invalid_api_key_is_rejected() {
    let input = create_temp_file("x\n");
    let argv = [
        "geoblaster",
        "forward",
        "--api-key",
        "not-a-key",
        "--input",
        input.path().to_str().unwrap(),
        "--output",
        "out.csv",
    ];
    assert!(Cli::try_parse_from(argv).is_err());
}

#[test]
fn out_of_range_values_are_rejected() {
    let input = create_temp_file("x\n");
    let out = Path::new("out.csv");
    assert!(parse("forward", input.path(), out, &["--workers", "21"]).is_err());
    assert!(parse("forward", input.path(), out, &["--workers", "0"]).is_err());
    assert!(parse("forward", input.path(), out, &["--timeout", "61"]).is_err());
    assert!(parse("forward", input.path(), out, &["--retries", "0"]).is_err());
    assert!(parse("forward", input.path(), out, &["--optional-api-params", "novalue"]).is_err());
}

#[test]
fn column_zero_is_a_validation_error() {
    let input = create_temp_file("x\n");
    let dir = tempdir().unwrap();
    let cli = parse(
        "forward",
        input.path(),
        &dir.path().join("out.csv"),
        &["--input-columns", "0,1"],
    )
    .unwrap();
    let err = RunConfig::resolve(&cli.command).unwrap_err();
    assert!(matches!(err, PipelineError::ConfigValidationError(_)));
    assert!(err
        .to_string()
        .contains("A column 0 in --input-columns does not exist. The lowest possible number is 1."));
}

#[test]
fn existing_output_needs_overwrite() {
    let input = create_temp_file("x\n");
    let output = create_temp_file("old\n");

    let cli = parse("forward", input.path(), output.path(), &[]).unwrap();
    let err = RunConfig::resolve(&cli.command).unwrap_err();
    assert!(err.to_string().contains("already exists. You can add --overwrite to your command."));

    let cli = parse("forward", input.path(), output.path(), &["--overwrite"]).unwrap();
    assert!(RunConfig::resolve(&cli.command).unwrap().overwrite);

    let cli = parse("forward", input.path(), output.path(), &["--dry-run"]).unwrap();
    assert!(RunConfig::resolve(&cli.command).unwrap().options.dry_run);
}

#[test]
fn missing_input_is_reported() {
    let dir = tempdir().unwrap();
    let cli = parse(
        "forward",
        &dir.path().join("missing.csv"),
        &dir.path().join("out.csv"),
        &[],
    )
    .unwrap();
    assert!(RunConfig::resolve(&cli.command).is_err());
}

#[test]
fn yaml_file_sits_between_defaults_and_flags() {
    let input = create_temp_file("x\n");
    let yaml = create_temp_file(
        "workers: 3\ntimeout: 20\nadd_columns: [formatted]\nretry:\n  jitter: false\n",
    );
    let dir = tempdir().unwrap();
    let cli = parse(
        "forward",
        input.path(),
        &dir.path().join("out.csv"),
        &["--config", yaml.path().to_str().unwrap(), "--workers", "7"],
    )
    .unwrap();
    let config = RunConfig::resolve(&cli.command).unwrap();

    assert_eq!(config.options.workers, 7);
    assert_eq!(config.geocoder.request_timeout, Duration::from_secs(20));
    assert_eq!(config.options.add_columns, vec!["formatted"]);
    assert!(!config.options.retry.jitter);
}

#[test]
fn bad_yaml_file_is_a_config_error() {
    let input = create_temp_file("x\n");
    let yaml = create_temp_file("workers: [not, a, number]\n");
    let dir = tempdir().unwrap();
    let cli = parse(
        "forward",
        input.path(),
        &dir.path().join("out.csv"),
        &["--config", yaml.path().to_str().unwrap()],
    )
    .unwrap();
    assert!(matches!(
        RunConfig::resolve(&cli.command),
        Err(PipelineError::ConfigError(_))
    ));
}
