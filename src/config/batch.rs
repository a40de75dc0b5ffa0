// src/config/batch.rs

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::data_model::Command;
use crate::error::{PipelineError, Result};
use crate::geocoder::{ApiParams, GeocoderConfig};
use crate::pipeline::readers::line_reader::default_input_columns;
use crate::pipeline::{FieldLookup, OutputOrder, RetryConfig};

pub const MAX_WORKERS: usize = 20;
pub const MAX_TIMEOUT_SECS: u64 = 60;
pub const MAX_RETRIES: u32 = 60;

pub const DEFAULT_ADD_COLUMNS: &[&str] = &[
    "lat",
    "lng",
    "_type",
    "_category",
    "country_code",
    "country",
    "state",
    "county",
    "_normalized_city",
    "postcode",
    "road",
    "house_number",
    "confidence",
    "formatted",
];

/// Everything the batch executor needs to know about one run.
#[derive(Debug, Clone)]
pub struct BatchOptions {
    pub command: Command,
    /// First input line is a header.
    pub headers: bool,
    /// 1-based. Empty selects the whole row.
    pub input_columns: Vec<usize>,
    pub add_columns: Vec<String>,
    pub workers: usize,
    pub retry: RetryConfig,
    pub api_params: ApiParams,
    /// Maximum rows to process. 0 processes everything.
    pub limit: usize,
    pub order: OutputOrder,
    pub dry_run: bool,
    pub show_progress: bool,
    pub verbose: bool,
    pub field_lookup: FieldLookup,
}

impl BatchOptions {
    pub fn new(command: Command) -> Self {
        let mut api_params = ApiParams::new();
        api_params.insert("no_annotations".to_string(), "1".to_string());

        BatchOptions {
            command,
            headers: false,
            input_columns: default_input_columns(command),
            add_columns: DEFAULT_ADD_COLUMNS.iter().map(|c| c.to_string()).collect(),
            workers: 1,
            retry: RetryConfig::default(),
            api_params,
            limit: 0,
            order: OutputOrder::Ordered,
            dry_run: false,
            show_progress: true,
            verbose: false,
            field_lookup: FieldLookup::default(),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.workers == 0 || self.workers > MAX_WORKERS {
            return Err(PipelineError::ConfigValidationError(format!(
                "workers must be between 1 and {}, got {}",
                MAX_WORKERS, self.workers
            )));
        }
        if self.input_columns.contains(&0) {
            return Err(PipelineError::ConfigValidationError(
                "A column 0 in --input-columns does not exist. The lowest possible number is 1."
                    .to_string(),
            ));
        }
        if self.add_columns.is_empty() {
            return Err(PipelineError::ConfigValidationError(
                "add_columns must name at least one column".to_string(),
            ));
        }
        if self.retry.max_tries == 0 {
            return Err(PipelineError::ConfigValidationError(
                "retries must be at least 1".to_string(),
            ));
        }
        if self.field_lookup.groups().is_empty() {
            return Err(PipelineError::ConfigValidationError(
                "field_groups must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

/// Retry tuning accepted in the YAML file.
#[derive(Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct RetryFileConfig {
    pub base_delay_ms: Option<u64>,
    pub max_backoff_ms: Option<u64>,
    pub max_elapsed_secs: Option<u64>,
    pub jitter: Option<bool>,
}

/// Optional YAML defaults, layered between built-in defaults and CLI flags.
#[derive(Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    pub workers: Option<usize>,
    /// Seconds.
    pub timeout: Option<u64>,
    pub retries: Option<u32>,
    pub api_domain: Option<String>,
    pub add_columns: Option<Vec<String>>,
    pub input_columns: Option<Vec<usize>>,
    pub optional_api_params: Option<BTreeMap<String, String>>,
    pub retry: Option<RetryFileConfig>,
    /// Dotted paths, `""` for the top level.
    pub field_groups: Option<Vec<String>>,
}

impl FileConfig {
    pub fn validate(&self) -> Result<()> {
        if let Some(workers) = self.workers {
            if workers == 0 || workers > MAX_WORKERS {
                return Err(PipelineError::ConfigValidationError(format!(
                    "workers must be between 1 and {}, got {}",
                    MAX_WORKERS, workers
                )));
            }
        }
        if let Some(timeout) = self.timeout {
            if timeout == 0 || timeout > MAX_TIMEOUT_SECS {
                return Err(PipelineError::ConfigValidationError(format!(
                    "timeout must be between 1 and {} seconds, got {}",
                    MAX_TIMEOUT_SECS, timeout
                )));
            }
        }
        if let Some(retries) = self.retries {
            if retries == 0 || retries > MAX_RETRIES {
                return Err(PipelineError::ConfigValidationError(format!(
                    "retries must be between 1 and {}, got {}",
                    MAX_RETRIES, retries
                )));
            }
        }
        if let Some(domain) = &self.api_domain {
            if domain.trim().is_empty() {
                return Err(PipelineError::ConfigValidationError(
                    "api_domain must not be empty".to_string(),
                ));
            }
        }
        if matches!(&self.add_columns, Some(columns) if columns.is_empty()) {
            return Err(PipelineError::ConfigValidationError(
                "add_columns must name at least one column".to_string(),
            ));
        }
        if matches!(&self.input_columns, Some(columns) if columns.contains(&0)) {
            return Err(PipelineError::ConfigValidationError(
                "input_columns are 1-based, 0 is not a valid column".to_string(),
            ));
        }
        if matches!(&self.field_groups, Some(groups) if groups.is_empty()) {
            return Err(PipelineError::ConfigValidationError(
                "field_groups must not be empty".to_string(),
            ));
        }
        if let Some(retry) = &self.retry {
            if retry.max_elapsed_secs == Some(0) {
                return Err(PipelineError::ConfigValidationError(
                    "retry.max_elapsed_secs must be greater than 0".to_string(),
                ));
            }
            if let (Some(base), Some(max)) = (retry.base_delay_ms, retry.max_backoff_ms) {
                if base > max {
                    return Err(PipelineError::ConfigValidationError(format!(
                        "retry.base_delay_ms ({}) must not exceed retry.max_backoff_ms ({})",
                        base, max
                    )));
                }
            }
        }
        Ok(())
    }

    /// Overlays the values present in the file onto `options` and `geocoder`.
    pub fn apply(&self, options: &mut BatchOptions, geocoder: &mut GeocoderConfig) {
        if let Some(workers) = self.workers {
            options.workers = workers;
        }
        if let Some(timeout) = self.timeout {
            geocoder.request_timeout = Duration::from_secs(timeout);
        }
        if let Some(retries) = self.retries {
            options.retry.max_tries = retries;
        }
        if let Some(domain) = &self.api_domain {
            geocoder.api_domain = domain.clone();
        }
        if let Some(columns) = &self.add_columns {
            options.add_columns = columns.clone();
        }
        if let Some(columns) = &self.input_columns {
            options.input_columns = columns.clone();
        }
        if let Some(params) = &self.optional_api_params {
            options
                .api_params
                .extend(params.iter().map(|(k, v)| (k.clone(), v.clone())));
        }
        if let Some(retry) = &self.retry {
            if let Some(ms) = retry.base_delay_ms {
                options.retry.base_delay = Duration::from_millis(ms);
            }
            if let Some(ms) = retry.max_backoff_ms {
                options.retry.max_backoff = Duration::from_millis(ms);
            }
            if let Some(secs) = retry.max_elapsed_secs {
                options.retry.max_elapsed = Duration::from_secs(secs);
            }
            if let Some(jitter) = retry.jitter {
                options.retry.jitter = jitter;
            }
        }
        if let Some(groups) = &self.field_groups {
            options.field_lookup = FieldLookup::from_paths(groups);
        }
    }
}

/// Loads and validates the batch configuration YAML file.
pub fn load_batch_config<P: AsRef<Path>>(config_path: P) -> Result<FileConfig> {
    let path_ref = config_path.as_ref();
    let config_content = fs::read_to_string(path_ref).map_err(|e| {
        PipelineError::ConfigError(format!(
            "Failed to read batch config file '{}': {}",
            path_ref.display(),
            e
        ))
    })?;

    // An empty file is an empty config.
    if config_content.trim().is_empty() {
        return Ok(FileConfig::default());
    }

    let config: FileConfig = serde_yaml::from_str(&config_content).map_err(|e| {
        PipelineError::ConfigError(format!(
            "Failed to parse batch config YAML from '{}': {}",
            path_ref.display(),
            e
        ))
    })?;

    config.validate()?;

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn create_temp_config_file(content: &str) -> NamedTempFile {
        let mut temp_file = NamedTempFile::new().expect("Failed to create temp file");
        writeln!(temp_file, "{}", content).expect("Failed to write to temp file");
        temp_file
    }

    #[test]
    fn defaults_are_valid() {
        let options = BatchOptions::new(Command::Forward);
        options.validate().unwrap();
        assert_eq!(options.input_columns, vec![1]);
        assert_eq!(options.add_columns.len(), DEFAULT_ADD_COLUMNS.len());
        assert_eq!(options.api_params.get("no_annotations").map(String::as_str), Some("1"));
        assert_eq!(BatchOptions::new(Command::Reverse).input_columns, vec![1, 2]);
    }

    #[test]
    fn zero_workers_are_rejected() {
        let mut options = BatchOptions::new(Command::Forward);
        options.workers = 0;
        assert!(matches!(
            options.validate(),
            Err(PipelineError::ConfigValidationError(_))
        ));
    }

    #[test]
    fn load_and_apply() {
        let file = create_temp_config_file(
            r#"
workers: 4
timeout: 5
retries: 3
api_domain: geocoder.internal
add_columns: [lat, lng, formatted]
optional_api_params:
  language: de
  no_annotations: "0"
retry:
  base_delay_ms: 250
  max_elapsed_secs: 30
  jitter: false
field_groups: ["", components]
"#,
        );
        let config = load_batch_config(file.path()).unwrap();

        let mut options = BatchOptions::new(Command::Forward);
        let mut geocoder = GeocoderConfig::new("key");
        config.apply(&mut options, &mut geocoder);

        assert_eq!(options.workers, 4);
        assert_eq!(options.retry.max_tries, 3);
        assert_eq!(options.retry.base_delay, Duration::from_millis(250));
        assert_eq!(options.retry.max_elapsed, Duration::from_secs(30));
        assert!(!options.retry.jitter);
        assert_eq!(options.add_columns, vec!["lat", "lng", "formatted"]);
        assert_eq!(options.api_params.get("language").map(String::as_str), Some("de"));
        assert_eq!(options.api_params.get("no_annotations").map(String::as_str), Some("0"));
        assert_eq!(options.field_lookup.groups().len(), 2);
        assert_eq!(geocoder.api_domain, "geocoder.internal");
        assert_eq!(geocoder.request_timeout, Duration::from_secs(5));
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let file = create_temp_config_file("wrokers: 2");
        let err = load_batch_config(file.path()).unwrap_err();
        assert!(matches!(err, PipelineError::ConfigError(_)));
        assert!(err.to_string().contains("Failed to parse batch config YAML"));
    }

    #[test]
    fn out_of_range_values_fail_validation() {
        let file = create_temp_config_file("workers: 21");
        assert!(matches!(
            load_batch_config(file.path()),
            Err(PipelineError::ConfigValidationError(_))
        ));

        let file = create_temp_config_file("timeout: 0");
        assert!(matches!(
            load_batch_config(file.path()),
            Err(PipelineError::ConfigValidationError(_))
        ));
    }

    #[test]
    fn missing_file_is_a_config_error() {
        let err = load_batch_config("/definitely/not/here.yaml").unwrap_err();
        assert!(err.to_string().contains("Failed to read batch config file"));
    }
}
