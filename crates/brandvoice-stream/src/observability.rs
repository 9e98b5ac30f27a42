use std::path::{Path, PathBuf};

use once_cell::sync::OnceCell;
use tracing_subscriber::layer::SubscriberExt as _;
use tracing_subscriber::util::SubscriberInitExt as _;

const ENABLED_ENV: &str = "BRANDVOICE_OBSERVABILITY_ENABLED";
const LEVEL_ENV: &str = "BRANDVOICE_LOG_LEVEL";
const JSON_PATH_ENV: &str = "BRANDVOICE_JSON_LOG_PATH";
const DEFAULT_JSON_FILE: &str = "brandvoice.logs.jsonl";

static INIT: OnceCell<()> = OnceCell::new();

/// Logging setup resolved from the environment.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
struct Settings {
    enabled: bool,
    level: Option<String>,
    json_path: Option<PathBuf>,
}

impl Settings {
    fn resolve(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let enabled = lookup(ENABLED_ENV)
            .map(|value| parse_bool_env(&value).unwrap_or(true))
            .unwrap_or(true);
        Self {
            enabled,
            level: lookup(LEVEL_ENV).filter(|level| !level.trim().is_empty()),
            json_path: lookup(JSON_PATH_ENV)
                .filter(|path| !path.trim().is_empty())
                .map(PathBuf::from),
        }
    }

    fn env_filter(&self) -> tracing_subscriber::EnvFilter {
        if let Some(level) = self.level.as_deref()
            && let Ok(filter) = tracing_subscriber::EnvFilter::try_new(level)
        {
            return filter;
        }
        tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"))
    }
}

fn parse_bool_env(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" | "enabled" => Some(true),
        "0" | "false" | "no" | "off" | "disabled" => Some(false),
        _ => None,
    }
}

/// Splits a log file path into the directory and file name the appender needs.
fn split_log_path(path: &Path) -> (PathBuf, String) {
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."));
    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or(DEFAULT_JSON_FILE)
        .to_string();
    (dir, file_name)
}

/// Initialize logging once per process.
///
/// Environment variables:
/// - `BRANDVOICE_OBSERVABILITY_ENABLED`: optional enable/disable flag (default enabled).
/// - `BRANDVOICE_LOG_LEVEL`: optional level/filter override (`info`, `brandvoice_stream=debug`, ...).
/// - `BRANDVOICE_JSON_LOG_PATH`: optional log file path. If set, logs are JSONL in that file.
///   If unset, logs go to stderr in a compact console format so stdout stays free
///   for generated content.
/// - `RUST_LOG`: filter used when no level override is set.
pub fn init_observability() {
    INIT.get_or_init(|| {
        let settings = Settings::resolve(|key| std::env::var(key).ok());
        if !settings.enabled {
            return;
        }

        let env_filter = settings.env_filter();
        if let Some(path) = settings.json_path.as_deref() {
            let (dir, file_name) = split_log_path(path);
            let _ = std::fs::create_dir_all(&dir);
            let writer = tracing_appender::rolling::never(dir, file_name);
            let json_layer = tracing_subscriber::fmt::layer()
                .json()
                .with_current_span(true)
                .with_span_list(true)
                .with_target(false)
                .with_writer(writer);
            let _ = tracing_subscriber::registry()
                .with(env_filter)
                .with(json_layer)
                .try_init();
        } else {
            let console_layer = tracing_subscriber::fmt::layer()
                .compact()
                .with_target(false)
                .with_writer(std::io::stderr);
            let _ = tracing_subscriber::registry()
                .with(env_filter)
                .with(console_layer)
                .try_init();
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| vars.get(key).cloned()
    }

    #[test]
    fn enabled_by_default_and_on_unknown_values() {
        assert!(Settings::resolve(lookup(&[])).enabled);
        assert!(Settings::resolve(lookup(&[(ENABLED_ENV, "maybe")])).enabled);
        assert!(!Settings::resolve(lookup(&[(ENABLED_ENV, " Off ")])).enabled);
    }

    #[test]
    fn blank_values_are_ignored() {
        let settings = Settings::resolve(lookup(&[(LEVEL_ENV, " "), (JSON_PATH_ENV, "")]));
        assert_eq!(settings.level, None);
        assert_eq!(settings.json_path, None);
    }

    #[test]
    fn log_path_splits_into_dir_and_file() {
        assert_eq!(
            split_log_path(Path::new("logs/run.jsonl")),
            (PathBuf::from("logs"), "run.jsonl".to_string())
        );
        assert_eq!(
            split_log_path(Path::new("run.jsonl")),
            (PathBuf::from("."), "run.jsonl".to_string())
        );
    }
}
