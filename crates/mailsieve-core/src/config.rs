use serde::Deserialize;
use std::{env, path::Path, path::PathBuf};
use thiserror::Error;

pub const DEFAULT_FETCH_LABEL: &str = "INBOX";
pub const DEFAULT_MAX_RESULTS: u32 = 50;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct Config {
    pub app: AppConfig,
    pub paths: PathsConfig,
    #[serde(default)]
    pub telemetry: TelemetryConfig,
    pub gmail: GmailConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct AppConfig {
    pub service_name: String,
    pub env: String,
}

impl AppConfig {
    pub fn is_dev(&self) -> bool {
        self.env.eq_ignore_ascii_case("dev")
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct PathsConfig {
    pub database: PathBuf,
    pub rules: PathBuf,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct TelemetryConfig {
    pub otlp_endpoint: Option<String>,
    #[serde(default)]
    pub export_traces: bool,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct GmailConfig {
    #[serde(default = "default_user_id")]
    pub user_id: String,
    pub client_id: String,
    pub client_secret: String,
    pub token_file: PathBuf,
    #[serde(default = "default_fetch_label")]
    pub fetch_label: String,
    #[serde(default = "default_max_results")]
    pub max_results: u32,
    /// Overrides the Gmail REST base URL, mainly for tests.
    pub api_base: Option<String>,
}

fn default_user_id() -> String {
    "me".to_string()
}

fn default_fetch_label() -> String {
    DEFAULT_FETCH_LABEL.to_string()
}

fn default_max_results() -> u32 {
    DEFAULT_MAX_RESULTS
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read configuration file: {0}")]
    ConfigBuild(config::ConfigError),
    #[error("failed to parse configuration: {0}")]
    Deserialize(config::ConfigError),
    #[error("missing required environment variable {0}")]
    MissingEnvVar(String),
    #[error("invalid GMAIL_MAX_RESULTS override: {0}")]
    InvalidMaxResults(std::num::ParseIntError),
}

impl Config {
    /// Load configuration from the provided path, apply environment overrides, and
    /// resolve any `env:` indirections.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let raw = config::Config::builder()
            .add_source(config::File::from(path.as_ref()))
            .build()
            .map_err(ConfigError::ConfigBuild)?;

        let mut cfg: Config = raw.try_deserialize().map_err(ConfigError::Deserialize)?;
        cfg.apply_env_overrides()?;
        cfg.resolve_env_markers()?;
        cfg.expand_paths();
        Ok(cfg)
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Ok(otlp) = env::var("OTLP_ENDPOINT") {
            self.telemetry.otlp_endpoint = Some(otlp);
        }

        if let Ok(rules) = env::var("MAILSIEVE_RULES") {
            self.paths.rules = PathBuf::from(rules);
        }

        if let Ok(database) = env::var("MAILSIEVE_DATABASE") {
            self.paths.database = PathBuf::from(database);
        }

        if let Ok(label) = env::var("GMAIL_FETCH_LABEL") {
            self.gmail.fetch_label = label;
        }

        if let Ok(max) = env::var("GMAIL_MAX_RESULTS") {
            self.gmail.max_results = max.parse().map_err(ConfigError::InvalidMaxResults)?;
        }

        Ok(())
    }

    fn resolve_env_markers(&mut self) -> Result<(), ConfigError> {
        apply_env_marker(&mut self.app.service_name)?;
        apply_env_marker(&mut self.app.env)?;
        apply_env_marker(&mut self.gmail.user_id)?;
        apply_env_marker(&mut self.gmail.client_id)?;
        apply_env_marker(&mut self.gmail.client_secret)?;
        apply_env_marker(&mut self.gmail.fetch_label)?;
        if let Some(api_base) = &mut self.gmail.api_base {
            apply_env_marker(api_base)?;
        }
        if let Some(endpoint) = &mut self.telemetry.otlp_endpoint {
            apply_env_marker(endpoint)?;
        }
        apply_env_marker_path(&mut self.paths.database)?;
        apply_env_marker_path(&mut self.paths.rules)?;
        apply_env_marker_path(&mut self.gmail.token_file)?;
        Ok(())
    }

    fn expand_paths(&mut self) {
        for path in [
            &mut self.paths.database,
            &mut self.paths.rules,
            &mut self.gmail.token_file,
        ] {
            let raw = path.to_string_lossy().to_string();
            *path = PathBuf::from(shellexpand::tilde(&raw).as_ref());
        }
    }
}

fn apply_env_marker(value: &mut String) -> Result<(), ConfigError> {
    if let Some(rest) = value.strip_prefix("env:") {
        let resolved = env::var(rest).map_err(|_| ConfigError::MissingEnvVar(rest.to_string()))?;
        *value = resolved;
    }
    Ok(())
}

fn apply_env_marker_path(path: &mut PathBuf) -> Result<(), ConfigError> {
    let mut value = path.to_string_lossy().to_string();
    apply_env_marker(&mut value)?;
    *path = PathBuf::from(value);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use once_cell::sync::Lazy;
    use std::{fs, sync::Mutex};
    use tempfile::TempDir;

    static ENV_LOCK: Lazy<Mutex<()>> = Lazy::new(|| Mutex::new(()));

    const OVERRIDE_VARS: [&str; 5] = [
        "OTLP_ENDPOINT",
        "MAILSIEVE_RULES",
        "MAILSIEVE_DATABASE",
        "GMAIL_FETCH_LABEL",
        "GMAIL_MAX_RESULTS",
    ];

    fn write_config(contents: &str) -> (TempDir, std::path::PathBuf) {
        let dir = TempDir::new().expect("temp dir");
        let path = dir.path().join("config.toml");
        fs::write(&path, contents).expect("write config");
        (dir, path)
    }

    fn with_env(vars: &[(&str, Option<&str>)], f: impl FnOnce()) {
        let _guard = ENV_LOCK.lock().expect("lock env");
        let mut all: Vec<(&str, Option<&str>)> =
            OVERRIDE_VARS.iter().map(|key| (*key, None)).collect();
        for (key, value) in vars {
            all.retain(|(k, _)| k != key);
            all.push((*key, *value));
        }

        let saved: Vec<(String, Option<String>)> = all
            .iter()
            .map(|(k, _)| (k.to_string(), env::var(k).ok()))
            .collect();

        for (key, value) in &all {
            match value {
                Some(v) => unsafe { env::set_var(key, v) },
                None => unsafe { env::remove_var(key) },
            }
        }

        f();

        for (key, value) in saved {
            match value {
                Some(v) => unsafe { env::set_var(&key, v) },
                None => unsafe { env::remove_var(&key) },
            }
        }
    }

    fn config_body(database_path: &str) -> String {
        format!(
            r#"
[app]
service_name = "mailsieve"
env = "dev"

[paths]
database = "{database_path}"
rules = "~/mailsieve/rules.json"

[telemetry]
otlp_endpoint = "http://localhost:4318"
export_traces = true

[gmail]
client_id = "env:GMAIL_CLIENT_ID"
client_secret = "env:GMAIL_CLIENT_SECRET"
token_file = "~/.config/mailsieve/token.json"
"#
        )
    }

    #[test]
    fn loads_config_with_defaults_and_env_markers() {
        let (_dir, path) = write_config(&config_body("mail.sqlite"));

        with_env(
            &[
                ("GMAIL_CLIENT_ID", Some("client-123")),
                ("GMAIL_CLIENT_SECRET", Some("shh")),
            ],
            || {
                let cfg = Config::load(&path).expect("config loads");
                assert_eq!(cfg.app.service_name, "mailsieve");
                assert!(cfg.app.is_dev());
                assert_eq!(cfg.paths.database, PathBuf::from("mail.sqlite"));
                assert_eq!(cfg.gmail.client_id, "client-123");
                assert_eq!(cfg.gmail.client_secret, "shh");
                assert_eq!(cfg.gmail.user_id, "me");
                assert_eq!(cfg.gmail.fetch_label, DEFAULT_FETCH_LABEL);
                assert_eq!(cfg.gmail.max_results, DEFAULT_MAX_RESULTS);
                assert!(cfg.gmail.api_base.is_none());
                assert!(cfg.telemetry.export_traces);
            },
        );
    }

    #[test]
    fn expands_tilde_in_paths() {
        let (_dir, path) = write_config(&config_body("~/mail.sqlite"));

        with_env(
            &[
                ("GMAIL_CLIENT_ID", Some("id")),
                ("GMAIL_CLIENT_SECRET", Some("secret")),
            ],
            || {
                let cfg = Config::load(&path).expect("config loads");
                for expanded in [&cfg.paths.database, &cfg.paths.rules, &cfg.gmail.token_file] {
                    assert!(
                        !expanded.to_string_lossy().starts_with('~'),
                        "{} should be expanded",
                        expanded.display()
                    );
                }
            },
        );
    }

    #[test]
    fn env_overrides_take_precedence() {
        let (_dir, path) = write_config(&config_body("mail.sqlite"));

        with_env(
            &[
                ("GMAIL_CLIENT_ID", Some("id")),
                ("GMAIL_CLIENT_SECRET", Some("secret")),
                ("OTLP_ENDPOINT", Some("http://collector:4318")),
                ("MAILSIEVE_RULES", Some("/etc/mailsieve/rules.json")),
                ("MAILSIEVE_DATABASE", Some("/var/lib/mailsieve/mail.sqlite")),
                ("GMAIL_FETCH_LABEL", Some("Label_9")),
                ("GMAIL_MAX_RESULTS", Some("5")),
            ],
            || {
                let cfg = Config::load(&path).expect("config loads");
                assert_eq!(
                    cfg.telemetry.otlp_endpoint.as_deref(),
                    Some("http://collector:4318")
                );
                assert_eq!(cfg.paths.rules, PathBuf::from("/etc/mailsieve/rules.json"));
                assert_eq!(
                    cfg.paths.database,
                    PathBuf::from("/var/lib/mailsieve/mail.sqlite")
                );
                assert_eq!(cfg.gmail.fetch_label, "Label_9");
                assert_eq!(cfg.gmail.max_results, 5);
            },
        );
    }

    #[test]
    fn invalid_max_results_override_is_an_error() {
        let (_dir, path) = write_config(&config_body("mail.sqlite"));

        with_env(
            &[
                ("GMAIL_CLIENT_ID", Some("id")),
                ("GMAIL_CLIENT_SECRET", Some("secret")),
                ("GMAIL_MAX_RESULTS", Some("lots")),
            ],
            || {
                let err = Config::load(&path).expect_err("bad override");
                assert!(matches!(err, ConfigError::InvalidMaxResults(_)));
            },
        );
    }

    #[test]
    fn missing_env_marker_is_reported() {
        let (_dir, path) = write_config(&config_body("mail.sqlite"));

        with_env(
            &[
                ("GMAIL_CLIENT_ID", None),
                ("GMAIL_CLIENT_SECRET", Some("secret")),
            ],
            || {
                let err = Config::load(&path).expect_err("missing var");
                match err {
                    ConfigError::MissingEnvVar(name) => assert_eq!(name, "GMAIL_CLIENT_ID"),
                    other => panic!("unexpected error: {other}"),
                }
            },
        );
    }

    #[test]
    fn missing_required_section_fails_to_deserialize() {
        let (_dir, path) = write_config(
            r#"
[app]
service_name = "mailsieve"
env = "dev"
"#,
        );

        with_env(&[], || {
            let err = Config::load(&path).expect_err("incomplete config");
            assert!(matches!(err, ConfigError::Deserialize(_)));
        });
    }
}
