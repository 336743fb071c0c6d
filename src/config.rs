//! Application-level configuration loading, including the two product timing
//! constants the synchronization engine depends on. Both windows are exposed
//! as configuration rather than hard-coded; they are unrelated values and are
//! not derived from each other.

use std::{env, fs, io::ErrorKind, path::PathBuf, time::Duration};

use serde::Deserialize;
use tracing::{info, warn};

/// Default location on disk where the server looks for the JSON configuration.
const DEFAULT_CONFIG_PATH: &str = "config/app.json";
/// Environment variable that overrides [`DEFAULT_CONFIG_PATH`].
const CONFIG_PATH_ENV: &str = "QUIZ_DUEL_BACK_CONFIG_PATH";

/// Default response window for one question (2 hours).
const DEFAULT_QUESTION_WINDOW_SECS: u64 = 7200;
/// Default lifetime of an unclaimed matchmaking request (5 minutes).
const DEFAULT_REQUEST_EXPIRY_SECS: u64 = 300;
/// Default location of the question bank file.
const DEFAULT_QUESTION_BANK_PATH: &str = "config/questions.json";

#[derive(Debug, Clone)]
/// Immutable runtime configuration shared across the application.
pub struct AppConfig {
    question_window: Duration,
    request_expiry: Duration,
    question_bank_path: PathBuf,
}

impl AppConfig {
    /// Load the application configuration from disk, falling back to baked-in
    /// defaults when the file is missing or unreadable.
    pub fn load() -> Self {
        let path = resolve_config_path();
        match fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str::<RawConfig>(&contents) {
                Ok(raw) => {
                    let config: Self = raw.into();
                    info!(
                        path = %path.display(),
                        question_window_secs = config.question_window.as_secs(),
                        request_expiry_secs = config.request_expiry.as_secs(),
                        "loaded configuration"
                    );
                    config
                }
                Err(err) => {
                    warn!(
                        path = %path.display(),
                        error = %err,
                        "failed to parse config; falling back to defaults"
                    );
                    Self::default()
                }
            },
            Err(err) if err.kind() == ErrorKind::NotFound => {
                info!(
                    path = %path.display(),
                    "config file not found; using built-in defaults"
                );
                Self::default()
            }
            Err(err) => {
                warn!(
                    path = %path.display(),
                    error = %err,
                    "failed to read config; falling back to defaults"
                );
                Self::default()
            }
        }
    }

    /// How long each question stays answerable before the timeout supervisor
    /// treats the silent player as having forfeited it.
    pub fn question_window(&self) -> Duration {
        self.question_window
    }

    /// How long an unclaimed matchmaking request stays claimable.
    pub fn request_expiry(&self) -> Duration {
        self.request_expiry
    }

    /// Where the bundled question bank is read from.
    pub fn question_bank_path(&self) -> &PathBuf {
        &self.question_bank_path
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            question_window: Duration::from_secs(DEFAULT_QUESTION_WINDOW_SECS),
            request_expiry: Duration::from_secs(DEFAULT_REQUEST_EXPIRY_SECS),
            question_bank_path: PathBuf::from(DEFAULT_QUESTION_BANK_PATH),
        }
    }
}

#[derive(Debug, Deserialize)]
/// JSON representation of the configuration file located at [`DEFAULT_CONFIG_PATH`].
struct RawConfig {
    question_window_secs: Option<u64>,
    request_expiry_secs: Option<u64>,
    question_bank_path: Option<PathBuf>,
}

impl From<RawConfig> for AppConfig {
    fn from(value: RawConfig) -> Self {
        let defaults = AppConfig::default();
        Self {
            question_window: value
                .question_window_secs
                .map(Duration::from_secs)
                .unwrap_or(defaults.question_window),
            request_expiry: value
                .request_expiry_secs
                .map(Duration::from_secs)
                .unwrap_or(defaults.request_expiry),
            question_bank_path: value
                .question_bank_path
                .unwrap_or(defaults.question_bank_path),
        }
    }
}

/// Resolve the configuration path taking the environment override into account.
fn resolve_config_path() -> PathBuf {
    env::var_os(CONFIG_PATH_ENV)
        .map(PathBuf::from)
        .filter(|path| !path.as_os_str().is_empty())
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
}
