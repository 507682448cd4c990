use std::collections::HashMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("no groups configured; pass --groups or set TELEARC_GROUPS")]
    NoGroups,
    #[error("window must be positive, got {0}")]
    NonPositiveWindow(i64),
}

#[derive(Clone, Debug)]
pub struct Config {
    pub api_base_url: String,
    pub data_dir: PathBuf,
    pub secrets_path: PathBuf,
    pub state_path: PathBuf,
    /// Group tokens from TELEARC_GROUPS, in configured order.
    pub groups: Vec<String>,
}

impl Config {
    pub fn load() -> Self {
        let debug = cfg!(debug_assertions);
        let data_dir = env::var("TELEARC_DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| default_data_dir(debug));

        // credentials.env backs variables that are not exported, so a cron
        // job and an interactive shell see the same configuration.
        let fallback = read_env_file(&data_dir.join("credentials.env"));
        let lookup = |key: &str| -> Option<String> {
            env::var(key).ok().or_else(|| fallback.get(key).cloned())
        };

        let api_base_url = lookup("TELEARC_API_BASE_URL").unwrap_or_else(|| {
            if debug {
                "http://localhost:8000/v1".to_string()
            } else {
                "https://api.telearc.dev/v1".to_string()
            }
        });
        let api_base_url = api_base_url.trim_end_matches('/').to_string();

        let secrets_path = lookup("TELEARC_SECRETS_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|| data_dir.join("secrets.json"));
        let state_path = lookup("TELEARC_STATE_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|| data_dir.join("state.json"));

        let groups = parse_groups(&lookup("TELEARC_GROUPS").unwrap_or_default());

        Self {
            api_base_url,
            data_dir,
            secrets_path,
            state_path,
            groups,
        }
    }

    /// Tokens for one run: an explicit --groups flag wins over the
    /// environment. An empty result is a fatal configuration error.
    pub fn resolve_groups(&self, flag: Option<&str>) -> Result<Vec<String>, ConfigError> {
        let groups = match flag {
            Some(value) => parse_groups(value),
            None => self.groups.clone(),
        };
        if groups.is_empty() {
            return Err(ConfigError::NoGroups);
        }
        Ok(groups)
    }
}

pub fn parse_groups(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .map(str::to_string)
        .collect()
}

pub fn positive_window(value: i64) -> Result<i64, ConfigError> {
    if value < 1 {
        return Err(ConfigError::NonPositiveWindow(value));
    }
    Ok(value)
}

fn default_data_dir(debug: bool) -> PathBuf {
    let base = env::var("HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("."));
    let dir_name = if debug { "telearc-dev" } else { "telearc" };
    base.join(".local").join("share").join(dir_name)
}

fn read_env_file(path: &Path) -> HashMap<String, String> {
    let mut values = HashMap::new();
    let Ok(contents) = fs::read_to_string(path) else {
        return values;
    };
    for line in contents.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let Some((key, value)) = line.split_once('=') else {
            continue;
        };
        let key = key.trim();
        let value = value.trim().trim_matches('"').trim_matches('\'');
        if !key.is_empty() {
            values.insert(key.to_string(), value.to_string());
        }
    }
    values
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn groups_split_and_trim() {
        let groups = parse_groups(" news_channel, 12345 ,,rustlang ");
        assert_eq!(groups, vec!["news_channel", "12345", "rustlang"]);
    }

    #[test]
    fn empty_groups_are_rejected() {
        let config = Config {
            api_base_url: "http://localhost".to_string(),
            data_dir: PathBuf::from("."),
            secrets_path: PathBuf::from("secrets.json"),
            state_path: PathBuf::from("state.json"),
            groups: Vec::new(),
        };
        assert!(matches!(
            config.resolve_groups(None),
            Err(ConfigError::NoGroups)
        ));
        assert_eq!(
            config.resolve_groups(Some("a,b")).expect("flag groups"),
            vec!["a", "b"]
        );
    }

    #[test]
    fn window_must_be_positive() {
        assert!(positive_window(0).is_err());
        assert!(positive_window(-3).is_err());
        assert_eq!(positive_window(24).expect("positive"), 24);
    }

    #[test]
    fn env_file_parses_comments_quotes_and_blanks() {
        let dir = std::env::temp_dir().join(format!("telearc-envfile-{}", std::process::id()));
        fs::create_dir_all(&dir).expect("temp dir");
        let path = dir.join("credentials.env");
        fs::write(
            &path,
            "# comment\n\nTELEARC_GROUPS=\"news,rustlang\"\nTELEARC_API_BASE_URL='http://example.test/v1'\nBROKEN LINE\n",
        )
        .expect("write env file");

        let values = read_env_file(&path);
        assert_eq!(values.get("TELEARC_GROUPS").map(String::as_str), Some("news,rustlang"));
        assert_eq!(
            values.get("TELEARC_API_BASE_URL").map(String::as_str),
            Some("http://example.test/v1")
        );
        assert!(!values.contains_key("BROKEN LINE"));

        let _ = fs::remove_dir_all(&dir);
    }
}
