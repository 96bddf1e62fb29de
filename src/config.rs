use crate::error::{Error, Result};
use serde::Deserialize;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

const APP_DIR: &str = "kanban-tui";

#[derive(Debug, Default, Deserialize)]
struct FileConfig {
    url: Option<String>,
    anon_key: Option<String>,
    access_token: Option<String>,
    user_id: Option<String>,
    log_file: Option<PathBuf>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Config {
    pub url: String,
    pub anon_key: String,
    pub access_token: String,
    pub user_id: Option<String>,
    pub log_file: PathBuf,
}

pub fn config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join(APP_DIR).join("config.toml"))
}

fn default_log_file() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(env::temp_dir)
        .join(APP_DIR)
        .join("kanban-tui.log")
}

fn read_file_config(path: &Path) -> Result<FileConfig> {
    if !path.exists() {
        return Ok(FileConfig::default());
    }
    let raw = fs::read_to_string(path)?;
    Ok(toml::from_str(&raw)?)
}

fn required(value: Option<String>, name: &str) -> Result<String> {
    value
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| Error::Config(format!("{} not set", name)))
}

impl Config {
    /// Reads the config file, then lets environment variables override it.
    pub fn load() -> Result<Config> {
        let file = match config_path() {
            Some(path) => read_file_config(&path)?,
            None => FileConfig::default(),
        };
        Config::resolve(file, |key| env::var(key).ok())
    }

    fn resolve(file: FileConfig, lookup: impl Fn(&str) -> Option<String>) -> Result<Config> {
        let url = required(lookup("SUPABASE_URL").or(file.url), "SUPABASE_URL")?;
        let anon_key = required(
            lookup("SUPABASE_ANON_KEY").or(file.anon_key),
            "SUPABASE_ANON_KEY",
        )?;
        let access_token = required(
            lookup("SUPABASE_ACCESS_TOKEN").or(file.access_token),
            "SUPABASE_ACCESS_TOKEN",
        )?;
        let user_id = lookup("KANBAN_USER_ID").or(file.user_id);
        let log_file = lookup("KANBAN_LOG_FILE")
            .map(PathBuf::from)
            .or(file.log_file)
            .unwrap_or_else(default_log_file);

        Ok(Config {
            url: url.trim_end_matches('/').to_string(),
            anon_key,
            access_token,
            user_id,
            log_file,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env_of(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn test_env_overrides_file() {
        let file: FileConfig = toml::from_str(
            r#"
            url = "https://file.example.co/"
            anon_key = "file-key"
            access_token = "file-token"
            log_file = "/tmp/board.log"
            "#,
        )
        .unwrap();
        let config = Config::resolve(
            file,
            env_of(&[("SUPABASE_URL", "https://env.example.co/")]),
        )
        .unwrap();

        assert_eq!(config.url, "https://env.example.co");
        assert_eq!(config.anon_key, "file-key");
        assert_eq!(config.access_token, "file-token");
        assert_eq!(config.log_file, PathBuf::from("/tmp/board.log"));
        assert_eq!(config.user_id, None);
    }

    #[test]
    fn test_missing_token_is_config_error() {
        let result = Config::resolve(
            FileConfig::default(),
            env_of(&[("SUPABASE_URL", "https://x.co"), ("SUPABASE_ANON_KEY", "k")]),
        );
        match result {
            Err(Error::Config(msg)) => assert!(msg.contains("SUPABASE_ACCESS_TOKEN")),
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_blank_values_count_as_missing() {
        let result = Config::resolve(
            FileConfig::default(),
            env_of(&[
                ("SUPABASE_URL", "   "),
                ("SUPABASE_ANON_KEY", "k"),
                ("SUPABASE_ACCESS_TOKEN", "t"),
            ]),
        );
        assert!(matches!(result, Err(Error::Config(_))));
    }
}
