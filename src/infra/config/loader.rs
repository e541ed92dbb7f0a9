use std::{
    fs,
    path::{Path, PathBuf},
};

use crate::infra::{
    config::{file_config::FileConfig, AppConfig},
    error::AppError,
};

const DEFAULT_CONFIG_PATH: &str = "config.toml";

pub fn load(path: Option<&Path>) -> Result<AppConfig, AppError> {
    let config_path = path
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH));

    let mut config = AppConfig::default();

    if !config_path.exists() {
        return Ok(config);
    }

    let raw = fs::read_to_string(&config_path).map_err(|source| AppError::ConfigRead {
        path: config_path.clone(),
        source,
    })?;

    let file_config: FileConfig = toml::from_str(&raw).map_err(|source| AppError::ConfigParse {
        path: config_path,
        source,
    })?;

    file_config.merge_into(&mut config);
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn returns_defaults_when_file_is_missing() {
        let dir = tempfile::tempdir().expect("temp dir");
        let config = load(Some(&dir.path().join("missing.toml"))).expect("config must load");

        assert_eq!(config, AppConfig::default());
    }

    #[test]
    fn merges_file_values_over_defaults() {
        let dir = tempfile::tempdir().expect("temp dir");
        let config_path = dir.path().join("config.toml");

        fs::write(
            &config_path,
            r#"[logging]
level = "debug"

[channel]
app_key = "abc"
subscribe_attempts = 5

[chat_list]
insert_unknown_chats = true
"#,
        )
        .expect("must write test config");

        let config = load(Some(&config_path)).expect("config must load");

        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.channel.app_key, "abc");
        assert_eq!(config.channel.subscribe_attempts, 5);
        assert_eq!(config.channel.cluster, "eu");
        assert!(config.chat_list.insert_unknown_chats);
        assert_eq!(config.history.per_page, 20);
    }

    #[test]
    fn reports_parse_errors_with_path() {
        let dir = tempfile::tempdir().expect("temp dir");
        let config_path = dir.path().join("config.toml");
        fs::write(&config_path, "[history]\nper_page = \"many\"\n").expect("must write test config");

        let error = load(Some(&config_path)).expect_err("config must not load");

        assert!(matches!(error, AppError::ConfigParse { ref path, .. } if *path == config_path));
    }
}
