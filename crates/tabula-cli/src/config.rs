// Copyright 2026 Tabula contributors
// Licensed under the Apache License, Version 2.0

use anyhow::{Context, Result, anyhow};
use serde::Deserialize;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

const CONFIG_VERSION: i64 = 1;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub version: i64,
    #[serde(default)]
    pub storage: Storage,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: CONFIG_VERSION,
            storage: Storage::default(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Storage {
    pub db_path: Option<String>,
}

impl Config {
    pub fn default_path() -> Result<PathBuf> {
        if let Some(path) = env::var_os("TABULA_CONFIG_PATH") {
            return Ok(PathBuf::from(path));
        }

        let config_root = dirs::config_dir().ok_or_else(|| {
            anyhow!("cannot resolve config directory; set TABULA_CONFIG_PATH to the config file")
        })?;

        let app_dir = config_root.join(tabula_store::APP_NAME);
        fs::create_dir_all(&app_dir)
            .with_context(|| format!("create config directory {}", app_dir.display()))?;
        Ok(app_dir.join("config.toml"))
    }

    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let raw = fs::read_to_string(path)
            .with_context(|| format!("read config file {}", path.display()))?;
        let config: Self = toml::from_str(&raw)
            .with_context(|| format!("parse TOML config {}", path.display()))?;
        if config.version != CONFIG_VERSION {
            return Err(anyhow!(
                "config file {} has version {}, expected {CONFIG_VERSION}",
                path.display(),
                config.version
            ));
        }
        Ok(config)
    }

    pub fn example_config(path: &Path) -> String {
        format!(
            "\
# tabula configuration ({})
version = {CONFIG_VERSION}

[storage]
# db_path = \"/path/to/tabula.db\"
",
            path.display()
        )
    }

    pub fn db_path(&self) -> Result<PathBuf> {
        if let Some(path) = env::var_os("TABULA_DB_PATH") {
            return Ok(PathBuf::from(path));
        }
        if let Some(path) = &self.storage.db_path {
            return Ok(PathBuf::from(path));
        }
        tabula_store::default_db_path()
    }
}

#[cfg(test)]
mod tests {
    use super::Config;
    use anyhow::Result;
    use std::fs;

    #[test]
    fn missing_config_file_falls_back_to_defaults() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let config = Config::load(&dir.path().join("missing.toml"))?;
        assert_eq!(config.version, 1);
        assert!(config.storage.db_path.is_none());
        Ok(())
    }

    #[test]
    fn versioned_config_round_trip() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("config.toml");
        fs::write(&path, "version = 1\n[storage]\ndb_path = \"/tmp/t.db\"\n")?;

        let config = Config::load(&path)?;
        assert_eq!(config.storage.db_path.as_deref(), Some("/tmp/t.db"));
        Ok(())
    }

    #[test]
    fn wrong_version_is_rejected() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("config.toml");
        fs::write(&path, "version = 99\n")?;

        let error = Config::load(&path).expect_err("version mismatch should fail");
        assert!(error.to_string().contains("version 99"));
        Ok(())
    }

    #[test]
    fn example_config_parses() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("config.toml");
        let example = Config::example_config(&path);
        fs::write(&path, example)?;
        Config::load(&path)?;
        Ok(())
    }
}
