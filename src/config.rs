use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct QuerystashConfig {
    pub data_dir: Option<String>,
}

pub fn default_config_path() -> PathBuf {
    PathBuf::from("querystash.toml")
}

pub fn default_data_dir() -> PathBuf {
    PathBuf::from(".querystash")
}

pub fn load_config(path: Option<&Path>) -> anyhow::Result<Option<QuerystashConfig>> {
    let path = path.map(Path::to_path_buf).unwrap_or_else(default_config_path);
    if !path.exists() {
        return Ok(None);
    }

    let contents = std::fs::read_to_string(&path)?;
    let config: QuerystashConfig = toml::from_str(&contents)?;
    Ok(Some(config))
}

pub fn write_config(path: &Path, config: &QuerystashConfig, force: bool) -> anyhow::Result<()> {
    if path.exists() && !force {
        anyhow::bail!("config already exists at {} (use --force to overwrite)", path.display());
    }

    let contents = toml::to_string_pretty(config)?;
    std::fs::write(path, contents)?;
    Ok(())
}

/// Pick the data directory: CLI flag, then config file, then the default
pub fn resolve_data_dir(
    flag: Option<PathBuf>,
    config: Option<&QuerystashConfig>,
) -> PathBuf {
    flag.or_else(|| {
        config
            .and_then(|c| c.data_dir.as_ref())
            .map(PathBuf::from)
    })
    .unwrap_or_else(default_data_dir)
}
