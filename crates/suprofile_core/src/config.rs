use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};

use crate::constants::{CONFIG_ENV, TEMPLATES_DIR};
use crate::error::Result;

/// Loaded once at startup and handed to whoever needs it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub data_dir: PathBuf,
    pub templates_dir: Option<PathBuf>,
    pub dry_run: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            templates_dir: None,
            dry_run: false,
        }
    }
}

fn default_data_dir() -> PathBuf {
    let mut base = env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
    base.push("suprofile");

    if !base.exists()
        && let Ok(mut exe_path) = env::current_exe() {
            exe_path.pop();
            exe_path.push("suprofile");
            if exe_path.exists() {
                base = exe_path;
            }
        }
    base
}

impl Config {
    pub fn from_toml(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }

    /// 显式路径优先，其次是环境变量，都没有时使用默认值
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = path
            .map(Path::to_path_buf)
            .or_else(|| env::var_os(CONFIG_ENV).map(PathBuf::from));

        match path {
            Some(p) => {
                let text = std::fs::read_to_string(&p)?;
                tracing::debug!("loaded config from {}", p.display());
                Self::from_toml(&text)
            }
            None => Ok(Self::default()),
        }
    }

    pub fn templates_dir(&self) -> PathBuf {
        self.templates_dir
            .clone()
            .unwrap_or_else(|| self.data_dir.join(TEMPLATES_DIR))
    }
}
