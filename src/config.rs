use crate::partition::SectionLabels;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// 已安装模块目录（每个子目录一个模块）
    pub modules_dir: PathBuf,
    /// 远程仓库目录 JSON 文件
    pub catalog_path: PathBuf,
    /// 启动时的搜索串
    pub initial_query: String,
    pub labels: SectionLabels,
}

impl Default for Config {
    fn default() -> Self {
        let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
        let base = PathBuf::from(home).join(".lian/catalog");
        Self {
            modules_dir: base.join("modules"),
            catalog_path: base.join("repos.json"),
            initial_query: String::new(),
            labels: SectionLabels::default(),
        }
    }
}

impl Config {
    /// 配置路径：`LIAN_CATALOG_CONFIG` > `~/.config/lian-catalog/config.toml`
    pub fn default_path() -> PathBuf {
        if let Ok(path) = std::env::var("LIAN_CATALOG_CONFIG") {
            return PathBuf::from(path);
        }
        let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
        PathBuf::from(home).join(".config/lian-catalog/config.toml")
    }

    pub fn load_or_default() -> Result<Self> {
        Self::load_from(&Self::default_path())
    }

    pub fn load_from(config_path: &Path) -> Result<Self> {
        if config_path.exists() {
            let content = fs::read_to_string(config_path)
                .with_context(|| format!("读取配置 {} 失败", config_path.display()))?;
            let config: Config = toml::from_str(&content)
                .with_context(|| format!("解析配置 {} 失败", config_path.display()))?;
            config
                .labels
                .validate()
                .with_context(|| format!("配置 {} 的 [labels] 无效", config_path.display()))?;
            Ok(config)
        } else {
            Ok(Self::default())
        }
    }
}
