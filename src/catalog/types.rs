//! 模块 / 仓库相关数据类型定义

use crate::error::RecordError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 已安装模块的原始记录（module.prop + 状态标记文件）
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RawModule {
    pub id: Option<String>,
    pub name: Option<String>,
    pub version: Option<String>,
    pub version_code: Option<i64>,
    pub author: Option<String>,
    pub description: Option<String>,
    pub disabled: bool,
    pub pending_remove: bool,
    pub pending_update: bool,
}

/// 远程仓库中的一条原始记录
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RawRepo {
    pub id: Option<String>,
    pub name: Option<String>,
    pub version: Option<String>,
    pub version_code: Option<i64>,
    pub author: Option<String>,
    pub description: Option<String>,
    pub last_update: Option<DateTime<Utc>>,
    pub download_url: Option<String>,
}

/// 已安装模块
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstalledItem {
    pub id: String,
    pub name: String,
    pub version: String,
    pub version_code: i64,
    pub author: String,
    pub description: String,
    pub disabled: bool,
    pub pending_remove: bool,
    pub pending_update: bool,
}

/// 远程仓库条目
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteItem {
    pub id: String,
    pub name: String,
    pub version: String,
    pub version_code: i64,
    pub author: String,
    pub description: String,
    pub last_update: Option<DateTime<Utc>>,
    pub download_url: Option<String>,
}

/// 取出非空白的 id
fn required_id(id: Option<String>, kind: &'static str) -> Result<String, RecordError> {
    match id {
        Some(id) if !id.trim().is_empty() => Ok(id.trim().to_string()),
        _ => Err(RecordError::MissingField { kind, field: "id" }),
    }
}

impl InstalledItem {
    pub fn wrap(raw: RawModule) -> Result<Self, RecordError> {
        const KIND: &str = "installed";
        let id = required_id(raw.id, KIND)?;
        let version_code = raw.version_code.ok_or(RecordError::MissingField {
            kind: KIND,
            field: "versionCode",
        })?;
        Ok(Self {
            name: raw.name.unwrap_or_else(|| id.clone()),
            id,
            version: raw.version.unwrap_or_default(),
            version_code,
            author: raw.author.unwrap_or_default(),
            description: raw.description.unwrap_or_default(),
            disabled: raw.disabled,
            pending_remove: raw.pending_remove,
            pending_update: raw.pending_update,
        })
    }
}

impl RemoteItem {
    pub fn wrap(raw: RawRepo) -> Result<Self, RecordError> {
        const KIND: &str = "remote";
        let id = required_id(raw.id, KIND)?;
        let version_code = raw.version_code.ok_or(RecordError::MissingField {
            kind: KIND,
            field: "versionCode",
        })?;
        Ok(Self {
            name: raw.name.unwrap_or_else(|| id.clone()),
            id,
            version: raw.version.unwrap_or_default(),
            version_code,
            author: raw.author.unwrap_or_default(),
            description: raw.description.unwrap_or_default(),
            last_update: raw.last_update,
            download_url: raw.download_url,
        })
    }
}
