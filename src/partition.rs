//! 分组：把远程条目按已安装状态分成三段
//!
//! 固定顺序：有更新 / 已安装 / 未安装。空段连标题一起省略，段内保持远程原顺序。

use crate::catalog::{InstalledItem, RemoteItem};
use crate::error::LabelError;
use crate::view::ViewItem;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// 三个分组标题的显示文本
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SectionLabels {
    pub update_available: String,
    pub installed: String,
    pub not_installed: String,
}

impl Default for SectionLabels {
    fn default() -> Self {
        Self {
            update_available: "Update available".to_string(),
            installed: "Installed".to_string(),
            not_installed: "Not installed".to_string(),
        }
    }
}

impl SectionLabels {
    /// 三个标题必须两两不同，否则分组结果里会出现身份相同的标题
    pub fn validate(&self) -> Result<(), LabelError> {
        let fields = [
            ("update_available", &self.update_available),
            ("installed", &self.installed),
            ("not_installed", &self.not_installed),
        ];
        for (i, (first, a)) in fields.iter().enumerate() {
            for (second, b) in &fields[i + 1..] {
                if a == b {
                    return Err(LabelError::Duplicate {
                        first: *first,
                        second: *second,
                        label: a.to_string(),
                    });
                }
            }
        }
        Ok(())
    }
}

/// 远程条目相对已安装模块的状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Category {
    UpdateAvailable,
    Installed,
    NotInstalled,
}

/// 按 id 匹配；versionCode 只比较是否相等，升级降级都算有更新
pub fn classify(remote: &RemoteItem, installed_codes: &HashMap<&str, i64>) -> Category {
    match installed_codes.get(remote.id.as_str()) {
        Some(&code) if code != remote.version_code => Category::UpdateAvailable,
        Some(_) => Category::Installed,
        None => Category::NotInstalled,
    }
}

pub fn categorize(
    remote: &[RemoteItem],
    installed: &[InstalledItem],
    labels: &SectionLabels,
) -> Vec<ViewItem> {
    // 重复 id 时以第一个为准
    let mut installed_codes: HashMap<&str, i64> = HashMap::with_capacity(installed.len());
    for item in installed {
        installed_codes.entry(item.id.as_str()).or_insert(item.version_code);
    }

    let mut updates = Vec::new();
    let mut current = Vec::new();
    let mut others = Vec::new();
    for item in remote {
        let bucket = match classify(item, &installed_codes) {
            Category::UpdateAvailable => &mut updates,
            Category::Installed => &mut current,
            Category::NotInstalled => &mut others,
        };
        bucket.push(ViewItem::Remote(item.clone()));
    }

    let mut out = Vec::with_capacity(remote.len() + 3);
    push_section(&mut out, &labels.update_available, updates);
    push_section(&mut out, &labels.installed, current);
    push_section(&mut out, &labels.not_installed, others);
    out
}

fn push_section(out: &mut Vec<ViewItem>, label: &str, items: Vec<ViewItem>) {
    if items.is_empty() {
        return;
    }
    out.push(ViewItem::Section(label.to_string()));
    out.extend(items);
}
