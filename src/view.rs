//! 列表项模型：分组标题 / 已安装模块 / 远程条目
//!
//! 身份键决定两个快照中的项是否为同一实体（插入、移动还是原地变更），
//! 内容相等决定同一实体是否需要 `Change`。

use crate::catalog::{InstalledItem, RemoteItem};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ViewItem {
    /// 分组标题，只有显示文本
    Section(String),
    Installed(InstalledItem),
    Remote(RemoteItem),
}

/// 身份键：变体 + id（标题用文本）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ItemKey<'a> {
    Section(&'a str),
    Installed(&'a str),
    Remote(&'a str),
}

impl ViewItem {
    pub fn identity_key(&self) -> ItemKey<'_> {
        match self {
            ViewItem::Section(label) => ItemKey::Section(label),
            ViewItem::Installed(item) => ItemKey::Installed(&item.id),
            ViewItem::Remote(item) => ItemKey::Remote(&item.id),
        }
    }

    pub fn as_remote(&self) -> Option<&RemoteItem> {
        match self {
            ViewItem::Remote(item) => Some(item),
            _ => None,
        }
    }

    pub fn is_section(&self) -> bool {
        matches!(self, ViewItem::Section(_))
    }

    /// 单行显示文本
    pub fn display_line(&self) -> String {
        match self {
            ViewItem::Section(label) => format!("== {} ==", label),
            ViewItem::Installed(item) => {
                let mut line = format!("{} {} ({})", item.name, item.version, item.version_code);
                if item.disabled {
                    line.push_str(" [已禁用]");
                }
                if item.pending_remove {
                    line.push_str(" [待移除]");
                }
                if item.pending_update {
                    line.push_str(" [待更新]");
                }
                line
            }
            ViewItem::Remote(item) => format!(
                "{} {} ({}) by {}",
                item.name, item.version, item.version_code, item.author
            ),
        }
    }
}

/// 身份相等：同变体且同 id
pub fn same_identity(a: &ViewItem, b: &ViewItem) -> bool {
    a.identity_key() == b.identity_key()
}

/// 内容相等：所有显示字段一致（只对身份相等的项有意义）
pub fn same_content(a: &ViewItem, b: &ViewItem) -> bool {
    a == b
}
