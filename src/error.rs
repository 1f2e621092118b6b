//! 错误类型定义
//!
//! 加载失败（LoadFailure）走 `anyhow`，在编排器里落到 `LoadState::Error`；
//! 这里只放需要被调用方匹配的几类：坏记录、分组标题冲突与 diff 前置条件被破坏。

use thiserror::Error;

/// 原始记录无法包装成列表项（缺少必填字段）
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RecordError {
    #[error("{kind} 记录缺少必填字段 `{field}`")]
    MissingField {
        kind: &'static str,
        field: &'static str,
    },
}

/// 分组标题配置错误
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LabelError {
    /// 两个分组标题相同，会让分组标题的身份键重复
    #[error("分组标题 `{first}` 与 `{second}` 重复: {label}")]
    Duplicate {
        first: &'static str,
        second: &'static str,
        label: String,
    },
}

/// diff 输入所属的一侧
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Old,
    New,
}

impl std::fmt::Display for Side {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Side::Old => f.write_str("old"),
            Side::New => f.write_str("new"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DiffError {
    /// 同一列表中出现重复的身份键，属于上游的契约错误
    #[error("{side} 列表第 {index} 项的身份键 {key} 重复")]
    DuplicateKey {
        side: Side,
        index: usize,
        key: String,
    },
    /// 编辑脚本中的下标越界（脚本与当前列表不匹配）
    #[error("{op} 操作下标 {index} 越界（列表长度 {len}）")]
    OutOfBounds {
        op: &'static str,
        index: usize,
        len: usize,
    },
}
