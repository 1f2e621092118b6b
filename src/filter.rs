//! 搜索过滤：在未过滤的远程全集上做大小写不敏感的子串匹配

use crate::catalog::RemoteItem;
use crate::view::ViewItem;

/// name / author / description 任一包含查询串即命中
pub fn matches(item: &RemoteItem, needle_lower: &str) -> bool {
    [&item.name, &item.author, &item.description]
        .iter()
        .any(|field| field.to_lowercase().contains(needle_lower))
}

/// 平铺结果，不带分组标题，保持原顺序
pub fn filter(remote: &[RemoteItem], query: &str) -> Vec<ViewItem> {
    let needle = query.to_lowercase();
    remote
        .iter()
        .filter(|item| matches(item, &needle))
        .cloned()
        .map(ViewItem::Remote)
        .collect()
}
