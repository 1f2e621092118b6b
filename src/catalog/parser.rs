//! module.prop 解析函数

use super::types::RawModule;

/// 解析 module.prop（`key=value` 每行一项）
///
/// `#` 开头的注释行与空行忽略；无法解析为整数的 `versionCode` 视为缺失，
/// 交给 `InstalledItem::wrap` 拒绝。
pub fn parse_module_prop(content: &str) -> RawModule {
    let mut raw = RawModule::default();

    for line in content.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        if let Some(eq) = line.find('=') {
            let key = line[..eq].trim();
            let val = line[eq + 1..].trim();
            match key {
                "id" => raw.id = non_empty(val),
                "name" => raw.name = non_empty(val),
                "version" => raw.version = non_empty(val),
                "versionCode" => raw.version_code = val.parse().ok(),
                "author" => raw.author = non_empty(val),
                "description" => raw.description = non_empty(val),
                _ => {}
            }
        }
    }

    raw
}

fn non_empty(val: &str) -> Option<String> {
    if val.is_empty() {
        None
    } else {
        Some(val.to_string())
    }
}
