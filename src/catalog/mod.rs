//! 数据源模块：已安装模块目录与远程仓库目录的加载
//!
//! 两个加载器都是阻塞调用，由编排器放进 `spawn_blocking` 执行。

pub mod parser;
pub mod types;

// 重新导出常用类型
pub use types::{InstalledItem, RawModule, RawRepo, RemoteItem};

use anyhow::{Context, Result};
use parser::parse_module_prop;
use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// 已安装模块加载器：返回 id → 原始记录
pub trait InstalledSource: Send + Sync {
    fn load_installed(&self) -> Result<BTreeMap<String, RawModule>>;
}

/// 远程仓库目录：`reload` 只通知完成，数据通过 `query_repos` 另行拉取
pub trait CatalogSource: Send + Sync {
    fn reload(&self) -> Result<()>;
    fn query_repos(&self) -> Result<Vec<RawRepo>>;
}

// ===== 已安装模块目录 =====

/// 扫描模块目录，每个含 module.prop 的子目录即一个已安装模块
#[derive(Debug, Clone)]
pub struct ModuleDir {
    pub root: PathBuf,
}

impl ModuleDir {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn read_module(dir: &Path) -> Result<Option<RawModule>> {
        let prop = dir.join("module.prop");
        if !prop.is_file() {
            return Ok(None);
        }
        let content = fs::read_to_string(&prop)
            .with_context(|| format!("读取 {} 失败", prop.display()))?;
        let mut raw = parse_module_prop(&content);
        if raw.id.is_none() {
            raw.id = dir
                .file_name()
                .map(|name| name.to_string_lossy().into_owned());
        }
        raw.disabled = dir.join("disable").exists();
        raw.pending_remove = dir.join("remove").exists();
        raw.pending_update = dir.join("update").exists();
        Ok(Some(raw))
    }
}

impl InstalledSource for ModuleDir {
    fn load_installed(&self) -> Result<BTreeMap<String, RawModule>> {
        let mut modules = BTreeMap::new();
        if !self.root.exists() {
            log::info!("模块目录 {} 不存在，视为没有已安装模块", self.root.display());
            return Ok(modules);
        }

        let entries = fs::read_dir(&self.root)
            .with_context(|| format!("无法读取模块目录 {}", self.root.display()))?;
        let mut dirs = Vec::new();
        for entry in entries {
            match entry {
                Ok(entry) if entry.path().is_dir() => dirs.push(entry.path()),
                Ok(_) => {}
                Err(e) => log::warn!("跳过无法读取的目录项 ({}): {}", self.root.display(), e),
            }
        }
        // 按目录名排序，重复 id 时保留第一个
        dirs.sort();

        for path in dirs {
            match Self::read_module(&path) {
                Ok(Some(raw)) => {
                    let key = raw.id.clone().unwrap_or_default();
                    if modules.contains_key(&key) {
                        log::warn!("模块目录 {} 的 id {} 重复，忽略", path.display(), key);
                        continue;
                    }
                    modules.insert(key, raw);
                }
                Ok(None) => {}
                Err(e) => log::warn!("跳过模块目录 {}: {:#}", path.display(), e),
            }
        }
        Ok(modules)
    }
}

// ===== 远程仓库目录 =====

/// 磁盘上的 JSON 仓库目录（记录数组）
#[derive(Debug)]
pub struct CatalogFile {
    path: PathBuf,
    snapshot: Mutex<Vec<RawRepo>>,
}

impl CatalogFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            snapshot: Mutex::new(Vec::new()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl CatalogSource for CatalogFile {
    fn reload(&self) -> Result<()> {
        let content = fs::read_to_string(&self.path)
            .with_context(|| format!("读取仓库目录 {} 失败", self.path.display()))?;
        let repos: Vec<RawRepo> = serde_json::from_str(&content)
            .with_context(|| format!("解析仓库目录 {} 失败", self.path.display()))?;
        log::info!("仓库目录已加载: {} 条记录", repos.len());
        *self.snapshot.lock().unwrap_or_else(|e| e.into_inner()) = repos;
        Ok(())
    }

    fn query_repos(&self) -> Result<Vec<RawRepo>> {
        Ok(self
            .snapshot
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone())
    }
}

// ===== 包装 =====

/// 包装已安装模块，坏记录记日志后丢弃
pub fn wrap_modules(raw: BTreeMap<String, RawModule>) -> Vec<InstalledItem> {
    let mut seen = HashSet::new();
    raw.into_iter()
        .filter_map(|(key, module)| match InstalledItem::wrap(module) {
            Ok(item) if seen.insert(item.id.clone()) => Some(item),
            Ok(item) => {
                log::warn!("已安装模块 {} 重复（键 {}），忽略", item.id, key);
                None
            }
            Err(e) => {
                log::warn!("跳过已安装模块 {}: {}", key, e);
                None
            }
        })
        .collect()
}

/// 包装仓库记录，保持原顺序；坏记录与重复 id 记日志后丢弃
pub fn wrap_repos(raw: Vec<RawRepo>) -> Vec<RemoteItem> {
    let mut seen = HashSet::new();
    raw.into_iter()
        .enumerate()
        .filter_map(|(index, repo)| match RemoteItem::wrap(repo) {
            Ok(item) if seen.insert(item.id.clone()) => Some(item),
            Ok(item) => {
                log::warn!("仓库记录 #{} 的 id {} 重复，忽略", index, item.id);
                None
            }
            Err(e) => {
                log::warn!("跳过仓库记录 #{}: {}", index, e);
                None
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_module(root: &Path, dir: &str, prop: &str, flags: &[&str]) {
        let dir = root.join(dir);
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("module.prop"), prop).unwrap();
        for flag in flags {
            fs::write(dir.join(flag), "").unwrap();
        }
    }

    #[test]
    fn module_dir_reads_props_and_flags() {
        let tmp = tempfile::tempdir().unwrap();
        write_module(tmp.path(), "hosts", "id=hosts\nversionCode=3\n", &["disable"]);
        write_module(tmp.path(), "noid", "versionCode=1\nname=No Id\n", &["remove", "update"]);
        fs::create_dir_all(tmp.path().join("empty")).unwrap();

        let modules = ModuleDir::new(tmp.path()).load_installed().unwrap();
        assert_eq!(modules.len(), 2);
        assert!(modules["hosts"].disabled);
        assert!(!modules["hosts"].pending_remove);
        let noid = &modules["noid"];
        assert_eq!(noid.id.as_deref(), Some("noid"));
        assert!(noid.pending_remove && noid.pending_update);
    }

    #[test]
    fn duplicate_module_ids_keep_first_directory() {
        let tmp = tempfile::tempdir().unwrap();
        write_module(tmp.path(), "b-copy", "id=hosts\nversionCode=2\n", &[]);
        write_module(tmp.path(), "a-hosts", "id=hosts\nversionCode=1\n", &[]);
        write_module(tmp.path(), "other", "id=other\nversionCode=1\n", &[]);
        // module.prop 不是文件的目录不算模块
        fs::create_dir_all(tmp.path().join("broken/module.prop")).unwrap();

        let modules = ModuleDir::new(tmp.path()).load_installed().unwrap();
        assert_eq!(modules.len(), 2);
        assert_eq!(modules["hosts"].version_code, Some(1));
        assert!(modules.contains_key("other"));
    }

    #[test]
    fn missing_module_dir_is_empty() {
        let tmp = tempfile::tempdir().unwrap();
        let modules = ModuleDir::new(tmp.path().join("absent"))
            .load_installed()
            .unwrap();
        assert!(modules.is_empty());
    }

    #[test]
    fn catalog_file_serves_last_good_snapshot() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("repos.json");
        fs::write(&path, r#"[{"id":"a","versionCode":1},{"id":"b","versionCode":2}]"#).unwrap();

        let catalog = CatalogFile::new(&path);
        assert!(catalog.query_repos().unwrap().is_empty());
        catalog.reload().unwrap();
        assert_eq!(catalog.query_repos().unwrap().len(), 2);

        fs::write(&path, "not json").unwrap();
        assert!(catalog.reload().is_err());
        assert_eq!(catalog.query_repos().unwrap().len(), 2);
    }

    #[test]
    fn wrap_repos_drops_malformed_and_duplicates() {
        let repo = |id: Option<&str>, code: Option<i64>| RawRepo {
            id: id.map(str::to_string),
            version_code: code,
            ..Default::default()
        };
        let items = wrap_repos(vec![
            repo(Some("a"), Some(1)),
            repo(None, Some(1)),
            repo(Some("b"), None),
            repo(Some("c"), Some(4)),
            repo(Some("a"), Some(9)),
        ]);
        let ids: Vec<_> = items.iter().map(|i| i.id.as_str()).collect();
        assert_eq!(ids, ["a", "c"]);
        assert_eq!(items[0].version_code, 1);
    }

    #[test]
    fn wrap_modules_drops_malformed() {
        let mut raw = BTreeMap::new();
        raw.insert(
            "ok".to_string(),
            RawModule {
                id: Some("ok".to_string()),
                version_code: Some(1),
                ..Default::default()
            },
        );
        raw.insert(
            "bad".to_string(),
            RawModule {
                id: Some("bad".to_string()),
                ..Default::default()
            },
        );
        let items = wrap_modules(raw);
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].id, "ok");
    }
}
