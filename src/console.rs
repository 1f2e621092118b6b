//! 终端前端：持有两个面板的列表，按脚本更新并打印；解析输入命令

use crate::diff;
use crate::error::DiffError;
use crate::orchestrator::{Action, Panel, PanelUpdate};
use crate::view::ViewItem;

/// 一行输入对应的命令
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// 其余任何文本都当作新的搜索串（空行清空搜索）
    Query(String),
    Refresh,
    Quit,
    FilePicker,
    /// 远程面板第 N 个条目（从 1 开始，不计分组标题）
    Install(usize),
    Changelog(usize),
}

pub fn parse_command(line: &str) -> Command {
    let trimmed = line.trim();
    let mut parts = trimmed.split_whitespace();
    match parts.next() {
        Some(":q") => Command::Quit,
        Some(":r") => Command::Refresh,
        Some(":f") => Command::FilePicker,
        Some(cmd @ (":i" | ":c")) => match parts.next().and_then(|n| n.parse().ok()) {
            Some(n) if cmd == ":i" => Command::Install(n),
            Some(n) => Command::Changelog(n),
            None => Command::Query(trimmed.to_string()),
        },
        _ => Command::Query(trimmed.to_string()),
    }
}

/// 消费者持有的面板副本
#[derive(Debug, Default)]
pub struct HeldPanels {
    pub installed: Vec<ViewItem>,
    pub remote: Vec<ViewItem>,
}

impl HeldPanels {
    /// 把更新中的脚本应用到持有的列表上；应用失败时直接采用新列表
    pub fn apply(&mut self, update: &PanelUpdate) -> Result<(), DiffError> {
        let list = match update.panel {
            Panel::Installed => &mut self.installed,
            Panel::Remote => &mut self.remote,
        };
        let result = diff::apply(list, &update.script);
        if result.is_err() || *list != *update.items {
            *list = update.items.as_ref().clone();
        }
        result
    }

    /// 远程面板第 N 个条目（从 1 开始）
    pub fn remote_entry(&self, n: usize) -> Option<&crate::catalog::RemoteItem> {
        self.remote
            .iter()
            .filter_map(ViewItem::as_remote)
            .nth(n.checked_sub(1)?)
    }

    pub fn render(&self, panel: Panel) -> Vec<String> {
        let (title, list) = match panel {
            Panel::Installed => ("已安装", &self.installed),
            Panel::Remote => ("仓库", &self.remote),
        };
        let mut lines = vec![format!("[{}] {} 项", title, list.len())];
        let mut n = 0;
        for item in list {
            if item.is_section() {
                lines.push(item.display_line());
            } else {
                n += 1;
                lines.push(format!("  {:>3}. {}", n, item.display_line()));
            }
        }
        lines
    }
}

pub fn describe_action(action: &Action) -> String {
    match action {
        Action::OpenFilePicker => "→ 打开文件选择器".to_string(),
        Action::OpenChangelog(item) => format!("→ 查看更新日志: {}", item.name),
        Action::Install(item) => match &item.download_url {
            Some(url) => format!("→ 安装 {} ({})", item.name, url),
            None => format!("→ 安装 {}", item.name),
        },
    }
}
