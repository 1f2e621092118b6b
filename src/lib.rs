//! 模块仓库浏览核心：已安装模块与远程仓库目录的合并、分组、搜索与列表 diff

pub mod catalog;
pub mod config;
pub mod console;
pub mod diff;
pub mod error;
pub mod filter;
pub mod orchestrator;
pub mod partition;
pub mod view;

pub use diff::{diff, Edit};
pub use orchestrator::{Action, CatalogEvent, LoadState, Orchestrator, Panel, PanelUpdate};
pub use view::ViewItem;
