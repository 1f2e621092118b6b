use anyhow::Result;
use lian_catalog::catalog::{CatalogFile, ModuleDir};
use lian_catalog::config::Config;
use lian_catalog::console::{self, Command, HeldPanels};
use lian_catalog::{CatalogEvent, LoadState, Orchestrator};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();

    // 加载配置
    let config = Config::load_or_default()?;
    log::info!(
        "模块目录: {}，仓库目录: {}",
        config.modules_dir.display(),
        config.catalog_path.display()
    );

    let (orchestrator, mut events) = Orchestrator::new(
        Arc::new(ModuleDir::new(&config.modules_dir)),
        Arc::new(CatalogFile::new(&config.catalog_path)),
        config.labels.clone(),
    );
    let mut state_rx = orchestrator.subscribe_state();

    if !config.initial_query.is_empty() {
        orchestrator.set_query(config.initial_query.clone());
    }
    orchestrator.refresh();

    println!("输入文本搜索；:r 刷新  :i N 安装  :c N 更新日志  :f 选择文件  :q 退出");

    let mut held = HeldPanels::default();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    // 主循环
    loop {
        tokio::select! {
            event = events.recv() => {
                let Some(event) = event else { break };
                match event {
                    CatalogEvent::Panel(update) => {
                        if let Err(e) = held.apply(&update) {
                            log::warn!("脚本应用失败，直接采用新列表: {}", e);
                        }
                        log::debug!(
                            "{:?} 面板 gen={} 应用 {} 个操作",
                            update.panel,
                            update.generation,
                            update.script.len()
                        );
                        for line in held.render(update.panel) {
                            println!("{}", line);
                        }
                    }
                    CatalogEvent::Action(action) => println!("{}", console::describe_action(&action)),
                }
            }
            changed = state_rx.changed() => {
                if changed.is_err() {
                    break;
                }
                match &*state_rx.borrow_and_update() {
                    LoadState::Loading => println!("加载中..."),
                    LoadState::Ready { at } => println!("已刷新 ({})", at.format("%H:%M:%S")),
                    LoadState::Error(msg) => eprintln!("错误: {}", msg),
                    LoadState::Idle => {}
                }
            }
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                match console::parse_command(&line) {
                    Command::Quit => break,
                    Command::Refresh => orchestrator.refresh(),
                    Command::FilePicker => orchestrator.open_file_picker(),
                    Command::Install(n) => match held.remote_entry(n) {
                        Some(item) => orchestrator.install(item),
                        None => eprintln!("没有第 {} 个条目", n),
                    },
                    Command::Changelog(n) => match held.remote_entry(n) {
                        Some(item) => orchestrator.open_changelog(item),
                        None => eprintln!("没有第 {} 个条目", n),
                    },
                    Command::Query(query) => {
                        orchestrator.set_query(query);
                    }
                }
            }
        }
    }

    Ok(())
}
