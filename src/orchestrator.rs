//! 刷新编排：协调两个异步加载器、搜索串变化与两个面板的 diff 输出
//!
//! 每次重算在发起时取得该面板的代号（generation）。结果只在代号比已采用的新时
//! 才会被采用；若计算所基于的列表已不是当前显示的列表，则针对当前列表重新 diff。
//! 采用与发送在同一把锁内完成，所以消费者按采用顺序收到脚本，总能直接应用。

use crate::catalog::{self, CatalogSource, InstalledItem, InstalledSource, RemoteItem};
use crate::diff::{self, Edit};
use crate::error::DiffError;
use crate::filter;
use crate::partition::{self, SectionLabels};
use crate::view::ViewItem;
use anyhow::anyhow;
use chrono::{DateTime, Local};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::{mpsc, watch};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Panel {
    Installed,
    Remote,
}

#[derive(Debug, Clone, PartialEq)]
pub enum LoadState {
    Idle,
    Loading,
    Ready { at: DateTime<Local> },
    Error(String),
}

/// 一次面板更新：新列表 + 把上一次列表变成新列表的脚本
#[derive(Debug, Clone)]
pub struct PanelUpdate {
    pub panel: Panel,
    pub generation: u64,
    pub items: Arc<Vec<ViewItem>>,
    pub script: Vec<Edit<ViewItem>>,
}

/// 透传给外部的副作用请求，核心只负责转发
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    OpenFilePicker,
    OpenChangelog(RemoteItem),
    Install(RemoteItem),
}

#[derive(Debug, Clone)]
pub enum CatalogEvent {
    Panel(PanelUpdate),
    Action(Action),
}

/// 远程面板渲染：空查询分组，否则平铺过滤
pub fn render_remote(
    remote: &[RemoteItem],
    installed: &[InstalledItem],
    query: &str,
    labels: &SectionLabels,
) -> Vec<ViewItem> {
    if query.is_empty() {
        partition::categorize(remote, installed, labels)
    } else {
        filter::filter(remote, query)
    }
}

// ========== 内部状态 ==========

#[derive(Debug, Default)]
struct PanelState {
    /// 最近一次发出的列表（即消费者当前持有的列表）
    shown: Arc<Vec<ViewItem>>,
    issued: u64,
    adopted: u64,
}

#[derive(Debug, Default)]
struct Canonical {
    installed: Arc<Vec<InstalledItem>>,
    remote: Arc<Vec<RemoteItem>>,
    query: String,
    installed_panel: PanelState,
    remote_panel: PanelState,
}

enum Render {
    Installed(Arc<Vec<InstalledItem>>),
    Remote {
        remote: Arc<Vec<RemoteItem>>,
        installed: Arc<Vec<InstalledItem>>,
        query: String,
    },
}

impl Render {
    fn render(&self, labels: &SectionLabels) -> Vec<ViewItem> {
        match self {
            Render::Installed(items) => items.iter().cloned().map(ViewItem::Installed).collect(),
            Render::Remote {
                remote,
                installed,
                query,
            } => render_remote(remote, installed, query, labels),
        }
    }
}

/// 已发起、待计算的一次重算
struct Job {
    panel: Panel,
    generation: u64,
    base: Arc<Vec<ViewItem>>,
    base_generation: u64,
    render: Render,
}

impl Canonical {
    fn panel_mut(&mut self, panel: Panel) -> &mut PanelState {
        match panel {
            Panel::Installed => &mut self.installed_panel,
            Panel::Remote => &mut self.remote_panel,
        }
    }

    /// 发起一次重算：分配代号并对当前全集拍快照
    fn issue(&mut self, panel: Panel) -> Job {
        let render = match panel {
            Panel::Installed => Render::Installed(self.installed.clone()),
            Panel::Remote => Render::Remote {
                remote: self.remote.clone(),
                installed: self.installed.clone(),
                query: self.query.clone(),
            },
        };
        let state = self.panel_mut(panel);
        state.issued += 1;
        Job {
            panel,
            generation: state.issued,
            base: state.shown.clone(),
            base_generation: state.adopted,
            render,
        }
    }
}

struct Inner {
    installed_source: Arc<dyn InstalledSource>,
    catalog_source: Arc<dyn CatalogSource>,
    labels: SectionLabels,
    canonical: Mutex<Canonical>,
    /// 最近一次 refresh 的序号；过期 refresh 的加载结果不再改动加载状态
    refresh_seq: AtomicU64,
    load_state: watch::Sender<LoadState>,
    events: mpsc::UnboundedSender<CatalogEvent>,
}

impl Inner {
    fn lock(&self) -> MutexGuard<'_, Canonical> {
        self.canonical.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// 计算并尝试采用；返回是否采用。diff 失败时什么都不采用
    fn compute_and_commit(&self, job: Job) -> Result<bool, DiffError> {
        let items = job.render.render(&self.labels);
        let script = diff::diff(&job.base, &items)?;

        let mut canonical = self.lock();
        let state = canonical.panel_mut(job.panel);
        if job.generation <= state.adopted {
            log::debug!(
                "{:?} 面板丢弃过期结果 gen={}（已采用 gen={}）",
                job.panel,
                job.generation,
                state.adopted
            );
            return Ok(false);
        }

        let script = if state.adopted == job.base_generation {
            script
        } else {
            log::debug!(
                "{:?} 面板 gen={} 的基准已变（{} -> {}），重新 diff",
                job.panel,
                job.generation,
                job.base_generation,
                state.adopted
            );
            diff::diff(&state.shown, &items)?
        };

        let items = Arc::new(items);
        state.shown = items.clone();
        state.adopted = job.generation;
        log::debug!(
            "{:?} 面板采用 gen={}: {} 项, {} 个操作",
            job.panel,
            job.generation,
            items.len(),
            script.len()
        );
        let _ = self.events.send(CatalogEvent::Panel(PanelUpdate {
            panel: job.panel,
            generation: job.generation,
            items,
            script,
        }));
        Ok(true)
    }

    fn is_current(&self, seq: u64) -> bool {
        self.refresh_seq.load(Ordering::SeqCst) == seq
    }

    fn fail(&self, seq: u64, what: &str, err: anyhow::Error) {
        log::error!("{}失败: {:#}", what, err);
        if !self.is_current(seq) {
            log::warn!("refresh #{} 已被更新的 refresh 取代，不改动加载状态", seq);
            return;
        }
        self.load_state
            .send_replace(LoadState::Error(format!("{}失败: {:#}", what, err)));
    }

    /// 列表身份重复说明上游契约被破坏：先把状态置为错误，再让任务崩溃
    fn fault(&self, panel: Panel, err: DiffError) -> ! {
        let msg = format!("{:?} 面板 diff 失败: {}", panel, err);
        log::error!("{}", msg);
        self.load_state.send_replace(LoadState::Error(msg.clone()));
        panic!("{}", msg);
    }
}

async fn run_job(inner: Arc<Inner>, job: Job) {
    let panel = job.panel;
    let worker = inner.clone();
    match tokio::task::spawn_blocking(move || worker.compute_and_commit(job)).await {
        Ok(Ok(_)) => {}
        Ok(Err(e)) => inner.fault(panel, e),
        Err(e) if e.is_panic() => std::panic::resume_unwind(e.into_panic()),
        Err(e) => log::error!("{:?} 面板重算任务被取消: {}", panel, e),
    }
}

// ========== 对外接口 ==========

#[derive(Clone)]
pub struct Orchestrator {
    inner: Arc<Inner>,
}

impl Orchestrator {
    pub fn new(
        installed_source: Arc<dyn InstalledSource>,
        catalog_source: Arc<dyn CatalogSource>,
        labels: SectionLabels,
    ) -> (Self, mpsc::UnboundedReceiver<CatalogEvent>) {
        let (events, rx) = mpsc::unbounded_channel();
        let (load_state, _) = watch::channel(LoadState::Idle);
        let inner = Arc::new(Inner {
            installed_source,
            catalog_source,
            labels,
            canonical: Mutex::new(Canonical::default()),
            refresh_seq: AtomicU64::new(0),
            load_state,
            events,
        });
        (Self { inner }, rx)
    }

    pub fn load_state(&self) -> LoadState {
        self.inner.load_state.borrow().clone()
    }

    pub fn subscribe_state(&self) -> watch::Receiver<LoadState> {
        self.inner.load_state.subscribe()
    }

    pub fn query(&self) -> String {
        self.inner.lock().query.clone()
    }

    /// 当前显示的面板列表
    pub fn shown(&self, panel: Panel) -> Arc<Vec<ViewItem>> {
        self.inner.lock().panel_mut(panel).shown.clone()
    }

    /// 重新加载已安装模块与远程目录；两个加载器独立并发，不阻塞调用方
    pub fn refresh(&self) {
        let seq = self.inner.refresh_seq.fetch_add(1, Ordering::SeqCst) + 1;
        log::debug!("refresh #{}", seq);
        self.inner.load_state.send_replace(LoadState::Loading);
        tokio::spawn(load_installed(self.inner.clone(), seq));
        tokio::spawn(load_catalog(self.inner.clone(), seq));
    }

    /// 修改搜索串并重算远程面板（不触发重新加载），返回本次重算的代号
    pub fn set_query(&self, query: impl Into<String>) -> u64 {
        let job = {
            let mut canonical = self.inner.lock();
            canonical.query = query.into();
            canonical.issue(Panel::Remote)
        };
        let generation = job.generation;
        tokio::spawn(run_job(self.inner.clone(), job));
        generation
    }

    // ===== 透传动作 =====

    pub fn open_file_picker(&self) {
        self.forward(Action::OpenFilePicker);
    }

    pub fn open_changelog(&self, item: &RemoteItem) {
        self.forward(Action::OpenChangelog(item.clone()));
    }

    pub fn install(&self, item: &RemoteItem) {
        self.forward(Action::Install(item.clone()));
    }

    fn forward(&self, action: Action) {
        log::debug!("转发动作: {:?}", action);
        let _ = self.inner.events.send(CatalogEvent::Action(action));
    }
}

async fn load_installed(inner: Arc<Inner>, seq: u64) {
    let source = inner.installed_source.clone();
    let raw = match tokio::task::spawn_blocking(move || source.load_installed()).await {
        Ok(Ok(raw)) => raw,
        Ok(Err(e)) => return inner.fail(seq, "加载已安装模块", e),
        Err(e) => return inner.fail(seq, "加载已安装模块", anyhow!(e)),
    };
    let items = catalog::wrap_modules(raw);
    log::info!("已安装模块: {} 个", items.len());

    let jobs = {
        let mut canonical = inner.lock();
        canonical.installed = Arc::new(items);
        let mut jobs = vec![canonical.issue(Panel::Installed)];
        // 分组依赖已安装集合
        if canonical.query.is_empty() {
            jobs.push(canonical.issue(Panel::Remote));
        }
        jobs
    };
    for job in jobs {
        run_job(inner.clone(), job).await;
    }
}

async fn load_catalog(inner: Arc<Inner>, seq: u64) {
    let source = inner.catalog_source.clone();
    let fetched = tokio::task::spawn_blocking(move || {
        source.reload()?;
        source.query_repos()
    })
    .await;
    let raw = match fetched {
        Ok(Ok(raw)) => raw,
        Ok(Err(e)) => return inner.fail(seq, "加载仓库目录", e),
        Err(e) => return inner.fail(seq, "加载仓库目录", anyhow!(e)),
    };
    let items = catalog::wrap_repos(raw);
    log::info!("仓库条目: {} 个", items.len());

    let job = {
        let mut canonical = inner.lock();
        canonical.remote = Arc::new(items);
        canonical.issue(Panel::Remote)
    };
    run_job(inner.clone(), job).await;

    // 已安装加载先失败时保留错误状态；过期的 refresh 不能提前结束新的加载
    inner.load_state.send_if_modified(|state| {
        if inner.is_current(seq) && matches!(state, LoadState::Loading) {
            *state = LoadState::Ready { at: Local::now() };
            true
        } else {
            false
        }
    });
}
