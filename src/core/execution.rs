//! # Test Execution Engine Module / 测试执行引擎模块
//!
//! The engine walks a realized [`TestItem`] tree and its [`Snapshot`] in
//! lock-step and advances every node through
//! `Initializing → Executing → Terminating`.
//!
//! Two parties take part in a run:
//! - the engine task (spawned on the caller's tokio runtime), which owns all
//!   run state, emits events, writes logs and updates statistics;
//! - the worker thread, which runs the user-supplied lifecycle bodies one at
//!   a time.
//!
//! The worker, the timeout timer and the logging side-channel only ever talk
//! to the engine task through its inbox. Each message carries the generation
//! it was issued under; the engine bumps the generation whenever it accepts an
//! outcome, so a late completion racing a timeout (or an abort) is discarded.
//!
//! 引擎以同步步调遍历已实现的 [`TestItem`] 树及其 [`Snapshot`]，
//! 推动每个节点经历 `Initializing → Executing → Terminating`。
//!
//! 一次运行涉及两方：
//! - 引擎任务（在调用方的 tokio 运行时上派生），拥有全部运行状态，发出事件、写日志并更新统计；
//! - 工作线程，逐个运行用户提供的生命周期函数。
//!
//! 工作线程、超时计时器和日志旁路只通过收件箱与引擎任务通信。每条消息都带有发出时的代数；
//! 引擎每接受一个结果就递增代数，因此与超时（或中止）竞争的迟到结果会被丢弃。

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::core::clock::{Clock, SystemClock};
use crate::core::config::EngineConfig;
use crate::core::context::{RunParameters, TestContext};
use crate::core::error::EngineError;
use crate::core::models::{FailureInfo, LogLevel, TestResult};
use crate::core::snapshot::{NodeId, Snapshot, SnapshotNode};
use crate::core::stats::RunStatistics;
use crate::core::tree::{Phase, TestItem};
use crate::infra::worker::{WorkItem, Worker};
use crate::reporting::log_writer::{self, ItemInfo, LogWriter};

/// Which variations a run executes.
/// 一次运行执行哪些变体。
#[derive(Debug, Clone, Default)]
pub enum Selection {
    #[default]
    All,
    Only(HashSet<NodeId>),
}

impl Selection {
    /// Selects the variations of `snapshot` accepted by `predicate`.
    pub fn matching<F>(snapshot: &Snapshot, predicate: F) -> Self
    where
        F: Fn(NodeId, &SnapshotNode) -> bool,
    {
        Selection::Only(
            snapshot
                .iter()
                .filter(|(id, node)| node.is_variation() && predicate(*id, node))
                .map(|(id, _)| id)
                .collect(),
        )
    }

    pub fn includes(&self, id: NodeId) -> bool {
        match self {
            Selection::All => true,
            Selection::Only(ids) => ids.contains(&id),
        }
    }
}

/// Notifications emitted by a run, in order.
/// 运行过程中按顺序发出的通知。
#[derive(Debug, Clone, PartialEq)]
pub enum RunEvent {
    TestItemStarting {
        node: NodeId,
        result: TestResult,
    },
    TestItemCompleted {
        node: NodeId,
        result: TestResult,
        failure: Option<FailureInfo>,
    },
    RunStatisticsUpdated(RunStatistics),
    RunCompleted,
}

/// What the engine task resolves to.
#[derive(Debug, Clone, Default)]
pub struct RunReport {
    pub statistics: RunStatistics,
    /// Final result of every node that finished or was bulk-marked.
    pub results: BTreeMap<NodeId, TestResult>,
    /// Outcomes discarded because a newer decision had already been made.
    pub stale_results_discarded: u64,
}

impl RunReport {
    pub fn result(&self, node: NodeId) -> Option<TestResult> {
        self.results.get(&node).copied()
    }
}

/// An outcome of one lifecycle call.
#[derive(Debug, Clone)]
pub(crate) struct Outcome {
    pub result: TestResult,
    pub failure: Option<FailureInfo>,
}

impl Outcome {
    pub fn new(result: TestResult, failure: Option<FailureInfo>) -> Self {
        Self { result, failure }
    }

    pub fn passed() -> Self {
        Self::new(TestResult::Passed, None)
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self::new(TestResult::Failed, Some(FailureInfo::new(message)))
    }
}

/// Messages delivered to the engine task.
pub(crate) enum EngineMessage {
    Outcome { generation: u64, outcome: Outcome },
    Log {
        generation: u64,
        level: LogLevel,
        text: String,
    },
    TimedOut { generation: u64 },
    /// The worker thread died; no further outcomes will arrive.
    WorkerStopped,
}

/// Logging side-channel handed to lifecycle bodies.
#[derive(Clone)]
pub(crate) struct LogSink {
    generation: u64,
    tx: mpsc::UnboundedSender<EngineMessage>,
}

impl LogSink {
    pub fn write_line(&self, level: LogLevel, text: String) {
        let _ = self.tx.send(EngineMessage::Log {
            generation: self.generation,
            level,
            text,
        });
    }
}

/// Generation counter that decides which asynchronous message may settle the
/// in-flight lifecycle call.
///
/// Every call is issued under the current generation. The first message that
/// claims it advances the counter; any message carrying another generation is
/// counted as stale and ignored.
///
/// 代数计数器，决定哪条异步消息可以结束正在执行的生命周期调用。
/// 第一条认领当前代数的消息会推进计数器；携带其他代数的消息计为过期并被忽略。
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct GenerationGate {
    current: u64,
    stale: u64,
}

impl GenerationGate {
    pub fn current(&self) -> u64 {
        self.current
    }

    pub fn stale(&self) -> u64 {
        self.stale
    }

    pub fn is_current(&self, generation: u64) -> bool {
        generation == self.current
    }

    /// Accepts a decision for the current generation, or counts it as stale.
    pub fn claim(&mut self, generation: u64) -> bool {
        if !self.is_current(generation) {
            self.stale += 1;
            return false;
        }
        self.current += 1;
        true
    }

    /// Counts a message that arrived after the run stopped listening.
    pub fn discard(&mut self) {
        self.stale += 1;
    }
}

/// Cloneable handle used to abort a run.
#[derive(Clone)]
pub struct RunControl {
    abort: CancellationToken,
    stopped: watch::Receiver<bool>,
}

impl RunControl {
    /// Requests an abort without waiting.
    pub fn request_abort(&self) {
        self.abort.cancel();
    }

    /// Requests an abort and waits until the worker thread has stopped.
    ///
    /// The in-flight lifecycle call is cancelled at its next await point; a body
    /// that blocks synchronously runs to completion first.
    ///
    /// 请求中止并等待工作线程停止。
    /// 正在执行的生命周期调用会在下一个 await 点被取消；同步阻塞的函数会先运行至完成。
    pub async fn abort(&self) {
        self.abort.cancel();
        let mut stopped = self.stopped.clone();
        let _ = stopped.wait_for(|done| *done).await;
    }

    pub fn is_abort_requested(&self) -> bool {
        self.abort.is_cancelled()
    }
}

/// A run in progress.
pub struct RunHandle {
    events: mpsc::UnboundedReceiver<RunEvent>,
    control: RunControl,
    task: JoinHandle<Result<RunReport, EngineError>>,
}

impl RunHandle {
    pub fn control(&self) -> RunControl {
        self.control.clone()
    }

    pub async fn abort(&self) {
        self.control.abort().await;
    }

    /// The next event, or `None` once the run is over and all events were read.
    pub async fn next_event(&mut self) -> Option<RunEvent> {
        self.events.recv().await
    }

    /// Waits for the run to finish. Unread events are dropped.
    pub async fn wait(self) -> Result<RunReport, EngineError> {
        self.task
            .await
            .map_err(|e| EngineError::DriverPanicked(e.to_string()))?
    }

    /// Reads every event until the run is over, then returns them with the report.
    pub async fn collect(mut self) -> Result<(Vec<RunEvent>, RunReport), EngineError> {
        let mut events = Vec::new();
        while let Some(event) = self.events.recv().await {
            events.push(event);
        }
        let report = self.wait().await?;
        Ok((events, report))
    }
}

/// Executes test item trees. One engine can start any number of runs.
/// 执行测试项树。一个引擎可以启动任意数量的运行。
pub struct ExecutionEngine {
    config: EngineConfig,
    clock: Arc<dyn Clock>,
}

impl ExecutionEngine {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            config,
            clock: Arc::new(SystemClock),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Starts one run and returns immediately.
    ///
    /// # Arguments
    /// * `root` - The realized root module
    /// * `snapshot` - Snapshot captured from `root`; its ids address nodes in events
    /// * `log` - Receiver of begin/end notifications and log lines
    /// * `selection` - Variations to execute
    /// * `parameters` - Run parameters exposed to every lifecycle body
    ///
    /// # Errors
    /// Fails when called outside a tokio runtime, when the snapshot does not
    /// describe `root`, or when the worker thread cannot be started.
    pub fn run(
        &self,
        root: Arc<TestItem>,
        snapshot: Arc<Snapshot>,
        log: Box<dyn LogWriter>,
        selection: Selection,
        parameters: RunParameters,
    ) -> Result<RunHandle, EngineError> {
        let runtime = Handle::try_current().map_err(|_| EngineError::NoRuntime)?;
        if snapshot.is_empty() || !snapshot.matches_item(snapshot.root(), &root) {
            return Err(EngineError::Desynchronized { path: root.path() });
        }

        let abort = CancellationToken::new();
        let (inbox_tx, inbox) = mpsc::unbounded_channel();
        let worker = Worker::spawn(&self.config.worker_thread_name, abort.clone(), inbox_tx.clone())
            .map_err(EngineError::WorkerSpawn)?;
        let (events_tx, events) = mpsc::unbounded_channel();
        let (stopped_tx, stopped) = watch::channel(false);

        let honored = honored_nodes(&snapshot, &selection);
        let driver = Driver {
            config: self.config.clone(),
            clock: self.clock.clone(),
            root,
            snapshot,
            log,
            honored,
            parameters: Arc::new(parameters),
            stack: Vec::new(),
            gate: GenerationGate::default(),
            in_flight: None,
            timer: None,
            deadline: None,
            statistics: RunStatistics::default(),
            results: BTreeMap::new(),
            worker: Some(worker),
            abort: abort.clone(),
            inbox,
            inbox_tx,
            events: events_tx,
            stopped: stopped_tx,
        };
        let task = runtime.spawn(driver.drive());

        Ok(RunHandle {
            events,
            control: RunControl { abort, stopped },
            task,
        })
    }
}

/// A node is honored when it is a selected variation or a container with an
/// honored descendant.
fn honored_nodes(snapshot: &Snapshot, selection: &Selection) -> Vec<bool> {
    let mut honored = vec![false; snapshot.len()];
    // Pre-order ids: every child has a larger id than its parent.
    for index in (0..snapshot.len()).rev() {
        let id = NodeId(index);
        let node = &snapshot[id];
        honored[index] = if node.is_variation() {
            selection.includes(id)
        } else {
            node.children.iter().any(|c| honored[c.0])
        };
    }
    honored
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LifecycleState {
    Initializing,
    Executing,
    Terminating,
}

/// Per-node state while the node is on the stack.
struct ExecutionContext {
    item: Arc<TestItem>,
    node: NodeId,
    next_child: usize,
    state: LifecycleState,
    result: TestResult,
    failure: Option<FailureInfo>,
}

impl ExecutionContext {
    fn new(item: Arc<TestItem>, node: NodeId) -> Self {
        Self {
            item,
            node,
            next_child: 0,
            state: LifecycleState::Initializing,
            result: TestResult::InProgress,
            failure: None,
        }
    }

    fn record(&mut self, result: TestResult, failure: Option<FailureInfo>) {
        self.result = self.result.max(result);
        if self.failure.is_none() {
            self.failure = failure;
        }
    }
}

/// Transitions that need no worker round-trip are chained through `Step`.
enum Step {
    Begin(Arc<TestItem>, NodeId),
    Execute,
    Advance,
    Terminate,
    Finish,
    /// A lifecycle call is in flight; wait for the inbox.
    Wait,
}

struct Driver {
    config: EngineConfig,
    clock: Arc<dyn Clock>,
    root: Arc<TestItem>,
    snapshot: Arc<Snapshot>,
    log: Box<dyn LogWriter>,
    honored: Vec<bool>,
    parameters: Arc<RunParameters>,
    stack: Vec<ExecutionContext>,
    gate: GenerationGate,
    in_flight: Option<CancellationToken>,
    timer: Option<JoinHandle<()>>,
    deadline: Option<Duration>,
    statistics: RunStatistics,
    results: BTreeMap<NodeId, TestResult>,
    worker: Option<Worker>,
    abort: CancellationToken,
    inbox: mpsc::UnboundedReceiver<EngineMessage>,
    inbox_tx: mpsc::UnboundedSender<EngineMessage>,
    events: mpsc::UnboundedSender<RunEvent>,
    stopped: watch::Sender<bool>,
}

impl Driver {
    async fn drive(mut self) -> Result<RunReport, EngineError> {
        let walked = self.walk().await;

        self.cancel_timer();
        if let Some(token) = self.in_flight.take() {
            token.cancel();
        }
        let joined = match self.worker.take() {
            Some(worker) => worker.shutdown().await,
            None => Ok(()),
        };
        self.drain_stale();

        let outcome = walked.and(joined);
        if outcome.is_ok() {
            self.emit(RunEvent::RunCompleted);
        }
        let _ = self.stopped.send(true);
        outcome?;

        Ok(RunReport {
            statistics: self.statistics,
            results: self.results,
            stale_results_discarded: self.gate.stale(),
        })
    }

    async fn walk(&mut self) -> Result<(), EngineError> {
        self.log.begin_suite(self.root.name());
        let root = self.root.clone();
        let root_id = self.snapshot.root();
        self.pump(Step::Begin(root, root_id)).await?;

        while !self.stack.is_empty() {
            let Some(message) = self.inbox.recv().await else {
                break;
            };
            match message {
                EngineMessage::Log {
                    generation,
                    level,
                    text,
                } => self.on_log(generation, level, &text),
                EngineMessage::Outcome {
                    generation,
                    outcome,
                } => {
                    if self.claim(generation) {
                        self.in_flight = None;
                        let step = self.on_outcome(outcome);
                        self.pump(step).await?;
                    }
                }
                EngineMessage::WorkerStopped => return Err(EngineError::WorkerPanicked),
                EngineMessage::TimedOut { generation } => {
                    let ms = self.deadline.map_or(0, |d| d.as_millis());
                    if self.claim(generation) {
                        if let Some(token) = self.in_flight.take() {
                            token.cancel();
                        }
                        let outcome = Outcome::new(
                            TestResult::Timeout,
                            Some(FailureInfo::new(format!("timed out after {} ms", ms))),
                        );
                        let step = self.on_outcome(outcome);
                        self.pump(step).await?;
                    }
                }
            }
        }

        self.log.end_suite(&self.statistics);
        Ok(())
    }

    fn claim(&mut self, generation: u64) -> bool {
        if !self.gate.claim(generation) {
            return false;
        }
        self.cancel_timer();
        true
    }

    fn cancel_timer(&mut self) {
        if let Some(timer) = self.timer.take() {
            timer.abort();
        }
        self.deadline = None;
    }

    fn drain_stale(&mut self) {
        while let Ok(message) = self.inbox.try_recv() {
            if matches!(
                message,
                EngineMessage::Outcome { .. } | EngineMessage::TimedOut { .. }
            ) {
                self.gate.discard();
            }
        }
    }

    fn emit(&self, event: RunEvent) {
        let _ = self.events.send(event);
    }

    async fn pump(&mut self, mut step: Step) -> Result<(), EngineError> {
        loop {
            step = match step {
                Step::Begin(item, node) => self.begin(item, node).await?,
                Step::Execute => self.execute().await?,
                Step::Advance => self.advance()?,
                Step::Terminate => self.terminate().await?,
                Step::Finish => self.finish(),
                Step::Wait => return Ok(()),
            };
        }
    }

    fn item_info<'a>(snapshot: &'a Snapshot, node: NodeId, path: &'a str, depth: usize) -> ItemInfo<'a> {
        let entry = &snapshot[node];
        ItemInfo {
            node,
            kind: entry.kind,
            metadata: &entry.metadata,
            path,
            depth,
        }
    }

    async fn begin(&mut self, item: Arc<TestItem>, node: NodeId) -> Result<Step, EngineError> {
        if !self.snapshot.matches_item(node, &item) {
            return Err(EngineError::Desynchronized { path: item.path() });
        }
        let skip_until = item.metadata().skip_until;
        let skip_reason = item.metadata().skip_reason.clone();

        let depth = self.stack.len();
        self.stack.push(ExecutionContext::new(item, node));
        self.emit(RunEvent::TestItemStarting {
            node,
            result: TestResult::InProgress,
        });
        let snapshot = self.snapshot.clone();
        let path = snapshot.path(node);
        log_writer::begin_item(
            self.log.as_mut(),
            &Self::item_info(&snapshot, node, &path, depth),
        );

        if let Some(until) = skip_until {
            let (result, message) = if self.clock.now() < until {
                let reason = skip_reason.unwrap_or_else(|| format!("skipped until {}", until));
                (TestResult::Skipped, reason)
            } else {
                (
                    TestResult::Failed,
                    format!("stale skip: the skip window ended at {}", until),
                )
            };
            if let Some(ctx) = self.stack.last_mut() {
                ctx.record(result, Some(FailureInfo::new(message)));
            }
            return Ok(Step::Finish);
        }

        self.dispatch(Phase::Init).await?;
        Ok(Step::Wait)
    }

    async fn execute(&mut self) -> Result<Step, EngineError> {
        self.dispatch(Phase::Execute).await?;
        Ok(Step::Wait)
    }

    async fn terminate(&mut self) -> Result<Step, EngineError> {
        if let Some(ctx) = self.stack.last_mut() {
            ctx.state = LifecycleState::Terminating;
        }
        self.dispatch(Phase::Terminate).await?;
        Ok(Step::Wait)
    }

    /// Posts a lifecycle call of the node on top of the stack to the worker.
    async fn dispatch(&mut self, phase: Phase) -> Result<(), EngineError> {
        let Some(ctx) = self.stack.last() else {
            return Ok(());
        };
        let item = ctx.item.clone();
        let node = ctx.node;
        let context = TestContext::new(
            item.metadata().clone(),
            self.snapshot.path(node),
            item.definition().params.clone(),
            self.parameters.clone(),
            Some(LogSink {
                generation: self.gate.current(),
                tx: self.inbox_tx.clone(),
            }),
        );

        if phase == Phase::Execute && item.is_variation() {
            if let Some(timeout) = self.config.timeout_for(item.metadata()) {
                let tx = self.inbox_tx.clone();
                let generation = self.gate.current();
                self.deadline = Some(timeout);
                self.timer = Some(tokio::spawn(async move {
                    tokio::time::sleep(timeout).await;
                    let _ = tx.send(EngineMessage::TimedOut { generation });
                }));
            }
        }

        let cancel = self.abort.child_token();
        self.in_flight = Some(cancel.clone());
        let worker = self.worker.as_ref().ok_or(EngineError::WorkerPanicked)?;
        worker
            .submit(WorkItem {
                generation: self.gate.current(),
                phase,
                item,
                context,
                cancel,
            })
            .await
    }

    fn on_outcome(&mut self, outcome: Outcome) -> Step {
        let Some(ctx) = self.stack.last_mut() else {
            return Step::Wait;
        };
        let result = outcome.result;
        ctx.record(result, outcome.failure);
        match ctx.state {
            LifecycleState::Initializing if result == TestResult::Passed => {
                ctx.state = LifecycleState::Executing;
                if ctx.item.is_variation() {
                    Step::Execute
                } else {
                    Step::Advance
                }
            }
            LifecycleState::Initializing | LifecycleState::Executing => Step::Terminate,
            LifecycleState::Terminating => Step::Finish,
        }
    }

    fn on_log(&mut self, generation: u64, level: LogLevel, text: &str) {
        if !self.gate.is_current(generation) {
            return;
        }
        self.log.write_line(level, text);
        if level == LogLevel::Warning {
            if let Some(ctx) = self.stack.last_mut() {
                if ctx.state == LifecycleState::Executing {
                    ctx.result = ctx.result.max(TestResult::Warning);
                }
            }
        }
    }

    /// Moves to the next honored child of the node on top of the stack.
    fn advance(&mut self) -> Result<Step, EngineError> {
        let aborted = self.abort.is_cancelled();
        let Some(ctx) = self.stack.last_mut() else {
            return Ok(Step::Wait);
        };
        let item = ctx.item.clone();
        let children = item.children()?;
        let nodes = self.snapshot.children(ctx.node);
        if children.len() != nodes.len() {
            return Err(EngineError::Desynchronized { path: item.path() });
        }

        while ctx.next_child < children.len() {
            let index = ctx.next_child;
            ctx.next_child += 1;
            if !aborted && self.honored[nodes[index].0] {
                return Ok(Step::Begin(children[index].clone(), nodes[index]));
            }
        }
        Ok(Step::Terminate)
    }

    /// Records the node on top of the stack and pops it.
    fn finish(&mut self) -> Step {
        let Some(mut ctx) = self.stack.pop() else {
            return Step::Wait;
        };
        if ctx.result == TestResult::InProgress {
            ctx.result = TestResult::Passed;
        }
        let result = ctx.result;
        let failure = ctx.failure.take().map(|mut failure| {
            failure.bugs = ctx.item.bugs().to_vec();
            failure
        });

        if result.blocks_descendants() {
            self.mark_pending(ctx.node, result, failure.as_ref());
        }

        let snapshot = self.snapshot.clone();
        let path = snapshot.path(ctx.node);
        log_writer::end_item(
            self.log.as_mut(),
            &Self::item_info(&snapshot, ctx.node, &path, self.stack.len()),
            result,
            failure.as_ref(),
        );

        self.results.insert(ctx.node, result);
        let is_variation = ctx.item.is_variation();
        if is_variation {
            self.statistics.record(ctx.item.metadata().priority, result);
        }
        self.emit(RunEvent::TestItemCompleted {
            node: ctx.node,
            result,
            failure,
        });
        if is_variation {
            self.emit(RunEvent::RunStatisticsUpdated(self.statistics.clone()));
        }

        match self.stack.last_mut() {
            Some(parent) => {
                parent.result = parent.result.max(result);
                Step::Advance
            }
            None => Step::Wait,
        }
    }

    /// Gives every honored, still pending variation below `node` the same result.
    fn mark_pending(&mut self, node: NodeId, result: TestResult, failure: Option<&FailureInfo>) {
        let snapshot = self.snapshot.clone();
        let mut marked = false;
        for id in snapshot.descendants(node) {
            let entry = &snapshot[id];
            if !entry.is_variation() || !self.honored[id.0] || self.results.contains_key(&id) {
                continue;
            }
            self.results.insert(id, result);
            self.statistics.record(entry.metadata.priority, result);
            self.emit(RunEvent::TestItemCompleted {
                node: id,
                result,
                failure: failure.cloned(),
            });
            marked = true;
        }
        if marked {
            self.emit(RunEvent::RunStatisticsUpdated(self.statistics.clone()));
        }
    }
}
