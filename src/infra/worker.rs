//! # Worker Thread Module / 工作线程模块
//!
//! Every user-supplied lifecycle body runs on one dedicated OS thread that owns
//! a current-thread tokio runtime. Work arrives through a one-slot queue; each
//! item is raced against its cancellation token and the result is posted back
//! to the engine task tagged with the generation it was issued under.
//!
//! 所有用户提供的生命周期函数都运行在一个专用的操作系统线程上，该线程拥有一个单线程 tokio 运行时。
//! 工作项通过单槽队列到达；每个工作项都与其取消令牌竞争，结果带着发出时的代数标记回传给引擎任务。

use futures::FutureExt;
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::core::context::TestContext;
use crate::core::error::{EngineError, TestError};
use crate::core::execution::{EngineMessage, Outcome};
use crate::core::models::{FailureInfo, TestResult};
use crate::core::tree::{Phase, TestItem};

/// One lifecycle call to perform on the worker thread.
pub(crate) struct WorkItem {
    pub generation: u64,
    pub phase: Phase,
    pub item: Arc<TestItem>,
    pub context: TestContext,
    pub cancel: CancellationToken,
}

pub(crate) struct Worker {
    slot: Option<mpsc::Sender<WorkItem>>,
    thread: Option<thread::JoinHandle<()>>,
}

impl Worker {
    /// Starts the worker thread.
    ///
    /// # Arguments
    /// * `name` - Thread name
    /// * `abort` - Run-wide abort token; distinguishes aborts from timeouts
    /// * `replies` - The engine task's inbox
    pub fn spawn(
        name: &str,
        abort: CancellationToken,
        replies: mpsc::UnboundedSender<EngineMessage>,
    ) -> std::io::Result<Self> {
        let (slot, mut queue) = mpsc::channel::<WorkItem>(1);
        let thread = thread::Builder::new()
            .name(name.to_string())
            .spawn(move || {
                let _notice = DeathNotice {
                    replies: replies.clone(),
                };
                let runtime = tokio::runtime::Builder::new_current_thread()
                    .enable_all()
                    .build();
                while let Some(work) = queue.blocking_recv() {
                    let generation = work.generation;
                    let outcome = match &runtime {
                        Ok(rt) => rt.block_on(perform(work, &abort)),
                        Err(e) => Outcome::failed(format!("worker runtime unavailable: {}", e)),
                    };
                    if replies
                        .send(EngineMessage::Outcome {
                            generation,
                            outcome,
                        })
                        .is_err()
                    {
                        break;
                    }
                }
            })?;
        Ok(Self {
            slot: Some(slot),
            thread: Some(thread),
        })
    }

    /// Hands a work item to the thread, waiting while the slot is occupied.
    pub async fn submit(&self, work: WorkItem) -> Result<(), EngineError> {
        let slot = self.slot.as_ref().ok_or(EngineError::WorkerPanicked)?;
        slot.send(work)
            .await
            .map_err(|_| EngineError::WorkerPanicked)
    }

    /// Closes the queue and waits for the thread to exit.
    pub async fn shutdown(mut self) -> Result<(), EngineError> {
        drop(self.slot.take());
        let Some(thread) = self.thread.take() else {
            return Ok(());
        };
        match tokio::task::spawn_blocking(move || thread.join()).await {
            Ok(Ok(())) => Ok(()),
            _ => Err(EngineError::WorkerPanicked),
        }
    }
}

/// Tells the engine task that the worker thread is unwinding, so a run never
/// waits on a thread that is gone.
struct DeathNotice {
    replies: mpsc::UnboundedSender<EngineMessage>,
}

impl Drop for DeathNotice {
    fn drop(&mut self) {
        if thread::panicking() {
            let _ = self.replies.send(EngineMessage::WorkerStopped);
        }
    }
}

async fn perform(work: WorkItem, abort: &CancellationToken) -> Outcome {
    if work.cancel.is_cancelled() {
        return cancelled(abort);
    }
    let invoked = panic::catch_unwind(AssertUnwindSafe(|| {
        work.item.invoke(work.phase, &work.context)
    }));
    let body = match invoked {
        Ok(future) => AssertUnwindSafe(future).catch_unwind(),
        Err(payload) => return panicked(payload.as_ref()),
    };

    tokio::select! {
        biased;
        _ = work.cancel.cancelled() => cancelled(abort),
        result = body => match result {
            Ok(Ok(())) => Outcome::passed(),
            Ok(Err(TestError::Skipped(reason))) => {
                Outcome::new(TestResult::Skipped, Some(FailureInfo::new(reason)))
            }
            Ok(Err(TestError::Failed(message))) => Outcome::failed(message),
            Err(payload) => panicked(payload.as_ref()),
        },
    }
}

fn panicked(payload: &(dyn Any + Send)) -> Outcome {
    Outcome::failed(format!("panicked: {}", panic_message(payload)))
}

fn cancelled(abort: &CancellationToken) -> Outcome {
    let message = if abort.is_cancelled() {
        "aborted"
    } else {
        "cancelled"
    };
    Outcome::new(TestResult::Aborted, Some(FailureInfo::new(message)))
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
