//! # Command Body Module / 命令函数模块
//!
//! A [`TestBody`] whose lifecycle operations are shell commands. Before a
//! command runs, `{name}` placeholders are replaced with the item's parameters
//! (then with run parameters), environment variables and `~` are expanded, and
//! the line is split into arguments with shell quoting rules.
//!
//! 生命周期操作为 Shell 命令的 [`TestBody`]。命令运行前，`{name}` 占位符会先被替换为测试项参数
//! （其次为运行参数），然后展开环境变量和 `~`，最后按照 Shell 引号规则拆分为参数。

use futures::FutureExt;
use futures::future::{self, BoxFuture};
use std::path::PathBuf;
use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;

use crate::core::context::TestContext;
use crate::core::definition::{BodyFuture, TestBody};
use crate::core::error::TestError;
use crate::core::models::LogLevel;

/// Runs shell commands as lifecycle operations.
///
/// The child process is killed when the lifecycle call is cancelled, which
/// happens on timeout and abort.
#[derive(Debug, Clone, Default)]
pub struct CommandBody {
    pub init: Option<String>,
    pub execute: Option<String>,
    pub terminate: Option<String>,
    pub working_dir: Option<PathBuf>,
}

impl CommandBody {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_init(mut self, command: impl Into<String>) -> Self {
        self.init = Some(command.into());
        self
    }

    pub fn with_execute(mut self, command: impl Into<String>) -> Self {
        self.execute = Some(command.into());
        self
    }

    pub fn with_terminate(mut self, command: impl Into<String>) -> Self {
        self.terminate = Some(command.into());
        self
    }

    pub fn with_working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    fn call<'a>(&'a self, line: &'a Option<String>, ctx: &'a TestContext) -> BodyFuture<'a> {
        match line {
            Some(line) => run_command(line, self.working_dir.as_ref(), ctx).boxed(),
            None => future::ready(Ok(())).boxed(),
        }
    }
}

impl TestBody for CommandBody {
    fn init<'a>(&'a self, ctx: &'a TestContext) -> BodyFuture<'a> {
        self.call(&self.init, ctx)
    }

    fn execute<'a>(&'a self, ctx: &'a TestContext) -> BodyFuture<'a> {
        self.call(&self.execute, ctx)
    }

    fn terminate<'a>(&'a self, ctx: &'a TestContext) -> BodyFuture<'a> {
        self.call(&self.terminate, ctx)
    }
}

/// Replaces `{name}` placeholders, expands the environment and splits the line.
///
/// # Errors
/// Fails when an environment variable is undefined, when quoting is unbalanced
/// or when the line is empty.
pub fn prepare_command(line: &str, ctx: &TestContext) -> Result<Vec<String>, TestError> {
    let mut text = line.to_string();
    for param in ctx.params() {
        text = text.replace(&format!("{{{}}}", param.name), &param.value.to_string());
    }
    for (key, value) in ctx.parameters() {
        text = text.replace(&format!("{{{}}}", key), value);
    }

    let expanded = shellexpand::full(&text)
        .map_err(|e| TestError::failed(format!("cannot expand `{}`: {}", line, e)))?;
    let argv = shlex::split(&expanded)
        .ok_or_else(|| TestError::failed(format!("unbalanced quoting in `{}`", line)))?;
    if argv.is_empty() {
        return Err(TestError::failed("empty command"));
    }
    Ok(argv)
}

async fn run_command(
    line: &str,
    working_dir: Option<&PathBuf>,
    ctx: &TestContext,
) -> Result<(), TestError> {
    let argv = prepare_command(line, ctx)?;
    let (program, args) = argv
        .split_first()
        .ok_or_else(|| TestError::failed("empty command"))?;

    let mut cmd = Command::new(program);
    cmd.args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    if let Some(dir) = working_dir {
        cmd.current_dir(dir);
    }

    let mut child = cmd
        .spawn()
        .map_err(|e| TestError::failed(format!("failed to spawn `{}`: {}", program, e)))?;
    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| TestError::failed("failed to capture stdout"))?;
    let stderr = child
        .stderr
        .take()
        .ok_or_else(|| TestError::failed("failed to capture stderr"))?;

    // Both streams are drained while the process runs so neither pipe fills up.
    let (status, _, _) = tokio::join!(
        child.wait(),
        forward_lines(stdout, LogLevel::Info, ctx),
        forward_lines(stderr, LogLevel::Error, ctx),
    );
    let status = status?;

    if status.success() {
        Ok(())
    } else {
        Err(TestError::failed(format!("`{}` exited with {}", line, status)))
    }
}

fn forward_lines<'a, R>(stream: R, level: LogLevel, ctx: &'a TestContext) -> BoxFuture<'a, ()>
where
    R: AsyncRead + Unpin + Send + 'a,
{
    async move {
        let mut lines = BufReader::new(stream).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            ctx.log(level, line);
        }
    }
    .boxed()
}
