//! # Command Body Unit Tests / 命令函数单元测试
//!
//! This module tests placeholder substitution, argument splitting and running
//! shell commands as lifecycle operations.
//!
//! 此模块测试占位符替换、参数拆分以及将 Shell 命令作为生命周期操作运行。

mod common;

use common::*;
use matrix_harness::core::config::EngineConfig;
use matrix_harness::core::context::{RunParameters, TestContext};
use matrix_harness::core::definition::{Definition, Param, TestBody};
use matrix_harness::core::error::TestError;
use matrix_harness::core::execution::{ExecutionEngine, Selection};
use matrix_harness::core::models::{Metadata, TestResult};
use matrix_harness::core::snapshot::NodeId;
use matrix_harness::infra::command::{CommandBody, prepare_command};
use std::time::{Duration, Instant};

fn context(params: Vec<Param>) -> TestContext {
    TestContext::detached(Metadata::new(1, "cmd"), params)
}

#[cfg(test)]
mod prepare_tests {
    use super::*;

    #[test]
    fn test_placeholders_are_replaced_by_params() {
        let ctx = context(vec![Param::new("size", 64i64), Param::new("mode", "fast")]);
        let argv = prepare_command("run --size {size} --mode '{mode} lane'", &ctx).unwrap();
        assert_eq!(argv, vec!["run", "--size", "64", "--mode", "fast lane"]);
    }

    #[test]
    fn test_unknown_placeholders_are_left_alone() {
        let ctx = context(vec![]);
        let argv = prepare_command("echo {missing}", &ctx).unwrap();
        assert_eq!(argv, vec!["echo", "{missing}"]);
    }

    #[test]
    fn test_unbalanced_quotes_are_rejected() {
        let ctx = context(vec![]);
        assert!(matches!(
            prepare_command("echo 'oops", &ctx),
            Err(TestError::Failed(_))
        ));
    }

    #[test]
    fn test_empty_command_is_rejected() {
        let ctx = context(vec![]);
        assert!(prepare_command("   ", &ctx).is_err());
    }

    #[test]
    fn test_undefined_environment_variable_is_rejected() {
        let ctx = context(vec![]);
        assert!(prepare_command("echo $MATRIX_HARNESS_SURELY_UNDEFINED_VAR", &ctx).is_err());
    }
}

#[cfg(all(test, unix))]
mod run_tests {
    use super::*;

    #[tokio::test]
    async fn test_successful_command_passes() {
        let body = CommandBody::new().with_execute("true");
        let ctx = context(vec![]);
        assert!(body.execute(&ctx).await.is_ok());
    }

    #[tokio::test]
    async fn test_non_zero_exit_fails() {
        let body = CommandBody::new().with_execute("sh -c 'exit 3'");
        let ctx = context(vec![]);
        match body.execute(&ctx).await {
            Err(TestError::Failed(message)) => assert!(message.contains("exit")),
            other => panic!("expected a failure, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_missing_program_fails() {
        let body = CommandBody::new().with_init("matrix-harness-no-such-program");
        let ctx = context(vec![]);
        assert!(body.init(&ctx).await.is_err());
    }

    #[tokio::test]
    async fn test_missing_operations_succeed() {
        let body = CommandBody::new();
        let ctx = context(vec![]);
        assert!(body.init(&ctx).await.is_ok());
        assert!(body.terminate(&ctx).await.is_ok());
    }

    #[tokio::test]
    async fn test_output_lines_reach_the_log() {
        let body = CommandBody::new().with_execute("sh -c 'echo hello {who}; echo oops 1>&2'");
        let tree = module("Suite").with_child(variation(1, "Greets").with_body(body).with_param("who", "world"));
        let (root, snapshot) = tree_and_snapshot(tree);
        let log = RecordingLogWriter::new();

        let handle = ExecutionEngine::new(EngineConfig::default())
            .run(root, snapshot, Box::new(log.clone()), Selection::All, RunParameters::new())
            .unwrap();
        let report = handle.wait().await.unwrap();

        assert_eq!(report.result(NodeId(1)), Some(TestResult::Passed));
        let entries = log.entries();
        assert!(entries.contains(&"line:Info:hello world".to_string()));
        assert!(entries.contains(&"line:Error:oops".to_string()));
    }

    #[tokio::test]
    async fn test_timeout_kills_the_child_process() {
        let body = CommandBody::new().with_execute("sleep 10");
        let tree = module("Suite").with_child(
            Definition::variation(Metadata::new(1, "Sleeps").with_timeout_ms(100)).with_body(body),
        );
        let (root, snapshot) = tree_and_snapshot(tree);
        let started = Instant::now();

        let handle = ExecutionEngine::new(EngineConfig::default())
            .run(root, snapshot, Box::new(RecordingLogWriter::new()), Selection::All, RunParameters::new())
            .unwrap();
        let report = handle.wait().await.unwrap();

        assert_eq!(report.result(NodeId(1)), Some(TestResult::Timeout));
        assert!(started.elapsed() < Duration::from_secs(5));
    }
}
