//! Non-interactive task execution

use anyhow::Context;
use clap::Args;
use serde_json::{json, Value};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;
use warden_foundation::{InMemoryMetricRegistry, MetricRegistry, NoopMetricRegistry, WorkerConfig};
use warden_task::{
    builtin, LoggingOutcomeReporter, RunContext, TaskDefinition, TaskRun, TerminalState,
    WorkerTaskUnit,
};

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Task definition file (JSON)
    #[arg(required_unless_present = "task_type")]
    definition: Option<PathBuf>,

    /// Task type, when no definition file is given (echo, sleep, fail, shell)
    #[arg(long = "type", conflicts_with = "definition")]
    task_type: Option<String>,

    /// Task id (overrides the definition)
    #[arg(long)]
    id: Option<String>,

    /// Deadline in milliseconds (overrides the definition)
    #[arg(long)]
    timeout_ms: Option<u64>,

    /// Task property as key=value; the value is parsed as JSON when possible
    #[arg(long = "prop", value_parser = parse_property)]
    props: Vec<(String, Value)>,

    /// Attempt number reported in logs and metrics
    #[arg(long, default_value = "1")]
    attempt: u32,

    /// Upper bound on the cooperative stop, in milliseconds
    #[arg(long)]
    stop_timeout_ms: Option<u64>,
}

impl RunArgs {
    /// Definition file (if any) with command-line overrides applied
    fn definition(&self) -> anyhow::Result<TaskDefinition> {
        let mut def = match (&self.definition, &self.task_type) {
            (Some(path), _) => TaskDefinition::load(path)
                .with_context(|| format!("failed to load {}", path.display()))?,
            (None, Some(task_type)) => TaskDefinition::new("cli", task_type.clone()),
            (None, None) => anyhow::bail!("either a definition file or --type is required"),
        };

        if let Some(id) = &self.id {
            def.id = id.clone();
        }
        if let Some(timeout_ms) = self.timeout_ms {
            def.timeout_ms = Some(timeout_ms);
        }
        for (key, value) in &self.props {
            def.properties.insert(key.clone(), value.clone());
        }

        Ok(def)
    }
}

fn parse_property(raw: &str) -> Result<(String, Value), String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected key=value, got '{}'", raw))?;
    if key.is_empty() {
        return Err(format!("empty property name in '{}'", raw));
    }

    let value = serde_json::from_str(value).unwrap_or_else(|_| Value::String(value.to_string()));
    Ok((key.to_string(), value))
}

/// Run one attempt; returns whether it ended in SUCCESS
pub async fn run_once(args: RunArgs, config: &WorkerConfig) -> anyhow::Result<bool> {
    let definition = args.definition()?;
    let task = builtin::from_definition(&definition, config)?;

    let metrics = Arc::new(match &config.metrics.prefix {
        Some(prefix) => InMemoryMetricRegistry::with_prefix(prefix.clone()),
        None => InMemoryMetricRegistry::new(),
    });
    let registry: Arc<dyn MetricRegistry> = if config.metrics.enabled {
        metrics.clone()
    } else {
        Arc::new(NoopMetricRegistry)
    };

    let task_run = TaskRun::new(&definition.id, &definition.task_type).with_attempt(args.attempt);
    let mut unit = WorkerTaskUnit::new(task, RunContext::new(task_run.clone()), registry);
    if let Some(ms) = args.stop_timeout_ms {
        unit = unit.with_stop_timeout(Duration::from_millis(ms));
    }

    let kill_switch = unit.kill_switch();
    let execution = unit.execute_and_report(&LoggingOutcomeReporter);
    tokio::pin!(execution);

    let outcome = tokio::select! {
        outcome = &mut execution => outcome?,
        _ = tokio::signal::ctrl_c() => {
            warn!(task_id = %task_run.task_id, "Interrupted, killing task");
            kill_switch.kill(TerminalState::Killed).await;
            execution.await?
        }
    };

    let report = json!({
        "taskRun": task_run,
        "outcome": outcome.to_json(),
        "metrics": metrics.snapshot(),
    });
    println!("{}", serde_json::to_string_pretty(&report)?);

    Ok(outcome.is_success())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Parser)]
    struct TestCli {
        #[command(flatten)]
        run: RunArgs,
    }

    #[test]
    fn test_parse_property() {
        assert_eq!(
            parse_property("durationMs=500").unwrap(),
            ("durationMs".to_string(), json!(500))
        );
        assert_eq!(
            parse_property("command=echo a=b").unwrap(),
            ("command".to_string(), json!("echo a=b"))
        );
        assert!(parse_property("novalue").is_err());
        assert!(parse_property("=1").is_err());
    }

    #[test]
    fn test_definition_from_flags() {
        let cli = TestCli::parse_from([
            "warden",
            "--type",
            "sleep",
            "--timeout-ms",
            "200",
            "--prop",
            "durationMs=1000",
        ]);

        let def = cli.run.definition().unwrap();
        assert_eq!(def.id, "cli");
        assert_eq!(def.task_type, "sleep");
        assert_eq!(def.timeout_ms, Some(200));
        assert_eq!(def.properties["durationMs"], 1000);
    }

    #[test]
    fn test_definition_file_with_overrides() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("task.json");
        std::fs::write(
            &path,
            r#"{ "id": "nightly", "type": "echo", "timeoutMs": 1000, "properties": { "message": "a" } }"#,
        )
        .unwrap();

        let cli = TestCli::parse_from([
            "warden",
            path.to_str().unwrap(),
            "--id",
            "manual",
            "--prop",
            "message=b",
        ]);
        let def = cli.run.definition().unwrap();

        assert_eq!(def.id, "manual");
        assert_eq!(def.timeout_ms, Some(1000));
        assert_eq!(def.properties["message"], "b");
    }

    #[tokio::test]
    async fn test_run_once_echo() {
        let cli = TestCli::parse_from(["warden", "--type", "echo", "--prop", "message=hi"]);
        assert!(run_once(cli.run, &WorkerConfig::default()).await.unwrap());
    }

    #[tokio::test]
    async fn test_run_once_fail() {
        let cli = TestCli::parse_from(["warden", "--type", "fail"]);
        assert!(!run_once(cli.run, &WorkerConfig::default()).await.unwrap());
    }
}
