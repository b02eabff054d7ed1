//! ResQ - 事件调度智能体流水线
//!
//! 入口：初始化日志、加载配置、组装流水线，按子命令处理单个事件、操作员决策或列出可用单位。

use std::io::Read;
use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use resq::core::{create_pipeline_builder, AgentError, Content};
use serde_json::{json, Value};

#[derive(Parser)]
#[command(name = "resq")]
#[command(about = "Incident dispatch agent pipeline with offline fallback planning")]
#[command(version)]
struct Cli {
    /// 额外的配置文件（覆盖 config/default.toml）
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the configured pipeline for one incident (JSON file, or "-" for stdin)
    Incident {
        input: String,
        /// Reuse a session id
        #[arg(long)]
        session: Option<String>,
    },
    /// Record an operator decision (SEND / HOLD); defaults to the latest incident
    Decide {
        action: String,
        incident_id: Option<String>,
        #[arg(long)]
        session: Option<String>,
    },
    /// List available units, best ETA first
    Units {
        #[arg(long = "type")]
        unit_type: Option<String>,
        #[arg(long)]
        location: Option<String>,
    },
}

fn read_incident(input: &str) -> anyhow::Result<Content> {
    let raw = if input == "-" {
        let mut buf = String::new();
        std::io::stdin()
            .read_to_string(&mut buf)
            .context("Failed to read incident from stdin")?;
        buf
    } else {
        std::fs::read_to_string(input).with_context(|| format!("Failed to read {}", input))?
    };
    let value: Value = serde_json::from_str(&raw).context("Incident is not valid JSON")?;
    match value {
        Value::Object(map) => Ok(map),
        other => Err(AgentError::InvalidIncident(format!("expected a JSON object, got {}", other)).into()),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 日志：默认 info，可通过 RUST_LOG 覆盖
    resq::observability::init();

    let cli = Cli::parse();
    let pipeline = create_pipeline_builder(cli.config)
        .build()
        .context("Failed to assemble pipeline")?;

    let output = match cli.command {
        Commands::Incident { input, session } => {
            let incident = read_incident(&input)?;
            let (envelope, session) = pipeline.submit_incident(incident, session.as_deref()).await;

            let (prompt, completion, total) = pipeline.invoker.client().token_usage();
            tracing::info!(
                session = %session.session_id,
                turns = session.len(),
                prompt_tokens = prompt,
                completion_tokens = completion,
                total_tokens = total,
                "incident processed"
            );
            envelope.to_value()
        }
        Commands::Decide {
            action,
            incident_id,
            session,
        } => {
            let envelope = pipeline
                .decide(&action, incident_id.as_deref(), session.as_deref())
                .await;
            json!({
                "envelope": envelope.to_value(),
                "history": pipeline.decision.history(),
                "metrics": pipeline.incidents.metrics().await,
            })
        }
        Commands::Units { unit_type, location } => {
            let units = pipeline
                .planner
                .available_units(unit_type.as_deref(), location.as_deref(), None);
            json!(units)
        }
    };

    println!(
        "{}",
        serde_json::to_string_pretty(&output).context("Failed to render output")?
    );
    Ok(())
}
