//! Operator CLI: either talks to a running `videoforge-server` over HTTP
//! (`--api <url>`) or drives a local, in-process `ServiceContext` directly
//! (`--local`) against a configs directory on disk.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use serde_json::json;
use videoforge::prelude::*;
use videoforge::{AspectRatio, OutputFormat, Resolution};

fn parse_aspect_ratio(s: &str) -> Result<AspectRatio, String> {
    serde_json::from_value(json!(s)).map_err(|_| format!("invalid aspect ratio: {s}"))
}

fn parse_resolution(s: &str) -> Result<Resolution, String> {
    serde_json::from_value(json!(s)).map_err(|_| format!("invalid resolution: {s}"))
}

fn parse_output_format(s: &str) -> Result<OutputFormat, String> {
    serde_json::from_value(json!(s)).map_err(|_| format!("invalid output format: {s}"))
}

#[derive(Parser, Debug)]
#[command(name = "videoforge", about = "Submit and inspect video generation jobs")]
struct Cli {
    #[arg(long, global = true, default_value = "configs")]
    configs_dir: PathBuf,
    #[arg(long, global = true, default_value = "data/artifacts")]
    artifacts_dir: PathBuf,
    #[arg(long, global = true, default_value = "data/events")]
    events_dir: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Submit a job.
    Submit {
        #[arg(long)]
        prompt: String,
        #[arg(long)]
        duration: u32,
        #[arg(long, value_parser = parse_aspect_ratio)]
        ratio: AspectRatio,
        #[arg(long, value_parser = parse_resolution)]
        res: Resolution,
        #[arg(long)]
        fps: u32,
        #[arg(long, value_parser = parse_output_format, default_value = "mp4")]
        format: OutputFormat,
        #[arg(long, default_value_t = 0)]
        priority: i32,
        #[arg(long)]
        template: Option<String>,
        /// Base URL of a running videoforge-server.
        #[arg(long)]
        api: Option<String>,
        /// Run the job in-process instead of calling a server.
        #[arg(long)]
        local: bool,
    },
    /// Print the current status of a job.
    Status {
        job_id: String,
        #[arg(long)]
        api: Option<String>,
        #[arg(long)]
        local: bool,
    },
    /// Copy a job's rendered output to a local path.
    Fetch {
        job_id: String,
        #[arg(long)]
        out: PathBuf,
        #[arg(long)]
        api: Option<String>,
        #[arg(long)]
        local: bool,
    },
    Configs {
        #[command(subcommand)]
        action: ConfigsAction,
    },
    Providers {
        #[command(subcommand)]
        action: ProvidersAction,
    },
}

#[derive(Subcommand, Debug)]
enum ConfigsAction {
    /// Load and validate the four config documents without starting anything.
    Validate,
}

#[derive(Subcommand, Debug)]
enum ProvidersAction {
    /// Print each provider's current health/circuit status.
    Health {
        #[arg(long)]
        api: Option<String>,
    },
}

fn api_url(api: &Option<String>) -> String {
    api.clone().unwrap_or_else(|| "http://127.0.0.1:8000".to_string())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().with_env_filter(tracing_subscriber::EnvFilter::from_default_env()).init();
    let cli = Cli::parse();

    match &cli.command {
        Command::Configs { action: ConfigsAction::Validate } => {
            let loader = ConfigLoader::new(cli.configs_dir.clone());
            loader.load()?;
            println!("configs_ok");
            Ok(())
        }

        Command::Submit { prompt, duration, ratio, res, fps, format, priority, template, api, local } => {
            let mut metadata = serde_json::Map::new();
            if let Some(template) = template {
                metadata.insert("template".to_string(), json!(template));
            }
            let job = JobRequest {
                prompt: prompt.clone(),
                negative_prompt: None,
                duration_s: *duration,
                aspect_ratio: *ratio,
                resolution: *res,
                fps: *fps,
                seed: None,
                style: None,
                input_image_url: None,
                output_format: *format,
                priority: *priority,
                metadata,
            };
            if *local {
                let context = local_context(&cli).await?;
                let job_id = context.run_job_now(job).await;
                println!("{job_id}");
            } else {
                let client = reqwest::Client::new();
                let response: serde_json::Value = client
                    .post(format!("{}/jobs", api_url(api)))
                    .json(&job)
                    .send()
                    .await?
                    .error_for_status()?
                    .json()
                    .await?;
                println!("{}", response["job_id"].as_str().unwrap_or_default());
            }
            Ok(())
        }

        Command::Status { job_id, api, local } => {
            if *local {
                let context = local_context(&cli).await?;
                match context.get_job(job_id) {
                    Some(record) => println!("{}", serde_json::to_string(&record)?),
                    None => anyhow::bail!("job {job_id} not found"),
                }
            } else {
                let client = reqwest::Client::new();
                let response: serde_json::Value = client
                    .get(format!("{}/jobs/{job_id}", api_url(api)))
                    .send()
                    .await?
                    .error_for_status()?
                    .json()
                    .await?;
                println!("{}", serde_json::to_string(&response)?);
            }
            Ok(())
        }

        Command::Fetch { job_id, out, api, local } => {
            if *local {
                let context = local_context(&cli).await?;
                let record = context.get_job(job_id).ok_or_else(|| anyhow::anyhow!("job {job_id} not found"))?;
                let path = record
                    .artifacts
                    .get("output")
                    .ok_or_else(|| anyhow::anyhow!("job {job_id} has no output artifact"))?;
                std::fs::copy(path, out)?;
            } else {
                let client = reqwest::Client::new();
                let bytes = client
                    .get(format!("{}/jobs/{job_id}/artifact/output", api_url(api)))
                    .send()
                    .await?
                    .error_for_status()?
                    .bytes()
                    .await?;
                std::fs::write(out, bytes)?;
            }
            Ok(())
        }

        Command::Providers { action: ProvidersAction::Health { api } } => {
            let client = reqwest::Client::new();
            let response: serde_json::Value = client
                .get(format!("{}/health/providers", api_url(api)))
                .send()
                .await?
                .error_for_status()?
                .json()
                .await?;
            println!("{}", serde_json::to_string(&response)?);
            Ok(())
        }
    }
}

async fn local_context(cli: &Cli) -> anyhow::Result<std::sync::Arc<ServiceContext>> {
    ServiceContext::start(cli.configs_dir.clone(), cli.artifacts_dir.clone(), cli.events_dir.clone())
        .await
        .map_err(|e| anyhow::anyhow!(e.to_string()))
}
