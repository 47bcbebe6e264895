//! CLI command definitions, routing, and tracing setup.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use api::{JobId, JobOutput, JobStatus, PipelineConfig, PipelineService, ResultFormat, UserId, init_pipeline};
use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, WrapErr, eyre};
use sources::{GitHubClient, Validator, ValidatorOptions};
use tracing::{info, warn};

const POLL_INTERVAL: Duration = Duration::from_millis(200);

/// Fetch repositories through the processing pipeline and print the result.
#[derive(Parser)]
#[command(name = "repo-pipeline", version, long_about = None)]
pub(crate) struct Cli {
    /// Path to a TOML config file.
    #[arg(short, long, env = "REPO_PIPELINE_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Output shape for processed repositories.
#[derive(Clone, Copy, Debug, clap::ValueEnum)]
pub(crate) enum OutputFormat {
    Json,
    Llm,
}

impl From<OutputFormat> for ResultFormat {
    fn from(format: OutputFormat) -> Self {
        match format {
            OutputFormat::Json => ResultFormat::Json,
            OutputFormat::Llm => ResultFormat::Llm,
        }
    }
}

#[derive(Subcommand)]
pub(crate) enum Command {
    /// Process one or more repositories and print their documents.
    Process {
        /// Repository URLs, e.g. https://github.com/owner/repo.
        #[arg(required = true)]
        urls: Vec<String>,

        /// Output format.
        #[arg(short, long, value_enum, default_value = "llm")]
        format: OutputFormat,

        /// User id recorded as the submitter.
        #[arg(long, default_value = "cli")]
        user: String,
    },

    /// Check a repository URL against the hosting provider only.
    Validate {
        url: String,
    },

    /// Print the effective configuration.
    Config,
}

pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    // Logs go to stderr so stdout carries only documents.
    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .with_writer(std::io::stderr)
                .init();
        }
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
}

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    let config = PipelineConfig::load(cli.config.as_deref()).wrap_err("loading configuration")?;

    match cli.command {
        Command::Process { urls, format, user } => {
            cmd_process(&config, &urls, format.into(), UserId::new(user)).await
        }
        Command::Validate { url } => cmd_validate(&config, &url).await,
        Command::Config => cmd_config(&config),
    }
}

async fn cmd_process(
    config: &PipelineConfig,
    urls: &[String],
    format: ResultFormat,
    user: UserId,
) -> Result<()> {
    let service = init_pipeline(config).await?;

    let mut job_ids = Vec::with_capacity(urls.len());
    for url in urls {
        let job_id = service.submit(user.clone(), url).await?;
        info!("Submitted {} as job {}", url, job_id);
        job_ids.push(job_id);
    }

    let mut failures = 0;
    for job_id in job_ids {
        let status = follow(&service, job_id, &user).await?;
        match status {
            JobStatus::Completed { .. } => match service.get_result(job_id, &user, format).await? {
                JobOutput::Json(result) => println!("{}", serde_json::to_string_pretty(&result)?),
                JobOutput::Llm(text) => println!("{}", text),
            },
            JobStatus::Failed { error, .. } => {
                failures += 1;
                let hint = if error.is_transient() {
                    " (transient, retry later)"
                } else {
                    ""
                };
                eprintln!("job {} failed [{}]: {}{}", job_id, error.kind, error.message, hint);
            }
            other => return Err(eyre!("job {} stopped in state {}", job_id, other.as_str())),
        }
    }

    service.shutdown();
    if failures > 0 {
        return Err(eyre!("{} of {} jobs failed", failures, urls.len()));
    }
    Ok(())
}

/// Poll a job until it is terminal, logging each new milestone.
async fn follow(service: &PipelineService, job_id: JobId, user: &UserId) -> Result<JobStatus> {
    let mut last_progress = None;
    loop {
        let job = service
            .get_status(job_id, user)
            .await?
            .ok_or_else(|| eyre!("job {} disappeared", job_id))?;

        if job.status.is_terminal() {
            return Ok(job.status);
        }
        if last_progress != Some(job.progress) {
            match service.get_queue_status(job_id, user).await? {
                Some(position) if position.is_waiting() => {
                    info!("Job {} waiting at {}", job_id, position);
                }
                _ => info!("Job {} {} ({}%)", job_id, job.stage.as_str(), job.progress),
            }
            last_progress = Some(job.progress);
        }
        tokio::time::sleep(POLL_INTERVAL).await;
    }
}

async fn cmd_validate(config: &PipelineConfig, url: &str) -> Result<()> {
    let token = config.hosting.token();
    let client = GitHubClient::new(
        &config.hosting.api_base_url,
        token.as_deref(),
        config.hosting.timeout(),
    )?;
    let validator = Validator::new(
        Arc::new(client),
        ValidatorOptions {
            web_host: config.hosting.web_host.clone(),
            timeout: config.hosting.timeout(),
        },
    );

    match validator.validate(url).await {
        Ok(reference) => {
            println!("{}", serde_json::to_string_pretty(&reference)?);
            Ok(())
        }
        Err(e) => {
            warn!("Validation failed: {}", e);
            Err(eyre!("{} [{}]", e, e.kind()))
        }
    }
}

fn cmd_config(config: &PipelineConfig) -> Result<()> {
    print!("{}", toml::to_string_pretty(config)?);
    Ok(())
}
