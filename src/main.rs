use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tokio::io::{AsyncBufReadExt, BufReader};

use health_navigator::api::{ApiError, BackendApi, HttpBackend};
use health_navigator::config::{self, ClientConfig, ConfigError};
use health_navigator::models::{Report, Sender};
use health_navigator::probe::{AvailabilityProber, ProbePhase, ProbePolicy};
use health_navigator::workflow::{ReportWorkflow, WorkflowError};

#[derive(Parser)]
#[command(name = "health-navigator", version, about = "Understand your lab reports")]
struct Cli {
    /// Backend origin (overrides HEALTH_NAVIGATOR_API_URL)
    #[arg(long, global = true)]
    base_url: Option<String>,

    /// Per-request timeout in milliseconds (overrides HEALTH_NAVIGATOR_TIMEOUT_MS)
    #[arg(long, global = true)]
    timeout_ms: Option<u64>,

    /// Print JSON instead of text
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Wait for the backend to come online (up to 3 attempts)
    Health,
    /// Upload a PDF, print the analysis, and optionally ask questions
    Analyze {
        file: PathBuf,
        /// Follow-up question (repeatable)
        #[arg(long = "ask")]
        questions: Vec<String>,
        /// Do not wait for the backend to report healthy first
        #[arg(long)]
        skip_probe: bool,
    },
    /// Upload and analyze a PDF, then answer questions read from stdin
    Chat {
        file: PathBuf,
        #[arg(long)]
        skip_probe: bool,
    },
    /// Show the stored status of one report
    Report { report_id: String },
    /// List reports known to the backend
    Reports,
    /// Delete a report and its data from the backend
    Delete { report_id: String },
}

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Api(#[from] ApiError),
    #[error(transparent)]
    Workflow(#[from] WorkflowError),
    #[error("Backend did not come online: {0}")]
    Unavailable(String),
    #[error("Cannot read stdin: {0}")]
    Io(#[from] std::io::Error),
    #[error("Cannot encode output: {0}")]
    Json(#[from] serde_json::Error),
}

#[tokio::main]
async fn main() -> ExitCode {
    health_navigator::init_tracing();
    let cli = Cli::parse();
    tracing::debug!("{} v{}", config::APP_NAME, config::APP_VERSION);

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn load_config(cli: &Cli) -> Result<ClientConfig, ConfigError> {
    let mut config = ClientConfig::from_env()?;
    if let Some(url) = &cli.base_url {
        config = config.with_base_url(url)?;
    }
    if let Some(ms) = cli.timeout_ms {
        config = config.with_timeout(Duration::from_millis(ms))?;
    }
    Ok(config)
}

async fn run(cli: Cli) -> Result<(), CliError> {
    let config = load_config(&cli)?;
    tracing::info!(base_url = config.base_url(), "Using backend");
    let probe_policy = ProbePolicy::from_config(&config);
    let backend: Arc<dyn BackendApi> = Arc::new(HttpBackend::new(config)?);

    match cli.command {
        Command::Health => wait_online(&backend, &probe_policy).await,
        Command::Analyze {
            ref file,
            ref questions,
            skip_probe,
        } => {
            if !skip_probe {
                wait_online(&backend, &probe_policy).await?;
            }
            let workflow = ReportWorkflow::new(backend.clone());
            let report = analyze(&workflow, file).await?;
            print_report(&report, cli.json)?;
            for question in questions {
                ask(&workflow, question, cli.json).await?;
            }
            Ok(())
        }
        Command::Chat {
            ref file,
            skip_probe,
        } => {
            if !skip_probe {
                wait_online(&backend, &probe_policy).await?;
            }
            let workflow = ReportWorkflow::new(backend.clone());
            let report = analyze(&workflow, file).await?;
            print_report(&report, cli.json)?;
            eprintln!("Ask a question about your report (empty line to skip, Ctrl-D to quit):");
            let mut lines = BufReader::new(tokio::io::stdin()).lines();
            while let Some(line) = lines.next_line().await? {
                ask(&workflow, &line, cli.json).await?;
            }
            Ok(())
        }
        Command::Report { ref report_id } => {
            let info = backend.get_report(report_id).await?;
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&info)?);
            } else {
                println!("{}  {}", info.report_id, info.status);
                if let Some(name) = &info.filename {
                    println!("  file: {name}");
                }
                if let Some(message) = &info.message {
                    println!("  {message}");
                }
                if let Some(summary) = info.analysis.as_ref().and_then(|a| a.summary.as_ref()) {
                    println!("  {summary}");
                }
            }
            Ok(())
        }
        Command::Reports => {
            let listing = backend.list_reports().await?;
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&listing)?);
            } else {
                println!("{} report(s)", listing.total);
                for r in &listing.reports {
                    println!(
                        "  {}  {:<9}  {}",
                        r.report_id,
                        r.status,
                        r.filename.as_deref().unwrap_or("-")
                    );
                }
            }
            Ok(())
        }
        Command::Delete { ref report_id } => {
            let deleted = backend.delete_report(report_id).await?;
            println!(
                "{}",
                deleted
                    .message
                    .unwrap_or_else(|| format!("Deleted {}", deleted.report_id))
            );
            Ok(())
        }
    }
}

/// Run the availability probe, echoing each status change to stderr.
async fn wait_online(backend: &Arc<dyn BackendApi>, policy: &ProbePolicy) -> Result<(), CliError> {
    let mut handle = AvailabilityProber::new(backend.clone())
        .with_policy(policy.clone())
        .spawn();
    let mut updates = handle.subscribe();

    let printer = tokio::spawn(async move {
        let mut last = updates.borrow_and_update().message.clone();
        eprintln!("{last}");
        while updates.changed().await.is_ok() {
            let state = updates.borrow_and_update().clone();
            if state.phase != ProbePhase::Hidden && state.message != last {
                eprintln!("[{:>3}s] {}", state.elapsed_secs, state.message);
                last = state.message;
            }
        }
    });

    let settled = handle.wait_settled().await;
    handle.cancel();
    printer.abort();

    match settled.phase {
        ProbePhase::Online | ProbePhase::Hidden => Ok(()),
        _ => Err(CliError::Unavailable(settled.message)),
    }
}

async fn analyze(workflow: &ReportWorkflow, file: &std::path::Path) -> Result<Report, CliError> {
    workflow.select_path(file).await?;
    eprintln!("Analyzing {} ...", file.display());
    Ok(workflow.run_pipeline().await?)
}

async fn ask(workflow: &ReportWorkflow, question: &str, json: bool) -> Result<(), CliError> {
    if let Some(reply) = workflow.ask(question).await {
        if json {
            println!("{}", serde_json::to_string(&reply)?);
        } else if reply.sender == Sender::Ai {
            println!("> {}\n{}\n", question.trim(), reply.text);
        }
    }
    Ok(())
}

fn print_report(report: &Report, json: bool) -> Result<(), CliError> {
    if json {
        println!("{}", serde_json::to_string_pretty(report)?);
        return Ok(());
    }

    println!("{} for {} ({})", report.report_type, report.patient_name, report.date);
    println!("Report ID: {}", report.report_id);
    println!("Urgency:   {}\n", report.urgency);

    if !report.key_findings.is_empty() {
        println!("Key findings:");
        for f in &report.key_findings {
            let value = match &f.unit {
                Some(unit) => format!("{} {unit}", f.value),
                None => f.value.clone(),
            };
            println!("  {:<24} {:<14} {:<9} (range {})", f.metric, value, f.status, f.range);
        }
        println!();
    }

    println!("Summary:\n  {}\n", report.summary);

    if !report.next_steps.is_empty() {
        println!("Next steps:");
        for (i, step) in report.next_steps.iter().enumerate() {
            println!("  {}. {step}", i + 1);
        }
        println!();
    }
    Ok(())
}
