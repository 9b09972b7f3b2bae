mod platform;

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use chrono::Local;
use clap::{Args, Parser, Subcommand};
use consolidator_client::{
    ApiClient, ErrorDetails, ErrorReportBuilder, ErrorReporter, ReqwestApiClient,
};
use consolidator_core::ConsolidationOptions;
use consolidator_logging::con_error;

use platform::app::{run_session, RunOutcome, RunRequest};
use platform::config::{AppConfig, ConfigOverrides};
use platform::logging::{self, LogDestination};

#[derive(Parser, Debug)]
#[command(name = "consolidator", version, about = "Excel Consolidator client")]
struct Cli {
    /// Config file; defaults to ./consolidator.ron when present.
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Consolidation backend base URL.
    #[arg(long, global = true)]
    server_url: Option<String>,
    /// Where downloaded workbooks are written.
    #[arg(long, global = true)]
    output_dir: Option<PathBuf>,
    #[arg(long, global = true, value_enum)]
    log: Option<LogDestination>,
    #[arg(short, long, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Upload a template and sources, follow the job, download the result.
    Run(RunArgs),
    /// Ask the backend whether it is up.
    Health,
    /// Send an error report to the diagnostics webhook.
    Report(ReportArgs),
    /// Run a local error-report webhook backed by a RON file.
    ServeWebhook(ServeArgs),
}

#[derive(Args, Debug)]
struct RunArgs {
    #[arg(long)]
    template: PathBuf,
    /// Source workbooks, in the order they should be consolidated.
    #[arg(long = "source", required = true, num_args = 1..)]
    sources: Vec<PathBuf>,
    /// Leave text cells as text instead of converting to numbers.
    #[arg(long)]
    keep_text: bool,
    /// Leave percentage strings unconverted.
    #[arg(long)]
    keep_percentages: bool,
    /// Ask the backend to back up the template first.
    #[arg(long)]
    backup: bool,
    /// Run the backend's validation pass.
    #[arg(long)]
    validate: bool,
    /// Stop after completion without downloading.
    #[arg(long)]
    no_download: bool,
    #[arg(long)]
    poll_interval_ms: Option<u64>,
    #[arg(long)]
    max_polls: Option<u32>,
}

impl RunArgs {
    fn options(&self) -> ConsolidationOptions {
        ConsolidationOptions {
            convert_text_to_numbers: !self.keep_text,
            convert_percentages: !self.keep_percentages,
            create_backup: self.backup,
            skip_validation: !self.validate,
        }
    }
}

#[derive(Args, Debug)]
struct ReportArgs {
    #[arg(long)]
    error_type: String,
    #[arg(long)]
    message: String,
    /// Action that triggered the error, e.g. "Template Loading".
    #[arg(long)]
    triggered_by: String,
    /// User file involved, for name and size columns.
    #[arg(long)]
    file: Option<PathBuf>,
    #[arg(long, default_value = "")]
    stack_trace: String,
    #[arg(long)]
    webhook_url: Option<String>,
    #[arg(long)]
    spreadsheet_id: Option<String>,
}

#[derive(Args, Debug)]
struct ServeArgs {
    #[arg(long, default_value = "127.0.0.1:8787")]
    bind: SocketAddr,
    /// Store file; defaults to error_reports.ron in the output directory.
    #[arg(long)]
    store: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = AppConfig::load(cli.config.as_deref(), &overrides(&cli))?;
    logging::initialize(config.log_destination, cli.verbose);
    config.log_summary();

    let result = match cli.command {
        Command::Run(args) => run(&config, args).await,
        Command::Health => health(&config).await,
        Command::Report(args) => report(&config, args).await,
        Command::ServeWebhook(args) => {
            let store = args
                .store
                .unwrap_or_else(|| config.output_dir.join("error_reports.ron"));
            platform::webhook::serve(args.bind, store).await
        }
    };
    if let Err(err) = &result {
        con_error!("{:#}", err);
    }
    result
}

fn overrides(cli: &Cli) -> ConfigOverrides {
    let mut overrides = ConfigOverrides {
        server_url: cli.server_url.clone(),
        output_dir: cli.output_dir.clone(),
        log_destination: cli.log,
        ..ConfigOverrides::default()
    };
    match &cli.command {
        Command::Run(args) => {
            overrides.poll_interval_ms = args.poll_interval_ms;
            overrides.max_polls = args.max_polls;
        }
        Command::Report(args) => {
            overrides.webhook_url = args.webhook_url.clone();
            overrides.spreadsheet_id = args.spreadsheet_id.clone();
        }
        Command::Health | Command::ServeWebhook(_) => {}
    }
    overrides
}

fn api_client(config: &AppConfig) -> Result<Arc<dyn ApiClient>> {
    let client = ReqwestApiClient::new(config.api_settings()?)?;
    Ok(Arc::new(client))
}

async fn run(config: &AppConfig, args: RunArgs) -> Result<()> {
    let request = RunRequest {
        options: args.options(),
        download: !args.no_download,
        template: args.template,
        sources: args.sources,
    };
    let interrupt = async {
        let _ = tokio::signal::ctrl_c().await;
    };

    let mut stdout = std::io::stdout();
    let outcome = run_session(
        api_client(config)?,
        config.poll_settings(),
        config.output_dir.clone(),
        request,
        &mut stdout,
        interrupt,
    )
    .await?;

    match outcome {
        RunOutcome::Completed { saved_to: Some(path) } => {
            println!("Result saved to {}", path.display());
            Ok(())
        }
        RunOutcome::Completed { saved_to: None } => Ok(()),
        RunOutcome::Failed(message) => bail!(message),
        RunOutcome::Cancelled => bail!("cancelled"),
    }
}

async fn health(config: &AppConfig) -> Result<()> {
    let report = api_client(config)?
        .health()
        .await
        .with_context(|| format!("backend at {} is unreachable", config.server_url))?;
    println!(
        "{}: {} ({} active job(s))",
        config.server_url, report.status, report.active_jobs
    );
    Ok(())
}

async fn report(config: &AppConfig, args: ReportArgs) -> Result<()> {
    let reporter = ErrorReporter::new(config.reporter_settings()?)?;
    let builder = ErrorReportBuilder::new(env!("CARGO_PKG_VERSION"));
    let report = builder.build(
        ErrorDetails {
            error_type: args.error_type,
            message: args.message,
            triggered_by: args.triggered_by,
            stack_trace: args.stack_trace,
        },
        args.file.as_deref(),
        Local::now(),
    );
    let reply = reporter.send(std::slice::from_ref(&report)).await?;
    println!(
        "{} ({})",
        reply.message.as_deref().unwrap_or("Report sent"),
        report.report_id
    );
    Ok(())
}
