//! Argument parsing and command dispatch for the `vdm` binary.

use std::num::NonZeroUsize;
use std::path::PathBuf;

use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum};
use tracing::Instrument;
use url::Url;
use vdm_app::{DEFAULT_TEMPLATE_ROOT, Selection};
use vdm_config::TransferScope;
use vdm_fsops::DEFAULT_COMMAND_TIMEOUT;
use vdm_telemetry::{
    LogFormat, LoggingConfig, command_span, init_logging, level_for_verbosity, record_outcome,
};

use crate::client::{CliContext, CliError, CliResult};
use crate::commands::plan::handle_plan;
use crate::commands::provision::handle_provision;

/// Parses CLI arguments, executes the requested command, and prints its
/// output. Returns the process exit code.
pub async fn run() -> i32 {
    let cli = Cli::parse();
    install_logging(&cli);
    let span = command_span(cli.command.label());

    match dispatch(cli).instrument(span.clone()).await {
        Ok(output) => {
            record_outcome(&span, "success");
            print!("{output}");
            0
        }
        Err(err) => {
            record_outcome(&span, "error");
            eprintln!("error: {}", err.display_message());
            err.exit_code()
        }
    }
}

fn install_logging(cli: &Cli) {
    let config = LoggingConfig {
        level: level_for_verbosity(cli.verbose),
        format: cli.log_format.unwrap_or_else(LogFormat::infer),
        build_sha: option_env!("VDM_BUILD_SHA").unwrap_or("dev"),
    };
    if let Err(err) = init_logging(&config) {
        eprintln!("warning: logging disabled: {err}");
    }
}

async fn dispatch(cli: Cli) -> CliResult<String> {
    let ctx = CliContext::from_flags(cli.config, cli.api_url)?;
    match cli.command {
        Command::Provision(args) => handle_provision(&ctx, args, cli.output).await,
        Command::Plan(args) => handle_plan(&ctx, args, cli.output).await,
    }
}

#[derive(Parser)]
#[command(
    name = "vdm",
    version,
    about = "Provision cruise directory skeletons on collection system destinations"
)]
struct Cli {
    #[arg(
        long,
        global = true,
        env = "VDM_CONFIG",
        help = "Read configuration from a JSON settings file"
    )]
    config: Option<PathBuf>,
    #[arg(
        long,
        global = true,
        env = "VDM_API_URL",
        value_parser = parse_url,
        help = "Read configuration from the configuration service at this URL"
    )]
    api_url: Option<Url>,
    #[arg(
        short = 'v',
        long = "verbose",
        global = true,
        action = ArgAction::Count,
        help = "Increase log verbosity (-v info, -vv debug, -vvv trace)"
    )]
    verbose: u8,
    #[arg(
        long,
        global = true,
        value_parser = parse_log_format,
        help = "Log format: pretty or json"
    )]
    log_format: Option<LogFormat>,
    #[arg(
        long = "output",
        alias = "format",
        global = true,
        value_enum,
        default_value_t = OutputFormat::Text,
        help = "Select output format for command results"
    )]
    output: OutputFormat,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    #[command(about = "Create directories and seed files for the selected transfers")]
    Provision(ProvisionArgs),
    #[command(about = "Print the instructions a provision run would apply")]
    Plan(PlanArgs),
}

impl Command {
    const fn label(&self) -> &'static str {
        match self {
            Self::Provision(_) => "provision",
            Self::Plan(_) => "plan",
        }
    }
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, ValueEnum)]
pub(crate) enum OutputFormat {
    #[default]
    Text,
    Json,
}

#[derive(Args, Debug, Default)]
pub(crate) struct SelectionArgs {
    #[arg(
        short = 'c',
        long = "collection-system",
        value_name = "NAME",
        conflicts_with = "lowering",
        help = "Provision a single transfer by name"
    )]
    collection_system: Option<String>,
    #[arg(long, help = "Provision lowering-scoped transfers for the current lowering")]
    lowering: bool,
}

impl SelectionArgs {
    pub(crate) fn resolve(self) -> CliResult<Selection> {
        match self.collection_system {
            Some(name) => {
                let trimmed = name.trim();
                if trimmed.is_empty() {
                    return Err(CliError::validation(
                        "--collection-system requires a non-empty name",
                    ));
                }
                Ok(Selection::Named(trimmed.to_string()))
            }
            None if self.lowering => Ok(Selection::Scope(TransferScope::Lowering)),
            None => Ok(Selection::Scope(TransferScope::Cruise)),
        }
    }
}

#[derive(Args, Debug)]
pub(crate) struct TemplateArgs {
    #[arg(
        long,
        env = "VDM_TEMPLATE_ROOT",
        default_value = DEFAULT_TEMPLATE_ROOT,
        help = "Root of the per-collection-system template trees"
    )]
    pub(crate) template_root: PathBuf,
}

#[derive(Args, Debug)]
pub(crate) struct ProvisionArgs {
    #[command(flatten)]
    pub(crate) selection: SelectionArgs,
    #[command(flatten)]
    pub(crate) templates: TemplateArgs,
    #[arg(long, help = "Create each transfer's source directory before populating it")]
    pub(crate) create_source_dir: bool,
    #[arg(
        long,
        default_value = "1",
        help = "Number of transfers provisioned at the same time"
    )]
    pub(crate) concurrency: NonZeroUsize,
    #[arg(
        long = "smb-timeout",
        value_name = "SECS",
        value_parser = clap::value_parser!(u64).range(1..),
        default_value_t = DEFAULT_COMMAND_TIMEOUT.as_secs(),
        help = "Timeout for each smbclient invocation"
    )]
    pub(crate) smb_timeout: u64,
}

#[derive(Args, Debug)]
pub(crate) struct PlanArgs {
    #[command(flatten)]
    pub(crate) selection: SelectionArgs,
    #[command(flatten)]
    pub(crate) templates: TemplateArgs,
}

fn parse_url(input: &str) -> Result<Url, String> {
    input
        .parse::<Url>()
        .map_err(|err| format!("invalid URL '{input}': {err}"))
}

fn parse_log_format(input: &str) -> Result<LogFormat, String> {
    input
        .parse::<LogFormat>()
        .map_err(|_| format!("unknown log format '{input}' (expected pretty or json)"))
}
