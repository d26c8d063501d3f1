mod cmd;
mod output;

use agentpm_core::config::{Config, DEFAULT_CONFIG_FILE};
use agentpm_core::lifecycle::LifecycleService;
use agentpm_core::store::FileStore;
use agentpm_core::xml;
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "agentpm",
    about = "Single-agent project tracker — one XML epic, phases, tasks, tests, and an append-only event log",
    version,
    propagate_version = true
)]
struct Cli {
    /// Epic file override (default: current_epic from the config)
    #[arg(short = 'f', long, global = true)]
    file: Option<PathBuf>,

    /// Config file path
    #[arg(long, global = true, env = "AGENTPM_CONFIG", default_value = DEFAULT_CONFIG_FILE)]
    config: PathBuf,

    /// RFC-3339 timestamp override for deterministic runs
    #[arg(long, global = true)]
    time: Option<String>,

    /// Output as JSON
    #[arg(long, global = true, short = 'j')]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the tracker config pointing at an epic file
    Init {
        /// Path of the epic XML file to track
        #[arg(long)]
        epic: String,
        /// Optional project name stored in the config
        #[arg(long)]
        project_name: Option<String>,
    },

    /// Show the current configuration
    Config,

    /// Point the tracker at a different epic file
    Switch { epic: String },

    /// Swap back to the previously tracked epic
    SwitchBack,

    /// Start the epic
    StartEpic,

    /// Complete the epic (all phases done, all tests passing or cancelled)
    DoneEpic,

    /// Start a phase
    StartPhase { id: String },

    /// Complete a phase
    DonePhase { id: String },

    /// Start a task
    StartTask { id: String },

    /// Complete a task
    DoneTask { id: String },

    /// Cancel a task (a reason is required)
    CancelTask {
        id: String,
        #[arg(required = true)]
        reason: Vec<String>,
    },

    /// Start a test
    StartTest { id: String },

    /// Mark a test passing
    PassTest { id: String },

    /// Mark a test failing (reopens done tests)
    FailTest {
        id: String,
        reason: Vec<String>,
    },

    /// Cancel a test (a reason is required)
    CancelTest {
        id: String,
        #[arg(required = true)]
        reason: Vec<String>,
    },

    /// Status rollup with completion percentage
    Status,

    /// Active phase, active task, and the suggested next action
    Current,

    /// Phases, tasks, and tests that still need work
    Pending,

    /// Tests that have not passed yet, with phase context
    Failing,

    /// Recent activity, newest first
    Events {
        /// How many entries to show (1-100)
        #[arg(long, default_value_t = 10)]
        limit: usize,
    },

    /// Structural warnings and completion readiness
    Validate,

    /// Append a manual event to the activity log
    Log {
        #[arg(required = true)]
        message: Vec<String>,
        /// Event type (default: implementation)
        #[arg(long = "type")]
        event_type: Option<String>,
    },
}

/// Shared command environment resolved from the global flags.
pub(crate) struct AppContext {
    pub config_path: PathBuf,
    pub epic_override: Option<PathBuf>,
    pub time: Option<DateTime<Utc>>,
    pub json: bool,
}

impl AppContext {
    /// Explicit -f wins; otherwise the config names the epic file.
    pub fn epic_path(&self) -> anyhow::Result<PathBuf> {
        if let Some(path) = &self.epic_override {
            return Ok(path.clone());
        }
        let config = Config::load(&self.config_path)?;
        Ok(config.epic_file_path())
    }

    pub fn service(&self) -> LifecycleService<FileStore> {
        let mut service = LifecycleService::new(FileStore::new());
        if let Ok(config) = Config::load(&self.config_path) {
            service = service.with_agent(config.assignee().to_string());
        }
        service
    }
}

fn main() {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::WARN.into()),
        )
        .with_target(false)
        .init();

    let time = match cli.time.as_deref().map(xml::parse_ts).transpose() {
        Ok(t) => t,
        Err(e) => {
            eprintln!("error: {e}");
            std::process::exit(1);
        }
    };

    let ctx = AppContext {
        config_path: cli.config,
        epic_override: cli.file,
        time,
        json: cli.json,
    };

    let result = match cli.command {
        Commands::Init { epic, project_name } => {
            cmd::config::init(&ctx, &epic, project_name.as_deref())
        }
        Commands::Config => cmd::config::show(&ctx),
        Commands::Switch { epic } => cmd::config::switch(&ctx, &epic),
        Commands::SwitchBack => cmd::config::switch_back(&ctx),
        Commands::StartEpic => cmd::epic::start(&ctx),
        Commands::DoneEpic => cmd::epic::done(&ctx),
        Commands::StartPhase { id } => cmd::phase::start(&ctx, &id),
        Commands::DonePhase { id } => cmd::phase::done(&ctx, &id),
        Commands::StartTask { id } => cmd::task::start(&ctx, &id),
        Commands::DoneTask { id } => cmd::task::done(&ctx, &id),
        Commands::CancelTask { id, reason } => cmd::task::cancel(&ctx, &id, &reason.join(" ")),
        Commands::StartTest { id } => cmd::test::start(&ctx, &id),
        Commands::PassTest { id } => cmd::test::pass(&ctx, &id),
        Commands::FailTest { id, reason } => cmd::test::fail(&ctx, &id, &reason.join(" ")),
        Commands::CancelTest { id, reason } => cmd::test::cancel(&ctx, &id, &reason.join(" ")),
        Commands::Status => cmd::query::status(&ctx),
        Commands::Current => cmd::query::current(&ctx),
        Commands::Pending => cmd::query::pending(&ctx),
        Commands::Failing => cmd::query::failing(&ctx),
        Commands::Events { limit } => cmd::query::events(&ctx, limit),
        Commands::Validate => cmd::query::validate(&ctx),
        Commands::Log {
            message,
            event_type,
        } => cmd::log::run(&ctx, &message.join(" "), event_type.as_deref()),
    };

    if let Err(e) = result {
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}
