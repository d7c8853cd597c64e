mod backend;
mod cmd;
mod output;
mod root;

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "ralph",
    about = "Turn a ticket into an analysis and an implementation plan, then iterate on it",
    version,
    propagate_version = true
)]
struct Cli {
    /// Context root (default: walk up from cwd looking for .ralph/ or .git/)
    #[arg(long, global = true, env = "RALPH_ROOT")]
    root: Option<PathBuf>,

    /// Output directory for state and artifacts (default: <root>/.ralph)
    #[arg(long, global = true, value_name = "DIR")]
    out_dir: Option<PathBuf>,

    /// Output as JSON
    #[arg(long, global = true, short = 'j')]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Exactly one ticket source per run.
#[derive(Args)]
#[group(required = true, multiple = false)]
struct InputArgs {
    /// Read the ticket description from a file
    #[arg(long, value_name = "FILE")]
    ticket: Option<PathBuf>,

    /// Ticket description as an inline string
    #[arg(long, value_name = "TEXT")]
    text: Option<String>,

    /// Read the ticket description from standard input
    #[arg(long)]
    stdin: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Advance the analysis → plan pipeline, skipping completed stages
    Plan {
        #[command(flatten)]
        input: InputArgs,

        /// Number of stages to advance this run
        #[arg(long, default_value = "1")]
        stages: usize,

        /// Leave source-code excerpts out of the context bundle
        #[arg(long)]
        no_source: bool,

        /// Discard all stage artifacts and rewind state before running
        #[arg(long)]
        force: bool,

        /// Model override
        #[arg(long)]
        model: Option<String>,
    },

    /// Drive the one-task-per-iteration code-editing loop
    Iterate {
        /// Task list file (default: .ralph/plan.json)
        #[arg(long, value_name = "FILE")]
        tasks: Option<PathBuf>,

        /// Number of iterations to run
        #[arg(short = 'n', long, default_value = "1")]
        iterations: usize,

        /// Model override
        #[arg(long)]
        model: Option<String>,
    },

    /// Show pipeline state
    State,
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

    let root = root::resolve_root(cli.root.as_deref());
    let out_dir = cli
        .out_dir
        .clone()
        .unwrap_or_else(|| ralph_core::paths::out_dir(&root));

    let result = match cli.command {
        Commands::Plan {
            input,
            stages,
            no_source,
            force,
            model,
        } => cmd::plan::run(
            &root,
            &out_dir,
            cmd::plan::PlanArgs {
                source: input.into_source(),
                stages,
                no_source,
                force,
                model,
            },
            cli.json,
        ),
        Commands::Iterate {
            tasks,
            iterations,
            model,
        } => cmd::iterate::run(&root, &out_dir, tasks, iterations, model, cli.json),
        Commands::State => cmd::state::run(&out_dir, cli.json),
    };

    if let Err(e) = result {
        // Print the full error chain (anyhow's alternate Display)
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}

impl InputArgs {
    fn into_source(self) -> ralph_core::ticket::TicketSource {
        use ralph_core::ticket::TicketSource;
        if let Some(path) = self.ticket {
            TicketSource::File(path)
        } else if let Some(text) = self.text {
            TicketSource::Inline(text)
        } else {
            // The clap group guarantees --stdin was given.
            TicketSource::Stdin
        }
    }
}
