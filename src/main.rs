#![forbid(unsafe_code)]

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::{EnvFilter, fmt::format::FmtSpan};

use report_wiki::config::WikiConfig;
use report_wiki::publish_cmd::PublishArgs;
use report_wiki::{collect_cmd, convert_cmd, index_cmd, publish_cmd};

#[derive(Parser, Debug)]
#[command(name = "report-wiki")]
#[command(about = "Publish CI test reports as static HTML pages to a wiki", long_about = None)]
struct Cli {
    /// Enable verbose logging (or set REPORT_WIKI_LOG)
    #[arg(long, global = true)]
    verbose: bool,

    /// Config file (default: ./report-wiki.toml when present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// List report artifacts found in a repository tree
    Collect {
        /// Repository root to scan
        #[arg(long, default_value = ".")]
        root: PathBuf,
        /// Include glob (repeatable); replaces the defaults
        #[arg(long = "pattern")]
        patterns: Vec<String>,
        /// Exclude glob (repeatable); added to the defaults
        #[arg(long = "exclude")]
        excludes: Vec<String>,
        /// Package directory to scan instead of packages/* and apps/* (repeatable)
        #[arg(long = "package")]
        packages: Vec<PathBuf>,
        /// Print machine-readable JSON to stdout
        #[arg(long)]
        json: bool,
    },

    /// Convert one raw report into an HTML page
    Convert {
        /// Raw report file
        #[arg(long)]
        input: PathBuf,
        /// Report format (junit, jest, vitest, cucumber); detected when omitted
        #[arg(long)]
        format: Option<String>,
        /// HTML file to write
        #[arg(long)]
        output: PathBuf,
        /// Print a JSON summary to stdout
        #[arg(long)]
        json: bool,
    },

    /// Publish a run into the report store and regenerate the index
    Publish {
        #[arg(long)]
        branch: String,
        #[arg(long)]
        run_id: String,
        /// Commit SHA of the run
        #[arg(long)]
        commit: String,
        /// RFC 3339 timestamp of the run (default: now)
        #[arg(long)]
        timestamp: Option<String>,
        /// Directory holding this run's raw report files
        #[arg(long)]
        reports: PathBuf,
        /// Local wiki checkout (default from config, else ./wiki)
        #[arg(long)]
        store: Option<PathBuf>,
        /// Runs kept per branch
        #[arg(long)]
        max_per_branch: Option<usize>,
        /// Runs listed under "Recent runs"
        #[arg(long)]
        max_recent: Option<usize>,
        /// Exit non-zero when publishing or pushing fails
        #[arg(long)]
        fail_on_error: bool,
        /// Push command template (placeholders: {store},{message})
        #[arg(long)]
        push_command: Option<String>,
    },

    /// Rebuild all index pages from the run sidecars in the store
    Index {
        #[arg(long)]
        store: Option<PathBuf>,
        #[arg(long)]
        max_recent: Option<usize>,
        #[arg(long)]
        max_per_branch: Option<usize>,
    },
}

fn init_tracing(verbose: bool) {
    let env = std::env::var("REPORT_WIKI_LOG").unwrap_or_else(|_| {
        if verbose { "report_wiki=debug".to_string() } else { "report_wiki=info".to_string() }
    });
    let _ = tracing_subscriber::fmt()
        .with_span_events(FmtSpan::ACTIVE)
        .with_writer(std::io::stderr)
        .with_ansi(true)
        .with_env_filter(EnvFilter::new(env))
        .try_init();
}

fn main() {
    color_eyre::install().ok();
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = match WikiConfig::discover(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{:#}", e);
            std::process::exit(1);
        }
    };

    let result = match cli.command {
        Commands::Collect { root, patterns, excludes, packages, json } => {
            collect_cmd::run(&config, root, patterns, excludes, packages, json)
        }
        Commands::Convert { input, format, output, json } => convert_cmd::run(input, format, output, json),
        Commands::Publish {
            branch,
            run_id,
            commit,
            timestamp,
            reports,
            store,
            max_per_branch,
            max_recent,
            fail_on_error,
            push_command,
        } => publish_cmd::run(
            &config,
            PublishArgs {
                branch,
                run_id,
                commit,
                timestamp,
                reports,
                store,
                max_per_branch,
                max_recent,
                fail_on_error,
                push_command,
            },
        ),
        Commands::Index { store, max_recent, max_per_branch } => {
            index_cmd::run(&config, store, max_recent, max_per_branch)
        }
    };

    if let Err(e) = result {
        eprintln!("{:#}", e);
        std::process::exit(1);
    }
}
