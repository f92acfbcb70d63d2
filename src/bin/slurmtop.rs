//! slurmtop - terminal dashboard for Slurm clusters.
//!
//! Usage:
//!   slurmtop                                  # interactive dashboard
//!   slurmtop --partition gpu                  # start filtered to one partition
//!   slurmtop --job-state PENDING              # start with pending jobs only
//!   slurmtop --load-sacct-data-from 2h        # load two hours of accounting history
//!   slurmtop --headless -v                    # no TUI, log every refresh

use tikv_jemallocator::Jemalloc;
#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

use std::fs::OpenOptions;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use clap::Parser;
use tracing::{Level, debug, info, warn};
use tracing_subscriber::EnvFilter;

use slurmtop::collector::slurm::{cluster_info, ping, sacctmgr_available};
use slurmtop::collector::{ClusterInfo, CommandRunner, SlurmRunner, commands_executed};
use slurmtop::config::{Config, DEFAULT_JOB_COLUMNS, DEFAULT_NODE_COLUMNS, DEFAULT_SACCT_COLUMNS};
use slurmtop::provider::{DataProvider, FilterArgs, ProviderContext, ProviderSet, fetches_completed};
use slurmtop::scheduler::View;
use slurmtop::storage::{AccountingCache, default_cache_dir};
use slurmtop::tui::{App, AppState};
use slurmtop::util::{format_duration, parse_duration};

/// Terminal dashboard for Slurm clusters.
#[derive(Parser)]
#[command(name = "slurmtop", about = "Terminal dashboard for Slurm clusters", version)]
struct Args {
    /// Interval between fetches of the active view (e.g. 30s, 2m).
    #[arg(long, default_value = "60s", value_parser = parse_duration)]
    refresh_interval: Duration,

    /// Interval between redraws. Redraws never run Slurm commands.
    #[arg(long, default_value = "1s", value_parser = parse_duration)]
    render_interval: Duration,

    /// Timeout of one Slurm command. Must be shorter than the refresh interval.
    #[arg(long, default_value = "5s", value_parser = parse_duration)]
    request_timeout: Duration,

    /// `sacct` may run this many times the request timeout. The product must
    /// be shorter than the refresh interval unless accounting fetches are off.
    #[arg(long, default_value_t = 5)]
    accounting_timeout_multiplier: u32,

    /// Directory containing scontrol, sacct, sacctmgr and sdiag.
    /// Uses $PATH when not set.
    #[arg(long, value_name = "DIR")]
    slurm_binaries_path: Option<PathBuf>,

    /// Initial partition filter. Several partitions are separated by commas.
    #[arg(long, default_value = "")]
    partition: String,

    /// Initial node state filter, e.g. DRAIN.
    #[arg(long, default_value = "")]
    node_state: String,

    /// Initial job state filter of the jobs and accounting views, e.g. RUNNING.
    #[arg(long, default_value = "")]
    job_state: String,

    /// Entity listed first by the accounting manager view, e.g. User or QOS.
    #[arg(long, default_value = "Account")]
    sacctmgr_entity: String,

    /// Node columns. `a//b` joins fields, a trailing `++` disables the width cap.
    #[arg(long, default_value = DEFAULT_NODE_COLUMNS)]
    node_columns: String,

    /// Job columns.
    #[arg(long, default_value = DEFAULT_JOB_COLUMNS)]
    job_columns: String,

    /// Accounting columns.
    #[arg(long, default_value = DEFAULT_SACCT_COLUMNS)]
    sacct_columns: String,

    /// Show every known field instead of the configured columns.
    #[arg(long)]
    show_all_columns: bool,

    /// Accounting history to load on start. `0` disables accounting fetches
    /// and shows the cached history only.
    #[arg(long, default_value = "30m", value_parser = parse_duration)]
    load_sacct_data_from: Duration,

    /// Cluster name used to namespace the accounting cache.
    /// Queried from the controller when not set.
    #[arg(long)]
    cluster_name: Option<String>,

    /// Base directory of the accounting cache.
    /// Default: $XDG_CACHE_HOME or ~/.cache
    #[arg(long, value_name = "DIR")]
    cache_dir: Option<PathBuf>,

    /// Width cap of regular columns.
    #[arg(long, default_value_t = 30)]
    max_column_width: usize,

    /// Repeat every row this many times (load testing).
    #[arg(long, default_value_t = 1)]
    duplicate_rows: usize,

    /// Run without the TUI and log refreshes until Ctrl-C.
    #[arg(long)]
    headless: bool,

    /// Write logs to this file. In TUI mode nothing is logged without it.
    #[arg(long, value_name = "PATH")]
    log_file: Option<PathBuf>,

    /// Increase logging verbosity (-v for debug, -vv for trace). Default is info level.
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Quiet mode - only show errors.
    #[arg(short, long)]
    quiet: bool,
}

impl Args {
    fn config(&self) -> Config {
        Config {
            refresh_interval: self.refresh_interval,
            render_interval: self.render_interval,
            request_timeout: self.request_timeout,
            accounting_timeout_multiplier: self.accounting_timeout_multiplier,
            slurm_binaries_path: self.slurm_binaries_path.clone(),
            partition: self.partition.clone(),
            node_state: self.node_state.clone(),
            job_state: self.job_state.clone(),
            sacctmgr_entity: self.sacctmgr_entity.clone(),
            node_columns: self.node_columns.clone(),
            job_columns: self.job_columns.clone(),
            sacct_columns: self.sacct_columns.clone(),
            show_all_columns: self.show_all_columns,
            load_sacct_data_from: self.load_sacct_data_from,
            cluster_name: self.cluster_name.clone(),
            cache_dir: self.cache_dir.clone(),
            max_column_width: self.max_column_width,
            duplicate_rows: self.duplicate_rows,
        }
    }
}

/// Initializes the tracing subscriber.
///
/// Headless mode logs to stderr. The TUI owns the terminal, so there logs go
/// to `--log-file` or nowhere.
fn init_logging(args: &Args) {
    let level = if args.quiet {
        Level::ERROR
    } else {
        match args.verbose {
            0 => Level::INFO,
            1 => Level::DEBUG,
            _ => Level::TRACE,
        }
    };

    let mut filter = EnvFilter::from_default_env();
    if let Ok(directive) = format!("slurmtop={}", level).parse() {
        filter = filter.add_directive(directive);
    }

    if let Some(path) = &args.log_file {
        match OpenOptions::new().create(true).append(true).open(path) {
            Ok(file) => tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_target(false)
                .with_ansi(false)
                .with_writer(Mutex::new(file))
                .init(),
            Err(e) => {
                eprintln!("Error: cannot open log file {}: {}", path.display(), e);
                std::process::exit(1);
            }
        }
    } else if args.headless {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .with_writer(std::io::stderr)
            .init();
    }
}

/// Opens the accounting cache of `cluster`, or `None` when there is no
/// usable cache directory.
fn open_cache(config: &Config, cluster: &str) -> Option<AccountingCache> {
    let Some(base) = config.cache_dir.clone().or_else(default_cache_dir) else {
        warn!("no cache directory (set --cache-dir or $HOME), accounting views disabled");
        return None;
    };
    match AccountingCache::for_cluster(&base, cluster) {
        Ok(cache) => {
            info!(
                path = %cache.path().display(),
                usable = cache.is_usable(),
                "accounting cache opened"
            );
            Some(cache)
        }
        Err(e) => {
            warn!(error = %e, "cannot open accounting cache, accounting views disabled");
            None
        }
    }
}

/// Describes what a view currently holds, for headless logging.
fn describe_view(providers: &ProviderSet, view: View, config: &Config) -> String {
    let node_filter = config.node_filter().unwrap_or_default();
    let job_filter = config.job_filter().unwrap_or_default();
    match view {
        View::Nodes => format!(
            "{} of {} nodes",
            providers.nodes.filtered_data(&node_filter).len(),
            providers.nodes.data().len()
        ),
        View::Jobs => format!(
            "{} of {} jobs",
            providers.jobs.filtered_data(&job_filter).len(),
            providers.jobs.data().len()
        ),
        View::Accounting => providers
            .sacct
            .as_ref()
            .map(|p| format!("{} accounting rows", p.filtered_data(&job_filter).len()))
            .unwrap_or_default(),
        View::AccountingManager => providers
            .sacctmgr
            .as_ref()
            .map(|p| {
                let snapshot = p.data();
                format!("{} {} rows", snapshot.table.len(), p.current_entity())
            })
            .unwrap_or_default(),
        View::Diagnostics => format!("{} lines", providers.sdiag.data().text.lines().count()),
    }
}

fn main() {
    let args = Args::parse();
    init_logging(&args);

    let config = args.config();
    if let Err(e) = config.validate() {
        eprintln!("Error: {}", e);
        std::process::exit(2);
    }

    info!("slurmtop {} starting", env!("CARGO_PKG_VERSION"));
    info!(
        refresh = %format_duration(config.refresh_interval),
        request_timeout = %format_duration(config.request_timeout),
        accounting_timeout = %format_duration(config.accounting_timeout()),
        load_sacct_data_from = %format_duration(config.load_sacct_data_from),
        "configuration"
    );

    let runner: Arc<dyn CommandRunner> = match &config.slurm_binaries_path {
        Some(dir) => Arc::new(SlurmRunner::with_binaries_path(dir)),
        None => Arc::new(SlurmRunner::new()),
    };

    if let Err(e) = ping(runner.as_ref(), config.request_timeout) {
        eprintln!("Error: Slurm controller is not reachable: {}", e);
        std::process::exit(1);
    }

    let mut cluster = cluster_info(runner.as_ref(), config.request_timeout).unwrap_or_else(|e| {
        warn!(error = %e, "cannot read cluster configuration");
        ClusterInfo::default()
    });
    if let Some(name) = &config.cluster_name {
        cluster.cluster_name = name.clone();
    }
    info!(
        cluster = %cluster.cluster_name,
        controller = %cluster.controller_host,
        version = %cluster.slurm_version,
        "connected"
    );

    let cache = if sacctmgr_available(runner.as_ref(), config.request_timeout) {
        open_cache(&config, &cluster.cluster_name)
    } else {
        warn!("accounting database is not reachable, accounting views disabled");
        None
    };

    let ctx = ProviderContext::new(runner, &config);
    let providers = match ProviderSet::build(&config, ctx, cache) {
        Ok(p) => p,
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(2);
        }
    };
    let mut scheduler = match providers.scheduler(&config, View::Nodes) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(2);
        }
    };

    scheduler.startup_fetch();

    let partition_error = FilterArgs::new(config.partition.clone(), "")
        .validated_partition(&providers.partitions.names())
        .err()
        .map(|e| e.to_string());

    if args.headless {
        if let Some(message) = &partition_error {
            warn!("{}", message);
        }
        let stop = Arc::new(AtomicBool::new(false));
        let s = stop.clone();
        if let Err(e) = ctrlc::set_handler(move || {
            info!("Received shutdown signal");
            s.store(true, Ordering::SeqCst);
        }) {
            warn!("Failed to set Ctrl-C handler: {}", e);
        }

        scheduler.run_headless(&stop, |view| {
            debug!(
                view = %view,
                fetches = fetches_completed(),
                commands = commands_executed(),
                "{}",
                describe_view(&providers, view, &config)
            );
        });
        providers.close();
        info!("slurmtop stopped");
        return;
    }

    let mut state = AppState::new(providers.views(), View::Nodes, cluster);
    state.set_partitions(providers.partitions.names());
    state.select_partition(&config.partition);
    state.select_states(&config.node_state, &config.job_state);
    state.entity = config.initial_entity().unwrap_or_default();
    state.status_message = partition_error;

    let app = App::new(providers, scheduler, state);
    if let Err(e) = app.run() {
        eprintln!("Error running TUI: {}", e);
        std::process::exit(1);
    }
}
