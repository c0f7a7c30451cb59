//! Gridwalk solver entry point.
//!
//! Initializes the basis tables, store, monitor and elite pool, then
//! spawns one annealing island per logical core and waits for SIGINT or
//! a full-coverage win.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;

use clap::Parser;
use serde::Deserialize;

use gridwalk::basis;
use gridwalk::board::serialize_board;
use gridwalk::constants::ELITE_POOL_SIZE;
use gridwalk::db;
use gridwalk::monitor::{Monitor, DEFAULT_MONITOR_PATH};
use gridwalk::solver::{SaIsland, SharedContext};

#[derive(Parser, Debug)]
#[command(name = "gridwalk")]
#[command(about = "Parallel SA search for walk-rich digit grids")]
struct Args {
    /// Solver mode: 0 = pure SA, 1 = elite reheat, 2 = LNS repair
    #[arg(short = 'm', long, default_value_t = 0)]
    mode: u8,

    /// Path to config file
    #[arg(short = 'c', long, default_value = "config.toml")]
    config: String,

    /// Path to the SQLite store (overrides config)
    #[arg(long)]
    db: Option<String>,

    /// Worker thread count (default: one per logical core)
    #[arg(short = 't', long)]
    threads: Option<usize>,
}

#[derive(Debug, Deserialize, Default)]
struct Config {
    #[serde(default)]
    paths: PathsConfig,
}

#[derive(Debug, Deserialize)]
struct PathsConfig {
    #[serde(default = "default_database")]
    database: String,
    #[serde(default = "default_monitor")]
    monitor: String,
}

fn default_database() -> String {
    db::DEFAULT_DB_PATH.to_string()
}

fn default_monitor() -> String {
    DEFAULT_MONITOR_PATH.to_string()
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            database: default_database(),
            monitor: default_monitor(),
        }
    }
}

impl Config {
    fn load(path: &str) -> Self {
        match std::fs::read_to_string(path) {
            Ok(contents) => toml::from_str(&contents).unwrap_or_else(|e| {
                eprintln!("Warning: failed to parse {}: {}", path, e);
                Config::default()
            }),
            Err(_) => Config::default(),
        }
    }
}

fn setup_interrupt_handler(ctx: Arc<SharedContext>) {
    let interrupt_count = Arc::new(AtomicUsize::new(0));
    ctrlc::set_handler(move || {
        let count = interrupt_count.fetch_add(1, Ordering::SeqCst);
        ctx.terminate.store(true, Ordering::SeqCst);
        if count == 0 {
            eprintln!("\nInterrupt received, workers will exit at the next break point...");
        } else {
            eprintln!("\nForce quit.");
            std::process::exit(1);
        }
    })
    .expect("Error setting Ctrl-C handler");
}

fn main() {
    env_logger::init();
    let args = Args::parse();

    if args.mode > 2 {
        eprintln!("Unknown solver mode {} (expected 0, 1 or 2)", args.mode);
        std::process::exit(2);
    }

    let config = Config::load(&args.config);
    let db_path = args.db.unwrap_or(config.paths.database);

    let num_threads = args.threads.unwrap_or_else(|| {
        thread::available_parallelism().map(|n| n.get()).unwrap_or(12)
    });

    let log_prefix = db::log_table_prefix();

    println!("═══════════════════════════════════════════════════════════════");
    println!("  GRIDWALK - basis-coverage annealer");
    println!("  mode: {} | threads: {} | log tables: {}", args.mode, num_threads, log_prefix);
    println!("═══════════════════════════════════════════════════════════════");
    println!();

    // The store is optional at runtime: a failed open degrades to an
    // in-memory-only run rather than refusing to search.
    println!("Initializing store at {}...", db_path);
    let db_conn = match db::init_database(&db_path) {
        Ok(conn) => {
            {
                let guard = conn.lock().unwrap();
                if let Err(e) = db::create_physics_log_tables(&guard, &log_prefix, num_threads) {
                    log::warn!("failed to create physics log tables: {}", e);
                }
            }
            println!("  store ready");
            Some(conn)
        }
        Err(e) => {
            log::error!("store unavailable ({}); continuing without persistence", e);
            None
        }
    };

    println!("Building basis tables (this takes a moment)...");
    let basis_size = basis::tables().size();
    println!("  basis ready: {} members", basis_size);

    let monitor = match Monitor::create(&config.paths.monitor, num_threads) {
        Ok(m) => {
            println!("Monitor mapped at {}", config.paths.monitor);
            Some(m)
        }
        Err(e) => {
            log::warn!("monitor unavailable ({}); continuing without it", e);
            None
        }
    };

    let elites = if args.mode == 1 || args.mode == 2 {
        match &db_conn {
            Some(conn) => {
                let guard = conn.lock().unwrap();
                match db::load_random_elites(&guard, 12 * ELITE_POOL_SIZE) {
                    Ok(elites) => {
                        println!("Loaded {} elite boards for mode {}", elites.len(), args.mode);
                        elites
                    }
                    Err(e) => {
                        log::warn!("elite load failed ({}); seeding randomly", e);
                        Vec::new()
                    }
                }
            }
            None => Vec::new(),
        }
    } else {
        Vec::new()
    };

    let ctx = Arc::new(SharedContext {
        db: db_conn.clone(),
        log_prefix,
        elites,
        monitor,
        terminate: AtomicBool::new(false),
    });

    setup_interrupt_handler(ctx.clone());

    println!("Spawning {} workers...", num_threads);
    let mut workers = Vec::with_capacity(num_threads);
    for thread_id in 0..num_threads {
        let ctx = ctx.clone();
        let mode = args.mode;
        workers.push(thread::spawn(move || {
            println!("[thread {}] worker started", thread_id);
            let mut island = SaIsland::new(thread_id, mode, ctx);
            island.run();
            (island.best_score(), serialize_board(island.best_board()))
        }));
    }

    let mut run_best: Option<(f64, String)> = None;
    for worker in workers {
        match worker.join() {
            Ok((score, board)) => {
                if run_best.as_ref().map_or(true, |(best, _)| score > *best) {
                    run_best = Some((score, board));
                }
            }
            Err(_) => log::error!("a worker panicked; continuing shutdown"),
        }
    }
    if let Some((score, board)) = &run_best {
        println!("Best score this run: {:.1}", score);
        println!("  {}", board);
    }

    // Global best is whatever the store has accumulated.
    if let Some(conn) = &db_conn {
        let guard = conn.lock().unwrap();
        if let Ok(elites) = db::load_random_elites(&guard, 100) {
            if let Some(best) = elites.first() {
                println!(
                    "Best persisted board: lineage {} (initial temp {:.2})",
                    best.lineage_id, best.initial_temp
                );
            }
        }
    }

    println!("All workers completed. Exiting.");
}
