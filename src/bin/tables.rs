use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use flexi_logger::Logger;
use indicatif::{ProgressBar, ProgressStyle};
use log::info;
use mini_threes::bag::BagConfig;
use mini_threes::engine as GameEngine;
use mini_threes::serialization::{self, TableMeta};
use mini_threes::solver::{seeds, Lookup, ParConfig, ParallelSolver, Solver, SolverConfig, Tables};
use mini_threes::state::parse_state_line;

#[derive(Debug, Parser)]
#[command(name = "tables", about = "Build, query and inspect solved 2x3 Threes tables")]
struct Args {
    #[command(subcommand)]
    cmd: Cmd,
}

#[derive(Debug, Subcommand)]
enum Cmd {
    /// Solve every starting position and write the tables to disk
    Build {
        #[arg(long)]
        out: PathBuf,
        /// Solve seeds concurrently
        #[arg(long)]
        parallel: bool,
        /// Worker threads for --parallel (default: rayon's choice)
        #[arg(long)]
        threads: Option<usize>,
        /// Worker stack size in MiB for --parallel
        #[arg(long, default_value_t = 64)]
        stack_mib: usize,
        /// Bag refill as counts of 1s,2s,3s
        #[arg(long, default_value = "1,1,1", value_parser = parse_refill)]
        refill: BagConfig,
        /// Disable the spinner
        #[arg(long)]
        quiet: bool,
    },
    /// Answer state lines read from stdin with `min avg max`, -1 on a miss, or
    /// the matching bags when a line without `bag=` fits several
    Query {
        #[arg(long)]
        table: PathBuf,
        /// Refuse a table solved under a different bag refill
        #[arg(long, value_parser = parse_refill)]
        refill: Option<BagConfig>,
    },
    /// Print table metadata
    Stats {
        #[arg(long)]
        table: PathBuf,
    },
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    Logger::try_with_env_or_str("info")?
        .format(flexi_logger::colored_default_format)
        .start()?;
    GameEngine::new();

    match args.cmd {
        Cmd::Build { out, parallel, threads, stack_mib, refill, quiet } => {
            let cfg = SolverConfig { bag: refill, par: ParConfig { threads, stack_size: stack_mib << 20 } };
            build(&out, cfg, parallel, quiet)
        }
        Cmd::Query { table, refill } => query(&table, refill),
        Cmd::Stats { table } => stats(&table),
    }
}

fn parse_refill(s: &str) -> Result<BagConfig, String> {
    let counts: Vec<u8> = s
        .split(',')
        .map(|c| c.trim().parse::<u8>().map_err(|e| format!("'{c}': {e}")))
        .collect::<Result<_, _>>()?;
    let refill: [u8; 3] = counts.try_into().map_err(|_| format!("expected three counts, got '{s}'"))?;
    let cfg = BagConfig { refill };
    cfg.validate().map_err(|e| e.to_string())?;
    Ok(cfg)
}

fn spinner(total: usize) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::with_template("{spinner} {elapsed_precise} | Seeds: {msg}")
            .unwrap()
            .tick_chars("⠁⠃⠇⠧⠷⠿⠻⠟⠯⠷⠧⠇⠃"),
    );
    pb.set_message(format!("0/{total}"));
    pb.enable_steady_tick(Duration::from_millis(120));
    pb
}

fn build(out: &Path, cfg: SolverConfig, parallel: bool, quiet: bool) -> anyhow::Result<()> {
    cfg.validate()?;
    let total = seeds(&cfg.bag).len();
    let pb = (!quiet).then(|| spinner(total));
    let start = Instant::now();

    let tables: Tables = if parallel {
        let solver = ParallelSolver::try_with_config(cfg.clone())?;
        let done = AtomicUsize::new(0);
        solver.initialize_with(|_| {
            let n = done.fetch_add(1, Ordering::Relaxed) + 1;
            if let Some(pb) = &pb {
                pb.set_message(format!("{n}/{total}"));
            }
        })?;
        solver.into_tables()
    } else {
        // The sequential solver reports through the log; the spinner only ticks.
        let mut solver = Solver::try_with_config(cfg.clone())?;
        solver.initialize();
        solver.into_tables()
    };
    let elapsed = start.elapsed().as_secs_f32();
    if let Some(pb) = pb {
        pb.finish_and_clear();
    }

    let meta = TableMeta::for_tables(cfg.bag, &tables, elapsed);
    serialization::write_tables_to_path(out, &meta, &tables)
        .with_context(|| format!("writing {}", out.display()))?;
    info!(
        "wrote {} before-states and {} after-states to {} ({:.1}s)",
        meta.before_len,
        meta.after_len,
        out.display(),
        elapsed
    );
    Ok(())
}

fn query(path: &Path, refill: Option<BagConfig>) -> anyhow::Result<()> {
    let (meta, tables) =
        serialization::read_tables_from_path(path).with_context(|| format!("reading {}", path.display()))?;
    if let Some(refill) = refill {
        meta.check(&refill)?;
    }
    let stdin = io::stdin();
    let stdout = io::stdout();
    let mut out = stdout.lock();
    for line in stdin.lock().lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let parsed = match parse_state_line(&line) {
            Ok(parsed) => parsed,
            Err(e) => bail!("bad query '{line}': {e}"),
        };
        match tables.lookup(&parsed, &meta.refill) {
            Lookup::Hit(answer) => writeln!(out, "{answer}")?,
            Lookup::Miss => writeln!(out, "-1")?,
            Lookup::Ambiguous(hits) => {
                let bags: Vec<String> = hits
                    .iter()
                    .map(|(bag, _)| {
                        let [a, b, c] = bag.counts();
                        format!("bag={a},{b},{c}")
                    })
                    .collect();
                writeln!(out, "ambiguous {}", bags.join(" "))?
            }
        }
    }
    Ok(())
}

fn stats(path: &Path) -> anyhow::Result<()> {
    let (meta, tables) =
        serialization::read_tables_from_path(path).with_context(|| format!("reading {}", path.display()))?;
    let [ones, twos, threes] = meta.refill.refill;
    println!("bag refill: {ones},{twos},{threes}");
    println!("before-states: {}", tables.before_len());
    println!("after-states: {}", tables.after_len());
    println!("build time: {:.1}s", meta.build_s);
    println!("created: {} (unix seconds)", meta.created_unix_s);
    Ok(())
}
