use std::fs::File;
use std::io::BufWriter;
use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, ValueEnum};
use log::{error, info};

use petri_bdd::bdd::{Bdd, BddConfig};
use petri_bdd::deadlock::{self, DeadlockConfig, DeadlockDetector};
use petri_bdd::explicit::{self, SearchOutcome};
use petri_bdd::models;
use petri_bdd::optimize::{Constraints, Optimizer, Optimum};
use petri_bdd::symbolic::{ReachabilityConfig, SymbolicReachability};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Model {
    Ring,
    Mutex,
    Philosophers,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum DeadlockStrategy {
    Auto,
    Exhaustive,
    Hybrid,
}

#[derive(Debug, Parser)]
#[command(author, version)]
struct Cli {
    /// Built-in model to analyze.
    #[arg(value_enum, default_value = "philosophers")]
    model: Model,

    /// Model size (ring length, processes, or philosophers).
    #[arg(short, value_name = "INT", default_value = "5")]
    n: usize,

    /// BDD size (in bits, so the actual size is `2^size` nodes).
    #[clap(long, value_name = "INT", default_value = "20")]
    size: usize,

    /// Time budget for explicit search, in seconds.
    #[clap(long, value_name = "SECS", default_value = "10")]
    budget: u64,

    /// Deadlock detection strategy.
    #[clap(long, value_enum, default_value = "auto")]
    strategy: DeadlockStrategy,

    /// Fail on structural/exact mismatches instead of resampling.
    #[clap(long)]
    strict: bool,

    /// Constrain a place: `ID=MIN..MAX` (repeatable).
    #[clap(long = "bound", value_name = "ID=MIN..MAX")]
    bounds: Vec<String>,

    /// Write the reachable set as DOT to this file.
    #[clap(long, value_name = "FILE")]
    dot: Option<PathBuf>,

    /// Also render the DOT file to PNG with Graphviz.
    #[clap(long, requires = "dot")]
    render: bool,
}

fn parse_bound(s: &str) -> color_eyre::Result<(String, u32, u32)> {
    let (id, range) = s
        .split_once('=')
        .ok_or_else(|| color_eyre::eyre::eyre!("expected ID=MIN..MAX, got `{}`", s))?;
    let (min, max) = range
        .split_once("..")
        .ok_or_else(|| color_eyre::eyre::eyre!("expected MIN..MAX, got `{}`", range))?;
    Ok((id.to_string(), min.parse()?, max.parse()?))
}

fn main() -> color_eyre::Result<()> {
    color_eyre::install()?;

    simplelog::TermLogger::init(
        simplelog::LevelFilter::Info,
        simplelog::Config::default(),
        simplelog::TerminalMode::Mixed,
        simplelog::ColorChoice::Auto,
    )?;

    let args = Cli::parse();
    println!("args = {:?}", args);

    let net = match args.model {
        Model::Ring => models::token_ring(args.n)?,
        Model::Mutex => models::mutex(args.n)?,
        Model::Philosophers => models::dining_philosophers(args.n)?,
    };
    println!(
        "net: {} place(s), {} transition(s)",
        net.num_places(),
        net.num_transitions()
    );

    // Explicit baseline
    let budget = Duration::from_secs(args.budget);
    for strategy in [explicit::Strategy::Bfs, explicit::Strategy::Dfs] {
        let result = match explicit::search(&net, strategy, budget) {
            Ok(result) => result,
            Err(e) => {
                error!("{:?} search failed: {}", strategy, e);
                continue;
            }
        };
        match result.value {
            SearchOutcome::Complete(markings) => {
                println!("{:?}: {} marking(s) in {:?}", strategy, markings.len(), result.elapsed)
            }
            SearchOutcome::Timeout => println!("{:?}: timeout after {:?}", strategy, result.elapsed),
        }
    }

    // Symbolic reachability
    let bdd = Bdd::with_config(BddConfig::default().with_storage_bits(args.size));
    let engine = SymbolicReachability::new(&net, &bdd);
    let reachable = engine.compute_reachable(&ReachabilityConfig::default())?;
    println!(
        "BDD: {} marking(s), {} iteration(s), {:?}",
        reachable.value.count, reachable.value.iterations, reachable.elapsed
    );
    let set = reachable.value.set;
    if net.num_places() <= 8 {
        println!("reachable = {}", engine.to_expr(&set)?);
    }

    if let Some(path) = &args.dot {
        engine.serialize(&set, BufWriter::new(File::create(path)?))?;
        info!("Wrote {}", path.display());
        if args.render {
            let png = path.with_extension("png");
            if engine.render(path, &png) {
                println!("rendered {}", png.display());
            }
        }
    }

    // Deadlock
    let strategy = match args.strategy {
        DeadlockStrategy::Auto => deadlock::Strategy::Auto,
        DeadlockStrategy::Exhaustive => deadlock::Strategy::Exhaustive,
        DeadlockStrategy::Hybrid => deadlock::Strategy::Hybrid,
    };
    let config = DeadlockConfig::default()
        .with_strategy(strategy)
        .with_strict(args.strict);
    let mut detector = DeadlockDetector::new(&engine, config);
    let report = detector.find_deadlock(&set)?;
    match &report.value.marking {
        Some(marking) => println!(
            "deadlock ({:?}): {} in {:?}",
            report.value.strategy,
            net.display(marking),
            report.elapsed
        ),
        None => println!("no deadlock ({:?}) in {:?}", report.value.strategy, report.elapsed),
    }

    // Optimization
    let bounds = args
        .bounds
        .iter()
        .map(|s| parse_bound(s))
        .collect::<color_eyre::Result<Vec<_>>>()?;
    let constraints = Constraints::from_ids(&net, bounds)?;
    let optimum = Optimizer::new(&engine).optimize(&set, None, Some(&constraints))?;
    match &optimum.value {
        Optimum::Best { marking, score } => {
            println!("optimum: {} with score {} in {:?}", net.display(marking), score, optimum.elapsed)
        }
        Optimum::NoSolution => println!("optimum: no marking satisfies the bounds"),
    }

    Ok(())
}
