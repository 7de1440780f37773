use std::path::PathBuf;

use clap::Parser;
use clap_verbosity_flag::{InfoLevel, Verbosity};
use helmsman_sim::{CycleRecord, RunSummary, Scenario, Simulation};
use miette::{miette, IntoDiagnostic};

#[derive(Parser, Debug)]
#[command(author, version, about = "Play a collision avoidance scenario", long_about = None)]
struct Cli {
    /// Scenario file (JSON)
    scenario: PathBuf,

    /// Override the number of cycles
    #[arg(long)]
    steps: Option<usize>,

    /// Behavior option applied to every contact, as name=value
    #[arg(short = 'p', long = "param", value_parser = parse_param)]
    params: Vec<(String, String)>,

    /// Print one JSON record per cycle instead of a text trace
    #[arg(long)]
    json: bool,

    #[command(flatten)]
    verbose: Verbosity<InfoLevel>,
}

fn parse_param(s: &str) -> Result<(String, String), String> {
    match s.split_once('=') {
        Some((name, value)) if !name.trim().is_empty() => {
            Ok((name.trim().to_string(), value.trim().to_string()))
        }
        _ => Err(format!("expected name=value, got {:?}", s)),
    }
}

fn print_cycle(record: &CycleRecord) {
    let Some(decision) = record.decision else {
        return;
    };
    let ranges: Vec<String> = record
        .contacts
        .iter()
        .map(|c| format!("{} {:.0}m {}", c.name, c.range, c.mode))
        .collect();
    println!(
        "t={:7.1}  course {:5.1}  speed {:4.2}  [{}]",
        record.time,
        decision.course,
        decision.speed,
        ranges.join(", ")
    );
}

fn print_summary(summary: &RunSummary) {
    println!(
        "{}: {} cycles, {:.1}s",
        summary.scenario, summary.cycles, summary.duration
    );
    for c in &summary.contacts {
        println!(
            "  {:<12} closest {:8.1}m at t={:7.1}  {}  ({})",
            c.name, c.min_range, c.min_range_time, c.outcome, c.final_mode
        );
    }
}

fn main() -> miette::Result<()> {
    let cli = Cli::parse();

    env_logger::Builder::new()
        .filter_level(cli.verbose.log_level_filter())
        .init();

    let mut scenario = Scenario::load(&cli.scenario)?;
    if let Some(steps) = cli.steps {
        if steps == 0 {
            return Err(miette!("--steps must be at least 1"));
        }
        scenario.steps = steps;
    }
    for (name, value) in &cli.params {
        scenario.set_param(name, value)?;
    }

    let mut sim = Simulation::new(&scenario)?;
    log::info!(
        "playing {} for {} cycles of {}s",
        scenario.name,
        scenario.steps,
        scenario.dt
    );

    let mut failure = None;
    let summary = sim.run(|record| {
        if cli.json {
            match serde_json::to_string(record) {
                Ok(line) => println!("{}", line),
                Err(e) => failure = Some(e),
            }
        } else {
            print_cycle(record);
        }
    });
    if let Some(e) = failure {
        return Err(e).into_diagnostic();
    }

    if cli.json {
        println!("{}", serde_json::to_string(&summary).into_diagnostic()?);
    } else {
        print_summary(&summary);
    }
    Ok(())
}
