use std::io::Read;
use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use occurrence_engine::{parse_instant, EventRecord, OccurrenceGenerator};
use serde_json::{json, Value};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "occurrences",
    version,
    about = "Expand a calendar event record into concrete occurrences"
)]
struct Cli {
    /// Event record JSON file (reads stdin when omitted)
    #[arg(short, long, global = true)]
    event: Option<PathBuf>,

    /// Pretty-print the JSON output
    #[arg(long, global = true)]
    pretty: bool,

    /// Log engine activity to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Walk the occurrence cursor from the series start
    Next {
        /// Maximum number of steps to print
        #[arg(short, long, default_value_t = 10)]
        limit: usize,
    },
    /// Occurrences from the series start whose start is at or before START_UNTIL
    TakeUntil {
        start_until: String,
        /// Also require every occurrence to end at or before this instant
        #[arg(long)]
        end_until: Option<String>,
    },
    /// Occurrences overlapping the window FROM..START_TO
    TakeFrom {
        from: String,
        start_to: String,
        /// Also require every occurrence to end at or before this instant
        #[arg(long)]
        end_to: Option<String>,
    },
    /// First occurrence starting at or after DATE
    After { date: String },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let input = read_input(cli.event.as_ref())?;
    let event = EventRecord::from_json(&input).context("Failed to parse event record")?;
    let generator = OccurrenceGenerator::new(event).context("Failed to build generator")?;

    let output = run(generator, cli.command)?;
    let rendered = if cli.pretty {
        serde_json::to_string_pretty(&output)?
    } else {
        serde_json::to_string(&output)?
    };
    println!("{rendered}");
    Ok(())
}

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

fn read_input(path: Option<&PathBuf>) -> Result<String> {
    match path {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read file: {}", path.display())),
        None => {
            let mut buf = String::new();
            std::io::stdin()
                .read_to_string(&mut buf)
                .context("Failed to read stdin")?;
            Ok(buf)
        }
    }
}

fn instant_arg(name: &str, value: &str) -> Result<DateTime<Utc>> {
    parse_instant(value).with_context(|| format!("Invalid {name}"))
}

fn run(mut generator: OccurrenceGenerator, command: Commands) -> Result<Value> {
    let output = match command {
        Commands::Next { limit } => {
            let mut steps = Vec::new();
            for _ in 0..limit {
                let step = generator.advance();
                let done = step.done;
                steps.push(json!({
                    "value": step.value.map(|v| v.to_value()),
                    "done": done,
                }));
                if done {
                    break;
                }
            }
            Value::Array(steps)
        }
        Commands::TakeUntil {
            start_until,
            end_until,
        } => {
            let start_until = instant_arg("START_UNTIL", &start_until)?;
            let end_until = end_until
                .map(|v| instant_arg("--end-until", &v))
                .transpose()?;
            to_array(generator.take_until(start_until, end_until))
        }
        Commands::TakeFrom {
            from,
            start_to,
            end_to,
        } => {
            let from = instant_arg("FROM", &from)?;
            let start_to = instant_arg("START_TO", &start_to)?;
            let end_to = end_to.map(|v| instant_arg("--end-to", &v)).transpose()?;
            to_array(generator.take_from(from, start_to, end_to))
        }
        Commands::After { date } => {
            let date = instant_arg("DATE", &date)?;
            generator
                .after(date)
                .map(|v| v.to_value())
                .unwrap_or(Value::Null)
        }
    };
    Ok(output)
}

fn to_array(events: Vec<EventRecord>) -> Value {
    Value::Array(events.iter().map(EventRecord::to_value).collect())
}
