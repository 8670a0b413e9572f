//! Bench-test front end for the thrust engine.
//!
//! Reads one command per line from stdin and writes every published thruster
//! command to stdout. Logs go to stderr.
//!
//! ```text
//! twist lx ly lz ax ay az   allocate a twist
//! com dx dy dz              shift the center of mass (all zero resets it)
//! quit                      publish neutral and exit
//! ```
//!
//! # Usage
//!
//! ```bash
//! thrust_node --config thrust.toml --mode thrust
//! ```

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::sync::{mpsc, oneshot};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use rov_thrust::node::{self, Event};
use rov_thrust::{Builder, EngineConfig, OutputMode, Parameter, ThrusterCommand, Twist};

#[derive(Parser)]
#[command(name = "thrust_node")]
#[command(about = "Allocate twist commands to the ROV thrusters")]
struct Args {
    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Output mode, overrides the configuration
    #[arg(short, long, value_enum)]
    mode: Option<OutputMode>,

    /// Log level or filter directive, overrides the configuration
    #[arg(long)]
    log_level: Option<String>,
}

/// One parsed stdin line.
#[derive(Debug, PartialEq)]
enum Line {
    Twist(Twist),
    CenterOfMass(Vec<f64>),
    Quit,
    Empty,
}

fn parse_line(line: &str) -> Result<Line, String> {
    let mut words = line.split_whitespace();
    let keyword = match words.next() {
        Some(keyword) => keyword,
        None => return Ok(Line::Empty),
    };

    let values = words
        .map(|word| word.parse::<f64>().map_err(|_| format!("invalid number {:?}", word)))
        .collect::<Result<Vec<_>, _>>()?;

    match keyword {
        "twist" if values.len() == 6 => Ok(Line::Twist(Twist::from_column_slice(&values))),
        "twist" => Err(format!("twist needs 6 values, found {}", values.len())),
        "com" => Ok(Line::CenterOfMass(values)),
        "quit" => Ok(Line::Quit),
        other => Err(format!("unknown command {:?}", other)),
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => match EngineConfig::from_file(path) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("Error: {}", e);
                return ExitCode::FAILURE;
            }
        },
        None => EngineConfig::default(),
    };
    if let Some(mode) = args.mode {
        config.output_mode = mode;
    }

    let level = args.log_level.as_deref().unwrap_or(&config.logging.level);
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level)),
        )
        .with_writer(std::io::stderr)
        .init();

    match run(&config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(config: &EngineConfig) -> Result<(), Box<dyn std::error::Error>> {
    let (command_tx, mut commands) = mpsc::unbounded_channel::<ThrusterCommand>();
    let engine = Builder::<mpsc::UnboundedSender<ThrusterCommand>>::from_config(config)?
        .sink(command_tx)
        .build()?;

    let writer = tokio::spawn(async move {
        let mut stdout = tokio::io::stdout();
        while let Some(command) = commands.recv().await {
            stdout.write_all(format!("{}\n", command).as_bytes()).await?;
            stdout.flush().await?;
        }
        Ok::<_, std::io::Error>(())
    });

    let (events, rx) = mpsc::channel(16);
    let node = tokio::spawn(node::run(engine, rx));
    info!(mode = ?config.output_mode, "reading commands from stdin");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let event = match parse_line(&line) {
            Ok(Line::Twist(twist)) => Event::Twist(twist),
            Ok(Line::CenterOfMass(delta)) => {
                let (reply, result) = oneshot::channel();
                events
                    .send(Event::Parameters {
                        parameters: vec![Parameter::center_of_mass_increment(delta)],
                        reply,
                    })
                    .await?;
                let result = result.await?;
                if result.successful {
                    info!("center of mass updated");
                } else {
                    warn!(reason = %result.reason, "center of mass update rejected");
                }
                continue;
            }
            Ok(Line::Quit) => Event::Shutdown,
            Ok(Line::Empty) => continue,
            Err(reason) => {
                warn!(%reason, "ignoring line");
                continue;
            }
        };

        let is_shutdown = matches!(event, Event::Shutdown);
        events.send(event).await?;
        if is_shutdown {
            break;
        }
    }
    drop(events);

    let summary = node.await?;
    info!(twists = summary.twists, failures = summary.failures, "done");
    writer.await??;
    Ok(())
}
