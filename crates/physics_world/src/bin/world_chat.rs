use std::env;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::process;

use physics_world::simulator::SimulationOptions;
use physics_world::{
    LlmInterpreter, PointMassEngine, TurnOrchestrator, WorldChatConfig, WorldMemory,
};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone, PartialEq, Default)]
struct CliOptions {
    config_path: Option<PathBuf>,
    memory_path: Option<PathBuf>,
    realtime: bool,
    reset: bool,
}

fn main() {
    let args: Vec<String> = env::args().collect();
    let options = match parse_options(args.iter().skip(1).map(|arg| arg.as_str())) {
        Ok(options) => options,
        Err(err) => {
            eprintln!("{err}");
            print_help();
            process::exit(1);
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(io::stderr)
        .init();

    let config = match &options.config_path {
        Some(path) => WorldChatConfig::from_config_file(path),
        None => WorldChatConfig::from_default_sources(),
    };
    let mut config = match config {
        Ok(config) => config,
        Err(err) => {
            eprintln!("failed to load config: {err}");
            process::exit(1);
        }
    };
    if let Some(path) = &options.memory_path {
        config.session.memory_path = path.clone();
    }
    if options.realtime {
        config.session.realtime = true;
    }

    let interpreter = match LlmInterpreter::from_config(config.llm.clone()) {
        Ok(interpreter) => interpreter,
        Err(err) => {
            eprintln!("failed to create interpreter: {err}");
            process::exit(1);
        }
    };

    let memory = WorldMemory::open(config.session.memory_path.clone());
    let mut turns = TurnOrchestrator::new(interpreter, PointMassEngine::default(), memory)
        .with_options(SimulationOptions {
            realtime: config.session.realtime,
            max_steps: config.session.max_steps,
        });
    if options.reset {
        turns.reset();
    }

    println!("model: {}", config.llm.model);
    println!("memory: {}", config.session.memory_path.display());
    println!("objects: {}", turns.state().objects.len());
    println!("Describe a scene. `:reset` clears the world, `exit` quits.");

    let stdin = io::stdin();
    let mut lines = stdin.lock().lines();
    loop {
        print!("> ");
        let _ = io::stdout().flush();

        let line = match lines.next() {
            Some(Ok(line)) => line,
            Some(Err(err)) => {
                eprintln!("failed to read input: {err}");
                break;
            }
            None => break,
        };
        let text = line.trim();
        match text {
            "" => continue,
            "exit" | "quit" => break,
            ":reset" => {
                turns.reset();
                println!("world cleared");
                continue;
            }
            _ => {}
        }

        match turns.run_turn(text) {
            Ok(report) => {
                for action in &report.resolution.unresolved {
                    println!(
                        "ignored {} on unknown object `{}`",
                        action.kind, action.target_id
                    );
                }
                println!(
                    "simulated {} steps ({:.2}s)",
                    report.outcome.steps, report.outcome.simulated_time
                );
                for line in report.summary.values() {
                    println!("  {line}");
                }
            }
            Err(err) => println!("turn failed: {err}"),
        }
    }
}

fn parse_options<'a>(args: impl Iterator<Item = &'a str>) -> Result<CliOptions, String> {
    let mut options = CliOptions::default();

    let mut iter = args.peekable();
    while let Some(arg) = iter.next() {
        match arg {
            "--help" | "-h" => {
                print_help();
                process::exit(0);
            }
            "--config" => {
                let raw = iter
                    .next()
                    .ok_or_else(|| "--config requires a file path".to_string())?;
                options.config_path = Some(PathBuf::from(raw));
            }
            "--memory" => {
                let raw = iter
                    .next()
                    .ok_or_else(|| "--memory requires a file path".to_string())?;
                options.memory_path = Some(PathBuf::from(raw));
            }
            "--realtime" => options.realtime = true,
            "--reset" => options.reset = true,
            _ => return Err(format!("unexpected argument: {arg}")),
        }
    }

    Ok(options)
}

fn print_help() {
    println!("Usage: world_chat [--config <path>] [--memory <path>] [--realtime] [--reset]");
    println!("Options:");
    println!("  --config <path>  TOML config file (default: ./config.toml, then env)");
    println!("  --memory <path>  World memory file (default: data/world_state.json)");
    println!("  --realtime       Pace simulation steps in wall-clock time");
    println!("  --reset          Clear the world memory before the first turn");
}
