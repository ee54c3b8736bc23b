use aquavisor::monitor::SnapshotHub;
use aquavisor::{ControlAction, Scenario, StateSnapshot, Supervisor, SupervisorConfig};
use clap::{App, AppSettings, Arg, ArgMatches, SubCommand};
use colored::*;
use std::sync::Arc;
use tracing::Level;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let matches = App::new("aquavisor")
        .version(env!("CARGO_PKG_VERSION"))
        .about("💧 Water treatment PLC supervisor - monitoring and control over Modbus TCP")
        .setting(AppSettings::SubcommandRequiredElseHelp)
        .arg(
            Arg::with_name("host")
                .long("host")
                .value_name("HOST")
                .help("PLC host address (overrides config)")
                .takes_value(true)
                .global(true),
        )
        .arg(
            Arg::with_name("port")
                .short("p")
                .long("port")
                .value_name("PORT")
                .help("PLC Modbus TCP port (overrides config)")
                .takes_value(true)
                .global(true)
                .validator(|v| match v.parse::<u16>() {
                    Ok(_) => Ok(()),
                    Err(_) => Err("Port must be a number between 0 and 65535".into()),
                }),
        )
        .arg(
            Arg::with_name("config")
                .short("c")
                .long("config")
                .value_name("FILE")
                .help("JSON configuration file")
                .takes_value(true)
                .global(true),
        )
        .arg(
            Arg::with_name("format")
                .short("f")
                .long("format")
                .value_name("FORMAT")
                .help("Output format")
                .takes_value(true)
                .possible_values(&["json", "table"])
                .default_value("table")
                .global(true),
        )
        .arg(
            Arg::with_name("verbose")
                .short("v")
                .long("verbose")
                .help("Enable debug logging")
                .global(true),
        )
        .subcommand(
            SubCommand::with_name("status")
                .about("📊 Read one snapshot of all coils and registers"),
        )
        .subcommand(
            SubCommand::with_name("watch")
                .about("📈 Stream snapshots from the monitor loop")
                .arg(
                    Arg::with_name("count")
                        .short("n")
                        .long("count")
                        .value_name("N")
                        .help("Stop after N snapshots (default: until Ctrl+C)")
                        .takes_value(true)
                        .validator(|v| match v.parse::<u64>() {
                            Ok(_) => Ok(()),
                            Err(_) => Err("Count must be a number".into()),
                        }),
                ),
        )
        .subcommand(SubCommand::with_name("start").about("▶️  Pulse the start button"))
        .subcommand(SubCommand::with_name("estop").about("🛑 Assert emergency stop"))
        .subcommand(SubCommand::with_name("reset").about("🔄 Release emergency stop"))
        .subcommand(
            SubCommand::with_name("adjust")
                .about("🎚️  Nudge a simulated process parameter")
                .arg(
                    Arg::with_name("parameter")
                        .help("Parameter to adjust")
                        .required(true)
                        .possible_values(&["pressure", "flow", "turbidity", "level"]),
                )
                .arg(
                    Arg::with_name("direction")
                        .help("Direction")
                        .required(true)
                        .possible_values(&["up", "down"]),
                )
                .arg(
                    Arg::with_name("steps")
                        .short("s")
                        .long("steps")
                        .value_name("N")
                        .help("Number of pulses")
                        .takes_value(true)
                        .default_value("1")
                        .validator(|v| match v.parse::<u32>() {
                            Ok(_) => Ok(()),
                            Err(_) => Err("Steps must be a number".into()),
                        }),
                ),
        )
        .subcommand(
            SubCommand::with_name("scenario")
                .about("🧪 Run a built-in test scenario")
                .arg(
                    Arg::with_name("name")
                        .help("Scenario name (see `aquavisor scenarios`)")
                        .required(true),
                ),
        )
        .subcommand(SubCommand::with_name("scenarios").about("📋 List built-in scenarios"))
        .get_matches();

    let verbose = matches.is_present("verbose");
    tracing_subscriber::fmt()
        .with_max_level(if verbose { Level::DEBUG } else { Level::INFO })
        .init();

    let format = matches.value_of("format").unwrap_or("table");
    let config = load_config(&matches)?;

    match matches.subcommand() {
        ("scenarios", _) => print_scenarios(format)?,
        ("status", _) => handle_status(config, format).await?,
        ("watch", Some(sub_matches)) => handle_watch(sub_matches, config, format).await?,
        ("start", _) => handle_control(config, ControlAction::Start, format).await?,
        ("estop", _) => handle_control(config, ControlAction::EmergencyStop, format).await?,
        ("reset", _) => handle_control(config, ControlAction::Reset, format).await?,
        ("adjust", Some(sub_matches)) => {
            let action = ControlAction::AdjustParameter {
                parameter: sub_matches.value_of("parameter").unwrap_or_default().to_string(),
                direction: sub_matches.value_of("direction").unwrap_or_default().to_string(),
                steps: sub_matches.value_of("steps").unwrap_or("1").parse()?,
            };
            handle_control(config, action, format).await?;
        }
        ("scenario", Some(sub_matches)) => {
            let action = ControlAction::Scenario {
                scenario: sub_matches.value_of("name").unwrap_or_default().to_string(),
            };
            handle_control(config, action, format).await?;
        }
        _ => {
            println!("{}", "No command specified. Use --help for usage information.".yellow());
        }
    }

    Ok(())
}

fn load_config(matches: &ArgMatches<'_>) -> Result<SupervisorConfig, Box<dyn std::error::Error>> {
    let mut config = match matches.value_of("config") {
        Some(path) => SupervisorConfig::from_file(path)?,
        None => SupervisorConfig::default(),
    };
    if let Some(host) = matches.value_of("host") {
        config.host = host.to_string();
    }
    if let Some(port) = matches.value_of("port") {
        config.port = port.parse()?;
    }
    config.validate()?;
    Ok(config)
}

async fn connect(config: SupervisorConfig) -> Result<Supervisor, Box<dyn std::error::Error>> {
    let hub = Arc::new(SnapshotHub::new(config.subscriber_buffer));
    println!("{} {}", "Connecting to".dimmed(), config.endpoint());
    Ok(Supervisor::connect(config, hub).await?)
}

async fn handle_status(config: SupervisorConfig, format: &str) -> Result<(), Box<dyn std::error::Error>> {
    let supervisor = connect(config).await?;
    let snapshot = supervisor.snapshot().await;
    supervisor.disconnect().await;

    print_snapshot(&snapshot?, format)
}

async fn handle_watch(
    matches: &ArgMatches<'_>,
    config: SupervisorConfig,
    format: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let limit = matches.value_of("count").map(str::parse::<u64>).transpose()?;
    let supervisor = connect(config).await?;

    let (_id, mut snapshots) = supervisor.subscribe();
    supervisor.start_monitoring().await;
    println!("{}", "📡 Watching PLC state (Press Ctrl+C to stop)...".bright_blue().bold());

    let mut seen = 0u64;
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            snapshot = snapshots.recv() => {
                let Some(snapshot) = snapshot else { break };
                print_snapshot(&snapshot, format)?;
                seen += 1;
                if limit.is_some_and(|limit| seen >= limit) {
                    break;
                }
            }
        }
    }

    supervisor.disconnect().await;
    Ok(())
}

async fn handle_control(
    config: SupervisorConfig,
    action: ControlAction,
    format: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let supervisor = connect(config).await?;
    let result = supervisor.control(&action).await;
    supervisor.disconnect().await;

    match format {
        "json" => {
            let body = match &result {
                Ok(()) => serde_json::json!({ "success": true }),
                Err(e) => serde_json::json!({ "success": false, "message": e.to_string() }),
            };
            println!("{body}");
        }
        _ => match &result {
            Ok(()) => println!("{} {:?}", "✅".green(), action),
            Err(e) => println!("{} {}", "❌".red(), e.to_string().bright_red()),
        },
    }

    result.map_err(Into::into)
}

fn print_scenarios(format: &str) -> Result<(), Box<dyn std::error::Error>> {
    if format == "json" {
        let list: Vec<_> = Scenario::ALL
            .iter()
            .map(|s| serde_json::json!({ "name": s.name(), "description": s.description() }))
            .collect();
        println!("{}", serde_json::to_string_pretty(&list)?);
        return Ok(());
    }

    println!("{}", "Built-in scenarios".bright_blue().bold());
    for scenario in Scenario::ALL {
        println!("  {:<16} {}", scenario.name().bright_cyan(), scenario.description());
    }
    Ok(())
}

fn print_snapshot(snapshot: &StateSnapshot, format: &str) -> Result<(), Box<dyn std::error::Error>> {
    if format == "json" {
        println!("{}", serde_json::to_string(snapshot)?);
        return Ok(());
    }

    let stamp = snapshot.timestamp.format("%H:%M:%S%.3f").to_string();
    if !snapshot.connected {
        println!("{} {}", stamp.dimmed(), "PLC not responding".bright_red());
        return Ok(());
    }

    println!("{} {}", stamp.dimmed(), "Process state".bright_blue().bold());
    for (name, value) in &snapshot.registers {
        println!("  {:<18} {}", name.bright_white(), value);
    }

    let on: Vec<&str> = snapshot
        .coils
        .iter()
        .filter(|(_, on)| **on)
        .map(|(name, _)| *name)
        .collect();
    println!("  {:<18} {}", "coils on".bright_white(), on.join(", "));

    if snapshot.alerts.is_empty() {
        println!("  {}", "No active alerts".bright_green());
    } else {
        for alert in &snapshot.alerts {
            println!("  {} {}", "⚠️".yellow(), alert.name().bright_red());
        }
    }
    Ok(())
}
