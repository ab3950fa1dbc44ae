//! Tapcue CLI - Command-line interface
//!
//! Drives tap devices from the terminal: port discovery, single commands,
//! one-off tap cycles and full experiment runs.

use anyhow::{anyhow, Context};
use clap::{ArgAction, Parser, Subcommand};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::io;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::atomic::Ordering;
use tapcue_core::cli::{
    feedback_lines, format_tap_result, print_exit_codes, progress_line, CliResult, ExitCodes,
    OutputFormat,
};
use tapcue_core::config::{self, AppConfig};
use tapcue_core::core::device::{finger_from_index, DeviceSession};
use tapcue_core::core::experiment::{
    build_stimuli, shuffle_stimuli, stimulus_block, Experiment, Hand,
};
use tapcue_core::core::simulator::SimulatedDevice;
use tapcue_core::core::transport::{list_ports as available_ports, LineChannel, SerialLineChannel};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

type Session = DeviceSession<Box<dyn LineChannel>>;

/// Tapcue CLI
#[derive(Parser, Debug)]
#[command(
    name = "tapcue",
    author = "Tapcue Team",
    version,
    about = "Cue finger taps and measure responses with serial tap devices",
    long_about = None
)]
struct Cli {
    /// Output format
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Text, global = true)]
    format: OutputFormat,

    /// Verbose output (-v debug, -vv trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    /// Quiet mode (errors only)
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Config file (defaults to the platform config directory)
    #[arg(long, env = "TAPCUE_CONFIG", global = true)]
    config: Option<PathBuf>,

    /// Use a simulated device instead of the serial port
    #[arg(long, global = true)]
    simulate: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// List available serial ports
    ListPorts {
        /// Show detailed info
        #[arg(short, long)]
        detailed: bool,
    },

    /// Check that a device answers
    Ping {
        /// Hand whose device to use
        #[arg(long, default_value = "right")]
        hand: Hand,

        /// Serial port, overriding the configured one
        #[arg(short, long)]
        port: Option<String>,
    },

    /// Push the configured device settings
    Configure {
        /// Hand whose device to use
        #[arg(long, default_value = "right")]
        hand: Hand,

        /// Serial port, overriding the configured one
        #[arg(short, long)]
        port: Option<String>,
    },

    /// Set up (calibrate) fingers
    Setup {
        /// Hand whose device to use
        #[arg(long, default_value = "right")]
        hand: Hand,

        /// Serial port, overriding the configured one
        #[arg(short, long)]
        port: Option<String>,

        /// Fingers, 1 (thumb) - 5 (pinky)
        #[arg(required = true, value_delimiter = ',')]
        fingers: Vec<u8>,
    },

    /// Configure, set up one finger and run a single tap cycle
    Tap {
        /// Hand whose device to use
        #[arg(long, default_value = "right")]
        hand: Hand,

        /// Serial port, overriding the configured one
        #[arg(short, long)]
        port: Option<String>,

        /// Finger to cue, 1 (thumb) - 5 (pinky)
        finger: u8,
    },

    /// Run a full experiment with the configured hands
    Run {
        /// Participant code
        #[arg(long)]
        participant: Option<String>,

        /// Test number (0 for practice, nothing saved)
        #[arg(long)]
        test_number: Option<u32>,

        /// Participant's dominant hand
        #[arg(long)]
        dominant_hand: Option<Hand>,

        /// Hand pose, free text
        #[arg(long)]
        hand_pose: Option<String>,

        /// Trials per finger
        #[arg(long)]
        trials: Option<u32>,

        /// Do not show feedback after each trial
        #[arg(long)]
        no_feedback: bool,

        /// Data folder
        #[arg(long)]
        data_dir: Option<PathBuf>,

        /// Seed for the trial order
        #[arg(long)]
        seed: Option<u64>,
    },

    /// Show or create the configuration file
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },

    /// Print the exit code table
    ExitCodes,
}

#[derive(Subcommand, Debug)]
enum ConfigAction {
    /// Print the effective configuration
    Show,
    /// Write the default configuration
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
    /// Print the config file path
    Path,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match load_config(&cli) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("Error: {:#}", err);
            return CliResult::from_anyhow(&err).to_exit_code();
        }
    };
    let _guard = init_tracing(&cli, &config);

    let result = match dispatch(&cli, &config) {
        Ok(result) => result,
        Err(err) => {
            tracing::debug!("{:?}", err);
            let result = CliResult::from_anyhow(&err);
            CliResult::error(result.code(), format!("{:#}", err))
        }
    };

    match &result {
        CliResult::Error(_, msg) => eprintln!("Error: {}", msg),
        CliResult::Success(Some(msg)) if !cli.quiet => eprintln!("{}", msg),
        CliResult::Success(_) => {}
    }
    result.to_exit_code()
}

fn load_config(cli: &Cli) -> anyhow::Result<AppConfig> {
    Ok(match &cli.config {
        Some(path) => AppConfig::load_from(path)?,
        None => AppConfig::load()?,
    })
}

fn init_tracing(cli: &Cli, config: &AppConfig) -> Option<WorkerGuard> {
    let level = if cli.quiet {
        "warn"
    } else {
        match cli.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    };
    let device = if config.logging.print_device_messages || cli.verbose > 0 {
        "debug"
    } else {
        "warn"
    };
    let directives = format!("{},tapcue::device={}", level, device);
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(directives));

    let stderr_layer = fmt::layer().with_writer(io::stderr).with_target(false);

    let log_dir = config.logging.directory.clone().or_else(tapcue_core::config::log_dir);
    let (file_layer, guard) = match (log_dir, config.logging.file_log) {
        (Some(dir), true) => {
            let appender = tracing_appender::rolling::daily(dir, "tapcue.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer().json().with_writer(writer);
            (Some(layer), Some(guard))
        }
        _ => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(stderr_layer)
        .with(file_layer)
        .init();
    guard
}

fn dispatch(cli: &Cli, config: &AppConfig) -> anyhow::Result<CliResult> {
    match &cli.command {
        Commands::ListPorts { detailed } => list_ports(cli, *detailed),
        Commands::Ping { hand, port } => ping(cli, config, *hand, port.as_deref()),
        Commands::Configure { hand, port } => configure(cli, config, *hand, port.as_deref()),
        Commands::Setup {
            hand,
            port,
            fingers,
        } => setup(cli, config, *hand, port.as_deref(), fingers),
        Commands::Tap { hand, port, finger } => tap(cli, config, *hand, port.as_deref(), *finger),
        Commands::Run {
            participant,
            test_number,
            dominant_hand,
            hand_pose,
            trials,
            no_feedback,
            data_dir,
            seed,
        } => {
            let mut settings = config.experiment.clone();
            if let Some(participant) = participant {
                settings.participant.clone_from(participant);
            }
            if let Some(test_number) = test_number {
                settings.test_number = *test_number;
            }
            if let Some(hand) = dominant_hand {
                settings.dominant_hand = *hand;
            }
            if let Some(pose) = hand_pose {
                settings.hand_pose.clone_from(pose);
            }
            if let Some(trials) = trials {
                settings.trials_per_finger = *trials;
            }
            if let Some(dir) = data_dir {
                settings.data_dir.clone_from(dir);
            }
            if *no_feedback {
                settings.feedback = false;
            }
            let mut config = config.clone();
            config.experiment = settings;
            run_experiment(cli, &config, *seed)
        }
        Commands::Config { action } => handle_config(cli, config, action),
        Commands::ExitCodes => {
            print_exit_codes();
            Ok(CliResult::success())
        }
    }
}

fn open_session(cli: &Cli, config: &AppConfig, hand: Hand, port: Option<&str>) -> anyhow::Result<Session> {
    let channel: Box<dyn LineChannel> = if cli.simulate {
        Box::new(SimulatedDevice::new(hand.name()))
    } else {
        let port = port
            .map(str::to_string)
            .or_else(|| config.hand(hand).map(|h| h.port.clone()))
            .ok_or_else(|| anyhow!("no serial port configured for the {} hand", hand))?;
        if !cli.quiet {
            eprintln!("Connecting to {} @ {} baud...", port, config.serial.baud_rate);
        }
        let channel = SerialLineChannel::open(&port, &config.serial)
            .with_context(|| format!("opening {} for the {} hand", port, hand))?;
        Box::new(channel)
    };

    let session = DeviceSession::new(hand.name(), channel, config.cycle_limits());
    tracing::info!("Connected: {}", session.connection_info());
    Ok(session)
}

/// Open and ping; a silent device ends the command
fn open_alive(cli: &Cli, config: &AppConfig, hand: Hand, port: Option<&str>) -> anyhow::Result<Option<Session>> {
    let mut session = open_session(cli, config, hand, port)?;
    Ok(session.ping()?.then_some(session))
}

fn no_answer(hand: Hand) -> CliResult {
    CliResult::error(ExitCodes::TIMEOUT, format!("{} device did not answer ping", hand))
}

fn list_ports(cli: &Cli, detailed: bool) -> anyhow::Result<CliResult> {
    let ports = available_ports()?;

    if ports.is_empty() {
        if !cli.quiet {
            println!("No serial ports found.");
        }
        return Ok(CliResult::success());
    }

    match cli.format {
        OutputFormat::Json => {
            let json: Vec<serde_json::Value> = ports
                .iter()
                .map(|p| {
                    serde_json::json!({
                        "name": p.port_name,
                        "type": format!("{:?}", p.port_type)
                    })
                })
                .collect();
            println!("{}", serde_json::to_string_pretty(&json)?);
        }
        OutputFormat::Csv => {
            println!("name,type");
            for port in &ports {
                println!("{},{:?}", port.port_name, port.port_type);
            }
        }
        OutputFormat::Text => {
            if detailed {
                println!("Available Serial Ports:");
                println!("{:-<60}", "");
                for port in &ports {
                    println!("  {} [{:?}]", port.port_name, port.port_type);
                }
            } else {
                for port in &ports {
                    println!("{}", port.port_name);
                }
            }
        }
    }

    Ok(CliResult::success())
}

fn ping(cli: &Cli, config: &AppConfig, hand: Hand, port: Option<&str>) -> anyhow::Result<CliResult> {
    Ok(match open_alive(cli, config, hand, port)? {
        Some(_) => CliResult::success_with_message(format!("{} device answered", hand)),
        None => no_answer(hand),
    })
}

fn configure(cli: &Cli, config: &AppConfig, hand: Hand, port: Option<&str>) -> anyhow::Result<CliResult> {
    let Some(mut session) = open_alive(cli, config, hand, port)? else {
        return Ok(no_answer(hand));
    };
    session.configure(&config.device)?;

    let confirmed = session.configuration();
    match cli.format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(confirmed)?),
        _ => println!("{}", toml::to_string_pretty(confirmed)?),
    }
    Ok(CliResult::success())
}

fn setup(
    cli: &Cli,
    config: &AppConfig,
    hand: Hand,
    port: Option<&str>,
    fingers: &[u8],
) -> anyhow::Result<CliResult> {
    let fingers = fingers
        .iter()
        .map(|&i| finger_from_index(i))
        .collect::<Result<Vec<_>, _>>()?;

    let Some(mut session) = open_alive(cli, config, hand, port)? else {
        return Ok(no_answer(hand));
    };
    for finger in fingers {
        session.setup_finger(finger)?;
        if !cli.quiet {
            println!("{} set up", finger);
        }
    }
    Ok(CliResult::success())
}

fn tap(cli: &Cli, config: &AppConfig, hand: Hand, port: Option<&str>, finger: u8) -> anyhow::Result<CliResult> {
    let finger = finger_from_index(finger)?;

    let Some(mut session) = open_alive(cli, config, hand, port)? else {
        return Ok(no_answer(hand));
    };
    session.configure(&config.device)?;
    session.setup_finger(finger)?;

    let result = session.run_tap(finger)?;
    println!("{}", format_tap_result(&result, cli.format)?);

    let stats = session.stats();
    tracing::debug!(
        "{} commands, {} retries, {} discarded lines",
        stats.commands,
        stats.retries,
        stats.discarded
    );
    Ok(CliResult::success())
}

fn run_experiment(cli: &Cli, config: &AppConfig, seed: Option<u64>) -> anyhow::Result<CliResult> {
    let settings = &config.experiment;
    let mut stimuli = build_stimuli(&config.hands, settings.trials_per_finger)?;
    let mut rng = match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };
    let block_len = stimulus_block(&config.hands)?.len();
    shuffle_stimuli(&mut stimuli, block_len, &mut rng);

    let mut experiment = Experiment::new(settings.clone(), config.device.clone(), config.hands.clone())
        .with_serial(config.serial.clone(), config.logging.print_device_messages);
    let hands: Vec<_> = experiment.used_hands().cloned().collect();
    for hand in hands {
        let session = open_session(cli, config, hand.hand, Some(&hand.port))?;
        experiment.attach(hand.hand, session);
    }

    let stop = experiment.stop_flag();
    ctrlc::set_handler(move || {
        stop.store(true, Ordering::SeqCst);
    })?;

    experiment.prepare()?;

    let feedback = settings.feedback;
    let quiet = cli.quiet;
    let summary = experiment.run_with_cues(
        &stimuli,
        |_, _, stimulus| {
            if !quiet {
                println!("\nTap cued on {} {}", stimulus.hand, stimulus.finger);
            }
        },
        |outcome| {
            if quiet {
                return;
            }
            if feedback {
                for line in feedback_lines(outcome) {
                    println!("{}", line);
                }
            }
            println!("{}", progress_line(outcome));
        },
    )?;

    if !quiet {
        println!("\n=== EXPERIMENT FINISHED ===\n");
        match &summary.saved_to {
            Some(prefix) => println!("Data saved {}", prefix.display()),
            None => println!("Practice only, no data saved."),
        }
    }
    if cli.format == OutputFormat::Json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    }

    let message = format!(
        "{} of {} trials correct ({:.0}%)",
        summary.correct,
        summary.trials,
        summary.accuracy() * 100.0
    );
    Ok(if summary.cancelled {
        CliResult::cancelled(format!(
            "stopped after {} of {} trials; {}",
            summary.trials, summary.planned, message
        ))
    } else {
        CliResult::success_with_message(message)
    })
}

fn handle_config(cli: &Cli, config: &AppConfig, action: &ConfigAction) -> anyhow::Result<CliResult> {
    let path = match &cli.config {
        Some(path) => path.clone(),
        None => config::config_file().ok_or_else(|| anyhow!("Could not determine config directory"))?,
    };

    match action {
        ConfigAction::Show => {
            match cli.format {
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(config)?),
                _ => println!("{}", toml::to_string_pretty(config)?),
            }
            Ok(CliResult::success())
        }
        ConfigAction::Init { force } => {
            if path.exists() && !force {
                return Ok(CliResult::error(
                    ExitCodes::CONFIG_ERROR,
                    format!("{} already exists (use --force to overwrite)", path.display()),
                ));
            }
            config::init_directories()?;
            AppConfig::default().save_to(&path)?;
            Ok(CliResult::success_with_message(format!("Wrote {}", path.display())))
        }
        ConfigAction::Path => {
            println!("{}", path.display());
            Ok(CliResult::success())
        }
    }
}
