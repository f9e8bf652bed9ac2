//! Entry point for CLI driven application
use anyhow::Context;
use brightness_control::common::{install_logger, APP_NAME};
use brightness_control::config::BcConfig;
use brightness_control::controller::BrightnessController;
use brightness_control::display::levels::Direction;
use brightness_control::display::{Display, SetReport};
use brightness_control::driver::{create_channels, ChannelOptions};
use brightness_control::{power, startup};
use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::{mpsc, Arc, RwLock};

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,
    /// Override the config file path
    #[arg(long)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the brightness reported by each channel
    Status,
    /// Print the configured brightness levels
    Levels,
    /// Set the brightness of all monitors
    Set {
        #[arg(value_parser = clap::value_parser!(u32).range(0..=100))]
        percent: u32,
    },
    /// Step to the next brightness level
    Step {
        #[arg(short, long)]
        backward: bool,
        /// Wrap around at the end of the level list
        #[arg(short, long)]
        cycle: bool,
    },
    /// Change the brightness by a relative amount
    Adjust {
        #[arg(allow_hyphen_values = true)]
        delta: i32,
    },
    /// Turn the screens off
    TurnOff,
    /// Inspect or change whether the tray application starts with Windows
    Startup {
        #[arg(value_enum, default_value_t = StartupAction::Status)]
        action: StartupAction,
    },
    /// Log brightness changes until Ctrl-C is pressed
    Watch,
    /// Print volume and mute changes until Ctrl-C is pressed
    WatchVolume,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum StartupAction {
    Status,
    Enable,
    Disable,
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    let pretty = serde_json::to_string_pretty(value).context("Unable to serialize output")?;
    println!("{}", pretty);
    Ok(())
}

/// Prints the report, failing when no device accepted the new brightness
fn print_report(report: &SetReport) -> anyhow::Result<()> {
    print_json(report)?;
    anyhow::ensure!(report.succeeded(), "No monitor accepted the brightness");
    Ok(())
}

fn probe(config: &BcConfig) -> Display {
    Display::probe(create_channels(ChannelOptions::from(config)))
}

fn run(args: Args) -> anyhow::Result<()> {
    log::info!(
        "Starting {} (CLI), version: {}",
        APP_NAME,
        env!("CARGO_PKG_VERSION")
    );
    let config = BcConfig::load_or_default(args.config).context("Unable to load config file")?;
    match args.command {
        Command::Status => {
            let mut display = probe(&config);
            print_json(&display.status())?;
        }
        Command::Levels => {
            let display = probe(&config);
            print_json(&display.levels(&config))?;
        }
        Command::Set { percent } => {
            print_report(&probe(&config).set(percent))?;
        }
        Command::Step { backward, cycle } => {
            let mut display = probe(&config);
            let levels = display.levels(&config);
            let cycle = cycle || config.cycle;
            match display.step(&levels, Direction::from_forward(!backward), cycle) {
                Some(report) => print_report(&report)?,
                None => anyhow::bail!("The current brightness is unknown"),
            }
        }
        Command::Adjust { delta } => {
            print_report(&probe(&config).adjust(delta))?;
        }
        Command::TurnOff => power::turn_off_screens()?,
        Command::Startup { action } => {
            match action {
                StartupAction::Status => {}
                StartupAction::Enable => startup::set_enabled(true)?,
                StartupAction::Disable => startup::set_enabled(false)?,
            }
            println!("Start with Windows: {}", startup::is_enabled()?);
        }
        Command::Watch => watch(config)?,
        Command::WatchVolume => watch_volume()?,
    }
    Ok(())
}

fn watch(config: BcConfig) -> anyhow::Result<()> {
    // true for a controller update, false for Ctrl-C
    let (tx, rx) = mpsc::channel();
    let ctrlc_tx = tx.clone();
    ctrlc::set_handler(move || {
        let _ = ctrlc_tx.send(false);
    })
    .context("Error setting Ctrl-C handler")?;

    let options = ChannelOptions::from(&config);
    let config = Arc::new(RwLock::new(config));
    let controller = BrightnessController::start(
        config.clone(),
        move || create_channels(options),
        move || {
            let _ = tx.send(true);
        },
    );
    #[cfg(windows)]
    let _watching = (
        brightness_control::unique::BcUniqueInstance::try_acquire()?,
        brightness_control::event_watcher::EventWatcher::start(
            &controller,
            &config.read().unwrap(),
        )?,
    );

    let mut shown = None;
    while let Ok(true) = rx.recv() {
        let current = controller.current();
        if shown != Some(current) {
            match current {
                Some(c) => println!("Brightness: {}%", c),
                None => println!("Brightness: unknown"),
            }
            shown = Some(current);
        }
    }
    Ok(())
}

#[cfg(windows)]
fn watch_volume() -> anyhow::Result<()> {
    use brightness_control::driver::windows::initialize_com;
    use brightness_control::volume::{VolumeEvent, VolumeWatcher};

    initialize_com()?;
    let (tx, rx) = mpsc::channel();
    let ctrlc_tx = tx.clone();
    ctrlc::set_handler(move || {
        let _ = ctrlc_tx.send(None);
    })
    .context("Error setting Ctrl-C handler")?;

    let (events_tx, events_rx) = mpsc::channel();
    let mut watcher = VolumeWatcher::start(events_tx)?;
    println!("{}", watcher.current()?);
    std::thread::spawn(move || {
        for event in events_rx {
            if tx.send(Some(event)).is_err() {
                break;
            }
        }
    });
    while let Ok(Some(event)) = rx.recv() {
        match event {
            VolumeEvent::Changed(state) => println!("{}", state),
            VolumeEvent::DefaultDeviceChanged => {
                log::info!("Default playback device changed");
                watcher.rebind()?;
            }
        }
    }
    Ok(())
}

#[cfg(not(windows))]
fn watch_volume() -> anyhow::Result<()> {
    Err(brightness_control::volume::Error::Unsupported.into())
}

fn main() {
    let args: Args = Args::parse();

    // Setup logging
    if let Err(e) = install_logger(args.debug, false) {
        eprintln!("Unable to install logger: {:#}", e);
        std::process::exit(1);
    }
    // Run the application logic
    if let Err(e) = run(args) {
        log::error!("{:#}", e);
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use brightness_control::display::ChannelReport;
    use brightness_control::driver::{ChannelKind, DeviceOutcome};

    fn report(error: Option<&str>) -> SetReport {
        SetReport {
            brightness: 30,
            channels: vec![ChannelReport {
                channel: ChannelKind::Ddc,
                devices: vec![DeviceOutcome {
                    device: "Generic PnP Monitor".to_owned(),
                    native_value: error.is_none().then_some(30),
                    error: error.map(str::to_owned),
                }],
                error: None,
            }],
        }
    }

    #[test]
    fn report_fails_when_every_device_failed() {
        assert!(print_report(&report(None)).is_ok());
        assert!(print_report(&report(Some("I2C error"))).is_err());
    }

    #[test]
    fn parses_negative_adjust_and_backward_step() {
        let args = Args::try_parse_from(["bc-cli", "adjust", "-10"]).unwrap();
        assert!(matches!(args.command, Command::Adjust { delta: -10 }));
        let args = Args::try_parse_from(["bc-cli", "step", "--backward"]).unwrap();
        assert!(matches!(
            args.command,
            Command::Step {
                backward: true,
                cycle: false
            }
        ));
    }
}
