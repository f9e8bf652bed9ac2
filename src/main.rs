//! Entry point for the tray application
#![cfg_attr(windows, windows_subsystem = "windows")]

cfg_if::cfg_if! {
    if #[cfg(windows)] {
        use brightness_control::common::{install_logger, APP_NAME};
        use brightness_control::config::BcConfig;
        use brightness_control::controller::BrightnessController;
        use brightness_control::driver::windows::{initialize_com, initialize_com_security};
        use brightness_control::driver::{create_channels, ChannelOptions};
        use brightness_control::event_watcher::EventWatcher;
        use brightness_control::tray;
        use brightness_control::unique::BcUniqueInstance;
        use clap::Parser;
        use std::panic::PanicInfo;
        use std::path::PathBuf;
        use std::sync::{Arc, RwLock};
        use windows::core::HSTRING;
        use windows::Win32::UI::WindowsAndMessaging::{MessageBoxW, MB_ICONSTOP, MB_OK};

        #[derive(Parser, Debug)]
        #[command(author, version, about)]
        struct Args {
            /// Enable debug logging
            #[arg(short, long)]
            debug: bool,
            /// Override the config file path
            #[arg(long)]
            config: Option<PathBuf>,
        }

        fn show_error(title: &str, text: &str) {
            unsafe {
                MessageBoxW(None, &HSTRING::from(text), &HSTRING::from(title), MB_OK | MB_ICONSTOP);
            }
        }

        fn handle_panic(info: &PanicInfo) {
            log::error!("Panic: {}", info);
            show_error("Fatal Error", &info.to_string());
            std::process::exit(1);
        }

        fn run(args: Args) -> anyhow::Result<()> {
            log::info!("Starting {}, version: {}", APP_NAME, env!("CARGO_PKG_VERSION"));
            initialize_com()?;
            initialize_com_security();

            let config = BcConfig::load_or_default(args.config)?;
            let options = ChannelOptions::from(&config);
            let config = Arc::new(RwLock::new(config));
            let notify = tray::NotifyWindow::create()?;
            let controller = BrightnessController::start(
                config.clone(),
                move || create_channels(options),
                notify.waker(),
            );
            let _event_watcher = EventWatcher::start(&controller, &config.read().unwrap())
                .map_err(|e| log::error!("Unable to start EventWatcher: {:#}", e))
                .ok();

            tray::run(&controller, config, notify)?;
            log::info!("Program exiting gracefully");
            Ok(())
        }

        fn main() {
            let args = Args::parse();
            std::panic::set_hook(Box::new(handle_panic));

            // Check this is the only instance running
            let _unique_instance = match BcUniqueInstance::try_acquire() {
                Ok(i) => i,
                Err(e) => {
                    eprintln!("{}", e);
                    std::process::exit(1);
                }
            };

            // Setup logging
            if let Err(e) = install_logger(args.debug, true) {
                show_error(APP_NAME, &format!("Unable to install logger: {:#}", e));
                std::process::exit(1);
            }

            if let Err(e) = run(args) {
                log::error!("{:#}", e);
                show_error(APP_NAME, &format!("{:#}", e));
                std::process::exit(1);
            }
        }
    } else {
        fn main() {
            eprintln!("The tray application is only available on Windows, use bc-cli instead");
            std::process::exit(1);
        }
    }
}
