//! Names, directories and logging shared by the tray and CLI binaries

use anyhow::Context;
use log::LevelFilter;
use simplelog::{
    ColorChoice, CombinedLogger, Config, ConfigBuilder, SharedLogger, TermLogger, TerminalMode,
    WriteLogger,
};
use std::fs;
use std::fs::File;
use std::path::{Path, PathBuf};

pub const APP_NAME: &str = "Brightness Control";

pub const APP_DIRECTORY_NAME: &str = "brightness-control";

pub const HOME_PAGE: &str = "https://github.com/poulicek/BrightnessControl";

const LOG_FILE_NAME: &str = "log.txt";

/// Creates (if needed) and returns this application's folder inside `base`
fn app_directory(base: Option<PathBuf>, kind: &str) -> anyhow::Result<PathBuf> {
    let path = base
        .with_context(|| format!("The {kind} directory is unknown on this system"))?
        .join(APP_DIRECTORY_NAME);
    fs::create_dir_all(&path).with_context(|| format!("Unable to create {:?}", path))?;
    Ok(path)
}

/// Holds the log file
pub fn local_data_directory() -> anyhow::Result<PathBuf> {
    app_directory(dirs::data_local_dir(), "local data")
}

/// Holds `config.json`
pub fn config_directory() -> anyhow::Result<PathBuf> {
    app_directory(dirs::config_local_dir(), "local config")
}

pub fn get_log_path() -> anyhow::Result<PathBuf> {
    Ok(local_data_directory()?.join(LOG_FILE_NAME))
}

fn log_config() -> Config {
    // The tray and menu crates log every window message at debug level
    ConfigBuilder::default()
        .add_filter_ignore_str("tray_icon")
        .add_filter_ignore_str("muda")
        .set_target_level(LevelFilter::Debug)
        .build()
}

fn file_logger(filter: LevelFilter, path: &Path) -> anyhow::Result<Box<dyn SharedLogger>> {
    let file = File::create(path).with_context(|| format!("Unable to create log file {:?}", path))?;
    Ok(WriteLogger::new(filter, log_config(), file))
}

/// Logs to stderr, and to [get_log_path] when `to_disk` is set (the tray binary has no console)
pub fn install_logger(debug: bool, to_disk: bool) -> anyhow::Result<()> {
    let filter = match debug {
        true => LevelFilter::Debug,
        false => LevelFilter::Info,
    };
    let mut loggers: Vec<Box<dyn SharedLogger>> = vec![TermLogger::new(
        filter,
        log_config(),
        TerminalMode::Stderr,
        ColorChoice::Auto,
    )];
    if to_disk {
        loggers.push(file_logger(filter, &get_log_path()?)?);
    }
    CombinedLogger::init(loggers).context("A logger is already installed")?;
    if debug {
        log::warn!("Debug logging enabled");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn app_directory_is_created_inside_base() {
        let base = tempfile::tempdir().unwrap();
        let path = app_directory(Some(base.path().to_owned()), "test").unwrap();
        assert_eq!(path, base.path().join(APP_DIRECTORY_NAME));
        assert!(path.is_dir());
    }

    #[test]
    fn unknown_base_is_an_error() {
        let err = app_directory(None, "local config").unwrap_err();
        assert!(err.to_string().contains("local config"));
    }
}
