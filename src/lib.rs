pub mod common;
pub mod config;
pub mod controller;
pub mod display;
pub mod driver;
pub mod icon;
pub mod power;
pub mod startup;
pub mod volume;

cfg_if::cfg_if! {
    if #[cfg(windows)] {
        pub mod event_watcher;
        mod registry;
        pub mod tray;
        pub mod unique;
    }
}
