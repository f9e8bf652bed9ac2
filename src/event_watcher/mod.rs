//! Detects system events such as:
//! - Display configuration changes (monitors connected, disconnected or rearranged)
//! - Brightness changes made by the OS or other applications

mod windows;

pub use self::windows::EventWatcher;
