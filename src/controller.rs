use crate::config::BcConfig;
use crate::display::levels::Direction;
use crate::display::{Display, SetReport};
use crate::driver::Channel;
use std::mem::take;
use std::sync::mpsc::TryRecvError;
use std::sync::{mpsc, Arc, RwLock};
use std::thread;
use std::thread::JoinHandle;

#[derive(Debug)]
pub enum Message {
    Shutdown,
    /// Re-create the channels, e.g. after the display configuration changed
    Refresh(&'static str),
    Set(u32, &'static str),
    Step { direction: Direction, cycle: bool },
    Adjust(i32),
    /// Brightness was changed outside of this application
    Changed(u32, &'static str),
}

#[derive(Debug, Clone, Default)]
pub struct DisplayState {
    pub current: Option<u32>,
    pub levels: Vec<u32>,
    pub last_report: Option<SetReport>,
}

pub struct BrightnessController {
    pub sender: mpsc::Sender<Message>,
    pub state: Arc<RwLock<DisplayState>>,
    join_handle: Option<JoinHandle<()>>,
}

impl BrightnessController {
    /// `create_channels` runs on the worker thread, so channels may hold thread affine
    /// resources such as COM interfaces.
    pub fn start<C, F>(
        config: Arc<RwLock<BcConfig>>,
        create_channels: C,
        on_update: F,
    ) -> BrightnessController
    where
        C: Fn() -> Vec<Box<dyn Channel>> + Send + 'static,
        F: Fn() + Send + 'static,
    {
        let (sender, receiver) = mpsc::channel();
        let state = Arc::new(RwLock::new(DisplayState::default()));
        let cloned = state.clone();
        let join_handle = thread::spawn(move || {
            run(config, create_channels, receiver, cloned, on_update);
        });
        BrightnessController {
            sender,
            state,
            join_handle: Some(join_handle),
        }
    }

    pub fn send(&self, message: Message) {
        if let Err(e) = self.sender.send(message) {
            log::error!("BrightnessController is not running: {}", e);
        }
    }

    pub fn current(&self) -> Option<u32> {
        self.state.read().unwrap().current
    }
}

impl Drop for BrightnessController {
    fn drop(&mut self) {
        self.send(Message::Shutdown);
        if let Some(handle) = take(&mut self.join_handle) {
            if handle.join().is_err() {
                log::error!("BrightnessController thread panicked");
            }
        }
        log::debug!("Stopped BrightnessController");
    }
}

fn run<C, F>(
    config: Arc<RwLock<BcConfig>>,
    create_channels: C,
    receiver: mpsc::Receiver<Message>,
    state: Arc<RwLock<DisplayState>>,
    on_update: F,
) where
    C: Fn() -> Vec<Box<dyn Channel>>,
    F: Fn(),
{
    log::info!("Starting BrightnessController");
    let mut display = Display::probe(create_channels());
    let mut pending: Option<Message> = None;

    loop {
        // Publish the latest state
        {
            let config = config.read().unwrap();
            let mut state = state.write().unwrap();
            state.current = display.current();
            state.levels = display.levels(&config);
        }
        on_update();

        let message = match pending.take() {
            Some(message) => message,
            None => match receiver.recv() {
                Ok(message) => message,
                Err(_) => panic!("Unexpected disconnection"),
            },
        };

        let report = match message {
            Message::Shutdown => {
                log::info!("Stopping BrightnessController");
                break;
            }
            Message::Refresh(src) => {
                log::info!("Refreshing due to '{src}'");
                display = Display::probe(create_channels());
                None
            }
            Message::Set(percent, src) => {
                log::info!("Setting brightness to {percent}% due to '{src}'");
                Some(display.set(percent))
            }
            Message::Step { direction, cycle } => {
                let levels = display.levels(&config.read().unwrap());
                let report = display.step(&levels, direction, cycle);
                if report.is_none() {
                    log::info!("No brightness level to step to {:?}", direction);
                }
                report
            }
            Message::Adjust(delta) => {
                let (delta, next) = coalesce_adjust(delta, &receiver);
                pending = next;
                log::debug!("Adjusting brightness by {delta}");
                Some(display.adjust(delta))
            }
            Message::Changed(percent, src) => {
                if display.external_change(percent) {
                    log::info!("Brightness changed to {percent}% by '{src}'");
                }
                None
            }
        };

        if let Some(report) = report {
            state.write().unwrap().last_report = Some(report);
        }
    }
}

/// Folds any `Adjust` messages already queued into `delta`.
/// Returns the first non-adjust message received, which must be handled next.
fn coalesce_adjust(mut delta: i32, receiver: &mpsc::Receiver<Message>) -> (i32, Option<Message>) {
    loop {
        match receiver.try_recv() {
            Ok(Message::Adjust(d)) => delta = delta.saturating_add(d),
            Ok(other) => return (delta, Some(other)),
            Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => return (delta, None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::display::scale::NativeRange;
    use crate::driver::mock::{MockChannel, MockState};
    use crate::driver::ChannelKind;
    use std::sync::Mutex;
    use std::time::Duration;

    fn start(
        current: u32,
    ) -> (
        BrightnessController,
        Arc<Mutex<MockState>>,
        mpsc::Receiver<()>,
    ) {
        let state = Arc::new(Mutex::new(MockState {
            current: Some(current),
            ..Default::default()
        }));
        let shared = state.clone();
        let (tx, updates) = mpsc::channel();
        let tx = Mutex::new(tx);
        let controller = BrightnessController::start(
            Arc::new(RwLock::new(BcConfig::default())),
            move || {
                vec![Box::new(MockChannel {
                    kind: ChannelKind::Ddc,
                    range: NativeRange::PERCENT,
                    writes_percent: false,
                    state: shared.clone(),
                }) as Box<dyn Channel>]
            },
            move || {
                let _ = tx.lock().unwrap().send(());
            },
        );
        // Initial probe
        updates.recv_timeout(Duration::from_secs(5)).unwrap();
        (controller, state, updates)
    }

    fn wait(updates: &mpsc::Receiver<()>) {
        updates.recv_timeout(Duration::from_secs(5)).unwrap();
    }

    #[test]
    fn publishes_probed_state() {
        let (controller, _, _updates) = start(30);
        let state = controller.state.read().unwrap().clone();
        assert_eq!(state.current, Some(30));
        assert_eq!(state.levels, vec![0, 10, 30, 60, 100]);
        assert!(state.last_report.is_none());
    }

    #[test]
    fn set_and_step() {
        let (controller, mock, updates) = start(30);
        controller.send(Message::Set(45, "test"));
        wait(&updates);
        assert_eq!(controller.current(), Some(45));
        controller.send(Message::Step {
            direction: Direction::Forward,
            cycle: false,
        });
        wait(&updates);
        assert_eq!(controller.current(), Some(60));
        assert_eq!(mock.lock().unwrap().writes, vec![45, 60]);
        let report = controller.state.read().unwrap().last_report.clone().unwrap();
        assert_eq!(report.brightness, 60);
    }

    #[test]
    fn step_past_last_level_without_cycle_reapplies() {
        let (controller, mock, updates) = start(100);
        controller.send(Message::Step {
            direction: Direction::Forward,
            cycle: false,
        });
        wait(&updates);
        assert_eq!(controller.current(), Some(100));
        assert_eq!(mock.lock().unwrap().writes, vec![100]);
    }

    #[test]
    fn external_change_is_recorded_without_writing() {
        let (controller, mock, updates) = start(30);
        controller.send(Message::Changed(80, "test"));
        wait(&updates);
        assert_eq!(controller.current(), Some(80));
        assert!(mock.lock().unwrap().writes.is_empty());
    }

    #[test]
    fn echo_of_own_write_does_not_move_the_step_base() {
        let (controller, mock, updates) = start(30);
        controller.send(Message::Set(10, "test"));
        wait(&updates);
        controller.send(Message::Changed(11, "test"));
        wait(&updates);
        assert_eq!(controller.current(), Some(10));
        controller.send(Message::Step {
            direction: Direction::Backward,
            cycle: false,
        });
        wait(&updates);
        assert_eq!(controller.current(), Some(0));
        assert_eq!(mock.lock().unwrap().writes, vec![10, 0]);
    }

    #[test]
    fn refresh_reprobes_channels() {
        let (controller, mock, updates) = start(30);
        mock.lock().unwrap().current = Some(70);
        controller.send(Message::Refresh("test"));
        wait(&updates);
        assert_eq!(controller.current(), Some(70));
    }

    #[test]
    fn coalesces_queued_adjustments() {
        let (tx, rx) = mpsc::channel();
        tx.send(Message::Adjust(10)).unwrap();
        tx.send(Message::Adjust(-5)).unwrap();
        tx.send(Message::Set(1, "test")).unwrap();
        tx.send(Message::Adjust(10)).unwrap();
        let (delta, next) = coalesce_adjust(10, &rx);
        assert_eq!(delta, 15);
        assert!(matches!(next, Some(Message::Set(1, _))));
        let (delta, next) = coalesce_adjust(0, &rx);
        assert_eq!(delta, 10);
        assert!(next.is_none());
    }

    #[test]
    fn adjust_clamps() {
        let (controller, _, updates) = start(95);
        controller.send(Message::Adjust(10));
        wait(&updates);
        assert_eq!(controller.current(), Some(100));
    }
}
