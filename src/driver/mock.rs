//! In-memory channel used by the tests

use crate::display::scale::NativeRange;
use crate::driver::{Channel, ChannelKind, DeviceOutcome, Error, Reading};
use std::sync::{Arc, Mutex};

#[derive(Debug, Default)]
pub struct MockState {
    /// What the device reports, in native units
    pub current: Option<u32>,
    /// Values passed to the device, native units or percent (see [MockChannel::writes_percent])
    pub writes: Vec<u32>,
    pub fail_writes: bool,
}

pub struct MockChannel {
    pub kind: ChannelKind,
    pub range: NativeRange,
    /// WMI takes percent on writes while reporting on its own scale
    pub writes_percent: bool,
    pub state: Arc<Mutex<MockState>>,
}

impl MockChannel {
    /// A channel whose single device reports `current` (native units), or fails reads when `None`
    pub fn new(kind: ChannelKind, range: NativeRange, current: Option<u32>) -> Self {
        Self {
            kind,
            range,
            writes_percent: kind == ChannelKind::Wmi,
            state: Arc::new(Mutex::new(MockState {
                current,
                ..Default::default()
            })),
        }
    }

    pub fn boxed(self) -> (Box<dyn Channel>, Arc<Mutex<MockState>>) {
        let state = self.state.clone();
        (Box::new(self), state)
    }
}

impl Channel for MockChannel {
    fn kind(&self) -> ChannelKind {
        self.kind
    }

    fn read(&mut self) -> Result<Reading, Error> {
        let state = self.state.lock().unwrap();
        let current = state.current.ok_or(Error::NoDevices)?;
        Ok(Reading {
            range: self.range,
            current,
        })
    }

    fn write(&mut self, percent: u32) -> Result<Vec<DeviceOutcome>, Error> {
        let mut state = self.state.lock().unwrap();
        if state.fail_writes {
            return Err(Error::NoDevices);
        }
        let native = self.range.from_percent(percent);
        let written = if self.writes_percent { percent } else { native };
        state.writes.push(written);
        state.current = Some(native);
        Ok(vec![DeviceOutcome::success("mock".to_owned(), written)])
    }
}
