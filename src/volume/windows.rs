use crate::volume::{Error, VolumeEvent, VolumeState};
use std::sync::mpsc::Sender;
use windows::core::{implement, PCWSTR};
use windows::Win32::Media::Audio::Endpoints::{
    IAudioEndpointVolume, IAudioEndpointVolumeCallback, IAudioEndpointVolumeCallback_Impl,
};
use windows::Win32::Media::Audio::{
    eMultimedia, eRender, EDataFlow, ERole, IMMDeviceEnumerator, IMMNotificationClient,
    IMMNotificationClient_Impl, MMDeviceEnumerator, AUDIO_VOLUME_NOTIFICATION_DATA, DEVICE_STATE,
};
use windows::Win32::System::Com::{CoCreateInstance, CLSCTX_ALL};
use windows::Win32::UI::Shell::PropertiesSystem::PROPERTYKEY;

trait ResultExt<T> {
    fn op(self, operation: &'static str) -> Result<T, Error>;
}

impl<T> ResultExt<T> for windows::core::Result<T> {
    fn op(self, operation: &'static str) -> Result<T, Error> {
        self.map_err(|source| Error::Windows { operation, source })
    }
}

#[implement(IAudioEndpointVolumeCallback)]
struct VolumeCallback {
    sender: Sender<VolumeEvent>,
}

impl IAudioEndpointVolumeCallback_Impl for VolumeCallback {
    fn OnNotify(&self, pnotify: *mut AUDIO_VOLUME_NOTIFICATION_DATA) -> windows::core::Result<()> {
        if let Some(data) = unsafe { pnotify.as_ref() } {
            let state = VolumeState::from_scalar(data.bMuted.as_bool(), data.fMasterVolume);
            let _ = self.sender.send(VolumeEvent::Changed(state));
        }
        Ok(())
    }
}

#[implement(IMMNotificationClient)]
struct DeviceCallback {
    sender: Sender<VolumeEvent>,
}

impl IMMNotificationClient_Impl for DeviceCallback {
    fn OnDeviceStateChanged(
        &self,
        _pwstrdeviceid: &PCWSTR,
        _dwnewstate: DEVICE_STATE,
    ) -> windows::core::Result<()> {
        Ok(())
    }

    fn OnDeviceAdded(&self, _pwstrdeviceid: &PCWSTR) -> windows::core::Result<()> {
        Ok(())
    }

    fn OnDeviceRemoved(&self, _pwstrdeviceid: &PCWSTR) -> windows::core::Result<()> {
        Ok(())
    }

    fn OnDefaultDeviceChanged(
        &self,
        flow: EDataFlow,
        role: ERole,
        _pwstrdefaultdeviceid: &PCWSTR,
    ) -> windows::core::Result<()> {
        if flow == eRender && role == eMultimedia {
            let _ = self.sender.send(VolumeEvent::DefaultDeviceChanged);
        }
        Ok(())
    }

    fn OnPropertyValueChanged(
        &self,
        _pwstrdeviceid: &PCWSTR,
        _key: &PROPERTYKEY,
    ) -> windows::core::Result<()> {
        Ok(())
    }
}

struct Endpoint {
    volume: IAudioEndpointVolume,
    callback: IAudioEndpointVolumeCallback,
}

impl Endpoint {
    fn bind(enumerator: &IMMDeviceEnumerator, sender: Sender<VolumeEvent>) -> Result<Self, Error> {
        unsafe {
            let device = enumerator
                .GetDefaultAudioEndpoint(eRender, eMultimedia)
                .op("GetDefaultAudioEndpoint")?;
            let volume: IAudioEndpointVolume = device.Activate(CLSCTX_ALL, None).op("Activate")?;
            let callback: IAudioEndpointVolumeCallback = VolumeCallback { sender }.into();
            volume
                .RegisterControlChangeNotify(&callback)
                .op("RegisterControlChangeNotify")?;
            Ok(Self { volume, callback })
        }
    }
}

impl Drop for Endpoint {
    fn drop(&mut self) {
        if let Err(e) = unsafe { self.volume.UnregisterControlChangeNotify(&self.callback) } {
            log::warn!("Unable to unregister volume callback: {}", e);
        }
    }
}

/// Sends [VolumeEvent]s for the default playback device until dropped.
/// COM must be initialized on the calling thread.
pub struct VolumeWatcher {
    enumerator: IMMDeviceEnumerator,
    device_callback: IMMNotificationClient,
    endpoint: Option<Endpoint>,
    sender: Sender<VolumeEvent>,
}

impl VolumeWatcher {
    pub fn start(sender: Sender<VolumeEvent>) -> Result<Self, Error> {
        let enumerator: IMMDeviceEnumerator =
            unsafe { CoCreateInstance(&MMDeviceEnumerator, None, CLSCTX_ALL) }
                .op("CoCreateInstance(MMDeviceEnumerator)")?;
        let device_callback: IMMNotificationClient = DeviceCallback {
            sender: sender.clone(),
        }
        .into();
        unsafe { enumerator.RegisterEndpointNotificationCallback(&device_callback) }
            .op("RegisterEndpointNotificationCallback")?;
        let mut watcher = Self {
            enumerator,
            device_callback,
            endpoint: None,
            sender,
        };
        watcher.rebind()?;
        Ok(watcher)
    }

    /// Moves the volume callback to the current default playback device
    pub fn rebind(&mut self) -> Result<(), Error> {
        self.endpoint = None;
        self.endpoint = Some(Endpoint::bind(&self.enumerator, self.sender.clone())?);
        log::debug!("Watching volume of the default playback device");
        Ok(())
    }

    pub fn current(&self) -> Result<VolumeState, Error> {
        let endpoint = self.endpoint.as_ref().ok_or(Error::NoDevice)?;
        unsafe {
            let muted = endpoint.volume.GetMute().op("GetMute")?;
            let scalar = endpoint
                .volume
                .GetMasterVolumeLevelScalar()
                .op("GetMasterVolumeLevelScalar")?;
            Ok(VolumeState::from_scalar(muted.as_bool(), scalar))
        }
    }
}

impl Drop for VolumeWatcher {
    fn drop(&mut self) {
        self.endpoint = None;
        if let Err(e) = unsafe {
            self.enumerator
                .UnregisterEndpointNotificationCallback(&self.device_callback)
        } {
            log::warn!("Unable to unregister device callback: {}", e);
        }
    }
}
