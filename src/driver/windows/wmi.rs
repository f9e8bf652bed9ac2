//! Brightness through the `ROOT\WMI` monitor classes, mostly implemented by laptop panels

use crate::display::scale::NativeRange;
use crate::driver::windows::ResultExt;
use crate::driver::{Channel, ChannelKind, DeviceOutcome, Error, Reading};
use windows::core::{implement, BSTR, HRESULT, HSTRING};
use windows::Win32::System::Com::{CoCreateInstance, CLSCTX_INPROC_SERVER};
use windows::Win32::System::Variant::{
    VariantClear, VARIANT, VT_BSTR, VT_I2, VT_I4, VT_UI1, VT_UI2, VT_UI4,
};
use windows::Win32::System::Wmi::{
    IWbemClassObject, IWbemLocator, IWbemObjectSink, IWbemObjectSink_Impl, IWbemServices,
    WbemLocator, WBEM_FLAG_FORWARD_ONLY, WBEM_FLAG_RETURN_IMMEDIATELY,
    WBEM_FLAG_RETURN_WBEM_COMPLETE, WBEM_GENERIC_FLAG_TYPE, WBEM_INFINITE,
};

const NAMESPACE: &str = "ROOT\\WMI";
const METHODS_CLASS: &str = "WmiMonitorBrightnessMethods";
const SET_METHOD: &str = "WmiSetBrightness";

/// Owns a VARIANT and clears it on drop
struct Variant(VARIANT);

impl Variant {
    fn empty() -> Self {
        Self(VARIANT::default())
    }

    fn from_u8(value: u8) -> Self {
        let mut variant = VARIANT::default();
        unsafe {
            let inner = &mut *variant.Anonymous.Anonymous;
            inner.vt = VT_UI1;
            inner.Anonymous.bVal = value;
        }
        Self(variant)
    }

    fn from_i32(value: i32) -> Self {
        let mut variant = VARIANT::default();
        unsafe {
            let inner = &mut *variant.Anonymous.Anonymous;
            inner.vt = VT_I4;
            inner.Anonymous.lVal = value;
        }
        Self(variant)
    }

    fn as_u32(&self) -> Option<u32> {
        unsafe {
            let inner = &self.0.Anonymous.Anonymous;
            match inner.vt {
                VT_UI1 => Some(inner.Anonymous.bVal as u32),
                VT_UI2 => Some(inner.Anonymous.uiVal as u32),
                VT_UI4 => Some(inner.Anonymous.ulVal),
                VT_I2 => u32::try_from(inner.Anonymous.iVal).ok(),
                VT_I4 => u32::try_from(inner.Anonymous.lVal).ok(),
                _ => None,
            }
        }
    }

    fn as_string(&self) -> Option<String> {
        unsafe {
            let inner = &self.0.Anonymous.Anonymous;
            match inner.vt {
                VT_BSTR => Some(inner.Anonymous.bstrVal.to_string()),
                _ => None,
            }
        }
    }
}

impl Drop for Variant {
    fn drop(&mut self) {
        let _ = unsafe { VariantClear(&mut self.0) };
    }
}

fn property(object: &IWbemClassObject, name: &'static str) -> Result<Variant, Error> {
    let mut value = Variant::empty();
    unsafe { object.Get(&HSTRING::from(name), 0, &mut value.0, None, None) }.op("Get")?;
    Ok(value)
}

fn u32_property(object: &IWbemClassObject, name: &'static str) -> Result<u32, Error> {
    property(object, name)?
        .as_u32()
        .ok_or(Error::MissingProperty(name))
}

fn string_property(object: &IWbemClassObject, name: &'static str) -> Result<String, Error> {
    property(object, name)?
        .as_string()
        .ok_or(Error::MissingProperty(name))
}

pub fn connect() -> Result<IWbemServices, Error> {
    unsafe {
        let locator: IWbemLocator =
            CoCreateInstance(&WbemLocator, None, CLSCTX_INPROC_SERVER).op("CoCreateInstance")?;
        locator
            .ConnectServer(
                &BSTR::from(NAMESPACE),
                &BSTR::new(),
                &BSTR::new(),
                &BSTR::new(),
                0,
                &BSTR::new(),
                None,
            )
            .op("ConnectServer")
    }
}

fn query(services: &IWbemServices, wql: &str) -> Result<Vec<IWbemClassObject>, Error> {
    let enumerator = unsafe {
        services.ExecQuery(
            &BSTR::from("WQL"),
            &BSTR::from(wql),
            WBEM_FLAG_FORWARD_ONLY | WBEM_FLAG_RETURN_IMMEDIATELY,
            None,
        )
    }
    .op("ExecQuery")?;
    let mut objects = vec![];
    loop {
        let mut row = [None];
        let mut returned = 0;
        unsafe { enumerator.Next(WBEM_INFINITE.0, &mut row, &mut returned) }
            .ok()
            .op("IEnumWbemClassObject::Next")?;
        match row[0].take() {
            Some(object) if returned > 0 => objects.push(object),
            _ => break,
        }
    }
    Ok(objects)
}

pub struct WmiChannel {
    services: IWbemServices,
    range: NativeRange,
}

impl WmiChannel {
    /// `range` is the scale `CurrentBrightness` is reported in
    pub fn connect(range: NativeRange) -> Result<Self, Error> {
        Ok(Self {
            services: connect()?,
            range,
        })
    }

    fn set_brightness(
        &self,
        signature: &IWbemClassObject,
        instance: &IWbemClassObject,
        value: u8,
    ) -> Result<(), Error> {
        let path = string_property(instance, "__PATH")?;
        unsafe {
            let params = signature.SpawnInstance(0).op("SpawnInstance")?;
            params
                .Put(&HSTRING::from("Timeout"), 0, &Variant::from_i32(0).0, 0)
                .op("Put(Timeout)")?;
            params
                .Put(&HSTRING::from("Brightness"), 0, &Variant::from_u8(value).0, 0)
                .op("Put(Brightness)")?;
            self.services
                .ExecMethod(
                    &BSTR::from(path),
                    &BSTR::from(SET_METHOD),
                    WBEM_GENERIC_FLAG_TYPE(0),
                    None,
                    &params,
                    None,
                    None,
                )
                .op("ExecMethod")
        }
    }

    fn input_signature(&self) -> Result<IWbemClassObject, Error> {
        let mut class = None;
        unsafe {
            self.services
                .GetObject(
                    &BSTR::from(METHODS_CLASS),
                    WBEM_FLAG_RETURN_WBEM_COMPLETE,
                    None,
                    Some(&mut class),
                    None,
                )
                .op("GetObject")?;
        }
        let class: IWbemClassObject = class.ok_or(Error::MissingProperty(METHODS_CLASS))?;
        let mut input = None;
        let mut output = None;
        unsafe { class.GetMethod(&HSTRING::from(SET_METHOD), 0, &mut input, &mut output) }
            .op("GetMethod")?;
        input.ok_or(Error::MissingProperty(SET_METHOD))
    }
}

impl Channel for WmiChannel {
    fn kind(&self) -> ChannelKind {
        ChannelKind::Wmi
    }

    fn read(&mut self) -> Result<Reading, Error> {
        let monitors = query(&self.services, "SELECT * FROM WmiMonitorBrightness")?;
        let monitor = monitors.first().ok_or(Error::NoDevices)?;
        Ok(Reading {
            range: self.range,
            current: u32_property(monitor, "CurrentBrightness")?,
        })
    }

    /// The methods class takes the brightness in percent
    fn write(&mut self, percent: u32) -> Result<Vec<DeviceOutcome>, Error> {
        let signature = self.input_signature()?;
        let instances = query(&self.services, &format!("SELECT * FROM {}", METHODS_CLASS))?;
        if instances.is_empty() {
            return Err(Error::NoDevices);
        }
        let value = percent.min(100) as u8;
        Ok(instances
            .iter()
            .map(|instance| {
                let name = string_property(instance, "InstanceName")
                    .unwrap_or_else(|_| METHODS_CLASS.to_owned());
                match self.set_brightness(&signature, instance, value) {
                    Ok(()) => DeviceOutcome::success(name, value as u32),
                    Err(e) => DeviceOutcome::failure(name, &e),
                }
            })
            .collect())
    }
}

#[implement(IWbemObjectSink)]
struct BrightnessEventSink {
    range: NativeRange,
    callback: Box<dyn Fn(u32) + Send + Sync>,
}

impl IWbemObjectSink_Impl for BrightnessEventSink {
    fn Indicate(
        &self,
        lobjectcount: i32,
        apobjarray: *const Option<IWbemClassObject>,
    ) -> windows::core::Result<()> {
        if apobjarray.is_null() || lobjectcount <= 0 {
            return Ok(());
        }
        let objects = unsafe { std::slice::from_raw_parts(apobjarray, lobjectcount as usize) };
        for event in objects.iter().flatten() {
            match u32_property(event, "Brightness") {
                Ok(raw) => (self.callback)(self.range.to_percent(raw)),
                Err(e) => log::warn!("Malformed brightness event: {}", e),
            }
        }
        Ok(())
    }

    fn SetStatus(
        &self,
        _lflags: i32,
        _hresult: HRESULT,
        _strparam: &BSTR,
        _pobjparam: Option<&IWbemClassObject>,
    ) -> windows::core::Result<()> {
        Ok(())
    }
}

/// Reports brightness changes made by the OS or other applications (e.g. hotkeys).
/// The subscription is cancelled on drop.
pub struct BrightnessEventWatcher {
    services: IWbemServices,
    sink: IWbemObjectSink,
}

impl BrightnessEventWatcher {
    /// `callback` receives the new brightness in percent, on a COM worker thread
    pub fn start<F>(range: NativeRange, callback: F) -> Result<Self, Error>
    where
        F: Fn(u32) + Send + Sync + 'static,
    {
        let services = connect()?;
        let sink: IWbemObjectSink = BrightnessEventSink {
            range,
            callback: Box::new(callback),
        }
        .into();
        unsafe {
            services.ExecNotificationQueryAsync(
                &BSTR::from("WQL"),
                &BSTR::from("SELECT * FROM WmiMonitorBrightnessEvent"),
                WBEM_GENERIC_FLAG_TYPE(0),
                None,
                &sink,
            )
        }
        .op("ExecNotificationQueryAsync")?;
        log::debug!("Subscribed to WMI brightness events");
        Ok(Self { services, sink })
    }
}

impl Drop for BrightnessEventWatcher {
    fn drop(&mut self) {
        if let Err(e) = unsafe { self.services.CancelAsyncCall(&self.sink) } {
            log::warn!("Unable to cancel WMI brightness subscription: {}", e);
        }
    }
}
