//! Minimal access to registry values of the current user

use windows::core::{Result, HSTRING};
use windows::Win32::Foundation::ERROR_FILE_NOT_FOUND;
use windows::Win32::System::Registry::{
    RegCloseKey, RegDeleteValueW, RegOpenKeyExW, RegQueryValueExW, RegSetValueExW, HKEY,
    HKEY_CURRENT_USER, KEY_READ, KEY_WRITE, REG_DWORD, REG_SAM_FLAGS, REG_SZ, REG_VALUE_TYPE,
};

pub struct RegKey(HKEY);

impl RegKey {
    fn open(path: &str, access: REG_SAM_FLAGS) -> Result<Self> {
        let mut hkey = HKEY::default();
        unsafe { RegOpenKeyExW(HKEY_CURRENT_USER, &HSTRING::from(path), 0, access, &mut hkey) }
            .ok()?;
        Ok(Self(hkey))
    }

    pub fn open_read(path: &str) -> Result<Self> {
        Self::open(path, KEY_READ)
    }

    pub fn open_write(path: &str) -> Result<Self> {
        Self::open(path, KEY_READ | KEY_WRITE)
    }

    /// Raw value data, `None` when the value does not exist
    fn query(&self, name: &str) -> Result<Option<(REG_VALUE_TYPE, Vec<u8>)>> {
        let name = HSTRING::from(name);
        let mut kind = REG_VALUE_TYPE::default();
        let mut size = 0u32;
        let result = unsafe {
            RegQueryValueExW(self.0, &name, None, Some(&mut kind), None, Some(&mut size))
        };
        if result == ERROR_FILE_NOT_FOUND {
            return Ok(None);
        }
        result.ok()?;
        let mut data = vec![0u8; size as usize];
        unsafe {
            RegQueryValueExW(
                self.0,
                &name,
                None,
                Some(&mut kind),
                Some(data.as_mut_ptr()),
                Some(&mut size),
            )
        }
        .ok()?;
        data.truncate(size as usize);
        Ok(Some((kind, data)))
    }

    pub fn get_string(&self, name: &str) -> Result<Option<String>> {
        Ok(self.query(name)?.and_then(|(kind, data)| {
            (kind == REG_SZ).then(|| {
                let wide: Vec<u16> = data
                    .chunks_exact(2)
                    .map(|c| u16::from_le_bytes([c[0], c[1]]))
                    .take_while(|c| *c != 0)
                    .collect();
                String::from_utf16_lossy(&wide)
            })
        }))
    }

    pub fn get_dword(&self, name: &str) -> Result<Option<u32>> {
        Ok(self.query(name)?.and_then(|(kind, data)| {
            (kind == REG_DWORD && data.len() >= 4)
                .then(|| u32::from_le_bytes([data[0], data[1], data[2], data[3]]))
        }))
    }

    pub fn set_string(&self, name: &str, value: &str) -> Result<()> {
        let bytes: Vec<u8> = value
            .encode_utf16()
            .chain(std::iter::once(0))
            .flat_map(|c| c.to_le_bytes())
            .collect();
        unsafe { RegSetValueExW(self.0, &HSTRING::from(name), 0, REG_SZ, Some(&bytes)) }.ok()
    }

    /// A missing value is not an error
    pub fn delete_value(&self, name: &str) -> Result<()> {
        match unsafe { RegDeleteValueW(self.0, &HSTRING::from(name)) } {
            e if e == ERROR_FILE_NOT_FOUND => Ok(()),
            e => e.ok(),
        }
    }
}

impl Drop for RegKey {
    fn drop(&mut self) {
        let _ = unsafe { RegCloseKey(self.0) };
    }
}
