//! Service records stored under the SCM's own registry tree

use crate::config::store::{
    ConfigStore, Parameters, FIELD_ARGS, FIELD_DISPLAY_NAME, FIELD_EXE_PATH, FIELD_WORKING_DIR,
};
use crate::error::ConfigError;
use std::ffi::OsStr;
use std::os::windows::ffi::OsStrExt;
use tracing::debug;
use windows::core::PCWSTR;
use windows::Win32::Foundation::{ERROR_ACCESS_DENIED, ERROR_FILE_NOT_FOUND, ERROR_SUCCESS};
use windows::Win32::System::Registry::{
    RegCloseKey, RegGetValueW, RegOpenKeyExW, HKEY, HKEY_LOCAL_MACHINE, KEY_READ, RRF_RT_REG_SZ,
};

const SERVICES_KEY: &str = r"SYSTEM\CurrentControlSet\Services";

/// Reads `HKLM\SYSTEM\CurrentControlSet\Services\<id>\Parameters`
#[derive(Debug, Clone, Default)]
pub struct RegistryStore;

impl RegistryStore {
    pub fn new() -> Self {
        Self
    }

    fn key_path(service_id: &str) -> String {
        format!(r"{}\{}\Parameters", SERVICES_KEY, service_id)
    }
}

fn wide(s: &str) -> Vec<u16> {
    OsStr::new(s).encode_wide().chain(Some(0)).collect()
}

/// Open key handle, closed on drop
struct OwnedKey(HKEY);

impl Drop for OwnedKey {
    fn drop(&mut self) {
        unsafe {
            let _ = RegCloseKey(self.0);
        }
    }
}

impl OwnedKey {
    /// Read a REG_SZ value, None if the value does not exist
    fn string_value(&self, name: &str) -> Result<Option<String>, ConfigError> {
        let name_w = wide(name);
        let mut size: u32 = 0;

        let status = unsafe {
            RegGetValueW(
                self.0,
                PCWSTR::null(),
                PCWSTR(name_w.as_ptr()),
                RRF_RT_REG_SZ,
                None,
                None,
                Some(&mut size),
            )
        };
        if status == ERROR_FILE_NOT_FOUND {
            return Ok(None);
        }
        if status != ERROR_SUCCESS {
            return Err(ConfigError::Io {
                path: name.to_string(),
                source: std::io::Error::from_raw_os_error(status.0 as i32),
            });
        }

        let mut buf = vec![0u16; (size as usize).div_ceil(2)];
        let status = unsafe {
            RegGetValueW(
                self.0,
                PCWSTR::null(),
                PCWSTR(name_w.as_ptr()),
                RRF_RT_REG_SZ,
                None,
                Some(buf.as_mut_ptr().cast()),
                Some(&mut size),
            )
        };
        if status != ERROR_SUCCESS {
            return Err(ConfigError::Io {
                path: name.to_string(),
                source: std::io::Error::from_raw_os_error(status.0 as i32),
            });
        }

        let len = buf.iter().position(|&c| c == 0).unwrap_or(buf.len());
        Ok(Some(String::from_utf16_lossy(&buf[..len])))
    }
}

impl ConfigStore for RegistryStore {
    fn read_parameters(&self, service_id: &str) -> Result<Parameters, ConfigError> {
        let path = Self::key_path(service_id);
        let path_w = wide(&path);
        let mut hkey = HKEY::default();

        let status = unsafe {
            RegOpenKeyExW(
                HKEY_LOCAL_MACHINE,
                PCWSTR(path_w.as_ptr()),
                0,
                KEY_READ,
                &mut hkey,
            )
        };
        match status {
            s if s == ERROR_SUCCESS => {}
            s if s == ERROR_FILE_NOT_FOUND => {
                return Err(ConfigError::NotFound {
                    service_id: service_id.to_string(),
                })
            }
            s if s == ERROR_ACCESS_DENIED => {
                return Err(ConfigError::AccessDenied {
                    service_id: service_id.to_string(),
                })
            }
            s => {
                return Err(ConfigError::Io {
                    path,
                    source: std::io::Error::from_raw_os_error(s.0 as i32),
                })
            }
        }
        let key = OwnedKey(hkey);

        let mut params = Parameters::new();
        for field in [FIELD_EXE_PATH, FIELD_ARGS, FIELD_WORKING_DIR, FIELD_DISPLAY_NAME] {
            if let Some(value) = key.string_value(field)? {
                params.insert(field.to_string(), value);
            }
        }

        debug!("Read {} registry values from {}", params.len(), path);
        Ok(params)
    }
}
