//! Device identity providers
//!
//! The challenge binds the authcode to one board model and one physical
//! chip. Where those values come from (eFuse, flash, provisioning data) is
//! up to the implementation.

use crate::error::IdentityError;

/// Size of the board id
pub const BOARD_ID_SIZE: usize = 4;

pub trait DeviceIdentity {
    /// Board type identifier
    fn board_id(&self) -> Result<[u8; BOARD_ID_SIZE], IdentityError>;

    /// Unique chip id, any length
    fn unique_id(&self) -> &[u8];
}

impl<T: DeviceIdentity + ?Sized> DeviceIdentity for Box<T> {
    fn board_id(&self) -> Result<[u8; BOARD_ID_SIZE], IdentityError> {
        (**self).board_id()
    }

    fn unique_id(&self) -> &[u8] {
        (**self).unique_id()
    }
}

/// Identity from fixed, configured values
#[derive(Debug, Clone)]
pub struct StaticIdentity {
    board_id: Option<[u8; BOARD_ID_SIZE]>,
    unique_id: Vec<u8>,
}

impl StaticIdentity {
    pub fn new(board_id: [u8; BOARD_ID_SIZE], unique_id: impl Into<Vec<u8>>) -> Self {
        Self {
            board_id: Some(board_id),
            unique_id: unique_id.into(),
        }
    }

    /// A device whose board id was never provisioned
    pub fn unprovisioned(unique_id: impl Into<Vec<u8>>) -> Self {
        Self {
            board_id: None,
            unique_id: unique_id.into(),
        }
    }
}

impl DeviceIdentity for StaticIdentity {
    fn board_id(&self) -> Result<[u8; BOARD_ID_SIZE], IdentityError> {
        self.board_id.ok_or(IdentityError::BoardIdUnavailable)
    }

    fn unique_id(&self) -> &[u8] {
        &self.unique_id
    }
}

/// Configured board id plus the factory MAC burned into eFuse as unique id
#[cfg(target_os = "espidf")]
pub struct EfuseIdentity {
    board_id: Option<[u8; BOARD_ID_SIZE]>,
    mac: [u8; 6],
}

#[cfg(target_os = "espidf")]
impl EfuseIdentity {
    pub fn new(board_id: Option<[u8; BOARD_ID_SIZE]>) -> anyhow::Result<Self> {
        let mut mac = [0u8; 6];
        esp_idf_sys::esp!(unsafe { esp_idf_sys::esp_efuse_mac_get_default(mac.as_mut_ptr()) })?;
        Ok(Self { board_id, mac })
    }
}

#[cfg(target_os = "espidf")]
impl DeviceIdentity for EfuseIdentity {
    fn board_id(&self) -> Result<[u8; BOARD_ID_SIZE], IdentityError> {
        self.board_id.ok_or(IdentityError::BoardIdUnavailable)
    }

    fn unique_id(&self) -> &[u8] {
        &self.mac
    }
}
