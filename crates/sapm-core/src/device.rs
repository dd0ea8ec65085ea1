//! Register backends.
//!
//! The engine never touches hardware itself. A card is given up to two
//! [`Device`]s, the codec and an optional accessory, each wrapping a
//! [`RegisterIo`] implementation supplied by the driver. Every device owns a
//! mutex that serialises its register accesses; the card lock is a separate,
//! coarser lock held around whole graph operations.

use core::fmt;
use core::str::FromStr;

use parking_lot::Mutex;
use tracing::trace;

use crate::error::{BusError, Result, SapmError};

/// Raw register access implemented by a codec or accessory driver.
pub trait RegisterIo: Send {
    /// Reads a register.
    fn read_reg(&mut self, reg: u32) -> core::result::Result<u32, BusError>;

    /// Writes a register.
    fn write_reg(&mut self, reg: u32, value: u32) -> core::result::Result<(), BusError>;
}

impl<T: RegisterIo + ?Sized> RegisterIo for Box<T> {
    fn read_reg(&mut self, reg: u32) -> core::result::Result<u32, BusError> {
        (**self).read_reg(reg)
    }

    fn write_reg(&mut self, reg: u32, value: u32) -> core::result::Result<(), BusError> {
        (**self).write_reg(reg, value)
    }
}

/// Which backend a component or control is bound to.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum DeviceKind {
    /// The card's codec.
    #[default]
    Codec,
    /// An accessory (external amplifier, smart PA, ...).
    Accessory,
}

impl DeviceKind {
    /// Lowercase name.
    pub const fn as_str(self) -> &'static str {
        match self {
            DeviceKind::Codec => "codec",
            DeviceKind::Accessory => "accessory",
        }
    }
}

impl fmt::Display for DeviceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DeviceKind {
    type Err = SapmError;

    fn from_str(s: &str) -> core::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "codec" => Ok(DeviceKind::Codec),
            "accessory" => Ok(DeviceKind::Accessory),
            _ => Err(SapmError::InvalidParam(format!("unknown device '{s}'"))),
        }
    }
}

/// A register backend with its own access lock.
pub struct Device {
    name: String,
    kind: DeviceKind,
    io: Mutex<Box<dyn RegisterIo>>,
}

impl Device {
    /// Wraps a backend.
    pub fn new(name: impl Into<String>, kind: DeviceKind, io: impl RegisterIo + 'static) -> Self {
        Self {
            name: name.into(),
            kind,
            io: Mutex::new(Box::new(io)),
        }
    }

    /// Wraps a codec backend.
    pub fn codec(io: impl RegisterIo + 'static) -> Self {
        Self::new("codec", DeviceKind::Codec, io)
    }

    /// Wraps an accessory backend.
    pub fn accessory(io: impl RegisterIo + 'static) -> Self {
        Self::new("accessory", DeviceKind::Accessory, io)
    }

    /// Device name used in errors and logs.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Backend role.
    pub fn kind(&self) -> DeviceKind {
        self.kind
    }

    /// Reads a register.
    pub fn read(&self, reg: u32) -> Result<u32> {
        let mut io = self.io.lock();
        io.read_reg(reg).map_err(|source| self.io_error(reg, source))
    }

    /// Writes a register.
    pub fn write(&self, reg: u32, value: u32) -> Result<()> {
        let mut io = self.io.lock();
        trace!(device = %self.name, reg, value, "register write");
        io.write_reg(reg, value)
            .map_err(|source| self.io_error(reg, source))
    }

    /// Read-modify-write of the `mask << shift` field of `reg` to `value`.
    ///
    /// The device lock is held across the read and the write. The bus write is
    /// skipped when the field already holds `value` unless `force` is set.
    /// Returns whether a write was issued.
    pub fn update_bits(&self, reg: u32, mask: u32, shift: u32, value: u32, force: bool) -> Result<bool> {
        let mut io = self.io.lock();
        let current = io
            .read_reg(reg)
            .map_err(|source| self.io_error(reg, source))?;
        let field_mask = mask << shift;
        let updated = (current & !field_mask) | ((value << shift) & field_mask);
        if updated == current && !force {
            return Ok(false);
        }
        trace!(device = %self.name, reg, from = current, to = updated, "register update");
        io.write_reg(reg, updated)
            .map_err(|source| self.io_error(reg, source))?;
        Ok(true)
    }

    fn io_error(&self, reg: u32, source: BusError) -> SapmError {
        SapmError::Io {
            device: self.name.clone(),
            reg,
            source,
        }
    }
}

impl fmt::Debug for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Device")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .finish_non_exhaustive()
    }
}
