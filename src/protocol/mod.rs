//! Types and constants that match the gateway's binary protocol.
//!
//! Every integer on the wire is little-endian. Outbound bodies start with a
//! 6-byte header (14 bytes for group-scoped commands); inbound bodies start
//! with a 7-byte preamble. Both are carried inside a frame whose first two
//! bytes give the length of the body that follows.

pub mod command;
pub mod frame;
pub mod response;

pub use self::command::Command;
pub use self::frame::{decode_request, decode_response, encode, encode_raw, Preamble, RequestHeader};
pub use self::response::{Reply, Response};

use byteorder::{ByteOrder, WriteBytesExt, LE};
use std::{fmt, io};

use crate::error::{Error, Result};

/// The gateway accepts connections on TCP port 4000.
pub const GATEWAY_PORT: u16 = 4000;

/// First byte of every outbound header.
pub const MARKER: u8 = 0x02;

/// Protocol version byte carried in every header.
pub const PROTOCOL_VERSION: u8 = 0x07;

/// Size of the little-endian length prefix in front of every frame body.
pub const LENGTH_PREFIX_LEN: usize = 2;

/// Header size of commands addressed to the gateway as a whole.
pub const GLOBAL_HEADER_LEN: usize = 6;

/// Header size of commands addressed to a group.
pub const GROUP_HEADER_LEN: usize = 14;

/// Inbound bodies always start with a preamble of this size.
pub const RESPONSE_PREAMBLE_LEN: usize = 7;

/// Width of the fixed text fields used for light and group names.
pub const NAME_LEN: usize = 16;

/// Size of a light address on the wire.
pub const ADDRESS_LEN: usize = 8;

/// A trait for writing protocol types to little-endian bytes.
pub trait WriteBytes {
    fn write_bytes<P: WriteToBytes>(&mut self, protocol: P) -> io::Result<()>;
}

/// Protocol types that may be written to little-endian bytes.
pub trait WriteToBytes {
    fn write_to_bytes<W: WriteBytesExt>(&self, writer: W) -> io::Result<()>;
}

/// Protocol types that may be read from a response payload.
pub trait ReadFromPayload: Sized {
    fn read_from_payload(reader: &mut PayloadReader<'_>) -> Result<Self>;
}

/// Types that have a constant size when written to or read from bytes.
pub trait SizeBytes {
    const SIZE_BYTES: usize;
}

/// Whether a command targets the whole gateway or a single group.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Scope {
    Global,
    Group,
}

impl Scope {
    /// Length of the outbound header for this scope.
    pub fn header_len(&self) -> usize {
        match self {
            Scope::Global => GLOBAL_HEADER_LEN,
            Scope::Group => GROUP_HEADER_LEN,
        }
    }
}

/// Every command code the gateway is known to understand.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum CommandCode {
    AllLightStatus,
    GroupList,
    GroupInfo,
    SetLuminance,
    SetPower,
    SetTemperature,
    SetColor,
    LightStatus,
}

impl CommandCode {
    pub const ALL_LIGHT_STATUS: u8 = 0x13;
    pub const GROUP_LIST: u8 = 0x1e;
    pub const GROUP_INFO: u8 = 0x26;
    pub const SET_LUMINANCE: u8 = 0x31;
    pub const SET_POWER: u8 = 0x32;
    pub const SET_TEMPERATURE: u8 = 0x33;
    pub const SET_COLOR: u8 = 0x36;
    pub const LIGHT_STATUS: u8 = 0x68;

    pub fn from_protocol(code: u8) -> Option<Self> {
        Some(match code {
            Self::ALL_LIGHT_STATUS => CommandCode::AllLightStatus,
            Self::GROUP_LIST => CommandCode::GroupList,
            Self::GROUP_INFO => CommandCode::GroupInfo,
            Self::SET_LUMINANCE => CommandCode::SetLuminance,
            Self::SET_POWER => CommandCode::SetPower,
            Self::SET_TEMPERATURE => CommandCode::SetTemperature,
            Self::SET_COLOR => CommandCode::SetColor,
            Self::LIGHT_STATUS => CommandCode::LightStatus,
            _ => return None,
        })
    }

    pub fn to_protocol(&self) -> u8 {
        match *self {
            CommandCode::AllLightStatus => Self::ALL_LIGHT_STATUS,
            CommandCode::GroupList => Self::GROUP_LIST,
            CommandCode::GroupInfo => Self::GROUP_INFO,
            CommandCode::SetLuminance => Self::SET_LUMINANCE,
            CommandCode::SetPower => Self::SET_POWER,
            CommandCode::SetTemperature => Self::SET_TEMPERATURE,
            CommandCode::SetColor => Self::SET_COLOR,
            CommandCode::LightStatus => Self::LIGHT_STATUS,
        }
    }

    pub fn scope(&self) -> Scope {
        match *self {
            CommandCode::AllLightStatus | CommandCode::GroupList | CommandCode::LightStatus => {
                Scope::Global
            }
            CommandCode::GroupInfo
            | CommandCode::SetLuminance
            | CommandCode::SetPower
            | CommandCode::SetTemperature
            | CommandCode::SetColor => Scope::Group,
        }
    }
}

impl fmt::Display for CommandCode {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let name = match self {
            CommandCode::AllLightStatus => "all-light-status",
            CommandCode::GroupList => "group-list",
            CommandCode::GroupInfo => "group-info",
            CommandCode::SetLuminance => "set-luminance",
            CommandCode::SetPower => "set-power",
            CommandCode::SetTemperature => "set-temperature",
            CommandCode::SetColor => "set-color",
            CommandCode::LightStatus => "light-status",
        };
        write!(f, "{} (0x{:02x})", name, self.to_protocol())
    }
}

/// A fixed-width, NUL-padded name field.
#[derive(Copy, Clone, PartialEq, Eq, Hash)]
pub struct Name(pub [u8; NAME_LEN]);

impl Name {
    /// Builds a name field from text, truncating to the field width.
    pub fn new(text: &str) -> Self {
        let mut bytes = [0u8; NAME_LEN];
        let len = text.len().min(NAME_LEN);
        bytes[..len].copy_from_slice(&text.as_bytes()[..len]);
        Name(bytes)
    }

    /// The name with trailing padding removed.
    pub fn to_string_lossy(&self) -> String {
        let end = self
            .0
            .iter()
            .rposition(|&b| b != 0)
            .map_or(0, |last| last + 1);
        String::from_utf8_lossy(&self.0[..end]).into_owned()
    }
}

impl fmt::Debug for Name {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{:?}", self.to_string_lossy())
    }
}

impl SizeBytes for Name {
    const SIZE_BYTES: usize = NAME_LEN;
}

impl WriteToBytes for Name {
    fn write_to_bytes<W: WriteBytesExt>(&self, mut writer: W) -> io::Result<()> {
        writer.write_all(&self.0)
    }
}

impl ReadFromPayload for Name {
    fn read_from_payload(reader: &mut PayloadReader<'_>) -> Result<Self> {
        Ok(Name(reader.read_array()?))
    }
}

/// A cursor over a response payload.
///
/// Every read checks the remaining length first and fails with
/// `Error::TruncatedPayload` instead of indexing past the end.
#[derive(Clone, Debug)]
pub struct PayloadReader<'a> {
    bytes: &'a [u8],
    position: usize,
}

impl<'a> PayloadReader<'a> {
    pub fn new(bytes: &'a [u8]) -> Self {
        PayloadReader { bytes, position: 0 }
    }

    pub fn position(&self) -> usize {
        self.position
    }

    pub fn remaining(&self) -> usize {
        self.bytes.len() - self.position
    }

    /// Fails unless at least `needed` bytes remain.
    pub fn require(&self, needed: usize) -> Result<()> {
        let available = self.remaining();
        if needed > available {
            return Err(Error::TruncatedPayload { needed, available });
        }
        Ok(())
    }

    /// Fails unless `count` records of `record_len` bytes each remain.
    pub fn require_records(&self, count: usize, record_len: usize) -> Result<()> {
        let needed = count.checked_mul(record_len).ok_or(Error::TruncatedPayload {
            needed: usize::MAX,
            available: self.remaining(),
        })?;
        self.require(needed)
    }

    pub fn take(&mut self, len: usize) -> Result<&'a [u8]> {
        self.require(len)?;
        let bytes = self.bytes;
        let slice = &bytes[self.position..self.position + len];
        self.position += len;
        Ok(slice)
    }

    pub fn read_array<const N: usize>(&mut self) -> Result<[u8; N]> {
        let mut array = [0u8; N];
        array.copy_from_slice(self.take(N)?);
        Ok(array)
    }

    pub fn read_u8(&mut self) -> Result<u8> {
        Ok(self.take(1)?[0])
    }

    pub fn read_u16(&mut self) -> Result<u16> {
        Ok(LE::read_u16(self.take(2)?))
    }

    pub fn read_u64(&mut self) -> Result<u64> {
        Ok(LE::read_u64(self.take(8)?))
    }

    pub fn read<P: ReadFromPayload>(&mut self) -> Result<P> {
        P::read_from_payload(self)
    }

    /// Everything not yet consumed.
    pub fn rest(&mut self) -> &'a [u8] {
        let bytes = self.bytes;
        let rest = &bytes[self.position..];
        self.position = self.bytes.len();
        rest
    }
}

impl<P> WriteToBytes for &P
where
    P: WriteToBytes,
{
    fn write_to_bytes<W: WriteBytesExt>(&self, writer: W) -> io::Result<()> {
        (*self).write_to_bytes(writer)
    }
}

impl<W> WriteBytes for W
where
    W: WriteBytesExt,
{
    fn write_bytes<P: WriteToBytes>(&mut self, protocol: P) -> io::Result<()> {
        protocol.write_to_bytes(self)
    }
}
