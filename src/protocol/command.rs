//! Commands that can be sent to the gateway.
//!
//! Each type here writes only its payload; the header is added by
//! [`frame::encode`](super::frame::encode) from the command's code, scope
//! and the session's sequence number.

use byteorder::{WriteBytesExt, LE};
use std::io;

use super::{response, CommandCode, Response, SizeBytes, WriteToBytes};

/// Types that may be submitted as commands to the gateway.
pub trait Command: WriteToBytes {
    const CODE: CommandCode;

    /// The decoded form of the gateway's reply.
    type Response: Response;

    /// The target group for group-scoped commands.
    fn group(&self) -> Option<u8> {
        None
    }
}

/// Second field of the temperature payload. Its meaning is unconfirmed.
pub const TEMPERATURE_TRAILER: u16 = 10;

/// Fourth colour channel byte. Always sent as 0xff.
pub const COLOR_ALPHA: u8 = 0xff;

/// Verbosity flag used when enumerating every light.
pub const DEFAULT_VERBOSITY: u8 = 1;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct AllLightStatus {
    pub verbosity: u8,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct LightStatus {
    pub address: u64,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct GroupList;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct GroupInfo {
    pub group: u8,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct SetPower {
    pub group: u8,
    pub on: bool,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct SetLuminance {
    pub group: u8,
    /// 0-100.
    pub level: u8,
    pub transition: u16,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct SetTemperature {
    pub group: u8,
    pub kelvin: u16,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct SetColor {
    pub group: u8,
    pub red: u8,
    pub green: u8,
    pub blue: u8,
    pub transition: u16,
}

impl<C> Command for &C
where
    C: Command,
{
    const CODE: CommandCode = C::CODE;
    type Response = C::Response;

    fn group(&self) -> Option<u8> {
        (*self).group()
    }
}

impl Command for AllLightStatus {
    const CODE: CommandCode = CommandCode::AllLightStatus;
    type Response = response::AllLightStatus;
}

impl Command for LightStatus {
    const CODE: CommandCode = CommandCode::LightStatus;
    type Response = response::LightStatus;
}

impl Command for GroupList {
    const CODE: CommandCode = CommandCode::GroupList;
    type Response = response::GroupList;
}

impl Command for GroupInfo {
    const CODE: CommandCode = CommandCode::GroupInfo;
    type Response = response::GroupInfo;

    fn group(&self) -> Option<u8> {
        Some(self.group)
    }
}

impl Command for SetPower {
    const CODE: CommandCode = CommandCode::SetPower;
    type Response = response::Ack;

    fn group(&self) -> Option<u8> {
        Some(self.group)
    }
}

impl Command for SetLuminance {
    const CODE: CommandCode = CommandCode::SetLuminance;
    type Response = response::Ack;

    fn group(&self) -> Option<u8> {
        Some(self.group)
    }
}

impl Command for SetTemperature {
    const CODE: CommandCode = CommandCode::SetTemperature;
    type Response = response::Ack;

    fn group(&self) -> Option<u8> {
        Some(self.group)
    }
}

impl Command for SetColor {
    const CODE: CommandCode = CommandCode::SetColor;
    type Response = response::Ack;

    fn group(&self) -> Option<u8> {
        Some(self.group)
    }
}

impl SizeBytes for AllLightStatus {
    const SIZE_BYTES: usize = 1;
}
impl SizeBytes for LightStatus {
    const SIZE_BYTES: usize = 8;
}
impl SizeBytes for GroupList {
    const SIZE_BYTES: usize = 0;
}
impl SizeBytes for GroupInfo {
    const SIZE_BYTES: usize = 0;
}
impl SizeBytes for SetPower {
    const SIZE_BYTES: usize = 1;
}
impl SizeBytes for SetLuminance {
    const SIZE_BYTES: usize = 3;
}
impl SizeBytes for SetTemperature {
    const SIZE_BYTES: usize = 4;
}
impl SizeBytes for SetColor {
    const SIZE_BYTES: usize = 6;
}

impl WriteToBytes for AllLightStatus {
    fn write_to_bytes<W: WriteBytesExt>(&self, mut writer: W) -> io::Result<()> {
        writer.write_u8(self.verbosity)
    }
}

impl WriteToBytes for LightStatus {
    fn write_to_bytes<W: WriteBytesExt>(&self, mut writer: W) -> io::Result<()> {
        writer.write_u64::<LE>(self.address)
    }
}

impl WriteToBytes for GroupList {
    fn write_to_bytes<W: WriteBytesExt>(&self, _writer: W) -> io::Result<()> {
        Ok(())
    }
}

impl WriteToBytes for GroupInfo {
    fn write_to_bytes<W: WriteBytesExt>(&self, _writer: W) -> io::Result<()> {
        Ok(())
    }
}

impl WriteToBytes for SetPower {
    fn write_to_bytes<W: WriteBytesExt>(&self, mut writer: W) -> io::Result<()> {
        writer.write_u8(self.on as u8)
    }
}

impl WriteToBytes for SetLuminance {
    fn write_to_bytes<W: WriteBytesExt>(&self, mut writer: W) -> io::Result<()> {
        writer.write_u8(self.level)?;
        writer.write_u16::<LE>(self.transition)?;
        Ok(())
    }
}

impl WriteToBytes for SetTemperature {
    fn write_to_bytes<W: WriteBytesExt>(&self, mut writer: W) -> io::Result<()> {
        writer.write_u16::<LE>(self.kelvin)?;
        writer.write_u16::<LE>(TEMPERATURE_TRAILER)?;
        Ok(())
    }
}

impl WriteToBytes for SetColor {
    fn write_to_bytes<W: WriteBytesExt>(&self, mut writer: W) -> io::Result<()> {
        writer.write_u8(self.red)?;
        writer.write_u8(self.green)?;
        writer.write_u8(self.blue)?;
        writer.write_u8(COLOR_ALPHA)?;
        writer.write_u16::<LE>(self.transition)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payload<C: WriteToBytes + SizeBytes>(command: C) -> Vec<u8> {
        let mut bytes = Vec::new();
        command.write_to_bytes(&mut bytes).unwrap();
        assert_eq!(bytes.len(), C::SIZE_BYTES);
        bytes
    }

    #[test]
    fn test_status_payloads() {
        assert_eq!(payload(AllLightStatus { verbosity: 1 }), vec![0x01]);
        assert_eq!(
            payload(LightStatus {
                address: 0x8877_6655_4433_2211
            }),
            vec![0x11, 0x22, 0x33, 0x44, 0x55, 0x66, 0x77, 0x88]
        );
        assert!(payload(GroupList).is_empty());
        assert!(payload(GroupInfo { group: 4 }).is_empty());
    }

    #[test]
    fn test_power_payload() {
        assert_eq!(payload(SetPower { group: 1, on: true }), vec![1]);
        assert_eq!(payload(SetPower { group: 1, on: false }), vec![0]);
    }

    #[test]
    fn test_luminance_payload() {
        let bytes = payload(SetLuminance {
            group: 1,
            level: 75,
            transition: 0x0102,
        });
        assert_eq!(bytes, vec![75, 0x02, 0x01]);
    }

    #[test]
    fn test_temperature_payload_keeps_trailer() {
        let bytes = payload(SetTemperature {
            group: 1,
            kelvin: 2700,
        });
        assert_eq!(bytes, vec![0x8c, 0x0a, 0x0a, 0x00]);
    }

    #[test]
    fn test_color_payload() {
        let bytes = payload(SetColor {
            group: 1,
            red: 0x10,
            green: 0x20,
            blue: 0x30,
            transition: 5,
        });
        assert_eq!(bytes, vec![0x10, 0x20, 0x30, 0xff, 0x05, 0x00]);
    }

    #[test]
    fn test_scope_follows_command() {
        assert_eq!(GroupList.group(), None);
        assert_eq!(AllLightStatus { verbosity: 1 }.group(), None);
        assert_eq!(SetPower { group: 9, on: true }.group(), Some(9));
        assert_eq!(GroupInfo { group: 2 }.group(), Some(2));
        assert_eq!(<SetColor as Command>::CODE.to_protocol(), 0x36);
    }
}
