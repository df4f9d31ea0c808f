//! Decoders for the payloads the gateway sends back.
//!
//! Each decoder checks a declared element count against the bytes actually
//! present before reading any element.

use byteorder::{WriteBytesExt, LE};
use std::io;

use super::frame::{self, Preamble};
use super::{
    CommandCode, Name, PayloadReader, ReadFromPayload, SizeBytes, WriteBytes, WriteToBytes,
    ADDRESS_LEN,
};
use crate::error::{Error, Result};

/// A decoded reply payload.
pub trait Response: Sized {
    fn decode(payload: &[u8]) -> Result<Self>;
}

/// One entry of the group list: id and name, without membership.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct GroupSummary {
    pub id: u16,
    pub name: Name,
}

/// Reply to the group-list command.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct GroupList {
    pub groups: Vec<GroupSummary>,
}

/// Reply to the group-info command.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct GroupInfo {
    pub id: u16,
    pub name: Name,
    /// Member light addresses in gateway order.
    pub members: Vec<u64>,
}

/// The 16-byte status block inside each all-light-status record.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct StatusBlock {
    /// Repeats the record's address.
    pub address: u64,
    pub on: u8,
    pub luminance: u8,
    pub temperature: u16,
    pub red: u8,
    pub green: u8,
    pub blue: u8,
    pub reserved: u8,
}

/// One 42-byte record of the all-light-status reply.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct LightRecord {
    /// Leading field of unconfirmed meaning, kept as received.
    pub leading: u16,
    pub address: u64,
    pub status: StatusBlock,
    pub name: Name,
}

/// Reply to the all-light-status command.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct AllLightStatus {
    pub lights: Vec<LightRecord>,
}

/// Reply to the single-light-status command.
///
/// The layout of this payload has not been worked out, so it is exposed
/// undecoded.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct LightStatus {
    pub raw: Vec<u8>,
}

/// Reply to a control command. The payload carries nothing of use.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct Ack;

/// A runtime representation of any reply.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Reply {
    GroupList(GroupList),
    GroupInfo(GroupInfo),
    AllLightStatus(AllLightStatus),
    LightStatus(LightStatus),
    Ack(CommandCode),
}

impl SizeBytes for GroupSummary {
    const SIZE_BYTES: usize = 2 + Name::SIZE_BYTES;
}

impl SizeBytes for StatusBlock {
    const SIZE_BYTES: usize = 16;
}

impl SizeBytes for LightRecord {
    const SIZE_BYTES: usize = 2 + ADDRESS_LEN + StatusBlock::SIZE_BYTES + Name::SIZE_BYTES;
}

impl ReadFromPayload for GroupSummary {
    fn read_from_payload(reader: &mut PayloadReader<'_>) -> Result<Self> {
        Ok(GroupSummary {
            id: reader.read_u16()?,
            name: reader.read()?,
        })
    }
}

impl ReadFromPayload for StatusBlock {
    fn read_from_payload(reader: &mut PayloadReader<'_>) -> Result<Self> {
        Ok(StatusBlock {
            address: reader.read_u64()?,
            on: reader.read_u8()?,
            luminance: reader.read_u8()?,
            temperature: reader.read_u16()?,
            red: reader.read_u8()?,
            green: reader.read_u8()?,
            blue: reader.read_u8()?,
            reserved: reader.read_u8()?,
        })
    }
}

impl ReadFromPayload for LightRecord {
    fn read_from_payload(reader: &mut PayloadReader<'_>) -> Result<Self> {
        Ok(LightRecord {
            leading: reader.read_u16()?,
            address: reader.read_u64()?,
            status: reader.read()?,
            name: reader.read()?,
        })
    }
}

fn read_records<P>(reader: &mut PayloadReader<'_>, count: usize) -> Result<Vec<P>>
where
    P: ReadFromPayload + SizeBytes,
{
    reader.require_records(count, P::SIZE_BYTES)?;
    let mut records = Vec::with_capacity(count);
    for _ in 0..count {
        records.push(reader.read::<P>()?);
    }
    Ok(records)
}

impl Response for GroupList {
    fn decode(payload: &[u8]) -> Result<Self> {
        let mut reader = PayloadReader::new(payload);
        let count = reader.read_u16()? as usize;
        let groups = read_records(&mut reader, count)?;
        Ok(GroupList { groups })
    }
}

impl Response for GroupInfo {
    fn decode(payload: &[u8]) -> Result<Self> {
        let mut reader = PayloadReader::new(payload);
        let id = reader.read_u16()?;
        let name = reader.read()?;
        let count = reader.read_u8()? as usize;
        reader.require_records(count, ADDRESS_LEN)?;
        let mut members = Vec::with_capacity(count);
        for _ in 0..count {
            members.push(reader.read_u64()?);
        }
        Ok(GroupInfo { id, name, members })
    }
}

impl Response for AllLightStatus {
    fn decode(payload: &[u8]) -> Result<Self> {
        let mut reader = PayloadReader::new(payload);
        let count = reader.read_u16()? as usize;
        let lights = read_records(&mut reader, count)?;
        Ok(AllLightStatus { lights })
    }
}

impl Response for LightStatus {
    fn decode(payload: &[u8]) -> Result<Self> {
        Ok(LightStatus {
            raw: payload.to_vec(),
        })
    }
}

impl Response for Ack {
    fn decode(_payload: &[u8]) -> Result<Self> {
        Ok(Ack)
    }
}

impl Reply {
    /// Decodes an inbound body (length prefix already removed) by the
    /// command code in its preamble.
    pub fn decode(body: &[u8]) -> Result<(Preamble, Reply)> {
        let (preamble, payload) = frame::decode_response(body)?;
        let code = CommandCode::from_protocol(preamble.command)
            .ok_or(Error::UnknownCommand(preamble.command))?;
        let reply = match code {
            CommandCode::GroupList => GroupList::decode(payload)?.into(),
            CommandCode::GroupInfo => GroupInfo::decode(payload)?.into(),
            CommandCode::AllLightStatus => AllLightStatus::decode(payload)?.into(),
            CommandCode::LightStatus => LightStatus::decode(payload)?.into(),
            CommandCode::SetPower
            | CommandCode::SetLuminance
            | CommandCode::SetTemperature
            | CommandCode::SetColor => Reply::Ack(code),
        };
        Ok((preamble, reply))
    }
}

impl From<GroupList> for Reply {
    fn from(reply: GroupList) -> Self {
        Reply::GroupList(reply)
    }
}
impl From<GroupInfo> for Reply {
    fn from(reply: GroupInfo) -> Self {
        Reply::GroupInfo(reply)
    }
}
impl From<AllLightStatus> for Reply {
    fn from(reply: AllLightStatus) -> Self {
        Reply::AllLightStatus(reply)
    }
}
impl From<LightStatus> for Reply {
    fn from(reply: LightStatus) -> Self {
        Reply::LightStatus(reply)
    }
}

fn count_u16(len: usize) -> io::Result<u16> {
    u16::try_from(len).map_err(|_| io::Error::new(io::ErrorKind::InvalidData, "too many records"))
}

impl WriteToBytes for GroupSummary {
    fn write_to_bytes<W: WriteBytesExt>(&self, mut writer: W) -> io::Result<()> {
        writer.write_u16::<LE>(self.id)?;
        writer.write_bytes(self.name)?;
        Ok(())
    }
}

impl WriteToBytes for GroupList {
    fn write_to_bytes<W: WriteBytesExt>(&self, mut writer: W) -> io::Result<()> {
        writer.write_u16::<LE>(count_u16(self.groups.len())?)?;
        for group in &self.groups {
            writer.write_bytes(group)?;
        }
        Ok(())
    }
}

impl WriteToBytes for GroupInfo {
    fn write_to_bytes<W: WriteBytesExt>(&self, mut writer: W) -> io::Result<()> {
        let count = u8::try_from(self.members.len())
            .map_err(|_| io::Error::new(io::ErrorKind::InvalidData, "too many members"))?;
        writer.write_u16::<LE>(self.id)?;
        writer.write_bytes(self.name)?;
        writer.write_u8(count)?;
        for &address in &self.members {
            writer.write_u64::<LE>(address)?;
        }
        Ok(())
    }
}

impl WriteToBytes for StatusBlock {
    fn write_to_bytes<W: WriteBytesExt>(&self, mut writer: W) -> io::Result<()> {
        writer.write_u64::<LE>(self.address)?;
        writer.write_u8(self.on)?;
        writer.write_u8(self.luminance)?;
        writer.write_u16::<LE>(self.temperature)?;
        writer.write_u8(self.red)?;
        writer.write_u8(self.green)?;
        writer.write_u8(self.blue)?;
        writer.write_u8(self.reserved)?;
        Ok(())
    }
}

impl WriteToBytes for LightRecord {
    fn write_to_bytes<W: WriteBytesExt>(&self, mut writer: W) -> io::Result<()> {
        writer.write_u16::<LE>(self.leading)?;
        writer.write_u64::<LE>(self.address)?;
        writer.write_bytes(self.status)?;
        writer.write_bytes(self.name)?;
        Ok(())
    }
}

impl WriteToBytes for AllLightStatus {
    fn write_to_bytes<W: WriteBytesExt>(&self, mut writer: W) -> io::Result<()> {
        writer.write_u16::<LE>(count_u16(self.lights.len())?)?;
        for light in &self.lights {
            writer.write_bytes(light)?;
        }
        Ok(())
    }
}

impl WriteToBytes for LightStatus {
    fn write_to_bytes<W: WriteBytesExt>(&self, mut writer: W) -> io::Result<()> {
        writer.write_all(&self.raw)
    }
}

impl WriteToBytes for Ack {
    fn write_to_bytes<W: WriteBytesExt>(&self, _writer: W) -> io::Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn name_bytes(text: &str) -> [u8; 16] {
        let mut bytes = [0u8; 16];
        bytes[..text.len()].copy_from_slice(text.as_bytes());
        bytes
    }

    fn light_record_bytes(
        address: u64,
        on: u8,
        luminance: u8,
        temperature: u16,
        rgb: [u8; 3],
        name: &str,
    ) -> Vec<u8> {
        let mut bytes = vec![0x34, 0x12];
        bytes.extend_from_slice(&address.to_le_bytes());
        bytes.extend_from_slice(&address.to_le_bytes());
        bytes.push(on);
        bytes.push(luminance);
        bytes.extend_from_slice(&temperature.to_le_bytes());
        bytes.extend_from_slice(&rgb);
        bytes.push(0xff);
        bytes.extend_from_slice(&name_bytes(name));
        assert_eq!(bytes.len(), LightRecord::SIZE_BYTES);
        bytes
    }

    #[test]
    fn test_all_light_status_two_records() {
        let mut payload = vec![0x02, 0x00];
        payload.extend(light_record_bytes(
            0x0017_8801_0203_0405,
            1,
            80,
            2700,
            [255, 128, 0],
            "Desk",
        ));
        payload.extend(light_record_bytes(
            0x0017_8801_0a0b_0c0d,
            0,
            5,
            6500,
            [1, 2, 3],
            "Hallway ceiling",
        ));

        let status = AllLightStatus::decode(&payload).unwrap();
        assert_eq!(status.lights.len(), 2);

        let desk = &status.lights[0];
        assert_eq!(desk.leading, 0x1234);
        assert_eq!(desk.address, 0x0017_8801_0203_0405);
        assert_eq!(desk.status.address, desk.address);
        assert_eq!(desk.name.to_string_lossy(), "Desk");
        assert_eq!(desk.status.on, 1);
        assert_eq!(desk.status.luminance, 80);
        assert_eq!(desk.status.temperature, 2700);
        assert_eq!(
            (desk.status.red, desk.status.green, desk.status.blue),
            (255, 128, 0)
        );

        let hall = &status.lights[1];
        assert_eq!(hall.address, 0x0017_8801_0a0b_0c0d);
        assert_eq!(hall.name.to_string_lossy(), "Hallway ceiling");
        assert_eq!(hall.status.on, 0);
        assert_eq!(hall.status.luminance, 5);
        assert_eq!(hall.status.temperature, 6500);
        assert_eq!(
            (hall.status.red, hall.status.green, hall.status.blue),
            (1, 2, 3)
        );
    }

    #[test]
    fn test_all_light_status_truncated() {
        let mut payload = vec![0x03, 0x00];
        payload.extend(light_record_bytes(1, 1, 50, 3000, [0, 0, 0], "One"));
        payload.extend(light_record_bytes(2, 1, 50, 3000, [0, 0, 0], "Two"));

        match AllLightStatus::decode(&payload) {
            Err(Error::TruncatedPayload { needed, available }) => {
                assert_eq!(needed, 3 * 42);
                assert_eq!(available, 2 * 42);
            }
            other => panic!("expected TruncatedPayload, got {:?}", other),
        }
    }

    #[test]
    fn test_all_light_status_huge_count() {
        let payload = [0xff, 0xff, 0x00];
        assert!(matches!(
            AllLightStatus::decode(&payload),
            Err(Error::TruncatedPayload { .. })
        ));
    }

    #[test]
    fn test_empty_payload_is_truncated() {
        assert!(matches!(
            GroupList::decode(&[]),
            Err(Error::TruncatedPayload { .. })
        ));
    }

    #[test]
    fn test_group_info_kitchen() {
        let addr1: u64 = 0x8418_2600_000a_1b2c;
        let addr2: u64 = 0x8418_2600_000d_3e4f;
        let mut payload = vec![0x03, 0x00];
        payload.extend_from_slice(&name_bytes("Kitchen"));
        payload.push(2);
        payload.extend_from_slice(&addr1.to_le_bytes());
        payload.extend_from_slice(&addr2.to_le_bytes());

        let info = GroupInfo::decode(&payload).unwrap();
        assert_eq!(info.id, 3);
        assert_eq!(info.name.to_string_lossy(), "Kitchen");
        assert_eq!(info.members, vec![addr1, addr2]);
    }

    #[test]
    fn test_group_info_truncated_members() {
        let mut payload = vec![0x03, 0x00];
        payload.extend_from_slice(&name_bytes("Kitchen"));
        payload.push(4);
        payload.extend_from_slice(&7u64.to_le_bytes());

        assert!(matches!(
            GroupInfo::decode(&payload),
            Err(Error::TruncatedPayload {
                needed: 32,
                available: 8
            })
        ));
    }

    #[test]
    fn test_group_list() {
        let mut payload = vec![0x02, 0x00];
        payload.extend_from_slice(&[0x01, 0x00]);
        payload.extend_from_slice(&name_bytes("Living room"));
        payload.extend_from_slice(&[0x05, 0x00]);
        payload.extend_from_slice(&name_bytes("Bedroom"));

        let list = GroupList::decode(&payload).unwrap();
        let entries: Vec<_> = list
            .groups
            .iter()
            .map(|g| (g.id, g.name.to_string_lossy()))
            .collect();
        assert_eq!(
            entries,
            vec![(1, "Living room".to_string()), (5, "Bedroom".to_string())]
        );
    }

    #[test]
    fn test_light_status_is_raw() {
        let status = LightStatus::decode(&[9, 8, 7]).unwrap();
        assert_eq!(status.raw, vec![9, 8, 7]);
    }

    #[test]
    fn test_reply_dispatch_by_code() {
        let list = GroupList {
            groups: vec![GroupSummary {
                id: 2,
                name: Name::new("Porch"),
            }],
        };
        let mut payload = Vec::new();
        payload.write_bytes(&list).unwrap();
        let frame = frame::encode_response(&Preamble::reply(0x1e, 3), &payload).unwrap();

        let (preamble, reply) = Reply::decode(&frame[2..]).unwrap();
        assert_eq!(preamble.sequence, 3);
        assert_eq!(reply, Reply::GroupList(list));

        let frame = frame::encode_response(&Preamble::reply(0x32, 4), &[0]).unwrap();
        let (_, reply) = Reply::decode(&frame[2..]).unwrap();
        assert_eq!(reply, Reply::Ack(CommandCode::SetPower));
    }

    #[test]
    fn test_reply_unknown_code() {
        let frame = frame::encode_response(&Preamble::reply(0x55, 1), &[]).unwrap();
        assert!(matches!(
            Reply::decode(&frame[2..]),
            Err(Error::UnknownCommand(0x55))
        ));
    }
}
