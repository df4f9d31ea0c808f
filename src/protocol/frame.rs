//! Framing of command and response bodies.

use byteorder::{WriteBytesExt, LE};
use std::io;

use super::{
    Command, CommandCode, PayloadReader, Scope, WriteToBytes, GLOBAL_HEADER_LEN, MARKER,
    PROTOCOL_VERSION, RESPONSE_PREAMBLE_LEN,
};
use crate::error::{Error, Result};

/// The header fields of an outbound command.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct RequestHeader {
    pub command: u8,
    pub sequence: u8,
    /// Present only for group-scoped commands.
    pub group: Option<u8>,
}

/// The 7-byte preamble at the start of every inbound body.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct Preamble {
    pub marker: u8,
    pub command: u8,
    pub reserved: [u8; 2],
    pub version: u8,
    pub sequence: u8,
    /// Trailing preamble byte. Its meaning is unconfirmed; kept as received.
    pub extra: u8,
}

impl RequestHeader {
    fn len(&self) -> usize {
        match self.group {
            Some(_) => Scope::Group.header_len(),
            None => Scope::Global.header_len(),
        }
    }
}

impl WriteToBytes for RequestHeader {
    fn write_to_bytes<W: WriteBytesExt>(&self, mut writer: W) -> io::Result<()> {
        writer.write_u8(MARKER)?;
        writer.write_u8(self.command)?;
        writer.write_all(&[0, 0])?;
        writer.write_u8(PROTOCOL_VERSION)?;
        writer.write_u8(self.sequence)?;
        if let Some(group) = self.group {
            writer.write_u8(group)?;
            writer.write_all(&[0; 7])?;
        }
        Ok(())
    }
}

impl WriteToBytes for Preamble {
    fn write_to_bytes<W: WriteBytesExt>(&self, mut writer: W) -> io::Result<()> {
        writer.write_u8(self.marker)?;
        writer.write_u8(self.command)?;
        writer.write_all(&self.reserved)?;
        writer.write_u8(self.version)?;
        writer.write_u8(self.sequence)?;
        writer.write_u8(self.extra)?;
        Ok(())
    }
}

impl Preamble {
    /// A preamble as the gateway sends it in reply to `command`.
    pub fn reply(command: u8, sequence: u8) -> Self {
        Preamble {
            marker: MARKER,
            command,
            reserved: [0; 2],
            version: PROTOCOL_VERSION,
            sequence,
            extra: 0,
        }
    }
}

/// Builds a complete frame: length prefix, header and payload.
///
/// `group` selects the 14-byte group header; without it the 6-byte global
/// header is used.
pub fn encode_raw(command: u8, sequence: u8, group: Option<u8>, payload: &[u8]) -> Result<Vec<u8>> {
    let header = RequestHeader {
        command,
        sequence,
        group,
    };
    frame_body(header.len() + payload.len(), |bytes| {
        header.write_to_bytes(&mut *bytes)?;
        bytes.extend_from_slice(payload);
        Ok(())
    })
}

/// Encodes a typed command into a complete frame.
pub fn encode<C: Command>(sequence: u8, command: &C) -> Result<Vec<u8>> {
    let mut payload = Vec::new();
    command.write_to_bytes(&mut payload)?;
    encode_raw(C::CODE.to_protocol(), sequence, command.group(), &payload)
}

/// Builds a complete response frame, as a gateway would send it.
pub fn encode_response(preamble: &Preamble, payload: &[u8]) -> Result<Vec<u8>> {
    frame_body(RESPONSE_PREAMBLE_LEN + payload.len(), |bytes| {
        preamble.write_to_bytes(&mut *bytes)?;
        bytes.extend_from_slice(payload);
        Ok(())
    })
}

fn frame_body<F>(body_len: usize, write_body: F) -> Result<Vec<u8>>
where
    F: FnOnce(&mut Vec<u8>) -> io::Result<()>,
{
    let declared = u16::try_from(body_len).map_err(|_| {
        Error::invalid_parameter(format!(
            "frame body of {} bytes exceeds the {} byte limit",
            body_len,
            u16::MAX
        ))
    })?;
    let mut bytes = Vec::with_capacity(super::LENGTH_PREFIX_LEN + body_len);
    bytes.write_u16::<LE>(declared)?;
    write_body(&mut bytes)?;
    Ok(bytes)
}

/// Splits an outbound body (length prefix already removed) into its header
/// and payload. The header size follows from the command code's scope.
pub fn decode_request(body: &[u8]) -> Result<(RequestHeader, &[u8])> {
    if body.len() < GLOBAL_HEADER_LEN {
        return Err(Error::malformed(format!(
            "command body of {} bytes is shorter than the {} byte header",
            body.len(),
            GLOBAL_HEADER_LEN
        )));
    }
    if body[0] != MARKER {
        return Err(Error::malformed(format!("bad marker byte 0x{:02x}", body[0])));
    }
    let command = body[1];
    let code = CommandCode::from_protocol(command).ok_or(Error::UnknownCommand(command))?;
    let header_len = code.scope().header_len();
    if body.len() < header_len {
        return Err(Error::malformed(format!(
            "{} body of {} bytes is shorter than the {} byte header",
            code,
            body.len(),
            header_len
        )));
    }
    let group = match code.scope() {
        Scope::Group => Some(body[GLOBAL_HEADER_LEN]),
        Scope::Global => None,
    };
    let header = RequestHeader {
        command,
        sequence: body[5],
        group,
    };
    Ok((header, &body[header_len..]))
}

/// Splits an inbound body (length prefix already removed) into its
/// preamble and the response-specific payload.
pub fn decode_response(body: &[u8]) -> Result<(Preamble, &[u8])> {
    if body.len() < RESPONSE_PREAMBLE_LEN {
        return Err(Error::malformed(format!(
            "response body of {} bytes is shorter than the {} byte preamble",
            body.len(),
            RESPONSE_PREAMBLE_LEN
        )));
    }
    let mut reader = PayloadReader::new(body);
    let preamble = Preamble {
        marker: reader.read_u8()?,
        command: reader.read_u8()?,
        reserved: reader.read_array()?,
        version: reader.read_u8()?,
        sequence: reader.read_u8()?,
        extra: reader.read_u8()?,
    };
    Ok((preamble, reader.rest()))
}
