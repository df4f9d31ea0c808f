//! A request/response session with one gateway.
//!
//! The protocol allows exactly one outstanding request per connection.
//! Every operation takes `&mut self`, sends one command frame and reads
//! exactly one response frame before returning, so requests can never
//! overlap. Callers sharing a session across threads must serialize access
//! themselves.

use log::{debug, warn};
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io::Write;
use std::net::{self, IpAddr, Shutdown, SocketAddr, TcpStream};
use std::time::{Duration, Instant};

use crate::error::{Error, Result};
use crate::model::DeviceModel;
use crate::protocol::command::{self, Command, DEFAULT_VERBOSITY};
use crate::protocol::response::{self, Response};
use crate::protocol::{self as wire, CommandCode, GATEWAY_PORT};
use crate::transport::{self, TimedRead};
use crate::types::{Group, GroupId, Light, LightAddress, Rgb};

/// How long to wait for a complete response frame by default.
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(5);

/// Highest luminance the gateway accepts.
pub const MAX_LUMINANCE: u8 = 100;

// =============================================================================
// Config
// =============================================================================

/// Connection settings for [`connect_with`].
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Config {
    pub port: u16,
    pub connect_timeout: Option<Duration>,
    /// Deadline for receiving one whole response frame.
    pub read_timeout: Option<Duration>,
    pub write_timeout: Option<Duration>,
    pub nodelay: bool,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            port: GATEWAY_PORT,
            connect_timeout: None,
            read_timeout: Some(DEFAULT_READ_TIMEOUT),
            write_timeout: None,
            nodelay: true,
        }
    }
}

impl Config {
    pub fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn connect_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn read_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.read_timeout = timeout;
        self
    }

    pub fn write_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.write_timeout = timeout;
        self
    }

    pub fn nodelay(mut self, nodelay: bool) -> Self {
        self.nodelay = nodelay;
        self
    }
}

// =============================================================================
// Session
// =============================================================================

/// One connection to a gateway together with its sequence counter and the
/// device model built from its replies.
pub struct Session<S = TcpStream> {
    stream: S,
    sequence: u8,
    response_timeout: Option<Duration>,
    model: DeviceModel,
    closed: bool,
}

impl<S: TimedRead + Write> Session<S> {
    /// Wraps an established byte stream.
    pub fn new(stream: S) -> Self {
        Session {
            stream,
            sequence: 1,
            response_timeout: Some(DEFAULT_READ_TIMEOUT),
            model: DeviceModel::new(),
            closed: false,
        }
    }

    /// Sets the deadline for receiving one whole response frame. It bounds
    /// every blocking read of the reply, whatever the stream's own timeout.
    /// A deadline too far out to represent is treated as none.
    pub fn set_response_timeout(&mut self, timeout: Option<Duration>) {
        self.response_timeout = timeout;
    }

    /// The sequence number used by the most recent command.
    pub fn sequence(&self) -> u8 {
        self.sequence
    }

    /// Advances the sequence counter. The first command of a session
    /// carries sequence 2; the counter wraps after 255.
    pub fn next_sequence(&mut self) -> u8 {
        self.sequence = self.sequence.wrapping_add(1);
        self.sequence
    }

    pub fn model(&self) -> &DeviceModel {
        &self.model
    }

    pub fn lights(&self) -> &BTreeMap<LightAddress, Light> {
        self.model.lights()
    }

    pub fn light(&self, address: LightAddress) -> Option<&Light> {
        self.model.light(address)
    }

    pub fn groups(&self) -> &BTreeMap<GroupId, Group> {
        self.model.groups()
    }

    pub fn group(&self, id: GroupId) -> Option<&Group> {
        self.model.group(id)
    }

    /// True once a transport failure has left the stream unusable.
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    pub fn get_ref(&self) -> &S {
        &self.stream
    }

    pub fn into_inner(self) -> S {
        self.stream
    }

    /// Sends one command and decodes the single reply frame.
    ///
    /// Transport failures close the session, since a half-read frame
    /// leaves the stream at an unknown position. Decode failures happen
    /// after the whole frame was consumed and leave the session usable.
    pub fn request<C: Command>(&mut self, command: C) -> Result<C::Response> {
        if self.closed {
            return Err(Error::SessionClosed);
        }
        let sequence = self.next_sequence();
        let frame = wire::encode(sequence, &command)?;
        debug!("request {} seq {}", C::CODE, sequence);

        let body = match self.exchange(&frame) {
            Ok(body) => body,
            Err(err) => {
                if err.invalidates_session() {
                    warn!("closing session after {} failed: {}", C::CODE, err);
                    self.closed = true;
                }
                return Err(err);
            }
        };

        let (preamble, payload) = wire::decode_response(&body)?;
        let code = CommandCode::from_protocol(preamble.command)
            .ok_or(Error::UnknownCommand(preamble.command))?;
        if code != C::CODE {
            return Err(Error::UnexpectedResponse {
                expected: C::CODE.to_protocol(),
                received: preamble.command,
            });
        }
        C::Response::decode(payload)
    }

    fn exchange(&mut self, frame: &[u8]) -> Result<Vec<u8>> {
        transport::write_frame(&mut self.stream, frame)?;
        let deadline = self
            .response_timeout
            .and_then(|timeout| Instant::now().checked_add(timeout));
        transport::read_frame(&mut self.stream, deadline)
    }

    /// Lists the gateway's groups by id and name.
    ///
    /// The group set in the model is replaced by this list.
    pub fn group_list(&mut self) -> Result<BTreeMap<GroupId, String>> {
        let list = self.request(command::GroupList)?;
        debug!("group list: {} groups", list.groups.len());
        self.model.apply_group_list(&list);
        Ok(list
            .groups
            .iter()
            .map(|g| (GroupId(g.id), g.name.to_string_lossy()))
            .collect())
    }

    /// Fetches one group's name and members and returns the member
    /// addresses in gateway order.
    pub fn group_info(&mut self, group: GroupId) -> Result<Vec<LightAddress>> {
        let info = self.request(command::GroupInfo {
            group: group.wire_id()?,
        })?;
        debug!("group {}: {} members", info.id, info.members.len());
        self.model.apply_group_info(&info);
        Ok(info.members.iter().copied().map(LightAddress).collect())
    }

    /// Re-enumerates every light and reconciles the model with the result.
    pub fn update_all_light_status(&mut self) -> Result<&BTreeMap<LightAddress, Light>> {
        let status = self.request(command::AllLightStatus {
            verbosity: DEFAULT_VERBOSITY,
        })?;
        self.model.apply_all_light_status(&status.lights);
        Ok(self.model.lights())
    }

    /// Queries one light. The reply is returned undecoded.
    pub fn light_status(&mut self, address: LightAddress) -> Result<response::LightStatus> {
        self.request(command::LightStatus {
            address: address.to_protocol(),
        })
    }

    pub fn set_power(&mut self, group: GroupId, on: bool) -> Result<()> {
        self.request(command::SetPower {
            group: group.wire_id()?,
            on,
        })?;
        Ok(())
    }

    /// Sets a group's luminance. Levels above 100 are clamped.
    pub fn set_luminance(&mut self, group: GroupId, level: u8, transition: u16) -> Result<()> {
        if level > MAX_LUMINANCE {
            warn!("luminance {} clamped to {}", level, MAX_LUMINANCE);
        }
        self.request(command::SetLuminance {
            group: group.wire_id()?,
            level: level.min(MAX_LUMINANCE),
            transition,
        })?;
        Ok(())
    }

    pub fn set_temperature(&mut self, group: GroupId, kelvin: u16) -> Result<()> {
        self.request(command::SetTemperature {
            group: group.wire_id()?,
            kelvin,
        })?;
        Ok(())
    }

    pub fn set_color(&mut self, group: GroupId, rgb: Rgb, transition: u16) -> Result<()> {
        self.request(command::SetColor {
            group: group.wire_id()?,
            red: rgb.red,
            green: rgb.green,
            blue: rgb.blue,
            transition,
        })?;
        Ok(())
    }
}

// =============================================================================
// Connection
// =============================================================================

impl Session<TcpStream> {
    /// Sets both the socket read timeout and the per-frame deadline.
    pub fn set_read_timeout(&mut self, duration: Option<Duration>) -> Result<()> {
        self.stream.set_read_timeout(duration)?;
        self.response_timeout = duration;
        Ok(())
    }

    pub fn set_write_timeout(&self, duration: Option<Duration>) -> Result<()> {
        self.stream.set_write_timeout(duration)?;
        Ok(())
    }

    pub fn set_nodelay(&self, nodelay: bool) -> Result<()> {
        self.stream.set_nodelay(nodelay)?;
        Ok(())
    }

    pub fn peer_addr(&self) -> Result<SocketAddr> {
        Ok(self.stream.peer_addr()?)
    }

    /// Shuts the connection down. Any in-flight exchange is abandoned.
    pub fn close(self) -> Result<()> {
        self.stream.shutdown(Shutdown::Both)?;
        Ok(())
    }
}

/// Connects to the gateway at `ip` on the standard port.
pub fn connect(ip: IpAddr) -> Result<Session<TcpStream>> {
    connect_with(ip, &Config::default())
}

/// Connects with a bound on how long establishing the connection may take.
pub fn connect_timeout(ip: IpAddr, timeout: Duration) -> Result<Session<TcpStream>> {
    connect_with(ip, &Config::default().connect_timeout(Some(timeout)))
}

pub fn connect_with(ip: IpAddr, config: &Config) -> Result<Session<TcpStream>> {
    let addr = SocketAddr::new(ip, config.port);
    let stream = match config.connect_timeout {
        Some(timeout) => net::TcpStream::connect_timeout(&addr, timeout)?,
        None => net::TcpStream::connect(addr)?,
    };
    stream.set_nodelay(config.nodelay)?;
    stream.set_read_timeout(config.read_timeout)?;
    stream.set_write_timeout(config.write_timeout)?;
    debug!("connected to gateway at {}", addr);

    let mut session = Session::new(stream);
    session.set_response_timeout(config.read_timeout);
    Ok(session)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::frame::{encode_response, Preamble};
    use crate::protocol::response::{GroupInfo, LightRecord, StatusBlock};
    use crate::protocol::{decode_request, Name, WriteBytes, WriteToBytes};
    use std::io::{self, Cursor, Read};

    /// Replays scripted gateway replies and records everything written.
    struct MockStream {
        input: Cursor<Vec<u8>>,
        written: Vec<u8>,
    }

    impl MockStream {
        fn new(replies: &[Vec<u8>]) -> Self {
            MockStream {
                input: Cursor::new(replies.concat()),
                written: Vec::new(),
            }
        }

        /// Splits everything written into frame bodies.
        fn sent_bodies(&self) -> Vec<Vec<u8>> {
            let mut bodies = Vec::new();
            let mut rest = &self.written[..];
            while rest.len() >= 2 {
                let len = u16::from_le_bytes([rest[0], rest[1]]) as usize;
                bodies.push(rest[2..2 + len].to_vec());
                rest = &rest[2 + len..];
            }
            bodies
        }
    }

    impl Read for MockStream {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            self.input.read(buf)
        }
    }

    impl TimedRead for MockStream {}

    impl Write for MockStream {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.written.write(buf)
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    fn reply<P: WriteToBytes>(command: u8, payload: P) -> Vec<u8> {
        let mut bytes = Vec::new();
        bytes.write_bytes(payload).unwrap();
        encode_response(&Preamble::reply(command, 0), &bytes).unwrap()
    }

    fn ack(command: u8) -> Vec<u8> {
        encode_response(&Preamble::reply(command, 0), &[0]).unwrap()
    }

    fn light(address: u64, name: &str, luminance: u8) -> LightRecord {
        LightRecord {
            leading: 0,
            address,
            status: StatusBlock {
                address,
                on: 1,
                luminance,
                temperature: 3000,
                red: 0,
                green: 0,
                blue: 0,
                reserved: 0,
            },
            name: Name::new(name),
        }
    }

    fn status(lights: Vec<LightRecord>) -> Vec<u8> {
        reply(0x13, response::AllLightStatus { lights })
    }

    #[test]
    fn test_first_command_uses_sequence_two() {
        let mut session = Session::new(MockStream::new(&[ack(0x32)]));
        session.set_power(GroupId(1), true).unwrap();

        let bodies = session.get_ref().sent_bodies();
        let (header, payload) = decode_request(&bodies[0]).unwrap();
        assert_eq!(header.sequence, 2);
        assert_eq!(header.group, Some(1));
        assert_eq!(payload, &[1]);
    }

    #[test]
    fn test_sequence_increases_and_wraps() {
        let mut session = Session::new(MockStream::new(&[]));
        let mut previous = session.sequence();
        for _ in 0..300 {
            let next = session.next_sequence();
            assert_eq!(next, previous.wrapping_add(1));
            previous = next;
        }
    }

    #[test]
    fn test_control_commands_on_the_wire() {
        let replies = [ack(0x31), ack(0x33), ack(0x36)];
        let mut session = Session::new(MockStream::new(&replies));
        session.set_luminance(GroupId(4), 150, 20).unwrap();
        session.set_temperature(GroupId(4), 2700).unwrap();
        session
            .set_color(GroupId(4), Rgb::new(255, 0, 16), 0)
            .unwrap();

        let bodies = session.get_ref().sent_bodies();
        let payloads: Vec<Vec<u8>> = bodies
            .iter()
            .map(|body| decode_request(body).unwrap().1.to_vec())
            .collect();
        assert_eq!(payloads[0], vec![100, 20, 0]);
        assert_eq!(payloads[1], vec![0x8c, 0x0a, 10, 0]);
        assert_eq!(payloads[2], vec![255, 0, 16, 0xff, 0, 0]);

        let sequences: Vec<u8> = bodies
            .iter()
            .map(|body| decode_request(body).unwrap().0.sequence)
            .collect();
        assert_eq!(sequences, vec![2, 3, 4]);
    }

    #[test]
    fn test_status_updates_model() {
        let replies = [
            status(vec![light(0x10, "Desk", 20), light(0x20, "Lamp", 40)]),
            status(vec![light(0x10, "Desk", 70)]),
        ];
        let mut session = Session::new(MockStream::new(&replies));

        let lights = session.update_all_light_status().unwrap();
        assert_eq!(lights.len(), 2);

        session.update_all_light_status().unwrap();
        assert_eq!(session.lights().len(), 1);
        assert_eq!(session.light(LightAddress(0x10)).unwrap().luminance(), 70);
    }

    #[test]
    fn test_failed_decode_leaves_model_untouched() {
        let mut truncated = Vec::new();
        truncated
            .write_bytes(response::AllLightStatus {
                lights: vec![light(0x30, "Porch", 10)],
            })
            .unwrap();
        truncated[0] = 2;
        let replies = [
            status(vec![light(0x10, "Desk", 20)]),
            encode_response(&Preamble::reply(0x13, 0), &truncated).unwrap(),
        ];
        let mut session = Session::new(MockStream::new(&replies));
        session.update_all_light_status().unwrap();

        let err = session.update_all_light_status().unwrap_err();
        assert!(matches!(err, Error::TruncatedPayload { .. }));
        assert!(!session.is_closed());
        assert_eq!(session.lights().len(), 1);
        assert!(session.light(LightAddress(0x10)).is_some());
    }

    #[test]
    fn test_group_info_and_list() {
        let info = GroupInfo {
            id: 3,
            name: Name::new("Kitchen"),
            members: vec![0xa1, 0xa2],
        };
        let list = response::GroupList {
            groups: vec![response::GroupSummary {
                id: 3,
                name: Name::new("Kitchen"),
            }],
        };
        let replies = [reply(0x26, &info), reply(0x1e, &list)];
        let mut session = Session::new(MockStream::new(&replies));

        let members = session.group_info(GroupId(3)).unwrap();
        assert_eq!(members, vec![LightAddress(0xa1), LightAddress(0xa2)]);
        assert_eq!(session.group(GroupId(3)).unwrap().members().len(), 2);

        let groups = session.group_list().unwrap();
        assert_eq!(groups.get(&GroupId(3)).map(String::as_str), Some("Kitchen"));
        assert!(session.group(GroupId(3)).unwrap().members().is_empty());
    }

    #[test]
    fn test_light_status_returns_raw_payload() {
        let replies = [encode_response(&Preamble::reply(0x68, 0), &[1, 2, 3]).unwrap()];
        let mut session = Session::new(MockStream::new(&replies));
        let status = session.light_status(LightAddress(0x55)).unwrap();
        assert_eq!(status.raw, vec![1, 2, 3]);

        let bodies = session.get_ref().sent_bodies();
        let (_, payload) = decode_request(&bodies[0]).unwrap();
        assert_eq!(payload, &0x55u64.to_le_bytes());
    }

    #[test]
    fn test_mismatched_reply_is_rejected() {
        let mut session = Session::new(MockStream::new(&[ack(0x32)]));
        let err = session.set_temperature(GroupId(1), 3000).unwrap_err();
        assert!(matches!(
            err,
            Error::UnexpectedResponse {
                expected: 0x33,
                received: 0x32
            }
        ));
        assert!(!session.is_closed());
    }

    #[test]
    fn test_unknown_reply_code() {
        let replies = [encode_response(&Preamble::reply(0x77, 0), &[]).unwrap()];
        let mut session = Session::new(MockStream::new(&replies));
        assert!(matches!(
            session.set_power(GroupId(1), false),
            Err(Error::UnknownCommand(0x77))
        ));
    }

    #[test]
    fn test_closed_connection_invalidates_session() {
        let mut partial = status(vec![light(0x10, "Desk", 20)]);
        partial.truncate(20);
        let mut session = Session::new(MockStream::new(&[partial]));

        assert!(session
            .update_all_light_status()
            .unwrap_err()
            .is_connection_closed());
        assert!(session.is_closed());
        assert!(session.lights().is_empty());
        assert!(matches!(
            session.set_power(GroupId(1), true),
            Err(Error::SessionClosed)
        ));
    }

    #[test]
    fn test_unbounded_response_timeout() {
        let mut session = Session::new(MockStream::new(&[ack(0x32), ack(0x32)]));
        session.set_response_timeout(Some(Duration::MAX));
        session.set_power(GroupId(1), true).unwrap();

        session.set_response_timeout(None);
        session.set_power(GroupId(1), false).unwrap();
        assert!(!session.is_closed());
    }

    #[test]
    fn test_group_id_out_of_range() {
        let mut session = Session::new(MockStream::new(&[]));
        assert!(matches!(
            session.set_power(GroupId(300), true),
            Err(Error::InvalidParameter(_))
        ));
        assert!(session.get_ref().written.is_empty());
    }
}
