//! Light and group types.
//!
//! These are the decoded, owned forms of what the gateway reports. Wire
//! records from [`protocol::response`](crate::protocol::response) are
//! converted into them by the device model.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{Error, Result};
use crate::protocol::response::{GroupInfo, GroupSummary, LightRecord, StatusBlock};

/// The network-assigned 64-bit address of a light.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct LightAddress(pub u64);

/// The 16-bit id of a group.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct GroupId(pub u16);

/// An 8-bit per channel colour.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Rgb {
    pub red: u8,
    pub green: u8,
    pub blue: u8,
}

/// The replaceable part of a light: everything reported by a status update.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct LightState {
    pub on: bool,
    /// Luminance, 0-100.
    pub luminance: u8,
    /// Colour temperature in Kelvin.
    pub temperature: u16,
    pub rgb: Rgb,
}

/// One addressable light.
///
/// The address is fixed at construction. The name is taken from the first
/// status record that mentions the light; the state is replaced on every
/// later update.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Light {
    address: LightAddress,
    name: String,
    state: LightState,
}

/// A named collection of lights.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Group {
    id: GroupId,
    name: String,
    members: Vec<LightAddress>,
}

impl LightAddress {
    pub fn to_protocol(&self) -> u64 {
        self.0
    }
}

impl From<u64> for LightAddress {
    fn from(address: u64) -> Self {
        LightAddress(address)
    }
}

impl From<LightAddress> for u64 {
    fn from(address: LightAddress) -> u64 {
        address.0
    }
}

impl fmt::Display for LightAddress {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{:016X}", self.0)
    }
}

impl GroupId {
    /// The id as carried in the one-byte group slot of a command header.
    pub fn wire_id(&self) -> Result<u8> {
        u8::try_from(self.0).map_err(|_| {
            Error::invalid_parameter(format!(
                "group id {} does not fit the one-byte command header",
                self.0
            ))
        })
    }
}

impl From<u16> for GroupId {
    fn from(id: u16) -> Self {
        GroupId(id)
    }
}

impl fmt::Display for GroupId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Rgb {
    pub fn new(red: u8, green: u8, blue: u8) -> Self {
        Rgb { red, green, blue }
    }
}

impl LightState {
    pub fn from_protocol(status: &StatusBlock) -> Self {
        LightState {
            on: status.on != 0,
            luminance: status.luminance,
            temperature: status.temperature,
            rgb: Rgb::new(status.red, status.green, status.blue),
        }
    }
}

impl Light {
    pub fn new(address: LightAddress, name: impl Into<String>, state: LightState) -> Self {
        Light {
            address,
            name: name.into(),
            state,
        }
    }

    /// Creates a light from its first status record.
    pub fn from_record(record: &LightRecord) -> Self {
        Light::new(
            LightAddress(record.address),
            record.name.to_string_lossy(),
            LightState::from_protocol(&record.status),
        )
    }

    pub fn address(&self) -> LightAddress {
        self.address
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn state(&self) -> &LightState {
        &self.state
    }

    pub fn is_on(&self) -> bool {
        self.state.on
    }

    pub fn luminance(&self) -> u8 {
        self.state.luminance
    }

    pub fn temperature(&self) -> u16 {
        self.state.temperature
    }

    pub fn rgb(&self) -> Rgb {
        self.state.rgb
    }

    /// Replaces the reported state, keeping address and name.
    pub fn replace_state(&mut self, state: LightState) {
        self.state = state;
    }
}

impl fmt::Display for Light {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "<light: {}>", self.name)
    }
}

impl Group {
    pub fn new(
        id: GroupId,
        name: impl Into<String>,
        members: impl IntoIterator<Item = LightAddress>,
    ) -> Self {
        Group {
            id,
            name: name.into(),
            members: members.into_iter().collect(),
        }
    }

    /// A group known only from the group list, so without members.
    pub fn from_summary(summary: &GroupSummary) -> Self {
        Group::new(
            GroupId(summary.id),
            summary.name.to_string_lossy(),
            Vec::new(),
        )
    }

    pub fn from_info(info: &GroupInfo) -> Self {
        Group::new(
            GroupId(info.id),
            info.name.to_string_lossy(),
            info.members.iter().copied().map(LightAddress),
        )
    }

    pub fn id(&self) -> GroupId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Member addresses in gateway order.
    pub fn members(&self) -> &[LightAddress] {
        &self.members
    }
}

impl fmt::Display for Group {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "<group: {}>", self.name)
    }
}
