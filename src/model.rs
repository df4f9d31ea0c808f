//! The in-memory picture of a gateway's lights and groups.

use log::debug;
use std::collections::BTreeMap;

use crate::protocol::response::{self, LightRecord};
use crate::types::{Group, GroupId, Light, LightAddress, LightState};

/// Lights keyed by address and groups keyed by id, as last reported.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DeviceModel {
    lights: BTreeMap<LightAddress, Light>,
    groups: BTreeMap<GroupId, Group>,
}

impl DeviceModel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lights(&self) -> &BTreeMap<LightAddress, Light> {
        &self.lights
    }

    pub fn light(&self, address: LightAddress) -> Option<&Light> {
        self.lights.get(&address)
    }

    pub fn groups(&self) -> &BTreeMap<GroupId, Group> {
        &self.groups
    }

    pub fn group(&self, id: GroupId) -> Option<&Group> {
        self.groups.get(&id)
    }

    /// Reconciles a full light enumeration.
    ///
    /// Lights already known keep their entry (and name) and get the new
    /// state; unknown addresses get a new light. Addresses absent from
    /// `records` are dropped, so the map always mirrors the latest
    /// enumeration.
    pub fn apply_all_light_status(&mut self, records: &[LightRecord]) {
        let mut previous = std::mem::take(&mut self.lights);
        let mut created = 0;
        for record in records {
            let address = LightAddress(record.address);
            let existing = self
                .lights
                .remove(&address)
                .or_else(|| previous.remove(&address));
            let light = match existing {
                Some(mut light) => {
                    light.replace_state(LightState::from_protocol(&record.status));
                    light
                }
                None => {
                    created += 1;
                    Light::from_record(record)
                }
            };
            self.lights.insert(address, light);
        }
        debug!(
            "light status: {} lights ({} new, {} dropped)",
            self.lights.len(),
            created,
            previous.len()
        );
    }

    /// Replaces the group set with the groups of a group-list reply.
    /// Groups listed this way carry no members.
    pub fn apply_group_list(&mut self, list: &response::GroupList) {
        self.groups = list
            .groups
            .iter()
            .map(|summary| {
                let group = Group::from_summary(summary);
                (group.id(), group)
            })
            .collect();
    }

    /// Replaces one group outright with the result of a group-info reply.
    pub fn apply_group_info(&mut self, info: &response::GroupInfo) {
        let group = Group::from_info(info);
        self.groups.insert(group.id(), group);
    }
}
