//! Saved lighting presets.

use std::collections::BTreeMap;

use crate::color::Color;
use crate::config::SceneRecord;
use crate::packet::{LightStateEntry, ScenePacket};

/// A captured per-light state snapshot.
#[derive(Debug, Clone, PartialEq)]
pub struct LightState {
    pub color: Color,
    pub mode: String,
    pub power: bool,
    pub brightness: u32,
}

/// A named, room-associated snapshot of per-light states.
///
/// Applying a scene overwrites the live state of every referenced light and
/// pushes each captured state to its device.
#[derive(Debug, Clone, PartialEq)]
pub struct Scene {
    pub(crate) name: String,
    pub(crate) room: String,
    pub(crate) light_states: BTreeMap<String, LightState>,
}

impl Scene {
    pub fn new(name: &str, room: &str, entries: Vec<LightStateEntry>) -> Self {
        Scene {
            name: name.to_string(),
            room: room.to_string(),
            light_states: collect_states(entries),
        }
    }

    pub fn from_record(record: &SceneRecord) -> Self {
        Scene {
            name: record.name.clone(),
            room: record.room.clone(),
            light_states: collect_states(record.light_states.clone()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn room(&self) -> &str {
        &self.room
    }

    pub fn light_states(&self) -> &BTreeMap<String, LightState> {
        &self.light_states
    }

    /// Wholesale-replace the captured states.
    pub fn set_light_states(&mut self, entries: Vec<LightStateEntry>) {
        self.light_states = collect_states(entries);
    }

    /// Drop the captured state for one light, if present.
    pub fn remove_light_state(&mut self, light: &str) -> bool {
        self.light_states.remove(light).is_some()
    }

    pub fn record(&self) -> SceneRecord {
        SceneRecord {
            name: self.name.clone(),
            room: self.room.clone(),
            light_states: self.entries(),
        }
    }

    pub fn info_packet(&self) -> ScenePacket {
        ScenePacket {
            name: self.name.clone(),
            room: self.room.clone(),
            light_states: self.entries(),
        }
    }

    fn entries(&self) -> Vec<LightStateEntry> {
        self.light_states
            .iter()
            .map(|(name, state)| LightStateEntry {
                name: name.clone(),
                color: state.color,
                mode: state.mode.clone(),
                power: state.power,
                brightness: state.brightness,
            })
            .collect()
    }
}

fn collect_states(entries: Vec<LightStateEntry>) -> BTreeMap<String, LightState> {
    entries
        .into_iter()
        .map(|entry| {
            (
                entry.name,
                LightState {
                    color: entry.color,
                    mode: entry.mode,
                    power: entry.power,
                    brightness: entry.brightness,
                },
            )
        })
        .collect()
}
