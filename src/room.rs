//! Room grouping with derived aggregate power.

use crate::config::RoomRecord;
use crate::packet::RoomPacket;

/// A named grouping of lights.
///
/// Membership is by name reference - a room never owns its lights. `power`
/// is derived: the logical OR of the member lights' power, recomputed by the
/// store after every operation that can affect it.
#[derive(Debug, Clone, PartialEq)]
pub struct Room {
    pub(crate) name: String,
    pub(crate) lights: Vec<String>,
    pub(crate) scenes: Vec<String>,
    pub(crate) power: bool,
}

impl Room {
    /// Create a new empty room with the given name.
    pub fn new(name: &str) -> Self {
        Room {
            name: name.to_string(),
            lights: Vec::new(),
            scenes: Vec::new(),
            power: false,
        }
    }

    pub fn from_record(record: &RoomRecord) -> Self {
        Room {
            name: record.name.clone(),
            lights: record.lights.clone(),
            scenes: record.scenes.clone(),
            power: false,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn lights(&self) -> &[String] {
        &self.lights
    }

    pub fn scenes(&self) -> &[String] {
        &self.scenes
    }

    pub fn power(&self) -> bool {
        self.power
    }

    pub fn record(&self) -> RoomRecord {
        RoomRecord {
            name: self.name.clone(),
            lights: self.lights.clone(),
            scenes: self.scenes.clone(),
        }
    }

    pub fn info_packet(&self) -> RoomPacket {
        RoomPacket {
            name: self.name.clone(),
            lights: self.lights.clone(),
            power: self.power,
            scenes: self.scenes.clone(),
        }
    }
}
