//! Individual light state.

use crate::color::Color;
use crate::config::LightRecord;
use crate::packet::{LightPacket, LightRegistration};

/// A registered addressable LED light.
///
/// A `Light` mirrors the last state announced by (or pushed to) one physical
/// device. Identity is the unique `name`; the device's network address is
/// kept so the hub can reach it, but never exposed in info packets.
#[derive(Debug, Clone, PartialEq)]
pub struct Light {
    pub(crate) name: String,
    pub(crate) rooms: Vec<String>,
    pub(crate) led_count: u32,
    pub(crate) color: Color,
    pub(crate) brightness: u32,
    pub(crate) mode: String,
    pub(crate) power: bool,
    pub(crate) modes: Vec<String>,
    pub(crate) ip: String,
}

impl Light {
    /// Create a light from its first registration packet.
    pub fn from_registration(reg: &LightRegistration) -> Self {
        Light {
            name: reg.name.clone(),
            rooms: Vec::new(),
            led_count: reg.led_count,
            color: reg.color,
            brightness: reg.brightness,
            mode: reg.mode.clone(),
            power: reg.power,
            modes: reg.modes.clone(),
            ip: reg.ip.clone(),
        }
    }

    /// Restore a light from its persisted record.
    ///
    /// Volatile state starts at defaults until the device re-announces.
    pub fn from_record(record: &LightRecord) -> Self {
        Light {
            name: record.name.clone(),
            rooms: record.rooms.clone(),
            led_count: record.led_count,
            color: Color::new(),
            brightness: 0,
            mode: String::new(),
            power: false,
            modes: record.modes.clone(),
            ip: record.ip.clone(),
        }
    }

    /// Overwrite with the fields of a re-registration (device heartbeat).
    ///
    /// Room membership is owned by the hub and survives untouched.
    pub fn apply_registration(&mut self, reg: &LightRegistration) {
        self.led_count = reg.led_count;
        self.color = reg.color;
        self.brightness = reg.brightness;
        self.mode = reg.mode.clone();
        self.power = reg.power;
        self.modes = reg.modes.clone();
        self.ip = reg.ip.clone();
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn rooms(&self) -> &[String] {
        &self.rooms
    }

    pub fn power(&self) -> bool {
        self.power
    }

    pub fn brightness(&self) -> u32 {
        self.brightness
    }

    pub fn mode(&self) -> &str {
        &self.mode
    }

    pub fn color(&self) -> Color {
        self.color
    }

    pub fn ip(&self) -> &str {
        &self.ip
    }

    /// The identity fields written to the config store.
    pub fn record(&self) -> LightRecord {
        LightRecord {
            name: self.name.clone(),
            rooms: self.rooms.clone(),
            led_count: self.led_count,
            modes: self.modes.clone(),
            ip: self.ip.clone(),
        }
    }

    pub fn info_packet(&self) -> LightPacket {
        LightPacket {
            name: self.name.clone(),
            rooms: self.rooms.clone(),
            color: self.color,
            brightness: self.brightness,
            mode: self.mode.clone(),
            power: self.power,
            led_count: self.led_count,
            modes: self.modes.clone(),
        }
    }
}
