//! Whole-document JSON persistence for hub state.
//!
//! The config file is overwritten wholesale on every save; mutations in the
//! domain store write through here before reporting success. Records carry
//! only identity fields for lights - volatile state (color, power, mode,
//! brightness) is re-announced by the device itself on its next heartbeat.

use std::fs;
use std::path::{Path, PathBuf};

use log::info;
use serde::{Deserialize, Serialize};

use crate::errors::Error;
use crate::packet::LightStateEntry;

type Result<T> = std::result::Result<T, Error>;

/// Persisted identity of a light.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LightRecord {
    pub name: String,
    pub rooms: Vec<String>,
    #[serde(rename = "ledCount")]
    pub led_count: u32,
    pub modes: Vec<String>,
    pub ip: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RoomRecord {
    pub name: String,
    pub lights: Vec<String>,
    pub scenes: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SceneRecord {
    pub name: String,
    pub room: String,
    #[serde(rename = "lightStates")]
    pub light_states: Vec<LightStateEntry>,
}

/// Server section of the config document.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub port: u16,
    pub mqtt: MqttConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 80,
            mqtt: MqttConfig::default(),
        }
    }
}

#[serde_with::skip_serializing_none]
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MqttConfig {
    pub enabled: bool,
    pub host: String,
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
}

impl Default for MqttConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            host: "localhost".to_string(),
            port: 1883,
            username: None,
            password: None,
        }
    }
}

/// The full persisted document.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfigDocument {
    pub server: ServerConfig,
    pub lights: Vec<LightRecord>,
    pub rooms: Vec<RoomRecord>,
    pub scenes: Vec<SceneRecord>,
}

/// Write-through persistence consumed by the domain store.
///
/// Every call replaces the matching record (or removes it) and saves the
/// whole document before returning.
pub trait ConfigStore: Send + Sync {
    fn document(&self) -> &ConfigDocument;

    fn upsert_light(&mut self, record: LightRecord) -> Result<()>;
    fn delete_light(&mut self, name: &str) -> Result<()>;
    fn upsert_room(&mut self, record: RoomRecord) -> Result<()>;
    fn delete_room(&mut self, name: &str) -> Result<()>;
    fn upsert_scene(&mut self, record: SceneRecord) -> Result<()>;
    fn delete_scene(&mut self, name: &str) -> Result<()>;
}

/// JSON file-backed [`ConfigStore`].
pub struct JsonConfig {
    path: PathBuf,
    document: ConfigDocument,
}

impl JsonConfig {
    /// Load the document at `path`, creating a default one if absent.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let document = if path.is_file() {
            let raw = fs::read_to_string(&path)?;
            serde_json::from_str(&raw).map_err(Error::JsonLoad)?
        } else {
            let document = ConfigDocument::default();
            let raw = serde_json::to_string_pretty(&document).map_err(Error::JsonDump)?;
            fs::write(&path, raw)?;
            document
        };
        info!("CONFIG: loaded {}", path.display());
        Ok(Self { path, document })
    }

    fn save(&self) -> Result<()> {
        let raw = serde_json::to_string_pretty(&self.document).map_err(Error::JsonDump)?;
        fs::write(&self.path, raw)?;
        Ok(())
    }
}

impl ConfigStore for JsonConfig {
    fn document(&self) -> &ConfigDocument {
        &self.document
    }

    fn upsert_light(&mut self, record: LightRecord) -> Result<()> {
        upsert(&mut self.document.lights, record, |r| &r.name);
        self.save()
    }

    fn delete_light(&mut self, name: &str) -> Result<()> {
        self.document.lights.retain(|r| r.name != name);
        self.save()
    }

    fn upsert_room(&mut self, record: RoomRecord) -> Result<()> {
        upsert(&mut self.document.rooms, record, |r| &r.name);
        self.save()
    }

    fn delete_room(&mut self, name: &str) -> Result<()> {
        self.document.rooms.retain(|r| r.name != name);
        self.save()
    }

    fn upsert_scene(&mut self, record: SceneRecord) -> Result<()> {
        upsert(&mut self.document.scenes, record, |r| &r.name);
        self.save()
    }

    fn delete_scene(&mut self, name: &str) -> Result<()> {
        self.document.scenes.retain(|r| r.name != name);
        self.save()
    }
}

/// In-memory [`ConfigStore`] for tests and ephemeral runs.
#[derive(Default)]
pub struct MemoryConfig {
    document: ConfigDocument,
}

impl MemoryConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_document(document: ConfigDocument) -> Self {
        Self { document }
    }
}

impl ConfigStore for MemoryConfig {
    fn document(&self) -> &ConfigDocument {
        &self.document
    }

    fn upsert_light(&mut self, record: LightRecord) -> Result<()> {
        upsert(&mut self.document.lights, record, |r| &r.name);
        Ok(())
    }

    fn delete_light(&mut self, name: &str) -> Result<()> {
        self.document.lights.retain(|r| r.name != name);
        Ok(())
    }

    fn upsert_room(&mut self, record: RoomRecord) -> Result<()> {
        upsert(&mut self.document.rooms, record, |r| &r.name);
        Ok(())
    }

    fn delete_room(&mut self, name: &str) -> Result<()> {
        self.document.rooms.retain(|r| r.name != name);
        Ok(())
    }

    fn upsert_scene(&mut self, record: SceneRecord) -> Result<()> {
        upsert(&mut self.document.scenes, record, |r| &r.name);
        Ok(())
    }

    fn delete_scene(&mut self, name: &str) -> Result<()> {
        self.document.scenes.retain(|r| r.name != name);
        Ok(())
    }
}

fn upsert<T>(records: &mut Vec<T>, record: T, key: impl Fn(&T) -> &String) {
    match records.iter_mut().find(|r| key(r) == key(&record)) {
        Some(existing) => *existing = record,
        None => records.push(record),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_creates_default() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        let config = JsonConfig::open(&path).unwrap();
        assert!(path.is_file());
        assert_eq!(config.document().server.port, 80);
        assert!(!config.document().server.mqtt.enabled);
        assert!(config.document().lights.is_empty());
    }

    #[test]
    fn test_round_trip_through_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");

        let mut config = JsonConfig::open(&path).unwrap();
        config
            .upsert_light(LightRecord {
                name: "Strip1".to_string(),
                rooms: vec!["Living Room".to_string()],
                led_count: 60,
                modes: vec!["solid".to_string()],
                ip: "192.168.1.50".to_string(),
            })
            .unwrap();
        config
            .upsert_room(RoomRecord {
                name: "Living Room".to_string(),
                lights: vec!["Strip1".to_string()],
                scenes: vec![],
            })
            .unwrap();
        drop(config);

        let reloaded = JsonConfig::open(&path).unwrap();
        assert_eq!(reloaded.document().lights.len(), 1);
        assert_eq!(reloaded.document().lights[0].name, "Strip1");
        assert_eq!(reloaded.document().rooms[0].lights, vec!["Strip1"]);
    }

    #[test]
    fn test_upsert_replaces_by_name() {
        let mut config = MemoryConfig::new();
        let mut record = LightRecord {
            name: "Strip1".to_string(),
            rooms: vec![],
            led_count: 60,
            modes: vec![],
            ip: "10.0.0.1".to_string(),
        };
        config.upsert_light(record.clone()).unwrap();
        record.ip = "10.0.0.2".to_string();
        config.upsert_light(record).unwrap();

        assert_eq!(config.document().lights.len(), 1);
        assert_eq!(config.document().lights[0].ip, "10.0.0.2");

        config.delete_light("Strip1").unwrap();
        assert!(config.document().lights.is_empty());
    }
}
