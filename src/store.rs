//! In-memory registry of lights, rooms, and scenes.
//!
//! The store owns all shared mutable state. Callers guard it with a single
//! coarse lock; mutations never perform network I/O themselves - instead
//! they return [`DevicePush`] lists for a dispatcher to execute after the
//! lock is released. Persistence is write-through: every mutation that
//! changes persisted fields reaches the [`ConfigStore`] before returning.

use std::collections::BTreeMap;
use std::collections::BTreeSet;

use log::{debug, warn};

use crate::config::ConfigStore;
use crate::device::DevicePush;
use crate::errors::{EntityKind, Error};
use crate::light::Light;
use crate::packet::{
    ChangeValueRequest, DevicePacket, LightChange, LightRegistration, LightStateEntry, PowerValue,
    RequestId, RoomChange, SceneCreate, ScenePush,
};
use crate::room::Room;
use crate::scene::Scene;

type Result<T> = std::result::Result<T, Error>;

/// Outcome of a value change applied to one light.
#[derive(Debug)]
pub struct LightChangeOutcome {
    /// Device address to forward the change to.
    pub ip: String,
    /// Resolved power state when the change affected power.
    pub new_power: Option<bool>,
}

/// Outcome of capturing a scene into live light state.
///
/// Missing references do not abort the rest of the scene: every resolvable
/// light is updated and queued for a device push (all-attempt policy).
#[derive(Debug)]
pub struct SceneApplyOutcome {
    pub pushes: Vec<DevicePush>,
    /// Referenced light names the store could not resolve.
    pub missing: Vec<String>,
}

/// Registry of all lights, rooms, and scenes, keyed by name.
pub struct Store {
    lights: BTreeMap<String, Light>,
    rooms: BTreeMap<String, Room>,
    scenes: BTreeMap<String, Scene>,
    config: Box<dyn ConfigStore>,
}

impl Store {
    /// Build the store from the records held by the config store.
    pub fn new(config: Box<dyn ConfigStore>) -> Self {
        let document = config.document().clone();
        let mut store = Store {
            lights: document
                .lights
                .iter()
                .map(|r| (r.name.clone(), Light::from_record(r)))
                .collect(),
            rooms: document
                .rooms
                .iter()
                .map(|r| (r.name.clone(), Room::from_record(r)))
                .collect(),
            scenes: document
                .scenes
                .iter()
                .map(|r| (r.name.clone(), Scene::from_record(r)))
                .collect(),
            config,
        };
        let rooms: Vec<String> = store.rooms.keys().cloned().collect();
        for name in &rooms {
            store.recompute_room_power(name);
        }
        store
    }

    pub fn light(&self, name: &str) -> Result<&Light> {
        self.lights
            .get(name)
            .ok_or_else(|| Error::not_found(EntityKind::Light, name))
    }

    pub fn room(&self, name: &str) -> Result<&Room> {
        self.rooms
            .get(name)
            .ok_or_else(|| Error::not_found(EntityKind::Room, name))
    }

    pub fn scene(&self, name: &str) -> Result<&Scene> {
        self.scenes
            .get(name)
            .ok_or_else(|| Error::not_found(EntityKind::Scene, name))
    }

    pub fn lights(&self) -> impl Iterator<Item = &Light> {
        self.lights.values()
    }

    pub fn rooms(&self) -> impl Iterator<Item = &Room> {
        self.rooms.values()
    }

    pub fn scenes(&self) -> impl Iterator<Item = &Scene> {
        self.scenes.values()
    }

    /// Register a light, or refresh it if the name is already known.
    ///
    /// This is the device heartbeat path: an existing light has every
    /// volatile field and its address overwritten, and each room containing
    /// it recomputes its aggregate power. Returns `true` when the light was
    /// newly created.
    pub fn register_light(&mut self, reg: &LightRegistration) -> Result<bool> {
        match self.lights.get_mut(&reg.name) {
            Some(light) => {
                light.apply_registration(reg);
                let record = light.record();
                let rooms = light.rooms.clone();
                for room in &rooms {
                    self.recompute_room_power(room);
                }
                self.config.upsert_light(record)?;
                Ok(false)
            }
            None => {
                let light = Light::from_registration(reg);
                self.config.upsert_light(light.record())?;
                debug!("STORE: registered new light {}", reg.name);
                self.lights.insert(reg.name.clone(), light);
                Ok(true)
            }
        }
    }

    /// Remove a light, detaching it from every room and pruning its captured
    /// state from every scene.
    pub fn remove_light(&mut self, name: &str) -> Result<()> {
        let Some(light) = self.lights.remove(name) else {
            return Err(Error::not_found(EntityKind::Light, name));
        };

        let mut room_records = Vec::new();
        for room_name in &light.rooms {
            if let Some(room) = self.rooms.get_mut(room_name) {
                room.lights.retain(|l| l != name);
            }
        }
        for room_name in &light.rooms {
            self.recompute_room_power(room_name);
            if let Some(room) = self.rooms.get(room_name) {
                room_records.push(room.record());
            }
        }

        let mut scene_records = Vec::new();
        for scene in self.scenes.values_mut() {
            if scene.remove_light_state(name) {
                scene_records.push(scene.record());
            }
        }

        for record in room_records {
            self.config.upsert_room(record)?;
        }
        for record in scene_records {
            self.config.upsert_scene(record)?;
        }
        self.config.delete_light(name)
    }

    pub fn create_room(&mut self, name: &str) -> Result<()> {
        if self.rooms.contains_key(name) {
            return Err(Error::already_exists(EntityKind::Room, name));
        }
        let room = Room::new(name);
        self.config.upsert_room(room.record())?;
        self.rooms.insert(name.to_string(), room);
        Ok(())
    }

    /// Remove a room, detaching it from every member light.
    ///
    /// Scenes associated with the room are left in place and stay reachable
    /// through the all-scenes listing.
    pub fn remove_room(&mut self, name: &str) -> Result<()> {
        let Some(room) = self.rooms.remove(name) else {
            return Err(Error::not_found(EntityKind::Room, name));
        };

        let mut light_records = Vec::new();
        for light_name in &room.lights {
            if let Some(light) = self.lights.get_mut(light_name) {
                light.rooms.retain(|r| r != name);
                light_records.push(light.record());
            }
        }
        for record in light_records {
            self.config.upsert_light(record)?;
        }
        self.config.delete_room(name)
    }

    /// Link a light into a room (idempotent) and recompute the room's power.
    pub fn add_light_to_room(&mut self, light_name: &str, room_name: &str) -> Result<()> {
        if !self.rooms.contains_key(room_name) {
            return Err(Error::not_found(EntityKind::Room, room_name));
        }
        let light_record = {
            let light = self.light_mut(light_name)?;
            if !light.rooms.iter().any(|r| r == room_name) {
                light.rooms.push(room_name.to_string());
            }
            light.record()
        };
        let room_record = {
            let room = self.room_mut(room_name)?;
            if !room.lights.iter().any(|l| l == light_name) {
                room.lights.push(light_name.to_string());
            }
            room.record()
        };
        self.recompute_room_power(room_name);
        self.config.upsert_light(light_record)?;
        self.config.upsert_room(room_record)
    }

    /// Unlink a light from a room and recompute the room's power.
    ///
    /// An absent link is a silent no-op, mirroring the forgiving upsert
    /// semantics used throughout; absent entities still fail.
    pub fn remove_light_from_room(&mut self, light_name: &str, room_name: &str) -> Result<()> {
        if !self.rooms.contains_key(room_name) {
            return Err(Error::not_found(EntityKind::Room, room_name));
        }
        let light_record = {
            let light = self.light_mut(light_name)?;
            light.rooms.retain(|r| r != room_name);
            light.record()
        };
        let room_record = {
            let room = self.room_mut(room_name)?;
            room.lights.retain(|l| l != light_name);
            room.record()
        };
        self.recompute_room_power(room_name);
        self.config.upsert_light(light_record)?;
        self.config.upsert_room(room_record)
    }

    /// Wholesale-replace a room's light membership (bulk edit).
    pub fn set_lights_of_room(&mut self, room_name: &str, lights: &[String]) -> Result<()> {
        for name in lights {
            if !self.lights.contains_key(name) {
                return Err(Error::not_found(EntityKind::Light, name));
            }
        }
        let current = self.room(room_name)?.lights.clone();

        for name in current.iter().filter(|&l| !lights.contains(l)) {
            self.remove_light_from_room(name, room_name)?;
        }
        for name in lights.iter().filter(|&l| !current.contains(l)) {
            self.add_light_to_room(name, room_name)?;
        }
        Ok(())
    }

    /// Create a scene and associate it with its room.
    ///
    /// A duplicate name is a forgiving no-op (`Ok(false)`); every referenced
    /// light must exist at creation time.
    pub fn create_scene(&mut self, create: &SceneCreate) -> Result<bool> {
        if !self.rooms.contains_key(&create.room) {
            return Err(Error::not_found(EntityKind::Room, &create.room));
        }
        if self.scenes.contains_key(&create.name) {
            return Ok(false);
        }
        for entry in &create.light_states {
            if !self.lights.contains_key(&entry.name) {
                return Err(Error::not_found(EntityKind::Light, &entry.name));
            }
        }

        let scene = Scene::new(&create.name, &create.room, create.light_states.clone());
        let room_record = {
            let room = self.room_mut(&create.room)?;
            if !room.scenes.iter().any(|s| s == &create.name) {
                room.scenes.push(create.name.clone());
            }
            room.record()
        };
        self.config.upsert_scene(scene.record())?;
        self.config.upsert_room(room_record)?;
        self.scenes.insert(create.name.clone(), scene);
        Ok(true)
    }

    /// Wholesale-replace a scene's captured light states (bulk edit).
    pub fn set_scene_states(&mut self, name: &str, entries: Vec<LightStateEntry>) -> Result<()> {
        for entry in &entries {
            if !self.lights.contains_key(&entry.name) {
                return Err(Error::not_found(EntityKind::Light, &entry.name));
            }
        }
        let record = {
            let Some(scene) = self.scenes.get_mut(name) else {
                return Err(Error::not_found(EntityKind::Scene, name));
            };
            scene.set_light_states(entries);
            scene.record()
        };
        self.config.upsert_scene(record)
    }

    pub fn remove_scene(&mut self, name: &str) -> Result<()> {
        let Some(scene) = self.scenes.remove(name) else {
            return Err(Error::not_found(EntityKind::Scene, name));
        };
        if let Some(room) = self.rooms.get_mut(scene.room()) {
            room.scenes.retain(|s| s != name);
            let record = room.record();
            self.config.upsert_room(record)?;
        }
        self.config.delete_scene(name)
    }

    /// Apply a value change to one light and report the device to forward it
    /// to. Power changes recompute every containing room's aggregate.
    pub fn apply_light_change(
        &mut self,
        name: &str,
        change: &LightChange,
    ) -> Result<LightChangeOutcome> {
        let (ip, rooms, new_power) = {
            let light = self.light_mut(name)?;
            let mut new_power = None;
            match change {
                LightChange::Power(value) => {
                    let resolved = value.resolve(light.power);
                    light.power = resolved;
                    new_power = Some(resolved);
                }
                LightChange::Brightness(value) => light.brightness = *value,
                LightChange::Mode(mode) => light.mode = mode.clone(),
                LightChange::Color(color) => light.color = *color,
            }
            (light.ip.clone(), light.rooms.clone(), new_power)
        };
        if new_power.is_some() {
            for room in &rooms {
                self.recompute_room_power(room);
            }
        }
        Ok(LightChangeOutcome { ip, new_power })
    }

    /// Apply a value change to a room by fanning out over its member lights.
    ///
    /// Returns one pending device push per member; there is no atomicity
    /// across the fan-out.
    pub fn apply_room_change(
        &mut self,
        name: &str,
        change: &RoomChange,
        server_id: &str,
    ) -> Result<Vec<DevicePush>> {
        let (members, resolved_power) = {
            let room = self.room_mut(name)?;
            let resolved = match change {
                RoomChange::Power(value) => {
                    let resolved = value.resolve(room.power);
                    room.power = resolved;
                    Some(resolved)
                }
                RoomChange::Brightness(_) => None,
            };
            (room.lights.clone(), resolved)
        };

        let mut pushes = Vec::with_capacity(members.len());
        let mut affected: BTreeSet<String> = BTreeSet::new();
        affected.insert(name.to_string());

        for member in &members {
            let Some(light) = self.lights.get_mut(member) else {
                warn!("STORE: room {name} references unknown light {member}");
                continue;
            };
            let light_change = match (change, resolved_power) {
                (RoomChange::Power(_), Some(power)) => {
                    light.power = power;
                    affected.extend(light.rooms.iter().cloned());
                    LightChange::Power(PowerValue::Set(power))
                }
                _ => {
                    let RoomChange::Brightness(value) = change else {
                        continue;
                    };
                    light.brightness = *value;
                    LightChange::Brightness(*value)
                }
            };
            pushes.push(DevicePush {
                light: member.clone(),
                ip: light.ip.clone(),
                packet: DevicePacket::ChangeValue(ChangeValueRequest::Light {
                    name: member.clone(),
                    change: light_change,
                    id: RequestId::from(server_id),
                }),
            });
        }

        if resolved_power.is_some() {
            for room in &affected {
                self.recompute_room_power(room);
            }
        }
        Ok(pushes)
    }

    /// Write a scene's captured states into the live lights and return one
    /// pending device push per resolvable light.
    pub fn apply_scene(&mut self, name: &str, server_id: &str) -> Result<SceneApplyOutcome> {
        let states: Vec<(String, crate::scene::LightState)> = self
            .scene(name)?
            .light_states()
            .iter()
            .map(|(light, state)| (light.clone(), state.clone()))
            .collect();
        debug!("STORE: applying scene {name} to {} lights", states.len());

        let mut pushes = Vec::new();
        let mut missing = Vec::new();
        let mut affected: BTreeSet<String> = BTreeSet::new();

        for (light_name, state) in states {
            let Some(light) = self.lights.get_mut(&light_name) else {
                missing.push(light_name);
                continue;
            };
            light.color = state.color;
            light.brightness = state.brightness;
            light.mode = state.mode.clone();
            light.power = state.power;
            affected.extend(light.rooms.iter().cloned());
            pushes.push(DevicePush {
                light: light_name.clone(),
                ip: light.ip.clone(),
                packet: DevicePacket::ApplyScene(ScenePush {
                    color: state.color,
                    brightness: state.brightness,
                    mode: state.mode,
                    power: PowerValue::Set(state.power),
                    id: RequestId::from(server_id),
                }),
            });
        }

        for room in &affected {
            self.recompute_room_power(room);
        }
        Ok(SceneApplyOutcome { pushes, missing })
    }

    fn light_mut(&mut self, name: &str) -> Result<&mut Light> {
        self.lights
            .get_mut(name)
            .ok_or_else(|| Error::not_found(EntityKind::Light, name))
    }

    fn room_mut(&mut self, name: &str) -> Result<&mut Room> {
        self.rooms
            .get_mut(name)
            .ok_or_else(|| Error::not_found(EntityKind::Room, name))
    }

    fn recompute_room_power(&mut self, name: &str) {
        let Some(room) = self.rooms.get(name) else {
            return;
        };
        let power = room
            .lights
            .iter()
            .any(|l| self.lights.get(l).is_some_and(Light::power));
        if let Some(room) = self.rooms.get_mut(name) {
            room.power = power;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::color::Color;
    use crate::config::{ConfigDocument, MemoryConfig, SceneRecord};

    fn store() -> Store {
        Store::new(Box::new(MemoryConfig::new()))
    }

    fn registration(name: &str, power: bool) -> LightRegistration {
        LightRegistration {
            name: name.to_string(),
            led_count: 60,
            color: Color::rgb(0, 0, 0),
            mode: "solid".to_string(),
            power,
            brightness: 100,
            modes: vec!["solid".to_string(), "rainbow".to_string()],
            ip: "192.168.1.50".to_string(),
            id: RequestId::from("test"),
        }
    }

    fn assert_mutual_references(store: &Store) {
        for light in store.lights() {
            for room in light.rooms() {
                let room = store.room(room).expect("light references unknown room");
                assert!(
                    room.lights().contains(&light.name().to_string()),
                    "room {} does not reference light {} back",
                    room.name(),
                    light.name()
                );
            }
        }
        for room in store.rooms() {
            for light in room.lights() {
                let light = store.light(light).expect("room references unknown light");
                assert!(
                    light.rooms().contains(&room.name().to_string()),
                    "light {} does not reference room {} back",
                    light.name(),
                    room.name()
                );
            }
        }
    }

    #[test]
    fn test_register_is_idempotent_upsert() {
        let mut store = store();
        assert!(store.register_light(&registration("Strip1", false)).unwrap());

        let mut heartbeat = registration("Strip1", true);
        heartbeat.brightness = 40;
        heartbeat.ip = "192.168.1.51".to_string();
        assert!(!store.register_light(&heartbeat).unwrap());

        assert_eq!(store.lights().count(), 1);
        let light = store.light("Strip1").unwrap();
        assert!(light.power());
        assert_eq!(light.brightness(), 40);
        assert_eq!(light.ip(), "192.168.1.51");
    }

    #[test]
    fn test_heartbeat_recomputes_room_power() {
        let mut store = store();
        store.register_light(&registration("Strip1", false)).unwrap();
        store.create_room("Living Room").unwrap();
        store.add_light_to_room("Strip1", "Living Room").unwrap();
        assert!(!store.room("Living Room").unwrap().power());

        store.register_light(&registration("Strip1", true)).unwrap();
        assert!(store.room("Living Room").unwrap().power());
    }

    #[test]
    fn test_room_power_is_or_of_members() {
        let mut store = store();
        store.register_light(&registration("A", false)).unwrap();
        store.register_light(&registration("B", true)).unwrap();
        store.create_room("Room").unwrap();

        store.add_light_to_room("A", "Room").unwrap();
        assert!(!store.room("Room").unwrap().power());
        assert_mutual_references(&store);

        store.add_light_to_room("B", "Room").unwrap();
        assert!(store.room("Room").unwrap().power());
        assert_mutual_references(&store);

        store.remove_light_from_room("B", "Room").unwrap();
        assert!(!store.room("Room").unwrap().power());
        assert_mutual_references(&store);
    }

    #[test]
    fn test_add_light_to_room_is_idempotent() {
        let mut store = store();
        store.register_light(&registration("A", false)).unwrap();
        store.create_room("Room").unwrap();
        store.add_light_to_room("A", "Room").unwrap();
        store.add_light_to_room("A", "Room").unwrap();

        assert_eq!(store.room("Room").unwrap().lights(), ["A"]);
        assert_eq!(store.light("A").unwrap().rooms(), ["Room"]);
    }

    #[test]
    fn test_add_light_to_room_requires_both() {
        let mut store = store();
        store.create_room("Room").unwrap();
        assert!(matches!(
            store.add_light_to_room("ghost", "Room"),
            Err(Error::NotFound { .. })
        ));
        store.register_light(&registration("A", false)).unwrap();
        assert!(matches!(
            store.add_light_to_room("A", "nowhere"),
            Err(Error::NotFound { .. })
        ));
    }

    #[test]
    fn test_remove_missing_link_is_silent_noop() {
        let mut store = store();
        store.register_light(&registration("A", false)).unwrap();
        store.create_room("Room").unwrap();
        store.remove_light_from_room("A", "Room").unwrap();
        assert_mutual_references(&store);
    }

    #[test]
    fn test_duplicate_room_create_fails() {
        let mut store = store();
        store.create_room("Room").unwrap();
        assert!(matches!(
            store.create_room("Room"),
            Err(Error::AlreadyExists { .. })
        ));
    }

    #[test]
    fn test_remove_room_detaches_but_keeps_lights() {
        let mut store = store();
        store.register_light(&registration("A", false)).unwrap();
        store.register_light(&registration("B", false)).unwrap();
        store.create_room("Room").unwrap();
        store.add_light_to_room("A", "Room").unwrap();
        store.add_light_to_room("B", "Room").unwrap();

        store.remove_room("Room").unwrap();

        assert_eq!(store.lights().count(), 2);
        assert!(store.light("A").unwrap().rooms().is_empty());
        assert!(store.light("B").unwrap().rooms().is_empty());
        assert!(store.room("Room").is_err());
    }

    #[test]
    fn test_set_lights_of_room_diffs_membership() {
        let mut store = store();
        for name in ["A", "B", "C"] {
            store.register_light(&registration(name, false)).unwrap();
        }
        store.create_room("Room").unwrap();
        store.add_light_to_room("A", "Room").unwrap();
        store.add_light_to_room("B", "Room").unwrap();

        store
            .set_lights_of_room("Room", &["B".to_string(), "C".to_string()])
            .unwrap();

        assert_eq!(store.room("Room").unwrap().lights(), ["B", "C"]);
        assert!(store.light("A").unwrap().rooms().is_empty());
        assert_mutual_references(&store);
    }

    #[test]
    fn test_remove_light_prunes_scene_states() {
        let mut store = store();
        store.register_light(&registration("A", false)).unwrap();
        store.register_light(&registration("B", false)).unwrap();
        store.create_room("Room").unwrap();
        store.add_light_to_room("A", "Room").unwrap();
        store
            .create_scene(&SceneCreate {
                name: "Evening".to_string(),
                room: "Room".to_string(),
                light_states: vec![
                    entry("A", true),
                    entry("B", false),
                ],
                id: RequestId::from("test"),
            })
            .unwrap();

        store.remove_light("A").unwrap();

        let scene = store.scene("Evening").unwrap();
        assert!(!scene.light_states().contains_key("A"));
        assert!(scene.light_states().contains_key("B"));
        assert_mutual_references(&store);
    }

    #[test]
    fn test_create_scene_requires_room_and_lights() {
        let mut store = store();
        store.register_light(&registration("A", false)).unwrap();
        let create = SceneCreate {
            name: "S".to_string(),
            room: "nowhere".to_string(),
            light_states: vec![entry("A", true)],
            id: RequestId::from("test"),
        };
        assert!(matches!(
            store.create_scene(&create),
            Err(Error::NotFound { .. })
        ));

        store.create_room("Room").unwrap();
        let bad_light = SceneCreate {
            room: "Room".to_string(),
            light_states: vec![entry("ghost", true)],
            ..create.clone()
        };
        assert!(matches!(
            store.create_scene(&bad_light),
            Err(Error::NotFound { .. })
        ));
    }

    #[test]
    fn test_duplicate_scene_create_is_noop() {
        let mut store = store();
        store.register_light(&registration("A", false)).unwrap();
        store.create_room("Room").unwrap();
        let create = SceneCreate {
            name: "S".to_string(),
            room: "Room".to_string(),
            light_states: vec![entry("A", true)],
            id: RequestId::from("test"),
        };
        assert!(store.create_scene(&create).unwrap());
        assert!(!store.create_scene(&create).unwrap());
        assert_eq!(store.room("Room").unwrap().scenes(), ["S"]);
    }

    #[test]
    fn test_remove_scene_detaches_from_room() {
        let mut store = store();
        store.register_light(&registration("A", false)).unwrap();
        store.create_room("Room").unwrap();
        store
            .create_scene(&SceneCreate {
                name: "S".to_string(),
                room: "Room".to_string(),
                light_states: vec![entry("A", true)],
                id: RequestId::from("test"),
            })
            .unwrap();

        store.remove_scene("S").unwrap();
        assert!(store.scene("S").is_err());
        assert!(store.room("Room").unwrap().scenes().is_empty());
    }

    #[test]
    fn test_light_power_toggle_resolves_and_recomputes() {
        let mut store = store();
        store.register_light(&registration("A", false)).unwrap();
        store.create_room("Room").unwrap();
        store.add_light_to_room("A", "Room").unwrap();

        let outcome = store
            .apply_light_change("A", &LightChange::Power(PowerValue::Toggle))
            .unwrap();
        assert_eq!(outcome.new_power, Some(true));
        assert_eq!(outcome.ip, "192.168.1.50");
        assert!(store.room("Room").unwrap().power());

        let outcome = store
            .apply_light_change("A", &LightChange::Power(PowerValue::Toggle))
            .unwrap();
        assert_eq!(outcome.new_power, Some(false));
        assert!(!store.room("Room").unwrap().power());
    }

    #[test]
    fn test_room_power_fanout_builds_one_push_per_member() {
        let mut store = store();
        store.register_light(&registration("A", false)).unwrap();
        store.register_light(&registration("B", false)).unwrap();
        store.create_room("Room").unwrap();
        store.add_light_to_room("A", "Room").unwrap();
        store.add_light_to_room("B", "Room").unwrap();

        let pushes = store
            .apply_room_change("Room", &RoomChange::Power(PowerValue::Toggle), "hub-id")
            .unwrap();

        assert_eq!(pushes.len(), 2);
        assert!(store.room("Room").unwrap().power());
        assert!(store.light("A").unwrap().power());
        assert!(store.light("B").unwrap().power());
        let value = serde_json::to_value(&pushes[0].packet).unwrap();
        assert_eq!(value["data"]["value"], "true");
        assert_eq!(value["data"]["id"], "hub-id");
    }

    #[test]
    fn test_room_brightness_fanout() {
        let mut store = store();
        store.register_light(&registration("A", false)).unwrap();
        store.create_room("Room").unwrap();
        store.add_light_to_room("A", "Room").unwrap();

        let pushes = store
            .apply_room_change("Room", &RoomChange::Brightness(30), "hub-id")
            .unwrap();
        assert_eq!(pushes.len(), 1);
        assert_eq!(store.light("A").unwrap().brightness(), 30);
    }

    #[test]
    fn test_apply_scene_reports_missing_lights() {
        // A hand-edited config file can reference lights that were never
        // registered; the scene must still be attempted for the rest.
        let mut document = ConfigDocument::default();
        document.scenes.push(SceneRecord {
            name: "S".to_string(),
            room: "Room".to_string(),
            light_states: vec![entry("A", true), entry("ghost", true)],
        });
        let mut store = Store::new(Box::new(MemoryConfig::with_document(document)));
        store.register_light(&registration("A", false)).unwrap();

        let outcome = store.apply_scene("S", "hub-id").unwrap();
        assert_eq!(outcome.pushes.len(), 1);
        assert_eq!(outcome.missing, ["ghost"]);
        assert!(store.light("A").unwrap().power());
    }

    #[test]
    fn test_apply_scene_recomputes_room_power() {
        let mut store = store();
        store.register_light(&registration("A", false)).unwrap();
        store.create_room("Room").unwrap();
        store.add_light_to_room("A", "Room").unwrap();
        store
            .create_scene(&SceneCreate {
                name: "S".to_string(),
                room: "Room".to_string(),
                light_states: vec![entry("A", true)],
                id: RequestId::from("test"),
            })
            .unwrap();

        store.apply_scene("S", "hub-id").unwrap();
        assert!(store.room("Room").unwrap().power());
    }

    #[test]
    fn test_store_restores_from_config_records() {
        let mut seed = Store::new(Box::new(MemoryConfig::new()));
        seed.register_light(&registration("A", true)).unwrap();
        seed.create_room("Room").unwrap();
        seed.add_light_to_room("A", "Room").unwrap();
        let document = seed.config.document().clone();

        let store = Store::new(Box::new(MemoryConfig::with_document(document)));
        let light = store.light("A").unwrap();
        // Identity survives; volatile state waits for the next heartbeat.
        assert_eq!(light.rooms(), ["Room"]);
        assert_eq!(light.ip(), "192.168.1.50");
        assert!(!light.power());
        assert!(!store.room("Room").unwrap().power());
        assert_mutual_references(&store);
    }

    fn entry(name: &str, power: bool) -> LightStateEntry {
        LightStateEntry {
            name: name.to_string(),
            color: Color::rgb(10, 0, 30),
            mode: "solid".to_string(),
            power,
            brightness: 40,
        }
    }
}
