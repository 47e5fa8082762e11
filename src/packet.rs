//! Control-plane packet envelopes.
//!
//! Every request carries a packet kind (the outer `id` tag), a resource
//! (`request`), and for value changes an action key. The combinations form a
//! closed set; anything outside it fails deserialization and is treated as a
//! malformed request. Responses echo the caller's opaque request id verbatim.

use serde::de::{self, Deserializer, Visitor};
use serde::ser::Serializer;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::color::Color;

/// Opaque correlation id carried by requests and echoed in responses.
///
/// Clients put anything JSON-shaped here; the hub never interprets it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestId(pub Value);

impl From<&str> for RequestId {
    fn from(s: &str) -> Self {
        RequestId(Value::String(s.to_string()))
    }
}

/// An inbound control-plane request envelope.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "id", content = "data")]
pub enum Request {
    #[serde(rename = "infoRequestPacket")]
    Info(InfoRequest),
    #[serde(rename = "createRequestPacket")]
    Create(CreateRequest),
    #[serde(rename = "editRequestPacket")]
    Edit(EditRequest),
    #[serde(rename = "removeRequestPacket")]
    Remove(RemoveRequest),
    #[serde(rename = "changeValueRequestPacket")]
    ChangeValue(ChangeValueRequest),
}

impl Request {
    /// Whether handling this request can change shared state.
    pub fn is_mutating(&self) -> bool {
        !matches!(self, Request::Info(_))
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "request")]
pub enum InfoRequest {
    #[serde(rename = "light")]
    Light { name: String, id: RequestId },
    #[serde(rename = "room")]
    Room { name: String, id: RequestId },
    #[serde(rename = "scene")]
    Scene { name: String, id: RequestId },
    #[serde(rename = "allLights")]
    AllLights { id: RequestId },
    #[serde(rename = "allRooms")]
    AllRooms { id: RequestId },
    #[serde(rename = "allScenes")]
    AllScenes { id: RequestId },
    #[serde(rename = "lightsOfRoom")]
    LightsOfRoom { name: String, id: RequestId },
    #[serde(rename = "scenesOfRoom")]
    ScenesOfRoom { name: String, id: RequestId },
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "request")]
pub enum CreateRequest {
    #[serde(rename = "room")]
    Room { name: String, id: RequestId },
    /// Doubles as device registration and heartbeat.
    #[serde(rename = "light")]
    Light(LightRegistration),
    #[serde(rename = "scene")]
    Scene(SceneCreate),
}

/// The self-description a light device sends when it registers.
#[derive(Debug, Clone, Deserialize)]
pub struct LightRegistration {
    pub name: String,
    #[serde(rename = "ledCount", deserialize_with = "lenient::u32")]
    pub led_count: u32,
    pub color: Color,
    pub mode: String,
    #[serde(deserialize_with = "lenient::bool")]
    pub power: bool,
    #[serde(deserialize_with = "lenient::u32")]
    pub brightness: u32,
    pub modes: Vec<String>,
    pub ip: String,
    pub id: RequestId,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SceneCreate {
    pub name: String,
    pub room: String,
    #[serde(rename = "lightStates")]
    pub light_states: Vec<LightStateEntry>,
    pub id: RequestId,
}

/// One captured per-light state inside a scene, as it appears on the wire
/// and in the config file.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LightStateEntry {
    pub name: String,
    pub color: Color,
    pub mode: String,
    #[serde(deserialize_with = "lenient::bool")]
    pub power: bool,
    #[serde(deserialize_with = "lenient::u32")]
    pub brightness: u32,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "request")]
pub enum EditRequest {
    /// Bulk replacement of a room's light membership.
    #[serde(rename = "lightsOfRoom")]
    LightsOfRoom {
        name: String,
        lights: Vec<String>,
        id: RequestId,
    },
    /// Bulk replacement of a scene's captured light states.
    #[serde(rename = "lightStatesOfScene")]
    LightStatesOfScene {
        name: String,
        #[serde(rename = "lightStates")]
        light_states: Vec<LightStateEntry>,
        id: RequestId,
    },
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "request")]
pub enum RemoveRequest {
    #[serde(rename = "room")]
    Room { name: String, id: RequestId },
    #[serde(rename = "light")]
    Light { name: String, id: RequestId },
    #[serde(rename = "scene")]
    Scene { name: String, id: RequestId },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "request")]
pub enum ChangeValueRequest {
    #[serde(rename = "room")]
    Room {
        name: String,
        #[serde(flatten)]
        change: RoomChange,
        id: RequestId,
    },
    #[serde(rename = "light")]
    Light {
        name: String,
        #[serde(flatten)]
        change: LightChange,
        id: RequestId,
    },
    #[serde(rename = "scene")]
    Scene {
        name: String,
        #[serde(flatten)]
        change: SceneChange,
        id: RequestId,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "key", content = "value")]
pub enum RoomChange {
    #[serde(rename = "power")]
    Power(PowerValue),
    #[serde(rename = "brightness")]
    Brightness(#[serde(deserialize_with = "lenient::u32")] u32),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "key", content = "value")]
pub enum LightChange {
    #[serde(rename = "power")]
    Power(PowerValue),
    #[serde(rename = "brightness")]
    Brightness(#[serde(deserialize_with = "lenient::u32")] u32),
    #[serde(rename = "mode")]
    Mode(String),
    #[serde(rename = "color")]
    Color(Color),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "key", content = "value")]
pub enum SceneChange {
    #[serde(rename = "apply")]
    Apply,
}

/// A requested power state: an explicit value or a toggle of the current one.
///
/// On the wire this is the string `"toggle"`, a JSON boolean, or the strings
/// `"true"`/`"false"` (devices and the original apps send all three).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PowerValue {
    Toggle,
    Set(bool),
}

impl PowerValue {
    /// Resolve against the current state.
    pub fn resolve(&self, current: bool) -> bool {
        match self {
            PowerValue::Toggle => !current,
            PowerValue::Set(value) => *value,
        }
    }
}

impl Serialize for PowerValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let s = match self {
            PowerValue::Toggle => "toggle",
            PowerValue::Set(true) => "true",
            PowerValue::Set(false) => "false",
        };
        serializer.serialize_str(s)
    }
}

impl<'de> Deserialize<'de> for PowerValue {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct PowerVisitor;

        impl Visitor<'_> for PowerVisitor {
            type Value = PowerValue;

            fn expecting(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str("a boolean, \"true\", \"false\", or \"toggle\"")
            }

            fn visit_bool<E: de::Error>(self, v: bool) -> Result<PowerValue, E> {
                Ok(PowerValue::Set(v))
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<PowerValue, E> {
                match v.to_ascii_lowercase().as_str() {
                    "toggle" => Ok(PowerValue::Toggle),
                    "true" => Ok(PowerValue::Set(true)),
                    "false" => Ok(PowerValue::Set(false)),
                    other => Err(E::invalid_value(de::Unexpected::Str(other), &self)),
                }
            }
        }

        deserializer.deserialize_any(PowerVisitor)
    }
}

/// An outbound control-plane response envelope.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "id", content = "data")]
pub enum Response {
    #[serde(rename = "successPacket")]
    Success { message: String, id: RequestId },
    #[serde(rename = "errorPacket")]
    Error { message: String, id: RequestId },
    #[serde(rename = "lightPacket")]
    Light(LightPacket),
    #[serde(rename = "roomPacket")]
    Room(RoomPacket),
    #[serde(rename = "scenePacket")]
    Scene(ScenePacket),
    #[serde(rename = "allLightsPacket")]
    AllLights { lights: Vec<Response>, id: RequestId },
    #[serde(rename = "allRoomsPacket")]
    AllRooms { rooms: Vec<Response>, id: RequestId },
    #[serde(rename = "allScenesPacket")]
    AllScenes { scenes: Vec<Response>, id: RequestId },
    #[serde(rename = "lightsOfRoomPacket")]
    LightsOfRoom {
        name: String,
        lights: Vec<Response>,
        id: RequestId,
    },
    #[serde(rename = "scenesOfRoomPacket")]
    ScenesOfRoom {
        name: String,
        scenes: Vec<Response>,
        id: RequestId,
    },
    /// Full state handed to an app on handshake.
    #[serde(rename = "setupPackets")]
    Setup(Vec<Response>),
    /// Push telling an app to re-fetch full state.
    #[serde(rename = "getSetupPackets")]
    GetSetup,
    /// Push delivering the lights found during a discovery session.
    #[serde(rename = "discoverResultPacket")]
    DiscoverResult { lights: Vec<String>, id: RequestId },
}

impl Response {
    pub fn success(message: impl Into<String>, id: RequestId) -> Self {
        Response::Success {
            message: message.into(),
            id,
        }
    }

    pub fn error(message: impl Into<String>, id: RequestId) -> Self {
        Response::Error {
            message: message.into(),
            id,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Response::Success { .. })
    }
}

/// The public description of a light (device address deliberately omitted).
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct LightPacket {
    pub name: String,
    pub rooms: Vec<String>,
    pub color: Color,
    pub brightness: u32,
    pub mode: String,
    pub power: bool,
    #[serde(rename = "ledCount")]
    pub led_count: u32,
    pub modes: Vec<String>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct RoomPacket {
    pub name: String,
    pub lights: Vec<String>,
    pub power: bool,
    pub scenes: Vec<String>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ScenePacket {
    pub name: String,
    pub room: String,
    #[serde(rename = "lightStates")]
    pub light_states: Vec<LightStateEntry>,
}

/// A packet bound for a physical light device.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "id", content = "data")]
pub enum DevicePacket {
    /// A value change forwarded (or fanned out) to the device.
    #[serde(rename = "changeValueRequestPacket")]
    ChangeValue(ChangeValueRequest),
    /// A captured scene state pushed to the device.
    #[serde(rename = "applyScenePacket")]
    ApplyScene(ScenePush),
}

/// Body of an `applyScenePacket`.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ScenePush {
    pub color: Color,
    pub brightness: u32,
    pub mode: String,
    pub power: PowerValue,
    pub id: RequestId,
}

impl PartialEq for ChangeValueRequest {
    fn eq(&self, other: &Self) -> bool {
        // Structural equality is only needed in tests; comparing the
        // serialized form sidesteps the custom serde on the leaves.
        serde_json::to_value(self).ok() == serde_json::to_value(other).ok()
    }
}

mod lenient {
    //! Forgiving scalar parsing for fields that devices send inconsistently
    //! (numbers as strings, booleans as `"true"`/`"false"`).

    use serde::de::{self, Deserializer, Visitor};

    pub fn bool<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
        struct BoolVisitor;

        impl Visitor<'_> for BoolVisitor {
            type Value = bool;

            fn expecting(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str("a boolean or \"true\"/\"false\"")
            }

            fn visit_bool<E: de::Error>(self, v: bool) -> Result<bool, E> {
                Ok(v)
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<bool, E> {
                match v.to_ascii_lowercase().as_str() {
                    "true" => Ok(true),
                    "false" => Ok(false),
                    other => Err(E::invalid_value(de::Unexpected::Str(other), &self)),
                }
            }
        }

        deserializer.deserialize_any(BoolVisitor)
    }

    pub fn u32<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u32, D::Error> {
        struct U32Visitor;

        impl Visitor<'_> for U32Visitor {
            type Value = u32;

            fn expecting(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str("an unsigned integer or a numeric string")
            }

            fn visit_u64<E: de::Error>(self, v: u64) -> Result<u32, E> {
                u32::try_from(v).map_err(|_| E::invalid_value(de::Unexpected::Unsigned(v), &self))
            }

            fn visit_i64<E: de::Error>(self, v: i64) -> Result<u32, E> {
                u32::try_from(v).map_err(|_| E::invalid_value(de::Unexpected::Signed(v), &self))
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<u32, E> {
                v.parse()
                    .map_err(|_| E::invalid_value(de::Unexpected::Str(v), &self))
            }
        }

        deserializer.deserialize_any(U32Visitor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_info_request() {
        let raw = json!({
            "id": "infoRequestPacket",
            "data": {"request": "room", "name": "Living Room", "id": "req-1"}
        });
        let request: Request = serde_json::from_value(raw).unwrap();
        match request {
            Request::Info(InfoRequest::Room { name, id }) => {
                assert_eq!(name, "Living Room");
                assert_eq!(id, RequestId::from("req-1"));
            }
            other => panic!("unexpected parse: {other:?}"),
        }
    }

    #[test]
    fn test_parse_light_registration() {
        let raw = json!({
            "id": "createRequestPacket",
            "data": {
                "request": "light",
                "name": "Strip1",
                "ledCount": "60",
                "color": [0, 0, 0],
                "mode": "solid",
                "power": "false",
                "brightness": 100,
                "modes": ["solid", "rainbow"],
                "ip": "192.168.1.50",
                "id": "reg-1"
            }
        });
        let request: Request = serde_json::from_value(raw).unwrap();
        let Request::Create(CreateRequest::Light(reg)) = request else {
            panic!("expected light registration");
        };
        assert_eq!(reg.led_count, 60);
        assert!(!reg.power);
        assert_eq!(reg.brightness, 100);
        assert_eq!(reg.modes.len(), 2);
    }

    #[test]
    fn test_parse_change_value_power_toggle() {
        let raw = json!({
            "id": "changeValueRequestPacket",
            "data": {
                "request": "light",
                "name": "Strip1",
                "key": "power",
                "value": "toggle",
                "id": 7
            }
        });
        let request: Request = serde_json::from_value(raw).unwrap();
        let Request::ChangeValue(ChangeValueRequest::Light { change, id, .. }) = request else {
            panic!("expected light change");
        };
        assert!(matches!(change, LightChange::Power(PowerValue::Toggle)));
        assert_eq!(id, RequestId(json!(7)));
    }

    #[test]
    fn test_parse_scene_apply_without_value() {
        let raw = json!({
            "id": "changeValueRequestPacket",
            "data": {"request": "scene", "name": "Movie", "key": "apply", "id": "x"}
        });
        let request: Request = serde_json::from_value(raw).unwrap();
        assert!(matches!(
            request,
            Request::ChangeValue(ChangeValueRequest::Scene {
                change: SceneChange::Apply,
                ..
            })
        ));
    }

    #[test]
    fn test_unknown_combination_is_rejected() {
        let raw = json!({
            "id": "changeValueRequestPacket",
            "data": {"request": "light", "name": "L", "key": "volume", "value": 3, "id": "x"}
        });
        assert!(serde_json::from_value::<Request>(raw).is_err());

        let raw = json!({"id": "rebootRequestPacket", "data": {"id": "x"}});
        assert!(serde_json::from_value::<Request>(raw).is_err());
    }

    #[test]
    fn test_success_packet_shape() {
        let response = Response::success("Room created.", RequestId::from("abc"));
        assert_eq!(
            serde_json::to_value(&response).unwrap(),
            json!({
                "id": "successPacket",
                "data": {"message": "Room created.", "id": "abc"}
            })
        );
    }

    #[test]
    fn test_get_setup_packet_shape() {
        assert_eq!(
            serde_json::to_value(Response::GetSetup).unwrap(),
            json!({"id": "getSetupPackets"})
        );
    }

    #[test]
    fn test_forwarded_change_value_round_trip() {
        let change = ChangeValueRequest::Light {
            name: "Strip1".to_string(),
            change: LightChange::Power(PowerValue::Set(true)),
            id: RequestId::from("fan-out"),
        };
        let value = serde_json::to_value(DevicePacket::ChangeValue(change)).unwrap();
        assert_eq!(
            value,
            json!({
                "id": "changeValueRequestPacket",
                "data": {
                    "request": "light",
                    "name": "Strip1",
                    "key": "power",
                    "value": "true",
                    "id": "fan-out"
                }
            })
        );
    }

    #[test]
    fn test_request_id_echoed_verbatim() {
        let id = RequestId(json!({"nested": [1, 2, 3]}));
        let response = Response::error("nope", id.clone());
        let value = serde_json::to_value(&response).unwrap();
        assert_eq!(value["data"]["id"], json!({"nested": [1, 2, 3]}));
    }
}
