//! # diyled_hub
//!
//! A self-hosted hub for DIY addressable LED lights. The hub discovers light
//! devices on the local network with an SSDP-style multicast protocol,
//! groups them into rooms with a derived aggregate power state, captures
//! per-light snapshots as scenes, and keeps connected controller apps in
//! sync through UDP push notifications.
//!
//! ## Architecture
//!
//! - [`Store`] - in-memory registry of lights, rooms, and scenes; all shared
//!   mutable state lives here behind one coarse lock, with write-through
//!   persistence via a [`ConfigStore`].
//! - [`Handler`] - decodes control-plane envelopes, mutates the store, and
//!   executes the resulting device pushes outside the lock.
//! - [`HttpDeviceClient`] - forwards value changes and scene states to the
//!   physical devices over HTTP.
//! - [`AppRegistry`] - tracks controller apps by address and pushes
//!   fire-and-forget UDP notifications to them.
//! - [`Discovery`] - multicast search/respond loops plus time-bounded
//!   discovery sessions requested by apps.
//! - [`router`](server) - the axum HTTP surface (`/diyled`, `/diyledinfo`,
//!   `/diyledapp`, `/diyleddiscover`, `/diyledstatus`).
//!
//! ## Protocol
//!
//! Requests and responses are JSON envelopes tagged by packet kind; see
//! [`packet`]. Every response echoes the caller's opaque request id, so
//! asynchronous replies can be correlated client-side.

mod apps;
mod color;
mod config;
mod device;
mod discovery;
mod errors;
mod handler;
mod light;
mod mqtt;
pub mod packet;
mod room;
mod scene;
pub mod server;
mod store;

// Re-export public API
pub use apps::{APP_PUSH_PORT, AppInstance, AppRegistry};
pub use color::Color;
pub use config::{
    ConfigDocument, ConfigStore, JsonConfig, LightRecord, MemoryConfig, MqttConfig, RoomRecord,
    SceneRecord, ServerConfig,
};
pub use device::{DeviceClient, DevicePush, HttpDeviceClient};
pub use discovery::{Discovery, server_id};
pub use errors::{EntityKind, Error};
pub use handler::Handler;
pub use light::Light;
pub use mqtt::MqttBridge;
pub use room::Room;
pub use scene::{LightState, Scene};
pub use server::{ServerState, router};
pub use store::{LightChangeOutcome, SceneApplyOutcome, Store};
