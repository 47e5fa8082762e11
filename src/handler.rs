//! Control-plane request dispatch.
//!
//! A state-free dispatcher: every request produces exactly one response, and
//! missing entities come back as error packets instead of tearing down a
//! listener. Mutations run under the store lock; pending device pushes are
//! executed after the lock is released, and for single-light value changes
//! the final answer reflects the device's acknowledgement, not just the
//! local mutation.

use std::sync::{Arc, RwLock};

use futures::future::join_all;
use log::warn;

use crate::device::{DeviceClient, DevicePush};
use crate::mqtt::MqttBridge;
use crate::packet::{
    ChangeValueRequest, CreateRequest, DevicePacket, EditRequest, InfoRequest, RemoveRequest,
    Request, RequestId, Response, SceneChange,
};
use crate::store::Store;

pub struct Handler {
    store: RwLock<Store>,
    devices: Arc<dyn DeviceClient>,
    mqtt: Option<Arc<MqttBridge>>,
    server_id: String,
}

impl Handler {
    pub fn new(
        store: Store,
        devices: Arc<dyn DeviceClient>,
        mqtt: Option<Arc<MqttBridge>>,
        server_id: String,
    ) -> Self {
        Self {
            store: RwLock::new(store),
            devices,
            mqtt,
            server_id,
        }
    }

    /// Shared access to the domain store (status page, setup packets).
    pub fn store(&self) -> &RwLock<Store> {
        &self.store
    }

    pub fn server_id(&self) -> &str {
        &self.server_id
    }

    /// Dispatch one request envelope and produce its single response.
    pub async fn handle(&self, request: Request) -> Response {
        match request {
            Request::Info(info) => self.handle_info(info),
            Request::Create(create) => self.handle_create(create).await,
            Request::Edit(edit) => self.handle_edit(edit),
            Request::Remove(remove) => self.handle_remove(remove),
            Request::ChangeValue(change) => self.handle_change_value(change).await,
        }
    }

    /// The three aggregate packets handed to an app on handshake.
    pub fn setup_packets(&self, id: &RequestId) -> Response {
        let store = self.store.read().unwrap();
        Response::Setup(vec![
            Response::AllLights {
                lights: store
                    .lights()
                    .map(|l| Response::Light(l.info_packet()))
                    .collect(),
                id: id.clone(),
            },
            Response::AllRooms {
                rooms: store
                    .rooms()
                    .map(|r| Response::Room(r.info_packet()))
                    .collect(),
                id: id.clone(),
            },
            Response::AllScenes {
                scenes: store
                    .scenes()
                    .map(|s| Response::Scene(s.info_packet()))
                    .collect(),
                id: id.clone(),
            },
        ])
    }

    fn handle_info(&self, info: InfoRequest) -> Response {
        let store = self.store.read().unwrap();
        match info {
            InfoRequest::Light { name, id } => match store.light(&name) {
                Ok(light) => Response::Light(light.info_packet()),
                Err(e) => Response::error(e.to_string(), id),
            },
            InfoRequest::Room { name, id } => match store.room(&name) {
                Ok(room) => Response::Room(room.info_packet()),
                Err(e) => Response::error(e.to_string(), id),
            },
            InfoRequest::Scene { name, id } => match store.scene(&name) {
                Ok(scene) => Response::Scene(scene.info_packet()),
                Err(e) => Response::error(e.to_string(), id),
            },
            InfoRequest::AllLights { id } => Response::AllLights {
                lights: store
                    .lights()
                    .map(|l| Response::Light(l.info_packet()))
                    .collect(),
                id,
            },
            InfoRequest::AllRooms { id } => Response::AllRooms {
                rooms: store
                    .rooms()
                    .map(|r| Response::Room(r.info_packet()))
                    .collect(),
                id,
            },
            InfoRequest::AllScenes { id } => Response::AllScenes {
                scenes: store
                    .scenes()
                    .map(|s| Response::Scene(s.info_packet()))
                    .collect(),
                id,
            },
            InfoRequest::LightsOfRoom { name, id } => match store.room(&name) {
                Ok(room) => Response::LightsOfRoom {
                    lights: room
                        .lights()
                        .iter()
                        .filter_map(|l| store.light(l).ok())
                        .map(|l| Response::Light(l.info_packet()))
                        .collect(),
                    name,
                    id,
                },
                Err(e) => Response::error(e.to_string(), id),
            },
            InfoRequest::ScenesOfRoom { name, id } => match store.room(&name) {
                Ok(room) => Response::ScenesOfRoom {
                    scenes: room
                        .scenes()
                        .iter()
                        .filter_map(|s| store.scene(s).ok())
                        .map(|s| Response::Scene(s.info_packet()))
                        .collect(),
                    name,
                    id,
                },
                Err(e) => Response::error(e.to_string(), id),
            },
        }
    }

    async fn handle_create(&self, create: CreateRequest) -> Response {
        match create {
            CreateRequest::Room { name, id } => {
                let result = self.store.write().unwrap().create_room(&name);
                match result {
                    Ok(()) => {
                        if let Some(mqtt) = &self.mqtt {
                            mqtt.subscribe(&name).await;
                        }
                        Response::success("Room created.", id)
                    }
                    Err(e) => Response::error(e.to_string(), id),
                }
            }
            CreateRequest::Light(reg) => {
                let id = reg.id.clone();
                let name = reg.name.clone();
                let result = self.store.write().unwrap().register_light(&reg);
                match result {
                    Ok(created) => {
                        if created {
                            if let Some(mqtt) = &self.mqtt {
                                mqtt.subscribe(&name).await;
                            }
                        }
                        // Re-registration is the device heartbeat; it is
                        // always acknowledged as a success.
                        Response::success("Light registered.", id)
                    }
                    Err(e) => Response::error(e.to_string(), id),
                }
            }
            CreateRequest::Scene(create) => {
                let id = create.id.clone();
                let result = self.store.write().unwrap().create_scene(&create);
                match result {
                    Ok(_) => Response::success("Scene created.", id),
                    Err(e) => Response::error(e.to_string(), id),
                }
            }
        }
    }

    fn handle_edit(&self, edit: EditRequest) -> Response {
        match edit {
            EditRequest::LightsOfRoom { name, lights, id } => {
                let result = self.store.write().unwrap().set_lights_of_room(&name, &lights);
                match result {
                    Ok(()) => Response::success("Room lights updated.", id),
                    Err(e) => Response::error(e.to_string(), id),
                }
            }
            EditRequest::LightStatesOfScene {
                name,
                light_states,
                id,
            } => {
                let result = self
                    .store
                    .write()
                    .unwrap()
                    .set_scene_states(&name, light_states);
                match result {
                    Ok(()) => Response::success("Scene light states updated.", id),
                    Err(e) => Response::error(e.to_string(), id),
                }
            }
        }
    }

    fn handle_remove(&self, remove: RemoveRequest) -> Response {
        match remove {
            RemoveRequest::Room { name, id } => {
                let result = self.store.write().unwrap().remove_room(&name);
                match result {
                    Ok(()) => Response::success("Room removed.", id),
                    Err(e) => Response::error(e.to_string(), id),
                }
            }
            RemoveRequest::Light { name, id } => {
                let result = self.store.write().unwrap().remove_light(&name);
                match result {
                    Ok(()) => Response::success("Light removed.", id),
                    Err(e) => Response::error(e.to_string(), id),
                }
            }
            RemoveRequest::Scene { name, id } => {
                let result = self.store.write().unwrap().remove_scene(&name);
                match result {
                    Ok(()) => Response::success("Scene removed.", id),
                    Err(e) => Response::error(e.to_string(), id),
                }
            }
        }
    }

    async fn handle_change_value(&self, change: ChangeValueRequest) -> Response {
        match change {
            ChangeValueRequest::Light { name, change, id } => {
                // Phase one: local mutation under the lock.
                let applied = self.store.write().unwrap().apply_light_change(&name, &change);
                let outcome = match applied {
                    Ok(outcome) => outcome,
                    Err(e) => return Response::error(e.to_string(), id),
                };

                // Phase two: forward the same change envelope to the device.
                let push = DevicePush {
                    light: name.clone(),
                    ip: outcome.ip,
                    packet: DevicePacket::ChangeValue(ChangeValueRequest::Light {
                        name: name.clone(),
                        change: change.clone(),
                        id: id.clone(),
                    }),
                };
                let device_result = self.devices.push(&push).await;

                if let Some(power) = outcome.new_power {
                    if let Some(mqtt) = &self.mqtt {
                        mqtt.publish_power(&name, power).await;
                    }
                }

                match device_result {
                    Ok(()) => Response::success("Light state changed.", id),
                    // Local state already reflects the change; the caller is
                    // told the device did not acknowledge it.
                    Err(e) => {
                        warn!("HANDLER: device push for {name} failed: {e}");
                        Response::error(e.to_string(), id)
                    }
                }
            }
            ChangeValueRequest::Room { name, change, id } => {
                let result =
                    self.store
                        .write()
                        .unwrap()
                        .apply_room_change(&name, &change, &self.server_id);
                let pushes = match result {
                    Ok(pushes) => pushes,
                    Err(e) => return Response::error(e.to_string(), id),
                };

                let results = join_all(pushes.iter().map(|p| self.devices.push(p))).await;
                for (push, result) in pushes.iter().zip(&results) {
                    if let Err(e) = result {
                        warn!("HANDLER: fan-out push to {} failed: {e}", push.light);
                    }
                }
                Response::success("Room state changed.", id)
            }
            ChangeValueRequest::Scene {
                name,
                change: SceneChange::Apply,
                id,
            } => {
                let result = self
                    .store
                    .write()
                    .unwrap()
                    .apply_scene(&name, &self.server_id);
                let outcome = match result {
                    Ok(outcome) => outcome,
                    Err(e) => return Response::error(e.to_string(), id),
                };

                for missing in &outcome.missing {
                    warn!("HANDLER: scene {name} references unknown light {missing}");
                }
                let results = join_all(outcome.pushes.iter().map(|p| self.devices.push(p))).await;
                for (push, result) in outcome.pushes.iter().zip(&results) {
                    if let Err(e) = result {
                        warn!("HANDLER: scene push to {} failed: {e}", push.light);
                    }
                }
                Response::success("Scene applied.", id)
            }
        }
    }
}
