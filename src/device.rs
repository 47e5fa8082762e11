//! Pushing state changes to physical light devices.

use std::time::Duration;

use async_trait::async_trait;
use log::debug;
use serde_json::Value;

use crate::errors::Error;
use crate::packet::DevicePacket;

type Result<T> = std::result::Result<T, Error>;

/// A pending notification for one physical light device.
///
/// Mutations produce these under the store lock; a dispatcher executes them
/// afterwards so no network call ever runs while the lock is held.
#[derive(Debug, Clone, PartialEq)]
pub struct DevicePush {
    pub light: String,
    pub ip: String,
    pub packet: DevicePacket,
}

/// Transport to physical light devices.
///
/// Anything other than a well-formed success reply - connection failure,
/// timeout, malformed or negative reply - surfaces uniformly as
/// [`Error::DeviceUnreachable`]. Local state is never rolled back on device
/// error.
#[async_trait]
pub trait DeviceClient: Send + Sync {
    async fn push(&self, push: &DevicePush) -> Result<()>;
}

/// [`DeviceClient`] speaking the device HTTP contract.
pub struct HttpDeviceClient {
    http: reqwest::Client,
    server_id: String,
}

impl HttpDeviceClient {
    const DEVICE_PORT: u16 = 80;
    const TIMEOUT: Duration = Duration::from_secs(2);

    pub fn new(server_id: String) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Self::TIMEOUT)
            .build()
            .map_err(Error::Http)?;
        Ok(Self { http, server_id })
    }

    fn endpoint(packet: &DevicePacket) -> &'static str {
        match packet {
            DevicePacket::ChangeValue(_) => "updateValue",
            DevicePacket::ApplyScene(_) => "applyScene",
        }
    }
}

#[async_trait]
impl DeviceClient for HttpDeviceClient {
    async fn push(&self, push: &DevicePush) -> Result<()> {
        let url = format!(
            "http://{}:{}/diyledapi/{}/{}",
            push.ip,
            Self::DEVICE_PORT,
            self.server_id,
            Self::endpoint(&push.packet)
        );
        debug!("DEVICE: PUT {url}");

        let response = self
            .http
            .put(&url)
            .json(&push.packet)
            .send()
            .await
            .map_err(|e| Error::unreachable(&push.light, &push.ip, e))?;

        let reply: Value = response
            .json()
            .await
            .map_err(|e| Error::unreachable(&push.light, &push.ip, e))?;

        if reply.get("id").and_then(Value::as_str) == Some("successPacket") {
            Ok(())
        } else {
            Err(Error::unreachable(
                &push.light,
                &push.ip,
                "device reply was not a success packet",
            ))
        }
    }
}
