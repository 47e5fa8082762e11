//! Connected controller-app tracking and push notifications.

use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::Mutex;

use log::{debug, warn};
use tokio::net::UdpSocket;

use crate::errors::Error;
use crate::packet::Response;

type Result<T> = std::result::Result<T, Error>;

/// UDP port apps listen on for push envelopes.
pub const APP_PUSH_PORT: u16 = 7777;

/// A connected controller-app instance.
///
/// Created on first handshake and never explicitly destroyed; lifetime is
/// the process uptime.
#[derive(Debug, Clone)]
pub struct AppInstance {
    ip: IpAddr,
    discover: bool,
}

impl AppInstance {
    pub fn ip(&self) -> IpAddr {
        self.ip
    }

    /// Whether this app requested the currently running discovery session.
    pub fn discover_active(&self) -> bool {
        self.discover
    }
}

/// Registry of connected apps, keyed by network address.
///
/// Pushes are fire-and-forget UDP datagrams: delivery failures are logged
/// and never reported to any caller.
pub struct AppRegistry {
    socket: UdpSocket,
    apps: Mutex<HashMap<IpAddr, AppInstance>>,
}

impl AppRegistry {
    pub async fn bind() -> Result<Self> {
        let socket = UdpSocket::bind(("0.0.0.0", 0))
            .await
            .map_err(|e| Error::socket("bind app push socket", e))?;
        Ok(Self {
            socket,
            apps: Mutex::new(HashMap::new()),
        })
    }

    /// Idempotent upsert keyed by address (the `/diyledapp` handshake path).
    pub fn register(&self, ip: IpAddr) {
        self.apps.lock().unwrap().entry(ip).or_insert_with(|| {
            debug!("APPS: registered instance {ip}");
            AppInstance {
                ip,
                discover: false,
            }
        });
    }

    /// Flag an app as waiting for discovery results, registering it first if
    /// it skipped the handshake.
    pub fn mark_discover(&self, ip: IpAddr) {
        self.apps
            .lock()
            .unwrap()
            .entry(ip)
            .or_insert(AppInstance {
                ip,
                discover: false,
            })
            .discover = true;
    }

    /// Clear and return every address waiting on discovery results.
    pub fn take_discover_flags(&self) -> Vec<IpAddr> {
        self.apps
            .lock()
            .unwrap()
            .values_mut()
            .filter(|app| app.discover)
            .map(|app| {
                app.discover = false;
                app.ip
            })
            .collect()
    }

    pub fn count(&self) -> usize {
        self.apps.lock().unwrap().len()
    }

    /// Best-effort unicast push to one app.
    pub async fn notify(&self, ip: IpAddr, envelope: &Response) {
        let bytes = match serde_json::to_vec(envelope) {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!("APPS: failed to encode push envelope: {e}");
                return;
            }
        };
        if let Err(e) = self.socket.send_to(&bytes, (ip, APP_PUSH_PORT)).await {
            warn!("APPS: push to {ip} failed: {e}");
        }
    }

    /// Push to every registered instance except the origin address.
    pub async fn broadcast_except(&self, origin: Option<IpAddr>, envelope: &Response) {
        let targets: Vec<IpAddr> = self
            .apps
            .lock()
            .unwrap()
            .keys()
            .copied()
            .filter(|ip| Some(*ip) != origin)
            .collect();
        for ip in targets {
            self.notify(ip, envelope).await;
        }
    }
}
