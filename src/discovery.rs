//! Device discovery via UDP multicast (SSDP-style).
//!
//! Two independent flows share the multicast listener:
//!
//! - **Active search**: `M-SEARCH` broadcasts for light devices, fired twice
//!   at startup and on a steady interval afterwards. Replies arrive
//!   asynchronously on the listener, which fetches the advertised descriptor
//!   and dispatches it through the normal registration path.
//! - **Passive responder**: searches for a hub (`urn:diyleddevice:server`)
//!   are answered unicast with a descriptor pointing at our HTTP
//!   registration endpoint.
//!
//! An app can open a time-bounded discovery session; lights registered
//! through the listener while it runs are accumulated and pushed to every
//! requesting app when the timer expires.

use std::net::{IpAddr, Ipv4Addr};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use log::{debug, info, warn};
use serde_json::Value;
use tokio::net::UdpSocket;
use tokio::time::Instant;
use uuid::Uuid;

use crate::apps::AppRegistry;
use crate::errors::Error;
use crate::handler::Handler;
use crate::packet::{CreateRequest, Request, RequestId, Response};

type Result<T> = std::result::Result<T, Error>;

const MCAST_GROUP: Ipv4Addr = Ipv4Addr::new(239, 255, 255, 250);
const MCAST_PORT: u16 = 1900;
const MULTICAST_TTL: u32 = 32;

const TARGET_LIGHT: &str = "urn:diyleddevice:light";
const TARGET_SERVER: &str = "urn:diyleddevice:server";

const SESSION_DURATION: Duration = Duration::from_secs(30);
const SEARCH_INTERVAL: Duration = Duration::from_secs(30);
const DESCRIPTOR_TIMEOUT: Duration = Duration::from_secs(2);

/// A stable identifier for this hub, derived from the machine hostname.
pub fn server_id() -> String {
    let hostname = gethostname::gethostname();
    Uuid::new_v5(&Uuid::NAMESPACE_DNS, hostname.as_encoded_bytes()).to_string()
}

/// One running discovery window with its result accumulator.
struct DiscoverySession {
    deadline: Instant,
    lights: Vec<String>,
}

/// Drives multicast discovery and timed discovery sessions.
pub struct Discovery {
    handler: Arc<Handler>,
    apps: Arc<AppRegistry>,
    http: reqwest::Client,
    session: Mutex<Option<DiscoverySession>>,
    server_id: String,
    http_port: u16,
}

impl Discovery {
    pub fn new(
        handler: Arc<Handler>,
        apps: Arc<AppRegistry>,
        server_id: String,
        http_port: u16,
    ) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(DESCRIPTOR_TIMEOUT)
            .build()
            .map_err(Error::Http)?;
        Ok(Self {
            handler,
            apps,
            http,
            session: Mutex::new(None),
            server_id,
            http_port,
        })
    }

    /// The shared multicast listener loop.
    pub async fn run(self: Arc<Self>) -> Result<()> {
        let socket = UdpSocket::bind((Ipv4Addr::UNSPECIFIED, MCAST_PORT))
            .await
            .map_err(|e| Error::socket("bind multicast", e))?;
        socket
            .join_multicast_v4(MCAST_GROUP, Ipv4Addr::UNSPECIFIED)
            .map_err(|e| Error::socket("join multicast group", e))?;
        socket
            .set_multicast_loop_v4(true)
            .map_err(|e| Error::socket("set multicast loop", e))?;
        socket
            .set_multicast_ttl_v4(MULTICAST_TTL)
            .map_err(|e| Error::socket("set multicast ttl", e))?;
        info!("DISCOVERY: listening on {MCAST_GROUP}:{MCAST_PORT}");

        let mut buffer = [0u8; 2048];
        loop {
            let (size, addr) = socket
                .recv_from(&mut buffer)
                .await
                .map_err(|e| Error::socket("recv_from", e))?;
            let Ok(text) = std::str::from_utf8(&buffer[..size]) else {
                continue;
            };

            if is_light_reply(text) {
                let Some(location) = location_header(text) else {
                    debug!("DISCOVERY: light reply from {addr} without LOCATION header");
                    continue;
                };
                debug!("DISCOVERY: light descriptor advertised at {location} by {addr}");
                if let Err(e) = self.ingest_descriptor(location).await {
                    warn!("DISCOVERY: failed to ingest descriptor from {addr}: {e}");
                }
            } else if is_server_search(text) {
                debug!("DISCOVERY: answering server search from {addr}");
                let response = self.descriptor_response();
                if let Err(e) = socket.send_to(response.as_bytes(), addr).await {
                    warn!("DISCOVERY: reply to {addr} failed: {e}");
                }
            }
        }
    }

    /// Fire search broadcasts: two immediately at startup, then one per
    /// interval so devices that boot later are still found.
    pub async fn search_loop(self: Arc<Self>) {
        for _ in 0..2 {
            if let Err(e) = self.search_for_lights().await {
                warn!("DISCOVERY: search failed: {e}");
            }
        }
        let mut ticker = tokio::time::interval_at(Instant::now() + SEARCH_INTERVAL, SEARCH_INTERVAL);
        loop {
            ticker.tick().await;
            if let Err(e) = self.search_for_lights().await {
                warn!("DISCOVERY: search failed: {e}");
            }
        }
    }

    /// Broadcast one `M-SEARCH` for light devices. Replies are not awaited
    /// here; they arrive on the shared listener.
    pub async fn search_for_lights(&self) -> Result<()> {
        let socket = UdpSocket::bind(("0.0.0.0", 0))
            .await
            .map_err(|e| Error::socket("bind", e))?;
        socket
            .set_multicast_ttl_v4(MULTICAST_TTL)
            .map_err(|e| Error::socket("set multicast ttl", e))?;
        socket
            .send_to(search_request().as_bytes(), (MCAST_GROUP, MCAST_PORT))
            .await
            .map_err(|e| Error::socket("send_to", e))?;
        Ok(())
    }

    /// Open (or join) a discovery session for the given app address.
    ///
    /// A second request while a session runs joins it: the caller's discover
    /// flag is set and the original deadline stands. Starting a session also
    /// fires a fresh search broadcast.
    pub fn start_session(self: Arc<Self>, app: IpAddr) {
        self.apps.register(app);
        self.apps.mark_discover(app);
        if !self.open_session() {
            debug!("DISCOVERY: {app} joined the running session");
            return;
        }

        info!("DISCOVERY: session started for {app}");
        let this = Arc::clone(&self);
        tokio::spawn(async move {
            tokio::time::sleep(SESSION_DURATION).await;
            this.finish_session().await;
        });
        tokio::spawn(async move {
            if let Err(e) = self.search_for_lights().await {
                warn!("DISCOVERY: search failed: {e}");
            }
        });
    }

    /// Create the session window if none is running. Returns whether a new
    /// session was opened.
    fn open_session(&self) -> bool {
        let mut session = self.session.lock().unwrap();
        if session.is_some() {
            return false;
        }
        *session = Some(DiscoverySession {
            deadline: Instant::now() + SESSION_DURATION,
            lights: Vec::new(),
        });
        true
    }

    /// Record a light found while a session window is open. Events after the
    /// deadline are dropped even if the timer has not fired yet.
    fn record_discovered(&self, name: &str) {
        let mut session = self.session.lock().unwrap();
        if let Some(session) = session.as_mut() {
            if Instant::now() < session.deadline {
                session.lights.push(name.to_string());
            }
        }
    }

    /// Close the session and push its results to every app that asked.
    pub async fn finish_session(&self) -> Vec<String> {
        let lights = self
            .session
            .lock()
            .unwrap()
            .take()
            .map(|s| s.lights)
            .unwrap_or_default();
        info!("DISCOVERY: session finished with {} lights", lights.len());

        let packet = Response::DiscoverResult {
            lights: lights.clone(),
            id: RequestId::from(self.server_id.as_str()),
        };
        for ip in self.apps.take_discover_flags() {
            self.apps.notify(ip, &packet).await;
        }
        lights
    }

    /// Fetch an advertised descriptor and run it through the registration
    /// path a device would use over HTTP.
    async fn ingest_descriptor(&self, url: &str) -> Result<()> {
        let reply = self.http.get(url).send().await.map_err(Error::Http)?;
        let body: Value = reply.json().await.map_err(Error::Http)?;
        let request: Request =
            serde_json::from_value(body).map_err(|e| Error::MalformedRequest(e.to_string()))?;

        let Request::Create(CreateRequest::Light(reg)) = &request else {
            return Err(Error::MalformedRequest(
                "descriptor was not a light registration".to_string(),
            ));
        };
        let name = reg.name.clone();

        let response = self.handler.handle(request).await;
        if response.is_success() {
            self.record_discovered(&name);
        } else {
            warn!("DISCOVERY: registration of {name} was rejected");
        }
        Ok(())
    }

    /// The unicast reply to a server search, pointing the requester at our
    /// HTTP registration endpoint.
    fn descriptor_response(&self) -> String {
        [
            "HTTP/1.1 200 OK",
            "EXT:",
            "CACHE-CONTROL: max-age=100",
            &format!("LOCATION: http://{}:{}/diyledapp", local_ip(), self.http_port),
            "SERVER: DiyLed/1.1, UPnP/1.0, DiyLedHub/1.1",
            &format!("ST: {TARGET_SERVER}"),
            &format!("USN: uuid:{}::urn:diyleddevice", self.server_id),
            "",
            "",
        ]
        .join("\r\n")
    }

    #[cfg(test)]
    fn session_lights(&self) -> Option<Vec<String>> {
        self.session.lock().unwrap().as_ref().map(|s| s.lights.clone())
    }
}

fn search_request() -> String {
    [
        "M-SEARCH * HTTP/1.1",
        &format!("HOST: {MCAST_GROUP}:{MCAST_PORT}"),
        "MAN: \"ssdp:discover\"",
        &format!("ST: {TARGET_LIGHT}"),
        "MX: 2",
        "USER-AGENT: DiyLed/1.1 DiyLedHub/1.1",
        "",
        "",
    ]
    .join("\r\n")
}

fn is_light_reply(text: &str) -> bool {
    text.contains("HTTP/1.1 200 OK") && text.contains(TARGET_LIGHT)
}

fn is_server_search(text: &str) -> bool {
    text.contains("M-SEARCH * HTTP/1.1") && text.contains(TARGET_SERVER)
}

fn location_header(text: &str) -> Option<&str> {
    text.lines()
        .find_map(|line| line.strip_prefix("LOCATION: "))
        .map(str::trim)
}

/// Best-effort local interface address (advertised in descriptors).
fn local_ip() -> IpAddr {
    std::net::UdpSocket::bind(("0.0.0.0", 0))
        .and_then(|socket| {
            // Connecting picks the outbound interface; nothing is sent.
            socket.connect(("10.255.255.255", 1))?;
            socket.local_addr()
        })
        .map(|addr| addr.ip())
        .unwrap_or(IpAddr::V4(Ipv4Addr::LOCALHOST))
}
