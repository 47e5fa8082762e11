//! Optional MQTT bridge.
//!
//! When enabled in the config, the hub subscribes to each light's and room's
//! topic at registration and publishes the new power state whenever a
//! light's power changes. A broker outage degrades to log lines; it never
//! fails a control-plane request.

use std::time::Duration;

use log::{debug, info, warn};
use rumqttc::{AsyncClient, Event, Incoming, MqttOptions, QoS};

use crate::config::MqttConfig;

const KEEP_ALIVE: Duration = Duration::from_secs(30);
const RECONNECT_DELAY: Duration = Duration::from_secs(5);

pub struct MqttBridge {
    client: AsyncClient,
}

impl MqttBridge {
    /// Create the client and spawn its event loop.
    pub fn connect(config: &MqttConfig) -> Self {
        let mut options = MqttOptions::new("diyled-hub", &config.host, config.port);
        options.set_keep_alive(KEEP_ALIVE);
        if let (Some(user), Some(pass)) = (&config.username, &config.password) {
            options.set_credentials(user, pass);
        }

        let (client, mut eventloop) = AsyncClient::new(options, 64);
        info!("MQTT: connecting to {}:{}", config.host, config.port);

        tokio::spawn(async move {
            loop {
                match eventloop.poll().await {
                    Ok(Event::Incoming(Incoming::ConnAck(_))) => info!("MQTT: connected"),
                    Ok(event) => debug!("MQTT: event {event:?}"),
                    Err(e) => {
                        warn!("MQTT: connection error: {e}");
                        tokio::time::sleep(RECONNECT_DELAY).await;
                    }
                }
            }
        });

        Self { client }
    }

    pub async fn subscribe(&self, topic: &str) {
        if let Err(e) = self.client.subscribe(topic, QoS::AtMostOnce).await {
            warn!("MQTT: subscribe to {topic} failed: {e}");
        }
    }

    pub async fn publish_power(&self, light: &str, power: bool) {
        let payload = if power { "true" } else { "false" };
        if let Err(e) = self
            .client
            .publish(light, QoS::AtMostOnce, false, payload)
            .await
        {
            warn!("MQTT: publish for {light} failed: {e}");
        }
    }
}
