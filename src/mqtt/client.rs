use std::time::{Duration, SystemTime, UNIX_EPOCH};

use rumqttc::{AsyncClient, Event, EventLoop, Incoming, MqttOptions, Outgoing, QoS};
use tokio::sync::oneshot;
use tracing::{debug, error, info, warn};

use super::{Outbound, topics};
use crate::config::Config;
use crate::device::router::Router;
use crate::device::{DeviceInfo, SYNCED_KEYS};
use crate::error::{Error, Result};

pub struct MqttClient {
    client: AsyncClient,
    eventloop: EventLoop,
    config: Config,
}

impl MqttClient {
    pub fn new(config: &Config) -> Self {
        let mut mqttopts = MqttOptions::new(
            &config.mqtt.client_id,
            &config.mqtt.broker_host,
            config.mqtt.broker_port,
        );
        mqttopts.set_keep_alive(Duration::from_secs(60));
        mqttopts.set_credentials(&config.mqtt.username, &config.mqtt.access_token);

        let (client, eventloop) = AsyncClient::new(mqttopts, 100);

        Self {
            client,
            eventloop,
            config: config.clone(),
        }
    }

    /// Connect and wait for the broker's ConnAck.
    ///
    /// A refused or failed first connection is returned to the caller. The
    /// subscriptions and the shared-attribute request are queued before
    /// returning and go out once [`run`](Self::run) polls the event loop.
    pub async fn connect(config: &Config) -> Result<Self> {
        let mut this = Self::new(config);
        info!(
            "Connecting to {}:{} as {}",
            config.mqtt.broker_host, config.mqtt.broker_port, config.mqtt.client_id
        );

        loop {
            match this.eventloop.poll().await {
                Ok(Event::Incoming(Incoming::ConnAck(ack))) => {
                    info!("Connected to MQTT broker ({:?})", ack.code);
                    break;
                }
                Ok(_) => {}
                Err(source) => {
                    return Err(Error::Connect {
                        host: config.mqtt.broker_host.clone(),
                        port: config.mqtt.broker_port,
                        source,
                    });
                }
            }
        }

        this.on_connected();
        Ok(this)
    }

    /// A handle for publishing from outside the event loop task.
    pub fn handle(&self) -> AsyncClient {
        self.client.clone()
    }

    /// Run the MQTT event loop until `stop_rx` fires. Every inbound publish
    /// goes through `router`, and whatever it returns is published in order.
    /// On stop the loop stops handling messages and the connection is
    /// closed.
    pub async fn run(mut self, router: Router, mut stop_rx: oneshot::Receiver<()>) {
        loop {
            tokio::select! {
                event = self.eventloop.poll() => {
                    match event {
                        Ok(Event::Incoming(Incoming::ConnAck(_))) => {
                            info!("Reconnected to MQTT broker");
                            self.on_connected();
                        }
                        Ok(Event::Incoming(Incoming::Publish(publish))) => {
                            let outbound = router.route(&publish.topic, &publish.payload);
                            publish_all(&self.client, &outbound);
                        }
                        Ok(Event::Incoming(Incoming::SubAck(ack))) => {
                            debug!("Subscription acknowledged: {:?}", ack.return_codes);
                        }
                        Ok(_) => {}
                        Err(e) => {
                            error!("MQTT connection error: {}. Reconnecting...", e);
                            tokio::select! {
                                _ = tokio::time::sleep(Duration::from_secs(5)) => {}
                                _ = &mut stop_rx => {
                                    info!("Stopping MQTT event loop");
                                    break;
                                }
                            }
                        }
                    }
                }
                _ = &mut stop_rx => {
                    info!("Stopping MQTT event loop");
                    break;
                }
            }
        }

        self.disconnect().await;
    }

    /// Subscribe to RPC requests and attribute responses, then ask the
    /// server for the current shared attributes and announce the device.
    ///
    /// Runs inside the event loop task, so requests are queued with the
    /// non-blocking `try_*` calls.
    fn on_connected(&self) {
        for filter in topics::SUBSCRIPTIONS {
            match self.client.try_subscribe(filter, QoS::AtLeastOnce) {
                Ok(()) => info!("Subscribed to {}", filter),
                Err(source) => error!(
                    "{}",
                    Error::Subscribe {
                        topic: filter.to_string(),
                        source,
                    }
                ),
            }
        }

        let request_id = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or_default();
        let requests = [
            Outbound::json(topics::attributes_request(request_id), &SYNCED_KEYS),
            Outbound::json(
                topics::ATTRIBUTES,
                &DeviceInfo {
                    device_name: self.config.device.name.clone(),
                    latitude: self.config.device.latitude,
                    longitude: self.config.device.longitude,
                },
            ),
        ];
        for msg in requests {
            if let Err(e) = msg.and_then(|msg| try_publish(&self.client, &msg)) {
                warn!("{}", e);
            }
        }
        info!("Requested current attributes from server");
    }

    async fn disconnect(&mut self) {
        info!("Disconnecting from broker");
        if let Err(e) = self.client.try_disconnect() {
            warn!("Failed to queue disconnect: {}", e);
            return;
        }
        // Drive the event loop until the DISCONNECT packet is on the wire.
        loop {
            match self.eventloop.poll().await {
                Ok(Event::Outgoing(Outgoing::Disconnect)) => break,
                Ok(_) => {}
                Err(e) => {
                    debug!("Event loop closed during disconnect: {}", e);
                    break;
                }
            }
        }
    }
}

fn encode(msg: &Outbound) -> Result<Vec<u8>> {
    serde_json::to_vec(&msg.payload).map_err(|source| Error::Encode {
        topic: msg.topic.clone(),
        source,
    })
}

/// Queue a publish without waiting; used from the event loop task.
pub fn try_publish(client: &AsyncClient, msg: &Outbound) -> Result<()> {
    let payload = encode(msg)?;
    client
        .try_publish(&msg.topic, QoS::AtLeastOnce, false, payload)
        .map_err(|source| Error::Publish {
            topic: msg.topic.clone(),
            source,
        })?;
    debug!("Published {}: {}", msg.topic, msg.payload);
    Ok(())
}

/// Queue every message independently. A failed publish is logged and the
/// rest are still attempted; the failures are returned.
pub fn publish_all(client: &AsyncClient, messages: &[Outbound]) -> Vec<Error> {
    messages
        .iter()
        .filter_map(|msg| try_publish(client, msg).err())
        .inspect(|e| warn!("{}", e))
        .collect()
}
