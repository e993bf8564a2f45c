//! MQTT backbone session.
//!
//! Opens one TLS connection to the continent's broker, subscribes to the
//! device's report topic and forwards every publish as a
//! [`TransportEvent::Message`]. `Ready` is emitted only once the broker
//! acknowledges the subscription without a failure code.
//!
//! The broker connection carries its own keepalive, so there is no
//! application-level ping for this backbone. Reconnection is not
//! attempted: a dropped connection surfaces as `Error` then `Closed`.

use std::time::Duration;

use rumqttc::{
    AsyncClient, Event, EventLoop, MqttOptions, Outgoing, Packet, QoS, SubscribeReasonCode,
    TlsConfiguration, Transport,
};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::address::{AccountIdentity, DeviceAddress, MQTT_PORT};
use crate::error::Error;
use crate::session::{EventSender, TransportEvent, emit};
use crate::tls;
use crate::transport::TlsMode;

const REQUEST_CHANNEL_CAPACITY: usize = 16;
const BROKER_KEEPALIVE: Duration = Duration::from_secs(60);
const CLOSE_GRACE: Duration = Duration::from_secs(2);

/// Handle to a running MQTT session.
pub struct MqttSession {
    client: AsyncClient,
    topic: String,
    cancel: CancellationToken,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl MqttSession {
    /// Build broker options for an account: identity as username, the
    /// session token as password, TLS per `tls`.
    pub fn options(
        host: &str,
        port: u16,
        identity: &AccountIdentity,
        tls: &TlsMode,
    ) -> Result<MqttOptions, Error> {
        use secrecy::ExposeSecret;

        let mut options = MqttOptions::new(identity.client_id(), host, port);
        options.set_credentials(identity.identity(), identity.token.expose_secret());
        options.set_keep_alive(BROKER_KEEPALIVE);
        options.set_clean_session(true);
        let config = tls::broker::client_config(tls)?;
        options.set_transport(Transport::tls_with_config(TlsConfiguration::Rustls(config)));
        Ok(options)
    }

    /// Connect to the broker and subscribe to the device's reports.
    ///
    /// Returns once the background task is spawned; watch `event_tx`
    /// for `Ready` or `Error`.
    pub async fn connect(
        host: &str,
        port: Option<u16>,
        identity: &AccountIdentity,
        device: &DeviceAddress,
        tls: &TlsMode,
        event_tx: EventSender,
        cancel: CancellationToken,
    ) -> Result<Self, Error> {
        let options = Self::options(host, port.unwrap_or(MQTT_PORT), identity, tls)?;
        let (client, eventloop) = AsyncClient::new(options, REQUEST_CHANNEL_CAPACITY);

        let topic = device.report_topic();
        client
            .subscribe(topic.as_str(), QoS::AtMostOnce)
            .await
            .map_err(|e| Error::MqttConnect(e.to_string()))?;

        info!(host, topic = %topic, "connecting to MQTT broker");
        let task_cancel = cancel.clone();
        let task_topic = topic.clone();
        let task = tokio::spawn(async move {
            mqtt_loop(eventloop, task_topic, event_tx, task_cancel).await;
        });

        Ok(Self {
            client,
            topic,
            cancel,
            task: Mutex::new(Some(task)),
        })
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Unsubscribe, disconnect and wait briefly for the loop to drain.
    pub async fn close(&self) {
        if let Err(e) = self.client.unsubscribe(self.topic.as_str()).await {
            debug!(error = %e, "unsubscribe request not queued");
        }
        if let Err(e) = self.client.disconnect().await {
            debug!(error = %e, "disconnect request not queued");
        }

        if let Some(task) = self.task.lock().await.take() {
            if tokio::time::timeout(CLOSE_GRACE, task).await.is_err() {
                debug!("MQTT loop did not drain in time, cancelling");
                self.cancel.cancel();
            }
        }
        self.cancel.cancel();
    }
}

// ── Background loop ──────────────────────────────────────────────────

async fn mqtt_loop(
    mut eventloop: EventLoop,
    topic: String,
    event_tx: EventSender,
    cancel: CancellationToken,
) {
    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            polled = eventloop.poll() => match polled {
                Ok(Event::Incoming(packet)) => {
                    if let Some(event) = classify(&packet, &topic) {
                        let fatal = matches!(event, TransportEvent::Error(_));
                        emit(&event_tx, event);
                        if fatal {
                            break;
                        }
                    }
                }
                Ok(Event::Outgoing(Outgoing::Disconnect)) => {
                    debug!("MQTT disconnect sent");
                    break;
                }
                Ok(Event::Outgoing(_)) => {}
                Err(e) => {
                    warn!(error = %e, "MQTT connection error");
                    emit(&event_tx, TransportEvent::Error(Error::MqttConnect(e.to_string()).to_string()));
                    break;
                }
            }
        }
    }

    emit(&event_tx, TransportEvent::Closed);
    debug!("MQTT loop exiting");
}

/// Translate one incoming packet into a transport event, if it is one
/// the session cares about.
fn classify(packet: &Packet, topic: &str) -> Option<TransportEvent> {
    match packet {
        Packet::ConnAck(ack) => {
            debug!(code = ?ack.code, "MQTT connected");
            None
        }
        Packet::SubAck(ack) => {
            if ack
                .return_codes
                .iter()
                .any(|code| matches!(code, SubscribeReasonCode::Failure))
            {
                Some(TransportEvent::Error(
                    Error::SubscriptionRejected {
                        topic: topic.to_owned(),
                    }
                    .to_string(),
                ))
            } else {
                info!(topic, "MQTT subscription acknowledged");
                Some(TransportEvent::Ready)
            }
        }
        Packet::Publish(publish) => Some(TransportEvent::Message {
            topic: Some(publish.topic.clone()),
            payload: String::from_utf8_lossy(&publish.payload).into_owned(),
        }),
        _ => None,
    }
}
