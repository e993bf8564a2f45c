// ── Robot session controller ──
//
// Full lifecycle of one robot session: backbone connection, command
// routing (REST gateway for MQTT devices, the stanza stream for XMPP
// devices), the single-writer event router task, keepalive, and
// reactive state publishing.

use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tokio::sync::{Mutex, broadcast, mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use deebot_api::{
    DeviceAddress, GatewayClient, GatewayRequest, MqttSession, Payload, TransportEvent,
    XmppSession, event_channel,
};

use crate::command::{Command, CommandEnvelope, CommandResult, encode};
use crate::config::SessionConfig;
use crate::dictionary::Component;
use crate::error::CoreError;
use crate::event::Decoded;
use crate::map::MapSnapshot;
use crate::model::{BoundaryKind, DeviceGeneration};
use crate::normalize::{Context, Normalizer};
use crate::router::{EventRouter, RouteOutcome, VacBotEvent};
use crate::state::DeviceState;
use crate::stream::StateStream;

const COMMAND_CHANNEL_SIZE: usize = 64;
const ROUTER_CHANNEL_SIZE: usize = 64;
const EVENT_CHANNEL_SIZE: usize = 256;

// ── ConnectionState ──────────────────────────────────────────────────

/// Connection state observable by consumers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    /// The backbone signalled `ready`.
    Connected,
    Failed,
}

// ── Internal plumbing ────────────────────────────────────────────────

enum Backbone {
    Mqtt(MqttSession),
    Xmpp(XmppSession),
}

/// Where encoded commands go.
#[derive(Clone)]
enum CommandSink {
    Gateway,
    Stream(XmppSession),
}

/// Channels and cancellation scoped to one connect/disconnect cycle.
#[derive(Clone)]
struct SessionLink {
    /// Session validity: cancelled on teardown.
    cancel: CancellationToken,
    command_tx: mpsc::Sender<CommandEnvelope>,
    router_tx: mpsc::Sender<RouterInput>,
}

/// Work for the router task besides backbone deliveries.
enum RouterInput {
    Response {
        command: String,
        document: Value,
        reply: oneshot::Sender<Result<CommandResult, CoreError>>,
    },
    ResetBoundaries(String),
}

// ── VacBot ───────────────────────────────────────────────────────────

/// Handle to one robot session.
///
/// Cheaply cloneable via `Arc<VacBotInner>`. Device state is only
/// written by the router task; everything else reads published
/// snapshots.
#[derive(Clone)]
pub struct VacBot {
    inner: Arc<VacBotInner>,
}

struct VacBotInner {
    config: SessionConfig,
    normalizer: Normalizer,
    gateway: GatewayClient,
    connection_state: watch::Sender<ConnectionState>,
    state_tx: watch::Sender<Arc<DeviceState>>,
    maps_tx: watch::Sender<Arc<MapSnapshot>>,
    event_tx: broadcast::Sender<Arc<VacBotEvent>>,
    /// Parent of every session token; never cancelled itself.
    cancel: CancellationToken,
    /// The running session, replaced on every connect.
    link: Mutex<Option<SessionLink>>,
    /// Router state between sessions; the router task holds it while running.
    router: Mutex<Option<EventRouter>>,
    backbone: Mutex<Option<Backbone>>,
    task_handles: Mutex<Vec<JoinHandle<()>>>,
}

impl VacBot {
    /// Create a session from configuration. Does NOT connect; call
    /// [`connect()`](Self::connect).
    pub fn new(config: SessionConfig) -> Result<Self, CoreError> {
        let transport = config.transport_config();
        let gateway = match &config.portal_base {
            Some(base) => GatewayClient::with_client(
                transport.build_client()?,
                base.clone(),
                config.identity.clone(),
                config.country.clone(),
            ),
            None => GatewayClient::new(
                &config.continent,
                config.identity.clone(),
                config.country.clone(),
                &transport,
            )?,
        };

        let generation = config.device.generation;
        let (connection_state, _) = watch::channel(ConnectionState::Disconnected);
        let (state_tx, _) = watch::channel(Arc::new(DeviceState::new(generation)));
        let (maps_tx, _) = watch::channel(Arc::new(MapSnapshot::default()));
        let (event_tx, _) = broadcast::channel(EVENT_CHANNEL_SIZE);

        Ok(Self {
            inner: Arc::new(VacBotInner {
                normalizer: Normalizer::for_generation(generation),
                config,
                gateway,
                connection_state,
                state_tx,
                maps_tx,
                event_tx,
                cancel: CancellationToken::new(),
                link: Mutex::new(None),
                router: Mutex::new(Some(EventRouter::new(generation))),
                backbone: Mutex::new(None),
                task_handles: Mutex::new(Vec::new()),
            }),
        })
    }

    pub fn config(&self) -> &SessionConfig {
        &self.inner.config
    }

    pub fn generation(&self) -> DeviceGeneration {
        self.inner.config.device.generation
    }

    // ── Connection lifecycle ─────────────────────────────────────────

    /// Open the backbone and start the background tasks.
    ///
    /// Returns once the connection attempt is under way. The session
    /// becomes [`Connected`](ConnectionState::Connected) when the
    /// backbone signals `ready`; failures arrive as
    /// [`VacBotEvent::SessionError`]. Connecting again replaces the
    /// running session; device state carries over.
    pub async fn connect(&self) -> Result<(), CoreError> {
        self.teardown().await;

        let inner = &self.inner;
        inner.connection_state.send_replace(ConnectionState::Connecting);

        let config = &inner.config;
        let (host, port) = config.backbone_endpoint();
        let (transport_tx, transport_rx) = event_channel();
        // Per-connection token; `disconnect` cancels only this one.
        let cancel = inner.cancel.child_token();
        let session = cancel.child_token();

        let backbone = if config.device.uses_mqtt {
            match MqttSession::connect(
                &host,
                port,
                &config.identity,
                &config.device.address,
                &config.tls,
                transport_tx,
                session,
            )
            .await
            {
                Ok(mqtt) => Backbone::Mqtt(mqtt),
                Err(e) => {
                    inner.connection_state.send_replace(ConnectionState::Failed);
                    return Err(CoreError::ConnectionFailed {
                        endpoint: host,
                        reason: e.to_string(),
                    });
                }
            }
        } else {
            Backbone::Xmpp(XmppSession::connect(
                host.clone(),
                port,
                config.identity.clone(),
                config.tls.clone(),
                transport_tx,
                session,
            ))
        };

        let sink = match &backbone {
            Backbone::Mqtt(_) => CommandSink::Gateway,
            Backbone::Xmpp(xmpp) => CommandSink::Stream(xmpp.clone()),
        };
        *inner.backbone.lock().await = Some(backbone);

        self.start_tasks(transport_rx, sink, cancel).await;
        info!(
            device = %config.device.display_name(),
            host = %host,
            mqtt = config.device.uses_mqtt,
            "session started"
        );
        Ok(())
    }

    async fn start_tasks(
        &self,
        transport_rx: broadcast::Receiver<Arc<TransportEvent>>,
        sink: CommandSink,
        cancel: CancellationToken,
    ) {
        let inner = &self.inner;
        let (command_tx, command_rx) = mpsc::channel(COMMAND_CHANNEL_SIZE);
        let (router_tx, router_rx) = mpsc::channel(ROUTER_CHANNEL_SIZE);
        let link = SessionLink {
            cancel,
            command_tx,
            router_tx,
        };

        let mut handles = inner.task_handles.lock().await;
        handles.push(tokio::spawn(router_task(
            self.clone(),
            link.clone(),
            router_rx,
            transport_rx,
        )));

        if let CommandSink::Stream(xmpp) = &sink {
            handles.push(tokio::spawn(keepalive_task(
                xmpp.clone(),
                inner.config.device.address.clone(),
                inner.config.keepalive_interval,
                link.cancel.clone(),
            )));
        }

        handles.push(tokio::spawn(command_processor_task(
            self.clone(),
            link.clone(),
            command_rx,
            sink,
        )));
        *inner.link.lock().await = Some(link);
    }

    /// Close the backbone, stop keepalive and background tasks.
    ///
    /// Gateway calls already in flight finish on their own; their
    /// replies are discarded.
    pub async fn disconnect(&self) {
        self.teardown().await;
        self.inner
            .connection_state
            .send_replace(ConnectionState::Disconnected);
        debug!("disconnected");
    }

    async fn teardown(&self) {
        let link = self.inner.link.lock().await.take();
        let backbone = self.inner.backbone.lock().await.take();
        match backbone {
            Some(Backbone::Mqtt(mqtt)) => mqtt.close().await,
            Some(Backbone::Xmpp(xmpp)) => xmpp.close().await,
            None => {}
        }
        if let Some(link) = link {
            link.cancel.cancel();
        }

        let mut handles = self.inner.task_handles.lock().await;
        for handle in handles.drain(..) {
            let _ = handle.await;
        }
    }

    // ── Command execution ────────────────────────────────────────────

    /// Execute a command against the robot.
    ///
    /// MQTT devices: resolves once the gateway reply has been applied to
    /// device state. XMPP devices: resolves once the stanza is queued;
    /// the reply arrives later as a report.
    pub async fn execute(&self, command: Command) -> Result<CommandResult, CoreError> {
        if *self.inner.connection_state.borrow() != ConnectionState::Connected {
            return Err(CoreError::NotConnected);
        }

        let command_tx = self.link().await?.command_tx;
        let (tx, rx) = oneshot::channel();
        command_tx
            .send(CommandEnvelope {
                command,
                response_tx: tx,
            })
            .await
            .map_err(|_| CoreError::NotConnected)?;

        rx.await.map_err(|_| CoreError::NotConnected)?
    }

    /// Reset the boundary assembly for `map_id`, then request both
    /// boundary kinds. The listing is surfaced once, after both replies.
    pub async fn request_virtual_boundaries(
        &self,
        map_id: &str,
    ) -> Result<Vec<CommandResult>, CoreError> {
        self.link()
            .await?
            .router_tx
            .send(RouterInput::ResetBoundaries(map_id.to_owned()))
            .await
            .map_err(|_| CoreError::NotConnected)?;

        let mut results = Vec::with_capacity(BoundaryKind::ALL.len());
        for kind in BoundaryKind::ALL {
            results.push(
                self.execute(Command::GetVirtualBoundaries {
                    map_id: map_id.to_owned(),
                    kind,
                })
                .await?,
            );
        }
        Ok(results)
    }

    async fn link(&self) -> Result<SessionLink, CoreError> {
        self.inner
            .link
            .lock()
            .await
            .clone()
            .ok_or(CoreError::NotConnected)
    }

    /// Fire-and-forget a command from inside the session.
    fn queue(link: &SessionLink, command: Command) {
        let name = command.name();
        let (tx, _rx) = oneshot::channel();
        if let Err(e) = link.command_tx.try_send(CommandEnvelope {
            command,
            response_tx: tx,
        }) {
            warn!(command = name, error = %e, "could not queue command");
        }
    }

    // ── State observation ────────────────────────────────────────────

    pub fn connection_state(&self) -> watch::Receiver<ConnectionState> {
        self.inner.connection_state.subscribe()
    }

    /// Subscribe to named public events.
    pub fn events(&self) -> broadcast::Receiver<Arc<VacBotEvent>> {
        self.inner.event_tx.subscribe()
    }

    pub fn state(&self) -> Arc<DeviceState> {
        self.inner.state_tx.borrow().clone()
    }

    pub fn maps(&self) -> Arc<MapSnapshot> {
        self.inner.maps_tx.borrow().clone()
    }

    pub fn state_stream(&self) -> StateStream<DeviceState> {
        StateStream::new(self.inner.state_tx.subscribe())
    }

    pub fn map_stream(&self) -> StateStream<MapSnapshot> {
        StateStream::new(self.inner.maps_tx.subscribe())
    }

    // ── Router side ──────────────────────────────────────────────────

    fn emit(&self, event: VacBotEvent) {
        // No subscribers is fine.
        let _ = self.inner.event_tx.send(Arc::new(event));
    }

    fn publish(&self, link: &SessionLink, router: &EventRouter, outcome: RouteOutcome) {
        if !outcome.events.is_empty() {
            let (state, maps) = router.snapshots();
            self.inner.state_tx.send_replace(state);
            self.inner.maps_tx.send_replace(maps);
        }
        for event in outcome.events {
            self.emit(event);
        }
        if let Some(command) = outcome.follow_up {
            Self::queue(link, command);
        }
    }

    fn on_transport_event(
        &self,
        link: &SessionLink,
        router: &mut EventRouter,
        event: &TransportEvent,
    ) {
        match event {
            TransportEvent::Ready => {
                self.inner.connection_state.send_replace(ConnectionState::Connected);
                info!("session ready");
                self.emit(VacBotEvent::Ready);
                for command in initial_queries() {
                    Self::queue(link, command);
                }
            }
            TransportEvent::Message { topic, payload } => {
                let context = topic.as_deref().map_or(Context::Stanza, Context::Topic);
                match self.inner.normalizer.normalize(payload, context) {
                    Ok(decoded) => {
                        let outcome = router.route_decoded(decoded);
                        self.publish(link, router, outcome);
                    }
                    Err(e) => warn!(error = %e, "dropping undecodable payload"),
                }
            }
            TransportEvent::Error(message) => {
                error!(error = %message, "backbone error");
                if *self.inner.connection_state.borrow() == ConnectionState::Connecting {
                    self.inner.connection_state.send_replace(ConnectionState::Failed);
                }
                self.emit(VacBotEvent::SessionError(message.clone()));
            }
            TransportEvent::Closed => {
                info!("backbone closed");
                let _ = self.inner.connection_state.send_if_modified(|state| {
                    if *state == ConnectionState::Connected {
                        *state = ConnectionState::Disconnected;
                        true
                    } else {
                        false
                    }
                });
                self.emit(VacBotEvent::Closed);
            }
        }
    }

    fn on_router_input(&self, link: &SessionLink, router: &mut EventRouter, input: RouterInput) {
        match input {
            RouterInput::ResetBoundaries(map_id) => router.reset_boundaries(&map_id),
            RouterInput::Response {
                command,
                document,
                reply,
            } => {
                if link.cancel.is_cancelled() {
                    debug!(command = %command, "session closed, discarding reply");
                    let _ = reply.send(Err(CoreError::NotConnected));
                    return;
                }
                let result = match self.inner.normalizer.normalize_response(&document, &command) {
                    Ok(Decoded::Rejected { code, message }) => Err(CoreError::Gateway {
                        message,
                        errno: code,
                    }),
                    Ok(decoded) => {
                        let outcome = router.route_decoded(decoded);
                        let events = outcome.events.clone();
                        self.publish(link, router, outcome);
                        Ok(CommandResult::Applied(events))
                    }
                    Err(e) => Err(e),
                };
                let _ = reply.send(result);
            }
        }
    }

    // ── Command side ─────────────────────────────────────────────────

    async fn dispatch(&self, link: &SessionLink, envelope: CommandEnvelope, sink: &CommandSink) {
        let CommandEnvelope {
            command,
            response_tx,
        } = envelope;

        let encoded = match encode(&command, self.generation()) {
            Ok(encoded) => encoded,
            Err(e) => {
                debug!(command = command.name(), error = %e, "command not sent");
                let _ = response_tx.send(Err(e));
                return;
            }
        };
        debug!(command = %encoded.name, "dispatching");
        let address = &self.inner.config.device.address;

        match sink {
            CommandSink::Stream(xmpp) => {
                let result = match &encoded.payload {
                    Payload::Markup(ctl) => xmpp
                        .send_command(address, ctl)
                        .await
                        .map(|()| CommandResult::Sent)
                        .map_err(CoreError::from),
                    Payload::Json(_) => Err(CoreError::Unsupported {
                        operation: format!("{} over the stanza stream", encoded.name),
                    }),
                };
                let _ = response_tx.send(result);
            }
            CommandSink::Gateway => {
                let request = GatewayRequest::new(encoded.name, encoded.payload, address.clone());
                let gateway = self.inner.gateway.clone();
                let router_tx = link.router_tx.clone();
                let endpoint = encoded.endpoint;
                // Gateway calls run independently; no ordering across them.
                tokio::spawn(async move {
                    let document = match gateway.send(endpoint, &request).await {
                        Ok(document) => document,
                        Err(e) => {
                            warn!(command = %request.cmd_name, error = %e, "gateway call failed");
                            let _ = response_tx.send(Err(e.into()));
                            return;
                        }
                    };
                    let input = RouterInput::Response {
                        command: request.cmd_name,
                        document,
                        reply: response_tx,
                    };
                    if router_tx.send(input).await.is_err() {
                        debug!("router gone, reply dropped");
                    }
                });
            }
        }
    }
}

/// Queries issued as soon as the session is ready.
fn initial_queries() -> Vec<Command> {
    let mut commands = vec![
        Command::GetBatteryState,
        Command::GetCleanState,
        Command::GetChargeState,
    ];
    commands.extend(Component::ALL.into_iter().map(Command::GetLifeSpan));
    commands.push(Command::GetWaterInfo);
    commands
}

// ── Background tasks ─────────────────────────────────────────────────

/// Single writer of device state: applies backbone deliveries and
/// gateway replies in arrival order.
async fn router_task(
    bot: VacBot,
    link: SessionLink,
    mut input: mpsc::Receiver<RouterInput>,
    mut transport: broadcast::Receiver<Arc<TransportEvent>>,
) {
    let mut router = bot
        .inner
        .router
        .lock()
        .await
        .take()
        .unwrap_or_else(|| EventRouter::new(bot.generation()));

    loop {
        tokio::select! {
            biased;
            () = link.cancel.cancelled() => break,
            msg = input.recv() => {
                let Some(msg) = msg else { break };
                bot.on_router_input(&link, &mut router, msg);
            }
            event = transport.recv() => match event {
                Ok(event) => bot.on_transport_event(&link, &mut router, &event),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(skipped, "router lagged behind the backbone");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            },
        }
    }

    *bot.inner.router.lock().await = Some(router);
}

/// Process commands from the mpsc channel in arrival order.
async fn command_processor_task(
    bot: VacBot,
    link: SessionLink,
    mut rx: mpsc::Receiver<CommandEnvelope>,
    sink: CommandSink,
) {
    loop {
        tokio::select! {
            biased;
            () = link.cancel.cancelled() => break,
            envelope = rx.recv() => {
                let Some(envelope) = envelope else { break };
                bot.dispatch(&link, envelope, &sink).await;
            }
        }
    }
}

/// Periodic liveness ping on the stanza stream. MQTT needs none; the
/// broker connection carries its own keepalive.
async fn keepalive_task(
    xmpp: XmppSession,
    to: DeviceAddress,
    period: Duration,
    cancel: CancellationToken,
) {
    let mut interval = tokio::time::interval(period);
    interval.tick().await; // consume the immediate first tick

    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            _ = interval.tick() => {
                if let Err(e) = xmpp.ping(&to).await {
                    warn!(error = %e, "keepalive ping failed");
                }
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use pretty_assertions::assert_eq;
    use secrecy::SecretString;
    use serde_json::json;
    use url::Url;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use deebot_api::{AccountIdentity, Continent};

    use super::*;
    use crate::config::DeviceDescriptor;
    use crate::model::ChargeStatus;

    fn config(server: &MockServer, generation: DeviceGeneration) -> SessionConfig {
        let mut config = SessionConfig::new(
            AccountIdentity::new("user1", SecretString::from("secret"), "res1"),
            DeviceDescriptor::new(DeviceAddress::new("did-9", "yna5xi", "botres"), true, generation),
            Continent::new("EU"),
            "de",
        );
        config.portal_base = Some(Url::parse(&format!("{}/api/", server.uri())).unwrap());
        config
    }

    /// Run `connect`'s session setup against a hand-driven transport
    /// channel, then signal `ready`.
    async fn attach(bot: &VacBot) -> deebot_api::session::EventSender {
        bot.teardown().await;
        let (tx, rx) = event_channel();
        bot.start_tasks(rx, CommandSink::Gateway, bot.inner.cancel.child_token())
            .await;
        tx.send(Arc::new(TransportEvent::Ready)).unwrap();
        bot.connection_state()
            .wait_for(|s| *s == ConnectionState::Connected)
            .await
            .unwrap();
        tx
    }

    async fn ready_bot(config: SessionConfig) -> (VacBot, deebot_api::session::EventSender) {
        let bot = VacBot::new(config).unwrap();
        let tx = attach(&bot).await;
        (bot, tx)
    }

    fn json_reply(data: serde_json::Value) -> ResponseTemplate {
        ResponseTemplate::new(200).set_body_json(json!({
            "ret": "ok",
            "resp": {"header": {}, "body": {"code": 0, "msg": "ok", "data": data}}
        }))
    }

    #[tokio::test]
    async fn execute_before_ready_is_rejected() {
        let server = MockServer::start().await;
        let bot = VacBot::new(config(&server, DeviceGeneration::Json)).unwrap();
        let err = bot.execute(Command::GetBatteryState).await.unwrap_err();
        assert!(matches!(err, CoreError::NotConnected));
    }

    #[tokio::test]
    async fn gateway_reply_updates_state() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/iot/devmanager.do"))
            .and(body_partial_json(json!({"cmdName": "getBattery"})))
            .respond_with(json_reply(json!({"value": 42, "isLow": 0})))
            .mount(&server)
            .await;

        let (bot, _tx) = ready_bot(config(&server, DeviceGeneration::Json)).await;
        let result = bot.execute(Command::GetBatteryState).await.unwrap();

        match result {
            CommandResult::Applied(events) => {
                assert_eq!(events, vec![VacBotEvent::BatteryInfo(0.42)]);
            }
            CommandResult::Sent => panic!("gateway commands are applied"),
        }
        assert_eq!(bot.state().battery_percent(), Some(42));
        bot.disconnect().await;
    }

    #[tokio::test]
    async fn failed_charge_reply_means_docked() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(body_partial_json(json!({"cmdName": "charge"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "ret": "ok",
                "resp": {"header": {}, "body": {"code": 30007, "msg": "fail"}}
            })))
            .mount(&server)
            .await;

        let (bot, _tx) = ready_bot(config(&server, DeviceGeneration::Json)).await;
        bot.execute(Command::Charge).await.unwrap();
        assert_eq!(bot.state().charge_status, Some(ChargeStatus::Charging));
        bot.disconnect().await;
    }

    #[tokio::test]
    async fn rejected_reply_is_a_gateway_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(body_partial_json(json!({"cmdName": "getMapSet"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "ret": "ok",
                "resp": {"header": {}, "body": {"code": 20011, "msg": "map unsupported"}}
            })))
            .mount(&server)
            .await;

        let (bot, _tx) = ready_bot(config(&server, DeviceGeneration::Json)).await;
        let err = bot
            .execute(Command::GetSpotAreas {
                map_id: "1".into(),
            })
            .await
            .unwrap_err();
        match err {
            CoreError::Gateway { message, errno } => {
                assert_eq!(message, "map unsupported");
                assert_eq!(errno.as_deref(), Some("20011"));
            }
            other => panic!("expected a gateway error, got {other:?}"),
        }
        bot.disconnect().await;
    }

    #[tokio::test]
    async fn unencodable_command_is_not_sent() {
        let server = MockServer::start().await;
        let (bot, _tx) = ready_bot(config(&server, DeviceGeneration::Legacy)).await;
        let err = bot.execute(Command::SetVolume(3)).await.unwrap_err();
        assert!(matches!(err, CoreError::Encoding { .. }));
        bot.disconnect().await;
    }

    #[tokio::test]
    async fn pushed_report_reaches_subscribers() {
        let server = MockServer::start().await;
        let (bot, tx) = ready_bot(config(&server, DeviceGeneration::Json)).await;
        let mut events = bot.events();
        let mut states = bot.state_stream();

        tx.send(Arc::new(TransportEvent::Message {
            topic: Some("iot/atr/onBattery/did-9/yna5xi/botres/j".into()),
            payload: json!({"header": {}, "body": {"data": {"value": 77}}}).to_string(),
        }))
        .unwrap();

        let event = events.recv().await.unwrap();
        assert_eq!(event.name(), "BatteryInfo");
        let state = states.changed().await.unwrap();
        assert_eq!(state.battery_percent(), Some(77));
        bot.disconnect().await;
    }

    #[tokio::test]
    async fn backbone_error_is_surfaced() {
        let server = MockServer::start().await;
        let (bot, tx) = ready_bot(config(&server, DeviceGeneration::Json)).await;
        let mut events = bot.events();

        tx.send(Arc::new(TransportEvent::Error("subscription rejected".into())))
            .unwrap();
        let event = events.recv().await.unwrap();
        assert_eq!(*event, VacBotEvent::SessionError("subscription rejected".into()));
        assert_eq!(event.name(), "error");
        bot.disconnect().await;
    }

    #[tokio::test]
    async fn reconnect_starts_a_fresh_session() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(body_partial_json(json!({"cmdName": "getBattery"})))
            .respond_with(json_reply(json!({"value": 42})))
            .mount(&server)
            .await;

        let (bot, _tx) = ready_bot(config(&server, DeviceGeneration::Json)).await;
        bot.execute(Command::GetBatteryState).await.unwrap();

        bot.disconnect().await;
        assert_eq!(*bot.connection_state().borrow(), ConnectionState::Disconnected);
        let err = bot.execute(Command::GetBatteryState).await.unwrap_err();
        assert!(matches!(err, CoreError::NotConnected));

        let tx = attach(&bot).await;
        assert_eq!(bot.state().battery_percent(), Some(42));
        bot.execute(Command::GetBatteryState).await.unwrap();

        // the new session still routes pushed reports
        let mut states = bot.state_stream();
        tx.send(Arc::new(TransportEvent::Message {
            topic: Some("iot/atr/onBattery/did-9/yna5xi/botres/j".into()),
            payload: json!({"header": {}, "body": {"data": {"value": 55}}}).to_string(),
        }))
        .unwrap();
        // the ready burst may land first
        while states.changed().await.unwrap().battery_percent() != Some(55) {}
        bot.disconnect().await;
    }

    #[tokio::test]
    async fn second_connect_replaces_the_first() {
        let server = MockServer::start().await;
        let (bot, old_tx) = ready_bot(config(&server, DeviceGeneration::Json)).await;
        let new_tx = attach(&bot).await;

        // the first session's router is gone
        assert_eq!(old_tx.receiver_count(), 0);

        let mut states = bot.state_stream();
        new_tx
            .send(Arc::new(TransportEvent::Message {
                topic: Some("iot/atr/onBattery/did-9/yna5xi/botres/j".into()),
                payload: json!({"header": {}, "body": {"data": {"value": 30}}}).to_string(),
            }))
            .unwrap();
        assert_eq!(states.changed().await.unwrap().battery_percent(), Some(30));
        bot.disconnect().await;
    }

    #[test]
    fn ready_burst_covers_the_basics() {
        let names: Vec<&str> = initial_queries().iter().map(Command::name).collect();
        assert_eq!(
            names,
            vec![
                "GetBatteryState",
                "GetCleanState",
                "GetChargeState",
                "GetLifeSpan",
                "GetLifeSpan",
                "GetLifeSpan",
                "GetWaterInfo"
            ]
        );
    }
}
