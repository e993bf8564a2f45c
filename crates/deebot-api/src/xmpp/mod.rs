//! XMPP backbone session for legacy devices.
//!
//! Legacy robots are reached over a long-lived XMPP stream to the
//! continent's message server. Commands are `<iq type="set">` stanzas
//! carrying a `<query xmlns="com:ctl">` with the command's `<ctl>`
//! element; the robot answers and reports over the same stream.
//!
//! Negotiation follows the usual client sequence: stream open, STARTTLS
//! when offered, SASL PLAIN, stream restart, resource bind, session.
//! The server ends up being the only party that times us out, so the
//! session controller drives a periodic [`XmppSession::ping`].

mod framing;

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use rustls_pki_types::ServerName;
use secrecy::ExposeSecret;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt, ReadHalf, WriteHalf};
use tokio::net::TcpStream;
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinHandle;
use tokio_rustls::TlsConnector;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::address::{AccountIdentity, DeviceAddress, XMPP_PORT};
use crate::error::Error;
use crate::markup::{Element, escape};
use crate::session::{EventSender, TransportEvent, emit};
use crate::tls;
use crate::transport::TlsMode;

use framing::{Frame, FrameReader, root_name};

const OUTBOUND_CHANNEL_CAPACITY: usize = 64;
const CLOSE_GRACE: Duration = Duration::from_secs(2);

const NS_TLS: &str = "urn:ietf:params:xml:ns:xmpp-tls";
const NS_SASL: &str = "urn:ietf:params:xml:ns:xmpp-sasl";
const NS_BIND: &str = "urn:ietf:params:xml:ns:xmpp-bind";
const NS_SESSION: &str = "urn:ietf:params:xml:ns:xmpp-session";
const NS_PING: &str = "urn:xmpp:ping";
const NS_CTL: &str = "com:ctl";

trait Io: AsyncRead + AsyncWrite + Unpin + Send {}
impl<T: AsyncRead + AsyncWrite + Unpin + Send> Io for T {}

type BoxedIo = Box<dyn Io>;

// ── XmppSession ──────────────────────────────────────────────────────

/// Handle to a running XMPP stream.
///
/// Cheap to clone; every clone pushes onto the same outbound queue, so
/// commands leave in the order they were sent.
#[derive(Clone)]
pub struct XmppSession {
    outbound: mpsc::Sender<String>,
    own_jid: String,
    next_id: Arc<AtomicU64>,
    cancel: CancellationToken,
    task: Arc<Mutex<Option<JoinHandle<()>>>>,
}

impl XmppSession {
    /// Spawn the stream task. Negotiation happens in the background;
    /// `Ready` or `Error` is reported through `event_tx`.
    pub fn connect(
        host: String,
        port: Option<u16>,
        identity: AccountIdentity,
        tls: TlsMode,
        event_tx: EventSender,
        cancel: CancellationToken,
    ) -> Self {
        let (outbound, outbound_rx) = mpsc::channel(OUTBOUND_CHANNEL_CAPACITY);
        let own_jid = identity.full_jid();

        let task_cancel = cancel.clone();
        let task = tokio::spawn(async move {
            let endpoint = (host, port.unwrap_or(XMPP_PORT));
            stream_task(endpoint, identity, tls, outbound_rx, event_tx, task_cancel).await;
        });

        Self {
            outbound,
            own_jid,
            next_id: Arc::new(AtomicU64::new(1)),
            cancel,
            task: Arc::new(Mutex::new(Some(task))),
        }
    }

    fn next_id(&self) -> String {
        format!("{}", self.next_id.fetch_add(1, Ordering::Relaxed))
    }

    /// Push a command's `<ctl>` element to the robot.
    pub async fn send_command(&self, to: &DeviceAddress, ctl: &Element) -> Result<(), Error> {
        let stanza = command_stanza(&self.next_id(), &to.jid(), &self.own_jid, ctl)?;
        self.push(stanza).await
    }

    /// Liveness ping addressed to the robot.
    pub async fn ping(&self, to: &DeviceAddress) -> Result<(), Error> {
        let stanza = format!(
            "<iq type=\"get\" id=\"{}\" to=\"{}\" from=\"{}\"><ping xmlns=\"{NS_PING}\"/></iq>",
            self.next_id(),
            escape(&to.jid()),
            escape(&self.own_jid),
        );
        self.push(stanza).await
    }

    async fn push(&self, stanza: String) -> Result<(), Error> {
        debug!(stanza = %stanza, "XMPP send");
        self.outbound.send(stanza).await.map_err(|_| Error::StreamClosed)
    }

    /// Close the stream and wait briefly for the task to exit.
    pub async fn close(&self) {
        self.cancel.cancel();
        if let Some(task) = self.task.lock().await.take() {
            if tokio::time::timeout(CLOSE_GRACE, task).await.is_err() {
                debug!("XMPP task did not exit in time");
            }
        }
    }
}

fn command_stanza(id: &str, to: &str, from: &str, ctl: &Element) -> Result<String, Error> {
    Ok(format!(
        "<iq type=\"set\" id=\"{id}\" to=\"{}\" from=\"{}\"><query xmlns=\"{NS_CTL}\">{}</query></iq>",
        escape(to),
        escape(from),
        ctl.to_xml()?,
    ))
}

// ── Stream task ──────────────────────────────────────────────────────

async fn stream_task(
    (host, port): (String, u16),
    identity: AccountIdentity,
    tls: TlsMode,
    outbound_rx: mpsc::Receiver<String>,
    event_tx: EventSender,
    cancel: CancellationToken,
) {
    info!(host = %host, port, "connecting to XMPP server");

    let negotiated = tokio::select! {
        biased;
        () = cancel.cancelled() => None,
        result = negotiate(&host, port, &identity, &tls) => Some(result),
    };

    match negotiated {
        None => {}
        Some(Err(e)) => {
            warn!(error = %e, "XMPP negotiation failed");
            emit(&event_tx, TransportEvent::Error(e.to_string()));
        }
        Some(Ok(reader)) => {
            info!(jid = %identity.full_jid(), "XMPP session established");
            emit(&event_tx, TransportEvent::Ready);
            if let Err(e) = run(reader, outbound_rx, &event_tx, &cancel).await {
                warn!(error = %e, "XMPP stream error");
                emit(&event_tx, TransportEvent::Error(e.to_string()));
            }
        }
    }

    emit(&event_tx, TransportEvent::Closed);
    debug!("XMPP task exiting");
}

async fn run(
    reader: FrameReader<BoxedIo>,
    mut outbound_rx: mpsc::Receiver<String>,
    event_tx: &EventSender,
    cancel: &CancellationToken,
) -> Result<(), Error> {
    let (io, buffered) = reader.into_parts();
    let (read_half, mut write_half): (ReadHalf<BoxedIo>, WriteHalf<BoxedIo>) = tokio::io::split(io);
    let mut reader = FrameReader::with_buffer(read_half, buffered);

    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => {
                let _ = write_half.write_all(b"</stream:stream>").await;
                let _ = write_half.shutdown().await;
                return Ok(());
            }
            out = outbound_rx.recv() => {
                let Some(stanza) = out else { return Ok(()) };
                write_half.write_all(stanza.as_bytes()).await?;
                write_half.flush().await?;
            }
            frame = reader.next() => match frame? {
                Frame::Stanza(stanza) => {
                    if let Some(reply) = dispatch(stanza, event_tx) {
                        write_half.write_all(reply.as_bytes()).await?;
                        write_half.flush().await?;
                    }
                }
                Frame::StreamClose => return Err(Error::StreamClosed),
                Frame::StreamOpen | Frame::Skip => {}
            }
        }
    }
}

/// Forward device traffic; answer server pings. Returns a reply stanza
/// when one is owed.
fn dispatch(stanza: String, event_tx: &EventSender) -> Option<String> {
    if stanza.contains(NS_CTL) {
        emit(
            event_tx,
            TransportEvent::Message {
                topic: None,
                payload: stanza,
            },
        );
        return None;
    }

    if root_name(&stanza) == "iq" && stanza.contains(NS_PING) {
        let parsed = Element::parse(&stanza).ok()?;
        if parsed.attr("type") == Some("get") {
            let id = parsed.attr("id").unwrap_or_default();
            let to = parsed.attr("from").unwrap_or_default();
            return Some(format!(
                "<iq type=\"result\" id=\"{}\" to=\"{}\"/>",
                escape(id),
                escape(to)
            ));
        }
    }

    debug!(stanza = %stanza, "ignoring non-device stanza");
    None
}

// ── Negotiation ──────────────────────────────────────────────────────

async fn negotiate(
    host: &str,
    port: u16,
    identity: &AccountIdentity,
    tls: &TlsMode,
) -> Result<FrameReader<BoxedIo>, Error> {
    let tcp = TcpStream::connect((host, port)).await?;
    let mut reader: FrameReader<BoxedIo> = FrameReader::new(Box::new(tcp));

    let mut features = open_stream(&mut reader, &identity.realm).await?;

    if features.contains(NS_TLS) {
        write(&mut reader, &format!("<starttls xmlns=\"{NS_TLS}\"/>")).await?;
        let reply = next_stanza(&mut reader).await?;
        if root_name(&reply) != "proceed" {
            return Err(Error::StreamNegotiation(format!("STARTTLS refused: {reply}")));
        }
        if reader.has_buffered() {
            return Err(Error::StreamNegotiation("data received before TLS upgrade".into()));
        }

        let (io, _) = reader.into_parts();
        let server_name = ServerName::try_from(host.to_owned()).map_err(|e| Error::Tls(e.to_string()))?;
        let stream = TlsConnector::from(tls::stream::client_config(tls)?)
            .connect(server_name, io)
            .await
            .map_err(|e| Error::Tls(e.to_string()))?;
        reader = FrameReader::new(Box::new(stream));
        features = open_stream(&mut reader, &identity.realm).await?;
    }

    if !features.contains("PLAIN") {
        return Err(Error::StreamNegotiation("server does not offer SASL PLAIN".into()));
    }
    write(&mut reader, &auth_stanza(identity)).await?;
    let reply = next_stanza(&mut reader).await?;
    match root_name(&reply) {
        "success" => debug!("SASL authentication accepted"),
        "failure" => return Err(Error::Authentication { message: reply }),
        other => return Err(Error::StreamNegotiation(format!("unexpected SASL reply <{other}>"))),
    }

    open_stream(&mut reader, &identity.realm).await?;

    write(
        &mut reader,
        &format!(
            "<iq type=\"set\" id=\"bind_1\"><bind xmlns=\"{NS_BIND}\"><resource>{}</resource></bind></iq>",
            escape(&identity.resource)
        ),
    )
    .await?;
    let reply = Element::parse(&next_stanza(&mut reader).await?)?;
    if reply.attr("type") != Some("result") {
        return Err(Error::StreamNegotiation("resource bind rejected".into()));
    }

    write(
        &mut reader,
        &format!("<iq type=\"set\" id=\"sess_1\"><session xmlns=\"{NS_SESSION}\"/></iq>"),
    )
    .await?;
    let reply = Element::parse(&next_stanza(&mut reader).await?)?;
    if reply.attr("type") != Some("result") {
        warn!("session establishment not acknowledged, continuing");
    }

    write(&mut reader, "<presence type=\"available\"/>").await?;
    Ok(reader)
}

/// Send a stream header and wait for the server's feature list.
async fn open_stream(reader: &mut FrameReader<BoxedIo>, realm: &str) -> Result<String, Error> {
    write(
        reader,
        &format!(
            "<?xml version=\"1.0\"?><stream:stream to=\"{}\" xmlns=\"jabber:client\" \
             xmlns:stream=\"http://etherx.jabber.org/streams\" version=\"1.0\">",
            escape(realm)
        ),
    )
    .await?;

    loop {
        match reader.next().await? {
            Frame::Stanza(stanza) if root_name(&stanza) == "stream:features" => return Ok(stanza),
            Frame::Stanza(stanza) => debug!(stanza = %stanza, "skipping stanza before features"),
            Frame::StreamClose => return Err(Error::StreamClosed),
            Frame::StreamOpen | Frame::Skip => {}
        }
    }
}

async fn next_stanza(reader: &mut FrameReader<BoxedIo>) -> Result<String, Error> {
    loop {
        match reader.next().await? {
            Frame::Stanza(stanza) => return Ok(stanza),
            Frame::StreamClose => return Err(Error::StreamClosed),
            Frame::StreamOpen | Frame::Skip => {}
        }
    }
}

async fn write(reader: &mut FrameReader<BoxedIo>, text: &str) -> Result<(), Error> {
    let io = reader.get_mut();
    io.write_all(text.as_bytes()).await?;
    io.flush().await?;
    Ok(())
}

/// SASL PLAIN with the app's password form, `0/{resource}/{token}`.
fn auth_stanza(identity: &AccountIdentity) -> String {
    let credentials = format!(
        "\0{}\00/{}/{}",
        identity.user_id,
        identity.resource,
        identity.token.expose_secret()
    );
    format!(
        "<auth xmlns=\"{NS_SASL}\" mechanism=\"PLAIN\">{}</auth>",
        BASE64.encode(credentials.as_bytes())
    )
}
