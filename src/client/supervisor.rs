//! The connection supervisor: dial, hand off to [`crate::state::HandshakeMachine`]
//! for registration, then run the four long-lived loops described in §4.3/§5
//! (read, dispatch, send, ping) until cancelled, reconnecting with backoff
//! on disconnect.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::net::lookup_host;
use tokio::sync::{mpsc, oneshot, watch};
use tokio_util::codec::Framed;

use crate::codec::IrcCodec;
use crate::command::Cmd;
use crate::error::{Error, Result};
use crate::handler::ctcp::CtcpRegistry;
use crate::handler::Registry;
use crate::message::Message;
use crate::state::{HandshakeAction, HandshakeConfig, HandshakeError, HandshakeMachine};
use crate::transport::Transport;

use super::ratelimit::RateLimiter;
use super::Shared;

/// How long to wait for the next handshake reply before giving up.
const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(30);
/// Read inactivity deadline per §5's timeout table.
const READ_TIMEOUT: Duration = Duration::from_secs(300);
/// Ping round-trip tolerance added on top of the configured ping delay.
const PONG_GRACE: Duration = Duration::from_secs(60);
/// Warm-up delay before the first keepalive ping is sent.
const PING_WARMUP: Duration = Duration::from_secs(20);

/// Where to dial next: the configured server, or an STS-directed override.
struct DialTarget {
    ssl: bool,
    port: u16,
}

/// Drives reconnect policy around repeated [`run_session`] attempts until
/// cancelled. `ready` is signalled exactly once, with the outcome of the
/// very first connection attempt.
pub(crate) async fn run(
    shared: Arc<Shared>,
    registry: Arc<tokio::sync::Mutex<Registry>>,
    ctcp: Arc<Mutex<CtcpRegistry>>,
    mut cancel_rx: watch::Receiver<bool>,
    quitting: Arc<AtomicBool>,
    ready: oneshot::Sender<Result<()>>,
) {
    let mut ready = Some(ready);
    let mut attempt: u32 = 0;
    let mut target = DialTarget {
        ssl: shared.config.ssl,
        port: shared.config.port,
    };

    loop {
        if *cancel_rx.borrow() {
            break;
        }

        match run_session(&shared, &registry, &ctcp, &mut cancel_rx, &mut ready, &target).await {
            Ok(Outcome::Disconnected) => {}
            Ok(Outcome::StsUpgrade { port }) => {
                target = DialTarget { ssl: true, port };
                continue;
            }
            Err(e) => {
                if let Some(tx) = ready.take() {
                    let _ = tx.send(Err(e));
                    return;
                }
                shared.report_error(e);
            }
        }

        let _ = shared.connected.send(false);
        if *cancel_rx.borrow() {
            break;
        }

        let skip_sleep_once = quitting.swap(false, Ordering::SeqCst);
        if !skip_sleep_once {
            let delay = shared.config.effective_reconnect_delay();
            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = cancel_rx.changed() => break,
            }
        }

        attempt += 1;
        if let Some(max) = shared.config.retries {
            if attempt > max {
                shared.report_error(Error::ConnectionClosed);
                break;
            }
        }
    }
}

enum Outcome {
    Disconnected,
    StsUpgrade { port: u16 },
}

async fn dial(shared: &Shared, target: &DialTarget) -> Result<Transport> {
    let mut addrs = lookup_host((shared.config.server.as_str(), target.port))
        .await
        .map_err(Error::Io)?;
    let addr = addrs.next().ok_or(Error::ConnectionClosed)?;

    if target.ssl {
        #[cfg(feature = "tls")]
        {
            Transport::connect_tls(addr, shared.config.bind, shared.config.verify_name())
                .await
                .map_err(Error::Io)
        }
        #[cfg(not(feature = "tls"))]
        {
            Err(Error::NotTls)
        }
    } else {
        Transport::connect_tcp(addr, shared.config.bind)
            .await
            .map_err(Error::Io)
    }
}

fn handshake_config(shared: &Shared) -> HandshakeConfig {
    let nick = shared.desired_nick.lock().unwrap().clone();
    HandshakeConfig {
        nickname: nick,
        username: shared.config.user.clone(),
        realname: shared.config.name.clone(),
        password: shared.config.server_pass.clone(),
        request_caps: shared.config.supported_caps.clone(),
        sasl_credentials: shared.config.sasl.clone(),
        allow_sts_fallback: !shared.config.disable_sts_fallback,
    }
}

async fn run_session(
    shared: &Arc<Shared>,
    registry: &Arc<tokio::sync::Mutex<Registry>>,
    ctcp: &Arc<Mutex<CtcpRegistry>>,
    cancel_rx: &mut watch::Receiver<bool>,
    ready: &mut Option<oneshot::Sender<Result<()>>>,
    target: &DialTarget,
) -> Result<Outcome> {
    let transport = dial(shared, target).await?;
    let framed = Framed::new(transport, IrcCodec::new());
    let (mut sink, mut stream) = framed.split();

    let mut machine = HandshakeMachine::new(handshake_config(shared));
    for action in machine.start() {
        if let HandshakeAction::Send(msg) = action {
            sink.send(*msg).await?;
        }
    }

    loop {
        let frame = tokio::time::timeout(HANDSHAKE_TIMEOUT, stream.next())
            .await
            .map_err(|_| Error::TimedOut)?
            .ok_or(Error::ConnectionClosed)??;

        let mut complete = false;
        for action in machine.feed(&frame) {
            match action {
                HandshakeAction::Send(msg) => sink.send(*msg).await?,
                HandshakeAction::Complete => complete = true,
                HandshakeAction::UpgradeToTls { port } => {
                    *shared.caps.write().unwrap() = machine.caps().clone();
                    return Ok(Outcome::StsUpgrade { port });
                }
                HandshakeAction::Error(HandshakeError::NicknameInUse(nick)) => {
                    let replacement = collide(shared, &nick);
                    if !replacement.is_empty() {
                        shared.set_desired_nick(replacement.clone());
                        sink.send(*Box::new(Cmd::nick(&replacement)?)).await?;
                    }
                }
                HandshakeAction::Error(other) => {
                    *shared.caps.write().unwrap() = machine.caps().clone();
                    let err = Error::ServerError(other.to_string());
                    if let Some(tx) = ready.take() {
                        let _ = tx.send(Err(err));
                        return Ok(Outcome::Disconnected);
                    }
                    return Err(Error::ServerError(other.to_string()));
                }
            }
        }
        *shared.caps.write().unwrap() = machine.caps().clone();
        if complete {
            break;
        }
    }

    shared.connected_at.lock().unwrap().replace(std::time::Instant::now());
    shared.record_pong();
    let _ = shared.connected.send(true);
    if let Some(tx) = ready.take() {
        let _ = tx.send(Ok(()));
    }

    let (tx_out, rx_out) = mpsc::unbounded_channel::<Message>();
    *shared.tx.lock().unwrap() = Some(tx_out);
    let (tx_in, rx_in) = mpsc::unbounded_channel::<Message>();

    let machine = Arc::new(Mutex::new(machine));
    let sts_signal: Arc<Mutex<Option<u16>>> = Arc::new(Mutex::new(None));

    let read_handle = tokio::spawn(read_loop(stream, tx_in, cancel_rx.clone()));
    let dispatch_handle = tokio::spawn(dispatch_loop(
        rx_in,
        registry.clone(),
        ctcp.clone(),
        machine.clone(),
        sts_signal.clone(),
        shared.clone(),
        cancel_rx.clone(),
    ));
    let ping_handle = tokio::spawn(ping_loop(shared.clone(), cancel_rx.clone()));
    send_loop(rx_out, sink, shared.config.allow_flood, cancel_rx.clone()).await;

    let _ = read_handle.await;
    let _ = dispatch_handle.await;
    let _ = ping_handle.await;
    *shared.tx.lock().unwrap() = None;

    if let Some(port) = sts_signal.lock().unwrap().take() {
        return Ok(Outcome::StsUpgrade { port });
    }
    Ok(Outcome::Disconnected)
}

fn collide(shared: &Shared, attempted: &str) -> String {
    match &shared.config.handle_nick_collide {
        Some(cb) => cb(attempted),
        None => format!("{attempted}_"),
    }
}

type Stream = futures_util::stream::SplitStream<Framed<Transport, IrcCodec>>;
type Sink = futures_util::stream::SplitSink<Framed<Transport, IrcCodec>, Message>;

async fn read_loop(mut stream: Stream, tx: mpsc::UnboundedSender<Message>, mut cancel_rx: watch::Receiver<bool>) {
    loop {
        tokio::select! {
            _ = cancel_rx.changed() => break,
            frame = tokio::time::timeout(READ_TIMEOUT, stream.next()) => {
                match frame {
                    Ok(Some(Ok(msg))) => {
                        if tx.send(msg).is_err() {
                            break;
                        }
                    }
                    _ => break,
                }
            }
        }
    }
}

async fn dispatch_loop(
    mut rx: mpsc::UnboundedReceiver<Message>,
    registry: Arc<tokio::sync::Mutex<Registry>>,
    ctcp: Arc<Mutex<CtcpRegistry>>,
    machine: Arc<Mutex<HandshakeMachine>>,
    sts_signal: Arc<Mutex<Option<u16>>>,
    shared: Arc<Shared>,
    mut cancel_rx: watch::Receiver<bool>,
) {
    loop {
        tokio::select! {
            _ = cancel_rx.changed() => {
                while let Ok(msg) = rx.try_recv() {
                    dispatch_one(&registry, &ctcp, &machine, &sts_signal, &shared, &msg).await;
                }
                break;
            }
            msg = rx.recv() => {
                match msg {
                    Some(msg) => dispatch_one(&registry, &ctcp, &machine, &sts_signal, &shared, &msg).await,
                    None => break,
                }
            }
        }
    }
}

async fn dispatch_one(
    registry: &Arc<tokio::sync::Mutex<Registry>>,
    ctcp: &Arc<Mutex<CtcpRegistry>>,
    machine: &Arc<Mutex<HandshakeMachine>>,
    sts_signal: &Arc<Mutex<Option<u16>>>,
    shared: &Arc<Shared>,
    msg: &Message,
) {
    if msg.command == "CAP" {
        let actions = machine.lock().unwrap().feed(msg);
        *shared.caps.write().unwrap() = machine.lock().unwrap().caps().clone();
        for action in actions {
            if let HandshakeAction::UpgradeToTls { port } = action {
                *sts_signal.lock().unwrap() = Some(port);
            }
        }
    }

    if let Some(envelope) = msg.ctcp() {
        ctcp.lock().unwrap().dispatch(msg, &envelope);
    }

    if let Err(e) = registry.lock().await.dispatch(msg).await {
        shared.report_error(e);
    }

    if msg.command == "ERROR" {
        let reason = msg.trailing.clone().unwrap_or_default();
        shared.report_error(Error::ServerError(reason));
    }
}

async fn send_loop(mut rx: mpsc::UnboundedReceiver<Message>, mut sink: Sink, allow_flood: bool, mut cancel_rx: watch::Receiver<bool>) {
    let mut limiter = RateLimiter::new();
    loop {
        tokio::select! {
            _ = cancel_rx.changed() => break,
            msg = rx.recv() => {
                match msg {
                    Some(msg) => {
                        if !allow_flood {
                            let chars: usize = msg.all_params().iter().map(|p| p.chars().count()).sum();
                            limiter.throttle(chars).await;
                        }
                        if !msg.sensitive {
                            tracing::debug!(command = %msg.command, "sending");
                        }
                        if sink.send(msg).await.is_err() {
                            break;
                        }
                    }
                    None => break,
                }
            }
        }
    }
}

async fn ping_loop(shared: Arc<Shared>, mut cancel_rx: watch::Receiver<bool>) {
    let Some(delay) = shared.config.effective_ping_delay() else {
        return;
    };

    tokio::select! {
        _ = tokio::time::sleep(PING_WARMUP) => {}
        _ = cancel_rx.changed() => return,
    }

    let mut seq: u64 = 0;
    loop {
        tokio::select! {
            _ = cancel_rx.changed() => return,
            _ = tokio::time::sleep(delay) => {
                seq += 1;
                shared.send(Cmd::ping(&format!("ircflow-{seq}")));
                let since_pong = shared.last_pong.lock().unwrap().elapsed();
                if since_pong > delay + PONG_GRACE {
                    let _ = shared.connected.send(false);
                    return;
                }
            }
        }
    }
}
