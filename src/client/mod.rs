//! The async client facade: connection supervisor, built-in handlers, and
//! the public surface applications drive (`Connect`/`Close`/`Quit`, `Cmd.*`
//! passthroughs, and accessors into the state tracker).

pub mod builtin;
pub mod config;
pub mod ratelimit;
mod supervisor;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::time::{Duration, Instant};

use tokio::sync::{broadcast, mpsc, watch};

pub use config::Config;

use crate::caps::CapState;
use crate::command::Cmd;
use crate::error::{Error, Result};
use crate::handler::ctcp::CtcpRegistry;
use crate::handler::{HandlerId, Registry};
use crate::message::Message;
use crate::tracker::{Channel, NotifyKind, Tracker, User};

/// State shared between the facade and the running supervisor task. Cheaply
/// cloned (it's just the `Arc`) so built-in handlers and the public API can
/// both reach it.
pub(crate) struct Shared {
    pub config: Config,
    pub tracker: RwLock<Tracker>,
    pub caps: RwLock<CapState>,
    pub desired_nick: Mutex<String>,
    pub tx: Mutex<Option<mpsc::UnboundedSender<Message>>>,
    pub notify: broadcast::Sender<NotifyKind>,
    pub connected: watch::Sender<bool>,
    pub last_pong: Mutex<Instant>,
    pub connected_at: Mutex<Option<Instant>>,
    pub errors: Mutex<Option<mpsc::UnboundedSender<Error>>>,
}

impl Shared {
    fn new(config: Config) -> Arc<Self> {
        let nick = config.nick.clone();
        Arc::new(Shared {
            config,
            tracker: RwLock::new(Tracker::new()),
            caps: RwLock::new(CapState::new()),
            desired_nick: Mutex::new(nick),
            tx: Mutex::new(None),
            notify: broadcast::channel(64).0,
            connected: watch::channel(false).0,
            last_pong: Mutex::new(Instant::now()),
            connected_at: Mutex::new(None),
            errors: Mutex::new(None),
        })
    }

    /// Enqueue a message for the send loop. Silently dropped if not
    /// currently connected; callers that need confirmation use
    /// [`Client::send`].
    pub fn send(&self, msg: Message) {
        if let Some(tx) = self.tx.lock().unwrap().as_ref() {
            let _ = tx.send(msg);
        }
    }

    pub fn notify(&self, kind: NotifyKind) {
        let _ = self.notify.send(kind);
    }

    pub fn record_pong(&self) {
        *self.last_pong.lock().unwrap() = Instant::now();
    }

    pub fn set_desired_nick(&self, nick: String) {
        *self.desired_nick.lock().unwrap() = nick;
    }

    fn report_error(&self, err: Error) {
        if let Some(sink) = self.errors.lock().unwrap().as_ref() {
            let _ = sink.send(err);
        }
    }
}

/// The async IRC client: dials, registers, keeps itself alive, and tracks
/// state in the background while applications drive it through handlers
/// and the `Cmd.*` command helpers.
pub struct Client {
    shared: Arc<Shared>,
    registry: Arc<tokio::sync::Mutex<Registry>>,
    ctcp: Arc<Mutex<CtcpRegistry>>,
    cancel: watch::Sender<bool>,
    quitting: Arc<AtomicBool>,
    supervisor: Mutex<Option<tokio::task::JoinHandle<()>>>,
}

impl Client {
    /// Build a client from `config`, validating it up front. No connection
    /// is attempted until [`Client::connect`].
    pub fn new(config: Config) -> Result<Client> {
        config.validate()?;
        let shared = Shared::new(config);

        let mut registry = Registry::new();
        let mut ctcp = CtcpRegistry::new();
        builtin::install(&mut registry, &mut ctcp, &shared);

        Ok(Client {
            shared,
            registry: Arc::new(tokio::sync::Mutex::new(registry)),
            ctcp: Arc::new(Mutex::new(ctcp)),
            cancel: watch::channel(false).0,
            quitting: Arc::new(AtomicBool::new(false)),
            supervisor: Mutex::new(None),
        })
    }

    /// Install a panic recovery sink for the handler registry.
    pub async fn set_recovery(&self, sink: impl Fn(crate::handler::HandlerPanic) + Send + Sync + 'static) {
        self.registry.lock().await.set_recovery(sink);
    }

    /// Install an error sink receiving asynchronous failures (reconnect
    /// exhaustion, server `ERROR` frames, handler panics when no recovery
    /// sink is set).
    pub fn on_error(&self) -> mpsc::UnboundedReceiver<Error> {
        let (tx, rx) = mpsc::unbounded_channel();
        *self.shared.errors.lock().unwrap() = Some(tx);
        rx
    }

    /// Subscribe to `notify(kind)` signals emitted whenever the tracker's
    /// general metadata or channel/user state changes.
    pub fn subscribe(&self) -> broadcast::Receiver<NotifyKind> {
        self.shared.notify.subscribe()
    }

    /// Dial, negotiate capabilities/SASL, and register, then spawn the
    /// connection supervisor (read/dispatch/send/ping loops with
    /// reconnect). Returns once the initial registration completes or
    /// fails.
    pub async fn connect(&self) -> Result<()> {
        if self.supervisor.lock().unwrap().is_some() {
            return Err(Error::AlreadyConnecting);
        }
        self.quitting.store(false, Ordering::SeqCst);
        let (ready_tx, ready_rx) = tokio::sync::oneshot::channel();

        let shared = self.shared.clone();
        let registry = self.registry.clone();
        let ctcp = self.ctcp.clone();
        let cancel_rx = self.cancel.subscribe();
        let quitting = self.quitting.clone();

        let handle = tokio::spawn(async move {
            supervisor::run(shared, registry, ctcp, cancel_rx, quitting, ready_tx).await;
        });
        *self.supervisor.lock().unwrap() = Some(handle);

        ready_rx.await.map_err(|_| Error::ConnectionClosed)?
    }

    /// Idempotently tear down the connection: cancels all four loops.
    pub fn close(&self) {
        let _ = self.cancel.send(true);
    }

    /// Send `QUIT` with `reason`, then close. The supervisor treats this as
    /// an application-requested disconnect and skips the reconnect sleep
    /// once.
    pub async fn quit(&self, reason: &str) {
        self.quitting.store(true, Ordering::SeqCst);
        self.shared.send(Message::with_trailing("QUIT", vec![], reason));
        tokio::time::sleep(Duration::from_millis(200)).await;
        self.close();
    }

    /// Force a reconnect: closes the current session (if any) and starts a
    /// fresh one.
    pub async fn reconnect(&self) -> Result<()> {
        self.close();
        if let Some(handle) = self.supervisor.lock().unwrap().take() {
            let _ = handle.await;
        }
        let _ = self.cancel.send(false);
        self.connect().await
    }

    /// Enqueue a message for the outbound send loop.
    pub fn send(&self, msg: Message) -> Result<()> {
        if self.shared.tx.lock().unwrap().is_none() {
            return Err(Error::NotConnected);
        }
        self.shared.send(msg);
        Ok(())
    }

    /// Parse and enqueue a raw line.
    pub fn send_raw(&self, line: &str) -> Result<()> {
        self.send(Message::parse(line)?)
    }

    /// Register a foreground handler for `command` (`"*"` for all).
    pub async fn add_handler(&self, command: &str, f: impl Fn(&Message) + Send + Sync + 'static) -> HandlerId {
        self.registry.lock().await.add(command, f)
    }

    /// Register a background handler for `command`.
    pub async fn add_bg_handler(&self, command: &str, f: impl Fn(&Message) + Send + Sync + 'static) -> HandlerId {
        self.registry.lock().await.add_bg(command, f)
    }

    /// Register a temporary handler with an optional deadline.
    pub async fn add_tmp_handler(
        &self,
        command: &str,
        deadline: Option<Duration>,
        f: impl Fn(&Message) -> bool + Send + Sync + 'static,
    ) -> HandlerId {
        self.registry.lock().await.add_tmp(command, deadline, f)
    }

    /// Remove a single handler.
    pub async fn remove_handler(&self, id: &HandlerId) {
        self.registry.lock().await.remove(id);
    }

    /// Remove all application-registered handlers for `command`.
    pub async fn clear_handlers(&self, command: &str) {
        self.registry.lock().await.clear(command);
    }

    /// Remove all application-registered handlers.
    pub async fn clear_all_handlers(&self) {
        self.registry.lock().await.clear_all();
    }

    /// Register a CTCP verb reply, overriding the built-in one if any.
    pub fn set_ctcp(&self, verb: &str, f: impl Fn(&Message, &crate::message::Ctcp) + Send + Sync + 'static) {
        self.ctcp.lock().unwrap().set(verb, f);
    }

    /// Clear a single CTCP verb handler (including built-ins).
    pub fn clear_ctcp(&self, verb: &str) {
        self.ctcp.lock().unwrap().clear(verb);
    }

    /// Clear every CTCP handler.
    pub fn clear_all_ctcp(&self) {
        self.ctcp.lock().unwrap().clear_all();
    }

    /// Our current nickname, once granted by the server.
    pub fn get_nick(&self) -> Option<String> {
        self.shared.tracker.read().unwrap().nick.clone()
    }

    /// Our ident, as last observed via our own WHO/WHOX self-probe.
    pub fn get_ident(&self) -> Option<String> {
        let tracker = self.shared.tracker.read().unwrap();
        let nick = tracker.nick.as_deref()?;
        tracker.user(nick)?.ident.clone()
    }

    /// Our host, as last observed via our own WHO/WHOX self-probe.
    pub fn get_host(&self) -> Option<String> {
        let tracker = self.shared.tracker.read().unwrap();
        let nick = tracker.nick.as_deref()?;
        tracker.user(nick)?.host.clone()
    }

    /// Sorted list of channel names we are currently a member of.
    pub fn channel_list(&self) -> Vec<String> {
        let tracker = self.shared.tracker.read().unwrap();
        let mut names: Vec<String> = tracker.channels().map(|c| c.name.clone()).collect();
        names.sort();
        names
    }

    /// Apply `f` to the tracked channel named `name`, if any.
    pub fn lookup_channel<T>(&self, name: &str, f: impl FnOnce(&Channel) -> T) -> Option<T> {
        self.shared.tracker.read().unwrap().channel(name).map(f)
    }

    /// Apply `f` to the tracked user named `nick`, if any.
    pub fn lookup_user<T>(&self, nick: &str, f: impl FnOnce(&User) -> T) -> Option<T> {
        self.shared.tracker.read().unwrap().user(nick).map(f)
    }

    /// Whether we are currently a member of `channel`.
    pub fn is_in_channel(&self, channel: &str) -> bool {
        self.shared.tracker.read().unwrap().is_in_channel(channel)
    }

    /// The declared network name, if harvested from the 001 greeting or
    /// ISUPPORT's `NETWORK` token.
    pub fn network_name(&self) -> Option<String> {
        self.shared.tracker.read().unwrap().network.clone()
    }

    /// Accumulated MOTD text.
    pub fn server_motd(&self) -> String {
        self.shared.tracker.read().unwrap().motd.clone()
    }

    /// Look up an ISUPPORT token's value (`Some(Some(v))` for `KEY=v`,
    /// `Some(None)` for a valueless `KEY`, `None` if not advertised).
    pub fn get_server_opt(&self, key: &str) -> Option<Option<String>> {
        self.shared
            .tracker
            .read()
            .unwrap()
            .isupport
            .get(key)
            .map(|v| v.map(str::to_string))
    }

    /// Whether `cap` was successfully negotiated.
    pub fn has_capability(&self, cap: &str) -> bool {
        self.shared.caps.read().unwrap().is_enabled(cap)
    }

    /// Whether the supervisor currently believes the session is live.
    pub fn is_connected(&self) -> bool {
        *self.shared.connected.borrow()
    }

    /// Wall-clock time since the current session completed registration.
    pub fn uptime(&self) -> Option<Duration> {
        self.shared.connected_at.lock().unwrap().map(|t| t.elapsed())
    }

    // --- Cmd.* passthroughs -------------------------------------------------

    /// Change nickname.
    pub fn nick(&self, nickname: &str) -> Result<()> {
        self.send(Cmd::nick(nickname)?)
    }

    /// Join one or more channels.
    pub fn join(&self, channels: &[&str]) -> Result<()> {
        self.send(Cmd::join(channels)?)
    }

    /// Join one or more keyed channels.
    pub fn join_key(&self, channels: &[&str], keys: &[&str]) -> Result<()> {
        self.send(Cmd::join_key(channels, keys)?)
    }

    /// Leave one or more channels.
    pub fn part(&self, channels: &[&str], reason: Option<&str>) -> Result<()> {
        self.send(Cmd::part(channels, reason)?)
    }

    /// Send a `PRIVMSG`, splitting across multiple lines if needed.
    pub fn message(&self, target: &str, text: &str) -> Result<()> {
        for msg in Cmd::message(target, text)? {
            self.send(msg)?;
        }
        Ok(())
    }

    /// Send a CTCP ACTION (`/me`).
    pub fn action(&self, target: &str, text: &str) -> Result<()> {
        self.send(Cmd::action(target, text)?)
    }

    /// Send a `NOTICE`, splitting across multiple lines if needed.
    pub fn notice(&self, target: &str, text: &str) -> Result<()> {
        for msg in Cmd::notice(target, text)? {
            self.send(msg)?;
        }
        Ok(())
    }

    /// Query or set a channel topic.
    pub fn topic(&self, channel: &str, new_topic: Option<&str>) -> Result<()> {
        self.send(Cmd::topic(channel, new_topic)?)
    }

    /// Send a `WHO` query.
    pub fn who(&self, mask: &str) -> Result<()> {
        self.send(Cmd::who(mask))
    }

    /// Send a `WHOIS` query.
    pub fn whois(&self, nick: &str) -> Result<()> {
        self.send(Cmd::whois(nick)?)
    }

    /// Send a `WHOWAS` query.
    pub fn whowas(&self, nick: &str) -> Result<()> {
        self.send(Cmd::whowas(nick)?)
    }

    /// Operator authentication.
    pub fn oper(&self, name: &str, password: &str) -> Result<()> {
        self.send(Cmd::oper(name, password))
    }

    /// Kick a user from a channel.
    pub fn kick(&self, channel: &str, nick: &str, comment: Option<&str>) -> Result<()> {
        self.send(Cmd::kick(channel, nick, comment)?)
    }

    /// Invite a user to a channel.
    pub fn invite(&self, nick: &str, channel: &str) -> Result<()> {
        self.send(Cmd::invite(nick, channel)?)
    }

    /// Mark ourselves away.
    pub fn away(&self, reason: &str) -> Result<()> {
        self.send(Cmd::away(reason))
    }

    /// Clear our away status.
    pub fn back(&self) -> Result<()> {
        self.send(Cmd::back())
    }

    /// List channels, optionally filtered.
    pub fn list(&self, channels: &[&str]) -> Result<()> {
        self.send(Cmd::list(channels))
    }

    /// Send a CTCP request.
    pub fn send_ctcp(&self, target: &str, verb: &str, arg: Option<&str>) -> Result<()> {
        self.send(Cmd::send_ctcp(target, verb, arg)?)
    }

    /// Send a CTCP reply (`NOTICE`).
    pub fn send_ctcp_reply(&self, target: &str, verb: &str, arg: Option<&str>) -> Result<()> {
        self.send(Cmd::send_ctcp_reply(target, verb, arg)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_rejects_invalid_config() {
        let cfg = Config::new("", 6667, "bot");
        assert!(Client::new(cfg).is_err());
    }

    #[tokio::test]
    async fn send_without_connection_is_not_connected() {
        let cfg = Config::new("irc.example.net", 6667, "bot");
        let client = Client::new(cfg).unwrap();
        let err = client.send(Message::new("PING", vec![])).unwrap_err();
        assert!(matches!(err, Error::NotConnected));
    }

    #[test]
    fn is_connected_defaults_false() {
        let cfg = Config::new("irc.example.net", 6667, "bot");
        let client = Client::new(cfg).unwrap();
        assert!(!client.is_connected());
    }
}
