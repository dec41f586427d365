//! Handler registry: command-keyed, two-level storage (internal vs.
//! external, background vs. foreground cohorts) with panic isolation and
//! temporary handlers racing a deadline against their own completion.
//!
//! Dispatch order for an event with command `C`: the `*` wildcard cohort
//! (background handlers started in parallel, foreground handlers started in
//! parallel, cohort awaited) runs first, then the same two-step sequence for
//! `C` itself.

pub mod ctcp;

use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinSet;
use tokio::time::Instant;

use crate::error::Error;
use crate::message::Message;

/// The wildcard command key: handlers registered under `*` run before a
/// command-specific cohort and are always included.
pub const WILDCARD: &str = "*";

/// Unique id for a registered handler, encoding the command it was
/// registered under plus a monotonic sequence number.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct HandlerId {
    command: String,
    seq: u64,
}

impl HandlerId {
    /// The command this handler is registered for (`"*"` for wildcard).
    pub fn command(&self) -> &str {
        &self.command
    }
}

impl std::fmt::Display for HandlerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}#{}", self.command, self.seq)
    }
}

/// Whether a handler runs in the background (fire-and-forget within the
/// cohort, still joined at cohort end) or foreground (same, but contractually
/// must not block on further dispatcher-mediated I/O).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cohort {
    /// Started in parallel with other background handlers in the cohort.
    Background,
    /// Started in parallel with other foreground handlers in the cohort,
    /// after the background cohort has been joined.
    Foreground,
}

/// A panic caught from a handler invocation, with enough context to log or
/// forward to a recovery sink.
#[derive(Debug, Clone)]
pub struct HandlerPanic {
    /// The handler that panicked.
    pub handler_id: HandlerId,
    /// Best-effort panic payload message.
    pub message: String,
    /// `Location::caller()` of the call site that invoked the handler.
    pub location: String,
}

type HandlerFn = dyn Fn(&Message) + Send + Sync;

#[derive(Clone)]
struct Handler {
    id: HandlerId,
    func: Arc<HandlerFn>,
    cohort: Cohort,
}

type TempFn = dyn Fn(&Message) -> bool + Send + Sync;

struct TempHandler {
    id: HandlerId,
    func: Arc<TempFn>,
    deadline: Option<Instant>,
}

/// Which bag a handler belongs to: library-owned handlers are never
/// removed by [`Registry::clear`]/[`Registry::clear_all`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Bag {
    Internal,
    External,
}

/// Command-keyed handler storage, with panic isolation and a pluggable
/// recovery sink.
pub struct Registry {
    internal: HashMap<String, Vec<Handler>>,
    external: HashMap<String, Vec<Handler>>,
    temporary: HashMap<String, Vec<TempHandler>>,
    next_seq: AtomicU64,
    recover: Option<Arc<dyn Fn(HandlerPanic) + Send + Sync>>,
}

impl Default for Registry {
    fn default() -> Self {
        Registry {
            internal: HashMap::new(),
            external: HashMap::new(),
            temporary: HashMap::new(),
            next_seq: AtomicU64::new(0),
            recover: None,
        }
    }
}

impl Registry {
    /// A new, empty registry with no recovery sink configured (panics
    /// propagate and terminate the process by default).
    pub fn new() -> Self {
        Self::default()
    }

    /// Install a recovery sink: panicking handlers are caught and reported
    /// here instead of unwinding past the dispatcher.
    pub fn set_recovery(&mut self, sink: impl Fn(HandlerPanic) + Send + Sync + 'static) {
        self.recover = Some(Arc::new(sink));
    }

    fn alloc_id(&self, command: &str) -> HandlerId {
        HandlerId {
            command: command.to_string(),
            seq: self.next_seq.fetch_add(1, Ordering::Relaxed),
        }
    }

    /// Register an external (application-owned), foreground handler.
    pub fn add(&mut self, command: &str, f: impl Fn(&Message) + Send + Sync + 'static) -> HandlerId {
        self.insert(Bag::External, command, Cohort::Foreground, f)
    }

    /// Register an external, background handler.
    pub fn add_bg(&mut self, command: &str, f: impl Fn(&Message) + Send + Sync + 'static) -> HandlerId {
        self.insert(Bag::External, command, Cohort::Background, f)
    }

    /// Register an internal (library-owned), foreground handler. Internal
    /// handlers are never removed by [`Registry::clear`]/[`Registry::clear_all`].
    pub fn add_internal(
        &mut self,
        command: &str,
        f: impl Fn(&Message) + Send + Sync + 'static,
    ) -> HandlerId {
        self.insert(Bag::Internal, command, Cohort::Foreground, f)
    }

    fn insert(
        &mut self,
        bag: Bag,
        command: &str,
        cohort: Cohort,
        f: impl Fn(&Message) + Send + Sync + 'static,
    ) -> HandlerId {
        let id = self.alloc_id(command);
        let handler = Handler {
            id: id.clone(),
            func: Arc::new(f),
            cohort,
        };
        let map = match bag {
            Bag::Internal => &mut self.internal,
            Bag::External => &mut self.external,
        };
        map.entry(command.to_string()).or_default().push(handler);
        id
    }

    /// Register a temporary, external handler. `f` returns `true` when it
    /// has finished its job, at which point it is removed; it is also
    /// removed if `deadline` elapses first. Exactly one of these paths
    /// performs the removal.
    pub fn add_tmp(
        &mut self,
        command: &str,
        deadline: Option<Duration>,
        f: impl Fn(&Message) -> bool + Send + Sync + 'static,
    ) -> HandlerId {
        let id = self.alloc_id(command);
        let handler = TempHandler {
            id: id.clone(),
            func: Arc::new(f),
            deadline: deadline.map(|d| Instant::now() + d),
        };
        self.temporary
            .entry(command.to_string())
            .or_default()
            .push(handler);
        id
    }

    /// Remove a single handler by id, from whichever bag it lives in.
    pub fn remove(&mut self, id: &HandlerId) {
        for map in [&mut self.internal, &mut self.external] {
            if let Some(v) = map.get_mut(&id.command) {
                v.retain(|h| h.id != *id);
            }
        }
        if let Some(v) = self.temporary.get_mut(&id.command) {
            v.retain(|h| h.id != *id);
        }
    }

    /// Remove all external handlers for `command`. Internal handlers are
    /// untouched.
    pub fn clear(&mut self, command: &str) {
        self.external.remove(command);
        self.temporary.remove(command);
    }

    /// Remove all external handlers across all commands. Internal handlers
    /// are untouched.
    pub fn clear_all(&mut self) {
        self.external.clear();
        self.temporary.clear();
    }

    /// Total handler count across internal, external, and temporary bags.
    pub fn len(&self) -> usize {
        self.count_map(&self.internal) + self.count_map(&self.external) + self.temporary.values().map(Vec::len).sum::<usize>()
    }

    /// Whether the registry has no handlers registered at all.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of handlers registered for a specific command (excluding the
    /// wildcard, unless `command` is `"*"`).
    pub fn count(&self, command: &str) -> usize {
        let in_map = |m: &HashMap<String, Vec<Handler>>| m.get(command).map(Vec::len).unwrap_or(0);
        in_map(&self.internal)
            + in_map(&self.external)
            + self.temporary.get(command).map(Vec::len).unwrap_or(0)
    }

    fn count_map(&self, m: &HashMap<String, Vec<Handler>>) -> usize {
        m.values().map(Vec::len).sum()
    }

    /// Remove any temporary handlers whose deadline has elapsed, returning
    /// their ids (the caller should surface [`Error::CallbackDeadlineExceeded`]
    /// for each).
    pub fn expire_temporary(&mut self) -> Vec<HandlerId> {
        let now = Instant::now();
        let mut expired = Vec::new();
        for handlers in self.temporary.values_mut() {
            let mut i = 0;
            while i < handlers.len() {
                if handlers[i].deadline.map(|d| now >= d).unwrap_or(false) {
                    expired.push(handlers.remove(i).id);
                } else {
                    i += 1;
                }
            }
        }
        expired
    }

    /// Dispatch `msg` to the wildcard cohort, then (if `msg.command` isn't
    /// itself the wildcard) the command-specific cohort. Returns any panics
    /// caught along the way (empty if a recovery sink isn't needed or none
    /// fired); if no recovery sink is configured, a caught panic is instead
    /// resumed (propagated), matching the fail-fast default.
    pub async fn dispatch(&mut self, msg: &Message) -> Result<(), Error> {
        self.dispatch_command(WILDCARD, msg).await?;
        if msg.command != WILDCARD {
            self.dispatch_command(&msg.command, msg).await?;
        }
        Ok(())
    }

    async fn dispatch_command(&mut self, command: &str, msg: &Message) -> Result<(), Error> {
        let background = self.collect(command, Cohort::Background);
        self.run_cohort(background, msg).await?;

        let foreground = self.collect(command, Cohort::Foreground);
        self.run_cohort(foreground, msg).await?;

        self.run_temporary(command, msg);
        Ok(())
    }

    fn collect(&self, command: &str, cohort: Cohort) -> Vec<Handler> {
        let mut out = Vec::new();
        for map in [&self.internal, &self.external] {
            if let Some(handlers) = map.get(command) {
                out.extend(handlers.iter().filter(|h| h.cohort == cohort).cloned());
            }
        }
        out
    }

    async fn run_cohort(&self, handlers: Vec<Handler>, msg: &Message) -> Result<(), Error> {
        if handlers.is_empty() {
            return Ok(());
        }
        let mut set = JoinSet::new();
        for handler in handlers {
            let msg = msg.clone();
            set.spawn(async move { invoke(&handler, &msg) });
        }
        while let Some(joined) = set.join_next().await {
            if let Ok(Err(panic)) = joined {
                self.report_panic(panic)?;
            }
        }
        Ok(())
    }

    fn run_temporary(&mut self, command: &str, msg: &Message) {
        let Some(handlers) = self.temporary.get_mut(command) else {
            return;
        };
        let mut done = Vec::new();
        for (i, handler) in handlers.iter().enumerate() {
            if (handler.func)(msg) {
                done.push(i);
            }
        }
        for i in done.into_iter().rev() {
            handlers.remove(i);
        }
    }

    fn report_panic(&self, panic: HandlerPanic) -> Result<(), Error> {
        match &self.recover {
            Some(sink) => {
                sink(panic);
                Ok(())
            }
            None => Err(Error::HandlerPanic {
                handler_id: panic.handler_id,
                message: panic.message,
                location: panic.location,
            }),
        }
    }
}

#[track_caller]
fn invoke(handler: &Handler, msg: &Message) -> Result<(), HandlerPanic> {
    let location = std::panic::Location::caller().to_string();
    let result = panic::catch_unwind(AssertUnwindSafe(|| (handler.func)(msg)));
    result.map_err(|payload| HandlerPanic {
        handler_id: handler.id.clone(),
        message: panic_message(&payload),
        location,
    })
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
