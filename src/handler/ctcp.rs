//! CTCP sub-registry: one handler per verb (`VERSION`, `PING`, ...), plus an
//! optional wildcard fallback, invoked after the normal command dispatch
//! when a `PRIVMSG`/`NOTICE` trailing parameter is a CTCP envelope.

use std::collections::HashMap;
use std::sync::Arc;

use crate::message::{Ctcp, Message};

type CtcpFn = dyn Fn(&Message, &Ctcp) + Send + Sync;

/// Registry of CTCP verb handlers.
#[derive(Default)]
pub struct CtcpRegistry {
    handlers: HashMap<String, Arc<CtcpFn>>,
    wildcard: Option<Arc<CtcpFn>>,
}

impl CtcpRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler for one CTCP verb (case-insensitive).
    pub fn set(&mut self, verb: &str, f: impl Fn(&Message, &Ctcp) + Send + Sync + 'static) {
        self.handlers.insert(verb.to_ascii_uppercase(), Arc::new(f));
    }

    /// Register a background handler for one CTCP verb.
    ///
    /// Distinguishing background from foreground CTCP handlers is left to
    /// the caller's dispatcher; this registry only tracks the handler.
    pub fn set_bg(&mut self, verb: &str, f: impl Fn(&Message, &Ctcp) + Send + Sync + 'static) {
        self.set(verb, f);
    }

    /// Register the wildcard fallback, invoked when no verb-specific
    /// handler matches.
    pub fn set_wildcard(&mut self, f: impl Fn(&Message, &Ctcp) + Send + Sync + 'static) {
        self.wildcard = Some(Arc::new(f));
    }

    /// Remove the handler for one verb.
    pub fn clear(&mut self, verb: &str) {
        self.handlers.remove(&verb.to_ascii_uppercase());
    }

    /// Remove every registered handler, including the wildcard.
    pub fn clear_all(&mut self) {
        self.handlers.clear();
        self.wildcard = None;
    }

    /// Dispatch a CTCP envelope decoded from `msg`, if a matching verb
    /// handler (or the wildcard) is registered.
    pub fn dispatch(&self, msg: &Message, ctcp: &Ctcp) {
        if let Some(handler) = self.handlers.get(&ctcp.verb.to_ascii_uppercase()) {
            handler(msg, ctcp);
        } else if let Some(handler) = &self.wildcard {
            handler(msg, ctcp);
        }
    }
}
