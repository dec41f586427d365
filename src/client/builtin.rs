//! Internal handlers wiring server traffic into the [`crate::tracker::Tracker`],
//! the keepalive clock, nickname collision policy (§4.6), and the built-in
//! CTCP replies — all registered in the handler registry's internal bag so
//! `Registry::clear_all` never disturbs them.

use std::sync::Arc;

use crate::command::Cmd;
use crate::handler::ctcp::CtcpRegistry;
use crate::handler::{Registry, WILDCARD};
use crate::message::Message;

use super::Shared;

/// Register every library-owned handler against `registry` and `ctcp`.
pub(crate) fn install(registry: &mut Registry, ctcp: &mut CtcpRegistry, shared: &Arc<Shared>) {
    if !shared.config.disable_tracking {
        let tracker_shared = shared.clone();
        registry.add_internal(WILDCARD, move |msg| {
            let (actions, kind) = tracker_shared.tracker.write().unwrap().apply(msg);
            if let Some(kind) = kind {
                tracker_shared.notify(kind);
            }
            for action in actions {
                tracker_shared.send(action);
            }
        });
    }

    let ping_shared = shared.clone();
    registry.add_internal("PING", move |msg| {
        let token = msg
            .trailing
            .clone()
            .or_else(|| msg.params.first().cloned())
            .unwrap_or_default();
        ping_shared.send(Cmd::pong(&token));
    });

    let pong_shared = shared.clone();
    registry.add_internal("PONG", move |_msg| {
        pong_shared.record_pong();
    });

    for numeric in ["433", "436", "437"] {
        let collide_shared = shared.clone();
        registry.add_internal(numeric, move |msg| {
            handle_nick_collision(&collide_shared, msg);
        });
    }

    install_ctcp(ctcp, shared);
}

fn handle_nick_collision(shared: &Arc<Shared>, msg: &Message) {
    let Some(attempted) = msg.params.get(1) else {
        return;
    };
    let replacement = match &shared.config.handle_nick_collide {
        Some(callback) => callback(attempted),
        None => format!("{attempted}_"),
    };
    if replacement.is_empty() {
        return;
    }
    shared.set_desired_nick(replacement.clone());
    if let Ok(nick_msg) = Cmd::nick(&replacement) {
        shared.send(nick_msg);
    }
}

fn install_ctcp(ctcp: &mut CtcpRegistry, shared: &Arc<Shared>) {
    let s = shared.clone();
    ctcp.set("VERSION", move |msg, _| {
        reply(&s, msg, "VERSION", Some(&s.config.version));
    });

    let s = shared.clone();
    ctcp.set("CLIENTINFO", move |msg, _| {
        reply(&s, msg, "CLIENTINFO", Some(&s.config.client_info));
    });

    let s = shared.clone();
    ctcp.set("USERINFO", move |msg, _| {
        reply(&s, msg, "USERINFO", Some(&s.config.user_info));
    });

    let s = shared.clone();
    ctcp.set("FINGER", move |msg, _| {
        reply(&s, msg, "FINGER", Some(&s.config.finger));
    });

    let s = shared.clone();
    ctcp.set("SOURCE", move |msg, _| {
        reply(&s, msg, "SOURCE", Some(&s.config.source));
    });

    let s = shared.clone();
    ctcp.set("PING", move |msg, ctcp| {
        reply(&s, msg, "PING", ctcp.arg.as_deref());
    });

    let s = shared.clone();
    ctcp.set("TIME", move |msg, _| {
        let now = chrono::Utc::now().to_rfc2822();
        reply(&s, msg, "TIME", Some(&now));
    });
}

fn reply(shared: &Arc<Shared>, msg: &Message, verb: &str, arg: Option<&str>) {
    let Some(source) = &msg.source else {
        return;
    };
    if let Ok(reply) = Cmd::send_ctcp_reply(&source.name, verb, arg) {
        shared.send(reply);
    }
}
