//! Channel mode string parsing, driven by the connection's announced
//! `CHANMODES`/`PREFIX` ISUPPORT tokens rather than a fixed RFC 2812 enum —
//! networks routinely define mode letters RFC 2812 never anticipated.

use crate::error::ModeParseError;
use crate::isupport::{ChanModes, PrefixSpec};

/// A single mode letter being set or unset, with its argument if the mode
/// category requires one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModeChange {
    /// `+<letter>`, with argument if applicable.
    Plus(char, Option<String>),
    /// `-<letter>`, with argument if applicable.
    Minus(char, Option<String>),
}

impl ModeChange {
    /// The mode letter, regardless of direction.
    pub fn letter(&self) -> char {
        match self {
            ModeChange::Plus(c, _) | ModeChange::Minus(c, _) => *c,
        }
    }

    /// The argument, if any.
    pub fn arg(&self) -> Option<&str> {
        match self {
            ModeChange::Plus(_, a) | ModeChange::Minus(_, a) => a.as_deref(),
        }
    }

    /// Whether this is a `+` change.
    pub fn is_set(&self) -> bool {
        matches!(self, ModeChange::Plus(..))
    }
}

/// Whether `letter` is a membership-prefix mode (`o`, `v`, ...) that always
/// takes an argument regardless of `CHANMODES`, which only enumerates the
/// four non-membership categories.
fn is_prefix_mode(letter: char, prefix: &PrefixSpec) -> bool {
    prefix.modes.contains(letter)
}

/// Classification of how a mode letter consumes arguments, per its
/// `CHANMODES` category (plus the implicit membership-prefix category).
enum ArgRule {
    /// Always takes an argument; a missing argument on set/unset without a
    /// trailing arg is tolerated as a list query (type A only).
    AlwaysListQueryable,
    /// Always takes an argument, both setting and unsetting.
    Always,
    /// Takes an argument only when setting.
    OnSetOnly,
    /// Never takes an argument.
    Never,
}

fn classify(letter: char, chanmodes: &ChanModes, prefix: &PrefixSpec) -> ArgRule {
    if is_prefix_mode(letter, prefix) {
        ArgRule::Always
    } else if chanmodes.a.contains(letter) {
        ArgRule::AlwaysListQueryable
    } else if chanmodes.b.contains(letter) {
        ArgRule::Always
    } else if chanmodes.c.contains(letter) {
        ArgRule::OnSetOnly
    } else {
        // Unknown letters default to type D (no argument); a tolerant
        // codec should not reject an unrecognized mode outright.
        ArgRule::Never
    }
}

/// Parse a `MODE` command's pieces (`["+o-v", "nick1", "nick2"]`) into a
/// sequence of changes, consulting `chanmodes`/`prefix` to know which
/// letters take arguments.
pub fn parse_channel_modes(
    pieces: &[&str],
    chanmodes: &ChanModes,
    prefix: &PrefixSpec,
) -> Result<Vec<ModeChange>, ModeParseError> {
    let mut out = Vec::new();

    let Some((letters, rest)) = pieces.split_first() else {
        return Ok(out);
    };
    let mut args = rest.iter().copied().peekable();
    let mut setting = true;

    for c in letters.chars() {
        match c {
            '+' => setting = true,
            '-' => setting = false,
            letter => {
                let rule = classify(letter, chanmodes, prefix);
                let takes_arg = match rule {
                    ArgRule::Always | ArgRule::AlwaysListQueryable => true,
                    ArgRule::OnSetOnly => setting,
                    ArgRule::Never => false,
                };

                let arg = if takes_arg {
                    match args.next() {
                        Some(a) => Some(a.to_string()),
                        None => {
                            if matches!(rule, ArgRule::AlwaysListQueryable) {
                                None
                            } else {
                                return Err(ModeParseError::MissingArgument(letter));
                            }
                        }
                    }
                } else {
                    None
                };

                out.push(if setting {
                    ModeChange::Plus(letter, arg)
                } else {
                    ModeChange::Minus(letter, arg)
                });
            }
        }
    }

    if args.peek().is_some() {
        return Err(ModeParseError::UnusedArguments);
    }

    Ok(out)
}

/// A per-channel set of currently-active non-membership modes, e.g. `+nt`
/// or `+l 50`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModeSet {
    flags: Vec<char>,
    valued: Vec<(char, String)>,
}

impl ModeSet {
    /// An empty mode set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply a sequence of changes (membership-prefix changes should be
    /// routed to the channel's member list instead, not here).
    pub fn apply(&mut self, changes: &[ModeChange]) {
        for change in changes {
            match change {
                ModeChange::Plus(c, Some(arg)) => {
                    self.valued.retain(|(m, _)| m != c);
                    self.valued.push((*c, arg.clone()));
                }
                ModeChange::Plus(c, None) => {
                    if !self.flags.contains(c) {
                        self.flags.push(*c);
                    }
                }
                ModeChange::Minus(c, _) => {
                    self.flags.retain(|m| m != c);
                    self.valued.retain(|(m, _)| m != c);
                }
            }
        }
    }

    /// Whether a flag-style mode is set.
    pub fn has(&self, mode: char) -> bool {
        self.flags.contains(&mode) || self.valued.iter().any(|(m, _)| *m == mode)
    }

    /// The argument for a valued mode (e.g. channel key, limit), if set.
    pub fn value_of(&self, mode: char) -> Option<&str> {
        self.valued
            .iter()
            .find(|(m, _)| *m == mode)
            .map(|(_, v)| v.as_str())
    }
}
