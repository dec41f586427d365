//! Per-channel membership prefix tracking (`@`, `+`, and whatever else
//! `PREFIX` announces), kept separate from [`super::channel::Channel`]'s
//! general mode set since prefix modes apply to a user-in-channel, not the
//! channel itself.

use crate::isupport::PrefixSpec;

/// The membership privileges a user holds in one channel: owner (`q`),
/// admin (`a`), op (`o`), halfop (`h`), and voice (`v`).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PermSet {
    /// `+q` (owner / founder).
    pub owner: bool,
    /// `+a` (protected / admin).
    pub admin: bool,
    /// `+o` (operator).
    pub op: bool,
    /// `+h` (half-operator).
    pub halfop: bool,
    /// `+v` (voice).
    pub voice: bool,
}

impl PermSet {
    /// An empty permission set (regular, unprivileged member).
    pub fn new() -> Self {
        Self::default()
    }

    /// Owner or admin or op: can moderate the channel authoritatively.
    pub fn is_admin(&self) -> bool {
        self.owner || self.admin || self.op
    }

    /// Admin-level privilege, or halfop/voice: trusted enough to speak
    /// through a +m moderation gate or similar.
    pub fn is_trusted(&self) -> bool {
        self.is_admin() || self.halfop || self.voice
    }

    /// Grant a membership mode (`+o` etc), by its mode letter. Unknown
    /// letters are ignored.
    pub fn grant(&mut self, mode: char) {
        if let Some(field) = Self::field_mut(self, mode) {
            *field = true;
        }
    }

    /// Revoke a membership mode (`-o` etc), by its mode letter. Unknown
    /// letters are ignored.
    pub fn revoke(&mut self, mode: char) {
        if let Some(field) = Self::field_mut(self, mode) {
            *field = false;
        }
    }

    /// Whether the given membership mode letter is held.
    pub fn has(&self, mode: char) -> bool {
        match mode {
            'q' => self.owner,
            'a' => self.admin,
            'o' => self.op,
            'h' => self.halfop,
            'v' => self.voice,
            _ => false,
        }
    }

    fn field_mut(&mut self, mode: char) -> Option<&mut bool> {
        match mode {
            'q' => Some(&mut self.owner),
            'a' => Some(&mut self.admin),
            'o' => Some(&mut self.op),
            'h' => Some(&mut self.halfop),
            'v' => Some(&mut self.voice),
            _ => None,
        }
    }

    /// The highest-privilege prefix sigil currently held (`@` for op, etc),
    /// per the ordering in `prefix`'s `PREFIX` spec.
    pub fn highest_prefix(&self, prefix: &PrefixSpec) -> Option<char> {
        prefix
            .modes
            .chars()
            .find(|m| self.has(*m))
            .and_then(|m| prefix.prefix_for(m))
    }

    /// Merge stacked sigils off a NAMES entry (`@+nick`) into this set,
    /// given the `PREFIX` spec mapping sigils back to mode letters.
    pub fn apply_sigils(&mut self, sigils: &str, prefix: &PrefixSpec) {
        for sigil in sigils.chars() {
            if let Some(mode) = prefix.mode_for(sigil) {
                self.grant(mode);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn prefix() -> PrefixSpec {
        PrefixSpec::parse("(ov)@+").unwrap()
    }

    fn qaohv_prefix() -> PrefixSpec {
        PrefixSpec::parse("(qaohv)~&@%+").unwrap()
    }

    #[test]
    fn grant_and_revoke_round_trip() {
        let mut perms = PermSet::new();
        perms.grant('o');
        assert!(perms.has('o'));
        perms.revoke('o');
        assert!(!perms.has('o'));
    }

    #[test]
    fn highest_prefix_prefers_op_over_voice() {
        let mut perms = PermSet::new();
        perms.grant('v');
        perms.grant('o');
        assert_eq!(perms.highest_prefix(&prefix()), Some('@'));
    }

    #[test]
    fn apply_sigils_parses_stacked_prefixes() {
        let mut perms = PermSet::new();
        perms.apply_sigils("@+", &prefix());
        assert!(perms.has('o'));
        assert!(perms.has('v'));
    }

    /// Given PREFIX `(qaohv)~&@%+` and NAMES `"~&me @other +third"`, after
    /// 353/366 the PermSet for "me" has owner=admin=true, the rest false.
    #[test]
    fn owner_and_admin_sigils_set_only_those_flags() {
        let prefix = qaohv_prefix();
        let mut perms = PermSet::new();
        perms.apply_sigils("~&", &prefix);

        assert!(perms.owner);
        assert!(perms.admin);
        assert!(!perms.op);
        assert!(!perms.halfop);
        assert!(!perms.voice);

        assert!(perms.is_admin());
        assert!(perms.is_trusted());
    }

    #[test]
    fn halfop_and_voice_are_trusted_but_not_admin() {
        let mut perms = PermSet::new();
        perms.grant('h');
        assert!(!perms.is_admin());
        assert!(perms.is_trusted());

        let mut voice_only = PermSet::new();
        voice_only.grant('v');
        assert!(!voice_only.is_admin());
        assert!(voice_only.is_trusted());
    }

    #[test]
    fn unprivileged_member_is_neither_admin_nor_trusted() {
        let perms = PermSet::new();
        assert!(!perms.is_admin());
        assert!(!perms.is_trusted());
    }
}
