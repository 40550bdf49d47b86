use std::fmt;

use serde::Serialize;

use crate::handle::ObjectId;
use crate::journal::Journal;

/// Asks the foreign side whether a handle still resolves to a live object.
/// Unity-style hosts report destroyed objects in surprising ways, so this is
/// the only question the session ever asks about its anchor.
pub trait AnchorProbe {
    fn anchor_alive(&self, id: ObjectId) -> bool;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OverridePhase {
    Idle,
    Active,
    Restoring,
}

impl fmt::Display for OverridePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            OverridePhase::Idle => "idle",
            OverridePhase::Active => "active",
            OverridePhase::Restoring => "restoring",
        };
        f.write_str(label)
    }
}

/// The cross-cutting override-in-progress record shared by every handler.
///
/// Invariant: `anchor` is set iff the phase is not `Idle`. The transition
/// methods are the only writers, so the invariant cannot be broken from
/// outside; a call that does not fit the current phase degrades to a
/// journaled `session.conflict` no-op rather than corrupting state.
#[derive(Debug)]
pub struct OverrideSession {
    phase: OverridePhase,
    anchor: Option<ObjectId>,
    absorbed_clear: bool,
    journal: Journal,
}

impl Default for OverrideSession {
    fn default() -> Self {
        Self::new()
    }
}

impl OverrideSession {
    pub fn new() -> Self {
        OverrideSession {
            phase: OverridePhase::Idle,
            anchor: None,
            absorbed_clear: false,
            journal: Journal::default(),
        }
    }

    pub fn phase(&self) -> OverridePhase {
        self.phase
    }

    pub fn anchor(&self) -> Option<ObjectId> {
        self.anchor
    }

    pub fn is_idle(&self) -> bool {
        self.phase == OverridePhase::Idle
    }

    pub fn is_active(&self) -> bool {
        self.phase == OverridePhase::Active
    }

    pub fn is_restoring(&self) -> bool {
        self.phase == OverridePhase::Restoring
    }

    /// True while a forced clear has been intercepted and absorbed during the
    /// current restoration window.
    pub fn absorbed_clear(&self) -> bool {
        self.absorbed_clear
    }

    /// Anchor-iff-non-idle. Exposed so property tests can assert it after
    /// every dispatch, including reentrant ones.
    pub fn anchor_consistent(&self) -> bool {
        self.anchor.is_some() == (self.phase != OverridePhase::Idle)
    }

    pub fn journal(&self) -> &Journal {
        &self.journal
    }

    pub fn journal_mut(&mut self) -> &mut Journal {
        &mut self.journal
    }

    /// The global safety net: if the anchor no longer resolves, reset to
    /// `Idle` and report `false`. Runs before any other logic on every
    /// handler invocation; the invalid-anchor condition beats every other
    /// transition, including voluntary release.
    pub fn revalidate(&mut self, probe: &dyn AnchorProbe) -> bool {
        match self.anchor {
            Some(anchor) if !probe.anchor_alive(anchor) => {
                self.reset("anchor-gone");
                false
            }
            _ => true,
        }
    }

    /// Entry trigger: capture the anchor and go `Active`. Re-entry while
    /// already `Active` on the same anchor is idempotent.
    pub fn activate(&mut self, anchor: ObjectId) {
        match self.phase {
            OverridePhase::Idle => {
                self.phase = OverridePhase::Active;
                self.anchor = Some(anchor);
                self.absorbed_clear = false;
                self.journal.log(format!("session.activate object:{anchor}"));
                self.journal.bump("session.activate");
            }
            OverridePhase::Active if self.anchor == Some(anchor) => {
                self.journal.bump("session.reenter");
            }
            _ => self.conflict("activate"),
        }
    }

    /// Drop a leftover `Restoring` phase from a prior incomplete cycle. The
    /// entry handler calls this before deciding whether to activate.
    pub fn clear_stale_restore(&mut self) {
        if self.phase == OverridePhase::Restoring {
            self.reset("stale-restore");
        }
    }

    /// Voluntary release through the expected foreign path: no restoration.
    pub fn release(&mut self) {
        if self.phase == OverridePhase::Active {
            self.phase = OverridePhase::Idle;
            self.anchor = None;
            self.journal.log("session.release");
            self.journal.bump("session.release");
        } else {
            self.conflict("release");
        }
    }

    /// The external session finished; the re-assertion is about to be issued.
    pub fn begin_restore(&mut self) {
        match (self.phase, self.anchor) {
            (OverridePhase::Active, Some(anchor)) => {
                self.phase = OverridePhase::Restoring;
                self.absorbed_clear = false;
                self.journal
                    .log(format!("session.restore.begin object:{anchor}"));
                self.journal.bump("session.restore.begin");
            }
            _ => self.conflict("begin_restore"),
        }
    }

    /// Record the one forced clear the restoration window is allowed to eat.
    pub fn note_absorbed_clear(&mut self) {
        match (self.phase, self.absorbed_clear) {
            (OverridePhase::Restoring, false) => {
                self.absorbed_clear = true;
                self.journal.log("session.restore.absorb");
                self.journal.bump("session.restore.absorb");
            }
            _ => self.conflict("note_absorbed_clear"),
        }
    }

    /// Re-assertion confirmed stable; the override window closes.
    pub fn finish_restore(&mut self) {
        if self.phase == OverridePhase::Restoring {
            self.phase = OverridePhase::Idle;
            self.anchor = None;
            self.absorbed_clear = false;
            self.journal.log("session.restore.finish");
            self.journal.bump("session.restore.finish");
        } else {
            self.conflict("finish_restore");
        }
    }

    /// Priority transition to `Idle` from any state, clearing everything.
    pub fn reset(&mut self, reason: &str) {
        if self.phase != OverridePhase::Idle || self.anchor.is_some() {
            self.journal.log(format!("session.reset {reason}"));
            self.journal.bump("session.reset");
        }
        self.phase = OverridePhase::Idle;
        self.anchor = None;
        self.absorbed_clear = false;
    }

    fn conflict(&mut self, operation: &str) {
        let phase = self.phase;
        self.journal
            .log(format!("session.conflict {operation} phase:{phase}"));
        self.journal.bump("session.conflict");
    }
}

#[cfg(test)]
mod tests {
    use super::{AnchorProbe, OverridePhase, OverrideSession};
    use crate::handle::ObjectId;

    struct Probe {
        dead: Vec<ObjectId>,
    }

    impl Probe {
        fn all_alive() -> Self {
            Probe { dead: Vec::new() }
        }

        fn with_dead(id: ObjectId) -> Self {
            Probe { dead: vec![id] }
        }
    }

    impl AnchorProbe for Probe {
        fn anchor_alive(&self, id: ObjectId) -> bool {
            !self.dead.contains(&id)
        }
    }

    const CHAIR: ObjectId = ObjectId(7);

    #[test]
    fn normal_cycle_reaches_idle() {
        let mut session = OverrideSession::new();
        session.activate(CHAIR);
        assert_eq!(session.phase(), OverridePhase::Active);
        assert_eq!(session.anchor(), Some(CHAIR));

        session.begin_restore();
        assert!(session.is_restoring());
        assert!(!session.absorbed_clear());

        session.note_absorbed_clear();
        assert!(session.absorbed_clear());

        session.finish_restore();
        assert!(session.is_idle());
        assert_eq!(session.anchor(), None);
        assert!(session.anchor_consistent());
    }

    #[test]
    fn repeated_activation_is_idempotent() {
        let mut session = OverrideSession::new();
        session.activate(CHAIR);
        session.activate(CHAIR);
        assert_eq!(session.phase(), OverridePhase::Active);
        assert_eq!(session.anchor(), Some(CHAIR));
        assert_eq!(session.journal().count("session.activate"), 1);
        assert_eq!(session.journal().count("session.reenter"), 1);
    }

    #[test]
    fn activation_with_other_anchor_is_a_conflict() {
        let mut session = OverrideSession::new();
        session.activate(CHAIR);
        session.activate(ObjectId(9));
        assert_eq!(session.anchor(), Some(CHAIR));
        assert_eq!(session.journal().count("session.conflict"), 1);
    }

    #[test]
    fn revalidate_resets_from_any_phase() {
        for setup in [false, true] {
            let mut session = OverrideSession::new();
            session.activate(CHAIR);
            if setup {
                session.begin_restore();
            }
            assert!(!session.revalidate(&Probe::with_dead(CHAIR)));
            assert!(session.is_idle());
            assert_eq!(session.anchor(), None);
            assert!(session.anchor_consistent());
            assert_eq!(session.journal().count("session.reset"), 1);
        }
    }

    #[test]
    fn revalidate_keeps_live_anchor() {
        let mut session = OverrideSession::new();
        session.activate(CHAIR);
        assert!(session.revalidate(&Probe::all_alive()));
        assert!(session.is_active());
    }

    #[test]
    fn revalidate_on_idle_session_is_a_no_op() {
        let mut session = OverrideSession::new();
        assert!(session.revalidate(&Probe::with_dead(CHAIR)));
        assert!(session.journal().events().is_empty());
    }

    #[test]
    fn voluntary_release_skips_restoration() {
        let mut session = OverrideSession::new();
        session.activate(CHAIR);
        session.release();
        assert!(session.is_idle());
        assert_eq!(session.journal().count("session.restore.begin"), 0);
    }

    #[test]
    fn stale_restore_is_cleared_before_reentry() {
        let mut session = OverrideSession::new();
        session.activate(CHAIR);
        session.begin_restore();
        session.clear_stale_restore();
        assert!(session.is_idle());
        session.activate(CHAIR);
        assert!(session.is_active());
    }

    #[test]
    fn out_of_phase_transitions_degrade_to_conflicts() {
        let mut session = OverrideSession::new();
        session.release();
        session.begin_restore();
        session.finish_restore();
        session.note_absorbed_clear();
        assert!(session.is_idle());
        assert!(session.anchor_consistent());
        assert_eq!(session.journal().count("session.conflict"), 4);
    }

    #[test]
    fn second_absorbed_clear_is_a_conflict() {
        let mut session = OverrideSession::new();
        session.activate(CHAIR);
        session.begin_restore();
        session.note_absorbed_clear();
        session.note_absorbed_clear();
        assert_eq!(session.journal().count("session.restore.absorb"), 1);
        assert_eq!(session.journal().count("session.conflict"), 1);
    }
}
