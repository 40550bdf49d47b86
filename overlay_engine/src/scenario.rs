use overlay_hooks::{InterceptRegistry, OverridePhase, OverrideSession};
use thiserror::Error;

use crate::handlers;
use crate::settings::OverlaySettings;
use crate::sim::SimWorld;
use crate::world::{WorldCall, WorldSeam};

/// Deterministic scripts that replay the interesting interception sequences
/// against the scripted world. Each one is a straight list of the top-level
/// foreign calls the live host would make; everything nested comes out of the
/// world's own compound operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScenarioSlug {
    SeatedDialogue,
    ChairRemoved,
    StandUp,
    CallDelay,
}

#[derive(Debug, Error)]
#[error("unknown scenario: {0}")]
pub struct UnknownScenario(String);

impl ScenarioSlug {
    pub const ALL: [ScenarioSlug; 4] = [
        ScenarioSlug::SeatedDialogue,
        ScenarioSlug::ChairRemoved,
        ScenarioSlug::StandUp,
        ScenarioSlug::CallDelay,
    ];

    pub fn parse(value: &str) -> Result<Self, UnknownScenario> {
        match value.trim().to_ascii_lowercase().as_str() {
            "seated-dialogue" => Ok(ScenarioSlug::SeatedDialogue),
            "chair-removed" => Ok(ScenarioSlug::ChairRemoved),
            "stand-up" => Ok(ScenarioSlug::StandUp),
            "call-delay" => Ok(ScenarioSlug::CallDelay),
            other => Err(UnknownScenario(other.to_string())),
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            ScenarioSlug::SeatedDialogue => "seated-dialogue",
            ScenarioSlug::ChairRemoved => "chair-removed",
            ScenarioSlug::StandUp => "stand-up",
            ScenarioSlug::CallDelay => "call-delay",
        }
    }

    pub fn summary(self) -> &'static str {
        match self {
            ScenarioSlug::SeatedDialogue => {
                "full override cycle: sit, talk, dialogue ends, seat restored"
            }
            ScenarioSlug::ChairRemoved => "anchor destroyed mid-dialogue; safety net resets",
            ScenarioSlug::StandUp => "voluntary stand-up mid-dialogue; no restoration",
            ScenarioSlug::CallDelay => "side-job phone call pushed into the configured window",
        }
    }
}

pub struct ScenarioRun {
    pub slug: ScenarioSlug,
    pub world: SimWorld,
    pub session: OverrideSession,
}

impl ScenarioRun {
    pub fn final_phase(&self) -> OverridePhase {
        self.session.phase()
    }
}

pub fn run(slug: ScenarioSlug, settings: &OverlaySettings) -> ScenarioRun {
    match slug {
        ScenarioSlug::SeatedDialogue => seated_dialogue(settings),
        ScenarioSlug::ChairRemoved => chair_removed(settings),
        ScenarioSlug::StandUp => stand_up(settings),
        ScenarioSlug::CallDelay => call_delay(settings),
    }
}

struct Stage {
    hooks: InterceptRegistry<SimWorld>,
    world: SimWorld,
    session: OverrideSession,
}

impl Stage {
    fn new(settings: &OverlaySettings) -> Self {
        let mut hooks = InterceptRegistry::new();
        handlers::install_enabled(&mut hooks, settings);
        Stage {
            hooks,
            world: SimWorld::new(),
            session: OverrideSession::new(),
        }
    }

    fn dispatch(&mut self, call: WorldCall) {
        self.hooks
            .dispatch(&mut self.world, &mut self.session, &call);
        debug_assert!(
            self.session.anchor_consistent(),
            "anchor/phase invariant broken after {call:?}"
        );
    }

    fn finish(self, slug: ScenarioSlug) -> ScenarioRun {
        ScenarioRun {
            slug,
            world: self.world,
            session: self.session,
        }
    }
}

fn seated_dialogue(settings: &OverlaySettings) -> ScenarioRun {
    let mut stage = Stage::new(settings);
    let chair = stage.world.add_seat("cafe chair");
    let clerk = stage.world.add_citizen("clerk", true);
    let player = stage.world.player();

    stage.dispatch(WorldCall::SetLockedTarget {
        target: Some(chair),
    });
    stage.dispatch(WorldCall::RefreshActions { object: clerk });
    stage.dispatch(WorldCall::BeginInteraction {
        actor: player,
        target: clerk,
    });
    stage.dispatch(WorldCall::SetSessionActive { active: false });
    // the foreign outer flow tears the locked target down once the dialogue
    // UI is gone
    stage.dispatch(WorldCall::SetLockedTarget { target: None });

    stage.finish(ScenarioSlug::SeatedDialogue)
}

fn chair_removed(settings: &OverlaySettings) -> ScenarioRun {
    let mut stage = Stage::new(settings);
    let chair = stage.world.add_seat("cafe chair");
    let clerk = stage.world.add_citizen("clerk", true);
    let player = stage.world.player();

    stage.dispatch(WorldCall::SetLockedTarget {
        target: Some(chair),
    });
    stage.dispatch(WorldCall::BeginInteraction {
        actor: player,
        target: clerk,
    });
    stage.world.destroy(chair);
    stage.dispatch(WorldCall::SetSessionActive { active: false });
    stage.dispatch(WorldCall::SetLockedTarget { target: None });

    stage.finish(ScenarioSlug::ChairRemoved)
}

fn stand_up(settings: &OverlaySettings) -> ScenarioRun {
    let mut stage = Stage::new(settings);
    let chair = stage.world.add_seat("cafe chair");
    let clerk = stage.world.add_citizen("clerk", true);
    let player = stage.world.player();

    stage.dispatch(WorldCall::SetLockedTarget {
        target: Some(chair),
    });
    stage.dispatch(WorldCall::BeginInteraction {
        actor: player,
        target: clerk,
    });
    stage.dispatch(WorldCall::SetLockedTarget { target: None });
    stage.dispatch(WorldCall::SetSessionActive { active: false });

    stage.finish(ScenarioSlug::StandUp)
}

fn call_delay(settings: &OverlaySettings) -> ScenarioRun {
    let mut stage = Stage::new(settings);
    let job = stage.world.add_job();

    stage.dispatch(WorldCall::ObjectiveTick { job });
    stage.world.advance_clock(1.0);
    stage.dispatch(WorldCall::ObjectiveTick { job });

    stage.finish(ScenarioSlug::CallDelay)
}

#[cfg(test)]
mod tests {
    use super::{run, ScenarioSlug};
    use crate::settings::OverlaySettings;
    use crate::world::{Pose, WorldSeam};
    use overlay_hooks::{ObjectId, OverridePhase};

    // every scripted scenario creates its seat first
    const SEAT: ObjectId = ObjectId(1);

    fn event_index(events: &[String], needle: &str) -> Option<usize> {
        events.iter().position(|event| event.contains(needle))
    }

    #[test]
    fn every_slug_parses_its_own_label() {
        for slug in ScenarioSlug::ALL {
            assert_eq!(ScenarioSlug::parse(slug.label()).unwrap(), slug);
        }
        assert!(ScenarioSlug::parse("sit-and-spin").is_err());
    }

    #[test]
    fn seated_dialogue_walks_the_full_state_machine() {
        let run = run(ScenarioSlug::SeatedDialogue, &OverlaySettings::default());
        assert_eq!(run.final_phase(), OverridePhase::Idle);
        assert!(run.session.anchor_consistent());

        let events = run.session.journal().events();
        let activate = event_index(events, "session.activate").expect("activated");
        let begin = event_index(events, "session.restore.begin").expect("restore began");
        let absorb = event_index(events, "session.restore.absorb").expect("clear absorbed");
        let finish = event_index(events, "session.restore.finish").expect("restore finished");
        assert!(activate < begin && begin < absorb && absorb < finish);

        assert!(run.session.journal().count("hook.veto") >= 2);
        assert_eq!(run.session.journal().count("session.reset"), 0);

        let player = run.world.player();
        let slot = run.world.usage_slot_of(SEAT).expect("seat keeps its slot");
        assert_eq!(run.world.locked_target(), Some(SEAT));
        assert_eq!(run.world.slot_user(slot), Some(player));
        assert_eq!(run.world.pose(player), Pose::Seated);
    }

    #[test]
    fn chair_removed_resets_without_restoring() {
        let run = run(ScenarioSlug::ChairRemoved, &OverlaySettings::default());
        assert_eq!(run.final_phase(), OverridePhase::Idle);
        let events = run.session.journal().events();
        assert!(event_index(events, "session.reset anchor-gone").is_some());
        assert!(event_index(events, "session.restore.begin").is_none());
        assert!(event_index(events, "hook.seat.rebind").is_none());
        assert_eq!(run.world.pose(run.world.player()), Pose::Standing);
    }

    #[test]
    fn stand_up_releases_without_restoring() {
        let run = run(ScenarioSlug::StandUp, &OverlaySettings::default());
        assert_eq!(run.final_phase(), OverridePhase::Idle);
        let events = run.session.journal().events();
        assert!(event_index(events, "session.release").is_some());
        assert!(event_index(events, "session.restore.begin").is_none());
        assert_eq!(run.world.locked_target(), None);
        assert_eq!(run.world.pose(run.world.player()), Pose::Standing);
    }

    #[test]
    fn call_delay_adjusts_exactly_once() {
        let run = run(ScenarioSlug::CallDelay, &OverlaySettings::default());
        assert_eq!(run.final_phase(), OverridePhase::Idle);
        assert_eq!(run.session.journal().count("hook.call_delay.adjust"), 1);
    }

    #[test]
    fn disabled_groups_register_no_handlers() {
        let settings = OverlaySettings {
            seat_reconciliation: false,
            call_delay: false,
            action_promotion: false,
            ..OverlaySettings::default()
        };
        let run = run(ScenarioSlug::SeatedDialogue, &settings);
        assert_eq!(run.final_phase(), OverridePhase::Idle);
        assert_eq!(run.session.journal().count("hook.veto"), 0);
        assert_eq!(run.session.journal().count("session.activate"), 0);
    }
}
