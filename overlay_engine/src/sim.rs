use std::collections::BTreeMap;

use overlay_hooks::{ActorId, AnchorProbe, ExtensionPoint, ForeignHost, HookCtx, ObjectId, SlotId};

use crate::world::{
    ActionEntry, ActionKey, ActionKind, JobId, Pose, TransformPreset, WorldCall, WorldSeam,
};

#[derive(Debug, Clone, Copy)]
struct Citizen {
    conscious: bool,
    engaged: bool,
}

#[derive(Debug, Clone)]
struct SimObject {
    name: &'static str,
    citizen: Option<Citizen>,
    slot: Option<SlotId>,
    actions: BTreeMap<ActionKey, ActionEntry>,
}

#[derive(Debug, Clone, Copy, Default)]
struct SlotState {
    user: Option<ActorId>,
}

#[derive(Debug, Clone, Copy)]
struct SimJob {
    accepted: bool,
    call_at: Option<f64>,
}

/// Scripted double of the foreign simulation. It reproduces the foreign
/// behavior the overlay patches around, including the disengage path that
/// hits whatever the player is currently bound to when the locked-in target
/// switches, and routes the internal sub-calls of compound operations back
/// through the registry, so nested interception happens exactly where it
/// would in the live host.
pub struct SimWorld {
    player: ActorId,
    clock_minutes: f64,
    next_object: u32,
    next_slot: u32,
    next_job: u32,
    objects: BTreeMap<ObjectId, SimObject>,
    slots: BTreeMap<SlotId, SlotState>,
    binding: Option<ObjectId>,
    locked: Option<ObjectId>,
    session_active: bool,
    poses: BTreeMap<ActorId, Pose>,
    jobs: BTreeMap<JobId, SimJob>,
}

impl SimWorld {
    pub fn new() -> Self {
        let player = ActorId(1);
        let mut poses = BTreeMap::new();
        poses.insert(player, Pose::Standing);
        SimWorld {
            player,
            clock_minutes: 0.0,
            next_object: 1,
            next_slot: 1,
            next_job: 1,
            objects: BTreeMap::new(),
            slots: BTreeMap::new(),
            binding: None,
            locked: None,
            session_active: false,
            poses,
            jobs: BTreeMap::new(),
        }
    }

    /// Add a sittable interactable with one usage slot.
    pub fn add_seat(&mut self, name: &'static str) -> ObjectId {
        let slot = SlotId(self.next_slot);
        self.next_slot += 1;
        self.slots.insert(slot, SlotState::default());
        self.add_object(SimObject {
            name,
            citizen: None,
            slot: Some(slot),
            actions: BTreeMap::new(),
        })
    }

    /// Add a citizen interactable (an AI-driven actor).
    pub fn add_citizen(&mut self, name: &'static str, conscious: bool) -> ObjectId {
        self.add_object(SimObject {
            name,
            citizen: Some(Citizen {
                conscious,
                engaged: false,
            }),
            slot: None,
            actions: BTreeMap::new(),
        })
    }

    pub fn add_job(&mut self) -> JobId {
        let job = JobId(self.next_job);
        self.next_job += 1;
        self.jobs.insert(
            job,
            SimJob {
                accepted: true,
                call_at: None,
            },
        );
        job
    }

    /// External invalidation: the foreign system destroyed the object. Its
    /// usage slot disappears with it.
    pub fn destroy(&mut self, object: ObjectId) {
        if let Some(removed) = self.objects.remove(&object) {
            if let Some(slot) = removed.slot {
                self.slots.remove(&slot);
            }
        }
    }

    pub fn advance_clock(&mut self, minutes: f64) {
        self.clock_minutes += minutes;
    }

    pub fn engaged(&self, object: ObjectId) -> bool {
        self.objects
            .get(&object)
            .and_then(|obj| obj.citizen)
            .map(|citizen| citizen.engaged)
            .unwrap_or(false)
    }

    pub fn object_name(&self, object: ObjectId) -> Option<&'static str> {
        self.objects.get(&object).map(|obj| obj.name)
    }

    pub fn action_entry(&self, object: ObjectId, key: ActionKey) -> Option<ActionEntry> {
        self.objects
            .get(&object)
            .and_then(|obj| obj.actions.get(&key))
            .copied()
    }

    fn add_object(&mut self, object: SimObject) -> ObjectId {
        let id = ObjectId(self.next_object);
        self.next_object += 1;
        self.objects.insert(id, object);
        id
    }

    fn set_engaged(&mut self, object: ObjectId, engaged: bool) {
        if let Some(citizen) = self
            .objects
            .get_mut(&object)
            .and_then(|obj| obj.citizen.as_mut())
        {
            citizen.engaged = engaged;
        }
    }

    fn disengage_all(&mut self) -> Vec<ObjectId> {
        let mut released = Vec::new();
        for (id, object) in self.objects.iter_mut() {
            if let Some(citizen) = object.citizen.as_mut() {
                if citizen.engaged {
                    citizen.engaged = false;
                    released.push(*id);
                }
            }
        }
        released
    }
}

impl Default for SimWorld {
    fn default() -> Self {
        Self::new()
    }
}

impl AnchorProbe for SimWorld {
    fn anchor_alive(&self, id: ObjectId) -> bool {
        self.objects.contains_key(&id)
    }
}

impl ForeignHost for SimWorld {
    type Call = WorldCall;

    fn point_of(call: &WorldCall) -> ExtensionPoint {
        call.point()
    }

    fn apply(ctx: &mut HookCtx<'_, Self>, call: &WorldCall) {
        match call {
            WorldCall::BeginInteraction { actor, target } => {
                // a refreshed action table gates the dialogue: no offered
                // talk action, no conversation
                let talkable = ctx
                    .host
                    .find_action(*target, ActionKind::Talk)
                    .and_then(|key| ctx.host.action_entry(*target, key))
                    .map_or(true, |entry| entry.enabled && entry.display);
                if !talkable {
                    ctx.journal()
                        .log(format!("world.talk.unavailable object:{target}"));
                    return;
                }
                if ctx.host.objects.get(target).map_or(false, |obj| obj.citizen.is_some()) {
                    ctx.host.set_engaged(*target, true);
                    ctx.journal().log(format!("world.engage object:{target}"));
                }
                ctx.dispatch(&WorldCall::SetBinding {
                    actor: *actor,
                    target: Some(*target),
                });
                ctx.dispatch(&WorldCall::SetLockedTarget {
                    target: Some(*target),
                });
                ctx.dispatch(&WorldCall::SetSessionActive { active: true });
            }
            WorldCall::SetBinding { target, .. } => {
                ctx.host.binding = *target;
                match target {
                    Some(object) => ctx.journal().log(format!("world.bind object:{object}")),
                    None => ctx.journal().log("world.bind none"),
                }
            }
            WorldCall::SetSlotUser { slot, user } => {
                let known = match ctx.host.slots.get_mut(slot) {
                    Some(state) => {
                        state.user = *user;
                        true
                    }
                    None => false,
                };
                if known {
                    match user {
                        Some(actor) => ctx
                            .journal()
                            .log(format!("world.slot.set slot:{slot} actor:{actor}")),
                        None => ctx.journal().log(format!("world.slot.clear slot:{slot}")),
                    }
                }
            }
            WorldCall::SetLockedTarget { target } => {
                // The disengage path hits whatever the player is currently
                // bound to. Switching *to* a citizen with the binding already
                // pointed at them clears that citizen; that is the bug the
                // overlay redirects around.
                if let Some(bound) = ctx.host.binding {
                    if ctx.host.engaged(bound) {
                        ctx.host.set_engaged(bound, false);
                        ctx.journal().log(format!("world.disengage object:{bound}"));
                    }
                }
                let prev = ctx.host.locked;
                if prev != *target {
                    if let Some(previous) = prev {
                        if let Some(slot) = ctx.host.usage_slot_of(previous) {
                            ctx.dispatch(&WorldCall::SetSlotUser { slot, user: None });
                        }
                    }
                }
                ctx.host.locked = *target;
                let player = ctx.host.player;
                match *target {
                    Some(next) => {
                        ctx.dispatch(&WorldCall::SetBinding {
                            actor: player,
                            target: Some(next),
                        });
                        if let Some(slot) = ctx.host.usage_slot_of(next) {
                            ctx.dispatch(&WorldCall::SetSlotUser {
                                slot,
                                user: Some(player),
                            });
                            ctx.dispatch(&WorldCall::EnterTransform {
                                actor: player,
                                preset: TransformPreset::SitDown,
                            });
                        } else {
                            ctx.dispatch(&WorldCall::EnterTransform {
                                actor: player,
                                preset: TransformPreset::StandAndFace,
                            });
                        }
                    }
                    None => {
                        if let Some(bound) = ctx.host.binding {
                            if let Some(slot) = ctx.host.usage_slot_of(bound) {
                                ctx.dispatch(&WorldCall::SetSlotUser { slot, user: None });
                            }
                        }
                        ctx.dispatch(&WorldCall::SetBinding {
                            actor: player,
                            target: None,
                        });
                        ctx.dispatch(&WorldCall::ExitTransform { actor: player });
                    }
                }
            }
            WorldCall::EnterTransform { actor, preset } => {
                let pose = match preset {
                    TransformPreset::SitDown => Pose::Seated,
                    TransformPreset::StandAndFace => Pose::Standing,
                };
                ctx.host.poses.insert(*actor, pose);
                ctx.journal()
                    .log(format!("world.transform.enter {}", preset.label()));
            }
            WorldCall::ExitTransform { actor } => {
                ctx.host.poses.insert(*actor, Pose::Standing);
                ctx.journal().log("world.transform.exit");
            }
            WorldCall::SetSessionActive { active } => {
                ctx.host.session_active = *active;
                if *active {
                    ctx.journal().log("world.dialogue on");
                } else {
                    ctx.journal().log("world.dialogue off");
                    for released in ctx.host.disengage_all() {
                        ctx.journal()
                            .log(format!("world.disengage object:{released}"));
                    }
                }
            }
            WorldCall::ObjectiveTick { job } => {
                let clock = ctx.host.clock_minutes;
                let mut scheduled = None;
                if let Some(state) = ctx.host.jobs.get_mut(job) {
                    if state.accepted && state.call_at.is_none() {
                        // foreign default: the phone rings a few minutes after
                        // the job is accepted
                        let at = clock + 5.0;
                        state.call_at = Some(at);
                        scheduled = Some(at);
                    }
                }
                if let Some(at) = scheduled {
                    ctx.journal()
                        .log(format!("world.job.call job:{job} at:{at:.1}"));
                }
            }
            WorldCall::RefreshActions { object } => {
                let locked_in = ctx.host.locked.is_some();
                let known = match ctx.host.objects.get_mut(object) {
                    Some(state) => {
                        if state.citizen.is_some() {
                            state.actions = BTreeMap::from([
                                (
                                    ActionKey::Slot(0),
                                    ActionEntry {
                                        kind: ActionKind::Talk,
                                        // locked-in interactions block other
                                        // locked-in interactions
                                        enabled: !locked_in,
                                        display: !locked_in,
                                    },
                                ),
                                (
                                    ActionKey::Slot(1),
                                    ActionEntry {
                                        kind: ActionKind::Inspect,
                                        enabled: true,
                                        display: true,
                                    },
                                ),
                            ]);
                        } else {
                            state.actions.clear();
                        }
                        true
                    }
                    None => false,
                };
                if known {
                    ctx.journal()
                        .log(format!("world.actions.refresh object:{object}"));
                }
            }
        }
    }
}

impl WorldSeam for SimWorld {
    fn player(&self) -> ActorId {
        self.player
    }

    fn player_binding(&self) -> Option<ObjectId> {
        self.binding
    }

    fn locked_target(&self) -> Option<ObjectId> {
        self.locked
    }

    fn usage_slot_of(&self, object: ObjectId) -> Option<SlotId> {
        self.objects.get(&object).and_then(|obj| obj.slot)
    }

    fn slot_user(&self, slot: SlotId) -> Option<ActorId> {
        self.slots.get(&slot).and_then(|state| state.user)
    }

    fn is_actor(&self, object: ObjectId) -> bool {
        self.objects
            .get(&object)
            .map_or(false, |obj| obj.citizen.is_some())
    }

    fn is_conscious(&self, object: ObjectId) -> bool {
        self.objects
            .get(&object)
            .and_then(|obj| obj.citizen)
            .map_or(false, |citizen| citizen.conscious)
    }

    fn pose(&self, actor: ActorId) -> Pose {
        self.poses.get(&actor).copied().unwrap_or(Pose::Standing)
    }

    fn session_active(&self) -> bool {
        self.session_active
    }

    fn clock_minutes(&self) -> f64 {
        self.clock_minutes
    }

    fn scheduled_call(&self, job: JobId) -> Option<f64> {
        self.jobs.get(&job).and_then(|state| state.call_at)
    }

    fn set_scheduled_call(&mut self, job: JobId, at_minutes: f64) {
        if let Some(state) = self.jobs.get_mut(&job) {
            state.call_at = Some(at_minutes);
        }
    }

    fn force_locked_target(&mut self, target: Option<ObjectId>) {
        self.locked = target;
    }

    fn find_action(&self, object: ObjectId, kind: ActionKind) -> Option<ActionKey> {
        self.objects.get(&object).and_then(|obj| {
            obj.actions
                .iter()
                .find(|(_, entry)| entry.kind == kind)
                .map(|(key, _)| *key)
        })
    }

    fn enable_action(&mut self, object: ObjectId, key: ActionKey) {
        if let Some(entry) = self
            .objects
            .get_mut(&object)
            .and_then(|obj| obj.actions.get_mut(&key))
        {
            entry.enabled = true;
            entry.display = true;
        }
    }

    fn assign_action(&mut self, object: ObjectId, dest: ActionKey, source: ActionKey) {
        if let Some(obj) = self.objects.get_mut(&object) {
            if let Some(entry) = obj.actions.get(&source).copied() {
                obj.actions.insert(dest, entry);
            }
        }
    }
}
