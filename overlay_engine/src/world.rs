use std::fmt;

use overlay_hooks::{ActorId, ExtensionPoint, ForeignHost, ObjectId, SlotId};

/// The call boundaries this overlay intercepts, named after the foreign types
/// that own them. Declared once; never extended at runtime.
pub mod points {
    use overlay_hooks::ExtensionPoint;

    pub const BEGIN_INTERACTION: ExtensionPoint =
        ExtensionPoint::new("NewAIController", "BeginInteraction");
    pub const SET_BINDING: ExtensionPoint = ExtensionPoint::new("Player", "SetBinding");
    pub const SET_SLOT_USER: ExtensionPoint = ExtensionPoint::new("UsagePoint", "SetSlotUser");
    pub const SET_LOCKED_TARGET: ExtensionPoint =
        ExtensionPoint::new("InteractionController", "SetLockedTarget");
    pub const ENTER_TRANSFORM: ExtensionPoint = ExtensionPoint::new("Player", "EnterTransform");
    pub const EXIT_TRANSFORM: ExtensionPoint = ExtensionPoint::new("Player", "ExitTransform");
    pub const SET_SESSION_ACTIVE: ExtensionPoint =
        ExtensionPoint::new("InteractionController", "SetSessionActive");
    pub const OBJECTIVE_TICK: ExtensionPoint = ExtensionPoint::new("SideJob", "ObjectiveTick");
    pub const REFRESH_ACTIONS: ExtensionPoint =
        ExtensionPoint::new("Interactable", "RefreshActions");
}

/// Handle to a side job in the foreign quest system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct JobId(pub u32);

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Player-controller transition presets the foreign system runs when locked-in
/// interactions begin.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransformPreset {
    SitDown,
    StandAndFace,
}

impl TransformPreset {
    pub fn label(self) -> &'static str {
        match self {
            TransformPreset::SitDown => "sit_down",
            TransformPreset::StandAndFace => "stand_and_face",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pose {
    Standing,
    Seated,
}

/// Binding slots in a foreign interactable's action table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ActionKey {
    Primary,
    Secondary,
    Slot(u8),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionKind {
    Talk,
    Inspect,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActionEntry {
    pub kind: ActionKind,
    pub enabled: bool,
    pub display: bool,
}

/// The closed set of intercepted foreign operations and their argument
/// shapes. Each variant maps to exactly one extension point.
#[derive(Debug, Clone, PartialEq)]
pub enum WorldCall {
    BeginInteraction { actor: ActorId, target: ObjectId },
    SetBinding { actor: ActorId, target: Option<ObjectId> },
    SetSlotUser { slot: SlotId, user: Option<ActorId> },
    SetLockedTarget { target: Option<ObjectId> },
    EnterTransform { actor: ActorId, preset: TransformPreset },
    ExitTransform { actor: ActorId },
    SetSessionActive { active: bool },
    ObjectiveTick { job: JobId },
    RefreshActions { object: ObjectId },
}

impl WorldCall {
    pub fn point(&self) -> ExtensionPoint {
        match self {
            WorldCall::BeginInteraction { .. } => points::BEGIN_INTERACTION,
            WorldCall::SetBinding { .. } => points::SET_BINDING,
            WorldCall::SetSlotUser { .. } => points::SET_SLOT_USER,
            WorldCall::SetLockedTarget { .. } => points::SET_LOCKED_TARGET,
            WorldCall::EnterTransform { .. } => points::ENTER_TRANSFORM,
            WorldCall::ExitTransform { .. } => points::EXIT_TRANSFORM,
            WorldCall::SetSessionActive { .. } => points::SET_SESSION_ACTIVE,
            WorldCall::ObjectiveTick { .. } => points::OBJECTIVE_TICK,
            WorldCall::RefreshActions { .. } => points::REFRESH_ACTIONS,
        }
    }
}

/// The narrow capability seam the reconciliation handlers consume. Handlers
/// never see the foreign type hierarchy, only these queries plus nested
/// dispatch of `WorldCall`s; anything implementing this (the scripted double,
/// or a live binding) can host the overlay.
pub trait WorldSeam: ForeignHost<Call = WorldCall> {
    fn player(&self) -> ActorId;
    fn player_binding(&self) -> Option<ObjectId>;
    fn locked_target(&self) -> Option<ObjectId>;
    fn usage_slot_of(&self, object: ObjectId) -> Option<SlotId>;
    fn slot_user(&self, slot: SlotId) -> Option<ActorId>;
    fn is_actor(&self, object: ObjectId) -> bool;
    fn is_conscious(&self, object: ObjectId) -> bool;
    fn pose(&self, actor: ActorId) -> Pose;
    fn session_active(&self) -> bool;
    fn clock_minutes(&self) -> f64;
    fn scheduled_call(&self, job: JobId) -> Option<f64>;
    fn set_scheduled_call(&mut self, job: JobId, at_minutes: f64);

    /// Raw write to the locked-target field, bypassing dispatch. Only the
    /// restoration repair path uses this, to avoid recursing into the very
    /// call it is correcting.
    fn force_locked_target(&mut self, target: Option<ObjectId>);

    fn find_action(&self, object: ObjectId, kind: ActionKind) -> Option<ActionKey>;
    fn enable_action(&mut self, object: ObjectId, key: ActionKey);
    fn assign_action(&mut self, object: ObjectId, dest: ActionKey, source: ActionKey);
}

#[cfg(test)]
mod tests {
    use super::{points, JobId, TransformPreset, WorldCall};
    use overlay_hooks::{ActorId, ObjectId};

    #[test]
    fn calls_map_to_their_points() {
        let call = WorldCall::BeginInteraction {
            actor: ActorId(1),
            target: ObjectId(2),
        };
        assert_eq!(call.point(), points::BEGIN_INTERACTION);
        assert_eq!(
            WorldCall::ObjectiveTick { job: JobId(4) }.point(),
            points::OBJECTIVE_TICK
        );
        assert_eq!(
            WorldCall::EnterTransform {
                actor: ActorId(1),
                preset: TransformPreset::SitDown,
            }
            .point(),
            points::ENTER_TRANSFORM
        );
    }
}
