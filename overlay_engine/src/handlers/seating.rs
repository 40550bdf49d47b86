//! Keeps the player seated across a dialogue the foreign system insists on
//! standing up for.
//!
//! Sitting and talking are both locked-in interactions and the foreign system
//! treats them as mutually exclusive: when talk claims the locked-in target,
//! it breaks the seat binding, clears the usage slot, and stands the player
//! up. This group lets talk claim the target (the dialogue UI needs that)
//! while protecting the seat's slot and pose for the whole override window,
//! then restores the seat as the locked-in target once the dialogue closes.

use anyhow::Result;
use overlay_hooks::{HookCtx, InterceptRegistry, Outcome, Verdict};

use crate::world::{points, WorldCall, WorldSeam};

pub fn install<W: WorldSeam + 'static>(hooks: &mut InterceptRegistry<W>) {
    hooks.register_before(points::BEGIN_INTERACTION, "seat.entry", entry);
    hooks.register_after(points::BEGIN_INTERACTION, "seat.exit_restore", exit_restore);
    hooks.register_before(points::SET_SLOT_USER, "seat.slot_guard", slot_guard);
    hooks.register_before(points::SET_LOCKED_TARGET, "seat.lock_guard", lock_guard);
    hooks.register_after(points::SET_LOCKED_TARGET, "seat.lock_repair", lock_repair);
    hooks.register_before(points::ENTER_TRANSFORM, "seat.transform_guard", transform_guard);
    hooks.register_before(points::EXIT_TRANSFORM, "seat.return_guard", transform_guard);
    hooks.register_after(points::SET_SESSION_ACTIVE, "seat.completion", completion);
}

/// Before the dialogue entry call: if the player is locked into a
/// slot-bearing interactable, capture it as the anchor and open the override
/// window. A leftover restoration from an incomplete cycle is dropped first.
fn entry<W: WorldSeam>(ctx: &mut HookCtx<'_, W>, _call: &WorldCall) -> Result<Verdict> {
    ctx.session.clear_stale_restore();
    let seat = ctx
        .host
        .locked_target()
        .filter(|target| ctx.host.usage_slot_of(*target).is_some());
    if let Some(seat) = seat {
        ctx.session.activate(seat);
    }
    Ok(Verdict::Allow)
}

/// After the dialogue entry call: the foreign side has re-pointed the binding
/// at the dialogue partner; put it back on the seat and re-occupy the slot so
/// the player stays physically seated.
fn exit_restore<W: WorldSeam>(
    ctx: &mut HookCtx<'_, W>,
    _call: &WorldCall,
    _outcome: Outcome,
) -> Result<()> {
    if !ctx.session.is_active() {
        return Ok(());
    }
    let Some(anchor) = ctx.session.anchor() else {
        return Ok(());
    };
    let player = ctx.host.player();
    ctx.journal().log(format!("hook.seat.restore object:{anchor}"));
    ctx.dispatch(&WorldCall::SetBinding {
        actor: player,
        target: Some(anchor),
    });
    if let Some(slot) = ctx.host.usage_slot_of(anchor) {
        ctx.dispatch(&WorldCall::SetSlotUser {
            slot,
            user: Some(player),
        });
    }
    Ok(())
}

/// Veto any clear of the protected usage slot while the window is open.
/// Occupying writes and unrelated slots pass through.
fn slot_guard<W: WorldSeam>(ctx: &mut HookCtx<'_, W>, call: &WorldCall) -> Result<Verdict> {
    let WorldCall::SetSlotUser { slot, user } = call else {
        return Ok(Verdict::Allow);
    };
    if user.is_some() {
        return Ok(Verdict::Allow);
    }
    if !(ctx.session.is_active() || ctx.session.is_restoring()) {
        return Ok(Verdict::Allow);
    }
    let Some(anchor) = ctx.session.anchor() else {
        return Ok(Verdict::Allow);
    };
    if ctx.host.usage_slot_of(anchor) == Some(*slot) {
        return Ok(Verdict::Veto);
    }
    Ok(Verdict::Allow)
}

/// The locked-target switch is where the foreign bugs live. Switching from
/// the seat to a dialogue partner runs a disengage pass against whatever the
/// player is bound to, which at that moment is the partner being switched
/// *to*, so the binding is redirected to the anchor first. A `None` while
/// restoring is the one forced clear the window absorbs; a `None` while
/// merely active is the player voluntarily standing up.
fn lock_guard<W: WorldSeam>(ctx: &mut HookCtx<'_, W>, call: &WorldCall) -> Result<Verdict> {
    let WorldCall::SetLockedTarget { target } = call else {
        return Ok(Verdict::Allow);
    };
    let Some(anchor) = ctx.session.anchor() else {
        return Ok(Verdict::Allow);
    };
    match target {
        Some(next) => {
            if ctx.session.is_active()
                && ctx.host.is_actor(*next)
                && ctx.host.locked_target() == Some(anchor)
            {
                let player = ctx.host.player();
                ctx.journal()
                    .log(format!("hook.seat.redirect object:{anchor}"));
                ctx.dispatch(&WorldCall::SetBinding {
                    actor: player,
                    target: Some(anchor),
                });
            }
            Ok(Verdict::Allow)
        }
        None => {
            if ctx.session.is_restoring() {
                ctx.session.note_absorbed_clear();
                return Ok(Verdict::Veto);
            }
            ctx.session.release();
            Ok(Verdict::Allow)
        }
    }
}

/// After a locked-target call during restoration: if the outer call overwrote
/// the just-restored target, re-apply it once (raw, to avoid recursing into
/// the call being corrected) and close the window.
fn lock_repair<W: WorldSeam>(
    ctx: &mut HookCtx<'_, W>,
    call: &WorldCall,
    _outcome: Outcome,
) -> Result<()> {
    if !matches!(call, WorldCall::SetLockedTarget { .. }) {
        return Ok(());
    }
    if !ctx.session.is_restoring() || !ctx.session.absorbed_clear() {
        return Ok(());
    }
    let Some(anchor) = ctx.session.anchor() else {
        return Ok(());
    };
    if ctx.host.locked_target() != Some(anchor) {
        ctx.journal()
            .log(format!("hook.seat.reapply object:{anchor}"));
        ctx.host.force_locked_target(Some(anchor));
        let player = ctx.host.player();
        ctx.dispatch(&WorldCall::SetBinding {
            actor: player,
            target: Some(anchor),
        });
        if let Some(slot) = ctx.host.usage_slot_of(anchor) {
            ctx.dispatch(&WorldCall::SetSlotUser {
                slot,
                user: Some(player),
            });
        }
        ctx.dispatch(&WorldCall::RefreshActions { object: anchor });
    }
    ctx.session.finish_restore();
    Ok(())
}

/// No stand-up or sit-down transitions while the window is open; the pose
/// must not be disturbed.
fn transform_guard<W: WorldSeam>(ctx: &mut HookCtx<'_, W>, _call: &WorldCall) -> Result<Verdict> {
    if ctx.session.is_active() || ctx.session.is_restoring() {
        return Ok(Verdict::Veto);
    }
    Ok(Verdict::Allow)
}

/// After the dialogue UI closes: start restoring and re-assert the seat as
/// the locked-in target through the normal foreign call, so every guard in
/// this group sees the re-assertion.
fn completion<W: WorldSeam>(
    ctx: &mut HookCtx<'_, W>,
    call: &WorldCall,
    _outcome: Outcome,
) -> Result<()> {
    let WorldCall::SetSessionActive { active } = call else {
        return Ok(());
    };
    if *active || !ctx.session.is_active() {
        return Ok(());
    }
    let Some(anchor) = ctx.session.anchor() else {
        return Ok(());
    };
    ctx.session.begin_restore();
    ctx.journal().log(format!("hook.seat.rebind object:{anchor}"));
    ctx.dispatch(&WorldCall::SetLockedTarget {
        target: Some(anchor),
    });
    Ok(())
}
