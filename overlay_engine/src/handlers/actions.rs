//! Promotes talk and inspect on a conscious citizen while the player is
//! seated. The foreign refresh disables talk during any locked-in
//! interaction; re-enabling it here is what makes starting a dialogue from a
//! chair possible at all.

use anyhow::Result;
use overlay_hooks::{HookCtx, InterceptRegistry, Outcome};

use crate::world::{points, ActionKey, ActionKind, WorldCall, WorldSeam};

pub fn install<W: WorldSeam + 'static>(hooks: &mut InterceptRegistry<W>) {
    hooks.register_after(points::REFRESH_ACTIONS, "actions.promote", promote);
}

fn promote<W: WorldSeam>(
    ctx: &mut HookCtx<'_, W>,
    call: &WorldCall,
    _outcome: Outcome,
) -> Result<()> {
    let WorldCall::RefreshActions { object } = call else {
        return Ok(());
    };
    let seated = ctx
        .host
        .locked_target()
        .and_then(|target| ctx.host.usage_slot_of(target))
        .is_some();
    if !seated {
        return Ok(());
    }
    if !ctx.host.is_actor(*object) || !ctx.host.is_conscious(*object) {
        return Ok(());
    }
    let Some(talk) = ctx.host.find_action(*object, ActionKind::Talk) else {
        return Ok(());
    };
    ctx.host.enable_action(*object, talk);
    ctx.host.assign_action(*object, ActionKey::Primary, talk);
    if let Some(inspect) = ctx.host.find_action(*object, ActionKind::Inspect) {
        ctx.host.enable_action(*object, inspect);
        ctx.host.assign_action(*object, ActionKey::Secondary, inspect);
    }
    ctx.journal()
        .log(format!("hook.actions.promote object:{object}"));
    Ok(())
}
