//! Stretches the delay between accepting a side job and the follow-up phone
//! call. The foreign objective loop arms the call a few minutes out; the
//! after-handler rewrites the schedule into the configured window so the
//! player has time to cross the city organically.

use std::cell::RefCell;
use std::rc::Rc;

use rand::RngExt;

use overlay_hooks::{InterceptRegistry, Verdict};

use crate::settings::OverlaySettings;
use crate::world::{points, WorldCall, WorldSeam};

pub fn install<W: WorldSeam + 'static>(
    hooks: &mut InterceptRegistry<W>,
    settings: &OverlaySettings,
) {
    install_with_sampler(
        hooks,
        settings.call_delay_minimum_minutes,
        settings.call_delay_maximum_minutes,
        |minimum, maximum| rand::rng().random_range(minimum..=maximum),
    );
}

/// Same wiring with an injectable delay sampler, for deterministic callers.
pub fn install_with_sampler<W, F>(
    hooks: &mut InterceptRegistry<W>,
    minimum: i64,
    maximum: i64,
    sampler: F,
) where
    W: WorldSeam + 'static,
    F: Fn(i64, i64) -> i64 + 'static,
{
    // snapshot stack rather than a single cell, so before/after stay paired
    // even if a tick re-enters the objective loop
    let pending: Rc<RefCell<Vec<Option<f64>>>> = Rc::new(RefCell::new(Vec::new()));

    let snapshots = pending.clone();
    hooks.register_before(points::OBJECTIVE_TICK, "call_delay.snapshot", move |ctx, call| {
        if let WorldCall::ObjectiveTick { job } = call {
            snapshots.borrow_mut().push(ctx.host.scheduled_call(*job));
        }
        Ok(Verdict::Allow)
    });

    hooks.register_after(
        points::OBJECTIVE_TICK,
        "call_delay.adjust",
        move |ctx, call, _outcome| {
            let WorldCall::ObjectiveTick { job } = call else {
                return Ok(());
            };
            let previous = pending.borrow_mut().pop().flatten();
            let current = ctx.host.scheduled_call(*job);
            if current.is_none() || current == previous {
                return Ok(());
            }
            // the loop just armed the call; replace the short foreign default
            let delay = sampler(minimum, maximum);
            let at = ctx.host.clock_minutes() + delay as f64;
            ctx.host.set_scheduled_call(*job, at);
            ctx.journal()
                .log(format!("hook.call_delay.adjust job:{job} +{delay}m"));
            ctx.journal().bump("hook.call_delay.adjust");
            Ok(())
        },
    );
}
