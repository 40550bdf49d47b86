use std::collections::HashMap;
use std::fmt;

use anyhow::Result;

use crate::journal::Journal;
use crate::point::ExtensionPoint;
use crate::session::{AnchorProbe, OverrideSession};

/// The foreign system, seen through the narrow seam the overlay needs: a call
/// type covering the intercepted operations, the mapping from a call to its
/// extension point, and the original behavior. `apply` receives the dispatch
/// context so compound foreign operations can re-enter the registry for their
/// internal sub-calls; that is where reentrancy comes from.
pub trait ForeignHost: AnchorProbe + Sized {
    type Call: fmt::Debug;

    fn point_of(call: &Self::Call) -> ExtensionPoint;

    fn apply(ctx: &mut HookCtx<'_, Self>, call: &Self::Call);
}

/// Return of a `Before` handler: allow the original operation or veto it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Allow,
    Veto,
}

/// What happened to the original operation during a dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Applied,
    Vetoed,
}

/// Everything a handler may touch: the registry (for nested dispatch), the
/// foreign host, and the shared override session.
pub struct HookCtx<'a, H: ForeignHost> {
    pub registry: &'a InterceptRegistry<H>,
    pub host: &'a mut H,
    pub session: &'a mut OverrideSession,
}

impl<'a, H: ForeignHost> HookCtx<'a, H> {
    /// Dispatch a nested call through the full two-phase protocol. Plain
    /// recursion; handlers at any depth see the current session state.
    pub fn dispatch(&mut self, call: &H::Call) -> Outcome {
        self.registry.dispatch(self.host, self.session, call)
    }

    pub fn journal(&mut self) -> &mut Journal {
        self.session.journal_mut()
    }
}

type BeforeFn<H> =
    dyn for<'a> Fn(&mut HookCtx<'a, H>, &<H as ForeignHost>::Call) -> Result<Verdict>;
type AfterFn<H> =
    dyn for<'a> Fn(&mut HookCtx<'a, H>, &<H as ForeignHost>::Call, Outcome) -> Result<()>;

struct NamedHook<F: ?Sized> {
    name: &'static str,
    run: Box<F>,
}

struct HookChain<H: ForeignHost> {
    before: Vec<NamedHook<BeforeFn<H>>>,
    after: Vec<NamedHook<AfterFn<H>>>,
}

impl<H: ForeignHost> HookChain<H> {
    fn new() -> Self {
        HookChain {
            before: Vec::new(),
            after: Vec::new(),
        }
    }
}

/// Maps extension points to ordered before/after handler lists and drives the
/// two-phase call protocol. Registration order is execution order; the
/// registry holds no state beyond the lists themselves.
pub struct InterceptRegistry<H: ForeignHost> {
    chains: HashMap<ExtensionPoint, HookChain<H>>,
}

impl<H: ForeignHost> Default for InterceptRegistry<H> {
    fn default() -> Self {
        Self::new()
    }
}

impl<H: ForeignHost> InterceptRegistry<H> {
    pub fn new() -> Self {
        InterceptRegistry {
            chains: HashMap::new(),
        }
    }

    pub fn register_before<F>(&mut self, point: ExtensionPoint, name: &'static str, hook: F)
    where
        F: for<'a> Fn(&mut HookCtx<'a, H>, &H::Call) -> Result<Verdict> + 'static,
    {
        self.chain(point).before.push(NamedHook {
            name,
            run: Box::new(hook),
        });
    }

    pub fn register_after<F>(&mut self, point: ExtensionPoint, name: &'static str, hook: F)
    where
        F: for<'a> Fn(&mut HookCtx<'a, H>, &H::Call, Outcome) -> Result<()> + 'static,
    {
        self.chain(point).after.push(NamedHook {
            name,
            run: Box::new(hook),
        });
    }

    /// Total number of registered handlers across every point.
    pub fn hook_count(&self) -> usize {
        self.chains
            .values()
            .map(|chain| chain.before.len() + chain.after.len())
            .sum()
    }

    /// (before, after) handler counts at one point.
    pub fn hooks_at(&self, point: ExtensionPoint) -> (usize, usize) {
        match self.chains.get(&point) {
            Some(chain) => (chain.before.len(), chain.after.len()),
            None => (0, 0),
        }
    }

    /// Run the two-phase protocol for one call:
    ///
    /// 1. Before handlers in registration order. The first `Veto` skips the
    ///    original operation and the remaining Before handlers.
    /// 2. The original foreign operation, unless vetoed.
    /// 3. After handlers in registration order, veto or not.
    ///
    /// The session anchor is revalidated before every handler invocation, and
    /// a handler `Err` is journaled and treated as declined (Before → allow,
    /// After → no-op), so one faulting handler can neither veto by accident
    /// nor starve the others of the safety check.
    pub fn dispatch(
        &self,
        host: &mut H,
        session: &mut OverrideSession,
        call: &H::Call,
    ) -> Outcome {
        let point = H::point_of(call);
        let mut vetoed = false;

        if let Some(chain) = self.chains.get(&point) {
            for hook in &chain.before {
                session.revalidate(&*host);
                let mut ctx = HookCtx {
                    registry: self,
                    host: &mut *host,
                    session: &mut *session,
                };
                match (hook.run)(&mut ctx, call) {
                    Ok(Verdict::Allow) => {}
                    Ok(Verdict::Veto) => {
                        session
                            .journal_mut()
                            .log(format!("hook.veto {point} {}", hook.name));
                        session.journal_mut().bump("hook.veto");
                        vetoed = true;
                        break;
                    }
                    Err(err) => {
                        session
                            .journal_mut()
                            .log(format!("hook.fault {point} {}: {err:#}", hook.name));
                        session.journal_mut().bump("hook.fault");
                    }
                }
            }
        }

        if !vetoed {
            let mut ctx = HookCtx {
                registry: self,
                host: &mut *host,
                session: &mut *session,
            };
            H::apply(&mut ctx, call);
        }

        let outcome = if vetoed {
            Outcome::Vetoed
        } else {
            Outcome::Applied
        };

        if let Some(chain) = self.chains.get(&point) {
            for hook in &chain.after {
                session.revalidate(&*host);
                let mut ctx = HookCtx {
                    registry: self,
                    host: &mut *host,
                    session: &mut *session,
                };
                if let Err(err) = (hook.run)(&mut ctx, call, outcome) {
                    session
                        .journal_mut()
                        .log(format!("hook.fault {point} {}: {err:#}", hook.name));
                    session.journal_mut().bump("hook.fault");
                }
            }
        }

        outcome
    }

    fn chain(&mut self, point: ExtensionPoint) -> &mut HookChain<H> {
        self.chains.entry(point).or_insert_with(HookChain::new)
    }
}

#[cfg(test)]
mod tests {
    use anyhow::bail;

    use super::{ForeignHost, HookCtx, InterceptRegistry, Outcome, Verdict};
    use crate::handle::ObjectId;
    use crate::point::ExtensionPoint;
    use crate::session::{AnchorProbe, OverrideSession};

    const PING: ExtensionPoint = ExtensionPoint::new("Toy", "Ping");
    const CHAIN: ExtensionPoint = ExtensionPoint::new("Toy", "Chain");
    const PONG: ExtensionPoint = ExtensionPoint::new("Toy", "Pong");

    #[derive(Default)]
    struct Toy {
        applied: Vec<&'static str>,
        dead: Vec<ObjectId>,
    }

    #[derive(Debug)]
    enum ToyCall {
        Ping,
        Chain,
        Pong,
    }

    impl AnchorProbe for Toy {
        fn anchor_alive(&self, id: ObjectId) -> bool {
            !self.dead.contains(&id)
        }
    }

    impl ForeignHost for Toy {
        type Call = ToyCall;

        fn point_of(call: &ToyCall) -> ExtensionPoint {
            match call {
                ToyCall::Ping => PING,
                ToyCall::Chain => CHAIN,
                ToyCall::Pong => PONG,
            }
        }

        fn apply(ctx: &mut HookCtx<'_, Self>, call: &ToyCall) {
            match call {
                ToyCall::Ping => ctx.host.applied.push("ping"),
                ToyCall::Chain => {
                    ctx.host.applied.push("chain");
                    ctx.dispatch(&ToyCall::Pong);
                }
                ToyCall::Pong => ctx.host.applied.push("pong"),
            }
        }
    }

    #[test]
    fn handlers_run_in_registration_order() {
        let mut hooks: InterceptRegistry<Toy> = InterceptRegistry::new();
        hooks.register_before(PING, "first", |ctx, _call| {
            ctx.journal().log("order.first");
            Ok(Verdict::Allow)
        });
        hooks.register_before(PING, "second", |ctx, _call| {
            ctx.journal().log("order.second");
            Ok(Verdict::Allow)
        });
        hooks.register_after(PING, "third", |ctx, _call, _outcome| {
            ctx.journal().log("order.third");
            Ok(())
        });

        let mut toy = Toy::default();
        let mut session = OverrideSession::new();
        let outcome = hooks.dispatch(&mut toy, &mut session, &ToyCall::Ping);

        assert_eq!(outcome, Outcome::Applied);
        assert_eq!(toy.applied, ["ping"]);
        assert_eq!(
            session.journal().events(),
            ["order.first", "order.second", "order.third"]
        );
    }

    #[test]
    fn veto_skips_original_and_remaining_befores_but_not_afters() {
        let mut hooks: InterceptRegistry<Toy> = InterceptRegistry::new();
        hooks.register_before(PING, "veto", |_ctx, _call| {
            Ok(Verdict::Veto)
        });
        hooks.register_before(PING, "late", |ctx, _call| {
            ctx.journal().log("late.ran");
            Ok(Verdict::Allow)
        });
        hooks.register_after(PING, "cleanup", |ctx, _call, outcome| {
            ctx.journal().log(format!("cleanup.ran {outcome:?}"));
            Ok(())
        });

        let mut toy = Toy::default();
        let mut session = OverrideSession::new();
        let outcome = hooks.dispatch(&mut toy, &mut session, &ToyCall::Ping);

        assert_eq!(outcome, Outcome::Vetoed);
        assert!(toy.applied.is_empty());
        assert_eq!(session.journal().count("hook.veto"), 1);
        let events = session.journal().events();
        assert!(!events.iter().any(|event| event == "late.ran"));
        assert!(events.iter().any(|event| event == "cleanup.ran Vetoed"));
    }

    #[test]
    fn faulting_before_handler_is_treated_as_allow() {
        let mut hooks: InterceptRegistry<Toy> = InterceptRegistry::new();
        hooks.register_before(PING, "broken", |_ctx, _call| {
            bail!("handler exploded")
        });
        hooks.register_before(PING, "healthy", |ctx, _call| {
            ctx.journal().log("healthy.ran");
            Ok(Verdict::Allow)
        });

        let mut toy = Toy::default();
        let mut session = OverrideSession::new();
        let outcome = hooks.dispatch(&mut toy, &mut session, &ToyCall::Ping);

        assert_eq!(outcome, Outcome::Applied);
        assert_eq!(toy.applied, ["ping"]);
        assert_eq!(session.journal().count("hook.fault"), 1);
        assert!(session
            .journal()
            .events()
            .iter()
            .any(|event| event == "healthy.ran"));
    }

    #[test]
    fn faulting_after_handler_does_not_stop_later_afters() {
        let mut hooks: InterceptRegistry<Toy> = InterceptRegistry::new();
        hooks.register_after(PING, "broken", |_ctx, _call, _outcome| {
            bail!("postfix exploded")
        });
        hooks.register_after(PING, "healthy", |ctx, _call, _outcome| {
            ctx.journal().log("healthy.after");
            Ok(())
        });

        let mut toy = Toy::default();
        let mut session = OverrideSession::new();
        hooks.dispatch(&mut toy, &mut session, &ToyCall::Ping);

        assert_eq!(session.journal().count("hook.fault"), 1);
        assert!(session
            .journal()
            .events()
            .iter()
            .any(|event| event == "healthy.after"));
    }

    #[test]
    fn nested_dispatch_runs_inner_handlers_on_the_same_stack() {
        let mut hooks: InterceptRegistry<Toy> = InterceptRegistry::new();
        hooks.register_before(PONG, "inner", |ctx, _call| {
            ctx.journal().log("inner.before");
            Ok(Verdict::Allow)
        });

        let mut toy = Toy::default();
        let mut session = OverrideSession::new();
        hooks.dispatch(&mut toy, &mut session, &ToyCall::Chain);

        assert_eq!(toy.applied, ["chain", "pong"]);
        assert_eq!(session.journal().events(), ["inner.before"]);
    }

    #[test]
    fn dead_anchor_is_reset_before_the_next_handler_runs() {
        const ANCHOR: ObjectId = ObjectId(3);

        let mut hooks: InterceptRegistry<Toy> = InterceptRegistry::new();
        hooks.register_before(PING, "observer", |ctx, _call| {
            let phase = ctx.session.phase();
            ctx.journal().log(format!("observed phase:{phase}"));
            Ok(Verdict::Allow)
        });

        let mut toy = Toy::default();
        let mut session = OverrideSession::new();
        session.activate(ANCHOR);
        toy.dead.push(ANCHOR);

        hooks.dispatch(&mut toy, &mut session, &ToyCall::Ping);

        assert!(session.is_idle());
        assert_eq!(session.anchor(), None);
        assert!(session
            .journal()
            .events()
            .iter()
            .any(|event| event == "observed phase:idle"));
        assert_eq!(session.journal().count("session.reset"), 1);
    }

    #[test]
    fn unhooked_points_still_apply() {
        let hooks: InterceptRegistry<Toy> = InterceptRegistry::new();
        let mut toy = Toy::default();
        let mut session = OverrideSession::new();
        let outcome = hooks.dispatch(&mut toy, &mut session, &ToyCall::Ping);
        assert_eq!(outcome, Outcome::Applied);
        assert_eq!(toy.applied, ["ping"]);
        assert_eq!(hooks.hook_count(), 0);
        assert_eq!(hooks.hooks_at(PING), (0, 0));
    }
}
