pub mod handle;
pub mod journal;
pub mod point;
pub mod registry;
pub mod session;

pub use handle::{ActorId, ObjectId, SlotId};
pub use journal::Journal;
pub use point::ExtensionPoint;
pub use registry::{ForeignHost, HookCtx, InterceptRegistry, Outcome, Verdict};
pub use session::{AnchorProbe, OverridePhase, OverrideSession};
