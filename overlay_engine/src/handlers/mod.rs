pub mod actions;
pub mod call_delay;
pub mod seating;

use overlay_hooks::InterceptRegistry;

use crate::settings::OverlaySettings;
use crate::world::WorldSeam;

/// Register every handler group the settings enable. A disabled group leaves
/// no trace in the registry at all.
pub fn install_enabled<W: WorldSeam + 'static>(
    hooks: &mut InterceptRegistry<W>,
    settings: &OverlaySettings,
) {
    if settings.seat_reconciliation {
        seating::install(hooks);
    }
    if settings.call_delay {
        call_delay::install(hooks, settings);
    }
    if settings.action_promotion {
        actions::install(hooks);
    }
}
