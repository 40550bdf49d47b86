use std::{fs, path::Path};

use anyhow::{Context, Result};
use overlay_hooks::OverridePhase;
use serde::Serialize;

use crate::cli::RunArgs;
use crate::scenario::{self, ScenarioRun, ScenarioSlug};
use crate::settings::{OverlaySettings, SettingsStore};
use crate::world::WorldSeam;

pub fn execute(args: RunArgs) -> Result<()> {
    let RunArgs {
        scenario: requested,
        settings,
        event_log_json,
        coverage_json,
        verbose,
    } = args;

    let store = SettingsStore::from_json_file(settings.as_deref())?;
    let (overlay, warnings) = OverlaySettings::from_store(&store);
    for warning in &warnings {
        eprintln!("[overlay_engine] warning: {warning}");
    }

    let slug = ScenarioSlug::parse(&requested)?;
    if verbose {
        eprintln!("[overlay_engine] info: running scenario {}", slug.label());
    }

    let run = scenario::run(slug, &overlay);

    if verbose {
        for event in run.session.journal().events() {
            eprintln!("[overlay_engine] event: {event}");
        }
        let seat = run.world.locked_target();
        let seat_name = seat
            .and_then(|object| run.world.object_name(object))
            .unwrap_or("none");
        let occupant = seat
            .and_then(|object| run.world.usage_slot_of(object))
            .and_then(|slot| run.world.slot_user(slot));
        eprintln!(
            "[overlay_engine] info: locked_target={seat_name} occupant={occupant:?} binding={:?} pose={:?} dialogue={}",
            run.world.player_binding(),
            run.world.pose(run.world.player()),
            run.world.session_active()
        );
    }

    println!(
        "scenario {} finished: phase={} events={}",
        slug.label(),
        run.session.phase(),
        run.session.journal().events().len()
    );

    if let Some(path) = event_log_json.as_ref() {
        let log = build_event_log(&run);
        let json = serde_json::to_string_pretty(&log)
            .context("serializing scenario event log to JSON")?;
        fs::write(path, &json)
            .with_context(|| format!("writing scenario event log to {}", path.display()))?;
        println!("Saved event log to {}", path.display());
    }

    if let Some(path) = coverage_json.as_ref() {
        let json = serde_json::to_string_pretty(run.session.journal().coverage())
            .context("serializing coverage counts to JSON")?;
        fs::write(path, &json)
            .with_context(|| format!("writing coverage counts to {}", path.display()))?;
        println!("Saved coverage counts to {}", path.display());
    }

    Ok(())
}

pub fn write_settings_template(path: &Path) -> Result<()> {
    let mut store = SettingsStore::from_json_file(None)?;
    OverlaySettings::write_defaults(&mut store);
    store.save_to_path(path)?;
    println!("Saved settings template to {}", path.display());
    Ok(())
}

#[derive(Serialize)]
struct EventLogEntry {
    sequence: u32,
    label: String,
}

#[derive(Serialize)]
struct EventLog {
    scenario: &'static str,
    final_phase: OverridePhase,
    events: Vec<EventLogEntry>,
}

fn build_event_log(run: &ScenarioRun) -> EventLog {
    let events = run
        .session
        .journal()
        .events()
        .iter()
        .enumerate()
        .map(|(index, label)| EventLogEntry {
            sequence: index as u32,
            label: label.clone(),
        })
        .collect();

    EventLog {
        scenario: run.slug.label(),
        final_phase: run.final_phase(),
        events,
    }
}

#[cfg(test)]
mod tests {
    use super::build_event_log;
    use crate::scenario::{self, ScenarioSlug};
    use crate::settings::OverlaySettings;

    #[test]
    fn event_log_numbers_events_in_order() {
        let run = scenario::run(ScenarioSlug::StandUp, &OverlaySettings::default());
        let log = build_event_log(&run);
        assert_eq!(log.scenario, "stand-up");
        assert_eq!(log.events.len(), run.session.journal().events().len());
        for (index, entry) in log.events.iter().enumerate() {
            assert_eq!(entry.sequence, index as u32);
        }
    }
}
