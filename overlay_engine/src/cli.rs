use std::path::PathBuf;

use anyhow::{bail, Result};
use clap::Parser;

#[derive(Parser, Debug)]
#[command(
    about = "Host harness that replays behavior-override scenarios against a scripted world",
    version
)]
pub struct Args {
    /// Scenario to run (see --list-scenarios)
    #[arg(long, default_value = "seated-dialogue", value_name = "SLUG")]
    pub scenario: String,

    /// List the available scenarios and exit
    #[arg(long)]
    pub list_scenarios: bool,

    /// Optional JSON settings file overriding the built-in defaults
    #[arg(long)]
    pub settings: Option<PathBuf>,

    /// Path to write the scenario event log as JSON
    #[arg(long)]
    pub event_log_json: Option<PathBuf>,

    /// Path to write the coverage counters as JSON
    #[arg(long)]
    pub coverage_json: Option<PathBuf>,

    /// Write a settings file populated with the defaults, then exit
    #[arg(long, value_name = "PATH")]
    pub write_settings_template: Option<PathBuf>,

    /// Echo every journal event to stderr while running
    #[arg(long)]
    pub verbose: bool,
}

#[derive(Debug)]
pub enum Command {
    ListScenarios,
    WriteSettingsTemplate(PathBuf),
    Run(RunArgs),
}

#[derive(Debug)]
pub struct RunArgs {
    pub scenario: String,
    pub settings: Option<PathBuf>,
    pub event_log_json: Option<PathBuf>,
    pub coverage_json: Option<PathBuf>,
    pub verbose: bool,
}

pub fn parse() -> Result<Command> {
    let args = Args::parse();
    args.into_command()
}

impl Args {
    fn into_command(self) -> Result<Command> {
        if self.list_scenarios {
            if self.event_log_json.is_some() || self.coverage_json.is_some() {
                bail!("--list-scenarios cannot be combined with artefact outputs");
            }
            if self.write_settings_template.is_some() {
                bail!("--list-scenarios cannot be combined with --write-settings-template");
            }
            return Ok(Command::ListScenarios);
        }

        if let Some(path) = self.write_settings_template {
            if self.event_log_json.is_some() || self.coverage_json.is_some() {
                bail!("--write-settings-template cannot be combined with artefact outputs");
            }
            return Ok(Command::WriteSettingsTemplate(path));
        }

        Ok(Command::Run(RunArgs {
            scenario: self.scenario,
            settings: self.settings,
            event_log_json: self.event_log_json,
            coverage_json: self.coverage_json,
            verbose: self.verbose,
        }))
    }
}
