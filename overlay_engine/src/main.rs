use anyhow::Result;

mod cli;
mod handlers;
mod runtime;
mod scenario;
mod settings;
mod sim;
mod world;

use scenario::ScenarioSlug;

fn main() -> Result<()> {
    match cli::parse()? {
        cli::Command::ListScenarios => {
            for slug in ScenarioSlug::ALL {
                println!("{:<16} {}", slug.label(), slug.summary());
            }
            Ok(())
        }
        cli::Command::WriteSettingsTemplate(path) => runtime::write_settings_template(&path),
        cli::Command::Run(args) => runtime::execute(args),
    }
}
