//! Settings subcommand implementation.

use crate::config::EngineSettings;
use crate::output;
use clap::Parser;
use std::path::Path;

/// Show the effective settings, or reset them to defaults.
#[derive(Parser, Debug)]
pub struct SettingsCommand {
    /// Overwrite the settings file with the defaults
    #[arg(long)]
    pub reset: bool,
}

impl SettingsCommand {
    /// Print `settings` as JSON.
    pub fn show(&self, settings: &EngineSettings) -> anyhow::Result<()> {
        println!("{}", serde_json::to_string_pretty(settings)?);
        Ok(())
    }

    /// Write the defaults to `path`, or to the default location.
    pub fn reset(&self, path: Option<&Path>) -> anyhow::Result<()> {
        let defaults = EngineSettings::default();
        let written = match path {
            Some(path) => {
                defaults.save_to(path)?;
                path.to_path_buf()
            }
            None => defaults.save()?,
        };
        output::print_success(&format!("Settings reset: {}", written.display()));
        Ok(())
    }
}
