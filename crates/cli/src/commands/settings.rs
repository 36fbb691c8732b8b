use anyhow::Result;
use onmodel_core::domain::CorrectionSettings;
use onmodel_core::error::Error;
use onmodel_core::settings::{self, SettingsInput};
use onmodel_core::store::StudioStore;
use onmodel_core::Studio;

pub fn show<S: StudioStore>(studio: &Studio<S>) {
    print!("{}", render(studio.settings()));
}

pub fn set<S: StudioStore>(studio: &mut Studio<S>, input: SettingsInput) -> Result<()> {
    if input == SettingsInput::default() {
        println!("Nothing to change.");
        show(studio);
        return Ok(());
    }
    match studio.update_settings(&input) {
        Ok(updated) => {
            println!("Settings updated.");
            print!("{}", render(&updated));
            Ok(())
        }
        Err(Error::InvalidSetting { field, value }) => {
            let (modes, angles, scopes) = settings::known_labels();
            let accepted = match field {
                "mode" => modes.join(", "),
                "angle_tag" => angles.join(", "),
                "scope" => scopes.join(", "),
                "strength" => "a number from 1 to 100".to_string(),
                _ => "a number from 0 to 100".to_string(),
            };
            anyhow::bail!("invalid {field} {value:?}; expected {accepted}")
        }
        Err(e) => Err(e.into()),
    }
}

fn render(settings: &CorrectionSettings) -> String {
    format!(
        "  Mode:               {}\n  Angle:              {}\n  Scope:              {}\n  Strength:           {}%\n  Line preservation:  {}%\n  Line fidelity:      {}\n",
        settings.mode,
        settings.angle_tag,
        settings.scope,
        settings.strength,
        settings.line_preservation,
        if settings.absolute_line_fidelity { "on" } else { "off" },
    )
}
