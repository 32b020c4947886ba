//! The `prefs` subcommands: the singleton preference record.

use restock_protocols::{Preference, PreferencePatch};

use crate::cli::PrefsAction;
use crate::config::Config;
use crate::factory;

pub(crate) async fn handle_prefs_command(
    action: PrefsAction,
    config: &Config,
) -> Result<(), Box<dyn std::error::Error>> {
    let journal = factory::open_journal(config).await?;

    match action {
        PrefsAction::Show => {
            print_preference(&journal.preference().await?);
        }
        PrefsAction::Set {
            instructions,
            provider,
            threshold,
            mode,
        } => {
            if instructions.is_none() && provider.is_none() && threshold.is_none() && mode.is_none()
            {
                println!("Nothing to change. See `restock prefs set --help`.");
                return Ok(());
            }
            if let Some(t) = threshold {
                if !(0.0..=1.0).contains(&t) {
                    return Err(format!("threshold {t} is outside 0.0..=1.0").into());
                }
            }

            let updated = journal
                .update_preference(PreferencePatch {
                    custom_instructions: instructions,
                    preferred_provider: provider,
                    detection_threshold: threshold,
                    selection_mode: mode,
                })
                .await?;

            println!("Preferences updated:");
            print_preference(&updated);
        }
    }

    Ok(())
}

fn print_preference(preference: &Preference) {
    println!("Provider:            {}", preference.preferred_provider);
    println!("Selection mode:      {}", preference.selection_mode.as_str());
    println!("Detection threshold: {:.2}", preference.detection_threshold);
    let instructions = if preference.custom_instructions.is_empty() {
        "(none)"
    } else {
        preference.custom_instructions.as_str()
    };
    println!("Instructions:        {instructions}");
}
