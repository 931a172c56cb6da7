use colored::Colorize;

use crate::calendar::Locale;
use crate::error::Result;
use crate::join::InvalidDatePolicy;
use crate::settings::{load_settings, save_settings, settings_path, shellexpand_path};

pub fn run(
    data_dir: Option<String>,
    output_dir: Option<String>,
    locale: Option<Locale>,
    invalid_dates: Option<InvalidDatePolicy>,
) -> Result<()> {
    let mut settings = load_settings();
    if let Some(d) = data_dir {
        settings.data_dir = shellexpand_path(&d);
    }
    if let Some(d) = output_dir {
        settings.output_dir = shellexpand_path(&d);
    }
    if let Some(l) = locale {
        settings.locale = l;
    }
    if let Some(p) = invalid_dates {
        settings.invalid_dates = p;
    }

    std::fs::create_dir_all(shellexpand_path(&settings.data_dir))?;
    std::fs::create_dir_all(shellexpand_path(&settings.output_dir))?;
    save_settings(&settings)?;

    println!("{} {}", "Saved".green().bold(), settings_path().display());
    println!("Data dir:    {}", settings.data_dir);
    println!("Output dir:  {}", settings.output_dir);
    println!("Next: place transacoes, clientes, agencias (and contas) in the data dir, or run `banvic demo`.");
    Ok(())
}
