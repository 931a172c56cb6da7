use std::path::Path;

use crate::error::Result;
use crate::export::MANIFEST_FILE;
use crate::loader::{locate, ALL_SCHEMAS};
use crate::pipeline::PipelineConfig;
use crate::settings::{load_settings, settings_path};

fn yes_no(b: bool) -> &'static str {
    if b {
        "yes"
    } else {
        "no"
    }
}

pub fn run() -> Result<()> {
    let settings = load_settings();
    let config = PipelineConfig::from_settings(&settings);
    let path = settings_path();

    println!(
        "Settings:    {}{}",
        path.display(),
        if path.exists() { "" } else { " (not saved, using defaults)" }
    );
    println!("Data dir:    {}", config.data_dir.display());
    println!("Output dir:  {}", config.output_dir.display());
    println!("Locale:      {:?}", config.locale);
    println!("Bad dates:   {:?}", config.invalid_dates);
    println!("HTML:        {}", yes_no(config.html));

    println!();
    for schema in ALL_SCHEMAS {
        let found = locate(&config.data_dir, schema);
        println!(
            "{:<12} {}",
            schema.table,
            found
                .as_deref()
                .map(|p: &Path| p.display().to_string())
                .unwrap_or_else(|| "(missing)".to_string())
        );
    }

    let manifest = config.output_dir.join(MANIFEST_FILE);
    println!();
    if manifest.exists() {
        println!("Last run manifest: {}", manifest.display());
    } else {
        println!("No outputs yet. Run `banvic run` to generate them.");
    }
    Ok(())
}
