//! Config commands.

use crate::config::MirrorConfig;
use std::path::Path;

/// Scaffold a default config file.
pub fn init(path: &Path) -> anyhow::Result<()> {
    if path.exists() {
        anyhow::bail!("config already exists: {}", path.display());
    }
    MirrorConfig::default().save(path)?;
    println!("Wrote default config to {}", path.display());
    println!("Fill in store URLs and credentials before the first sync.");
    Ok(())
}

/// Print the effective config with credentials redacted.
pub fn show(path: &Path) -> anyhow::Result<()> {
    let mut config = MirrorConfig::load_or_create(path)?;
    for store in [&mut config.source, &mut config.replica] {
        if !store.password.is_empty() {
            store.password = "<redacted>".to_string();
        }
    }
    print!("{}", toml::to_string_pretty(&config)?);
    Ok(())
}
