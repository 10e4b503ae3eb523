use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use shelfd::config::{default_config_toml, Config, DEFAULT_CONFIG_FILE};

/// Write `shelfd.toml` into `path` and create the library root next to it
pub fn init_config(path: &Path) -> Result<()> {
    let config_path = path.join(DEFAULT_CONFIG_FILE);
    if config_path.exists() {
        anyhow::bail!("{} already exists", config_path.display());
    }

    fs::create_dir_all(path)?;
    fs::write(&config_path, default_config_toml())
        .with_context(|| format!("Failed to write {}", config_path.display()))?;

    let library_root = path.join(Config::default().library.root);
    fs::create_dir_all(&library_root)?;

    println!("Created config at: {}", config_path.display());
    println!("Library root: {}", library_root.display());
    println!();
    println!("Add [[sources]] entries, then run: shelfd serve");
    Ok(())
}
