/// Configuration command handlers
use anyhow::Result;
use fyx_core::FyxConfig;
use std::path::Path;

pub fn handle_config_show(path: &Path) -> Result<()> {
    let config = FyxConfig::load(path)?;
    if path.exists() {
        println!("# {}", path.display());
    } else {
        println!("# {} (not found, showing defaults)", path.display());
    }
    print!("{}", config.to_toml()?);
    Ok(())
}

pub fn handle_config_init(path: &Path, force: bool) -> Result<()> {
    if path.exists() && !force {
        println!(
            "Config already exists at {} (use --force to overwrite)",
            path.display()
        );
        return Ok(());
    }
    FyxConfig::default().save(path)?;
    println!("Wrote default config to {}", path.display());
    Ok(())
}
