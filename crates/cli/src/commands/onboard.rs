//! `delve onboard` - First-time setup.

use delve_config::AppConfig;
use std::path::Path;

pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config_dir = AppConfig::config_dir();

    println!("Delve: First-Time Setup");
    println!("========================\n");

    let created = write_default_config(&config_dir)?;
    let config_path = config_dir.join("config.toml");

    if created {
        println!("Created config.toml at: {}", config_path.display());
        println!("\nNext steps:");
        println!("   1. Set GEMINI_API_KEY (or edit {} and add api_key)", config_path.display());
        println!("   2. Run: delve chat");
        println!("   3. Or serve the task API: delve serve\n");
    } else {
        println!("Config already exists at: {}", config_path.display());
        println!("   Edit it manually or delete and re-run onboard.\n");
    }

    Ok(())
}

/// Write the default config into `dir`. Returns `false` when one exists.
pub(crate) fn write_default_config(dir: &Path) -> std::io::Result<bool> {
    std::fs::create_dir_all(dir)?;
    let path = dir.join("config.toml");
    if path.exists() {
        return Ok(false);
    }
    std::fs::write(&path, AppConfig::default_toml())?;
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn writes_loadable_config_once() {
        let dir = tempfile::tempdir().unwrap();
        assert!(write_default_config(dir.path()).unwrap());

        let config = AppConfig::load_from(&dir.path().join("config.toml")).unwrap();
        assert_eq!(config.gateway.port, 8000);
        assert_eq!(config.agent.max_iterations, 10);

        std::fs::write(dir.path().join("config.toml"), "default_model = \"custom\"\n").unwrap();
        assert!(!write_default_config(dir.path()).unwrap());
        let kept = std::fs::read_to_string(dir.path().join("config.toml")).unwrap();
        assert!(kept.contains("custom"));
    }
}
