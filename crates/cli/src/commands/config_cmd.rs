//! `loopwright config`: Configuration management commands.

use loopwright_config::AppConfig;

fn config_path() -> std::path::PathBuf {
    AppConfig::config_dir().join("config.toml")
}

pub fn validate() -> Result<(), Box<dyn std::error::Error>> {
    println!("Validating {}", config_path().display());

    match AppConfig::load() {
        Ok(config) => {
            println!("  ok   config parsed and validated");
            if !config.has_credentials() {
                println!("  warn no credentials (set LOOPWRIGHT_API_KEY or OPENAI_API_KEY, or auth.secret)");
            }
            println!();
            println!("  Endpoint:   {}", config.api_url);
            println!("  Model:      {}", config.model);
            println!("  Workspace:  {}", config.resolved_workspace_root().display());
            println!("  Max rounds: {}", config.max_rounds);
            Ok(())
        }
        Err(e) => {
            println!("  error {e}");
            Err(e.into())
        }
    }
}

pub fn show() -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;
    let toml_str = toml::to_string_pretty(&config)?;
    // Keys never leave the process through stdout.
    for line in toml_str.lines() {
        if line.starts_with("api_key") || line.starts_with("secret") {
            let key = line.split('=').next().unwrap_or(line).trim();
            println!("{key} = \"[REDACTED]\"");
        } else {
            println!("{line}");
        }
    }
    Ok(())
}

pub fn path() {
    println!("{}", config_path().display());
}

pub fn init() -> Result<(), Box<dyn std::error::Error>> {
    let path = config_path();
    if path.exists() {
        println!("Config already exists at {}", path.display());
        return Ok(());
    }
    std::fs::create_dir_all(AppConfig::config_dir())?;
    std::fs::write(&path, AppConfig::default_toml())?;
    println!("Wrote default config to {}", path.display());
    Ok(())
}
