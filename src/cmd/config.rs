//! Configuration view and validation commands (`boards config`).

use anyhow::Result;

use boards::config::{BoardsConfig, BoardsToml, CONFIG_FILE_NAME};

use super::super::ConfigCommands;

fn print_toml(toml: &BoardsToml) {
    println!("[undo]");
    println!("  limit = {}", toml.undo.limit);
    println!();
    println!("[view]");
    println!("  search_case_sensitive = {}", toml.view.search_case_sensitive);
    println!();
    println!("[logging]");
    println!("  level = \"{}\"", toml.logging.level);
    println!("  json = {}", toml.logging.json);
    println!();
}

pub fn cmd_config(config: &BoardsConfig, command: Option<ConfigCommands>) -> Result<()> {
    match command {
        None | Some(ConfigCommands::Show) => {
            println!();
            println!("{}", console::style("Boards Configuration").bold().cyan());
            println!();

            match &config.config_path {
                Some(path) => println!("Config file: {}", path.display()),
                None => println!("No {} found. Using defaults.", CONFIG_FILE_NAME),
            }
            println!();

            // Includes environment overrides
            print_toml(&config.toml);

            println!("Effective log filter: {}", config.log_filter());
            println!();
        }
        Some(ConfigCommands::Validate) => {
            println!();
            println!("Validating configuration...");
            println!();

            let warnings = config.validate();
            if warnings.is_empty() {
                println!("{}", console::style("Configuration is valid.").green());
            } else {
                println!("{}", console::style("Configuration warnings:").yellow());
                for warning in warnings {
                    println!("  - {}", warning);
                }
            }
            println!();
        }
        Some(ConfigCommands::Init) => {
            let path = std::env::current_dir()?.join(CONFIG_FILE_NAME);
            if path.exists() {
                println!("{} already exists at {}", CONFIG_FILE_NAME, path.display());
                println!("Delete it first if you want to recreate it.");
                return Ok(());
            }

            BoardsToml::default().save(&path)?;
            println!("Created {} at {}", CONFIG_FILE_NAME, path.display());
        }
    }

    Ok(())
}
