//! Init command - write a configuration file with default settings.

use std::path::Path;

use console::style;
use multifetch::config::{config_file_path, ConfigFile};

use crate::error::CliError;

/// Run the init command.
///
/// An existing file is loaded and rewritten, which fills in keys that are
/// missing from it without touching the ones already set.
pub fn run(path: Option<&Path>) -> Result<(), CliError> {
    let path = match path {
        Some(path) => path.to_path_buf(),
        None => config_file_path()?,
    };
    let existed = path.exists();

    let config = ConfigFile::load_from(&path)?;
    config.save_to(&path)?;

    if existed {
        println!("Updated configuration file: {}", path.display());
    } else {
        println!(
            "{} configuration file: {}",
            style("Created").green().bold(),
            path.display()
        );
    }
    println!();
    println!("Set [network] bind to the local addresses of your uplinks.");
    println!("CLI arguments override config file values when specified.");
    Ok(())
}
