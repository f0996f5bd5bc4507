//! `dnh config`: show and check the effective configuration.

use dnh_config::{LoadedConfig, load_config};

use crate::cli::{ConfigArgs, ConfigCommand, GlobalOpts};
use crate::error::CliError;

pub fn handle(args: &ConfigArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let loaded = load_config(global.config.as_deref())?;
    match args.command {
        ConfigCommand::Show => show(&loaded),
        ConfigCommand::Check => check(&loaded),
    }
}

fn show(loaded: &LoadedConfig) -> Result<(), CliError> {
    if let Some(path) = &loaded.source {
        println!("# source: {}", path.display());
    }
    print!("{}", loaded.config.to_toml_string()?);
    Ok(())
}

fn check(loaded: &LoadedConfig) -> Result<(), CliError> {
    let errors = loaded.config.check_params();
    for error in &errors {
        eprintln!("{error}");
    }
    if !errors.is_empty() {
        return Err(CliError::InvalidParams {
            count: errors.len(),
        });
    }

    let config = &loaded.config;
    let commands = config.startupcmds.len()
        + config.resetcmds.len()
        + config.fatalcmds.len()
        + config.endcmds.len();
    let source = loaded
        .source
        .as_ref()
        .map_or_else(|| "defaults".to_owned(), |p| p.display().to_string());
    println!(
        "Config OK ({source}): {} params, {commands} commands, http {}, ws {}",
        config.params.len(),
        config.http_addr(),
        config.ws_addr(),
    );
    Ok(())
}
