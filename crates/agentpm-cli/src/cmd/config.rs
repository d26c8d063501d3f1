use crate::output::print_json;
use crate::AppContext;
use agentpm_core::config::Config;
use agentpm_core::store::{EpicStore, FileStore};
use anyhow::Context;
use std::path::Path;

pub fn init(ctx: &AppContext, epic: &str, project_name: Option<&str>) -> anyhow::Result<()> {
    let mut config = Config::new(epic);
    config.project_name = project_name.map(str::to_string);
    let warnings = config.validate().context("invalid configuration")?;
    config
        .save(&ctx.config_path)
        .with_context(|| format!("failed to write {}", ctx.config_path.display()))?;

    warn_if_missing(&config);
    for w in warnings {
        eprintln!("warning: {}", w.message);
    }

    if ctx.json {
        print_json(&config)?;
    } else {
        println!(
            "Initialized {} tracking {}",
            ctx.config_path.display(),
            config.current_epic
        );
    }
    Ok(())
}

pub fn show(ctx: &AppContext) -> anyhow::Result<()> {
    let config = Config::load(&ctx.config_path)?;

    if ctx.json {
        return print_json(&config);
    }

    println!("Config:           {}", ctx.config_path.display());
    println!("Current epic:     {}", config.current_epic);
    if let Some(name) = &config.project_name {
        println!("Project:          {name}");
    }
    println!("Default assignee: {}", config.assignee());
    if let Some(prev) = &config.previous_epic {
        println!("Previous epic:    {prev}");
    }
    Ok(())
}

pub fn switch(ctx: &AppContext, epic: &str) -> anyhow::Result<()> {
    let mut config = Config::load(&ctx.config_path)?;
    config.switch(epic);
    config.validate().context("invalid configuration")?;
    config.save(&ctx.config_path)?;

    warn_if_missing(&config);
    if ctx.json {
        print_json(&config)?;
    } else {
        println!(
            "Switched to {} (previous: {})",
            config.current_epic,
            config.previous_epic.as_deref().unwrap_or("-")
        );
    }
    Ok(())
}

pub fn switch_back(ctx: &AppContext) -> anyhow::Result<()> {
    let mut config = Config::load(&ctx.config_path)?;
    config.switch_back()?;
    config.save(&ctx.config_path)?;

    if ctx.json {
        print_json(&config)?;
    } else {
        println!("Switched back to {}", config.current_epic);
    }
    Ok(())
}

fn warn_if_missing(config: &Config) {
    let path = config.epic_file_path();
    if !FileStore::new().epic_exists(Path::new(&path)) {
        eprintln!("warning: epic file {} does not exist yet", path.display());
    }
}
