//! Config command - configuration management.

use anyhow::Result;
use clap::{Args, Subcommand};

use super::Context;

/// Arguments for the config command.
#[derive(Args, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    /// Show the effective configuration and where it came from
    Show,

    /// Show which config files are loaded and their precedence
    Which,

    /// Initialize a config file with defaults
    Init {
        /// Create project-local config (./meterflow.toml) instead of user config
        #[arg(long)]
        local: bool,
    },

    /// Show configuration file path
    Path,
}

/// Run the config command.
pub async fn run(args: ConfigArgs, ctx: &Context) -> Result<()> {
    match args.command {
        ConfigCommand::Show => cmd_show(ctx).await,
        ConfigCommand::Which => cmd_which(ctx).await,
        ConfigCommand::Init { local } => cmd_init(local).await,
        ConfigCommand::Path => cmd_path().await,
    }
}

async fn cmd_show(ctx: &Context) -> Result<()> {
    println!("# Meterflow Configuration\n");

    let loaded: Vec<_> = ctx.sources.iter().filter(|s| s.loaded).collect();
    if loaded.is_empty() {
        println!("No config files loaded (using defaults)\n");
    } else {
        println!("Config files:");
        for source in &loaded {
            println!("  {}", source.path.display());
        }
        println!();
    }

    // Effective config, defaults filled in, password withheld.
    let mut effective = ctx.config.clone();
    let mut database = effective.database();
    if !database.password.is_empty() {
        database.password = "<set>".into();
    }
    effective.api = Some(effective.api());
    effective.storage = Some(effective.storage());
    effective.database = Some(database);
    effective.schedule = Some(effective.schedule());
    effective.engine = Some(effective.engine());

    println!("{}", effective.to_toml()?);

    if let Err(e) = ctx.config.validate() {
        println!("⚠ {}", e);
    }

    Ok(())
}

async fn cmd_which(ctx: &Context) -> Result<()> {
    println!("Config file search order (later overrides earlier):\n");

    for source in &ctx.sources {
        let status = if source.loaded {
            "✓ loaded"
        } else {
            "· not found"
        };
        println!("  {} {}", status, source.path.display());
    }

    println!();
    let loaded_count = ctx.sources.iter().filter(|s| s.loaded).count();
    if loaded_count == 0 {
        println!("No config files found. Run 'meterflow config init' to create one.");
    } else {
        println!("{} config file(s) loaded.", loaded_count);
    }

    Ok(())
}

async fn cmd_init(local: bool) -> Result<()> {
    let path = if local {
        std::path::PathBuf::from("meterflow.toml")
    } else {
        let dir = meterflow_config::xdg_config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not determine config directory"))?;
        std::fs::create_dir_all(&dir)?;
        dir.join("config.toml")
    };

    if path.exists() {
        println!("Config file already exists: {}", path.display());
        return Ok(());
    }

    let template = r#"# Meterflow Configuration

[api]
# Base URL of the parking transaction feed (required)
base_url = ""
record_limit = 50
timeout_secs = 30

[storage]
csv_dir = "data"
json_dir = "data"

[database]
host = "localhost"
port = 5432
user = "postgres"
# Leave empty and set METERFLOW_DB_PASSWORD instead
password = ""
dbname = "postgres"
table = "parking_data"

[schedule]
cron = "*/2 * * * *"
timezone = "UTC"

# Workflow engine knobs (uncomment to override)
# [engine]
# max_concurrent_tasks = 1
# retry_attempts = 2
# retry_delay_secs = 600
"#;

    std::fs::write(&path, template)?;
    println!("✓ Created config file: {}", path.display());
    println!();
    println!("Next steps:");
    println!("  meterflow config show    # verify configuration");
    println!("  meterflow check          # probe the feed and the database");
    println!("  meterflow run            # execute the pipeline once");

    Ok(())
}

async fn cmd_path() -> Result<()> {
    if let Some(path) = meterflow_config::xdg_config_path() {
        println!("{}", path.display());
    } else {
        eprintln!("Could not determine config directory");
    }
    Ok(())
}
