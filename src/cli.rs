// iconcache CLI binary
//
// Inspects and maintains an icon database file directly. No launcher
// collaborators are involved, so nothing here resolves icons.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use iconcache::config::default_config_path;
use iconcache::db::migrations::expected_schema_version;
use iconcache::db::{IconColumn, IconDb, IconRow, Selection};
use iconcache::{ComponentName, IconCacheConfig};

#[derive(Parser)]
#[command(name = "iconcache")]
#[command(about = "Inspect and maintain a launcher icon cache database", long_about = None)]
#[command(version)]
struct Cli {
    /// Database file (defaults to the configured location)
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    /// Icon size the store is opened for. Defaults to the size the file was
    /// written with, then to the configured size. A mismatch empties the store.
    #[arg(long, global = true)]
    icon_size: Option<u32>,

    /// JSON config file (defaults to ~/.iconcache/config.json when present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show schema version and row count
    Info,

    /// List stored icons
    List {
        /// Only rows for this profile serial
        #[arg(long)]
        profile: Option<i64>,
        /// Maximum rows to show
        #[arg(long, default_value = "100")]
        limit: usize,
    },

    /// Write a stored icon to a PNG file
    Export {
        /// Component as package/class
        component: String,
        /// Profile serial
        #[arg(long, default_value = "0")]
        profile: i64,
        /// Output file
        #[arg(short, long)]
        out: PathBuf,
        /// Export the low-res variant
        #[arg(long)]
        low_res: bool,
    },

    /// Delete every stored icon of a package
    RemovePackage {
        package: String,
        /// Profile serial
        #[arg(long, default_value = "0")]
        profile: i64,
    },

    /// Drop and recreate the icon table
    Clear,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config = load_config(cli.config.as_deref())?;
    let db_path = match &cli.db {
        Some(path) => path.clone(),
        None => config.resolved_db_path()?,
    };
    let icon_size = match cli.icon_size {
        Some(size) => size,
        None => IconDb::stored_icon_size(&db_path)?.unwrap_or(config.icon_pixel_size),
    };
    let db = IconDb::open(&db_path, icon_size)
        .with_context(|| format!("Failed to open icon database at {}", db_path.display()))?;

    match cli.command {
        Commands::Info => cmd_info(&db, &db_path),
        Commands::List { profile, limit } => cmd_list(&db, profile, limit),
        Commands::Export { component, profile, out, low_res } => {
            cmd_export(&db, &component, profile, &out, low_res)
        }
        Commands::RemovePackage { package, profile } => cmd_remove_package(&db, &package, profile),
        Commands::Clear => cmd_clear(&db),
    }
}

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level)).init();
}

fn load_config(path: Option<&Path>) -> Result<IconCacheConfig> {
    let path = match path {
        Some(path) => path.to_path_buf(),
        None => match default_config_path() {
            Ok(path) if path.exists() => path,
            _ => return Ok(IconCacheConfig::default()),
        },
    };
    log::debug!("Loading config from {}", path.display());
    IconCacheConfig::load(&path).with_context(|| format!("Failed to load config {}", path.display()))
}

fn cmd_info(db: &IconDb, db_path: &Path) -> Result<()> {
    let version = db.schema_version()?;
    let rows = db.row_count(&Selection::All)?;

    println!("Database:        {}", db_path.display());
    println!("Icon size:       {}px", db.icon_pixel_size());
    println!("Schema version:  {:#x}", version);
    println!("Expected:        {:#x}", expected_schema_version(db.icon_pixel_size()));
    println!("Rows:            {}", rows);

    Ok(())
}

fn cmd_list(db: &IconDb, profile: Option<i64>, limit: usize) -> Result<()> {
    let selection = match profile {
        Some(serial) => Selection::Profile(serial),
        None => Selection::All,
    };
    let total = db.row_count(&selection)?;

    let columns = [
        IconColumn::Component,
        IconColumn::ProfileSerial,
        IconColumn::Version,
        IconColumn::LastUpdated,
        IconColumn::Label,
        IconColumn::SystemState,
    ];
    let mut rows: Vec<IconRow> = Vec::new();
    db.query_with(&columns, &selection, |row| {
        if rows.len() < limit {
            rows.push(row);
        }
    })?;

    if rows.is_empty() {
        println!("No icons stored.");
        return Ok(());
    }

    println!("{:<48}  {:>7}  {:>10}  {:>16}  {:<20}  {}", "Component", "Profile", "Version", "Updated", "Label", "State");
    println!("{}", "-".repeat(120));

    for row in &rows {
        println!("{:<48}  {:>7}  {:>10}  {:>16}  {:<20}  {}",
            truncate(row.component.as_deref().unwrap_or("-"), 48),
            row.profile_serial.map_or_else(|| "-".to_string(), |s| s.to_string()),
            row.version.map_or_else(|| "-".to_string(), |v| v.to_string()),
            format_timestamp(row.last_updated.unwrap_or(0)),
            truncate(row.label.as_deref().unwrap_or(""), 20),
            truncate(row.system_state.as_deref().unwrap_or(""), 24),
        );
    }

    if total > rows.len() as i64 {
        println!();
        println!("Showing {} of {} rows. Use --limit to see more.", rows.len(), total);
    }

    Ok(())
}

fn cmd_export(db: &IconDb, component: &str, profile: i64, out: &Path, low_res: bool) -> Result<()> {
    let component = ComponentName::unflatten(component)?;
    let flat = component.flatten();
    let row = db
        .query_one(
            &[IconColumn::icon_for(low_res)],
            &Selection::Component { component: &flat, profile_serial: profile },
        )
        .ok_or_else(|| anyhow::anyhow!("No stored icon for {} (profile {})", flat, profile))?;

    let bytes = row
        .icon_bytes(low_res)
        .filter(|b| !b.is_empty())
        .ok_or_else(|| anyhow::anyhow!("Stored row for {} has no image data", flat))?;

    std::fs::write(out, bytes)
        .with_context(|| format!("Failed to write {}", out.display()))?;
    println!("Wrote {} ({} bytes)", out.display(), bytes.len());

    Ok(())
}

fn cmd_remove_package(db: &IconDb, package: &str, profile: i64) -> Result<()> {
    let removed = db.delete(&Selection::Package { package, profile_serial: profile })?;
    println!("Removed {} icons for {} (profile {})", removed, package, profile);
    Ok(())
}

fn cmd_clear(db: &IconDb) -> Result<()> {
    let rows = db.row_count(&Selection::All)?;
    db.drop_and_recreate()?;
    println!("Cleared {} icons", rows);
    Ok(())
}

fn format_timestamp(ms: i64) -> String {
    if ms <= 0 {
        return "-".to_string();
    }
    chrono::DateTime::from_timestamp_millis(ms)
        .map(|dt| dt.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| "-".to_string())
}

fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() > max {
        let kept: String = text.chars().take(max.saturating_sub(3)).collect();
        format!("{}...", kept)
    } else {
        text.to_string()
    }
}
