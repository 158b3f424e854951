//! Orebook CLI
//!
//! Command-line interface for inspecting and managing an Orebook data
//! directory without the server.

use clap::{Parser, Subcommand};
use orebook_core::analytics::dashboard_summary;
use orebook_core::record::FieldValues;
use orebook_core::sharing::ShareScope;
use orebook_core::{EntityKind, Record, Role};
use orebook_storage::DataDir;
use std::path::Path;
use tracing_subscriber::EnvFilter;

/// Default bcrypt cost for passwords hashed by the CLI.
const DEFAULT_BCRYPT_COST: u32 = 12;

#[derive(Parser)]
#[command(name = "orebook")]
#[command(version, about = "Orebook data directory CLI", long_about = None)]
struct Cli {
    /// Path to the data directory
    #[arg(short, long, default_value = "data", global = true)]
    data_dir: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write header-only tables and the default roles
    Init {
        /// Reset existing tables to empty
        #[arg(short, long)]
        force: bool,

        /// Create an Administrator account with this username
        #[arg(long, requires = "admin_password")]
        admin_username: Option<String>,

        /// Password for the Administrator account
        #[arg(long, requires = "admin_username")]
        admin_password: Option<String>,

        /// bcrypt cost for the Administrator password
        #[arg(long, default_value_t = DEFAULT_BCRYPT_COST)]
        bcrypt_cost: u32,
    },

    /// List the records of an entity
    List {
        /// Entity name (users, countries, minerals, sites, production)
        entity: String,
    },

    /// Show one record
    Show {
        /// Entity name
        entity: String,

        /// Record identifier
        id: i64,
    },

    /// Inspect or clear the audit trail
    Audit {
        #[command(subcommand)]
        command: AuditCommands,
    },

    /// Share the uploaded dataset with a role or a user
    Share {
        /// Share type: role or user
        scope: String,

        /// Role name or username
        value: String,

        /// Recorded as the granting user
        #[arg(long, default_value = "cli")]
        shared_by: String,
    },

    /// Replace non-bcrypt password values with bcrypt hashes
    HashPasswords {
        /// bcrypt cost factor
        #[arg(long, default_value_t = DEFAULT_BCRYPT_COST)]
        cost: u32,
    },

    /// Show data directory statistics
    Stats,
}

#[derive(Subcommand)]
enum AuditCommands {
    /// Print the most recent entries
    Tail {
        /// Number of entries
        #[arg(short = 'n', long, default_value_t = 20)]
        lines: usize,
    },

    /// Back up the audit log and reset it
    Clear {
        /// Recorded as the user who cleared the log
        #[arg(long, default_value = "cli")]
        actor: String,
    },
}

fn main() {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .init();

    let cli = Cli::parse();
    let data_dir = Path::new(&cli.data_dir);

    let result = match cli.command {
        Commands::Init {
            force,
            admin_username,
            admin_password,
            bcrypt_cost,
        } => init_data_dir(
            data_dir,
            force,
            admin_username.zip(admin_password),
            bcrypt_cost,
        ),
        Commands::List { entity } => list_records(data_dir, &entity),
        Commands::Show { entity, id } => show_record(data_dir, &entity, id),
        Commands::Audit { command } => match command {
            AuditCommands::Tail { lines } => audit_tail(data_dir, lines),
            AuditCommands::Clear { actor } => audit_clear(data_dir, &actor),
        },
        Commands::Share {
            scope,
            value,
            shared_by,
        } => share_dataset(data_dir, &scope, &value, &shared_by),
        Commands::HashPasswords { cost } => hash_passwords(data_dir, cost),
        Commands::Stats => show_stats(data_dir),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn init_data_dir(
    path: &Path,
    force: bool,
    admin: Option<(String, String)>,
    bcrypt_cost: u32,
) -> Result<(), Box<dyn std::error::Error>> {
    let (dir, report) = DataDir::init(path, force)?;

    for file in &report.created {
        println!("Created {}", file.display());
    }
    if !report.kept.is_empty() {
        println!(
            "Kept {} existing table(s). Use --force to reset them.",
            report.kept.len()
        );
    }

    if let Some((username, password)) = admin {
        let user = create_admin(&dir, &username, &password, bcrypt_cost)?;
        println!(
            "Created administrator '{}' (UserID {})",
            username,
            user.get_or_empty("UserID")
        );
    }

    println!("Initialized data directory at '{}'", path.display());
    Ok(())
}

fn create_admin(
    dir: &DataDir,
    username: &str,
    password: &str,
    cost: u32,
) -> Result<Record, Box<dyn std::error::Error>> {
    if password.is_empty() {
        return Err("Administrator password cannot be empty".into());
    }

    let role_id = dir
        .roles()
        .load()?
        .into_iter()
        .find(|r| Role::from_name(r.get_or_empty("RoleName")).is_admin())
        .map(|r| r.get_or_empty("RoleID").to_string())
        .ok_or("No Administrator role in roles.csv")?;

    let mut values = FieldValues::new();
    values.insert("Username".to_string(), username.to_string());
    values.insert("PasswordHash".to_string(), bcrypt::hash(password, cost)?);
    values.insert("RoleID".to_string(), role_id);

    Ok(dir.create(EntityKind::Users, &values)?)
}

/// Record shown on the terminal: password hashes are masked.
fn display_value<'a>(kind: EntityKind, field: &str, value: &'a str) -> &'a str {
    if kind == EntityKind::Users && field == "PasswordHash" && !value.is_empty() {
        "********"
    } else {
        value
    }
}

fn list_records(path: &Path, entity: &str) -> Result<(), Box<dyn std::error::Error>> {
    let kind: EntityKind = entity.parse()?;
    let spec = kind.spec();
    let dir = DataDir::open(path)?;
    let records = dir.store(kind).load()?;

    println!("{} ({}):", spec.title, format_number(records.len() as i64));
    println!();

    for record in &records {
        let line: Vec<String> = spec
            .fields()
            .iter()
            .map(|field| {
                format!(
                    "{}={}",
                    field,
                    display_value(kind, field, record.get_or_empty(field))
                )
            })
            .collect();
        println!("  {}", line.join("  "));
    }

    Ok(())
}

fn show_record(path: &Path, entity: &str, id: i64) -> Result<(), Box<dyn std::error::Error>> {
    let kind: EntityKind = entity.parse()?;
    let spec = kind.spec();
    let dir = DataDir::open(path)?;

    let record = dir
        .store(kind)
        .get(id)?
        .ok_or_else(|| format!("{} {} not found", spec.id_field(), id))?;

    println!("{} {}:", spec.title, id);
    for field in spec.fields() {
        println!(
            "  {}: {}",
            field,
            display_value(kind, field, record.get_or_empty(field))
        );
    }

    Ok(())
}

fn audit_tail(path: &Path, lines: usize) -> Result<(), Box<dyn std::error::Error>> {
    let dir = DataDir::open(path)?;
    for entry in dir.audit().tail(lines)? {
        println!(
            "{}  {:<12} {:<18} {}  {}",
            entry.timestamp, entry.username, entry.action, entry.path, entry.details
        );
    }
    Ok(())
}

fn audit_clear(path: &Path, actor: &str) -> Result<(), Box<dyn std::error::Error>> {
    let dir = DataDir::open(path)?;
    let outcome = dir.audit().clear_with_backup(actor)?;
    println!(
        "Cleared {} audit entries; backup written to {}",
        format_number(outcome.cleared_entries as i64),
        outcome.backup_path.display()
    );
    Ok(())
}

fn share_dataset(
    path: &Path,
    scope: &str,
    value: &str,
    shared_by: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let scope: ShareScope = scope.parse()?;
    let dir = DataDir::open(path)?;
    let share = dir.shares().grant(scope, value, shared_by)?;
    println!(
        "Shared dataset with {}:{}",
        share.shared_type, share.shared_value
    );
    Ok(())
}

fn hash_passwords(path: &Path, cost: u32) -> Result<(), Box<dyn std::error::Error>> {
    let dir = DataDir::open(path)?;
    let migrated = migrate_passwords(&dir, cost)?;
    println!("Hashed {} password(s)", format_number(migrated as i64));
    Ok(())
}

/// Hash every stored password that is not already a bcrypt hash.
fn migrate_passwords(dir: &DataDir, cost: u32) -> Result<usize, Box<dyn std::error::Error>> {
    let users = dir.store(EntityKind::Users).load()?;
    let mut migrated = 0;

    for user in &users {
        let stored = user.get_or_empty("PasswordHash");
        if stored.is_empty() || bcrypt_prefixed(stored) {
            continue;
        }
        let Some(id) = user.integer("UserID") else {
            tracing::warn!(username = user.get_or_empty("Username"), "Skipping user without UserID");
            continue;
        };

        let mut values = FieldValues::new();
        values.insert("PasswordHash".to_string(), bcrypt::hash(stored, cost)?);
        dir.update(EntityKind::Users, id, &values)?;
        migrated += 1;
    }

    Ok(migrated)
}

fn bcrypt_prefixed(value: &str) -> bool {
    ["$2a$", "$2b$", "$2x$", "$2y$"]
        .iter()
        .any(|prefix| value.starts_with(prefix))
}

fn show_stats(path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let dir = DataDir::open(path)?;
    let snapshot = dir.load_snapshot()?;
    let summary = dashboard_summary(&snapshot);

    println!("Data Directory Statistics:");
    for kind in EntityKind::ALL {
        println!(
            "  {}: {}",
            kind.spec().title,
            format_number(snapshot.count(kind) as i64)
        );
    }

    match summary.latest_year {
        Some(year) => println!(
            "\nLatest production year: {} ({} tonnes)",
            year,
            format_number(summary.total_production.round() as i64)
        ),
        None => println!("\nNo production statistics"),
    }

    println!("\nAudit entries: {}", format_number(dir.audit().entries()?.len() as i64));
    println!("Dataset shares: {}", format_number(dir.shares().list()?.len() as i64));

    let dataset = dir.dataset().load()?;
    if !dataset.is_empty() {
        println!(
            "Uploaded dataset: {} rows, {} columns",
            format_number(dataset.rows.len() as i64),
            dataset.columns.len()
        );
    }

    Ok(())
}

fn format_number(n: i64) -> String {
    let negative = n.is_negative();
    let mut digits = n.abs().to_string();
    let mut parts = Vec::new();

    while digits.len() > 3 {
        let chunk = digits.split_off(digits.len() - 3);
        parts.push(chunk);
    }
    parts.push(digits);
    parts.reverse();

    let mut formatted = parts.join(",");
    if negative {
        formatted.insert(0, '-');
    }
    formatted
}
