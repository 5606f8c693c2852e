use anyhow::{anyhow, Result};
use clap::{Arg, ArgMatches, Command};
use tracing_subscriber::{fmt, EnvFilter};
use workhub_backup::backup::{BackupEngine, OperatorContext};
use workhub_backup::store::{MemoryStore, Store};

/// Main entry point for the workhub-backup operator CLI.
///
/// This binary is the thin operator surface over the backup engine:
/// 1. Parses command-line arguments for the store file and backup directory
/// 2. Initializes structured logging with tracing
/// 3. Opens the store and the backup engine
/// 4. Runs exactly one operation and exits
///
/// # Arguments
/// - `--data FILE`: Store state file (created if absent)
/// - `--backups DIR`: Backup directory (default: ./backups)
/// - `--operator NAME`: Operator name recorded in the logs (default: admin)
///
/// # Example Usage
/// ```bash
/// workhub-backup --data ./data/store.json exec "CREATE TABLE \"t\" (\"id\" INT, \"name\" TEXT);"
/// workhub-backup --data ./data/store.json backup --description "before migration"
/// workhub-backup --data ./data/store.json list
/// workhub-backup --data ./data/store.json restore backup_2026-08-23_14-05-09.sql
/// ```
#[tokio::main]
async fn main() -> Result<()> {
    let matches = Command::new("workhub-backup")
        .about("Backup and restore engine for the workhub store")
        .arg(Arg::new("data")
            .long("data")
            .value_name("FILE")
            .required(true)
            .help("Store state file (JSON), created if absent"))
        .arg(Arg::new("backups")
            .long("backups")
            .value_name("DIR")
            .default_value("./backups")
            .help("Directory holding backup scripts"))
        .arg(Arg::new("operator")
            .long("operator")
            .value_name("NAME")
            .default_value("admin")
            .help("Operator name recorded in logs"))
        .subcommand_required(true)
        .subcommand(
            Command::new("backup")
                .about("Dump the whole store into a new backup script")
                .arg(Arg::new("description")
                    .long("description")
                    .value_name("TEXT")
                    .help("Free-text description recorded in the script header")),
        )
        .subcommand(Command::new("list").about("List all backups, newest first"))
        .subcommand(
            Command::new("delete")
                .about("Delete one backup by filename")
                .arg(Arg::new("filename").required(true)),
        )
        .subcommand(
            Command::new("restore")
                .about("Restore the store from one backup (a safety snapshot is taken first)")
                .arg(Arg::new("filename").required(true)),
        )
        .subcommand(
            Command::new("exec")
                .about("Execute SQL statements against the store, in one transaction")
                .arg(Arg::new("sql").required(true)),
        )
        .get_matches();

    // Initialize structured logging
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt().with_env_filter(filter).init();

    let data = matches.get_one::<String>("data").unwrap().to_string();
    let backups = matches.get_one::<String>("backups").unwrap().to_string();
    let ctx = OperatorContext::new(matches.get_one::<String>("operator").unwrap().clone());

    let store = MemoryStore::open(data)?;
    let engine = BackupEngine::new(store, backups)?;

    run(&engine, &ctx, &matches).await
}

/// Dispatches the parsed subcommand against the engine and prints the result.
async fn run(
    engine: &BackupEngine<MemoryStore>,
    ctx: &OperatorContext,
    matches: &ArgMatches,
) -> Result<()> {
    match matches.subcommand() {
        Some(("backup", sub)) => {
            let description = sub.get_one::<String>("description").map(|s| s.as_str());
            let record = engine.trigger_backup(ctx, description).await?;
            println!("{} ({} bytes)", record.filename, record.size_bytes);
            Ok(())
        }
        Some(("list", _)) => {
            for r in engine.list_backups().await? {
                println!(
                    "{}\t{}\t{} bytes",
                    r.filename,
                    r.created_at.format("%Y-%m-%d %H:%M:%S"),
                    r.size_bytes
                );
            }
            Ok(())
        }
        Some(("delete", sub)) => {
            let filename = sub.get_one::<String>("filename").unwrap();
            engine.delete_backup(ctx, filename).await?;
            println!("deleted {}", filename);
            Ok(())
        }
        Some(("restore", sub)) => {
            let filename = sub.get_one::<String>("filename").unwrap();
            engine.restore_backup(ctx, filename).await?;
            println!("restored {}", filename);
            Ok(())
        }
        Some(("exec", sub)) => {
            let sql = sub.get_one::<String>("sql").unwrap();
            let statements = workhub_backup::backup::split_statements(sql);
            engine.store().execute_in_transaction(&statements).await?;
            println!("OK ({} statements)", statements.len());
            Ok(())
        }
        _ => Err(anyhow!("unknown subcommand")),
    }
}
