mod config;

use std::io::Write;
use std::path::{Path, PathBuf};

use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use colored::Colorize;

use vendo_core::client::{OperationRecord, status};
use vendo_core::handle::ResourceHandle;
use vendo_core::lifecycle::{LifecycleController, LifecycleError, Operation};
use vendo_provider_aws::ServiceCatalogClient;
use vendo_state::{LockInfo, StateHandleStore, create_backend};

use crate::config::ProjectConfig;

type Controller = LifecycleController<ServiceCatalogClient, StateHandleStore>;

#[derive(Parser)]
#[command(name = "vendo")]
#[command(about = "Vend AWS accounts through Service Catalog", long_about = None)]
struct Cli {
    /// Log progress of every poll and state write
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Provision the account and wait until it is ready
    Create {
        /// Path to the account configuration file
        #[arg(default_value = "account.json")]
        file: PathBuf,

        /// Override the region from the configuration file
        #[arg(long)]
        region: Option<String>,
    },
    /// Terminate the account and forget its handle
    Delete {
        /// Path to the account configuration file
        #[arg(default_value = "account.json")]
        file: PathBuf,

        /// Override the region from the configuration file
        #[arg(long)]
        region: Option<String>,

        /// Skip confirmation prompt (auto-approve)
        #[arg(long)]
        auto_approve: bool,
    },
    /// Show the stored handle and the status of its last operation
    Status {
        /// Path to the account configuration file
        #[arg(default_value = "account.json")]
        file: PathBuf,

        /// Override the region from the configuration file
        #[arg(long)]
        region: Option<String>,
    },
    /// Adopt an already provisioned product into state
    Import {
        /// Provisioned product id to adopt
        resource_id: String,

        /// Path to the account configuration file
        #[arg(default_value = "account.json")]
        file: PathBuf,
    },
    /// List every account tracked in state
    List {
        /// Path to the account configuration file
        #[arg(default_value = "account.json")]
        file: PathBuf,
    },
    /// Remove a stale state lock
    ForceUnlock {
        /// Lock ID reported by the failed run
        lock_id: String,

        /// Path to the account configuration file
        #[arg(default_value = "account.json")]
        file: PathBuf,
    },
    /// Print shell completions
    Completions {
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let result = match cli.command {
        Commands::Create { file, region } => run_create(&file, region).await,
        Commands::Delete {
            file,
            region,
            auto_approve,
        } => run_delete(&file, region, auto_approve).await,
        Commands::Status { file, region } => run_status(&file, region).await,
        Commands::Import { resource_id, file } => run_import(&file, &resource_id).await,
        Commands::List { file } => run_list(&file).await,
        Commands::ForceUnlock { lock_id, file } => run_force_unlock(&file, &lock_id).await,
        Commands::Completions { shell } => {
            clap_complete::generate(
                shell,
                &mut Cli::command(),
                "vendo",
                &mut std::io::stdout(),
            );
            Ok(())
        }
    };

    if let Err(e) = result {
        eprintln!("{} {}", "Error:".red().bold(), e);
        std::process::exit(1);
    }
}

fn log_filter(verbose: bool) -> &'static str {
    if verbose {
        "warn,vendo_core=debug,vendo_provider_aws=debug,vendo_state=debug,vendo=debug"
    } else {
        "warn"
    }
}

/// `RUST_LOG` wins over the verbosity flag
fn init_logging(verbose: bool) {
    let env = env_logger::Env::default().default_filter_or(log_filter(verbose));
    env_logger::Builder::from_env(env)
        .format_timestamp(None)
        .init();
}

fn load_config(file: &Path, region: Option<String>) -> Result<ProjectConfig, String> {
    let mut config = ProjectConfig::load(file)?;
    if let Some(region) = region {
        config.region = region;
    }
    Ok(config)
}

fn open_store(config: &ProjectConfig) -> Result<StateHandleStore, String> {
    let backend = create_backend(&config.backend).map_err(|e| e.to_string())?;
    Ok(StateHandleStore::new(backend))
}

async fn connect(config: &ProjectConfig) -> Result<Controller, String> {
    let store = open_store(config)?;
    let client = ServiceCatalogClient::new(&config.region).await;
    log::debug!("Using Service Catalog in {}", client.region());
    Ok(LifecycleController::new(client, store).with_config(config.lifecycle_config()))
}

async fn acquire_lock(
    store: &StateHandleStore,
    config: &ProjectConfig,
    operation: Operation,
    label: &str,
) -> Result<LockInfo, String> {
    store
        .backend()
        .acquire_lock(label, config.lock_ttl(operation))
        .await
        .map_err(|e| format!("{}\n  {}", e, LOCKED_HINT))
}

/// Release the lock, keeping the run's own error when both fail
async fn release_lock(
    store: &StateHandleStore,
    lock: &LockInfo,
    result: Result<(), String>,
) -> Result<(), String> {
    let released = store.backend().release_lock(lock).await;
    match (result, released) {
        (Err(e), Err(release_err)) => {
            log::warn!("Failed to release lock {}: {}", lock.id, release_err);
            Err(e)
        }
        (Err(e), Ok(())) => Err(e),
        (Ok(()), Err(release_err)) => Err(format!("Failed to release lock: {}", release_err)),
        (Ok(()), Ok(())) => Ok(()),
    }
}

async fn run_create(file: &Path, region: Option<String>) -> Result<(), String> {
    let config = load_config(file, region)?;
    let controller = connect(&config).await?;
    let lock = acquire_lock(controller.store(), &config, Operation::Create, "create").await?;
    let result = create_locked(&controller, &config).await;
    release_lock(controller.store(), &lock, result).await
}

async fn create_locked(controller: &Controller, config: &ProjectConfig) -> Result<(), String> {
    let name = &config.account.name;
    if let Some(existing) = controller
        .store()
        .load(name)
        .await
        .map_err(|e| e.to_string())?
    {
        return Err(format!(
            "{} is already tracked as {}. Delete it first or pick another name.",
            name, existing.resource_id
        ));
    }

    println!(
        "{} {} from product {} in {}",
        "Provisioning".cyan().bold(),
        name.bold(),
        config.account.product_id,
        config.region
    );
    println!(
        "  {}",
        format!(
            "Waiting up to {} minutes; this usually takes a while.",
            config.timeouts.create_minutes
        )
        .dimmed()
    );

    match controller.create(&config.account).await {
        Ok(handle) => {
            println!();
            println!("  {} {}", "✓".green(), format_handle(&handle));
            println!();
            println!("{}", "Create complete!".green().bold());
            Ok(())
        }
        Err(e) => Err(explain_failure(&e)),
    }
}

async fn run_delete(file: &Path, region: Option<String>, auto_approve: bool) -> Result<(), String> {
    let config = load_config(file, region)?;
    let controller = connect(&config).await?;
    let lock = acquire_lock(controller.store(), &config, Operation::Delete, "delete").await?;
    let result = delete_locked(&controller, &config, auto_approve).await;
    release_lock(controller.store(), &lock, result).await
}

async fn delete_locked(
    controller: &Controller,
    config: &ProjectConfig,
    auto_approve: bool,
) -> Result<(), String> {
    let name = &config.account.name;
    let Some(handle) = controller
        .store()
        .load(name)
        .await
        .map_err(|e| e.to_string())?
    else {
        println!("{}", format!("{} is not tracked in state. Nothing to delete.", name).yellow());
        return Ok(());
    };

    println!("{}", "Delete Plan:".bold());
    println!();
    println!("  {} {}", "-".red().bold(), format_handle(&handle));
    println!();

    if !auto_approve && !confirm("Do you really want to terminate this account?")? {
        println!();
        println!("{}", "Delete cancelled.".yellow());
        return Ok(());
    }

    println!("{}", "Terminating...".red().bold());
    match controller.delete(&handle).await {
        Ok(()) => {
            println!("  {} {}", "✓".green(), name);
            println!();
            println!("{}", "Delete complete!".green().bold());
            Ok(())
        }
        Err(e) => Err(explain_failure(&e)),
    }
}

fn confirm(question: &str) -> Result<bool, String> {
    println!("{}", question.yellow().bold());
    println!(
        "  {}",
        "This action cannot be undone. Type 'yes' to confirm.".yellow()
    );
    print!("\n  Enter a value: ");
    std::io::stdout().flush().map_err(|e| e.to_string())?;

    let mut input = String::new();
    std::io::stdin()
        .read_line(&mut input)
        .map_err(|e| e.to_string())?;
    println!();
    Ok(input.trim() == "yes")
}

async fn run_status(file: &Path, region: Option<String>) -> Result<(), String> {
    let config = load_config(file, region)?;
    let controller = connect(&config).await?;
    let name = &config.account.name;

    let Some(handle) = controller
        .store()
        .load(name)
        .await
        .map_err(|e| e.to_string())?
    else {
        println!("{}", format!("{} is not tracked in state.", name).yellow());
        return Ok(());
    };

    println!("{}", format_handle(&handle));
    match controller.status(&handle).await {
        Ok(Some(record)) => println!("  {}", format_record(&record)),
        Ok(None) if handle.tracking_id.is_some() => {
            println!("  {}", "No record visible yet.".dimmed())
        }
        Ok(None) => println!("  {}", "No operation on record.".dimmed()),
        Err(e) => return Err(format!("Failed to describe {}: {}", name, e)),
    }
    Ok(())
}

async fn run_import(file: &Path, resource_id: &str) -> Result<(), String> {
    let config = load_config(file, None)?;
    let controller = connect(&config).await?;
    let lock = acquire_lock(controller.store(), &config, Operation::Create, "import").await?;
    let result = import_locked(&controller, &config, resource_id).await;
    release_lock(controller.store(), &lock, result).await
}

async fn import_locked(
    controller: &Controller,
    config: &ProjectConfig,
    resource_id: &str,
) -> Result<(), String> {
    let name = &config.account.name;
    if let Some(existing) = controller
        .store()
        .load(name)
        .await
        .map_err(|e| e.to_string())?
    {
        return Err(format!(
            "{} is already tracked as {}.",
            name, existing.resource_id
        ));
    }

    let handle = controller
        .import(name, resource_id)
        .await
        .map_err(|e| e.to_string())?;
    println!("  {} Imported {}", "✓".green(), format_handle(&handle));
    Ok(())
}

async fn run_list(file: &Path) -> Result<(), String> {
    let config = load_config(file, None)?;
    let store = open_store(&config)?;
    let handles = store.load_all().await.map_err(|e| e.to_string())?;

    if handles.is_empty() {
        println!("{}", "No accounts tracked in state.".yellow());
        return Ok(());
    }
    for handle in &handles {
        println!("  {}", format_handle(handle));
    }
    println!();
    println!("{} tracked.", handles.len().to_string().bold());
    Ok(())
}

async fn run_force_unlock(file: &Path, lock_id: &str) -> Result<(), String> {
    let config = load_config(file, None)?;
    let store = open_store(&config)?;
    store
        .backend()
        .force_unlock(lock_id)
        .await
        .map_err(|e| e.to_string())?;
    println!("{} {}", "Lock removed:".green().bold(), lock_id);
    Ok(())
}

fn format_handle(handle: &ResourceHandle) -> String {
    match &handle.tracking_id {
        Some(tracking_id) => format!(
            "{} ({}, record {})",
            handle.name.bold(),
            handle.resource_id,
            tracking_id
        ),
        None => format!("{} ({})", handle.name.bold(), handle.resource_id),
    }
}

fn format_record(record: &OperationRecord) -> String {
    let status_text = match record.status.as_str() {
        status::SUCCEEDED => record.status.green().to_string(),
        status::CREATED | status::IN_PROGRESS => record.status.yellow().to_string(),
        _ => record.status.red().to_string(),
    };
    let mut line = format!("record {}: {}", record.tracking_id, status_text);
    if !record.errors.is_empty() {
        line.push_str(&format!(" - {}", record.errors.join("; ")));
    }
    line
}

const LOCKED_HINT: &str =
    "If no other run is active, remove the lock with `vendo force-unlock <LOCK_ID>`.";

const CREATE_KEPT_HINT: &str = "The handle was kept in state; \
    run `vendo status` to check on it or `vendo delete` to clean up.";

const DELETE_KEPT_HINT: &str = "The handle was kept in state; \
    run `vendo delete` again once the termination settles.";

/// Error text plus what the user can do about a half-finished operation
fn explain_failure(err: &LifecycleError) -> String {
    match err {
        LifecycleError::Wait { operation, .. } | LifecycleError::Store { operation, .. } => {
            let hint = match operation {
                Operation::Create => CREATE_KEPT_HINT,
                Operation::Delete => DELETE_KEPT_HINT,
            };
            format!("{}\n  {}", err, hint)
        }
        _ => err.to_string(),
    }
}
