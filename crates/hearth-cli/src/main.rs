mod auth_cmds;
mod compliance_cmd;
mod config;
mod plan_cmds;
mod resolve;
mod task_cmds;

use clap::{Parser, Subcommand};
use uuid::Uuid;

use hearth_db::pool;

use config::HearthConfig;

#[derive(Parser)]
#[command(name = "hearth", about = "In-home care plan and visit task manager")]
struct Cli {
    /// Database URL (overrides HEARTH_DATABASE_URL env var)
    #[arg(long, global = true)]
    database_url: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Write a hearth config file (no database required)
    Init {
        /// PostgreSQL connection URL
        #[arg(long, default_value = "postgresql://localhost:5432/hearth")]
        db_url: String,
        /// Operator user UUID stamped on every write
        #[arg(long)]
        user_id: Uuid,
        /// Organization UUID scoping every read and write
        #[arg(long)]
        organization_id: Uuid,
        /// Overwrite existing config file
        #[arg(long)]
        force: bool,
    },
    /// Initialize the hearth database (requires config file or env vars)
    DbInit,
    /// Care plan management
    Plan {
        #[command(subcommand)]
        command: PlanCommands,
    },
    /// Visit task generation and transitions
    Task {
        #[command(subcommand)]
        command: TaskCommands,
    },
    /// Service authorization ledger
    Auth {
        #[command(subcommand)]
        command: AuthCommands,
    },
    /// Evaluate jurisdiction compliance rules against a plan
    Compliance {
        /// Plan ID or path to the plan TOML file
        plan: String,
        /// Emit the report as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand)]
pub enum PlanCommands {
    /// Register a plan from a TOML file and write the ID back into it
    Create {
        /// Path to the plan TOML file
        file: String,
    },
    /// Show plan details (or list all plans in the organization)
    Show {
        /// Plan ID or TOML path (omit to list all)
        plan: Option<String>,
    },
    /// Send a draft plan for approval
    Submit {
        /// Plan ID or TOML path
        plan: String,
    },
    /// Activate a pending or on-hold plan (expires the client's current one)
    Activate {
        /// Plan ID or TOML path
        plan: String,
    },
    /// Place an active plan on hold
    Hold {
        /// Plan ID or TOML path
        plan: String,
    },
    /// Permanently discontinue a plan
    Discontinue {
        /// Plan ID or TOML path
        plan: String,
    },
    /// Mark a plan's course of care as completed
    Complete {
        /// Plan ID or TOML path
        plan: String,
    },
    /// Soft-delete a plan (active plans are refused)
    Delete {
        /// Plan ID or TOML path
        plan: String,
    },
    /// Export a plan from the database as TOML
    Export {
        /// Plan ID or TOML path
        plan: String,
        /// Output file path (defaults to stdout)
        #[arg(long)]
        output: Option<String>,
    },
}

#[derive(Subcommand)]
pub enum TaskCommands {
    /// Generate task instances for one visit from an active plan
    Generate {
        /// Plan ID or TOML path
        plan: String,
        /// Visit UUID (a new one is minted when omitted)
        #[arg(long)]
        visit: Option<String>,
        /// Visit date, YYYY-MM-DD (defaults to today)
        #[arg(long)]
        date: Option<String>,
    },
    /// Manually create one occurrence from a named template
    Add {
        /// Plan ID or TOML path
        plan: String,
        /// Template name within the plan
        template: String,
        /// Scheduled date, YYYY-MM-DD (defaults to today)
        #[arg(long)]
        date: Option<String>,
        /// Scheduled time, HH:MM
        #[arg(long)]
        time: Option<String>,
        /// Visit UUID to attach the task to
        #[arg(long)]
        visit: Option<String>,
    },
    /// List tasks for a plan or a visit
    List {
        /// Plan ID or TOML path
        #[arg(long)]
        plan: Option<String>,
        /// Visit UUID
        #[arg(long)]
        visit: Option<String>,
    },
    /// Show one task with its recorded evidence
    Show {
        /// Task ID
        task_id: String,
    },
    /// Mark a scheduled task as started
    Start {
        /// Task ID
        task_id: String,
    },
    /// Complete a task, recording evidence and deducting billable units
    Complete {
        /// Task ID
        task_id: String,
        /// Completion note
        #[arg(long)]
        note: Option<String>,
        /// Signer name (records a signature)
        #[arg(long)]
        signer: Option<String>,
        /// Reference to a stored signature image
        #[arg(long)]
        signature_ref: Option<String>,
        /// Reference to a stored photo (repeatable)
        #[arg(long)]
        photo: Vec<String>,
        /// Completion location latitude
        #[arg(long)]
        latitude: Option<f64>,
        /// Completion location longitude
        #[arg(long)]
        longitude: Option<f64>,
        /// Systolic blood pressure, mmHg
        #[arg(long)]
        systolic: Option<i32>,
        /// Diastolic blood pressure, mmHg
        #[arg(long)]
        diastolic: Option<i32>,
        /// Heart rate, bpm
        #[arg(long)]
        heart_rate: Option<i32>,
        /// Oxygen saturation, percent
        #[arg(long)]
        spo2: Option<f32>,
        /// Body temperature, Fahrenheit
        #[arg(long)]
        temperature: Option<f32>,
    },
    /// Skip a task with a documented reason
    Skip {
        /// Task ID
        task_id: String,
        /// Why the task was not performed
        #[arg(long)]
        reason: String,
        /// Additional context
        #[arg(long)]
        note: Option<String>,
    },
    /// Flag a task with a care issue needing coordinator attention
    Issue {
        /// Task ID
        task_id: String,
        /// What went wrong
        description: String,
    },
    /// Cancel a task that is no longer needed
    Cancel {
        /// Task ID
        task_id: String,
    },
    /// Mark a scheduled task as missed
    Missed {
        /// Task ID
        task_id: String,
    },
}

#[derive(Subcommand)]
pub enum AuthCommands {
    /// Register a payer service authorization
    Create {
        /// Client UUID the authorization covers
        client_id: String,
        /// Payer name, e.g. "TX Medicaid"
        #[arg(long)]
        payer: String,
        /// Billing service code, e.g. T1019
        #[arg(long)]
        service_code: String,
        /// Total authorized units
        #[arg(long)]
        units: i32,
        /// Validity window start, YYYY-MM-DD
        #[arg(long)]
        starts: String,
        /// Validity window end, YYYY-MM-DD
        #[arg(long)]
        ends: String,
    },
    /// Show one authorization with its balance
    Show {
        /// Authorization ID
        authorization_id: String,
    },
    /// List a client's authorizations, soonest-expiring first
    List {
        /// Client UUID
        client_id: String,
    },
    /// Manually deduct units from an authorization
    Deduct {
        /// Authorization ID
        authorization_id: String,
        /// Units to deduct
        #[arg(long)]
        units: i32,
    },
    /// Recompute expired / expiring-soon statuses from today's date
    Refresh,
}

/// Execute the `hearth init` command: write config file.
fn cmd_init(db_url: &str, user_id: Uuid, organization_id: Uuid, force: bool) -> anyhow::Result<()> {
    let path = config::config_path();

    if path.exists() && !force {
        anyhow::bail!(
            "config file already exists at {}\nUse --force to overwrite.",
            path.display()
        );
    }

    let cfg = config::ConfigFile {
        database: config::DatabaseSection {
            url: db_url.to_string(),
        },
        operator: config::OperatorSection {
            user_id,
            organization_id,
        },
    };

    config::save_config(&cfg)?;

    println!("Config written to {}", path.display());
    println!("  database.url             = {db_url}");
    println!("  operator.user_id         = {user_id}");
    println!("  operator.organization_id = {organization_id}");
    println!();
    println!("Next: run `hearth db-init` to create and migrate the database.");

    Ok(())
}

/// Execute the `hearth db-init` command: create database and run migrations.
async fn cmd_db_init(cli_db_url: Option<&str>) -> anyhow::Result<()> {
    let resolved = HearthConfig::resolve(cli_db_url)?;

    println!("Initializing hearth database...");

    pool::ensure_database_exists(&resolved.db_config).await?;
    let db_pool = pool::create_pool(&resolved.db_config).await?;
    pool::run_migrations(&db_pool).await?;
    db_pool.close().await;

    println!("hearth db-init complete.");
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Init {
            db_url,
            user_id,
            organization_id,
            force,
        } => {
            cmd_init(&db_url, user_id, organization_id, force)?;
        }
        Commands::DbInit => {
            cmd_db_init(cli.database_url.as_deref()).await?;
        }
        Commands::Plan { command } => {
            let resolved = HearthConfig::resolve(cli.database_url.as_deref())?;
            let db_pool = pool::create_pool(&resolved.db_config).await?;
            let result = plan_cmds::run_plan_command(command, &db_pool, &resolved.ctx).await;
            db_pool.close().await;
            result?;
        }
        Commands::Task { command } => {
            let resolved = HearthConfig::resolve(cli.database_url.as_deref())?;
            let db_pool = pool::create_pool(&resolved.db_config).await?;
            let result = task_cmds::run_task_command(command, &db_pool, &resolved.ctx).await;
            db_pool.close().await;
            result?;
        }
        Commands::Auth { command } => {
            let resolved = HearthConfig::resolve(cli.database_url.as_deref())?;
            let db_pool = pool::create_pool(&resolved.db_config).await?;
            let result = auth_cmds::run_auth_command(command, &db_pool, &resolved.ctx).await;
            db_pool.close().await;
            result?;
        }
        Commands::Compliance { plan, json } => {
            let resolved = HearthConfig::resolve(cli.database_url.as_deref())?;
            let db_pool = pool::create_pool(&resolved.db_config).await?;
            let result = compliance_cmd::run_compliance(&db_pool, &resolved.ctx, &plan, json).await;
            db_pool.close().await;
            result?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod test_util {
    use std::sync::{Mutex, MutexGuard, OnceLock};

    static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();

    /// Serialize tests that mutate process environment variables.
    pub fn lock_env() -> MutexGuard<'static, ()> {
        ENV_LOCK
            .get_or_init(|| Mutex::new(()))
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }
}
