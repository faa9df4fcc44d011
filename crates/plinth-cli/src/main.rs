use clap::{Args, Parser, Subcommand};
use owo_colors::OwoColorize;
use plinth::{
    DestructiveReset, ExecutionReport, MigrationExecutor, Outcome, SchemaInspector, SkipReason,
};
use std::collections::BTreeSet;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

mod config;
mod tables;

use config::{ConfigError, DatabaseConfig};

/// Create the forum database tables, in dependency order, in one transaction.
#[derive(Parser, Debug)]
#[command(name = "plinth", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create missing tables
    Migrate(MigrateArgs),
    /// Show the SQL `migrate` would run, without running it
    Plan(ConnectArgs),
    /// Print the built-in schema as DDL
    Schema,
}

#[derive(Args, Debug)]
struct ConnectArgs {
    /// Database connection URL (overrides config and environment)
    #[arg(long)]
    database_url: Option<String>,
}

#[derive(Args, Debug)]
struct MigrateArgs {
    #[command(flatten)]
    connect: ConnectArgs,

    /// Drop and recreate the schema first. Destroys all data in it.
    #[arg(long)]
    reset: bool,

    /// Roll back if the migration takes longer than this
    #[arg(long, value_name = "SECS")]
    timeout: Option<u64>,
}

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Plinth(#[from] plinth::Error),
}

impl From<plinth::PlanError> for CliError {
    fn from(err: plinth::PlanError) -> Self {
        CliError::Plinth(err.into())
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            if let CliError::Plinth(inner) = &err {
                if let Some(report) = inner.report() {
                    print_report(report);
                }
            }
            eprintln!("{} {}", "error:".red().bold(), err);
            ExitCode::FAILURE
        }
    }
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("plinth=info,plinth_cli=info"));
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(filter)
        .init();
}

async fn run(cli: Cli) -> Result<(), CliError> {
    match cli.command {
        Command::Schema => {
            let (config, _) = config::load()?;
            println!("{}", schema_sql(&config)?);
            Ok(())
        }
        Command::Plan(args) => plan(args).await,
        Command::Migrate(args) => migrate(args).await,
    }
}

/// DDL for the built-in tables in the configured namespace, as if the
/// database were empty.
fn schema_sql(config: &DatabaseConfig) -> Result<String, CliError> {
    let spec = tables::schema(&config.schema);
    let ops = plinth::plan(&spec, &BTreeSet::new())?;
    Ok(plinth::render_sql(&ops))
}

fn load_config(connect: &ConnectArgs) -> Result<DatabaseConfig, CliError> {
    let (mut config, path) = config::load()?;
    if let Some(path) = path {
        tracing::debug!(path = %path.display(), "loaded config");
    }
    if let Some(url) = &connect.database_url {
        config.url = Some(url.clone());
    }
    Ok(config)
}

async fn plan(args: ConnectArgs) -> Result<(), CliError> {
    let config = load_config(&args)?;
    let pool = plinth::single_connection_pool(config.pg_config()?)?;
    let conn = plinth::acquire(&pool).await?;

    let spec = tables::schema(&config.schema);
    let current = SchemaInspector::new(&conn, &spec.namespace)
        .current_tables()
        .await?;
    let ops = plinth::plan(&spec, &current)?;

    if ops.is_empty() {
        println!("{}", "Nothing to do, all tables exist.".green());
    } else {
        println!("{}", plinth::render_sql(&ops));
    }
    Ok(())
}

async fn migrate(args: MigrateArgs) -> Result<(), CliError> {
    let mut config = load_config(&args.connect)?;
    if let Some(secs) = args.timeout {
        config.timeout_secs = Some(secs);
    }

    eprintln!("{} {}", "database:".dimmed(), config.display_target());
    let pool = plinth::single_connection_pool(config.pg_config()?)?;
    let mut conn = plinth::acquire(&pool).await?;

    let mut executor = MigrationExecutor::new(&mut conn);
    if let Some(timeout) = config.timeout() {
        executor = executor.with_timeout(timeout);
    }

    if args.reset {
        let reset = config
            .grantees()
            .into_iter()
            .fold(DestructiveReset::new(&config.schema), DestructiveReset::grant)
            .confirm();
        let report = reset.reset(&mut executor).await?;
        print_report(&report);
    }

    let spec = tables::schema(&config.schema);
    let current = SchemaInspector::new(executor.client(), &spec.namespace)
        .current_tables()
        .await?;
    let ops = plinth::plan(&spec, &current)?;
    if ops.is_empty() {
        println!("{}", "Nothing to do, all tables exist.".green());
        return Ok(());
    }

    let report = executor.apply(&ops).await?;
    print_report(&report);
    println!(
        "{} {} applied, {} skipped",
        "done:".green().bold(),
        report.applied(),
        report.skipped()
    );
    Ok(())
}

fn print_report(report: &ExecutionReport) {
    for result in &report.results {
        let label = format!("{:>12}", short_outcome(&result.outcome));
        let label = match &result.outcome {
            Outcome::Applied => label.green().to_string(),
            Outcome::Skipped(_) => label.dimmed().to_string(),
            Outcome::RolledBack => label.yellow().to_string(),
            Outcome::Failed { .. } => label.red().bold().to_string(),
        };
        println!("{}  {}", label, result.operation);
    }
}

fn short_outcome(outcome: &Outcome) -> &'static str {
    match outcome {
        Outcome::Applied => "applied",
        Outcome::Skipped(SkipReason::AlreadyExists) => "exists",
        Outcome::Skipped(SkipReason::NotPresent) => "absent",
        Outcome::Skipped(SkipReason::Aborted) => "aborted",
        Outcome::RolledBack => "rolled back",
        Outcome::Failed { .. } => "failed",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schema_sql_uses_configured_namespace() {
        let config = DatabaseConfig {
            schema: "forum".to_string(),
            ..Default::default()
        };
        let sql = schema_sql(&config).unwrap();
        assert!(sql.contains(r#"CREATE TABLE IF NOT EXISTS "forum"."user""#));
        assert!(sql.contains(r#"REFERENCES "forum"."article""#));
        assert!(!sql.contains(r#""public"."#));
    }
}
