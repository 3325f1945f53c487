use std::sync::Arc;

use clap::Parser;
use sqlx::postgres::PgPoolOptions;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use grantor_core::page::PageRequest;
use grantor_engine::account::AccountService;
use grantor_engine::cache::{AuthCache, NoopCache};
use grantor_engine::cli::{Cli, Command};
use grantor_engine::config::{AppConfig, LogFormat};
use grantor_storage::postgres::{PostgresStore, migrations};

fn init_logging(config: &AppConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log.level));

    let registry = tracing_subscriber::registry().with(filter);

    match config.log.format {
        LogFormat::Json => {
            let fmt_layer = tracing_subscriber::fmt::layer().json();
            registry.with(fmt_layer).init();
        }
        LogFormat::Pretty => {
            let fmt_layer = tracing_subscriber::fmt::layer().pretty();
            registry.with(fmt_layer).init();
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let config = AppConfig::load(cli.config.as_deref())?;
    init_logging(&config);

    match cli.command {
        Command::Migrate => run_migrate(&config).await,
        command => run_admin(&config, command).await,
    }
}

async fn connect(config: &AppConfig) -> Result<sqlx::PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(config.database.max_connections)
        .connect(&config.database.url)
        .await
}

async fn run_migrate(config: &AppConfig) -> Result<(), Box<dyn std::error::Error>> {
    tracing::info!("running database migrations");
    let pool = connect(config).await?;
    migrations::run_migrations(&pool).await?;
    tracing::info!("migrations completed successfully");
    Ok(())
}

async fn run_admin(config: &AppConfig, command: Command) -> Result<(), Box<dyn std::error::Error>> {
    let pool = connect(config).await?;
    let store = Arc::new(PostgresStore::new(pool));
    // One-shot invocations never read their own cache entries back.
    let cache: Arc<dyn AuthCache> = Arc::new(NoopCache);
    let accounts = AccountService::new(store, cache);

    match command {
        Command::CreateUser { name, password } => {
            let id = accounts.register(&name, &password).await?;
            println!("User created: {name} (id {id})");
        }
        Command::CreateRole { name } => {
            let id = accounts.graph().create_role(&name).await?;
            println!("Role created: {name} (id {id})");
        }
        Command::CreatePermission { name } => {
            let id = accounts.graph().create_permission(&name).await?;
            println!("Permission created: {name} (id {id})");
        }
        Command::GrantRole { user, role } => {
            accounts.graph().add_role_to_user(&user, &role).await?;
            println!("Granted role '{role}' to user '{user}'");
        }
        Command::GrantPermission { role, permission } => {
            accounts
                .graph()
                .add_permission_to_role(&role, &permission)
                .await?;
            println!("Granted permission '{permission}' to role '{role}'");
        }
        Command::ShowPermissions { user } => {
            let summary = accounts.user_summary(&user).await?;
            println!("User: {} (id {})", summary.user.name, summary.user.id);
            println!("Roles:");
            for role in &summary.roles {
                println!("  {role}");
            }
            println!("Effective permissions:");
            for permission in &summary.permissions {
                println!("  {permission}");
            }
        }
        Command::ListUsers { page } => {
            let request = PageRequest::new(page, config.pagination.page_size);
            let users = accounts.graph().list_users(request).await?;
            println!(
                "Users (page {} of {}, {} total):",
                users.number,
                users.total_pages(),
                users.total
            );
            for user in &users.items {
                println!("  {} (id {})", user.name, user.id);
            }
        }
        Command::Migrate => unreachable!("handled before connecting"),
    }

    Ok(())
}
