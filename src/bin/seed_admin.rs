//! Creates the first administrator account.
//!
//! Run with: cargo run --bin seed-admin -- --email admin@example.com --name Admin
//!
//! The password is read from `--password` or the `SEED_ADMIN_PASSWORD`
//! environment variable.

use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tokio::sync::mpsc;
use tracing::{info, warn};

use aberturas_api::{
    auth::UserRole,
    db::{self, DbConfig},
    errors::ServiceError,
    events::EventSender,
    services::users::{CreateUserInput, UserService},
};

#[derive(Parser)]
#[command(name = "seed-admin", about = "Create the first administrator account", version)]
struct Cli {
    #[arg(
        long,
        help = "Database URL; defaults to APP__DATABASE_URL or the local SQLite file"
    )]
    database_url: Option<String>,
    #[arg(long, help = "Email address for the account")]
    email: String,
    #[arg(long, default_value = "Administrador", help = "Display name")]
    name: String,
    #[arg(long, help = "Password; defaults to SEED_ADMIN_PASSWORD")]
    password: Option<String>,
    #[arg(long, help = "Apply pending migrations before seeding")]
    migrate: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    let cli = Cli::parse();

    let password = cli
        .password
        .or_else(|| std::env::var("SEED_ADMIN_PASSWORD").ok())
        .context("no password given; pass --password or set SEED_ADMIN_PASSWORD")?;

    let database_url = cli
        .database_url
        .or_else(|| std::env::var("APP__DATABASE_URL").ok())
        .unwrap_or_else(|| "sqlite://aberturas.db?mode=rwc".to_string());

    info!("Connecting to database: {}", database_url);
    let pool = db::establish_connection_with_config(&DbConfig {
        url: database_url,
        max_connections: 2,
        ..Default::default()
    })
    .await?;
    if cli.migrate {
        db::run_migrations(&pool).await?;
    }

    // Events from a one-off command go nowhere
    let (tx, _rx) = mpsc::channel(16);
    let users = UserService::new(Arc::new(pool), EventSender::new(tx));

    let input = CreateUserInput {
        name: cli.name,
        email: cli.email,
        password,
        role: UserRole::Admin,
        branch_id: None,
        phone: None,
        avatar: None,
    };

    match users.create_user(input).await {
        Ok(profile) => {
            info!(user_id = %profile.id, email = %profile.email, "Administrator created");
            Ok(())
        }
        Err(ServiceError::Conflict(message)) => {
            warn!("Nothing to do: {}", message);
            Ok(())
        }
        Err(e) => Err(e.into()),
    }
}
