use anyhow::{Context, Result};
use clap::{ArgAction, Args, Parser, Subcommand};
use tracing::info;

use dulce_bocatto::{
    config::{self, AppConfig},
    db,
    seed::{seed_defaults, SeedOptions},
};

#[derive(Parser)]
#[command(name = "dulce-cli", about = "Dulce Bocatto database maintenance", version)]
struct Cli {
    #[arg(
        long,
        global = true,
        help = "Database URL; defaults to the configured APP__DATABASE_URL"
    )]
    database_url: Option<String>,
    #[arg(
        long,
        global = true,
        action = ArgAction::SetTrue,
        help = "Render command output as pretty JSON"
    )]
    json: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Apply every pending migration
    Migrate,
    /// Migrate, then create the admin role, a staff user, the base product and sample flavors
    Seed(SeedArgs),
}

#[derive(Args)]
struct SeedArgs {
    #[arg(long, env = "DULCE_ADMIN_EMAIL", help = "Email of the initial staff account")]
    admin_email: String,
    #[arg(long, env = "DULCE_ADMIN_PASSWORD", help = "Password of the initial staff account")]
    admin_password: String,
    #[arg(long, default_value = "Administración", help = "Display name of the staff account")]
    admin_name: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let mut cfg = config::load_config().context("failed to load configuration")?;
    if let Some(url) = cli.database_url.clone() {
        cfg.database_url = url;
    }
    config::init_tracing(cfg.log_level(), cfg.log_json);

    match cli.command {
        Commands::Migrate => migrate(&cfg).await?,
        Commands::Seed(args) => seed(&cfg, args, cli.json).await?,
    }
    Ok(())
}

async fn connect(cfg: &AppConfig) -> Result<db::DbPool> {
    let pool = db::establish_connection_from_app_config(cfg)
        .await
        .context("failed to connect to the database")?;
    db::run_migrations(&pool)
        .await
        .context("failed to apply migrations")?;
    Ok(pool)
}

async fn migrate(cfg: &AppConfig) -> Result<()> {
    connect(cfg).await?;
    println!("Migrations applied");
    Ok(())
}

async fn seed(cfg: &AppConfig, args: SeedArgs, json: bool) -> Result<()> {
    let pool = connect(cfg).await?;
    let opts = SeedOptions {
        admin_email: args.admin_email,
        admin_password: args.admin_password,
        admin_name: args.admin_name,
        cookie_unit_price: cfg.cookie_unit_price,
    };
    let report = seed_defaults(&pool, &opts)
        .await
        .context("seeding failed")?;
    info!(usuario_admin_id = report.usuario_admin_id, "seed finished");

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!(
            "Rol {} (id {}) con todos los permisos",
            dulce_bocatto::seed::ADMIN_ROLE,
            report.rol_admin_id
        );
        println!(
            "Usuario administrador id {}{}",
            report.usuario_admin_id,
            if report.usuario_admin_creado { " (nuevo)" } else { "" }
        );
        println!("Producto base id {}", report.producto_id);
        println!("Sabores nuevos: {}", report.sabores_creados);
    }
    Ok(())
}
