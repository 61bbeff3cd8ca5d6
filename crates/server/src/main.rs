use sea_orm::{ConnectOptions, Database};
use std::sync::Arc;
use tithe_declare::AppResources;
use tithe_declare::api::start_webserver;
use tithe_declare::config::load_config_or_panic;
use tithe_declare::mailer::build_mailer;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

fn initialize_tracing() {
    let default_directives = "tithe_declare=info,sea_orm=info,tower_http=info";
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directives));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer().with_target(true).with_level(true))
        .init();
}

#[tokio::main]
async fn main() -> color_eyre::eyre::Result<()> {
    color_eyre::install()?;
    initialize_tracing();

    let config = Arc::new(load_config_or_panic());
    tracing::info!(
        app = %config.app_name,
        alg = ?config.auth.alg,
        versions = ?config.known_versions,
        smtp = config.smtp.is_some(),
        audit = config.audit.enabled,
        "configuration loaded"
    );

    // sqlite only tolerates a single writer
    let mut options = ConnectOptions::new(config.database_url.clone());
    options.max_connections(1).sqlx_logging(false);
    let db = Arc::new(Database::connect(options).await?);

    if config.run_migrations {
        use migration::MigratorTrait;
        migration::Migrator::up(db.as_ref(), None).await?;
        tracing::info!("database migrations applied");
    }

    let mailer = match &config.smtp {
        Some(smtp) => match build_mailer(smtp) {
            Ok(mailer) => Some(mailer),
            Err(e) => {
                tracing::error!(
                    name = "mailer.build_failed",
                    target = concat!(env!("CARGO_PKG_NAME"), "::", module_path!()),
                    error = ?e,
                    relay = %smtp.server,
                    message = "Failed to set up SMTP transport; reset emails will not be sent"
                );
                None
            }
        },
        None => None,
    };

    let resources = AppResources::new(db, config, mailer)
        .map_err(|e| color_eyre::Report::msg(format!("Failed to set up token signer: {e}")))?;

    start_webserver(resources).await
}
