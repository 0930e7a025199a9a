use clap::Parser;

use attendance_server::config::Config;
use attendance_server::db::{self, Bootstrap};
use attendance_server::{router, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let config = Config::parse();

    let state = AppState::from_config(&config).await?;
    let (admin, outcome) = db::bootstrap_admin(
        &state.credentials,
        &config.admin_username,
        config.admin_password.as_deref(),
        config.reset_admin,
    )
    .await?;
    if let Bootstrap::Created {
        generated_password: Some(password),
    } = outcome
    {
        log::warn!(
            "Generated password for admin `{}`: {} (set ADMIN_PASSWORD to choose one)",
            admin.username,
            password
        );
    }

    let app = router(state);
    let addr = config.socket_addr();
    log::info!("Starting attendance HTTP server on http://{}", addr);
    axum::Server::bind(&addr)
        .serve(app.into_make_service())
        .with_graceful_shutdown(async {
            tokio::signal::ctrl_c().await.ok();
        })
        .await?;
    Ok(())
}
