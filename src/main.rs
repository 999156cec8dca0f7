use peachy_social::logger::*;
use peachy_social::server::*;
use peachy_social::settings::*;
use tokio::signal;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let logger = Logger::new_bootstrap();

    let project_settings = parse_settings(cli.settings.as_deref())?;
    info!(?project_settings);
    let logger_config = LogConfig {
        filter: cli
            .log_filter
            .clone()
            .unwrap_or_else(|| project_settings.log.filter.clone()),
    };
    logger.reload_from_config(&logger_config)?;

    let server = Server::try_new(&project_settings).await?;

    signal::ctrl_c().await?;

    let shutdown_timeout = std::time::Duration::from_secs(30);
    match tokio::time::timeout(shutdown_timeout, server.shutdown()).await {
        Ok(_) => info!("server shutdown successfully"),
        Err(_) => error!("server shutdown timed out"),
    }

    Ok(())
}
