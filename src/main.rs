use lxp_telemetry::prelude::*;

use std::io::Write;
use std::time::Duration;

fn init_logging(level: &str) {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format(|buf, record| {
            writeln!(
                buf,
                "[{} {} {}] {}",
                chrono::Local::now().format("%Y-%m-%dT%H:%M:%S%.3f"),
                record.level(),
                record.module_path().unwrap_or(""),
                record.args()
            )
        })
        .write_style(env_logger::WriteStyle::Never)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let options = Options::new();

    let config = Config::new(options.config_file.clone())?;
    init_logging(&config.loglevel);
    info!("using config file {}", options.config_file);
    config.log_summary();

    let config = ConfigWrapper::from_config(config);

    let (shutdown_tx, shutdown_rx) = broadcast::channel(1);

    let tx = shutdown_tx.clone();
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
        }
        let _ = tx.send(());
    });

    if let Some(runtime) = options.runtime {
        let tx = shutdown_tx.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(runtime)).await;
            info!("runtime of {}s reached", runtime);
            let _ = tx.send(());
        });
    }

    lxp_telemetry::app(shutdown_rx, config).await?;

    Ok(())
}
