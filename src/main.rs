use anyhow::Result;
use std::sync::Arc;
use tokio::io::BufReader;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use queuebot::{
    bot::{console::Console, MusicBot},
    config::Config,
};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("queuebot=debug".parse()?),
        )
        .with_writer(std::io::stderr)
        .init();

    info!("🎵 Iniciando queuebot v{}", env!("CARGO_PKG_VERSION"));

    let config = Config::load()?;
    info!("{}", config.summary());

    let (bot, events) = MusicBot::new(config);
    let bot = Arc::new(bot);
    let shutdown = CancellationToken::new();
    let listener = bot.spawn_event_loop(events, shutdown.clone());

    // Ctrl+C cierra la consola igual que `quit`
    let signal = shutdown.clone();
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Error al registrar Ctrl+C: {:?}", e);
            return;
        }
        info!("⚠️ Señal de shutdown recibida, cerrando...");
        signal.cancel();
    });

    let mut console = Console::new(Arc::clone(&bot));
    let stdin = BufReader::new(tokio::io::stdin());
    if let Err(e) = console.run(stdin, tokio::io::stdout(), shutdown.clone()).await {
        error!("Error en la consola: {:?}", e);
    }

    bot.shutdown().await;
    shutdown.cancel();
    listener.await?;

    info!("👋 Bot detenido");
    Ok(())
}
