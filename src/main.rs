/*!
Here we go!
*/
use std::sync::Arc;

use simplelog::{ColorChoice, TerminalMode, TermLogger};
use tokio::{
    net::TcpListener,
    signal::ctrl_c,
    sync::RwLock,
};

use alma::{config, inter};

/// Resolves on Ctrl+C or (on unix) SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        match ctrl_c().await {
            Ok(()) => log::info!("Received Ctrl+C; shutting down."),
            Err(e) => {
                log::error!("Unable to listen for Ctrl+C: {}", &e);
                std::future::pending::<()>().await;
            },
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};

        match signal(SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
                log::info!("Received terminate signal; shutting down.");
            },
            Err(e) => {
                log::error!("Unable to install SIGTERM handler: {}", &e);
                std::future::pending::<()>().await;
            },
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

#[tokio::main]
async fn main() {
    let log_cfg = simplelog::ConfigBuilder::new()
        .add_filter_allow_str("alma")
        .build();
    TermLogger::init(
        alma::log_level_from_env(),
        log_cfg,
        TerminalMode::Stdout,
        ColorChoice::Auto
    ).unwrap();
    log::info!("Logging started.");

    let cfg_path = config::config_path(
        std::env::args().nth(1),
        std::env::var(config::CONFIG_ENV_VAR).ok()
    );
    log::info!("Reading configuration from {}", cfg_path.display());

    let (cfg, glob) = match config::load_configuration(&cfg_path).await {
        Ok(x) => x,
        Err(e) => {
            log::error!("Unable to start: {}", &e);
            std::process::exit(1);
        },
    };

    if let Err(e) = inter::init(&cfg.templates_dir) {
        log::error!("Unable to load templates: {}", &e);
        std::process::exit(1);
    }

    let app = inter::router(Arc::new(RwLock::new(glob)), &cfg.static_dir);

    let listener = match TcpListener::bind(cfg.addr).await {
        Ok(listener) => listener,
        Err(e) => {
            log::error!("Unable to bind {}: {}", &cfg.addr, &e);
            std::process::exit(1);
        },
    };
    log::info!("Listening on {}", &cfg.addr);

    if let Err(e) = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
    {
        log::error!("Server error: {}", &e);
        std::process::exit(1);
    }

    log::info!("Server shut down.");
}
