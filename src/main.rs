use crossbeam::channel;
use log::{debug, error, info};
use simple_http_server::{Server, ServerConfig, ServerError, ServerResult};
use std::env;
use std::path::Path;
use std::process;

/// `simple-http-server [CONFIG.json | ROOT_DIR [PORT]]`
fn load_config() -> ServerResult<ServerConfig> {
    let args: Vec<String> = env::args().skip(1).collect();

    let config = match args.first() {
        Some(arg) if arg.ends_with(".json") && Path::new(arg).is_file() => {
            // Load configuration from file
            ServerConfig::from_json_file(arg)?
        }
        Some(root) => {
            let mut config = ServerConfig::default().with_root_dir(root);
            if let Some(port) = args.get(1) {
                let port = port.parse::<u16>().map_err(|_| {
                    ServerError::Config(format!("invalid port: {}", port))
                })?;
                config.port = port;
            }
            config
        }
        None => ServerConfig::default(),
    };

    Ok(config)
}

fn run() -> ServerResult<()> {
    let config = load_config()?;
    let server = Server::new(config);
    server.start()?;

    let (tx, rx) = channel::bounded(1);
    ctrlc::set_handler(move || {
        let _ = tx.try_send(());
    })
    .map_err(|e| ServerError::Config(format!("cannot install Ctrl-C handler: {}", e)))?;

    // Block until Ctrl-C
    let _ = rx.recv();
    info!("Received shutdown signal. Stopping server...");
    server.stop();

    let stats = server.stats();
    info!(
        "Served {} request(s) over {} connection(s)",
        stats.requests_served, stats.connections_accepted
    );
    if let Ok(json) = stats.to_json() {
        debug!("Final stats: {}", json);
    }
    Ok(())
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    if let Err(e) = run() {
        error!("{}", e);
        process::exit(1);
    }
}
