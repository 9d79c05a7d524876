use std::sync::Arc;

use clap::Parser;
use tracing::{error, info};

use redirns::config::ConfigFile;
use redirns::store::StorePool;

mod cli;

#[tokio::main]
async fn main() {
    let args = cli::Cli::parse();
    let opts = args.opts();

    let mut config = ConfigFile::from_env();
    if let Some(bind) = opts.bind {
        config.address = bind;
    }
    if let Some(redis) = opts.redis {
        config.redis_host = redis;
    }
    if let Some(redis_db) = opts.redis_db {
        config.redis_db = redis_db;
    }
    if let Some(dns_relay) = opts.dns_relay {
        config.dns_relay = dns_relay;
    }

    if let Err(error) = redirns::logging::init_logging(opts.debug) {
        eprintln!("failed to start logging: {error}");
    }

    if args.is_print_config() {
        println!("{}", config.as_json_pretty());
        return;
    }

    info!("starting with config: {config}");

    let pool = Arc::new(StorePool::new(
        &config.redis_host,
        config.redis_port,
        config.redis_db,
        config.pool_size,
        config.store_connect_timeout_ms,
        config.store_read_timeout_ms,
    ));
    let config = Arc::new(config);

    if let Err(error) = redirns::server::run(config, pool).await {
        error!("fatal startup error: {error}");
        std::process::exit(1);
    }
}
