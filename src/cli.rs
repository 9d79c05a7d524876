//! Command-line surface: overrides for the environment-driven config, plus
//! a `print-config` subcommand that dumps the resolved configuration and
//! exits without binding a socket.

use clap::{Parser, Subcommand};

#[derive(Parser, Clone, Default)]
pub struct ServerOpts {
    /// Overrides the `BIND` env var, `address:port` or bare address
    #[clap(long, env = "BIND")]
    pub bind: Option<String>,
    /// Overrides the `REDIS` env var, the override store's host
    #[clap(long, env = "REDIS")]
    pub redis: Option<String>,
    /// Overrides the `REDIS_DB` env var
    #[clap(long = "redis-db", env = "REDIS_DB")]
    pub redis_db: Option<u64>,
    /// Overrides the `DNS_RELAY` env var, the upstream resolver
    #[clap(long = "dns-relay", env = "DNS_RELAY")]
    pub dns_relay: Option<String>,
    /// Forces debug-level logging regardless of `RUST_LOG`
    #[clap(short, long)]
    pub debug: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Starts the DNS server (the default when no subcommand is given)
    Server {
        #[clap(flatten)]
        opts: ServerOpts,
    },
    /// Prints the resolved configuration as JSON and exits
    PrintConfig {
        #[clap(flatten)]
        opts: ServerOpts,
    },
}

impl Default for Commands {
    fn default() -> Self {
        Commands::Server {
            opts: ServerOpts::default(),
        }
    }
}

#[derive(Parser)]
#[command(arg_required_else_help(false))]
/// A lightweight authoritative-override DNS edge resolver.
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

impl Cli {
    pub fn opts(&self) -> ServerOpts {
        match &self.command {
            Some(Commands::Server { opts }) | Some(Commands::PrintConfig { opts }) => opts.clone(),
            None => ServerOpts::default(),
        }
    }

    pub fn is_print_config(&self) -> bool {
        matches!(self.command, Some(Commands::PrintConfig { .. }))
    }
}
