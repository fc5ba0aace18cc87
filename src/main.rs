use clap::{Arg, Command};
use dotenv::dotenv;
use std::process;
use tenantd::config::Config;
use tenantd::db::ConnectionPool;
use tenantd::server;

#[tokio::main]
async fn main() {
    // Load environment variables from .env file
    dotenv().ok();

    let matches = build_cli().get_matches();

    if let Err(e) = run_command(matches).await {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

fn build_cli() -> Command {
    Command::new("tenantd")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Multi-tenant HTTP demo service backed by pooled PostgreSQL")
        .arg_required_else_help(true)
        .subcommand(
            Command::new("serve")
                .about("Start the public and internal listeners")
                .arg(
                    Arg::new("public-port")
                        .long("public-port")
                        .help("Override the public listener port")
                        .value_parser(clap::value_parser!(u16)),
                )
                .arg(
                    Arg::new("internal-port")
                        .long("internal-port")
                        .help("Override the internal listener port")
                        .value_parser(clap::value_parser!(u16)),
                )
                .arg(
                    Arg::new("host")
                        .long("host")
                        .help("Override the bind address"),
                ),
        )
        .subcommand(
            Command::new("check-config")
                .about("Print the effective configuration (secrets redacted) and exit"),
        )
}

async fn run_command(matches: clap::ArgMatches) -> anyhow::Result<()> {
    match matches.subcommand() {
        Some(("serve", sub_matches)) => {
            let mut config = Config::load()?;
            if let Some(port) = sub_matches.get_one::<u16>("public-port") {
                config.server.public_port = *port;
            }
            if let Some(port) = sub_matches.get_one::<u16>("internal-port") {
                config.server.internal_port = *port;
            }
            if let Some(host) = sub_matches.get_one::<String>("host") {
                config.server.host = host.clone();
            }

            init_tracing(&config);
            tracing::info!(
                tenant = %config.tenant.name,
                database = %config.database.host,
                "Starting tenantd"
            );

            let pool = ConnectionPool::from_config(&config.database, &config.pool)?;
            server::serve(config, pool).await?;
        }
        Some(("check-config", _)) => {
            let config = Config::load()?;
            println!("{}", serde_json::to_string_pretty(&config.redacted())?);
        }
        _ => {
            unreachable!("Command parsing should ensure we never reach this");
        }
    }

    Ok(())
}

fn init_tracing(config: &Config) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.logging.level));

    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    match config.logging.format.as_str() {
        "json" => builder.json().init(),
        "compact" => builder.compact().init(),
        _ => builder.init(),
    }
}
