//! Perch: a fixed-resolution time-series store and daemon.
//!
//! This is the main entry point for the perch server.

use perch::{Config, LogLevel, Server, VERSION};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt};

#[derive(Debug, Default)]
struct Cli {
    config: Option<PathBuf>,
    bind: Option<String>,
    ingest_port: Option<u16>,
    query_port: Option<u16>,
    dir: Option<PathBuf>,
    resolution: Option<u64>,
    loglevel: Option<LogLevel>,
    help: bool,
    version: bool,
}

fn parse_args(args: &[String]) -> anyhow::Result<Cli> {
    let mut cli = Cli::default();
    let mut iter = args.iter().skip(1);

    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "-h" | "--help" => cli.help = true,
            "-v" | "--version" => cli.version = true,
            "-c" | "--config" => {
                cli.config = Some(PathBuf::from(required(&mut iter, arg)?));
            }
            "--bind" => cli.bind = Some(required(&mut iter, arg)?),
            "--ingest-port" | "--port" => {
                cli.ingest_port = Some(required(&mut iter, arg)?.parse()?);
            }
            "--query-port" => {
                cli.query_port = Some(required(&mut iter, arg)?.parse()?);
            }
            "--dir" => cli.dir = Some(PathBuf::from(required(&mut iter, arg)?)),
            "--resolution" => {
                let resolution: u64 = required(&mut iter, arg)?.parse()?;
                anyhow::ensure!(resolution > 0, "resolution must be positive");
                cli.resolution = Some(resolution);
            }
            "--loglevel" => {
                let value = required(&mut iter, arg)?;
                cli.loglevel = Some(
                    LogLevel::parse(&value)
                        .ok_or_else(|| anyhow::anyhow!("invalid loglevel: {value}"))?,
                );
            }
            other => anyhow::bail!("unknown argument: {other} (try --help)"),
        }
    }
    Ok(cli)
}

fn required(
    iter: &mut impl Iterator<Item = impl AsRef<str>>,
    flag: &str,
) -> anyhow::Result<String> {
    iter.next()
        .map(|v| v.as_ref().to_string())
        .ok_or_else(|| anyhow::anyhow!("missing value for {flag}"))
}

fn print_help() {
    println!(
        "perch {VERSION} - fixed-resolution time-series store\n\
         \n\
         USAGE:\n\
         \x20   perch [OPTIONS]\n\
         \n\
         OPTIONS:\n\
         \x20   -c, --config <FILE>       Load configuration from a file\n\
         \x20       --bind <ADDR>         Bind address (default 127.0.0.1)\n\
         \x20       --ingest-port <PORT>  Port for put lines (default 7070)\n\
         \x20       --query-port <PORT>   Port for query lines (default 7071)\n\
         \x20       --dir <DIR>           Data directory (default ./perch-data)\n\
         \x20       --resolution <N>      Bucket width in time units (default 60)\n\
         \x20       --loglevel <LEVEL>    debug, verbose, notice, or warning\n\
         \x20   -h, --help                Print help\n\
         \x20   -v, --version             Print version"
    );
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args: Vec<String> = std::env::args().collect();
    let cli = parse_args(&args)?;

    if cli.help {
        print_help();
        return Ok(());
    }
    if cli.version {
        println!("perch version {VERSION}");
        return Ok(());
    }

    let mut config = if let Some(ref config_path) = cli.config {
        match Config::load_from_file(config_path) {
            Ok(cfg) => {
                eprintln!("Loaded configuration from: {}", config_path.display());
                cfg
            }
            Err(e) => {
                eprintln!("Error loading config file: {e}");
                std::process::exit(1);
            }
        }
    } else {
        Config::default()
    };

    // CLI arguments override the config file.
    if let Some(bind) = cli.bind {
        config.bind = bind;
    }
    if let Some(port) = cli.ingest_port {
        config.ingest_port = port;
    }
    if let Some(port) = cli.query_port {
        config.query_port = port;
    }
    if let Some(dir) = cli.dir {
        config.dir = dir;
    }
    if let Some(resolution) = cli.resolution {
        config.resolution = resolution;
    }
    if let Some(loglevel) = cli.loglevel {
        config.loglevel = loglevel;
    }

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.loglevel.as_filter()));
    fmt().with_env_filter(filter).init();

    info!("Perch version {} starting", VERSION);

    let server = Arc::new(Server::new(config)?);

    let signal_server = server.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            signal_server.shutdown();
        }
    });

    server.run().await?;
    Ok(())
}
