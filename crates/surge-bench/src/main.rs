use clap::Parser;
use hyper::{
    header::CONTENT_TYPE,
    service::{make_service_fn, service_fn},
    Body, Request, Response, Server, StatusCode,
};
use std::convert::Infallible;
use std::net::SocketAddr;
use std::path::Path;
use surge_bench::engine::exchange::Endpoint;
use surge_bench::engine::sweep::{SweepController, SweepPlan};
use surge_bench::{metrics, report};
use surge_common::{Config, LogFormat, LoggingConfig};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const DEFAULT_CONFIG_PATH: &str = "config/surge_config.yaml";

/// Measures request throughput of a SEND/CACHE service across concurrency levels.
#[derive(Parser, Debug)]
#[command(name = "surge", version, long_about = None)]
struct Args {
    /// Target host (overrides target.host); must be given together with PORT
    #[arg(requires = "port")]
    host: Option<String>,

    /// Target port (overrides target.port)
    port: Option<u16>,

    /// YAML config file
    #[arg(short, long)]
    config: Option<String>,

    /// Comma-separated volumes, e.g. 100,200,300
    #[arg(long, value_delimiter = ',')]
    volumes: Option<Vec<u64>>,

    /// Comma-separated concurrency levels, e.g. 5,10,50
    #[arg(long, value_delimiter = ',')]
    concurrency: Option<Vec<usize>>,

    /// Per-exchange deadline in milliseconds
    #[arg(long)]
    timeout_ms: Option<u64>,

    /// Results file path
    #[arg(short, long)]
    output: Option<String>,
}

/// `RUST_LOG` wins over the configured level. Exactly one of the two
/// formatting layers is active.
fn init_logging(cfg: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&cfg.level))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    let json = cfg.format == LogFormat::Json;

    tracing_subscriber::registry()
        .with(filter)
        .with(json.then(|| fmt::layer().json().with_target(true)))
        .with((!json).then(|| fmt::layer().compact().with_target(false)))
        .init();
}

async fn metrics_handler(req: Request<Body>) -> Result<Response<Body>, Infallible> {
    let response = match req.uri().path() {
        "/health" => Response::new(Body::from("OK")),
        "/metrics" => Response::builder()
            .header(CONTENT_TYPE, prometheus::TEXT_FORMAT)
            .body(Body::from(metrics::render_metrics()))
            .unwrap_or_else(|_| Response::new(Body::empty())),
        _ => {
            let mut not_found = Response::new(Body::from("Not Found"));
            *not_found.status_mut() = StatusCode::NOT_FOUND;
            not_found
        }
    };
    Ok(response)
}

/// Serves `/metrics` and `/health` until the sweep's token is cancelled.
async fn run_metrics_server(addr: SocketAddr, shutdown: CancellationToken) {
    let make_svc =
        make_service_fn(|_conn| async { Ok::<_, Infallible>(service_fn(metrics_handler)) });

    let server = match Server::try_bind(&addr) {
        Ok(builder) => builder.serve(make_svc),
        Err(e) => {
            error!(%addr, error = %e, "Metrics endpoint could not bind; continuing without it");
            return;
        }
    };
    info!(%addr, "Metrics endpoint online");

    let graceful = server.with_graceful_shutdown(async move { shutdown.cancelled().await });
    if let Err(e) = graceful.await {
        error!(error = %e, "Metrics endpoint failed");
    }
}

/// Config file (explicit, default path, or built-in defaults) with CLI
/// overrides applied. Also returns where the base config came from.
fn load_config(args: &Args) -> Result<(Config, &str), Box<dyn std::error::Error>> {
    let (mut config, source) = match &args.config {
        Some(path) => (Config::load(path)?, path.as_str()),
        None if Path::new(DEFAULT_CONFIG_PATH).exists() => {
            (Config::load(DEFAULT_CONFIG_PATH)?, DEFAULT_CONFIG_PATH)
        }
        None => (Config::default(), "built-in defaults"),
    };

    if let (Some(host), Some(port)) = (&args.host, args.port) {
        config.target.host = host.clone();
        config.target.port = port;
    }
    if let Some(volumes) = &args.volumes {
        config.sweep.volumes = volumes.clone();
    }
    if let Some(levels) = &args.concurrency {
        config.sweep.concurrency_levels = levels.clone();
    }
    if let Some(ms) = args.timeout_ms {
        config.sweep.exchange_timeout_ms = Some(ms);
    }
    if let Some(output) = &args.output {
        config.output.results_path = Some(output.clone());
    }

    config.sweep.validate()?;
    Ok((config, source))
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let (config, source) = load_config(&args)?;
    init_logging(&config.logging);
    info!(config = source, "Configuration loaded");

    let endpoint = Endpoint::new(config.target.host.clone(), config.target.port);
    let plan = SweepPlan::from_config(&config.sweep)?;
    let master_token = CancellationToken::new();

    if config.metrics.enabled {
        metrics::enable();
        let addr = SocketAddr::from(([0, 0, 0, 0], config.metrics.port));
        tokio::spawn(run_metrics_server(addr, master_token.clone()));
    }

    let signal_token = master_token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Shutdown signal received");
            signal_token.cancel();
        }
    });

    if plan.exchange_timeout.is_none() {
        warn!("No exchange timeout configured; a hung exchange stalls the sweep until Ctrl-C");
    }

    let mut controller = SweepController::new(endpoint, plan, master_token.clone());
    let outcome = controller.run().await;
    // stops the metrics endpoint whether or not the sweep finished
    master_token.cancel();
    let results = outcome?;

    let failures = results.total_failures();
    if failures > 0 {
        warn!(failures, "Some exchanges failed during the sweep");
    }

    if let Some(path) = &config.output.results_path {
        report::write_results(path, &results)?;
    }
    if config.output.print_tables {
        print!("{}", report::render_tables(&results));
    }

    Ok(())
}
