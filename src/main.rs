//! promcore exporter
//!
//! Serves a registry over HTTP. With `--demo` it also registers one
//! instrument of every type and drives them from a background workload so
//! all three exposition formats have something to show.
//!
//! ```text
//!   demo workload ──▶ Registry ◀── ScrapeHandler ◀── GET /metrics
//!   (tokio interval)                  │
//!                                     └── ExporterConfig (YAML + env)
//! ```

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tracing::{debug, info, Level};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use promcore::metrics::instrument::{self, OUTCOME_LABEL};
use promcore::{
    Counter, ExporterConfig, Gauge, Histogram, Info, Registry, ScrapeHandler, StateSet,
    StaticSpanContext, Summary, Unit,
};

// =============================================================================
// CLI Arguments
// =============================================================================

/// promcore exporter - Prometheus scrape endpoint
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Metrics server bind address
    #[arg(long, env = "METRICS_ADDR", default_value = "0.0.0.0:9400")]
    metrics_addr: String,

    /// Exporter configuration file (YAML)
    #[arg(long, env = "PROMCORE_CONFIG")]
    config: Option<PathBuf>,

    /// Include `_created` series in the exposition
    #[arg(long, env = "INCLUDE_CREATED_TIMESTAMPS")]
    include_created_timestamps: bool,

    /// Register demo instruments and drive them with synthetic load
    #[arg(long, env = "PROMCORE_DEMO")]
    demo: bool,

    /// Demo workload tick in milliseconds
    #[arg(long, env = "DEMO_INTERVAL_MS", default_value = "250")]
    demo_interval_ms: u64,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// Output logs as JSON
    #[arg(long, env = "LOG_JSON")]
    log_json: bool,
}

// =============================================================================
// Main
// =============================================================================

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    init_logging(&args)?;

    info!("Starting promcore exporter");
    info!("  Metrics address: {}", args.metrics_addr);
    info!("  Demo workload: {}", args.demo);

    let mut config = ExporterConfig::load(args.config.as_deref())?;
    if args.include_created_timestamps {
        config.include_created_timestamps = true;
    }
    debug!(?config, "Exporter configuration loaded");

    let registry = Arc::new(Registry::new());

    if args.demo {
        let demo = Demo::register(&registry)?;
        let interval = Duration::from_millis(args.demo_interval_ms.max(1));
        tokio::spawn(async move { demo.run(interval).await });
    }

    let handler = Arc::new(ScrapeHandler::new(registry, &config));
    promcore::exporter::run_metrics_server(&args.metrics_addr, handler).await?;

    info!("promcore exporter stopped");
    Ok(())
}

// =============================================================================
// Logging
// =============================================================================

fn init_logging(args: &Args) -> anyhow::Result<()> {
    let level = match args.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let filter = EnvFilter::from_default_env()
        .add_directive(level.into())
        .add_directive("hyper=warn".parse()?);

    if args.log_json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(true))
            .init();
    }
    Ok(())
}

// =============================================================================
// Demo Workload
// =============================================================================

const PATHS: [&str; 3] = ["/", "/api/items", "/api/orders"];

struct Demo {
    span: Arc<StaticSpanContext>,
    requests: Arc<Counter>,
    in_flight: Arc<Gauge>,
    latency: Arc<Histogram>,
    payload: Arc<Summary>,
    queue: Arc<StateSet>,
    tick: u64,
}

impl Demo {
    fn register(registry: &Registry) -> promcore::Result<Self> {
        let span = Arc::new(StaticSpanContext::new());

        let requests = Counter::builder("demo_requests")
            .help("Requests handled by the demo workload")
            .label_names(["path", OUTCOME_LABEL])
            .span_context(span.clone())
            .register(registry)?;
        let in_flight = Gauge::builder("demo_in_flight_requests")
            .help("Requests currently in flight")
            .register(registry)?;
        let latency = Histogram::builder("demo_request_duration_seconds")
            .help("Request latency")
            .unit(Unit::seconds())
            .label_names(["path"])
            .span_context(span.clone())
            .register(registry)?;
        let payload = Summary::builder("demo_payload_bytes")
            .help("Response payload size")
            .unit(Unit::bytes())
            .quantile(0.5, 0.05)
            .quantile(0.95, 0.01)
            .quantile(0.99, 0.001)
            .register(registry)?;
        let queue = StateSet::builder("demo_queue_state")
            .help("State of the demo work queue")
            .states(["idle", "busy", "draining"])
            .register(registry)?;

        let build = Info::builder("demo_build")
            .help("Build information")
            .label_names(["version"])
            .register(registry)?;
        build.set_label_values(&[env!("CARGO_PKG_VERSION")])?;

        info!("Registered demo instruments");
        Ok(Self {
            span,
            requests,
            in_flight,
            latency,
            payload,
            queue,
            tick: 0,
        })
    }

    async fn run(mut self, interval: Duration) {
        let mut ticker = tokio::time::interval(interval);
        loop {
            ticker.tick().await;
            self.step();
        }
    }

    fn step(&mut self) {
        self.tick = self.tick.wrapping_add(1);
        self.span.set(
            uuid::Uuid::new_v4().simple().to_string(),
            uuid::Uuid::new_v4().simple().to_string()[..16].to_string(),
            self.tick % 2 == 0,
        );

        let path = PATHS[(self.tick % PATHS.len() as u64) as usize];
        // deterministic spread of latencies and sizes
        let jitter = (self.tick.wrapping_mul(2_654_435_761) % 1000) as f64 / 1000.0;

        self.in_flight.inc();
        let result: Result<(), &str> = instrument::counted(&self.requests, &[path], || {
            if jitter > 0.9 {
                Err("upstream timeout")
            } else {
                Ok(())
            }
        });
        if let Ok(cell) = self.latency.labels(&[path]) {
            cell.observe(0.002 + jitter * jitter * 1.5);
        }
        self.payload.observe(512.0 + jitter * 16_384.0);
        self.in_flight.dec();

        let state = match (self.tick / 40) % 3 {
            0 => "idle",
            1 => "busy",
            _ => "draining",
        };
        for s in ["idle", "busy", "draining"] {
            if s == state {
                self.queue.set_true(s);
            } else {
                self.queue.set_false(s);
            }
        }

        if let Err(e) = result {
            debug!(path, error = e, "Demo request failed");
        }
    }
}
