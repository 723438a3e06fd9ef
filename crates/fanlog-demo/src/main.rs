//! fanlog-fanout
//!
//! One writer appends single-event batches with seeded jitter while many
//! readers follow the buffer from the same head. Every reader must see the
//! full index sequence in order followed by the close.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use clap::Parser;
use fanlog_buffer::{BufferConfig, BufferError, CancellationToken, Cursor, EventBuffer};
use fanlog_core::{Event, FanlogResult, Topic};
use fanlog_logging::{FanlogSubscriberBuilder, LogConfig, WorkerGuard};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{Instrument, debug, error, info, info_span, warn};

#[derive(Parser, Debug)]
#[command(
    name = "fanlog-fanout",
    about = "Fan a stream of events out to many concurrent readers",
    version
)]
struct Cli {
    /// Number of concurrent readers
    #[arg(short, long, default_value = "1000")]
    readers: usize,

    /// Number of events the writer appends
    #[arg(short, long, default_value = "1000")]
    messages: u64,

    /// Upper bound on the writer's sleep between appends
    #[arg(long, default_value = "20")]
    max_jitter_ms: u64,

    /// Seed for the writer's jitter
    #[arg(long, default_value = "1")]
    seed: u64,

    /// Topic the writer publishes on (service_health, service_health_connect)
    #[arg(short, long, default_value = "service_health")]
    topic: Topic,

    /// Default log level (RUST_LOG takes precedence)
    #[arg(short, long, default_value = "info")]
    level: String,

    /// Human-readable console output instead of JSONL
    #[arg(long)]
    pretty: bool,

    /// Load logging configuration from a TOML file
    #[arg(long)]
    log_config: Option<PathBuf>,
}

/// What a single reader saw
#[derive(Debug)]
struct ReaderReport {
    reader: usize,
    received: u64,
    violation: Option<String>,
}

fn init_logging(cli: &Cli) -> anyhow::Result<Option<WorkerGuard>> {
    let config = match &cli.log_config {
        Some(path) => LogConfig::from_toml_file(path)?,
        None if cli.pretty => LogConfig {
            default_level: cli.level.clone(),
            ..LogConfig::development()
        },
        None => LogConfig {
            default_level: cli.level.clone(),
            ..LogConfig::default()
        },
    };
    Ok(FanlogSubscriberBuilder::new().with_config(config).init()?)
}

/// Skewed sleep: mostly zero, occasionally close to `max_ms`
fn jitter(rng: &mut StdRng, max_ms: u64) -> Duration {
    let r: f64 = rng.random();
    Duration::from_millis((r.powi(12) * max_ms as f64) as u64)
}

async fn run_writer(
    buffer: Arc<EventBuffer>,
    topic: Topic,
    messages: u64,
    max_jitter_ms: u64,
    seed: u64,
) -> FanlogResult<()> {
    let mut rng = StdRng::seed_from_u64(seed);
    for index in 0..messages {
        let payload = index.to_be_bytes().to_vec();
        buffer.append(vec![Event::data(index, topic, payload)])?;

        let wait = jitter(&mut rng, max_jitter_ms);
        if !wait.is_zero() {
            tokio::time::sleep(wait).await;
        }
    }
    buffer.close();
    info!(messages, "Writer finished");
    Ok(())
}

async fn run_reader(
    reader: usize,
    mut cursor: Cursor,
    messages: u64,
    cancel: CancellationToken,
) -> ReaderReport {
    let mut expected = 0u64;
    let violation = 'read: loop {
        match cursor.advance(&cancel).await {
            Ok(node) => {
                for event in node.events() {
                    if event.index != expected {
                        break 'read Some(format!(
                            "expected index {}, got {}",
                            expected, event.index
                        ));
                    }
                    expected += 1;
                }
            }
            Err(BufferError::Closed) if expected == messages => break None,
            Err(BufferError::Closed) => {
                break Some(format!("closed after {} of {} events", expected, messages));
            }
            Err(e) => break Some(e.to_string()),
        }
    };

    match &violation {
        Some(reason) => warn!(received = expected, %reason, "Reader saw a violation"),
        None => debug!(received = expected, "Reader done"),
    }

    ReaderReport {
        reader,
        received: expected,
        violation,
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let _guard = init_logging(&cli)?;

    let buffer = Arc::new(EventBuffer::with_config(BufferConfig::named("fanout")));
    let cancel = CancellationToken::new();

    // Every reader starts from the head captured before the first append
    let head = buffer.head();

    info!(
        readers = cli.readers,
        messages = cli.messages,
        topic = %cli.topic,
        max_jitter_ms = cli.max_jitter_ms,
        seed = cli.seed,
        "Starting fan-out"
    );

    let start = Instant::now();
    let mut readers = Vec::with_capacity(cli.readers);
    for reader in 0..cli.readers {
        let cursor = Cursor::new(Arc::clone(&head));
        let span = info_span!("reader", id = reader);
        readers.push(tokio::spawn(
            run_reader(reader, cursor, cli.messages, cancel.child_token()).instrument(span),
        ));
    }

    let writer = tokio::spawn(
        run_writer(
            Arc::clone(&buffer),
            cli.topic,
            cli.messages,
            cli.max_jitter_ms,
            cli.seed,
        )
            .instrument(info_span!("writer")),
    );

    let ctrl_c_cancel = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, cancelling readers");
            ctrl_c_cancel.cancel();
        }
    });

    writer.await??;

    let mut violations = 0usize;
    for handle in readers {
        let report = handle.await?;
        if let Some(reason) = &report.violation {
            error!(reader = report.reader, received = report.received, %reason, "Reader failed");
            violations += 1;
        }
    }

    let elapsed = start.elapsed();
    let deliveries = cli.messages * cli.readers as u64;
    let rate = deliveries as f64 / elapsed.as_secs_f64().max(f64::EPSILON);
    info!(
        deliveries,
        elapsed_ms = elapsed.as_millis() as u64,
        batches = buffer.appended_batches(),
        "Fan-out complete"
    );
    println!(
        "{} readers x {} events in {:.2?} ({:.0} deliveries/s)",
        cli.readers, cli.messages, elapsed, rate
    );

    if violations > 0 {
        anyhow::bail!("{} of {} readers saw a violation", violations, cli.readers);
    }
    Ok(())
}
