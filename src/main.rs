//  ██████╗ ██╗  ██╗ ██████╗
// ██╔════╝ ██║  ██║██╔════╝
// ██║  ███╗███████║██║  ███╗
// ██║   ██║██╔══██║██║   ██║
// ╚██████╔╝██║  ██║╚██████╔╝
//  ╚═════╝ ╚═╝  ╚═╝ ╚═════╝
//
// D I S C L O S U R E   E N G I N E
//
// Fetches investor-relations pages and the annual reports they link to,
// and digs Scope 1/2/3 emissions and renewable-energy share out of the text.
// One batch pass, one CSV, one row per company. No row is ever dropped.

mod assembler;
mod config;
mod error;
mod extractors;
mod fetcher;
mod link_resolver;
mod models;
mod normalizer;
mod pipeline;
mod sink;
mod summary;
mod text_scanner;

#[cfg(test)]
mod testing;

use std::sync::Arc;

use anyhow::Context;
use chrono::Utc;
use tracing::{info, warn};
use tracing_subscriber::{fmt, EnvFilter};
use uuid::Uuid;

use crate::config::{Config, LogFormat};
use crate::fetcher::ReqwestTransport;
use crate::pipeline::Pipeline;
use crate::sink::CsvSink;
use crate::summary::RunSummary;

fn print_banner() {
    let banner = r#"
    ╔══════════════════════════════════════════════════════════════════╗
    ║                                                                  ║
    ║          ██████╗ ██╗  ██╗ ██████╗                                ║
    ║         ██╔════╝ ██║  ██║██╔════╝                                ║
    ║         ██║  ███╗███████║██║  ███╗                               ║
    ║         ██║   ██║██╔══██║██║   ██║                               ║
    ║         ╚██████╔╝██║  ██║╚██████╔╝                               ║
    ║          ╚═════╝ ╚═╝  ╚═╝ ╚═════╝                                ║
    ║                                                                  ║
    ║        🌍 CORPORATE EMISSIONS DISCLOSURE ENGINE 🌍               ║
    ║                                                                  ║
    ║   Sources:  IR pages | Annual reports | BRSR sections            ║
    ║   Metrics:  Scope 1 | Scope 2 | Scope 3 | Renewable share        ║
    ║   Parsing:  lopdf + scraper, off the async reactor               ║
    ║   Matching: ordered regex rule tables, first match wins          ║
    ║                                                                  ║
    ║   "Every company gets a row. Even the ones that 404."            ║
    ║                                                                  ║
    ╚══════════════════════════════════════════════════════════════════╝
    "#;
    println!("{}", banner);
}

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    match format {
        LogFormat::Pretty => fmt()
            .with_env_filter(filter)
            .with_target(true)
            .with_thread_ids(true)
            .with_file(true)
            .with_line_number(true)
            .with_ansi(true)
            .init(),
        LogFormat::Json => fmt()
            .json()
            .with_env_filter(filter)
            .with_current_span(true)
            .with_span_list(false)
            .init(),
    }
}

#[tokio::main(flavor = "multi_thread")]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_env();
    init_tracing(config.log_format);

    if config.log_format == LogFormat::Pretty {
        print_banner();
    }

    let run_id = Uuid::new_v4();
    let started_at = Utc::now();
    info!(%run_id, "🌍 GHG disclosure engine initializing...");

    config.validate().context("invalid configuration")?;
    info!(
        timeout_secs = config.request_timeout.as_secs(),
        workers = config.worker_limit,
        pdf_page_cap = config.pdf_page_cap,
        lookahead_window = config.lookahead_window,
        output = %config.output_path.display(),
        "✅ Configuration loaded"
    );

    let feed = config.load_feed()?;
    if feed.is_empty() {
        warn!("input feed is empty; writing a header-only CSV");
    }
    info!(companies = feed.len(), "✅ Input feed loaded");

    let transport = Arc::new(ReqwestTransport::new()?);
    let pipeline = Pipeline::new(&config, transport)?;
    info!("✅ Pipeline wired: fetcher → link resolver → extractor → rule engine → assembler");

    let records = pipeline.run_batch(&feed).await;

    let sink = CsvSink::new(&config.output_path);
    sink.write(&records)
        .with_context(|| format!("failed to write {}", sink.path().display()))?;
    info!(path = %sink.path().display(), rows = records.len(), "📄 Records persisted");

    RunSummary::from_records(run_id, started_at, &records).log();
    info!(%run_id, "🏁 Batch pass complete");
    Ok(())
}
