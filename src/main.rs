//! bf2c - translate a Brainfuck program on stdin into C on stdout

use flow_pipeline::{translate, PipelineConfig};
use std::io::{self, BufWriter};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

fn main() -> anyhow::Result<()> {
    // stdout carries the translation, so logs go to stderr
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();

    let config = PipelineConfig {
        name: "bf2c".to_string(),
        ..PipelineConfig::default()
    };

    let report = translate(io::stdin(), BufWriter::new(io::stdout()), config)?;
    tracing::debug!("{}", report.summary());
    Ok(())
}
