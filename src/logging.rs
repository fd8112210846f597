//! Logging setup and credential masking.
//!
//! Every log line leaving the process passes through [`mask_sensitive_data`]:
//! the ingress handler logs through an explicit [`GatewayLog`] that masks each
//! message, and the global subscriber writes through [`SanitizingMakeWriter`]
//! so output from other modules and libraries is masked as well.

use regex::Regex;
use std::borrow::Cow;
use std::io::{self, Write};
use std::sync::{Arc, LazyLock};
use tracing::Level;
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::EnvFilter;

static BOT_TOKEN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(xox[abposr])-[A-Za-z0-9-]+").expect("valid regex"));

static SIGNATURE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"v0=[a-f0-9]+").expect("valid regex"));

/// Replace Slack tokens (`xoxb-…`) and request signatures (`v0=<hex>`) with
/// masked placeholders.
pub fn mask_sensitive_data(text: &str) -> Cow<'_, str> {
    let masked = BOT_TOKEN_RE.replace_all(text, "${1}-***MASKED***");
    if !SIGNATURE_RE.is_match(&masked) {
        return masked;
    }
    Cow::Owned(
        SIGNATURE_RE
            .replace_all(&masked, "v0=***MASKED***")
            .into_owned(),
    )
}

/// Map a level name (including Python-style `WARNING`/`CRITICAL`) to a filter directive.
pub fn normalize_level(level: &str) -> &'static str {
    match level.trim().to_ascii_lowercase().as_str() {
        "trace" => "trace",
        "debug" => "debug",
        "warn" | "warning" => "warn",
        "error" | "critical" | "fatal" => "error",
        _ => "info",
    }
}

/// Install the global subscriber. `RUST_LOG` wins over `default_level`.
pub fn init(default_level: &str) -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(normalize_level(default_level)));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(SanitizingMakeWriter::new(io::stderr))
        .try_init()
        .map_err(|e| anyhow::anyhow!("failed to install log subscriber: {e}"))
}

/// `MakeWriter` wrapper that masks every formatted log line.
#[derive(Debug, Clone)]
pub struct SanitizingMakeWriter<M> {
    inner: M,
}

impl<M> SanitizingMakeWriter<M> {
    pub fn new(inner: M) -> Self {
        Self { inner }
    }
}

impl<'a, M> MakeWriter<'a> for SanitizingMakeWriter<M>
where
    M: MakeWriter<'a>,
{
    type Writer = SanitizingWriter<M::Writer>;

    fn make_writer(&'a self) -> Self::Writer {
        SanitizingWriter {
            inner: self.inner.make_writer(),
        }
    }
}

/// Masks each buffer before forwarding it. The fmt layer hands over one
/// complete line per write.
#[derive(Debug)]
pub struct SanitizingWriter<W> {
    inner: W,
}

impl<W: Write> Write for SanitizingWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let text = String::from_utf8_lossy(buf);
        self.inner.write_all(mask_sensitive_data(&text).as_bytes())?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

/// Destination for already-masked log messages.
pub trait LogSink: Send + Sync {
    fn emit(&self, level: Level, message: &str);
}

/// Forwards to `tracing` under the `slackgate::ingress` target.
#[derive(Debug, Default)]
pub struct TracingSink;

impl LogSink for TracingSink {
    fn emit(&self, level: Level, message: &str) {
        match level {
            Level::ERROR => tracing::error!(target: "slackgate::ingress", "{message}"),
            Level::WARN => tracing::warn!(target: "slackgate::ingress", "{message}"),
            Level::INFO => tracing::info!(target: "slackgate::ingress", "{message}"),
            Level::DEBUG => tracing::debug!(target: "slackgate::ingress", "{message}"),
            _ => tracing::trace!(target: "slackgate::ingress", "{message}"),
        }
    }
}

/// Logging capability handed to the ingress handler. Masks before every write,
/// regardless of level.
#[derive(Clone)]
pub struct GatewayLog {
    sink: Arc<dyn LogSink>,
}

impl Default for GatewayLog {
    fn default() -> Self {
        Self::tracing()
    }
}

impl GatewayLog {
    pub fn tracing() -> Self {
        Self::with_sink(Arc::new(TracingSink))
    }

    pub fn with_sink(sink: Arc<dyn LogSink>) -> Self {
        Self { sink }
    }

    pub fn error(&self, message: impl AsRef<str>) {
        self.write(Level::ERROR, message.as_ref());
    }

    pub fn warn(&self, message: impl AsRef<str>) {
        self.write(Level::WARN, message.as_ref());
    }

    pub fn info(&self, message: impl AsRef<str>) {
        self.write(Level::INFO, message.as_ref());
    }

    pub fn debug(&self, message: impl AsRef<str>) {
        self.write(Level::DEBUG, message.as_ref());
    }

    fn write(&self, level: Level, message: &str) {
        self.sink.emit(level, &mask_sensitive_data(message));
    }
}
