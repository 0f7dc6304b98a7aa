//! Logging setup (tracing-subscriber).
//!
//! - フィルタは `RUST_LOG`（未設定なら `info`）
//! - `QUILL_LOG_FORMAT=json` で 1 行 1 JSON の出力に切り替える
//! - 何度呼んでも最初の 1 回だけ有効。すでに global subscriber があれば何もしない

use std::sync::OnceLock;

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

pub const LOG_FORMAT_ENV: &str = "QUILL_LOG_FORMAT";

static LOGGER_INITIALIZED: OnceLock<()> = OnceLock::new();

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

impl LogFormat {
    pub fn parse(value: &str) -> Self {
        if value.trim().eq_ignore_ascii_case("json") {
            LogFormat::Json
        } else {
            LogFormat::Pretty
        }
    }
}

pub fn log_format_from_env() -> LogFormat {
    std::env::var(LOG_FORMAT_ENV)
        .map(|v| LogFormat::parse(&v))
        .unwrap_or_default()
}

pub fn init_logging(format: LogFormat) {
    LOGGER_INITIALIZED.get_or_init(|| {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
        let registry = tracing_subscriber::registry().with(filter);

        let result = match format {
            LogFormat::Json => registry
                .with(fmt::layer().json().with_target(true).with_current_span(true))
                .try_init(),
            LogFormat::Pretty => registry.with(fmt::layer().with_target(true)).try_init(),
        };
        if result.is_err() {
            tracing::debug!("global tracing subscriber already set, keeping it");
        }

        tracing::debug!(?format, "logging initialized");
    });
}
