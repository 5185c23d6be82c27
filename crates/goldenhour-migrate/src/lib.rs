//! Album image enrichment migration
//!
//! Walks every album, fills in thumbnails, placeholder hashes, dimensions and camera
//! metadata for images that lack them, and commits each album's manifest once.

pub mod orchestrator;
pub mod report;

pub use orchestrator::{MigrationError, MigrationOptions, MigrationOrchestrator};
pub use report::{AlbumOutcome, AlbumStatus, MigrationFailure, MigrationReport};

use tracing_subscriber::fmt::format::Format;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const DEFAULT_LOG_FILTER: &str = "info";

/// Log filter and output format.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogSettings {
    /// `RUST_LOG` directives, `info` when unset.
    pub filter: String,
    /// JSON lines instead of the compact format (`LOG_FORMAT=json`).
    pub json: bool,
}

impl LogSettings {
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        Self {
            filter: lookup("RUST_LOG")
                .filter(|v| !v.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_LOG_FILTER.to_string()),
            json: lookup("LOG_FORMAT")
                .map(|v| v.trim().eq_ignore_ascii_case("json"))
                .unwrap_or(false),
        }
    }
}

/// Install the global subscriber, writing to stderr.
///
/// `.env` is loaded first so logging settings kept there apply too.
pub fn init_tracing() {
    dotenvy::dotenv().ok();
    let settings = LogSettings::from_lookup(|name| std::env::var(name).ok());
    let filter = EnvFilter::try_new(&settings.filter)
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));

    if settings.json {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .with_writer(std::io::stderr)
                    .event_format(Format::default().compact().with_target(false)),
            )
            .init();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn settings(vars: &[(&str, &str)]) -> LogSettings {
        let map: HashMap<&str, &str> = vars.iter().copied().collect();
        LogSettings::from_lookup(|name| map.get(name).map(|v| v.to_string()))
    }

    #[test]
    fn test_log_settings_default_to_compact_info() {
        assert_eq!(
            settings(&[]),
            LogSettings {
                filter: "info".to_string(),
                json: false,
            }
        );
        assert_eq!(settings(&[("RUST_LOG", "  ")]).filter, "info");
    }

    #[test]
    fn test_log_settings_from_variables() {
        let s = settings(&[
            ("RUST_LOG", "goldenhour_migrate=debug,sqlx=warn"),
            ("LOG_FORMAT", "JSON"),
        ]);
        assert_eq!(s.filter, "goldenhour_migrate=debug,sqlx=warn");
        assert!(s.json);
        assert!(!settings(&[("LOG_FORMAT", "pretty")]).json);
    }
}
