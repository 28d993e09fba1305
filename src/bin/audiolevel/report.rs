//! Output lines for delivered levels and the end-of-run summary.

use audiolevel::level::{DispatchStats, Level};
use serde::Serialize;

/// One line of program output.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event")]
pub(crate) enum ReportEvent {
    #[serde(rename = "level")]
    Level { seq: u64, level: Level },
    #[serde(rename = "summary")]
    Summary(RunSummary),
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub(crate) struct RunSummary {
    pub windows_submitted: u64,
    pub levels_delivered: u64,
    pub coalesced: u64,
    /// Levels the printer channel could not take.
    pub dropped: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cached_level: Option<Level>,
    pub workers_spawned: u64,
}

impl RunSummary {
    pub(crate) fn new(
        stats: DispatchStats,
        levels_delivered: u64,
        dropped: u64,
        cached_level: Option<Level>,
    ) -> Self {
        Self {
            windows_submitted: stats.submitted,
            levels_delivered,
            coalesced: stats.coalesced,
            dropped,
            cached_level,
            workers_spawned: stats.workers_spawned,
        }
    }
}

impl ReportEvent {
    pub(crate) fn render(&self, json: bool) -> String {
        if json {
            // Plain data with string keys; serialization cannot fail.
            return serde_json::to_string(self).unwrap_or_default();
        }
        match self {
            ReportEvent::Level { level, .. } => format!("level {level}"),
            ReportEvent::Summary(summary) => {
                let cached = summary
                    .cached_level
                    .map(|level| level.to_string())
                    .unwrap_or_else(|| "n/a".to_string());
                format!(
                    "windows submitted: {}\nlevels delivered: {}\ncoalesced: {}\ndropped: {}\ncached level: {cached}\nworkers spawned: {}",
                    summary.windows_submitted,
                    summary.levels_delivered,
                    summary.coalesced,
                    summary.dropped,
                    summary.workers_spawned
                )
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn summary() -> RunSummary {
        RunSummary::new(
            DispatchStats {
                submitted: 10,
                coalesced: 3,
                computed: 7,
                workers_spawned: 1,
                ..DispatchStats::default()
            },
            7,
            0,
            Some(42),
        )
    }

    #[test]
    fn level_line_text() {
        let event = ReportEvent::Level { seq: 3, level: 57 };
        assert_eq!(event.render(false), "level 57");
    }

    #[test]
    fn level_line_json_is_tagged() {
        let event = ReportEvent::Level { seq: 3, level: 57 };
        assert_eq!(event.render(true), r#"{"event":"level","seq":3,"level":57}"#);
    }

    #[test]
    fn summary_json_carries_counters() {
        let rendered = ReportEvent::Summary(summary()).render(true);
        let value: serde_json::Value = serde_json::from_str(&rendered).unwrap();
        assert_eq!(value["event"], "summary");
        assert_eq!(value["windows_submitted"], 10);
        assert_eq!(value["levels_delivered"], 7);
        assert_eq!(value["coalesced"], 3);
        assert_eq!(value["cached_level"], 42);
    }

    #[test]
    fn summary_json_omits_missing_cache() {
        let mut summary = summary();
        summary.cached_level = None;
        let rendered = ReportEvent::Summary(summary).render(true);
        assert!(!rendered.contains("cached_level"));
    }

    #[test]
    fn summary_text_lists_each_counter() {
        let mut summary = summary();
        summary.cached_level = None;
        let rendered = ReportEvent::Summary(summary).render(false);
        assert!(rendered.contains("windows submitted: 10"));
        assert!(rendered.contains("levels delivered: 7"));
        assert!(rendered.contains("cached level: n/a"));
    }
}
