//! Read-only summary of the live cache contents.
//!
//! Runs after a fill pass, independently of it. Aggregates per-axis
//! counts over whatever is live and renders them as a text table with
//! proportional bars.

use std::collections::BTreeMap;
use std::fmt::Write as FmtWrite;
use std::sync::Arc;

use crate::cache::ClassificationCache;
use crate::error::CacheError;

/// Widest bar drawn for the most common label.
const BAR_WIDTH: usize = 24;

/// Per-axis tallies over the live cache population.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReportSummary {
    pub total: usize,
    pub by_category: BTreeMap<String, usize>,
    pub by_priority: BTreeMap<String, usize>,
    pub by_respond: BTreeMap<String, usize>,
}

/// Aggregates live cache entries into a `ReportSummary`.
pub struct ReportBuilder {
    cache: Arc<dyn ClassificationCache>,
}

impl ReportBuilder {
    pub fn new(cache: Arc<dyn ClassificationCache>) -> Self {
        Self { cache }
    }

    pub async fn summarize(&self) -> Result<ReportSummary, CacheError> {
        let mut summary = ReportSummary::default();

        for (_, record) in self.cache.iter_all().await? {
            summary.total += 1;
            *summary
                .by_category
                .entry(record.category.label().to_string())
                .or_default() += 1;
            *summary
                .by_priority
                .entry(record.priority.label().to_string())
                .or_default() += 1;
            *summary
                .by_respond
                .entry(record.respond.label().to_string())
                .or_default() += 1;
        }

        Ok(summary)
    }
}

/// Render a summary as plain text.
pub fn render(summary: &ReportSummary) -> String {
    if summary.total == 0 {
        return "Classification cache is empty.\n".to_string();
    }

    let mut out = String::new();
    let _ = writeln!(out, "{} live classification(s)\n", summary.total);
    render_axis(&mut out, "Category", &summary.by_category);
    render_axis(&mut out, "Priority", &summary.by_priority);
    render_axis(&mut out, "Respond", &summary.by_respond);
    out
}

fn render_axis(out: &mut String, title: &str, counts: &BTreeMap<String, usize>) {
    let max = counts.values().copied().max().unwrap_or(1).max(1);
    let _ = writeln!(out, "{title}:");
    for (label, count) in counts {
        let bar = "#".repeat((count * BAR_WIDTH).div_ceil(max));
        let _ = writeln!(out, "  {label:<16} {bar} {count}");
    }
    let _ = writeln!(out);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::LibSqlCache;
    use crate::pipeline::types::{Category, ClassificationRecord, Priority, Respond};

    fn record(id: &str, category: Category, priority: Priority, respond: Respond) -> ClassificationRecord {
        ClassificationRecord {
            message_id: id.to_string(),
            sender: format!("{id}@example.com"),
            subject: format!("subject {id}"),
            category,
            priority,
            respond,
        }
    }

    #[tokio::test]
    async fn summarize_counts_per_axis() {
        let cache = Arc::new(LibSqlCache::new_memory().await.unwrap());
        let ttl = chrono::Duration::hours(1);
        cache
            .put_with_ttl(
                &record("a", Category::Work, Priority::Urgent, Respond::Yes),
                ttl,
            )
            .await
            .unwrap();
        cache
            .put_with_ttl(
                &record("b", Category::Work, Priority::Normal, Respond::No),
                ttl,
            )
            .await
            .unwrap();
        cache
            .put_with_ttl(
                &record("c", Category::Shopping, Priority::Normal, Respond::No),
                ttl,
            )
            .await
            .unwrap();

        let builder = ReportBuilder::new(cache as Arc<dyn ClassificationCache>);
        let summary = builder.summarize().await.unwrap();

        assert_eq!(summary.total, 3);
        assert_eq!(summary.by_category.get("Work"), Some(&2));
        assert_eq!(summary.by_category.get("Shopping"), Some(&1));
        assert_eq!(summary.by_priority.get("Normal"), Some(&2));
        assert_eq!(summary.by_respond.get("No"), Some(&2));
    }

    #[tokio::test]
    async fn summarize_ignores_expired_entries() {
        let cache = Arc::new(LibSqlCache::new_memory().await.unwrap());
        cache
            .put_with_ttl(
                &record("dead", Category::Work, Priority::Normal, Respond::No),
                chrono::Duration::zero(),
            )
            .await
            .unwrap();

        let builder = ReportBuilder::new(cache as Arc<dyn ClassificationCache>);
        let summary = builder.summarize().await.unwrap();
        assert_eq!(summary.total, 0);
    }

    #[test]
    fn render_empty_summary() {
        let rendered = render(&ReportSummary::default());
        assert!(rendered.contains("empty"));
    }

    #[test]
    fn render_lists_labels_and_counts() {
        let mut summary = ReportSummary {
            total: 3,
            ..Default::default()
        };
        summary.by_category.insert("Work".to_string(), 2);
        summary.by_category.insert("Other".to_string(), 1);
        summary.by_priority.insert("Normal".to_string(), 3);
        summary.by_respond.insert("No".to_string(), 3);

        let rendered = render(&summary);
        assert!(rendered.contains("Work"));
        assert!(rendered.contains('#'));
        assert!(rendered.contains("Priority:"));
        assert!(rendered.contains("Respond:"));
    }

    #[test]
    fn render_preserves_unrecognized_labels() {
        let mut summary = ReportSummary {
            total: 1,
            ..Default::default()
        };
        summary.by_category.insert("Newsletter".to_string(), 1);
        summary.by_priority.insert("Normal".to_string(), 1);
        summary.by_respond.insert("maybe".to_string(), 1);

        let rendered = render(&summary);
        assert!(rendered.contains("Newsletter"));
        assert!(rendered.contains("maybe"));
    }
}
