//! Fill controller: tops the cache up toward a target population.
//!
//! Flow per run:
//! 1. count live entries; stop if already at target
//! 2. fetch exactly the shortfall from the mailbox
//! 3. classify messages without a live entry and write them back
//!
//! Messages are handled one at a time, in the order the source returned
//! them. Per-message header trouble is absorbed into the report; source,
//! cache, and LLM failures abort the pass.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::cache::ClassificationCache;
use crate::error::PipelineError;
use crate::pipeline::classifier::Classifier;
use crate::pipeline::types::{ClassificationRecord, FillReport, MessageOutcome};
use crate::source::{HeaderFields, MailSummary, MailboxSource};

pub struct FillController {
    source: Arc<dyn MailboxSource>,
    cache: Arc<dyn ClassificationCache>,
    classifier: Classifier,
    ttl: chrono::Duration,
}

impl FillController {
    pub fn new(
        source: Arc<dyn MailboxSource>,
        cache: Arc<dyn ClassificationCache>,
        classifier: Classifier,
        ttl: chrono::Duration,
    ) -> Self {
        Self {
            source,
            cache,
            classifier,
            ttl,
        }
    }

    /// Top the cache up to `target` live entries.
    ///
    /// Requests exactly the shortfall from the source. An under-supplying
    /// source is not an error and is not retried; the run simply ends
    /// short of target. Messages with a live entry are skipped without
    /// inference calls or a TTL refresh.
    pub async fn ensure_filled(&self, target: u64) -> Result<FillReport, PipelineError> {
        let live_before = self.cache.count().await?;
        let mut report = FillReport {
            target,
            live_before,
            ..Default::default()
        };

        if live_before >= target {
            info!(live = live_before, target, "Cache already at target; nothing to do");
            return Ok(report);
        }

        let shortfall = (target - live_before) as usize;
        report.requested = shortfall;

        let batch = self.source.fetch_batch(shortfall).await?;
        report.fetched = batch.len();
        debug!(requested = shortfall, fetched = batch.len(), "Fetched batch");

        for message in batch {
            let outcome = self.process_message(message).await?;
            report.record(outcome);
        }

        info!(
            classified = report.classified,
            already_cached = report.already_cached,
            skipped = report.skipped_unreadable,
            live = report.live_after(),
            target,
            "Fill pass complete"
        );
        Ok(report)
    }

    async fn process_message(&self, message: MailSummary) -> Result<MessageOutcome, PipelineError> {
        if self.cache.exists(&message.id).await? {
            debug!(id = %message.id, "Live entry exists; skipping");
            return Ok(MessageOutcome::AlreadyCached);
        }

        let (sender, subject) = match message.headers {
            HeaderFields::Parsed { sender, subject } => {
                (sender.unwrap_or_default(), subject.unwrap_or_default())
            }
            HeaderFields::Unreadable => {
                warn!(id = %message.id, "Unreadable header block; skipping message");
                return Ok(MessageOutcome::SkippedUnreadable);
            }
        };

        let classification = self.classifier.classify(&sender, &subject).await?;
        let record = ClassificationRecord {
            message_id: message.id.clone(),
            sender,
            subject,
            category: classification.category,
            priority: classification.priority,
            respond: classification.respond,
        };
        self.cache.put_with_ttl(&record, self.ttl).await?;
        debug!(id = %message.id, "Classified and cached");
        Ok(MessageOutcome::Classified)
    }
}
