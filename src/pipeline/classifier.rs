//! Three-axis message classifier.
//!
//! One prompt per axis, each instructing the model to answer with exactly
//! one word from that axis's vocabulary. The three calls are sequential
//! and share no conversational context, with each other or across
//! messages.

use std::sync::Arc;

use tracing::debug;

use crate::error::PipelineError;
use crate::llm::{ChatMessage, CompletionRequest, LlmProvider};
use crate::pipeline::types::{Category, Classification, Priority, Respond};

/// Max completion tokens per axis call (answers are a single word).
const AXIS_MAX_TOKENS: u32 = 8;

/// Temperature per axis call (biases toward a deterministic label).
const AXIS_TEMPERATURE: f32 = 0.0;

/// One of the three classification dimensions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    Category,
    Priority,
    Respond,
}

impl Axis {
    pub fn vocabulary(self) -> &'static [&'static str] {
        match self {
            Self::Category => Category::VOCABULARY,
            Self::Priority => Priority::VOCABULARY,
            Self::Respond => Respond::VOCABULARY,
        }
    }

    fn question(self) -> &'static str {
        match self {
            Self::Category => "Which category does this email belong to?",
            Self::Priority => "How urgent is this email?",
            Self::Respond => "Does this email need a response?",
        }
    }
}

/// Build the prompt for one axis, embedding the literal header text.
pub fn build_axis_prompt(axis: Axis, sender: &str, subject: &str) -> String {
    format!(
        "You classify emails. {} Answer with exactly one word from: {}. \
         Do not output anything else.\n\nFrom: {}\nSubject: {}",
        axis.question(),
        axis.vocabulary().join(", "),
        sender,
        subject,
    )
}

/// Classifies a message along the three axes via the LLM provider.
pub struct Classifier {
    llm: Arc<dyn LlmProvider>,
}

impl Classifier {
    pub fn new(llm: Arc<dyn LlmProvider>) -> Self {
        Self { llm }
    }

    /// Classify one message from its sender and subject headers.
    ///
    /// Issues three completion calls. Any provider failure aborts and
    /// propagates; there is no retry on empty or off-vocabulary answers.
    pub async fn classify(
        &self,
        sender: &str,
        subject: &str,
    ) -> Result<Classification, PipelineError> {
        let category = Category::parse(&self.ask(Axis::Category, sender, subject).await?);
        let priority = Priority::parse(&self.ask(Axis::Priority, sender, subject).await?);
        let respond = Respond::parse(&self.ask(Axis::Respond, sender, subject).await?);

        Ok(Classification {
            category,
            priority,
            respond,
        })
    }

    async fn ask(&self, axis: Axis, sender: &str, subject: &str) -> Result<String, PipelineError> {
        let request =
            CompletionRequest::new(vec![ChatMessage::user(build_axis_prompt(axis, sender, subject))])
                .with_temperature(AXIS_TEMPERATURE)
                .with_max_tokens(AXIS_MAX_TOKENS);

        let response = self.llm.complete(request).await?;
        debug!(axis = ?axis, answer = %response.content, "Axis answered");
        Ok(response.content)
    }
}
