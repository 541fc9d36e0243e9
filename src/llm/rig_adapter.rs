//! Bridge from rig-core's `CompletionModel` to [`LlmProvider`].

use async_trait::async_trait;
use rig::completion::{AssistantContent, CompletionModel, Message};

use super::provider::{ChatMessage, CompletionRequest, CompletionResponse, LlmProvider, Role};
use crate::error::LlmError;

/// Wraps any rig completion model.
pub struct RigAdapter<M> {
    model: M,
    model_name: String,
}

impl<M: CompletionModel> RigAdapter<M> {
    pub fn new(model: M, model_name: &str) -> Self {
        Self {
            model,
            model_name: model_name.to_string(),
        }
    }
}

/// Split messages into (preamble, history, prompt).
///
/// System messages are joined into the preamble. The last user message is the
/// prompt; everything before it becomes history.
fn split_messages(messages: Vec<ChatMessage>) -> (Option<String>, Vec<Message>, Option<String>) {
    let mut system = Vec::new();
    let mut turns = Vec::new();
    for msg in messages {
        match msg.role {
            Role::System => system.push(msg.content),
            Role::User | Role::Assistant => turns.push(msg),
        }
    }

    let prompt = match turns.last() {
        Some(last) if last.role == Role::User => turns.pop().map(|m| m.content),
        _ => None,
    };

    let history = turns
        .into_iter()
        .map(|m| match m.role {
            Role::Assistant => Message::assistant(m.content),
            _ => Message::user(m.content),
        })
        .collect();

    let preamble = (!system.is_empty()).then(|| system.join("\n\n"));
    (preamble, history, prompt)
}

#[async_trait]
impl<M> LlmProvider for RigAdapter<M>
where
    M: CompletionModel + 'static,
{
    fn model_name(&self) -> &str {
        &self.model_name
    }

    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError> {
        let (preamble, history, prompt) = split_messages(request.messages);
        let prompt = prompt.ok_or_else(|| LlmError::RequestFailed {
            provider: self.model_name.clone(),
            reason: "request has no user message".to_string(),
        })?;

        let mut builder = self.model.completion_request(prompt).messages(history);
        if let Some(preamble) = preamble {
            builder = builder.preamble(preamble);
        }
        if let Some(temperature) = request.temperature {
            builder = builder.temperature(f64::from(temperature));
        }
        if let Some(max_tokens) = request.max_tokens {
            builder = builder.max_tokens(u64::from(max_tokens));
        }

        let response = builder.send().await.map_err(|e| LlmError::RequestFailed {
            provider: self.model_name.clone(),
            reason: e.to_string(),
        })?;

        let content: String = response
            .choice
            .iter()
            .filter_map(|c| match c {
                AssistantContent::Text(text) => Some(text.text.as_str()),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join("");

        if content.trim().is_empty() {
            return Err(LlmError::InvalidResponse {
                provider: self.model_name.clone(),
                reason: "empty completion".to_string(),
            });
        }

        tracing::debug!(
            model = %self.model_name,
            input_tokens = response.usage.input_tokens,
            output_tokens = response.usage.output_tokens,
            "Completion received"
        );

        Ok(CompletionResponse {
            content,
            input_tokens: u32::try_from(response.usage.input_tokens).unwrap_or(u32::MAX),
            output_tokens: u32::try_from(response.usage.output_tokens).unwrap_or(u32::MAX),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_joins_system_and_pops_prompt() {
        let (preamble, history, prompt) = split_messages(vec![
            ChatMessage::system("You write ads."),
            ChatMessage::system("Be brief."),
            ChatMessage::user("first"),
            ChatMessage::assistant("reply"),
            ChatMessage::user("second"),
        ]);
        assert_eq!(preamble.as_deref(), Some("You write ads.\n\nBe brief."));
        assert_eq!(history.len(), 2);
        assert_eq!(prompt.as_deref(), Some("second"));
    }

    #[test]
    fn split_without_trailing_user_has_no_prompt() {
        let (preamble, history, prompt) = split_messages(vec![ChatMessage::assistant("hi")]);
        assert!(preamble.is_none());
        assert_eq!(history.len(), 1);
        assert!(prompt.is_none());
    }
}
