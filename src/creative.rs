//! Creative generator: asks the LLM for ad creative ideas grounded in the
//! user's stored business context.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::CreativeError;
use crate::llm::provider::{ChatMessage, CompletionRequest, LlmProvider};
use crate::store::{ActivityLog, BusinessContext, Database};

/// Configuration for creative generation.
#[derive(Debug, Clone)]
pub struct CreativeConfig {
    /// Upper bound on ideas returned per request.
    pub max_ideas: usize,
    pub temperature: f32,
    pub max_tokens: u32,
}

impl Default for CreativeConfig {
    fn default() -> Self {
        Self {
            max_ideas: 5,
            temperature: 0.8,
            max_tokens: 1024,
        }
    }
}

/// What the user wants creatives for.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CreativeBrief {
    #[serde(default)]
    pub product: Option<String>,
    #[serde(default)]
    pub objective: Option<String>,
    #[serde(default)]
    pub count: Option<usize>,
    #[serde(default)]
    pub notes: Option<String>,
}

/// A single generated ad concept.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreativeIdea {
    pub headline: String,
    pub primary_text: String,
    #[serde(default)]
    pub call_to_action: Option<String>,
    #[serde(default)]
    pub angle: Option<String>,
}

pub struct CreativeGenerator {
    db: Arc<dyn Database>,
    llm: Arc<dyn LlmProvider>,
    config: CreativeConfig,
}

impl CreativeGenerator {
    pub fn new(db: Arc<dyn Database>, llm: Arc<dyn LlmProvider>, config: CreativeConfig) -> Self {
        Self { db, llm, config }
    }

    /// Generate ideas for `brief`, using every stored fact of the user as context.
    pub async fn generate(
        &self,
        user_id: &str,
        brief: &CreativeBrief,
    ) -> Result<Vec<CreativeIdea>, CreativeError> {
        let facts = self.db.list_context(user_id, None).await?;
        let count = brief
            .count
            .unwrap_or(self.config.max_ideas)
            .clamp(1, self.config.max_ideas);

        let system_prompt = format!(
            "You are a performance marketing copywriter. Write {count} distinct ad creative \
             ideas for Facebook and Instagram.\n\
             Respond with ONLY a JSON array. Each element has the keys \"headline\" \
             (max 40 characters), \"primary_text\" (max 125 characters), \
             \"call_to_action\" (e.g. SHOP_NOW, LEARN_MORE) and \"angle\" \
             (one short phrase naming the persuasion angle)."
        );

        let request = CompletionRequest::new(vec![
            ChatMessage::system(system_prompt),
            ChatMessage::user(build_user_prompt(&facts, brief)),
        ])
        .with_temperature(self.config.temperature)
        .with_max_tokens(self.config.max_tokens);

        let response = self.llm.complete(request).await?;
        debug!(
            model = self.llm.model_name(),
            output_tokens = response.output_tokens,
            "Creative completion received"
        );

        let ideas = parse_ideas(&response.content, count);
        if ideas.is_empty() {
            return Err(CreativeError::Empty);
        }

        self.db
            .append_activity(
                &ActivityLog::new(
                    user_id,
                    "generate_creatives",
                    format!("Generated {} creative ideas", ideas.len()),
                    "creative",
                )
                .with_metadata(serde_json::json!({
                    "model": self.llm.model_name(),
                    "count": ideas.len(),
                    "context_facts": facts.len(),
                })),
            )
            .await?;

        info!(user_id, count = ideas.len(), "Generated creative ideas");
        Ok(ideas)
    }
}

fn build_user_prompt(facts: &[BusinessContext], brief: &CreativeBrief) -> String {
    let mut prompt = String::new();

    if facts.is_empty() {
        prompt.push_str("No business context has been provided.\n");
    } else {
        prompt.push_str("Business context:\n");
        for fact in facts {
            prompt.push_str(&format!("- [{}] {}\n", fact.category, fact.content));
        }
    }

    if let Some(product) = &brief.product {
        prompt.push_str(&format!("\nProduct: {product}\n"));
    }
    if let Some(objective) = &brief.objective {
        prompt.push_str(&format!("Campaign objective: {objective}\n"));
    }
    if let Some(notes) = &brief.notes {
        prompt.push_str(&format!("Additional notes: {notes}\n"));
    }
    prompt
}

fn parse_ideas(llm_response: &str, max: usize) -> Vec<CreativeIdea> {
    let json_str = extract_json_array(llm_response);

    let ideas: Vec<CreativeIdea> = match serde_json::from_str(&json_str) {
        Ok(ideas) => ideas,
        Err(e) => {
            warn!(error = %e, response = llm_response, "Failed to parse creative ideas");
            return vec![];
        }
    };

    ideas
        .into_iter()
        .filter(|i| !i.headline.trim().is_empty() && !i.primary_text.trim().is_empty())
        .take(max)
        .collect()
}

/// Extract a JSON array from LLM output that might contain markdown or extra text.
fn extract_json_array(text: &str) -> String {
    let trimmed = text.trim();

    if trimmed.starts_with('[') {
        return trimmed.to_string();
    }

    // Fenced code block, with or without a language tag
    if let Some(start) = trimmed.find("```") {
        let after = &trimmed[start + 3..];
        let after = after.strip_prefix("json").unwrap_or(after);
        if let Some(end) = after.find("```") {
            let inner = after[..end].trim();
            if inner.starts_with('[') {
                return inner.to_string();
            }
        }
    }

    if let (Some(start), Some(end)) = (trimmed.find('['), trimmed.rfind(']')) {
        if end > start {
            return trimmed[start..=end].to_string();
        }
    }

    trimmed.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::LlmError;
    use crate::llm::provider::CompletionResponse;
    use crate::store::{ContextCategory, LibSqlBackend};
    use async_trait::async_trait;
    use std::sync::Mutex;

    struct CannedLlm {
        response: String,
        prompts: Mutex<Vec<String>>,
    }

    impl CannedLlm {
        fn new(response: &str) -> Self {
            Self {
                response: response.to_string(),
                prompts: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl LlmProvider for CannedLlm {
        fn model_name(&self) -> &str {
            "canned"
        }

        async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError> {
            let user = request
                .messages
                .iter()
                .map(|m| m.content.clone())
                .collect::<Vec<_>>()
                .join("\n");
            self.prompts.lock().unwrap().push(user);
            Ok(CompletionResponse {
                content: self.response.clone(),
                input_tokens: 0,
                output_tokens: 0,
            })
        }
    }

    const TWO_IDEAS: &str = r#"[
        {"headline": "Run lighter", "primary_text": "Recycled sneakers built for 5Ks.", "call_to_action": "SHOP_NOW", "angle": "sustainability"},
        {"headline": "Your PB awaits", "primary_text": "Grip that holds on wet trails.", "call_to_action": "LEARN_MORE", "angle": "performance"}
    ]"#;

    #[test]
    fn extract_plain_array() {
        assert_eq!(extract_json_array("[1, 2]"), "[1, 2]");
    }

    #[test]
    fn extract_from_markdown_fence() {
        let text = "Here you go:\n```json\n[{\"a\": 1}]\n```\nEnjoy!";
        assert_eq!(extract_json_array(text), "[{\"a\": 1}]");
        let bare = "```\n[1]\n```";
        assert_eq!(extract_json_array(bare), "[1]");
    }

    #[test]
    fn extract_from_surrounding_prose() {
        assert_eq!(extract_json_array("Ideas: [1, 2] done"), "[1, 2]");
    }

    #[test]
    fn parse_caps_and_drops_blank_ideas() {
        let text = r#"[
            {"headline": "A", "primary_text": "a"},
            {"headline": " ", "primary_text": "skip"},
            {"headline": "B", "primary_text": "b"},
            {"headline": "C", "primary_text": "c"}
        ]"#;
        let ideas = parse_ideas(text, 2);
        assert_eq!(ideas.len(), 2);
        assert_eq!(ideas[1].headline, "B");
    }

    #[test]
    fn parse_garbage_is_empty() {
        assert!(parse_ideas("I cannot help with that.", 5).is_empty());
    }

    #[tokio::test]
    async fn generate_uses_business_context() {
        let db: Arc<dyn Database> = Arc::new(LibSqlBackend::new_memory().await.unwrap());
        db.insert_context(&BusinessContext::new(
            "u1",
            "Eco-friendly running shoes",
            ContextCategory::Product,
        ))
        .await
        .unwrap();

        let llm = Arc::new(CannedLlm::new(&format!("```json\n{TWO_IDEAS}\n```")));
        let generator = CreativeGenerator::new(Arc::clone(&db), llm.clone(), CreativeConfig::default());

        let ideas = generator
            .generate(
                "u1",
                &CreativeBrief {
                    objective: Some("sales".into()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        assert_eq!(ideas.len(), 2);
        assert_eq!(ideas[0].call_to_action.as_deref(), Some("SHOP_NOW"));

        let log = db.list_activity("u1", 1).await.unwrap();
        assert_eq!(log[0].agent, "creative");

        let prompts = llm.prompts.lock().unwrap();
        assert!(prompts[0].contains("[product] Eco-friendly running shoes"));
        assert!(prompts[0].contains("Campaign objective: sales"));
    }

    #[tokio::test]
    async fn generate_with_unparseable_output_fails() {
        let db: Arc<dyn Database> = Arc::new(LibSqlBackend::new_memory().await.unwrap());
        let generator = CreativeGenerator::new(
            db,
            Arc::new(CannedLlm::new("sorry")),
            CreativeConfig::default(),
        );
        let err = generator
            .generate("u1", &CreativeBrief::default())
            .await
            .unwrap_err();
        assert!(matches!(err, CreativeError::Empty));
    }
}
