use std::sync::Arc;

use async_trait::async_trait;
use futures::stream;

use crate::availability::AvailabilityGate;
use crate::core::{AdapterOptions, Lifecycle, LlmModel, PluginMetadata, RagError, Result, TextStream};
use crate::registry::AdapterContext;

/// Placeholder replaced by the prompt
pub const PROMPT_PLACEHOLDER: &str = "{prompt}";

/// Metadata of [`TemplateGenerator`]
pub fn template_generator_metadata() -> PluginMetadata {
    PluginMetadata::new(
        "template_generator",
        env!("CARGO_PKG_VERSION"),
        "Renders the prompt into a fixed template; offline stand-in for an LLM",
    )
    .with_dependencies(Vec::<String>::new())
    .with_min_requirements("none")
    .with_compatibility(">=0.1")
}

/// Generator rendering setting `template` (default `"{prompt}"`)
pub struct TemplateGenerator {
    name: String,
    template: String,
    gate: Arc<dyn AvailabilityGate>,
}

impl TemplateGenerator {
    /// Build from factory context
    pub fn from_context(ctx: &AdapterContext) -> Self {
        Self {
            name: ctx.name.clone(),
            template: ctx
                .setting_str("template")
                .unwrap_or(PROMPT_PLACEHOLDER)
                .to_string(),
            gate: ctx.gate.clone(),
        }
    }

    fn render(&self, prompt: &str) -> String {
        self.template.replace(PROMPT_PLACEHOLDER, prompt)
    }
}

#[async_trait]
impl Lifecycle for TemplateGenerator {
    fn version(&self) -> &str {
        env!("CARGO_PKG_VERSION")
    }

    fn metadata(&self) -> PluginMetadata {
        template_generator_metadata()
    }

    async fn do_initialize(&self) -> Result<()> {
        Ok(())
    }

    async fn do_validate(&self) -> Result<()> {
        if !self.gate.check_available(&self.name) {
            return Err(RagError::ServiceUnavailable {
                service: self.name.clone(),
            });
        }
        if !self.template.contains(PROMPT_PLACEHOLDER) {
            return Err(RagError::config(format!(
                "adapter '{}': template must contain {PROMPT_PLACEHOLDER}",
                self.name
            )));
        }
        Ok(())
    }

    async fn do_shutdown(&self) -> Result<()> {
        Ok(())
    }
}

#[async_trait]
impl LlmModel for TemplateGenerator {
    async fn generate(&self, prompt: &str, _options: &AdapterOptions) -> Result<String> {
        Ok(self.render(prompt))
    }

    /// Streams the rendered text word by word; concatenating the chunks
    /// gives the text with whitespace runs collapsed to single spaces
    async fn generate_stream(
        &self,
        prompt: &str,
        _options: &AdapterOptions,
    ) -> Result<Option<TextStream>> {
        let rendered = self.render(prompt);
        let chunks: Vec<Result<String>> = rendered
            .split_whitespace()
            .enumerate()
            .map(|(i, word)| Ok(if i == 0 { word.to_string() } else { format!(" {word}") }))
            .collect();
        Ok(Some(Box::pin(stream::iter(chunks))))
    }

    fn post_generate(&self, text: String) -> String {
        text.trim().to_string()
    }
}

#[cfg(test)]
mod tests {
    use futures::StreamExt;
    use serde_json::json;

    use super::*;

    fn generator(template: &str) -> TemplateGenerator {
        let mut settings = AdapterOptions::new();
        settings.insert("template".to_string(), json!(template));
        TemplateGenerator::from_context(&AdapterContext::new(
            "template_generator",
            settings,
            Arc::new(|_: &str| true),
        ))
    }

    #[tokio::test]
    async fn test_renders_template() {
        let llm = generator("Respuesta-Dummy para: {prompt}");
        let answer = llm.generate("hola", &AdapterOptions::new()).await.unwrap();
        assert_eq!(answer, "Respuesta-Dummy para: hola");
    }

    #[tokio::test]
    async fn test_streams_words() {
        let llm = generator("{prompt}");
        let stream = llm
            .generate_stream("uno  dos\ntres", &AdapterOptions::new())
            .await
            .unwrap()
            .unwrap();
        let chunks: Vec<String> = stream.map(|c| c.unwrap()).collect().await;
        assert_eq!(chunks, ["uno", " dos", " tres"]);
    }

    #[tokio::test]
    async fn test_template_without_placeholder_fails_validation() {
        let llm = generator("static answer");
        assert!(matches!(llm.do_validate().await, Err(RagError::Config { .. })));
    }
}
