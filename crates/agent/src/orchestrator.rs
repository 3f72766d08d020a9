//! Generation orchestrator: one prompt, one remote round-trip.
//!
//! The user's message is logged before the remote call so it survives a
//! failed generation. Failures come back as an assistant message in the
//! log rather than as an error.

use std::sync::Arc;

use docchat_core::error::Error;
use docchat_core::message::{ConversationLog, Message};
use docchat_core::provider::{ContentPart, GenerationRequest, GenerationService};
use docchat_core::selection::ContextSelection;
use tracing::{debug, error, info};

/// Default model for generation requests.
pub const DEFAULT_MODEL: &str = "gemini-2.0-flash";
/// Default sampling temperature.
pub const DEFAULT_TEMPERATURE: f32 = 0.3;
/// Default cap on response length.
pub const DEFAULT_MAX_OUTPUT_TOKENS: u32 = 2048;

/// Builds generation requests and records each turn in a conversation log.
pub struct Orchestrator {
    generator: Arc<dyn GenerationService>,
    model: String,
    temperature: f32,
    max_output_tokens: u32,
    system_instruction: Option<String>,
}

impl Orchestrator {
    /// Create an orchestrator with the default model and sampling settings.
    pub fn new(generator: Arc<dyn GenerationService>) -> Self {
        Self {
            generator,
            model: DEFAULT_MODEL.into(),
            temperature: DEFAULT_TEMPERATURE,
            max_output_tokens: DEFAULT_MAX_OUTPUT_TOKENS,
            system_instruction: None,
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_output_tokens(mut self, max: u32) -> Self {
        self.max_output_tokens = max;
        self
    }

    /// Set the rendered instruction profile sent as the system instruction.
    pub fn with_system_instruction(mut self, instruction: impl Into<String>) -> Self {
        let instruction = instruction.into();
        self.system_instruction = (!instruction.trim().is_empty()).then_some(instruction);
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Payload for a prompt: the text first, then each selected file.
    pub fn build_request(&self, prompt: &str, selection: &ContextSelection) -> GenerationRequest {
        let mut parts = Vec::with_capacity(selection.len() + 1);
        parts.push(ContentPart::Text {
            text: prompt.to_string(),
        });
        parts.extend(
            selection
                .handles()
                .cloned()
                .map(|handle| ContentPart::File { handle }),
        );

        GenerationRequest {
            model: self.model.clone(),
            parts,
            system_instruction: self.system_instruction.clone(),
            temperature: self.temperature,
            max_output_tokens: self.max_output_tokens,
        }
    }

    /// Ask the model about the selected files.
    ///
    /// Appends exactly two messages to `log` (user, then assistant) and
    /// returns the assistant one, which holds the error text on failure.
    pub async fn ask(
        &self,
        prompt: &str,
        selection: &ContextSelection,
        log: &mut ConversationLog,
    ) -> Message {
        let context_files = selection.names();
        log.append(Message::user(prompt, context_files.clone()));

        let request = self.build_request(prompt, selection);
        info!(
            model = %self.model,
            files = context_files.len(),
            prompt_len = prompt.len(),
            "Asking model"
        );

        let reply = match self.generator.generate(request).await {
            Ok(response) => {
                debug!(model = %response.model, chars = response.text.len(), "Model answered");
                Message::assistant(response.text, context_files)
            }
            Err(source) => {
                let notice = Message::notice(format!("Error generating response: {source}"));
                let err = Error::Generation(source);
                error!(error = %err, "Generation failed");
                notice
            }
        };

        log.append(reply.clone());
        reply
    }
}
