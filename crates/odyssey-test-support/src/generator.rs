//! Scripted generator — deterministic `Generator` implementation for tests.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use odyssey_core::asset::Asset;
use odyssey_core::error::GenerationError;
use odyssey_core::generator::Generator;

/// A generator whose outcomes are fixed up front.
///
/// Image generation fails the first `image_failures` times for each distinct
/// prompt and succeeds afterwards, except for prompts containing one of the
/// `failing_prompts` fragments, which always fail. Every call is recorded.
#[derive(Debug)]
pub struct ScriptedGenerator {
    image_failures: u32,
    failing_prompts: Vec<String>,
    text_reply: Result<String, GenerationError>,
    structured_reply: Result<serde_json::Value, GenerationError>,
    attempts: Mutex<HashMap<String, u32>>,
    image_calls: Mutex<Vec<String>>,
    text_calls: Mutex<Vec<String>>,
    structured_calls: Mutex<Vec<String>>,
}

impl Default for ScriptedGenerator {
    fn default() -> Self {
        Self {
            image_failures: 0,
            failing_prompts: Vec::new(),
            text_reply: Ok("generated narrative".to_owned()),
            structured_reply: Err(GenerationError::Backend("no structured output".into())),
            attempts: Mutex::new(HashMap::new()),
            image_calls: Mutex::new(Vec::new()),
            text_calls: Mutex::new(Vec::new()),
            structured_calls: Mutex::new(Vec::new()),
        }
    }
}

impl ScriptedGenerator {
    /// Create a generator whose images always succeed, whose text replies
    /// with `"generated narrative"` and whose structured output fails.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail each distinct image prompt `failures` times before succeeding.
    #[must_use]
    pub fn with_image_failures(mut self, failures: u32) -> Self {
        self.image_failures = failures;
        self
    }

    /// Always fail image prompts containing `fragment`.
    #[must_use]
    pub fn with_failing_prompt(mut self, fragment: impl Into<String>) -> Self {
        self.failing_prompts.push(fragment.into());
        self
    }

    /// Set the result of every `generate_text` call.
    #[must_use]
    pub fn with_text(mut self, reply: Result<String, GenerationError>) -> Self {
        self.text_reply = reply;
        self
    }

    /// Set the result of every `generate_structured` call.
    #[must_use]
    pub fn with_structured(mut self, reply: Result<serde_json::Value, GenerationError>) -> Self {
        self.structured_reply = reply;
        self
    }

    /// Returns every image prompt received, in call order.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn image_calls(&self) -> Vec<String> {
        self.image_calls.lock().unwrap().clone()
    }

    /// Returns every text prompt received, in call order.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn text_calls(&self) -> Vec<String> {
        self.text_calls.lock().unwrap().clone()
    }

    /// Returns every structured prompt received, in call order.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn structured_calls(&self) -> Vec<String> {
        self.structured_calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl Generator for ScriptedGenerator {
    async fn generate_image(&self, prompt: &str) -> Result<Asset, GenerationError> {
        self.image_calls.lock().unwrap().push(prompt.to_owned());

        if self.failing_prompts.iter().any(|f| prompt.contains(f.as_str())) {
            return Err(GenerationError::Timeout(30));
        }

        let attempt = {
            let mut attempts = self.attempts.lock().unwrap();
            let count = attempts.entry(prompt.to_owned()).or_insert(0);
            *count += 1;
            *count
        };

        // Yield between attempts so concurrent callers interleave.
        tokio::task::yield_now().await;

        if attempt <= self.image_failures {
            Err(GenerationError::Quota(format!("attempt {attempt}")))
        } else {
            Ok(Asset::new("image/png", prompt.as_bytes().to_vec()))
        }
    }

    async fn generate_text(
        &self,
        prompt: &str,
        _system_prompt: Option<&str>,
    ) -> Result<String, GenerationError> {
        self.text_calls.lock().unwrap().push(prompt.to_owned());
        self.text_reply.clone()
    }

    async fn generate_structured(
        &self,
        prompt: &str,
    ) -> Result<serde_json::Value, GenerationError> {
        self.structured_calls.lock().unwrap().push(prompt.to_owned());
        self.structured_reply.clone()
    }
}
