//! Provider-specific configuration and detection.
//!
//! This module handles URL differences between `OpenAI`-compatible providers.

/// Default API version for Azure `OpenAI` deployments.
pub const AZURE_API_VERSION: &str = "2024-08-01-preview";

/// Supported LLM providers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Provider {
    /// `OpenAI` (api.openai.com)
    OpenAI,
    /// Azure `OpenAI` Service; the client's model name doubles as the deployment name.
    AzureOpenAI {
        /// API version (e.g., "2024-08-01-preview")
        api_version: String,
    },
    /// Any other OpenAI-compatible provider (`OpenRouter`, Groq, local servers)
    Generic,
}

impl Provider {
    /// Detect provider from base URL.
    ///
    /// # Example
    ///
    /// ```rust,ignore
    /// let provider = Provider::detect_from_url("https://api.openai.com");
    /// assert_eq!(provider, Provider::OpenAI);
    /// ```
    #[must_use]
    pub fn detect_from_url(base_url: &str) -> Self {
        let lower = base_url.to_lowercase();

        if lower.contains("azure.com") {
            Self::AzureOpenAI {
                api_version: AZURE_API_VERSION.to_string(),
            }
        } else if lower.contains("openai.com") {
            Self::OpenAI
        } else {
            Self::Generic
        }
    }

    /// Build the chat completions URL for this provider.
    #[must_use]
    pub fn build_chat_url(&self, base_url: &str, model: &str) -> String {
        let base = base_url.trim_end_matches('/');

        match self {
            Self::AzureOpenAI { api_version } => {
                format!(
                    "{base}/openai/deployments/{model}/chat/completions?api-version={api_version}"
                )
            }
            Self::OpenAI | Self::Generic => format!("{base}/v1/chat/completions"),
        }
    }

    /// Build the Responses API URL for this provider.
    #[must_use]
    pub fn build_responses_url(&self, base_url: &str) -> String {
        let base = base_url.trim_end_matches('/');

        match self {
            Self::AzureOpenAI { api_version } => {
                format!("{base}/openai/responses?api-version={api_version}")
            }
            _ => format!("{base}/v1/responses"),
        }
    }
}
