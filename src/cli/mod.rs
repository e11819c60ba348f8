use clap::Parser;

#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    // --- History Store Args ---
    /// History chat store type (redis, memory)
    #[arg(long, env = "HISTORY_TYPE", default_value = "memory")]
    pub history_type: String,

    /// History chat store host endpoint (e.g., redis://127.0.0.1:6379)
    #[arg(long, env = "HISTORY_HOST", default_value = "redis://127.0.0.1:6379")]
    pub history_host: String,

    /// Prefix for Redis history keys.
    #[arg(long, env = "HISTORY_REDIS_PREFIX", default_value = "chats:")]
    pub history_redis_prefix: String,

    // --- Chat LLM Provider Args ---
    /// Type of LLM provider for chat completion (ollama, openai, anthropic, gemini, deepseek, xai, groq)
    #[arg(long, env = "CHAT_LLM_TYPE", default_value = "ollama")]
    pub chat_llm_type: String,

    /// Base URL for the Chat LLM provider API (e.g., http://localhost:11434 for Ollama)
    #[arg(long, env = "CHAT_BASE_URL")] // No default, let adapters handle defaults if None
    pub chat_base_url: Option<String>,

    /// API Key for the Chat LLM provider (e.g., OpenAI, Anthropic)
    #[arg(long, env = "CHAT_API_KEY", default_value = "")]
    pub chat_api_key: String,

    /// Model name for chat completion (e.g., gpt-4o-mini, llama3.1)
    #[arg(long, env = "CHAT_MODEL")] // No default, rely on adapter defaults if None
    pub chat_model: Option<String>,

    /// Optional file holding the assistant's system prompt. The built-in prompt is used when unset.
    #[arg(long, env = "SYSTEM_PROMPT_PATH")]
    pub system_prompt_path: Option<String>,

    // --- General App Args ---
    /// Host address and port for the server to listen on.
    #[arg(long, env = "SERVER_ADDR", default_value = "127.0.0.1:8000")]
    pub server_addr: String,

    /// Upper bound in seconds on each agent call made by a request handler.
    #[arg(long, env = "REQUEST_TIMEOUT_SECS", default_value = "60")]
    pub request_timeout_secs: u64,

    /// Optional path to the TLS certificate file (PEM format) for enabling HTTPS. Requires --tls-key-path.
    #[arg(long, env = "TLS_CERT_PATH")]
    pub tls_cert_path: Option<String>,

    /// Optional path to the TLS private key file (PEM format) for enabling HTTPS. Requires --tls-cert-path.
    #[arg(long, env = "TLS_KEY_PATH")]
    pub tls_key_path: Option<String>,

    #[arg(long, env = "ENABLE_TLS", default_value = "false")]
    pub enable_tls: bool,
}

impl Args {
    /// Both TLS paths are required for TLS to take effect.
    pub fn tls_paths(&self) -> Option<(&str, &str)> {
        if !self.enable_tls {
            return None;
        }
        match (&self.tls_cert_path, &self.tls_key_path) {
            (Some(cert), Some(key)) => Some((cert.as_str(), key.as_str())),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_use_memory_history_and_ollama() {
        let args = Args::try_parse_from(["trust-chat"]).unwrap();
        assert_eq!(args.history_type, "memory");
        assert_eq!(args.chat_llm_type, "ollama");
        assert_eq!(args.request_timeout_secs, 60);
        assert_eq!(args.tls_paths(), None);
    }

    #[test]
    fn tls_needs_flag_and_both_paths() {
        let args = Args::try_parse_from([
            "trust-chat",
            "--enable-tls",
            "--tls-cert-path",
            "cert.pem",
            "--tls-key-path",
            "key.pem",
        ]).unwrap();
        assert_eq!(args.tls_paths(), Some(("cert.pem", "key.pem")));

        let args = Args::try_parse_from(["trust-chat", "--enable-tls", "--tls-cert-path", "cert.pem"]).unwrap();
        assert_eq!(args.tls_paths(), None);
    }
}
