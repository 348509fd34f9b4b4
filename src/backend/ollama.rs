//! Ollama Gateway
//!
//! Answers commands with a local Ollama model. Before calling the model
//! the gateway enriches the prompt: URLs in the message are fetched and
//! reduced to text, and questions that need current information get a note
//! that live search is unavailable.

use async_trait::async_trait;
use chrono::{DateTime, Local};
use futures::future::join_all;
use lazy_static::lazy_static;
use regex::Regex;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, warn};

use super::{classify_failure, BackendError, BackendGateway, ChatReply, ChatRequest};
use crate::config::Config;
use crate::i18n::Language;

/// Characters of page text kept per fetched URL
const PAGE_TEXT_LIMIT: usize = 2000;

/// Words suggesting the user wants current information
const CURRENT_INFO_KEYWORDS: &[&str] = &[
    "current",
    "latest",
    "recent",
    "today",
    "now",
    "happening",
    "news",
    "update",
    "what is",
    "tell me about",
    "information about",
    "search",
    "find",
    "weather",
    "price",
    "stock",
    "event",
    "incident",
    "protest",
    "government",
    "politics",
    "breaking",
    "report",
    "issue",
    "problem",
];

const BROWSER_USER_AGENT: &str =
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0 Safari/537.36";

lazy_static! {
    static ref URL_RE: Regex = Regex::new(
        r"(?i)(https?://[^\s]+|www\.[^\s]+|[a-z0-9-]+\.[a-z]{2,}(?:/[^\s]*)?)"
    )
    .expect("valid URL pattern");
    static ref SCRIPT_RE: Regex =
        Regex::new(r"(?is)<script[^>]*>.*?</script>").expect("valid script pattern");
    static ref STYLE_RE: Regex =
        Regex::new(r"(?is)<style[^>]*>.*?</style>").expect("valid style pattern");
    static ref TAG_RE: Regex = Regex::new(r"<[^>]*>").expect("valid tag pattern");
    static ref SPACE_RE: Regex = Regex::new(r"\s+").expect("valid whitespace pattern");
}

/// Ollama API response
#[derive(Debug, Deserialize)]
struct OllamaResponse {
    response: String,
}

/// Extra context gathered before calling the model
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Enrichment {
    None,
    Webpages(String),
    CurrentInfo(String),
}

/// Local Ollama-backed gateway
#[derive(Debug, Clone)]
pub struct OllamaGateway {
    client: reqwest::Client,
    url: String,
    model: String,
    timeout: Duration,
}

impl OllamaGateway {
    pub fn new(config: &Config) -> Self {
        Self {
            client: reqwest::Client::new(),
            url: config.ollama_url.trim_end_matches('/').to_string(),
            model: config.ollama_model.clone(),
            timeout: Duration::from_secs(config.backend_timeout_secs),
        }
    }

    async fn enrich(&self, message: &str) -> Enrichment {
        let urls = find_urls(message);
        if !urls.is_empty() {
            debug!("Found URLs in message, fetching content: {:?}", urls);
            let pages = join_all(urls.iter().map(|url| self.fetch_page(url))).await;
            return Enrichment::Webpages(pages.join("\n\n"));
        }
        if needs_current_info(message) {
            return Enrichment::CurrentInfo(current_info_note(message));
        }
        Enrichment::None
    }

    async fn fetch_page(&self, url: &str) -> String {
        let response = self
            .client
            .get(url)
            .header(reqwest::header::USER_AGENT, BROWSER_USER_AGENT)
            .timeout(Duration::from_secs(10))
            .send()
            .await;

        let response = match response {
            Ok(r) => r,
            Err(e) => {
                warn!("Error fetching {}: {}", url, e);
                return format!("Unable to fetch content from {url} due to network error");
            }
        };
        let status = response.status();
        if !status.is_success() {
            return format!(
                "Unable to fetch content from {url} (Status: {})",
                status.as_u16()
            );
        }
        match response.text().await {
            Ok(html) => format!("Content from {url}:\n{}", page_excerpt(&html)),
            Err(e) => {
                warn!("Error reading {}: {}", url, e);
                format!("Unable to fetch content from {url} due to network error")
            }
        }
    }
}

#[async_trait]
impl BackendGateway for OllamaGateway {
    async fn send(&self, request: &ChatRequest) -> Result<ChatReply, BackendError> {
        if self.model.trim().is_empty() {
            return Err(BackendError::Configuration(
                "Ollama model not configured".to_string(),
            ));
        }

        let enrichment = self.enrich(&request.message).await;
        let prompt = build_prompt(request, &enrichment, Local::now());

        let response = self
            .client
            .post(format!("{}/api/generate", self.url))
            .json(&serde_json::json!({
                "model": self.model,
                "prompt": prompt,
                "stream": false,
            }))
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| BackendError::Network(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| BackendError::Network(e.to_string()))?;

        if !status.is_success() {
            warn!("❌ Ollama API Error ({}): {}", status, body);
            return Err(classify_failure(status.as_u16(), &body));
        }

        let parsed: OllamaResponse = serde_json::from_str(&body).map_err(|e| {
            warn!("❌ Failed to deserialize Ollama response: {} - Body: {}", e, body);
            BackendError::MalformedResponse(e.to_string())
        })?;

        let text = parsed.response.trim();
        if text.is_empty() {
            return Err(BackendError::MalformedResponse(
                "empty model response".to_string(),
            ));
        }
        Ok(ChatReply {
            response: text.to_string(),
        })
    }

    async fn health_check(&self) -> bool {
        match self
            .client
            .get(format!("{}/api/tags", self.url))
            .timeout(Duration::from_secs(2))
            .send()
            .await
        {
            Ok(resp) => resp.status().is_success(),
            Err(_) => false,
        }
    }

    fn name(&self) -> &str {
        "ollama"
    }
}

/// URLs mentioned in a message, with a scheme added where missing
pub fn find_urls(message: &str) -> Vec<String> {
    URL_RE
        .find_iter(message)
        .map(|m| {
            let url = m.as_str();
            if url.starts_with("http://") || url.starts_with("https://") {
                url.to_string()
            } else {
                format!("https://{url}")
            }
        })
        .collect()
}

pub fn needs_current_info(message: &str) -> bool {
    let lower = message.to_lowercase();
    CURRENT_INFO_KEYWORDS.iter().any(|kw| lower.contains(kw))
}

fn current_info_note(query: &str) -> String {
    format!(
        "I attempted to search for current information about \"{query}\" but don't have access to real-time web search at the moment. For the most current information, I recommend checking reputable news sources."
    )
}

/// Visible text of an HTML page, truncated
pub fn page_excerpt(html: &str) -> String {
    let text = SCRIPT_RE.replace_all(html, "");
    let text = STYLE_RE.replace_all(&text, "");
    let text = TAG_RE.replace_all(&text, " ");
    let text = SPACE_RE.replace_all(&text, " ");
    let text = text.trim();

    if text.chars().count() > PAGE_TEXT_LIMIT {
        let head: String = text.chars().take(PAGE_TEXT_LIMIT).collect();
        format!("{head}...")
    } else {
        text.to_string()
    }
}

fn language_instructions(language: Language) -> String {
    if language == Language::English {
        return "LANGUAGE INSTRUCTIONS:\n\
                - Respond in English as the primary language\n\
                - Occasional Hindi, Telugu, Tamil or Kannada phrases are fine when natural"
            .to_string();
    }
    let name = match language {
        Language::Telugu => "Telugu",
        Language::Hindi => "Hindi",
        Language::Kannada => "Kannada",
        Language::Tamil => "Tamil",
        Language::English => "English",
    };
    format!(
        "LANGUAGE INSTRUCTIONS:\n\
         - Respond ONLY in {name} ({native}) using its own script\n\
         - Do not add English translations or parentheses unless asked\n\
         - Do not switch to English mid-answer",
        native = language.name()
    )
}

/// Assemble the model prompt for a request
pub fn build_prompt(request: &ChatRequest, enrichment: &Enrichment, now: DateTime<Local>) -> String {
    let mut prompt = String::new();
    prompt.push_str(
        "You are Krrish, a warm and friendly personal voice assistant. \
         Your answers are spoken aloud, so keep them concise and conversational.\n\n",
    );
    prompt.push_str(&format!(
        "Today's date: {}\nCurrent time: {}\n\n",
        now.format("%A, %B %-d, %Y"),
        now.format("%H:%M")
    ));
    prompt.push_str(&language_instructions(request.language));
    prompt.push_str("\n\n");

    if request.conversation_history.iter().any(|m| m.is_from_user) {
        prompt.push_str(
            "GREETING INSTRUCTIONS:\n- Do not greet again; answer the question directly\n\n",
        );
    } else {
        prompt.push_str(
            "GREETING INSTRUCTIONS:\n- This is the first question: open with a short greeting in the user's language\n\n",
        );
    }

    match enrichment {
        Enrichment::Webpages(content) => {
            prompt.push_str("WEBPAGE CONTENT:\n");
            prompt.push_str(content);
            prompt.push_str(
                "\n\nUse this content to summarize or answer questions about the page(s).\n\n",
            );
        }
        Enrichment::CurrentInfo(note) => {
            prompt.push_str("CURRENT INFORMATION FROM WEB SEARCH:\n");
            prompt.push_str(note);
            prompt.push_str(
                "\n\nIf no current information is available, say so and suggest reliable sources.\n\n",
            );
        }
        Enrichment::None => {}
    }

    prompt.push_str("Previous conversation:\n");
    for message in &request.conversation_history {
        let speaker = if message.is_from_user { "User" } else { "Krrish" };
        prompt.push_str(&format!("{speaker}: {}\n", message.text));
    }
    prompt.push_str(&format!("\nUser: {}\nKrrish:", request.message));
    prompt
}
