//! ntfy Push Notifier
//!
//! Publishes a notification as a plain-text POST to `{server}/{topic}`.
//! Title, tags, priority and the click action travel as HTTP headers,
//! which only carry Latin-1, so header text is re-encoded byte by byte
//! with `?` for anything that does not fit.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use reqwest::Client;

use crate::ports::notifier::{Notification, Notifier, NotifyError};

pub const DEFAULT_NTFY_SERVER: &str = "https://ntfy.sh";

const ERROR_BODY_LIMIT: usize = 200;

#[derive(Debug, Clone)]
pub struct NtfyConfig {
    pub server: String,
    pub topic: String,
    /// Access token for protected topics
    pub token: Option<String>,
    pub timeout: Duration,
}

impl Default for NtfyConfig {
    fn default() -> Self {
        Self {
            server: DEFAULT_NTFY_SERVER.to_string(),
            topic: String::new(),
            token: None,
            timeout: Duration::from_secs(10),
        }
    }
}

/// Single-attempt ntfy publisher
#[derive(Debug, Clone)]
pub struct NtfyNotifier {
    config: NtfyConfig,
    http: Client,
}

impl NtfyNotifier {
    pub fn with_config(config: NtfyConfig) -> Result<Self, NotifyError> {
        if config.topic.trim().is_empty() {
            return Err(NotifyError::Config("ntfy topic is empty".to_string()));
        }

        let http = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| NotifyError::Config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { config, http })
    }

    pub fn topic_url(&self) -> String {
        format!(
            "{}/{}",
            self.config.server.trim_end_matches('/'),
            self.config.topic.trim_matches('/')
        )
    }

    fn headers(&self, notification: &Notification) -> Result<HeaderMap, NotifyError> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("text/plain; charset=utf-8"));

        insert_text(&mut headers, "title", &notification.title)?;
        if !notification.tags.is_empty() {
            insert_text(&mut headers, "tags", &notification.tags.join(","))?;
        }
        insert_text(
            &mut headers,
            "priority",
            &notification.priority.clamp(1, 5).to_string(),
        )?;
        if !notification.action_url.is_empty() {
            let action = format!(
                "view, {}, {}",
                notification.action_label.replace(',', " "),
                notification.action_url
            );
            insert_text(&mut headers, "actions", &action)?;
            insert_text(&mut headers, "click", &notification.action_url)?;
        }

        if let Some(ref token) = self.config.token {
            let value = HeaderValue::from_str(&format!("Bearer {}", token))
                .map_err(|e| NotifyError::Config(format!("invalid token: {}", e)))?;
            headers.insert(AUTHORIZATION, value);
        }

        Ok(headers)
    }
}

fn insert_text(headers: &mut HeaderMap, name: &'static str, text: &str) -> Result<(), NotifyError> {
    let value = HeaderValue::from_bytes(&encode_for_transport(text))
        .map_err(|e| NotifyError::Config(format!("header {}: {}", name, e)))?;
    headers.insert(HeaderName::from_static(name), value);
    Ok(())
}

/// Latin-1 bytes for `text`; unsupported and control characters become `?`
pub fn encode_for_transport(text: &str) -> Vec<u8> {
    text.chars()
        .map(|c| {
            let code = c as u32;
            if code <= 0xFF && (c == '\t' || !c.is_control()) {
                code as u8
            } else {
                b'?'
            }
        })
        .collect()
}

#[async_trait]
impl Notifier for NtfyNotifier {
    fn name(&self) -> &str {
        "ntfy"
    }

    async fn send(&self, notification: &Notification) -> Result<(), NotifyError> {
        let headers = self.headers(notification)?;

        let response = self
            .http
            .post(self.topic_url())
            .headers(headers)
            .body(notification.body.clone())
            .send()
            .await
            .map_err(|e| NotifyError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let mut body = response.text().await.unwrap_or_default();
            if body.len() > ERROR_BODY_LIMIT {
                let mut end = ERROR_BODY_LIMIT;
                while !body.is_char_boundary(end) {
                    end -= 1;
                }
                body.truncate(end);
            }
            return Err(NotifyError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        tracing::debug!("ntfy accepted \"{}\"", notification.title);
        Ok(())
    }
}
