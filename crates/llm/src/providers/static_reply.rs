//! Offline client that answers with canned text.
//!
//! Useful for dry runs of the pipeline without a model server, and as the
//! generator in tests: replies are served in order and every prompt is kept
//! for inspection.

use crate::client::{LlmClient, LlmRequest, LlmResponse, LlmStream, LlmStreamChunk, LlmUsage};
use parking_lot::Mutex;
use sift_core::{AppError, AppResult};
use std::collections::VecDeque;

/// Client returning scripted replies.
///
/// Replies are consumed front to back; once a single reply remains it is
/// repeated for every further request.
#[derive(Debug, Default)]
pub struct StaticClient {
    replies: Mutex<VecDeque<String>>,
    prompts: Mutex<Vec<String>>,
    fail_with: Option<String>,
}

impl StaticClient {
    /// Always answer with `reply`.
    pub fn new(reply: impl Into<String>) -> Self {
        Self::scripted([reply.into()])
    }

    /// Answer with each reply in turn.
    pub fn scripted<I, S>(replies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            replies: Mutex::new(replies.into_iter().map(Into::into).collect()),
            prompts: Mutex::new(Vec::new()),
            fail_with: None,
        }
    }

    /// Fail every request with an LLM error.
    pub fn failing(message: impl Into<String>) -> Self {
        Self {
            fail_with: Some(message.into()),
            ..Self::default()
        }
    }

    /// Prompts received so far, oldest first.
    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().clone()
    }

    fn next_reply(&self, request: &LlmRequest) -> AppResult<String> {
        self.prompts.lock().push(request.prompt.clone());

        if let Some(message) = &self.fail_with {
            return Err(AppError::Llm(message.clone()));
        }

        let mut replies = self.replies.lock();
        let reply = if replies.len() > 1 {
            replies.pop_front()
        } else {
            replies.front().cloned()
        };
        Ok(reply.unwrap_or_default())
    }
}

#[async_trait::async_trait]
impl LlmClient for StaticClient {
    fn provider_name(&self) -> &str {
        "static"
    }

    async fn complete(&self, request: &LlmRequest) -> AppResult<LlmResponse> {
        let content = self.next_reply(request)?;
        Ok(LlmResponse {
            usage: LlmUsage::new(0, content.split_whitespace().count() as u32),
            content,
            model: request.model.clone(),
            done: true,
        })
    }

    async fn stream(&self, request: &LlmRequest) -> AppResult<LlmStream> {
        let content = self.next_reply(request)?;
        let model = request.model.clone();

        // Emit word by word, keeping the separating whitespace.
        let mut chunks: Vec<AppResult<LlmStreamChunk>> = content
            .split_inclusive(' ')
            .map(|piece| {
                Ok(LlmStreamChunk {
                    content: piece.to_string(),
                    model: model.clone(),
                    done: false,
                    usage: None,
                })
            })
            .collect();
        chunks.push(Ok(LlmStreamChunk {
            content: String::new(),
            model,
            done: true,
            usage: Some(LlmUsage::default()),
        }));

        Ok(Box::pin(futures::stream::iter(chunks)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::collect_stream;

    #[tokio::test]
    async fn test_scripted_replies_then_repeat_last() {
        let client = StaticClient::scripted(["first", "second"]);
        let request = LlmRequest::new("p", "static");

        assert_eq!(client.complete(&request).await.unwrap().content, "first");
        assert_eq!(client.complete(&request).await.unwrap().content, "second");
        assert_eq!(client.complete(&request).await.unwrap().content, "second");
        assert_eq!(client.prompts().len(), 3);
    }

    #[tokio::test]
    async fn test_stream_reassembles_reply() {
        let client = StaticClient::new("a streamed reply");
        let request = LlmRequest::new("p", "static");

        let stream = client.stream(&request).await.unwrap();
        let response = collect_stream(stream).await.unwrap();
        assert_eq!(response.content, "a streamed reply");
        assert!(response.done);
    }

    #[tokio::test]
    async fn test_failing_client() {
        let client = StaticClient::failing("model offline");
        let err = client
            .complete(&LlmRequest::new("p", "static"))
            .await
            .unwrap_err();
        assert!(err.is_retryable());
        assert_eq!(client.prompts(), vec!["p".to_string()]);
    }
}
