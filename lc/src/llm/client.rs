//! LlmClient trait definition

use async_trait::async_trait;

use super::{CompletionRequest, CompletionResponse, LlmError};

/// Stateless LLM client - each call is independent
#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError>;
}

#[cfg(test)]
pub mod mock {
    use super::*;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tracing::debug;

    /// Replays canned responses in order and remembers the requests
    pub struct MockLlmClient {
        responses: Vec<Result<CompletionResponse, String>>,
        call_count: AtomicUsize,
        requests: Mutex<Vec<CompletionRequest>>,
    }

    impl MockLlmClient {
        pub fn new(responses: Vec<CompletionResponse>) -> Self {
            debug!(response_count = %responses.len(), "MockLlmClient::new: called");
            Self::scripted(responses.into_iter().map(Ok).collect())
        }

        /// Responses where `Err(msg)` turns into an API error for that call
        pub fn scripted(responses: Vec<Result<CompletionResponse, String>>) -> Self {
            Self {
                responses,
                call_count: AtomicUsize::new(0),
                requests: Mutex::new(Vec::new()),
            }
        }

        pub fn call_count(&self) -> usize {
            self.call_count.load(Ordering::SeqCst)
        }

        pub fn requests(&self) -> Vec<CompletionRequest> {
            self.requests.lock().map(|r| r.clone()).unwrap_or_default()
        }
    }

    #[async_trait]
    impl LlmClient for MockLlmClient {
        async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError> {
            debug!("MockLlmClient::complete: called");
            if let Ok(mut requests) = self.requests.lock() {
                requests.push(request);
            }
            let idx = self.call_count.fetch_add(1, Ordering::SeqCst);
            match self.responses.get(idx) {
                Some(Ok(response)) => Ok(response.clone()),
                Some(Err(message)) => Err(LlmError::ApiError {
                    status: 500,
                    message: message.clone(),
                }),
                None => {
                    debug!("MockLlmClient::complete: no more mock responses");
                    Err(LlmError::InvalidResponse("No more mock responses".to_string()))
                }
            }
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[tokio::test]
        async fn test_mock_client_returns_responses() {
            let client = MockLlmClient::new(vec![
                CompletionResponse::text("Response 1"),
                CompletionResponse::text("Response 2"),
            ]);
            let req = CompletionRequest::single("Test", "hi", 1000);

            let resp1 = client.complete(req.clone()).await.unwrap();
            assert_eq!(resp1.content.as_deref(), Some("Response 1"));
            let resp2 = client.complete(req).await.unwrap();
            assert_eq!(resp2.content.as_deref(), Some("Response 2"));

            assert_eq!(client.call_count(), 2);
            assert_eq!(client.requests().len(), 2);
        }

        #[tokio::test]
        async fn test_mock_client_scripted_error_and_exhaustion() {
            let client = MockLlmClient::scripted(vec![Err("down".to_string())]);
            let req = CompletionRequest::single("Test", "hi", 1000);

            assert!(matches!(
                client.complete(req.clone()).await,
                Err(LlmError::ApiError { status: 500, .. })
            ));
            assert!(matches!(
                client.complete(req).await,
                Err(LlmError::InvalidResponse(_))
            ));
        }
    }
}
