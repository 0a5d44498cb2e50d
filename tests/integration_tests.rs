//! Integration tests for the duplex library.
//! These tests require a running chat endpoint; set DUPLEX_CHAT_URL to run.

#[cfg(test)]
mod tests {
    use futures::StreamExt;

    use duplex::settings::DEFAULT_MODEL;
    use duplex::{ChatClient, ChatRequest, CumulativeStream};

    #[tokio::test]
    async fn test_health_check() {
        let base_url = std::env::var("DUPLEX_CHAT_URL").ok();
        if base_url.is_none() {
            eprintln!("Skipping test: DUPLEX_CHAT_URL not set");
            return;
        }

        let client = ChatClient::with_options(base_url, None).expect("Failed to create client");
        let status = client.health().await.expect("Health check should succeed");
        assert_eq!(status, "ok");
    }

    #[tokio::test]
    async fn test_streaming_response() {
        let base_url = std::env::var("DUPLEX_CHAT_URL").ok();
        if base_url.is_none() {
            eprintln!("Skipping test: DUPLEX_CHAT_URL not set");
            return;
        }

        let client = ChatClient::with_options(base_url, None).expect("Failed to create client");
        let request = ChatRequest {
            developer_message: "You are a helpful AI assistant.".to_string(),
            user_message: "Say 'test passed'".to_string(),
            model: DEFAULT_MODEL.to_string(),
            hf_token: std::env::var("HF_TOKEN").ok(),
        };

        let stream = client.stream(request).await.expect("Stream should open");
        let (mut snapshots, final_text) = CumulativeStream::new(stream);

        let mut previous = String::new();
        while let Some(item) = snapshots.next().await {
            let snapshot = item.expect("Stream should not fail");
            assert!(snapshot.starts_with(&previous));
            previous = snapshot;
        }

        let final_text = final_text.await.expect("Final text should be sent");
        assert_eq!(final_text.expect("Stream should complete"), previous);
        assert!(!previous.is_empty(), "Expected a non-empty response");
    }
}
