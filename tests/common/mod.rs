//! Test server booted on an ephemeral port over an in-memory store.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;

use prompt_match::api;
use prompt_match::app_state::AppState;
use prompt_match::config::MatchPolicy;
use prompt_match::domain::{
    ConnectionRegistry, DeployedPrompt, NotificationDispatcher, PromptId, PromptStatus, ThemeId,
    UserId, UserProfile,
};
use prompt_match::persistence::Stores;
use prompt_match::persistence::memory::MemoryStore;
use prompt_match::service::{DiscoveryQueue, MatchService};

pub struct TestServer {
    pub base: String,
    pub ws_base: String,
    pub store: Arc<MemoryStore>,
    pub client: reqwest::Client,
    pub theme: ThemeId,
}

impl TestServer {
    pub async fn start() -> Self {
        let store = Arc::new(MemoryStore::new());
        let registry = Arc::new(ConnectionRegistry::new(16));
        let service = Arc::new(MatchService::new(
            Stores::from_backend(Arc::clone(&store)),
            NotificationDispatcher::new(registry),
            MatchPolicy::default(),
        ));
        let (discovery, _worker) = DiscoveryQueue::spawn(Arc::clone(&service), 16);
        let app = api::build_app(AppState::new(service, discovery));

        let Ok(listener) = tokio::net::TcpListener::bind("127.0.0.1:0").await else {
            panic!("bind failed");
        };
        let Ok(addr) = listener.local_addr() else {
            panic!("no local addr");
        };
        tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });

        Self {
            base: format!("http://{addr}"),
            ws_base: format!("ws://{addr}"),
            store,
            client: reqwest::Client::new(),
            theme: ThemeId::new(),
        }
    }

    pub async fn user(&self, name: &str) -> UserId {
        let id = UserId::new();
        self.store
            .insert_user(UserProfile {
                id,
                name: Some(name.to_string()),
                username: None,
                profile_picture_url: None,
                personality_summary: None,
            })
            .await;
        id
    }

    pub async fn deploy(&self, owner: UserId, question: &str) -> PromptId {
        let now = Utc::now();
        let id = PromptId::new();
        self.store
            .insert_prompt(DeployedPrompt {
                id,
                owner_id: owner,
                theme_id: self.theme,
                theme_name: "Travel".to_string(),
                question: question.to_string(),
                status: PromptStatus::Active,
                deployed_at: now,
                expires_at: now + chrono::Duration::days(3),
            })
            .await;
        id
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base)
    }

    pub async fn post_as(&self, user: UserId, path: &str) -> reqwest::Response {
        let Ok(response) = self
            .client
            .post(self.url(path))
            .header("x-user-id", user.to_string())
            .send()
            .await
        else {
            panic!("POST {path} failed");
        };
        response
    }

    pub async fn get_as(&self, user: UserId, path: &str) -> reqwest::Response {
        let Ok(response) = self
            .client
            .get(self.url(path))
            .header("x-user-id", user.to_string())
            .send()
            .await
        else {
            panic!("GET {path} failed");
        };
        response
    }

    /// Waits until `/health` reports `count` live connections.
    pub async fn wait_for_connections(&self, count: u64) {
        for _ in 0..100 {
            if let Ok(response) = self.client.get(self.url("/health")).send().await
                && let Ok(body) = response.json::<serde_json::Value>().await
                && body.get("connections").and_then(serde_json::Value::as_u64) == Some(count)
            {
                return;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        panic!("expected {count} live connections");
    }
}

pub async fn json(response: reqwest::Response) -> serde_json::Value {
    let Ok(body) = response.json::<serde_json::Value>().await else {
        panic!("response body is not JSON");
    };
    body
}

pub fn str_field<'a>(value: &'a serde_json::Value, key: &str) -> &'a str {
    let Some(s) = value.get(key).and_then(serde_json::Value::as_str) else {
        panic!("missing string field {key} in {value}");
    };
    s
}
