use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::json;
use thiserror::Error;

use crate::session::{
    ConversationHandle, Dialog, HistoryPage, SenderInfo, SenderRef, Session,
};

const HISTORY_PAGE_LIMIT: i64 = 100;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("unexpected status: {0}")]
    Status(u16),
    #[error("not authenticated")]
    Auth,
    #[error("api error: {error} ({description})")]
    Api { error: String, description: String },
}

#[derive(Clone)]
pub struct ApiClient {
    base_url: String,
    http: Client,
    token: Option<String>,
}

impl ApiClient {
    pub fn new(base_url: String) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            http: Client::new(),
            token: None,
        }
    }

    pub fn with_token(mut self, token: String) -> Self {
        self.token = Some(token);
        self
    }

    pub async fn send_sms_code(&self, phone_number: &str) -> Result<SendCodeResult, ApiError> {
        let url = format!("{}/sendSmsCode", self.base_url);
        let mut payload = serde_json::Map::new();
        payload.insert("phoneNumber".to_string(), json!(phone_number));
        self.post(url, payload).await
    }

    pub async fn verify_sms_code(
        &self,
        phone_number: &str,
        code: &str,
        client_version: &str,
    ) -> Result<VerifyCodeResult, ApiError> {
        let url = format!("{}/verifySmsCode", self.base_url);
        let mut payload = serde_json::Map::new();
        payload.insert("phoneNumber".to_string(), json!(phone_number));
        payload.insert("code".to_string(), json!(code));
        payload.insert("clientVersion".to_string(), json!(client_version));
        self.post(url, payload).await
    }

    pub async fn get_me(&self) -> Result<GetMeResult, ApiError> {
        let url = format!("{}/getMe", self.base_url);
        self.post_with_token(url, serde_json::Map::new()).await
    }

    async fn get_dialogs_page(&self, cursor: Option<i64>) -> Result<DialogsPage, ApiError> {
        let url = format!("{}/getDialogs", self.base_url);
        let mut payload = serde_json::Map::new();
        if let Some(cursor) = cursor {
            payload.insert("cursor".to_string(), json!(cursor));
        }
        self.post_with_token(url, payload).await
    }

    async fn resolve_peer(&self, name: &str) -> Result<Option<Dialog>, ApiError> {
        let url = format!("{}/resolvePeer", self.base_url);
        let mut payload = serde_json::Map::new();
        payload.insert("name".to_string(), json!(name));
        let result: Result<ResolvePeerResult, ApiError> =
            self.post_with_token(url, payload).await;
        match result {
            Ok(result) => Ok(Some(result.dialog)),
            Err(ApiError::Api { error, .. }) if error == "PEER_NOT_FOUND" => Ok(None),
            Err(err) => Err(err),
        }
    }

    async fn get_history(
        &self,
        handle: &ConversationHandle,
        cursor: Option<i64>,
        min_date: i64,
    ) -> Result<HistoryPage, ApiError> {
        let url = format!("{}/getHistory", self.base_url);
        let mut payload = serde_json::Map::new();
        payload.insert("peerId".to_string(), json!(handle.id));
        payload.insert("accessHash".to_string(), json!(handle.access_hash));
        payload.insert("minDate".to_string(), json!(min_date));
        payload.insert("limit".to_string(), json!(HISTORY_PAGE_LIMIT));
        if let Some(cursor) = cursor {
            payload.insert("cursor".to_string(), json!(cursor));
        }
        self.post_with_token(url, payload).await
    }

    async fn get_sender(&self, sender: SenderRef) -> Result<Option<SenderInfo>, ApiError> {
        let url = format!("{}/getSender", self.base_url);
        let mut payload = serde_json::Map::new();
        match sender {
            SenderRef::User(id) => {
                payload.insert("kind".to_string(), json!("user"));
                payload.insert("id".to_string(), json!(id));
            }
            SenderRef::Chat(id) => {
                payload.insert("kind".to_string(), json!("chat"));
                payload.insert("id".to_string(), json!(id));
            }
        }
        let result: GetSenderResult = self.post_with_token(url, payload).await?;
        Ok(result.sender)
    }

    async fn post<T: for<'de> Deserialize<'de>>(
        &self,
        url: String,
        payload: serde_json::Map<String, serde_json::Value>,
    ) -> Result<T, ApiError> {
        let response = self.http.post(url).json(&payload).send().await?;
        Self::decode(response).await
    }

    async fn post_with_token<T: for<'de> Deserialize<'de>>(
        &self,
        url: String,
        payload: serde_json::Map<String, serde_json::Value>,
    ) -> Result<T, ApiError> {
        let token = self.token.as_deref().ok_or(ApiError::Auth)?;
        let response = self
            .http
            .post(url)
            .bearer_auth(token)
            .json(&payload)
            .send()
            .await?;
        Self::decode(response).await
    }

    async fn decode<T: for<'de> Deserialize<'de>>(
        response: reqwest::Response,
    ) -> Result<T, ApiError> {
        let status = response.status();
        if status.as_u16() == 401 {
            return Err(ApiError::Auth);
        }
        if !status.is_success() {
            return Err(ApiError::Status(status.as_u16()));
        }
        let api_response: ApiResponse<T> = response.json().await?;
        match api_response {
            ApiResponse::Ok { result, .. } => Ok(result),
            ApiResponse::Err { error, description, .. } => {
                if error == "UNAUTHENTICATED" {
                    return Err(ApiError::Auth);
                }
                Err(ApiError::Api {
                    error,
                    description: description.unwrap_or_else(|| "Unknown error".to_string()),
                })
            }
        }
    }
}

#[async_trait]
impl Session for ApiClient {
    async fn dialogs(&self) -> Result<Vec<Dialog>, ApiError> {
        let mut dialogs = Vec::new();
        let mut cursor = None;
        loop {
            let page = self.get_dialogs_page(cursor).await?;
            dialogs.extend(page.dialogs);
            match page.next_cursor {
                Some(next) => cursor = Some(next),
                None => return Ok(dialogs),
            }
        }
    }

    async fn resolve_name(&self, name: &str) -> Result<Option<Dialog>, ApiError> {
        self.resolve_peer(name).await
    }

    async fn history_page(
        &self,
        handle: &ConversationHandle,
        cursor: Option<i64>,
        min_date: i64,
    ) -> Result<HistoryPage, ApiError> {
        self.get_history(handle, cursor, min_date).await
    }

    async fn resolve_sender(&self, sender: SenderRef) -> Result<Option<SenderInfo>, ApiError> {
        self.get_sender(sender).await
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendCodeResult {
    pub existing_user: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyCodeResult {
    pub user_id: i64,
    pub token: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CurrentUser {
    pub id: i64,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub phone_number: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetMeResult {
    pub user: CurrentUser,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DialogsPage {
    dialogs: Vec<Dialog>,
    #[serde(default)]
    next_cursor: Option<i64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ResolvePeerResult {
    dialog: Dialog,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GetSenderResult {
    #[serde(default)]
    sender: Option<SenderInfo>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged, rename_all = "camelCase")]
enum ApiResponse<T> {
    Ok { ok: bool, result: T },
    Err {
        ok: bool,
        error: String,
        error_code: Option<i32>,
        description: Option<String>,
    },
}
