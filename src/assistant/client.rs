use async_trait::async_trait;
use log::debug;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, RequestBuilder, Response};
use serde_json::json;

use crate::assistant::types::*;
use crate::error::{AnalystError, Result};

pub const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
const ASSISTANTS_BETA_HEADER: (&str, &str) = ("OpenAI-Beta", "assistants=v2");

/// The remote primitives the orchestrator needs. Implementations do no retrying
/// or polling of their own.
#[async_trait]
pub trait AssistantApi: Send + Sync {
    async fn upload_document(
        &self,
        bytes: Vec<u8>,
        filename: &str,
        mime_type: &str,
    ) -> Result<RemoteDocument>;

    async fn create_thread(&self) -> Result<String>;

    async fn post_message(
        &self,
        thread_id: &str,
        text: &str,
        attachments: &[MessageAttachment],
    ) -> Result<String>;

    async fn start_run(&self, thread_id: &str, assistant_id: &str) -> Result<String>;

    async fn get_run(&self, thread_id: &str, run_id: &str) -> Result<Run>;

    /// Text of the newest assistant message on the thread, if the newest message is one.
    async fn latest_reply(&self, thread_id: &str) -> Result<Option<String>>;

    async fn delete_document(&self, document_id: &str) -> Result<()>;

    async fn delete_thread(&self, thread_id: &str) -> Result<()>;

    async fn create_assistant(&self, spec: &AssistantSpec) -> Result<String>;
}

#[derive(Clone)]
pub struct OpenAiClient {
    client: Client,
    api_key: String,
    base_url: String,
}

impl OpenAiClient {
    pub fn new(api_key: String) -> Self {
        Self {
            client: Client::new(),
            api_key,
            base_url: OPENAI_BASE_URL.to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    fn request(&self, builder: RequestBuilder) -> RequestBuilder {
        builder
            .bearer_auth(&self.api_key)
            .header(ASSISTANTS_BETA_HEADER.0, ASSISTANTS_BETA_HEADER.1)
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    async fn send(&self, builder: RequestBuilder, context: &str) -> Result<Response> {
        let res = self.request(builder).send().await?;
        let status = res.status();
        if !status.is_success() {
            let error_text = res.text().await?;
            return Err(AnalystError::Transport(format!(
                "{} failed (status {}): {}",
                context, status, error_text
            )));
        }
        Ok(res)
    }
}

#[async_trait]
impl AssistantApi for OpenAiClient {
    async fn upload_document(
        &self,
        bytes: Vec<u8>,
        filename: &str,
        mime_type: &str,
    ) -> Result<RemoteDocument> {
        let part = Part::bytes(bytes)
            .file_name(filename.to_string())
            .mime_str(mime_type)?;
        let form = Form::new().text("purpose", "assistants").part("file", part);

        let res = self
            .send(
                self.client.post(self.url("files")).multipart(form),
                "File upload",
            )
            .await?;
        let body: IdObject = res.json().await?;
        debug!("Uploaded {} as {}", filename, body.id);

        Ok(RemoteDocument {
            id: body.id,
            filename: filename.to_string(),
            mime_type: mime_type.to_string(),
        })
    }

    async fn create_thread(&self) -> Result<String> {
        let res = self
            .send(
                self.client.post(self.url("threads")).json(&json!({})),
                "Thread creation",
            )
            .await?;
        let body: IdObject = res.json().await?;
        Ok(body.id)
    }

    async fn post_message(
        &self,
        thread_id: &str,
        text: &str,
        attachments: &[MessageAttachment],
    ) -> Result<String> {
        let payload = CreateMessageRequest {
            role: "user",
            content: text,
            attachments,
        };
        let res = self
            .send(
                self.client
                    .post(self.url(&format!("threads/{}/messages", thread_id)))
                    .json(&payload),
                "Message creation",
            )
            .await?;
        let body: IdObject = res.json().await?;
        Ok(body.id)
    }

    async fn start_run(&self, thread_id: &str, assistant_id: &str) -> Result<String> {
        let res = self
            .send(
                self.client
                    .post(self.url(&format!("threads/{}/runs", thread_id)))
                    .json(&CreateRunRequest { assistant_id }),
                "Run creation",
            )
            .await?;
        let body: IdObject = res.json().await?;
        Ok(body.id)
    }

    async fn get_run(&self, thread_id: &str, run_id: &str) -> Result<Run> {
        let res = self
            .send(
                self.client
                    .get(self.url(&format!("threads/{}/runs/{}", thread_id, run_id))),
                "Run retrieval",
            )
            .await?;
        Ok(res.json().await?)
    }

    async fn latest_reply(&self, thread_id: &str) -> Result<Option<String>> {
        let res = self
            .send(
                self.client
                    .get(self.url(&format!("threads/{}/messages", thread_id)))
                    .query(&[("order", "desc"), ("limit", "1")]),
                "Message listing",
            )
            .await?;
        let list: MessageList = res.json().await?;

        Ok(list
            .data
            .first()
            .filter(|message| message.role == "assistant")
            .map(ThreadMessage::text))
    }

    async fn delete_document(&self, document_id: &str) -> Result<()> {
        let res = self
            .send(
                self.client.delete(self.url(&format!("files/{}", document_id))),
                "File deletion",
            )
            .await?;
        let status: DeletionStatus = res.json().await?;
        if !status.deleted {
            return Err(AnalystError::Transport(format!(
                "File {} was not deleted",
                document_id
            )));
        }
        Ok(())
    }

    async fn delete_thread(&self, thread_id: &str) -> Result<()> {
        self.send(
            self.client.delete(self.url(&format!("threads/{}", thread_id))),
            "Thread deletion",
        )
        .await?;
        Ok(())
    }

    async fn create_assistant(&self, spec: &AssistantSpec) -> Result<String> {
        let mut tools = Vec::new();
        if let Some(function) = &spec.function {
            tools.push(json!({ "type": "function", "function": function }));
        }
        if spec.file_search {
            tools.push(json!({ "type": "file_search" }));
        }

        let payload = json!({
            "name": spec.name,
            "model": spec.model,
            "instructions": spec.instructions,
            "tools": tools,
        });

        let res = self
            .send(
                self.client.post(self.url("assistants")).json(&payload),
                "Assistant creation",
            )
            .await?;
        let body: IdObject = res.json().await?;
        Ok(body.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_url_is_normalised() {
        let client = OpenAiClient::new("sk-test".into()).with_base_url("http://localhost:8080/v1/");
        assert_eq!(client.url("files"), "http://localhost:8080/v1/files");
    }

    #[test]
    fn test_message_payload_shape() {
        let attachments = vec![MessageAttachment::searchable("file_9")];
        let payload = CreateMessageRequest {
            role: "user",
            content: "Analyze",
            attachments: &attachments,
        };
        let value = serde_json::to_value(&payload).unwrap();
        assert_eq!(value["role"], "user");
        assert_eq!(value["attachments"][0]["file_id"], "file_9");

        let bare = CreateMessageRequest {
            role: "user",
            content: "Hello",
            attachments: &[],
        };
        let value = serde_json::to_value(&bare).unwrap();
        assert!(value.get("attachments").is_none());
    }
}
