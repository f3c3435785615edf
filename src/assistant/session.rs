use std::path::Path;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures::future;
use log::{info, warn};
use serde::{Deserialize, Serialize};
use tokio::fs;

use crate::assistant::client::AssistantApi;
use crate::assistant::orchestrator::{
    delete_document_best_effort, OutputContract, RunOrchestrator, RunOutput,
};
use crate::assistant::types::{MessageAttachment, RemoteDocument};
use crate::config::PollSettings;
use crate::error::{AnalystError, Result};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Assistant,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatTurn {
    pub role: ChatRole,
    pub content: String,
    pub at: DateTime<Utc>,
}

/// A conversation about a growing set of documents.
///
/// One remote thread backs the whole session and is created on the first
/// question. Every message carries all documents uploaded so far, and the
/// assistant answers in plain text.
pub struct ChatSession {
    orchestrator: RunOrchestrator,
    thread_id: Option<String>,
    documents: Vec<RemoteDocument>,
    transcript: Vec<ChatTurn>,
}

impl ChatSession {
    pub fn new(api: Arc<dyn AssistantApi>, assistant_id: impl Into<String>) -> Self {
        Self {
            orchestrator: RunOrchestrator::new(api, assistant_id)
                .with_contract(OutputContract::PlainText),
            thread_id: None,
            documents: Vec::new(),
            transcript: Vec::new(),
        }
    }

    pub fn with_poll_settings(mut self, poll: PollSettings) -> Self {
        self.orchestrator = self.orchestrator.with_poll_settings(poll);
        self
    }

    pub fn thread_id(&self) -> Option<&str> {
        self.thread_id.as_deref()
    }

    pub fn documents(&self) -> &[RemoteDocument] {
        &self.documents
    }

    pub fn transcript(&self) -> &[ChatTurn] {
        &self.transcript
    }

    fn has_document(&self, filename: &str) -> bool {
        self.documents.iter().any(|doc| doc.filename == filename)
    }

    /// Upload a document into the session. Returns `false` when a document with the
    /// same filename is already attached.
    pub async fn add_document(
        &mut self,
        bytes: Vec<u8>,
        filename: &str,
        mime_type: &str,
    ) -> Result<bool> {
        if self.has_document(filename) {
            info!("Skipping duplicate document {}", filename);
            return Ok(false);
        }
        let document = self
            .orchestrator
            .api()
            .upload_document(bytes, filename, mime_type)
            .await?;
        info!("Uploaded {} (id: {})", document.filename, document.id);
        self.documents.push(document);
        Ok(true)
    }

    /// Read and upload several files concurrently. Files whose names are already
    /// attached are skipped. Returns the names that were uploaded.
    ///
    /// If any upload fails, the ones that succeeded stay attached to the session
    /// (so `close` still deletes them) and the first error is returned.
    pub async fn add_document_paths<P: AsRef<Path>>(&mut self, paths: &[P]) -> Result<Vec<String>> {
        let mut pending = Vec::new();
        for path in paths {
            let path = path.as_ref();
            let filename = path
                .file_name()
                .and_then(|n| n.to_str())
                .ok_or_else(|| AnalystError::Config(format!("Invalid file name: {:?}", path)))?
                .to_string();
            if self.has_document(&filename) || pending.iter().any(|(name, _, _)| name == &filename)
            {
                continue;
            }
            let mime_type = mime_guess::from_path(path)
                .first_or_octet_stream()
                .to_string();
            let bytes = fs::read(path).await?;
            pending.push((filename, mime_type, bytes));
        }

        let api = Arc::clone(self.orchestrator.api());
        let uploads = pending.into_iter().map(|(filename, mime_type, bytes)| {
            let api = Arc::clone(&api);
            async move { api.upload_document(bytes, &filename, &mime_type).await }
        });
        let mut names = Vec::new();
        let mut first_error = None;
        for outcome in future::join_all(uploads).await {
            match outcome {
                Ok(document) => {
                    info!("Uploaded {} (id: {})", document.filename, document.id);
                    names.push(document.filename.clone());
                    self.documents.push(document);
                }
                Err(e) => {
                    warn!("Document upload failed: {}", e);
                    first_error.get_or_insert(e);
                }
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(names),
        }
    }

    /// Ask a question about the attached documents and wait for the assistant's reply.
    pub async fn ask(&mut self, prompt: &str) -> Result<String> {
        self.transcript.push(ChatTurn {
            role: ChatRole::User,
            content: prompt.to_string(),
            at: Utc::now(),
        });

        let api = Arc::clone(self.orchestrator.api());
        let thread_id = match &self.thread_id {
            Some(id) => id.clone(),
            None => {
                let id = api.create_thread().await?;
                info!("Thread created successfully. Thread ID: {}", id);
                self.thread_id = Some(id.clone());
                id
            }
        };

        let attachments: Vec<MessageAttachment> = self
            .documents
            .iter()
            .map(|doc| MessageAttachment::searchable(doc.id.clone()))
            .collect();
        api.post_message(&thread_id, prompt, &attachments).await?;

        let reply = match self.orchestrator.execute_run(&thread_id, &None).await? {
            RunOutput::Text(text) => text,
            RunOutput::Analysis(_) => {
                return Err(AnalystError::UnexpectedAction(
                    "Chat assistant returned a structured analysis".to_string(),
                ))
            }
        };

        self.transcript.push(ChatTurn {
            role: ChatRole::Assistant,
            content: reply.clone(),
            at: Utc::now(),
        });
        Ok(reply)
    }

    /// Release every remote resource the session created. Failures are logged only.
    pub async fn close(self) {
        let api = Arc::clone(self.orchestrator.api());
        for document in &self.documents {
            delete_document_best_effort(api.as_ref(), &document.id).await;
        }
        if let Some(thread_id) = &self.thread_id {
            if let Err(e) = api.delete_thread(thread_id).await {
                warn!("Failed to delete thread {}: {}", thread_id, e);
            }
        }
    }
}
