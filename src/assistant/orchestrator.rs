use std::sync::Arc;

use log::{debug, info, warn};
use tokio::sync::mpsc::Sender;
use tokio::time::{sleep, timeout};

use crate::assistant::client::AssistantApi;
use crate::assistant::prompts;
use crate::assistant::types::*;
use crate::config::PollSettings;
use crate::error::{AnalystError, Result};
use crate::schema::AnalysisResponse;
use crate::validation::validate;

pub const MISSING_OUTPUT_DETAIL: &str = "completed without required output";

/// How the configured assistant delivers its answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputContract {
    /// The answer is the arguments of exactly one call to the named function.
    /// A run that completes without that call has broken the contract.
    StructuredFunction { name: String },
    /// The answer is the assistant's latest chat message once the run completes.
    PlainText,
}

impl Default for OutputContract {
    fn default() -> Self {
        Self::StructuredFunction {
            name: prompts::ANALYSIS_FUNCTION_NAME.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum RunOutput {
    Analysis(Box<AnalysisResponse>),
    Text(String),
}

/// Drives one run on a thread from creation to a terminal state and extracts its answer.
pub struct RunOrchestrator {
    api: Arc<dyn AssistantApi>,
    assistant_id: String,
    contract: OutputContract,
    poll: PollSettings,
}

impl RunOrchestrator {
    pub fn new(api: Arc<dyn AssistantApi>, assistant_id: impl Into<String>) -> Self {
        Self {
            api,
            assistant_id: assistant_id.into(),
            contract: OutputContract::default(),
            poll: PollSettings::default(),
        }
    }

    pub fn with_contract(mut self, contract: OutputContract) -> Self {
        self.contract = contract;
        self
    }

    pub fn with_poll_settings(mut self, poll: PollSettings) -> Self {
        self.poll = poll;
        self
    }

    pub fn api(&self) -> &Arc<dyn AssistantApi> {
        &self.api
    }

    pub fn contract(&self) -> &OutputContract {
        &self.contract
    }

    /// Upload a document, ask the assistant to analyse it and return the validated report.
    ///
    /// The uploaded document is deleted before this returns, whatever the outcome.
    /// If the returned future is dropped early, deletion is scheduled on the runtime instead.
    pub async fn analyze_document(
        &self,
        bytes: Vec<u8>,
        filename: &str,
        mime_type: &str,
        progress: Option<Sender<AnalysisEvent>>,
    ) -> Result<AnalysisResponse> {
        if self.contract == OutputContract::PlainText {
            return Err(AnalystError::Config(
                "Document analysis requires a structured-output assistant".to_string(),
            ));
        }

        send_event(
            &progress,
            AnalysisEvent::Uploading {
                filename: filename.to_string(),
            },
        )
        .await;
        info!("Uploading file: {} ({} bytes)", filename, bytes.len());
        let document = self.api.upload_document(bytes, filename, mime_type).await?;
        info!("File uploaded successfully. File ID: {}", document.id);
        send_event(
            &progress,
            AnalysisEvent::Uploaded {
                document_id: document.id.clone(),
            },
        )
        .await;

        let guard = DocumentGuard::new(Arc::clone(&self.api), document.id.clone());
        let outcome = self.analyze_uploaded(&document, &progress).await;
        guard.release().await;

        match &outcome {
            Ok(_) => send_event(&progress, AnalysisEvent::Success).await,
            Err(e) => {
                warn!("An error occurred during analysis: {}", e);
                send_event(
                    &progress,
                    AnalysisEvent::Failed {
                        reason: e.to_string(),
                    },
                )
                .await
            }
        }

        outcome
    }

    async fn analyze_uploaded(
        &self,
        document: &RemoteDocument,
        progress: &Option<Sender<AnalysisEvent>>,
    ) -> Result<AnalysisResponse> {
        let thread_id = self.api.create_thread().await?;
        info!("Thread created successfully. Thread ID: {}", thread_id);
        send_event(
            progress,
            AnalysisEvent::ThreadCreated {
                thread_id: thread_id.clone(),
            },
        )
        .await;

        let attachments = [MessageAttachment::searchable(document.id.clone())];
        let message_id = self
            .api
            .post_message(
                &thread_id,
                &prompts::analysis_request(&document.filename),
                &attachments,
            )
            .await?;
        debug!("Message {} posted to thread {}", message_id, thread_id);

        match self.execute_run(&thread_id, progress).await? {
            RunOutput::Analysis(report) => Ok(*report),
            RunOutput::Text(_) => Err(AnalystError::UnexpectedAction(
                "Assistant replied with text instead of calling the analysis function".to_string(),
            )),
        }
    }

    /// Start a run on an existing thread, poll it to a settled state and extract
    /// the answer according to the configured contract.
    pub async fn execute_run(
        &self,
        thread_id: &str,
        progress: &Option<Sender<AnalysisEvent>>,
    ) -> Result<RunOutput> {
        info!(
            "Creating run for assistant {} on thread {}",
            self.assistant_id, thread_id
        );
        let run_id = self.api.start_run(thread_id, &self.assistant_id).await?;
        info!("Run created successfully. Run ID: {}", run_id);
        send_event(
            progress,
            AnalysisEvent::RunStarted {
                run_id: run_id.clone(),
            },
        )
        .await;

        let run = match timeout(
            self.poll.deadline,
            self.poll_until_settled(thread_id, &run_id, progress),
        )
        .await
        {
            Ok(run) => run?,
            Err(_) => {
                warn!(
                    "Run {} did not settle within {:?}; giving up",
                    run_id, self.poll.deadline
                );
                return Err(AnalystError::Timeout(self.poll.deadline));
            }
        };

        info!("Run {} settled with status {}", run.id, run.status);
        self.extract(thread_id, run, progress).await
    }

    async fn poll_until_settled(
        &self,
        thread_id: &str,
        run_id: &str,
        progress: &Option<Sender<AnalysisEvent>>,
    ) -> Result<Run> {
        let mut failures: u32 = 0;

        loop {
            let run = match self.api.get_run(thread_id, run_id).await {
                Ok(run) => {
                    failures = 0;
                    run
                }
                Err(err) => {
                    failures += 1;
                    if failures > self.poll.max_consecutive_failures {
                        warn!(
                            "Giving up on run {} after {} failed status reads",
                            run_id, failures
                        );
                        return Err(err);
                    }
                    let backoff = self
                        .poll
                        .retry_backoff
                        .saturating_mul(1u32 << (failures - 1).min(16));
                    warn!(
                        "Error checking run status (attempt {}): {}; retrying in {:?}",
                        failures, err, backoff
                    );
                    send_event(
                        progress,
                        AnalysisEvent::PollRetry {
                            attempt: failures,
                            error: err.to_string(),
                        },
                    )
                    .await;
                    sleep(backoff).await;
                    continue;
                }
            };

            debug!("Run status: {}", run.status);
            send_event(progress, AnalysisEvent::StatusObserved { status: run.status }).await;

            if run.status.is_pending() {
                sleep(self.poll.interval).await;
                continue;
            }
            return Ok(run);
        }
    }

    async fn extract(
        &self,
        thread_id: &str,
        run: Run,
        progress: &Option<Sender<AnalysisEvent>>,
    ) -> Result<RunOutput> {
        if run.status.is_terminal_failure() {
            let detail = match (run.error_detail(), run.status) {
                (Some(message), _) => message.to_string(),
                (None, RunStatus::Unknown) => "unexpected run status".to_string(),
                (None, _) => "no error details reported".to_string(),
            };
            warn!("Run ended with status: {}. Error: {}", run.status, detail);
            return Err(AnalystError::RunFailed {
                status: run.status,
                detail,
            });
        }

        match (&self.contract, run.status) {
            (OutputContract::StructuredFunction { name }, RunStatus::RequiresAction) => {
                info!("Run requires action: function call detected.");
                send_event(progress, AnalysisEvent::Extracting).await;
                let report = extract_function_output(&run, name)?;
                info!("Function arguments successfully parsed and validated.");
                Ok(RunOutput::Analysis(Box::new(report)))
            }
            (OutputContract::StructuredFunction { name }, RunStatus::Completed) => {
                warn!("Run completed, but expected a call to {}", name);
                Err(AnalystError::RunFailed {
                    status: RunStatus::Completed,
                    detail: MISSING_OUTPUT_DETAIL.to_string(),
                })
            }
            (OutputContract::PlainText, RunStatus::Completed) => {
                send_event(progress, AnalysisEvent::Extracting).await;
                match self.api.latest_reply(thread_id).await? {
                    Some(text) => Ok(RunOutput::Text(text)),
                    None => Err(AnalystError::RunFailed {
                        status: RunStatus::Completed,
                        detail: "completed without an assistant reply".to_string(),
                    }),
                }
            }
            (OutputContract::PlainText, RunStatus::RequiresAction) => {
                Err(AnalystError::UnexpectedAction(
                    "Plain-text assistant requested a tool call".to_string(),
                ))
            }
            (_, status) => Err(AnalystError::RunFailed {
                status,
                detail: "unexpected run status".to_string(),
            }),
        }
    }
}

/// Pull the expected function call out of a `requires_action` run and validate its arguments.
pub fn extract_function_output(run: &Run, expected_function: &str) -> Result<AnalysisResponse> {
    let tool_calls = match &run.required_action {
        Some(RequiredAction::SubmitToolOutputs {
            submit_tool_outputs,
        }) => &submit_tool_outputs.tool_calls,
        Some(RequiredAction::Unsupported) => {
            return Err(AnalystError::UnexpectedAction(
                "Unhandled required action type".to_string(),
            ))
        }
        None => {
            return Err(AnalystError::UnexpectedAction(
                "Run requires action but no action was supplied".to_string(),
            ))
        }
    };

    let call = tool_calls
        .iter()
        .find(|call| call.kind == "function" && call.function.name == expected_function)
        .ok_or_else(|| {
            let seen = tool_calls
                .iter()
                .map(|call| call.function.name.as_str())
                .collect::<Vec<_>>()
                .join(", ");
            AnalystError::UnexpectedAction(format!(
                "Assistant did not call the expected function '{}' (tool calls: [{}])",
                expected_function, seen
            ))
        })?;

    debug!("Raw arguments: {}", call.function.arguments);
    let arguments: serde_json::Value = serde_json::from_str(&call.function.arguments)
        .map_err(|e| AnalystError::MalformedOutput(e.to_string()))?;

    validate(&arguments).map_err(|e| AnalystError::InvalidOutput(e.violations))
}

/// Deletes an uploaded document exactly once: explicitly via `release`, or from
/// `Drop` when the owning future is abandoned.
struct DocumentGuard {
    api: Arc<dyn AssistantApi>,
    document_id: Option<String>,
}

impl DocumentGuard {
    fn new(api: Arc<dyn AssistantApi>, document_id: String) -> Self {
        Self {
            api,
            document_id: Some(document_id),
        }
    }

    async fn release(mut self) {
        if let Some(id) = self.document_id.take() {
            delete_document_best_effort(self.api.as_ref(), &id).await;
        }
    }
}

impl Drop for DocumentGuard {
    fn drop(&mut self) {
        let Some(id) = self.document_id.take() else {
            return;
        };
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                warn!("Analysis abandoned; scheduling deletion of file {}", id);
                let api = Arc::clone(&self.api);
                handle.spawn(async move {
                    delete_document_best_effort(api.as_ref(), &id).await;
                });
            }
            Err(_) => warn!("No runtime available to delete uploaded file {}", id),
        }
    }
}

pub(crate) async fn delete_document_best_effort(api: &dyn AssistantApi, document_id: &str) {
    info!("Deleting uploaded file: {}...", document_id);
    match api.delete_document(document_id).await {
        Ok(()) => info!("File {} deleted successfully.", document_id),
        Err(e) => warn!("Failed to delete file {}: {}", document_id, e),
    }
}

pub(crate) async fn send_event(sender: &Option<Sender<AnalysisEvent>>, event: AnalysisEvent) {
    if let Some(tx) = sender {
        let _ = tx.send(event).await;
    }
}
