#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use financial_report_analyst::assistant::types::{
    FunctionCall, IncompleteDetails, LastError, MessageAttachment, RequiredAction,
    SubmitToolOutputs, ToolCall,
};
use financial_report_analyst::{
    AnalysisResponse, AnalystError, AssistantApi, AssistantSpec, PollSettings, RemoteDocument,
    Result, Run, RunStatus,
};

pub const FUNCTION_NAME: &str = "submit_financial_analysis";

/// One scripted answer to `get_run`.
#[derive(Clone)]
pub enum Step {
    Run(Run),
    TransportError(String),
}

/// In-memory stand-in for the remote service. Plays back a script of run
/// states and records every call it receives.
pub struct ScriptedAssistant {
    steps: Mutex<VecDeque<Step>>,
    replies: Mutex<VecDeque<Option<String>>>,
    calls: Mutex<Vec<String>>,
    mime_types: Mutex<Vec<String>>,
    fail_upload: bool,
    failing_files: Vec<String>,
    fail_delete: bool,
    next_id: Mutex<u32>,
}

impl ScriptedAssistant {
    pub fn new(steps: Vec<Step>) -> Self {
        Self {
            steps: Mutex::new(steps.into()),
            replies: Mutex::new(VecDeque::new()),
            calls: Mutex::new(Vec::new()),
            mime_types: Mutex::new(Vec::new()),
            fail_upload: false,
            failing_files: Vec::new(),
            fail_delete: false,
            next_id: Mutex::new(0),
        }
    }

    pub fn with_replies(self, replies: Vec<Option<&str>>) -> Self {
        *self.replies.lock().unwrap() = replies
            .into_iter()
            .map(|r| r.map(str::to_string))
            .collect();
        self
    }

    pub fn failing_upload(mut self) -> Self {
        self.fail_upload = true;
        self
    }

    /// Refuse uploads of this one file; other uploads succeed.
    pub fn failing_upload_of(mut self, filename: &str) -> Self {
        self.failing_files.push(filename.to_string());
        self
    }

    pub fn failing_delete(mut self) -> Self {
        self.fail_delete = true;
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    /// MIME types received by `upload_document`, in call order.
    pub fn uploaded_mime_types(&self) -> Vec<String> {
        self.mime_types.lock().unwrap().clone()
    }

    pub fn count(&self, prefix: &str) -> usize {
        self.calls()
            .iter()
            .filter(|call| call.starts_with(prefix))
            .count()
    }

    fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }

    fn fresh_id(&self, prefix: &str) -> String {
        let mut next = self.next_id.lock().unwrap();
        *next += 1;
        format!("{}_{}", prefix, next)
    }
}

#[async_trait]
impl AssistantApi for ScriptedAssistant {
    async fn upload_document(
        &self,
        _bytes: Vec<u8>,
        filename: &str,
        mime_type: &str,
    ) -> Result<RemoteDocument> {
        self.record(format!("upload:{}", filename));
        self.mime_types.lock().unwrap().push(mime_type.to_string());
        if self.fail_upload || self.failing_files.iter().any(|f| f == filename) {
            return Err(AnalystError::Transport("upload refused".into()));
        }
        Ok(RemoteDocument {
            id: self.fresh_id("file"),
            filename: filename.to_string(),
            mime_type: mime_type.to_string(),
        })
    }

    async fn create_thread(&self) -> Result<String> {
        self.record("create_thread".into());
        Ok(self.fresh_id("thread"))
    }

    async fn post_message(
        &self,
        thread_id: &str,
        _text: &str,
        attachments: &[MessageAttachment],
    ) -> Result<String> {
        let files: Vec<&str> = attachments.iter().map(|a| a.file_id.as_str()).collect();
        self.record(format!("post_message:{}:[{}]", thread_id, files.join(",")));
        Ok(self.fresh_id("msg"))
    }

    async fn start_run(&self, thread_id: &str, assistant_id: &str) -> Result<String> {
        self.record(format!("start_run:{}:{}", thread_id, assistant_id));
        Ok("run_1".to_string())
    }

    async fn get_run(&self, _thread_id: &str, run_id: &str) -> Result<Run> {
        self.record(format!("get_run:{}", run_id));
        let step = {
            let mut steps = self.steps.lock().unwrap();
            if steps.len() > 1 {
                steps.pop_front()
            } else {
                steps.front().cloned()
            }
        };
        match step {
            Some(Step::Run(run)) => Ok(run),
            Some(Step::TransportError(message)) => Err(AnalystError::Transport(message)),
            None => Err(AnalystError::Transport("script exhausted".into())),
        }
    }

    async fn latest_reply(&self, thread_id: &str) -> Result<Option<String>> {
        self.record(format!("latest_reply:{}", thread_id));
        Ok(self.replies.lock().unwrap().pop_front().flatten())
    }

    async fn delete_document(&self, document_id: &str) -> Result<()> {
        self.record(format!("delete_document:{}", document_id));
        if self.fail_delete {
            return Err(AnalystError::Transport("delete refused".into()));
        }
        Ok(())
    }

    async fn delete_thread(&self, thread_id: &str) -> Result<()> {
        self.record(format!("delete_thread:{}", thread_id));
        Ok(())
    }

    async fn create_assistant(&self, spec: &AssistantSpec) -> Result<String> {
        self.record(format!("create_assistant:{}", spec.name));
        Ok("asst_new".to_string())
    }
}

pub fn fast_poll() -> PollSettings {
    PollSettings {
        interval: Duration::from_millis(1),
        deadline: Duration::from_secs(5),
        max_consecutive_failures: 3,
        retry_backoff: Duration::from_millis(1),
    }
}

pub fn run_with_status(status: RunStatus) -> Run {
    Run {
        id: "run_1".into(),
        thread_id: "thread_1".into(),
        status,
        required_action: None,
        last_error: None,
        incomplete_details: None,
    }
}

pub fn status(status: RunStatus) -> Step {
    Step::Run(run_with_status(status))
}

pub fn failed_with(message: &str) -> Step {
    let mut run = run_with_status(RunStatus::Failed);
    run.last_error = Some(LastError {
        code: Some("rate_limit_exceeded".into()),
        message: message.into(),
    });
    Step::Run(run)
}

pub fn incomplete_with(reason: &str) -> Step {
    let mut run = run_with_status(RunStatus::Incomplete);
    run.incomplete_details = Some(IncompleteDetails {
        reason: Some(reason.into()),
    });
    Step::Run(run)
}

pub fn function_call(name: &str, arguments: &str) -> Step {
    let mut run = run_with_status(RunStatus::RequiresAction);
    run.required_action = Some(RequiredAction::SubmitToolOutputs {
        submit_tool_outputs: SubmitToolOutputs {
            tool_calls: vec![ToolCall {
                id: "call_1".into(),
                kind: "function".into(),
                function: FunctionCall {
                    name: name.into(),
                    arguments: arguments.into(),
                },
            }],
        },
    });
    Step::Run(run)
}

pub fn valid_arguments() -> String {
    serde_json::to_string(&AnalysisResponse::example()).unwrap()
}

pub fn arguments_missing_conclusion() -> String {
    let mut value = serde_json::to_value(AnalysisResponse::example()).unwrap();
    value.as_object_mut().unwrap().remove("conclusao");
    value.to_string()
}
