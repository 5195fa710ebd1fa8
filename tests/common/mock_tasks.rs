//! Mock task system for testing

#![allow(dead_code)]

use async_trait::async_trait;
use merge_warden::delegate::TaskSink;
use merge_warden::error::{Error, Result};
use merge_warden::types::TaskId;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

/// Call record for `create_task`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateTaskCall {
    pub repo: String,
    pub title: String,
    pub body: String,
    pub labels: Vec<String>,
}

/// Records created tasks and hands out sequential ids
pub struct MockTaskSink {
    next_id: AtomicU64,
    calls: Mutex<Vec<CreateTaskCall>>,
    error_on_create: Mutex<Option<String>>,
}

impl Default for MockTaskSink {
    fn default() -> Self {
        Self::new()
    }
}

impl MockTaskSink {
    pub fn new() -> Self {
        Self {
            next_id: AtomicU64::new(1),
            calls: Mutex::new(Vec::new()),
            error_on_create: Mutex::new(None),
        }
    }

    /// Make `create_task` fail with `msg`
    pub fn fail_create(&self, msg: &str) {
        *self.error_on_create.lock().unwrap() = Some(msg.to_string());
    }

    pub fn calls(&self) -> Vec<CreateTaskCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl TaskSink for MockTaskSink {
    async fn create_task(
        &self,
        repo_full_name: &str,
        title: &str,
        body: &str,
        labels: &[String],
    ) -> Result<TaskId> {
        self.calls.lock().unwrap().push(CreateTaskCall {
            repo: repo_full_name.to_string(),
            title: title.to_string(),
            body: body.to_string(),
            labels: labels.to_vec(),
        });

        if let Some(msg) = self.error_on_create.lock().unwrap().clone() {
            return Err(Error::Platform(msg));
        }

        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        Ok(TaskId {
            id: id.to_string(),
            url: Some(format!("https://github.com/{repo_full_name}/issues/{id}")),
        })
    }
}
