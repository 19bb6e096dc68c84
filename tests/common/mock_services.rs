//! Mock implementations used by the scheduling tests

use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use vcsbatch::application::services::{ManifestError, ManifestLoader, ManifestSource};
use vcsbatch::domain::entities::JobResult;
use vcsbatch::domain::value_objects::VcsType;
use vcsbatch::infrastructure::vcs::{
    CheckoutOptions, ClientError, CustomCommand, ExportCommand, ImportCommand, ValidateCommand,
    VcsClient,
};

/// Ordered record of job starts and ends shared between clients
#[derive(Debug, Clone, Default)]
pub struct EventLog {
    events: Arc<Mutex<Vec<String>>>,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, event: String) {
        self.events.lock().unwrap().push(event);
    }

    pub fn events(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }

    /// Position of `event` in the log
    pub fn position(&self, event: &str) -> Option<usize> {
        self.events().iter().position(|e| e == event)
    }
}

/// Client whose `custom` operation sleeps, logs and returns a fixed code
#[derive(Debug)]
pub struct ScriptedClient {
    path: PathBuf,
    log: EventLog,
    delay: Duration,
    returncode: i32,
}

impl ScriptedClient {
    pub fn new(path: impl Into<PathBuf>, log: EventLog) -> Self {
        Self {
            path: path.into(),
            log,
            delay: Duration::from_millis(0),
            returncode: 0,
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn with_returncode(mut self, returncode: i32) -> Self {
        self.returncode = returncode;
        self
    }

    fn name(&self) -> String {
        self.path.display().to_string()
    }
}

#[async_trait]
impl VcsClient for ScriptedClient {
    fn vcs_type(&self) -> VcsType {
        VcsType::Git
    }

    fn path(&self) -> &Path {
        &self.path
    }

    fn is_repository(&self) -> bool {
        true
    }

    async fn import(&self, _command: &ImportCommand) -> JobResult {
        JobResult::success(&self.path, "")
    }

    async fn validate(&self, _command: &ValidateCommand) -> JobResult {
        JobResult::success(&self.path, "")
    }

    async fn export(&self, _command: &ExportCommand) -> JobResult {
        JobResult::success(&self.path, "")
    }

    async fn custom(&self, _command: &CustomCommand) -> JobResult {
        self.log.push(format!("start {}", self.name()));
        tokio::time::sleep(self.delay).await;
        self.log.push(format!("end {}", self.name()));
        JobResult::new("custom", &self.path, self.name(), self.returncode)
    }

    async fn checkout(&self, _options: &CheckoutOptions) -> Result<bool, ClientError> {
        Ok(true)
    }

    async fn export_repository(
        &self,
        _version: Option<&str>,
        _basepath: &Path,
    ) -> Result<bool, ClientError> {
        Ok(true)
    }
}

/// Manifest loader serving documents from memory
#[derive(Debug, Clone, Default)]
pub struct InMemoryLoader {
    documents: Arc<Mutex<HashMap<String, String>>>,
    calls: Arc<Mutex<Vec<String>>>,
}

impl InMemoryLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve `content` for the source `reference` resolves to
    pub fn add(&self, reference: &str, content: &str) -> &Self {
        let identity = ManifestSource::parse(reference).identity();
        self.documents
            .lock()
            .unwrap()
            .insert(identity, content.to_string());
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl ManifestLoader for InMemoryLoader {
    async fn load(&self, source: &ManifestSource) -> Result<String, ManifestError> {
        let identity = source.identity();
        self.calls.lock().unwrap().push(identity.clone());
        self.documents
            .lock()
            .unwrap()
            .get(&identity)
            .cloned()
            .ok_or_else(|| ManifestError::load(source.to_string(), "not found"))
    }
}
