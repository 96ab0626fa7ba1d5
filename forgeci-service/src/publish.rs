// Artifact Publication
// Streams finished cell archives to the artifact store

use std::path::PathBuf;
use std::sync::Arc;

use serde::Serialize;

use crate::execution::events::{EventSender, ExecutionEvent, ProgressSender};
use crate::runners::ArtifactStore;

/// Archives a finished cell left behind in its dist directory
#[derive(Debug, Clone, Default, Serialize)]
pub struct PublishPaths {
    /// Install bundle; absent unless the install step succeeded
    pub install_archive: Option<PathBuf>,
    /// Reports bundle; present for every cell that reached archiving
    pub report_archive: Option<PathBuf>,
}

/// What one publication pass managed to upload
#[derive(Debug, Clone, Default, Serialize)]
pub struct PublishResult {
    pub uploaded: Vec<String>,
    pub failed: Vec<String>,
}

impl PublishResult {
    pub fn all_uploaded(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Publishes a cell's archives as soon as that cell finishes.
///
/// Publication is best-effort: a store failure is recorded and reported, and
/// never changes the cell verdict.
pub struct ArtifactPublisher {
    store: Arc<dyn ArtifactStore>,
    retention_days: u32,
    events: Option<ProgressSender>,
}

impl ArtifactPublisher {
    pub fn new(store: Arc<dyn ArtifactStore>, retention_days: u32) -> Self {
        Self {
            store,
            retention_days,
            events: None,
        }
    }

    pub fn with_events(mut self, events: ProgressSender) -> Self {
        self.events = Some(events);
        self
    }

    /// Upload whichever archives the cell produced. Archive names extend the
    /// cell's artifact name, so they inherit its uniqueness across the matrix.
    pub async fn publish(&self, artifact_name: &str, paths: &PublishPaths) -> PublishResult {
        let mut result = PublishResult::default();

        let targets = [
            (&paths.install_archive, format!("{}-install.tar.gz", artifact_name)),
            (&paths.report_archive, format!("{}-reports.tar.gz", artifact_name)),
        ];

        for (path, name) in targets {
            let Some(path) = path else { continue };

            match self.store.upload(&name, path, self.retention_days).await {
                Ok(()) => {
                    self.events.send_event(ExecutionEvent::ArtifactPublished {
                        cell: artifact_name.to_string(),
                        name: name.clone(),
                    });
                    result.uploaded.push(name);
                }
                Err(e) => {
                    self.events.send_event(ExecutionEvent::warning(
                        format!("failed to publish {}: {}", name, e),
                        Some(artifact_name.to_string()),
                    ));
                    result.failed.push(name);
                }
            }
        }

        result
    }
}
