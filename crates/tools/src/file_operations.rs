//! Report writer tool - turns `create_report:<title>:<content>` into a
//! Markdown file under the reports directory.

use async_trait::async_trait;
use chrono::Local;
use delve_core::tool::Tool;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing::{info, warn};

const COMMAND_PREFIX: &str = "create_report:";
const USAGE: &str = "Use format: create_report:title:content";

/// Paths of every report written through a tool instance, shared with the
/// agent that owns it.
#[derive(Debug, Clone, Default)]
pub struct ArtifactLog {
    paths: Arc<Mutex<Vec<String>>>,
}

impl ArtifactLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, path: impl Into<String>) {
        self.paths
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(path.into());
    }

    pub fn snapshot(&self) -> Vec<String> {
        self.paths
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshot().is_empty()
    }
}

pub struct FileOperationsTool {
    reports_dir: PathBuf,
    artifacts: ArtifactLog,
}

impl FileOperationsTool {
    pub fn new(reports_dir: impl Into<PathBuf>, artifacts: ArtifactLog) -> Self {
        Self {
            reports_dir: reports_dir.into(),
            artifacts,
        }
    }

    async fn create_report(&self, title: &str, content: &str) -> String {
        let path = match write_report(&self.reports_dir, title, content).await {
            Ok(path) => path,
            Err(e) => {
                warn!(error = %e, "Report write failed");
                return format!("File operation error: {e}");
            }
        };

        if tokio::fs::try_exists(&path).await.unwrap_or(false) {
            let shown = path.display().to_string();
            info!(path = %shown, "Report created");
            self.artifacts.record(shown.clone());
            format!("SUCCESS: Report '{title}' created at {shown}")
        } else {
            format!("FAILED: Could not create report at {}", path.display())
        }
    }
}

#[async_trait]
impl Tool for FileOperationsTool {
    fn name(&self) -> &str {
        "file_operations"
    }

    fn description(&self) -> &str {
        "Create research reports. Input format: 'create_report:title:content'"
    }

    async fn invoke(&self, input: &str) -> String {
        let command = input.trim();
        if !command.starts_with(COMMAND_PREFIX) {
            return USAGE.to_string();
        }

        let mut parts = command.splitn(3, ':');
        let _ = parts.next();
        match (parts.next(), parts.next()) {
            (Some(title), Some(content)) => self.create_report(title, content).await,
            _ => USAGE.to_string(),
        }
    }
}

/// File name for a report: title with spaces (and path separators) turned
/// into underscores, then a local timestamp.
pub fn report_file_name(title: &str, now: chrono::DateTime<Local>) -> String {
    let safe_title: String = title
        .chars()
        .map(|c| if c == ' ' || c == '/' || c == '\\' { '_' } else { c })
        .collect();
    format!("{safe_title}_{}.md", now.format("%Y%m%d_%H%M%S"))
}

/// Markdown body of a report.
pub fn render_report(title: &str, content: &str, now: chrono::DateTime<Local>) -> String {
    format!(
        "# {title}\n\n**Generated:** {}\n\n## Research Findings\n\n{content}\n\n---\n*Generated by Delve Research Agent*\n",
        now.format("%Y-%m-%d %H:%M:%S")
    )
}

/// Write a report into `dir`, creating the directory when needed.
pub async fn write_report(dir: &Path, title: &str, content: &str) -> std::io::Result<PathBuf> {
    tokio::fs::create_dir_all(dir).await?;
    let now = Local::now();
    let path = dir.join(report_file_name(title, now));
    tokio::fs::write(&path, render_report(title, content, now)).await?;
    Ok(path)
}
