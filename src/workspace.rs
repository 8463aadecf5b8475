//! Per-identity workspace directories and their fixed artifact paths.
//!
//! Layout on disk:
//!
//! ```text
//! <upload_root>/<identity>/
//!     primer3-template.txt
//!     primer3-output.txt
//!     primersearch-template.txt
//!     primersearch-output.txt
//! ```
//!
//! This layout is the persisted cache. Filenames must not change or
//! existing workspaces stop being reused.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

pub const DESIGN_TEMPLATE_FILE: &str = "primer3-template.txt";
pub const DESIGN_OUTPUT_FILE: &str = "primer3-output.txt";
pub const SEARCH_TEMPLATE_FILE: &str = "primersearch-template.txt";
pub const SEARCH_OUTPUT_FILE: &str = "primersearch-output.txt";

/// A pipeline stage, each backed by one external tool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    /// Primer design with primer3.
    Design,
    /// Specificity search with EMBOSS primersearch.
    Search,
}

impl Stage {
    pub fn tool_name(&self) -> &'static str {
        match self {
            Stage::Design => "primer3",
            Stage::Search => "primersearch",
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.tool_name())
    }
}

/// Which artifact of a stage: the rendered configuration or the tool result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ArtifactRole {
    Template,
    Output,
}

impl std::fmt::Display for ArtifactRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ArtifactRole::Template => write!(f, "template"),
            ArtifactRole::Output => write!(f, "output"),
        }
    }
}

/// The directory of one identity and the four artifact paths inside it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WorkspacePaths {
    pub directory: PathBuf,
    pub design_template: PathBuf,
    pub design_output: PathBuf,
    pub search_template: PathBuf,
    pub search_output: PathBuf,
}

impl WorkspacePaths {
    /// Derive the paths for `identity` under `root` without touching the disk.
    pub fn for_identity(root: &Path, identity: &str) -> Self {
        let directory = root.join(identity);
        Self {
            design_template: directory.join(DESIGN_TEMPLATE_FILE),
            design_output: directory.join(DESIGN_OUTPUT_FILE),
            search_template: directory.join(SEARCH_TEMPLATE_FILE),
            search_output: directory.join(SEARCH_OUTPUT_FILE),
            directory,
        }
    }

    pub fn artifact(&self, stage: Stage, role: ArtifactRole) -> &Path {
        match (stage, role) {
            (Stage::Design, ArtifactRole::Template) => &self.design_template,
            (Stage::Design, ArtifactRole::Output) => &self.design_output,
            (Stage::Search, ArtifactRole::Template) => &self.search_template,
            (Stage::Search, ArtifactRole::Output) => &self.search_output,
        }
    }

    /// All artifacts in pipeline order.
    pub fn artifacts(&self) -> [(Stage, ArtifactRole, &Path); 4] {
        [
            (Stage::Design, ArtifactRole::Template, &self.design_template),
            (Stage::Design, ArtifactRole::Output, &self.design_output),
            (Stage::Search, ArtifactRole::Template, &self.search_template),
            (Stage::Search, ArtifactRole::Output, &self.search_output),
        ]
    }
}

/// Create `root/identity` (and parents) and return its artifact paths.
///
/// An existing directory is fine. Any other failure is logged and the
/// derived paths are returned anyway; the next file operation will surface
/// the real problem.
pub fn ensure_workspace(root: &Path, identity: &str) -> WorkspacePaths {
    let paths = WorkspacePaths::for_identity(root, identity);
    match std::fs::create_dir_all(&paths.directory) {
        Ok(()) => debug!(identity, directory = %paths.directory.display(), "Workspace ready"),
        Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {}
        Err(e) => warn!(
            identity,
            directory = %paths.directory.display(),
            error = %e,
            "Failed to create workspace directory, continuing with derived paths"
        ),
    }
    paths
}

/// Presence of one artifact on disk.
#[derive(Debug, Clone, Serialize)]
pub struct ArtifactStatus {
    pub stage: Stage,
    pub role: ArtifactRole,
    pub path: PathBuf,
    pub present: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub modified: Option<DateTime<Utc>>,
}

/// Snapshot of a workspace, computed without rendering or running anything.
#[derive(Debug, Clone, Serialize)]
pub struct WorkspaceStatus {
    pub identity: String,
    pub directory: PathBuf,
    pub exists: bool,
    pub artifacts: Vec<ArtifactStatus>,
}

impl WorkspaceStatus {
    /// True once every artifact of both stages is on disk.
    pub fn is_complete(&self) -> bool {
        self.artifacts.iter().all(|a| a.present)
    }
}

pub fn workspace_status(root: &Path, identity: &str) -> WorkspaceStatus {
    let paths = WorkspacePaths::for_identity(root, identity);
    let artifacts = paths
        .artifacts()
        .into_iter()
        .map(|(stage, role, path)| {
            let meta = std::fs::metadata(path).ok().filter(|m| m.is_file());
            ArtifactStatus {
                stage,
                role,
                path: path.to_path_buf(),
                present: meta.is_some(),
                size: meta.as_ref().map(|m| m.len()),
                modified: meta
                    .as_ref()
                    .and_then(|m| m.modified().ok())
                    .map(DateTime::<Utc>::from),
            }
        })
        .collect();

    WorkspaceStatus {
        identity: identity.to_string(),
        exists: paths.directory.is_dir(),
        directory: paths.directory,
        artifacts,
    }
}
