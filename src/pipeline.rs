//! Pipeline controller.
//!
//! A [`PipelineRun`] is rebuilt for every request from the submitted
//! sequence plus whatever the filesystem already holds; nothing about a run
//! lives in process memory between requests. [`Pipeline`] wires the stages:
//!
//! ```text
//! sanitize → identity → workspace
//!     → design template → design output (primer3) → parse
//!     → search template → search output (primersearch)
//! ```

use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, instrument};

use crate::boulder::{BoulderRecord, parse_key_values};
use crate::cache::{ArtifactCache, Resolved, ShellToolRunner, ToolRunner};
use crate::config::PipelineConfig;
use crate::errors::PipelineError;
use crate::render::{self, DesignContext, StageCommand};
use crate::sequence::{identity, is_identity, sanitize};
use crate::workspace::{Stage, WorkspacePaths, WorkspaceStatus, ensure_workspace, workspace_status};

/// The unit of work for one submitted sequence.
#[derive(Debug, Clone, Serialize)]
pub struct PipelineRun {
    pub raw_sequence: String,
    pub sequence: String,
    pub identity: String,
    pub workspace: WorkspacePaths,
}

impl PipelineRun {
    /// Sanitize `raw_sequence`, derive its identity and ensure its workspace.
    pub fn setup(upload_root: &Path, raw_sequence: &str) -> Self {
        let sequence = sanitize(raw_sequence);
        let identity = identity(&sequence);
        let workspace = ensure_workspace(upload_root, &identity);
        Self {
            raw_sequence: raw_sequence.to_string(),
            sequence,
            identity,
            workspace,
        }
    }
}

/// One resolved artifact as reported to callers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ArtifactReport {
    pub path: PathBuf,
    pub cached: bool,
    pub content: String,
}

impl ArtifactReport {
    fn new(path: &Path, resolved: Resolved) -> Self {
        Self {
            path: path.to_path_buf(),
            cached: resolved.cached,
            content: resolved.text,
        }
    }
}

/// Result of the primer3 stage.
#[derive(Debug, Clone, Serialize)]
pub struct DesignStage {
    pub template: ArtifactReport,
    pub command: StageCommand,
    pub output: ArtifactReport,
    pub primers: BoulderRecord,
}

/// Result of the primersearch stage.
#[derive(Debug, Clone, Serialize)]
pub struct SearchStage {
    pub template: ArtifactReport,
    pub command: StageCommand,
    pub output: ArtifactReport,
}

/// Everything a full run produced.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub identity: String,
    pub sequence: String,
    pub workspace: PathBuf,
    pub design: DesignStage,
    pub search: SearchStage,
}

impl RunReport {
    /// How many external tools actually ran for this report.
    pub fn tool_invocations(&self) -> usize {
        [&self.design.output, &self.search.output]
            .iter()
            .filter(|output| !output.cached)
            .count()
    }

    pub fn fully_cached(&self) -> bool {
        self.design.template.cached
            && self.design.output.cached
            && self.search.template.cached
            && self.search.output.cached
    }
}

/// Stateless pipeline service; cheap to clone and share across requests.
#[derive(Clone)]
pub struct Pipeline {
    config: Arc<PipelineConfig>,
    cache: ArtifactCache,
}

impl Pipeline {
    pub fn new(config: PipelineConfig, runner: Arc<dyn ToolRunner>) -> Self {
        Self {
            config: Arc::new(config),
            cache: ArtifactCache::new(runner),
        }
    }

    /// Pipeline that runs the configured tools through `sh -c`.
    pub fn with_shell_runner(config: PipelineConfig) -> Self {
        Self::new(config, Arc::new(ShellToolRunner))
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn upload_root(&self) -> &Path {
        &self.config.paths.upload_root
    }

    pub fn setup(&self, raw_sequence: &str) -> PipelineRun {
        let run = PipelineRun::setup(self.upload_root(), raw_sequence);
        info!(identity = %run.identity, length = run.sequence.len(), "Pipeline run set up");
        run
    }

    pub fn design_command(&self, run: &PipelineRun) -> StageCommand {
        render::design_command(&self.config, &run.workspace)
    }

    pub fn search_command(&self, run: &PipelineRun) -> StageCommand {
        render::search_command(&self.config, &run.workspace)
    }

    /// Resolve the primer3 input file.
    pub async fn design_template(&self, run: &PipelineRun) -> ArtifactReport {
        let path = &run.workspace.design_template;
        let resolved = self
            .cache
            .resolve_template(&run.identity, Stage::Design, path, || {
                render::render_design_template(&DesignContext {
                    identity: &run.identity,
                    sequence: &run.sequence,
                    settings: &self.config.primer3,
                })
            })
            .await;
        ArtifactReport::new(path, resolved)
    }

    /// Resolve the primer3 template and output, then parse the output.
    #[instrument(skip_all, fields(identity = %run.identity))]
    pub async fn run_design(&self, run: &PipelineRun) -> Result<DesignStage, PipelineError> {
        let template = self.design_template(run).await;
        let command = self.design_command(run);
        let resolved = self.cache.resolve_output(&run.identity, &command).await?;
        let output = ArtifactReport::new(&command.output_path, resolved);
        let primers = parse_key_values(&output.content).map_err(|source| PipelineError::Parse {
            stage: Stage::Design,
            source,
        })?;

        Ok(DesignStage {
            template,
            command,
            output,
            primers,
        })
    }

    /// Resolve the primersearch input file from parsed primer3 output.
    pub async fn search_template(&self, run: &PipelineRun, primers: &BoulderRecord) -> ArtifactReport {
        let path = &run.workspace.search_template;
        let resolved = self
            .cache
            .resolve_template(&run.identity, Stage::Search, path, || {
                render::render_search_template(primers)
            })
            .await;
        ArtifactReport::new(path, resolved)
    }

    /// Resolve the primersearch template and output.
    #[instrument(skip_all, fields(identity = %run.identity))]
    pub async fn run_search(
        &self,
        run: &PipelineRun,
        primers: &BoulderRecord,
    ) -> Result<SearchStage, PipelineError> {
        let template = self.search_template(run, primers).await;
        let command = self.search_command(run);
        let resolved = self.cache.resolve_output(&run.identity, &command).await?;
        let output = ArtifactReport::new(&command.output_path, resolved);

        Ok(SearchStage {
            template,
            command,
            output,
        })
    }

    /// Run both stages for `raw_sequence`, reusing every cached artifact.
    pub async fn execute(&self, raw_sequence: &str) -> Result<RunReport, PipelineError> {
        let run = self.setup(raw_sequence);
        let design = self.run_design(&run).await?;
        let search = self.run_search(&run, &design.primers).await?;

        let report = RunReport {
            identity: run.identity,
            sequence: run.sequence,
            workspace: run.workspace.directory,
            design,
            search,
        };
        info!(
            identity = %report.identity,
            tool_invocations = report.tool_invocations(),
            "Pipeline run complete"
        );
        Ok(report)
    }

    /// Artifact presence for an identity, without computing anything.
    pub fn status(&self, identity: &str) -> Result<WorkspaceStatus, PipelineError> {
        if !is_identity(identity) {
            return Err(PipelineError::InvalidIdentity(identity.to_string()));
        }
        Ok(workspace_status(self.upload_root(), identity))
    }

    /// Artifact presence for a raw sequence.
    pub fn status_for_sequence(&self, raw_sequence: &str) -> WorkspaceStatus {
        let identity = identity(&sanitize(raw_sequence));
        workspace_status(self.upload_root(), &identity)
    }
}
