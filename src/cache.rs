//! Artifact cache and stage runner.
//!
//! Each artifact is either ABSENT or PRESENT on disk. Presence is the only
//! cache signal: a present artifact is read back verbatim and never
//! re-rendered or re-computed. An absent one is rendered (templates) or
//! produced by running the stage's external tool (outputs).
//!
//! Resolutions for one identity are serialized through [`IdentityLocks`],
//! so concurrent requests for the same sequence run each tool at most once.

use async_trait::async_trait;
use std::collections::HashMap;
use std::path::Path;
use std::process::Stdio;
use std::sync::Arc;
use tokio::process::Command;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{debug, info, warn};

use crate::errors::PipelineError;
use crate::render::StageCommand;
use crate::workspace::Stage;

/// Runs a stage's external tool to completion.
///
/// Real implementation: [`ShellToolRunner`]. Tests substitute stubs that
/// write the output file themselves.
#[async_trait]
pub trait ToolRunner: Send + Sync {
    async fn run(&self, command: &StageCommand) -> Result<(), PipelineError>;
}

/// Runs the command line through `sh -c` and waits for it, with no timeout.
///
/// The tool writes its result to the file named on its command line.
/// Captured stdout is discarded; stderr is kept for the error message.
#[derive(Debug, Default, Clone)]
pub struct ShellToolRunner;

#[async_trait]
impl ToolRunner for ShellToolRunner {
    async fn run(&self, command: &StageCommand) -> Result<(), PipelineError> {
        info!(stage = %command.stage, command = %command.command_line, "Running external tool");

        let output = Command::new("sh")
            .arg("-c")
            .arg(&command.command_line)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|source| PipelineError::ToolLaunch {
                stage: command.stage,
                command: command.command_line.clone(),
                source,
            })?;

        debug!(
            stage = %command.stage,
            status = ?output.status.code(),
            stdout_bytes = output.stdout.len(),
            "External tool exited"
        );

        if !output.status.success() {
            return Err(PipelineError::ToolFailed {
                stage: command.stage,
                code: output.status.code(),
                stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            });
        }
        Ok(())
    }
}

/// One lock per identity, created on demand.
#[derive(Debug, Clone, Default)]
pub struct IdentityLocks {
    locks: Arc<Mutex<HashMap<String, Arc<Mutex<()>>>>>,
}

impl IdentityLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to `identity`.
    pub async fn acquire(&self, identity: &str) -> OwnedMutexGuard<()> {
        let lock = {
            let mut map = self.locks.lock().await;
            // Entries only referenced by the map are idle.
            map.retain(|_, lock| Arc::strong_count(lock) > 1);
            Arc::clone(
                map.entry(identity.to_string())
                    .or_insert_with(|| Arc::new(Mutex::new(()))),
            )
        };
        lock.lock_owned().await
    }

    /// Number of identities currently locked or waited on.
    pub async fn active(&self) -> usize {
        let map = self.locks.lock().await;
        map.values().filter(|lock| Arc::strong_count(lock) > 1).count()
    }
}

/// Contents of a resolved artifact and whether it came from disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolved {
    pub text: String,
    pub cached: bool,
}

/// Read-if-present, else compute, for template and output artifacts.
#[derive(Clone)]
pub struct ArtifactCache {
    runner: Arc<dyn ToolRunner>,
    locks: IdentityLocks,
}

impl ArtifactCache {
    pub fn new(runner: Arc<dyn ToolRunner>) -> Self {
        Self {
            runner,
            locks: IdentityLocks::new(),
        }
    }

    pub fn locks(&self) -> &IdentityLocks {
        &self.locks
    }

    /// Resolve a template artifact.
    ///
    /// A present file is returned verbatim and `render` is not called. On a
    /// miss the rendered text is written to `path`; a failed write is logged
    /// and the text is still returned, leaving the artifact absent.
    pub async fn resolve_template(
        &self,
        identity: &str,
        stage: Stage,
        path: &Path,
        render: impl FnOnce() -> String + Send,
    ) -> Resolved {
        let _guard = self.locks.acquire(identity).await;

        if artifact_exists(path).await {
            debug!(identity, %stage, path = %path.display(), "Template cache hit");
            return Resolved {
                text: read_artifact(path).await,
                cached: true,
            };
        }

        let text = render();
        match tokio::fs::write(path, &text).await {
            Ok(()) => info!(identity, %stage, path = %path.display(), "Template written"),
            Err(e) => warn!(
                identity,
                %stage,
                path = %path.display(),
                error = %e,
                "Failed to write template, using rendered text without caching it"
            ),
        }
        Resolved {
            text,
            cached: false,
        }
    }

    /// Resolve an output artifact.
    ///
    /// A present file is returned without running the tool. On a miss the
    /// tool runs once and its output file is read back. Tool failures
    /// propagate and leave the artifact absent: anything the tool wrote
    /// before failing is removed under the identity lock, so the next
    /// request runs the tool again.
    pub async fn resolve_output(
        &self,
        identity: &str,
        command: &StageCommand,
    ) -> Result<Resolved, PipelineError> {
        let _guard = self.locks.acquire(identity).await;
        let path = command.output_path.as_path();

        if artifact_exists(path).await {
            debug!(identity, stage = %command.stage, path = %path.display(), "Output cache hit");
            return Ok(Resolved {
                text: read_artifact(path).await,
                cached: true,
            });
        }

        if let Err(e) = self.runner.run(command).await {
            discard_partial_output(path).await;
            return Err(e);
        }
        info!(identity, stage = %command.stage, path = %path.display(), "Output produced");

        Ok(Resolved {
            text: read_artifact(path).await,
            cached: false,
        })
    }
}

async fn artifact_exists(path: &Path) -> bool {
    tokio::fs::try_exists(path).await.unwrap_or(false)
}

/// Remove an output left behind by a failed tool run.
async fn discard_partial_output(path: &Path) {
    match tokio::fs::remove_file(path).await {
        Ok(()) => warn!(path = %path.display(), "Removed partial output of failed tool run"),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!(
            path = %path.display(),
            error = %e,
            "Failed to remove partial output of failed tool run"
        ),
    }
}

/// Read an artifact, degrading to an empty string if it cannot be read.
async fn read_artifact(path: &Path) -> String {
    match tokio::fs::read_to_string(path).await {
        Ok(text) => text,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Failed to read artifact, treating it as empty");
            String::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use tempfile::tempdir;

    const ID: &str = "cc0af3a4fedb18378b4b57b98068e69f";

    /// Writes fixed content to the command's output path and counts calls.
    struct CountingRunner {
        calls: AtomicUsize,
        content: String,
        delay: Duration,
    }

    impl CountingRunner {
        fn new(content: &str) -> Self {
            Self {
                calls: AtomicUsize::new(0),
                content: content.to_string(),
                delay: Duration::ZERO,
            }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl ToolRunner for CountingRunner {
        async fn run(&self, command: &StageCommand) -> Result<(), PipelineError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;
            tokio::fs::write(&command.output_path, &self.content)
                .await
                .map_err(|e| PipelineError::Other(e.into()))
        }
    }

    struct FailingRunner;

    #[async_trait]
    impl ToolRunner for FailingRunner {
        async fn run(&self, command: &StageCommand) -> Result<(), PipelineError> {
            Err(PipelineError::ToolFailed {
                stage: command.stage,
                code: Some(1),
                stderr: "boom".to_string(),
            })
        }
    }

    fn command(output_path: PathBuf) -> StageCommand {
        StageCommand {
            stage: Stage::Design,
            command_line: "primer3_core".to_string(),
            output_path,
        }
    }

    #[tokio::test]
    async fn test_output_miss_runs_tool_once() {
        let dir = tempdir().unwrap();
        let runner = Arc::new(CountingRunner::new("PRIMER_LEFT=ACGT\n"));
        let cache = ArtifactCache::new(runner.clone());
        let cmd = command(dir.path().join("primer3-output.txt"));

        let resolved = cache.resolve_output(ID, &cmd).await.unwrap();
        assert_eq!(runner.calls(), 1);
        assert!(!resolved.cached);
        assert_eq!(resolved.text, "PRIMER_LEFT=ACGT\n");
        assert!(cmd.output_path.exists());
    }

    #[tokio::test]
    async fn test_output_hit_skips_tool() {
        let dir = tempdir().unwrap();
        let runner = Arc::new(CountingRunner::new("A=1\n"));
        let cache = ArtifactCache::new(runner.clone());
        let cmd = command(dir.path().join("out.txt"));

        cache.resolve_output(ID, &cmd).await.unwrap();
        let second = cache.resolve_output(ID, &cmd).await.unwrap();
        assert_eq!(runner.calls(), 1);
        assert!(second.cached);
        assert_eq!(second.text, "A=1\n");
    }

    #[tokio::test]
    async fn test_output_existing_file_is_ground_truth() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("out.txt");
        std::fs::write(&path, "FROM_DISK=1\n").unwrap();
        let runner = Arc::new(CountingRunner::new("FROM_TOOL=1\n"));
        let cache = ArtifactCache::new(runner.clone());

        let resolved = cache.resolve_output(ID, &command(path.clone())).await.unwrap();
        assert_eq!(runner.calls(), 0);
        assert_eq!(resolved.text, "FROM_DISK=1\n");
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "FROM_DISK=1\n");
    }

    #[tokio::test]
    async fn test_output_failure_propagates_and_leaves_artifact_absent() {
        let dir = tempdir().unwrap();
        let cache = ArtifactCache::new(Arc::new(FailingRunner));
        let cmd = command(dir.path().join("out.txt"));

        let err = cache.resolve_output(ID, &cmd).await.unwrap_err();
        assert!(matches!(err, PipelineError::ToolFailed { code: Some(1), .. }));
        assert!(!cmd.output_path.exists());
    }

    #[tokio::test]
    async fn test_partial_output_of_failed_run_is_removed_and_retried() {
        /// Writes a truncated output, then fails.
        struct PartialWriteRunner {
            calls: AtomicUsize,
        }

        #[async_trait]
        impl ToolRunner for PartialWriteRunner {
            async fn run(&self, command: &StageCommand) -> Result<(), PipelineError> {
                self.calls.fetch_add(1, Ordering::SeqCst);
                tokio::fs::write(&command.output_path, "PRIMER_LEFT=AC")
                    .await
                    .map_err(|e| PipelineError::Other(e.into()))?;
                Err(PipelineError::ToolFailed {
                    stage: command.stage,
                    code: Some(1),
                    stderr: "fatal input error".to_string(),
                })
            }
        }

        let dir = tempdir().unwrap();
        let runner = Arc::new(PartialWriteRunner {
            calls: AtomicUsize::new(0),
        });
        let cache = ArtifactCache::new(runner.clone());
        let cmd = command(dir.path().join("out.txt"));

        assert!(cache.resolve_output(ID, &cmd).await.is_err());
        assert_eq!(runner.calls.load(Ordering::SeqCst), 1);
        assert!(!cmd.output_path.exists());

        assert!(cache.resolve_output(ID, &cmd).await.is_err());
        assert_eq!(runner.calls.load(Ordering::SeqCst), 2);
        assert!(!cmd.output_path.exists());
    }

    #[tokio::test]
    async fn test_output_missing_after_run_degrades_to_empty() {
        struct SilentRunner;

        #[async_trait]
        impl ToolRunner for SilentRunner {
            async fn run(&self, _command: &StageCommand) -> Result<(), PipelineError> {
                Ok(())
            }
        }

        let dir = tempdir().unwrap();
        let cache = ArtifactCache::new(Arc::new(SilentRunner));
        let resolved = cache
            .resolve_output(ID, &command(dir.path().join("out.txt")))
            .await
            .unwrap();
        assert_eq!(resolved.text, "");
        assert!(!resolved.cached);
    }

    #[tokio::test]
    async fn test_concurrent_misses_run_tool_once() {
        let dir = tempdir().unwrap();
        let runner = Arc::new(CountingRunner {
            delay: Duration::from_millis(50),
            ..CountingRunner::new("A=1\n")
        });
        let cache = ArtifactCache::new(runner.clone());
        let cmd = command(dir.path().join("out.txt"));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let cache = cache.clone();
            let cmd = cmd.clone();
            handles.push(tokio::spawn(async move { cache.resolve_output(ID, &cmd).await }));
        }
        for handle in handles {
            assert_eq!(handle.await.unwrap().unwrap().text, "A=1\n");
        }
        assert_eq!(runner.calls(), 1);
    }

    #[tokio::test]
    async fn test_template_miss_renders_and_writes() {
        let dir = tempdir().unwrap();
        let cache = ArtifactCache::new(Arc::new(FailingRunner));
        let path = dir.path().join("primer3-template.txt");

        let resolved = cache
            .resolve_template(ID, Stage::Design, &path, || "SEQUENCE_ID=x\n=\n".to_string())
            .await;
        assert!(!resolved.cached);
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "SEQUENCE_ID=x\n=\n");
    }

    #[tokio::test]
    async fn test_template_hit_does_not_render() {
        let dir = tempdir().unwrap();
        let cache = ArtifactCache::new(Arc::new(FailingRunner));
        let path = dir.path().join("primer3-template.txt");
        std::fs::write(&path, "OLD=1\n").unwrap();

        let resolved = cache
            .resolve_template(ID, Stage::Design, &path, || panic!("render must not run on a hit"))
            .await;
        assert!(resolved.cached);
        assert_eq!(resolved.text, "OLD=1\n");
    }

    #[tokio::test]
    async fn test_template_write_failure_returns_text_and_stays_absent() {
        let dir = tempdir().unwrap();
        let cache = ArtifactCache::new(Arc::new(FailingRunner));
        let path = dir.path().join("missing-dir").join("primer3-template.txt");
        let renders = AtomicUsize::new(0);

        for _ in 0..2 {
            let resolved = cache
                .resolve_template(ID, Stage::Design, &path, || {
                    renders.fetch_add(1, Ordering::SeqCst);
                    "NEW=1\n".to_string()
                })
                .await;
            assert_eq!(resolved.text, "NEW=1\n");
            assert!(!resolved.cached);
        }
        assert!(!path.exists());
        assert_eq!(renders.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_identity_locks_released_after_use() {
        let locks = IdentityLocks::new();
        {
            let _guard = locks.acquire(ID).await;
            assert_eq!(locks.active().await, 1);
        }
        assert_eq!(locks.active().await, 0);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_shell_runner_success_writes_file() {
        let dir = tempdir().unwrap();
        let out = dir.path().join("out.txt");
        let cmd = StageCommand {
            stage: Stage::Design,
            command_line: format!("echo ignored; printf 'A=1\\n' > {}", out.display()),
            output_path: out.clone(),
        };
        ShellToolRunner.run(&cmd).await.unwrap();
        assert_eq!(std::fs::read_to_string(&out).unwrap(), "A=1\n");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_shell_runner_nonzero_exit_is_tool_failed() {
        let cmd = StageCommand {
            stage: Stage::Search,
            command_line: "echo 'no genome' >&2; exit 3".to_string(),
            output_path: PathBuf::from("/nonexistent/out.txt"),
        };
        let err = ShellToolRunner.run(&cmd).await.unwrap_err();
        match err {
            PipelineError::ToolFailed {
                stage,
                code,
                stderr,
            } => {
                assert_eq!(stage, Stage::Search);
                assert_eq!(code, Some(3));
                assert_eq!(stderr.trim(), "no genome");
            }
            other => panic!("Expected ToolFailed, got {:?}", other),
        }
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_shell_tool_failing_after_partial_write_is_not_cached() {
        let dir = tempdir().unwrap();
        let out = dir.path().join("out.txt");
        let cmd = StageCommand {
            stage: Stage::Design,
            command_line: format!("printf 'PRIMER_LEFT=AC' > {}; exit 1", out.display()),
            output_path: out.clone(),
        };
        let cache = ArtifactCache::new(Arc::new(ShellToolRunner));

        assert!(cache.resolve_output(ID, &cmd).await.is_err());
        assert!(!out.exists());
        assert!(cache.resolve_output(ID, &cmd).await.is_err());
        assert!(!out.exists());
    }
}
