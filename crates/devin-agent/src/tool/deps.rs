//! Capability bundle handed to tool providers.
//!
//! Tools never touch the host directly. A provider receives a
//! [`ToolDependencies`] and builds tools over whichever capabilities it needs,
//! so the same catalog runs against a real disk, a sandbox, or test doubles.

use async_trait::async_trait;
use devin_llm::{SharedClient, StreamRequest};
use std::collections::BTreeMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use crate::error::{AgentError, Result};

// ─────────────────────────────────────────────────────────────────────────────
// File System
// ─────────────────────────────────────────────────────────────────────────────

/// Metadata for one path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileInfo {
    pub path: PathBuf,
    pub size: u64,
    pub is_dir: bool,
}

/// File access used by the file and search tools.
#[async_trait]
pub trait FileSystem: Send + Sync {
    /// Read a UTF-8 file.
    async fn read_file(&self, path: &Path) -> io::Result<String>;

    /// Write a file, creating parent directories.
    async fn write_file(&self, path: &Path, content: &str) -> io::Result<()>;

    /// List files under `dir`, optionally recursing. Directories are not listed.
    async fn list_files(&self, dir: &Path, recursive: bool) -> io::Result<Vec<PathBuf>>;

    /// Whether the path exists.
    async fn exists(&self, path: &Path) -> bool;

    /// Size and kind of a path.
    async fn file_info(&self, path: &Path) -> io::Result<FileInfo>;

    /// Remove a file.
    async fn delete(&self, path: &Path) -> io::Result<()>;

    /// Resolve a path written by the model against the working directory.
    fn resolve_path(&self, working_dir: &Path, path: &str) -> PathBuf {
        let path = Path::new(path);
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            working_dir.join(path)
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Shell
// ─────────────────────────────────────────────────────────────────────────────

/// Captured output of a finished command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ShellOutput {
    /// Exit code, `None` if the process was killed by a signal.
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
    /// The command hit its timeout and was killed.
    pub timed_out: bool,
}

impl ShellOutput {
    /// Exit code 0 and no timeout.
    pub fn success(&self) -> bool {
        !self.timed_out && self.exit_code == Some(0)
    }

    /// Stdout and stderr combined for display.
    pub fn combined(&self) -> String {
        match (self.stdout.trim_end().is_empty(), self.stderr.trim_end().is_empty()) {
            (_, true) => self.stdout.clone(),
            (true, false) => self.stderr.clone(),
            (false, false) => format!("{}\n[stderr]\n{}", self.stdout.trim_end(), self.stderr),
        }
    }
}

/// Command execution used by the `shell` tool.
#[async_trait]
pub trait ShellExecutor: Send + Sync {
    /// Whether commands can run at all on this host.
    fn is_available(&self) -> bool;

    /// Run `command` in `working_dir`, killing it after `timeout`.
    async fn execute(
        &self,
        command: &str,
        working_dir: &Path,
        timeout: Duration,
    ) -> io::Result<ShellOutput>;
}

// ─────────────────────────────────────────────────────────────────────────────
// Sub-agents
// ─────────────────────────────────────────────────────────────────────────────

/// Named agents the model may consult through `ask-agent`.
#[async_trait]
pub trait SubAgentManager: Send + Sync {
    /// Names of available agents, sorted.
    fn names(&self) -> Vec<String>;

    /// Send `question` to `agent` and return its full answer.
    async fn ask(&self, agent: &str, question: &str) -> Result<String>;
}

/// Sub-agents backed by LLM clients, typically custom HTTP agents.
#[derive(Default, Clone)]
pub struct ClientSubAgents {
    clients: BTreeMap<String, SharedClient>,
}

impl ClientSubAgents {
    /// Create an empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an agent under `name`.
    pub fn with_agent(mut self, name: impl Into<String>, client: SharedClient) -> Self {
        self.clients.insert(name.into(), client);
        self
    }

    /// Number of agents.
    pub fn len(&self) -> usize {
        self.clients.len()
    }

    /// True when no agents are configured.
    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }
}

#[async_trait]
impl SubAgentManager for ClientSubAgents {
    fn names(&self) -> Vec<String> {
        self.clients.keys().cloned().collect()
    }

    async fn ask(&self, agent: &str, question: &str) -> Result<String> {
        let client = self
            .clients
            .get(agent)
            .ok_or_else(|| AgentError::invalid_arguments(format!("unknown agent '{}'", agent)))?;

        tracing::debug!(agent = %agent, "Asking sub-agent");
        let stream = client.stream(StreamRequest::new(question)).await?;
        Ok(stream.collect_text().await?)
    }
}

impl std::fmt::Debug for ClientSubAgents {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientSubAgents")
            .field("agents", &self.names())
            .finish()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Dependencies
// ─────────────────────────────────────────────────────────────────────────────

/// Everything a provider may build tools over.
#[derive(Clone)]
pub struct ToolDependencies {
    pub file_system: Arc<dyn FileSystem>,
    pub shell: Arc<dyn ShellExecutor>,
    pub sub_agents: Option<Arc<dyn SubAgentManager>>,
    /// Secondary model for tools that call one themselves.
    pub llm_service: Option<SharedClient>,
}

impl ToolDependencies {
    /// Bundle the required capabilities.
    pub fn new(file_system: Arc<dyn FileSystem>, shell: Arc<dyn ShellExecutor>) -> Self {
        Self {
            file_system,
            shell,
            sub_agents: None,
            llm_service: None,
        }
    }

    /// Add a sub-agent manager.
    pub fn with_sub_agents(mut self, sub_agents: Arc<dyn SubAgentManager>) -> Self {
        self.sub_agents = Some(sub_agents);
        self
    }

    /// Add a secondary LLM service.
    pub fn with_llm_service(mut self, client: SharedClient) -> Self {
        self.llm_service = Some(client);
        self
    }
}

impl std::fmt::Debug for ToolDependencies {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolDependencies")
            .field("sub_agents", &self.sub_agents.is_some())
            .field("llm_service", &self.llm_service.is_some())
            .finish_non_exhaustive()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Test Doubles
// ─────────────────────────────────────────────────────────────────────────────

/// In-memory file system for tests.
#[cfg(test)]
#[derive(Debug, Default)]
pub struct MemoryFileSystem {
    files: parking_lot::Mutex<BTreeMap<PathBuf, String>>,
}

#[cfg(test)]
impl MemoryFileSystem {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_file(self, path: impl Into<PathBuf>, content: impl Into<String>) -> Self {
        self.files.lock().insert(path.into(), content.into());
        self
    }

    pub fn get(&self, path: impl AsRef<Path>) -> Option<String> {
        self.files.lock().get(path.as_ref()).cloned()
    }
}

#[cfg(test)]
fn not_found(path: &Path) -> io::Error {
    io::Error::new(io::ErrorKind::NotFound, format!("{} not found", path.display()))
}

#[cfg(test)]
#[async_trait]
impl FileSystem for MemoryFileSystem {
    async fn read_file(&self, path: &Path) -> io::Result<String> {
        self.get(path).ok_or_else(|| not_found(path))
    }

    async fn write_file(&self, path: &Path, content: &str) -> io::Result<()> {
        self.files
            .lock()
            .insert(path.to_path_buf(), content.to_string());
        Ok(())
    }

    async fn list_files(&self, dir: &Path, recursive: bool) -> io::Result<Vec<PathBuf>> {
        Ok(self
            .files
            .lock()
            .keys()
            .filter(|p| {
                if recursive {
                    p.starts_with(dir)
                } else {
                    p.parent() == Some(dir)
                }
            })
            .cloned()
            .collect())
    }

    async fn exists(&self, path: &Path) -> bool {
        let files = self.files.lock();
        files.contains_key(path) || files.keys().any(|p| p.starts_with(path))
    }

    async fn file_info(&self, path: &Path) -> io::Result<FileInfo> {
        let files = self.files.lock();
        match files.get(path) {
            Some(content) => Ok(FileInfo {
                path: path.to_path_buf(),
                size: content.len() as u64,
                is_dir: false,
            }),
            None if files.keys().any(|p| p.starts_with(path)) => Ok(FileInfo {
                path: path.to_path_buf(),
                size: 0,
                is_dir: true,
            }),
            None => Err(not_found(path)),
        }
    }

    async fn delete(&self, path: &Path) -> io::Result<()> {
        self.files
            .lock()
            .remove(path)
            .map(|_| ())
            .ok_or_else(|| not_found(path))
    }
}

/// Shell double that returns scripted outputs after an optional delay.
#[cfg(test)]
#[derive(Debug, Default)]
pub struct ScriptedShell {
    pub output: ShellOutput,
    pub delay: Duration,
    pub unavailable: bool,
    pub commands: parking_lot::Mutex<Vec<String>>,
}

#[cfg(test)]
#[async_trait]
impl ShellExecutor for ScriptedShell {
    fn is_available(&self) -> bool {
        !self.unavailable
    }

    async fn execute(
        &self,
        command: &str,
        _working_dir: &Path,
        timeout: Duration,
    ) -> io::Result<ShellOutput> {
        self.commands.lock().push(command.to_string());
        if self.delay > timeout {
            tokio::time::sleep(timeout).await;
            return Ok(ShellOutput {
                timed_out: true,
                ..Default::default()
            });
        }
        tokio::time::sleep(self.delay).await;
        Ok(self.output.clone())
    }
}
