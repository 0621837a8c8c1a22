//! Host capabilities backing the built-in tools.

use std::io;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use devin_agent::{FileInfo, FileSystem, ShellExecutor, ShellOutput};
use walkdir::{DirEntry, WalkDir};

/// Directories never descended into when listing.
const SKIPPED_DIRS: &[&str] = &[".git", "target", "node_modules"];

// ─────────────────────────────────────────────────────────────────────────────
// File System
// ─────────────────────────────────────────────────────────────────────────────

/// The local disk.
#[derive(Debug, Default, Clone, Copy)]
pub struct LocalFileSystem;

#[async_trait]
impl FileSystem for LocalFileSystem {
    async fn read_file(&self, path: &Path) -> io::Result<String> {
        tokio::fs::read_to_string(path).await
    }

    async fn write_file(&self, path: &Path, content: &str) -> io::Result<()> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(path, content).await
    }

    async fn list_files(&self, dir: &Path, recursive: bool) -> io::Result<Vec<PathBuf>> {
        let dir = dir.to_path_buf();
        tokio::task::spawn_blocking(move || walk_files(&dir, recursive))
            .await
            .map_err(io::Error::other)?
    }

    async fn exists(&self, path: &Path) -> bool {
        tokio::fs::try_exists(path).await.unwrap_or(false)
    }

    async fn file_info(&self, path: &Path) -> io::Result<FileInfo> {
        let meta = tokio::fs::metadata(path).await?;
        Ok(FileInfo {
            path: path.to_path_buf(),
            size: meta.len(),
            is_dir: meta.is_dir(),
        })
    }

    async fn delete(&self, path: &Path) -> io::Result<()> {
        tokio::fs::remove_file(path).await
    }
}

/// Files under `dir`, sorted. Unreadable subdirectories are skipped; an
/// unreadable `dir` is an error.
fn walk_files(dir: &Path, recursive: bool) -> io::Result<Vec<PathBuf>> {
    let walker = WalkDir::new(dir)
        .min_depth(1)
        .max_depth(if recursive { usize::MAX } else { 1 })
        .follow_links(false);

    let mut files = Vec::new();
    for entry in walker.into_iter().filter_entry(|e| !is_skipped_dir(e)) {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) if e.depth() == 0 => return Err(e.into()),
            Err(e) => {
                tracing::debug!(error = %e, "Skipping unreadable entry");
                continue;
            }
        };
        if !entry.file_type().is_dir() {
            files.push(entry.into_path());
        }
    }

    files.sort();
    Ok(files)
}

fn is_skipped_dir(entry: &DirEntry) -> bool {
    entry.depth() > 0
        && entry.file_type().is_dir()
        && entry
            .file_name()
            .to_str()
            .is_some_and(|name| SKIPPED_DIRS.contains(&name))
}

// ─────────────────────────────────────────────────────────────────────────────
// Shell
// ─────────────────────────────────────────────────────────────────────────────

/// Runs commands through `sh -c`.
#[derive(Debug, Default, Clone, Copy)]
pub struct ProcessShell;

#[async_trait]
impl ShellExecutor for ProcessShell {
    fn is_available(&self) -> bool {
        cfg!(unix) && Path::new("/bin/sh").exists()
    }

    async fn execute(
        &self,
        command: &str,
        working_dir: &Path,
        timeout: Duration,
    ) -> io::Result<ShellOutput> {
        tracing::debug!(command = %command, dir = %working_dir.display(), "Running shell command");

        let child = tokio::process::Command::new("sh")
            .arg("-c")
            .arg(command)
            .current_dir(working_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;

        match tokio::time::timeout(timeout, child.wait_with_output()).await {
            Ok(output) => {
                let output = output?;
                Ok(ShellOutput {
                    exit_code: output.status.code(),
                    stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
                    stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
                    timed_out: false,
                })
            }
            // Dropping the future kills the child.
            Err(_) => Ok(ShellOutput {
                timed_out: true,
                ..Default::default()
            }),
        }
    }
}
