// src/exec/docker.rs

//! [`ContainerEngine`] implementation that shells out to the `docker` CLI.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use tokio::process::Command;
use tracing::{debug, warn};

use crate::exec::backend::{
    CommitInfo, ContainerEngine, ContainerInfo, EngineFuture, ImageInfo, TagInfo,
};
use crate::exec::vars::expand;
use crate::fs::{newest_mtime, FileSystem, RealFileSystem};
use crate::types::{Artifact, Timestamp, Vars};

const IMAGE_FORMAT: &str = "{{.Created}}|{{.Id}}|{{.Container}}";
const CONTAINER_FORMAT: &str = "{{.State.Running}}|{{.Created}}|{{.Name}}|{{.State.ExitCode}}";

/// Docker CLI wrapper.
///
/// Each operation runs one `docker` invocation (or one per artifact for
/// copies) and waits for it to exit.
#[derive(Debug, Clone)]
pub struct DockerCli {
    binary: String,
    fs: Arc<dyn FileSystem>,
}

impl DockerCli {
    pub fn new(binary: impl Into<String>) -> Self {
        Self::with_fs(binary, Arc::new(RealFileSystem))
    }

    /// Use a custom filesystem for modification-time queries.
    pub fn with_fs(binary: impl Into<String>, fs: Arc<dyn FileSystem>) -> Self {
        Self {
            binary: binary.into(),
            fs,
        }
    }

    fn command(&self, args: &[String]) -> Command {
        let mut cmd = Command::new(&self.binary);
        cmd.args(args).kill_on_drop(true);
        cmd
    }

    /// Run to completion with captured output; non-zero exit is an error
    /// carrying stderr.
    async fn output(&self, args: Vec<String>) -> Result<String> {
        debug!(binary = %self.binary, ?args, "running engine command");
        let output = self
            .command(&args)
            .stdin(Stdio::null())
            .output()
            .await
            .with_context(|| format!("spawning `{} {}`", self.binary, args.join(" ")))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            bail!(
                "`{} {}` exited with {}: {}",
                self.binary,
                args.join(" "),
                output.status,
                stderr.trim()
            );
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    /// Run with inherited stdio, so output streams to the caller's terminal.
    async fn attached(&self, args: Vec<String>) -> Result<()> {
        debug!(binary = %self.binary, ?args, "running attached engine command");
        let status = self
            .command(&args)
            .stdin(Stdio::inherit())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .status()
            .await
            .with_context(|| format!("spawning `{} {}`", self.binary, args.join(" ")))?;

        if !status.success() {
            bail!("`{} {}` exited with {}", self.binary, args.join(" "), status);
        }
        Ok(())
    }
}

fn owned(args: &[&str]) -> Vec<String> {
    args.iter().map(|s| s.to_string()).collect()
}

/// Host path of an artifact source below `context`.
fn host_path(context: &str, source: &str) -> PathBuf {
    if source == "." || source.is_empty() {
        PathBuf::from(context)
    } else {
        Path::new(context).join(source)
    }
}

/// Container path of an artifact destination below `target_dir`.
fn container_path(target_dir: &str, destination: &str) -> String {
    let dir = target_dir.trim_end_matches('/');
    let dest = destination.trim_start_matches('/');
    match (dir.is_empty(), dest.is_empty()) {
        (true, true) => "/".to_string(),
        (true, false) => format!("/{dest}"),
        (false, true) => format!("{dir}/"),
        (false, false) => format!("{dir}/{dest}"),
    }
}

/// Last non-empty line of some command output.
pub fn last_line(output: &str) -> String {
    output
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .last()
        .unwrap_or_default()
        .to_string()
}

fn parse_time(s: &str) -> Result<Timestamp> {
    DateTime::parse_from_rfc3339(s.trim())
        .map(|t| t.with_timezone(&Utc))
        .with_context(|| format!("parsing engine timestamp '{}'", s.trim()))
}

pub(crate) fn parse_image_info(line: &str) -> Result<ImageInfo> {
    let mut parts = line.trim().splitn(3, '|');
    let (Some(created), Some(id), container) = (parts.next(), parts.next(), parts.next()) else {
        bail!("unexpected image inspect output '{}'", line.trim());
    };
    let container = container.map(str::trim).filter(|c| !c.is_empty()).map(str::to_string);
    Ok(ImageInfo {
        created: parse_time(created)?,
        id: id.trim().to_string(),
        container,
    })
}

pub(crate) fn parse_container_info(line: &str) -> Result<ContainerInfo> {
    let parts: Vec<&str> = line.trim().split('|').collect();
    let [running, created, name, exit_status] = parts.as_slice() else {
        bail!("unexpected container inspect output '{}'", line.trim());
    };
    Ok(ContainerInfo {
        running: running
            .trim()
            .parse()
            .with_context(|| format!("parsing running flag '{running}'"))?,
        created: parse_time(created)?,
        name: name.trim().trim_start_matches('/').to_string(),
        exit_status: exit_status
            .trim()
            .parse()
            .with_context(|| format!("parsing exit code '{exit_status}'"))?,
    })
}

fn is_missing_image(err: &anyhow::Error) -> bool {
    let msg = format!("{err:#}");
    msg.contains("No such image") || msg.contains("No such object")
}

impl ContainerEngine for DockerCli {
    fn build_image(&self, context: &str, tag: &str) -> EngineFuture<'_, ()> {
        let args = owned(&["build", "-t", tag, context]);
        Box::pin(async move {
            self.output(args).await?;
            Ok(())
        })
    }

    fn run_container(&self, detached: bool, args: Vec<String>) -> EngineFuture<'_, String> {
        let mut full = vec!["run".to_string()];
        if detached {
            full.push("-d".to_string());
        }
        full.extend(args);

        Box::pin(async move {
            if detached {
                let out = self.output(full).await?;
                Ok(last_line(&out))
            } else {
                self.attached(full).await?;
                Ok(String::new())
            }
        })
    }

    fn tag_image(&self, image: &str, force: bool, info: &TagInfo) -> EngineFuture<'_, ()> {
        let image = image.to_string();
        let reference = info.to_string();
        Box::pin(async move {
            // `docker tag` always moves an existing tag, so only the
            // non-forced case needs a check.
            if !force && self.inspect_image(&reference).await?.is_some() {
                bail!("tag {reference} already exists");
            }
            self.output(owned(&["tag", &image, &reference])).await?;
            Ok(())
        })
    }

    fn commit_container(&self, container: &str, info: &CommitInfo) -> EngineFuture<'_, String> {
        let mut args = vec!["commit".to_string()];
        if let Some(author) = &info.author {
            args.push("--author".to_string());
            args.push(author.clone());
        }
        args.push("--message".to_string());
        args.push(info.message.clone());
        args.push(container.to_string());

        Box::pin(async move {
            let out = self.output(args).await?;
            let id = last_line(&out);
            if id.is_empty() {
                bail!("commit printed no image id");
            }
            Ok(id)
        })
    }

    fn copy_into_container(
        &self,
        vars: &Vars,
        context: &str,
        target_dir: &str,
        artifacts: &[Artifact],
        dest: &str,
    ) -> EngineFuture<'_, ()> {
        let copies: Result<Vec<(PathBuf, String)>> = artifacts
            .iter()
            .map(|a| -> Result<(PathBuf, String)> {
                let source = expand(&a.source, vars)?;
                let destination = expand(&a.destination, vars)?;
                Ok((
                    host_path(context, &source),
                    format!("{dest}:{}", container_path(target_dir, &destination)),
                ))
            })
            .collect();

        Box::pin(async move {
            for (source, target) in copies? {
                let source = source.to_string_lossy().into_owned();
                self.output(owned(&["cp", &source, &target])).await?;
            }
            Ok(())
        })
    }

    fn last_modified_time(
        &self,
        vars: &Vars,
        context: &str,
        artifacts: &[Artifact],
    ) -> EngineFuture<'_, Option<Timestamp>> {
        let paths: Result<Vec<PathBuf>> = artifacts
            .iter()
            .map(|a| -> Result<PathBuf> { Ok(host_path(context, &expand(&a.source, vars)?)) })
            .collect();

        let fs = Arc::clone(&self.fs);

        Box::pin(async move {
            let paths = paths?;
            // Contexts can be large trees; keep the walk off the runtime threads.
            tokio::task::spawn_blocking(move || -> Result<Option<Timestamp>> {
                let mut newest: Option<Timestamp> = None;
                for path in paths {
                    match newest_mtime(fs.as_ref(), &path)? {
                        Some(t) => newest = Some(newest.map_or(t, |n| n.max(t))),
                        None => warn!(path = %path.display(), "artifact does not exist"),
                    }
                }
                Ok(newest)
            })
            .await
            .context("modification-time walk did not complete")?
        })
    }

    fn stop_container(&self, id: &str) -> EngineFuture<'_, ()> {
        let args = owned(&["stop", id]);
        Box::pin(async move {
            self.output(args).await?;
            Ok(())
        })
    }

    fn remove_container(&self, id: &str) -> EngineFuture<'_, ()> {
        let args = owned(&["rm", id]);
        Box::pin(async move {
            self.output(args).await?;
            Ok(())
        })
    }

    fn remove_image(&self, id: &str) -> EngineFuture<'_, ()> {
        let args = owned(&["rmi", id]);
        Box::pin(async move {
            self.output(args).await?;
            Ok(())
        })
    }

    fn inspect_image(&self, id: &str) -> EngineFuture<'_, Option<ImageInfo>> {
        let args = owned(&["image", "inspect", "--format", IMAGE_FORMAT, id]);
        Box::pin(async move {
            match self.output(args).await {
                Ok(out) => parse_image_info(&last_line(&out)).map(Some),
                Err(e) if is_missing_image(&e) => Ok(None),
                Err(e) => Err(e),
            }
        })
    }

    fn inspect_container(&self, id: &str) -> EngineFuture<'_, ContainerInfo> {
        let args = owned(&["container", "inspect", "--format", CONTAINER_FORMAT, id]);
        let id = id.to_string();
        Box::pin(async move {
            let out = self.output(args).await?;
            parse_container_info(&last_line(&out))
                .with_context(|| format!("inspecting container {id}"))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::mock::MockFileSystem;
    use chrono::TimeZone;

    #[test]
    fn last_line_skips_trailing_blank_lines() {
        assert_eq!(last_line("pulling...\nabc123\n\n"), "abc123");
        assert_eq!(last_line(""), "");
    }

    #[test]
    fn parses_image_inspect_output() {
        let info =
            parse_image_info("2024-03-01T10:00:00.123456789Z|sha256:abc|deadbeef\n").unwrap();
        assert_eq!(info.id, "sha256:abc");
        assert_eq!(info.container.as_deref(), Some("deadbeef"));
        assert_eq!(
            info.created,
            Utc.with_ymd_and_hms(2024, 3, 1, 10, 0, 0).unwrap()
                + chrono::Duration::nanoseconds(123_456_789)
        );

        let info = parse_image_info("2024-03-01T10:00:00Z|sha256:abc|").unwrap();
        assert_eq!(info.container, None);
    }

    #[test]
    fn parses_container_inspect_output() {
        let info = parse_container_info("true|2024-03-01T10:00:00Z|/mydb_c1|0").unwrap();
        assert!(info.running);
        assert_eq!(info.name, "mydb_c1");
        assert_eq!(info.exit_status, 0);

        assert!(parse_container_info("true|2024-03-01T10:00:00Z").is_err());
    }

    #[test]
    fn container_paths_join_cleanly() {
        assert_eq!(container_path("/", "bin/app"), "/bin/app");
        assert_eq!(container_path("/opt/app/", "/bin/app"), "/opt/app/bin/app");
        assert_eq!(container_path("/opt/app", ""), "/opt/app/");
        assert_eq!(container_path("/", ""), "/");
    }

    #[tokio::test]
    async fn last_modified_time_expands_vars_and_skips_missing() {
        let t = |d| Utc.with_ymd_and_hms(2024, 1, d, 0, 0, 0).unwrap();
        let fs = MockFileSystem::new();
        fs.add_file_at("out/release/app", "bin", t(4));
        fs.add_file_at("out/release/lib.so", "lib", t(9));
        fs.add_file_at("out/debug/app", "bin", t(20));

        let docker = DockerCli::with_fs("docker", Arc::new(fs));
        let vars: Vars = [("PROFILE".to_string(), "release".to_string())].into();

        let newest = docker
            .last_modified_time(
                &vars,
                "out",
                &[Artifact::source_only("${PROFILE}"), Artifact::source_only("missing")],
            )
            .await
            .unwrap();
        assert_eq!(newest, Some(t(9)));

        let err = docker
            .last_modified_time(&Vars::new(), "out", &[Artifact::source_only("${PROFILE}")])
            .await
            .unwrap_err();
        assert!(err.to_string().contains("PROFILE"));
    }
}
