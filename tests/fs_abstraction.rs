// tests/fs_abstraction.rs

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc, Mutex};
use std::time::Duration;

use anyhow::Result;
use chrono::{TimeZone, Utc};

use layerdag::exec::{ContainerEngine, DockerCli};
use layerdag::fs::mock::MockFileSystem;
use layerdag::fs::{newest_mtime, FileSystem, RealFileSystem};
use layerdag::types::{Artifact, Timestamp, Vars};
use layerdag_test_utils::with_timeout;

/// Filesystem whose first lookup waits until the test lets it proceed.
///
/// The signal comes from another task on the same single-threaded runtime,
/// so the lookup can only finish if it runs off the runtime thread.
#[derive(Debug)]
struct GatedFileSystem {
    inner: MockFileSystem,
    gate: Mutex<mpsc::Receiver<()>>,
    opened: AtomicBool,
}

impl GatedFileSystem {
    fn wait_for_gate(&self) {
        if !self.opened.swap(true, Ordering::SeqCst) {
            self.gate
                .lock()
                .unwrap()
                .recv_timeout(Duration::from_secs(2))
                .expect("walk ran on the runtime thread and starved the task holding the gate");
        }
    }
}

impl FileSystem for GatedFileSystem {
    fn exists(&self, path: &Path) -> bool {
        self.wait_for_gate();
        self.inner.exists(path)
    }

    fn is_dir(&self, path: &Path) -> bool {
        self.inner.is_dir(path)
    }

    fn modified(&self, path: &Path) -> Result<Timestamp> {
        self.inner.modified(path)
    }

    fn read_dir(&self, path: &Path) -> Result<Vec<PathBuf>> {
        self.inner.read_dir(path)
    }
}

#[tokio::test]
async fn docker_mtime_queries_go_through_the_filesystem() {
    let t = |h| Utc.with_ymd_and_hms(2024, 5, 1, h, 0, 0).unwrap();
    let mock = MockFileSystem::new();
    mock.add_file("web/Dockerfile", "FROM scratch");
    mock.add_file_at("web/src/main.rs", "fn main() {}", t(8));
    let mock_handle = mock.clone();

    let docker = DockerCli::with_fs("docker", Arc::new(mock));
    let inputs = [Artifact::source_only(".")];

    let before = docker
        .last_modified_time(&Vars::new(), "web", &inputs)
        .await
        .unwrap();
    assert_eq!(before, Some(t(8)));

    mock_handle.touch("web/Dockerfile", t(11));
    let after = docker
        .last_modified_time(&Vars::new(), "web", &inputs)
        .await
        .unwrap();
    assert_eq!(after, Some(t(11)));

    let nothing = docker
        .last_modified_time(&Vars::new(), "elsewhere", &inputs)
        .await
        .unwrap();
    assert_eq!(nothing, None);
}

#[test]
fn real_filesystem_reports_directory_tree_mtime() {
    let dir = tempfile::tempdir().unwrap();
    fs::create_dir_all(dir.path().join("ctx/nested")).unwrap();
    fs::write(dir.path().join("ctx/nested/file.txt"), "hello").unwrap();

    let fs = RealFileSystem;
    let root = dir.path().join("ctx");
    assert!(fs.is_dir(&root));

    let newest = newest_mtime(&fs, &root).unwrap().expect("directory exists");
    let file_mtime = fs.modified(&root.join("nested/file.txt")).unwrap();
    assert!(newest >= file_mtime);

    assert_eq!(newest_mtime(&fs, Path::new("/definitely/not/here")).unwrap(), None);
}

#[tokio::test]
async fn mtime_walk_runs_off_the_runtime_thread() {
    let t = Utc.with_ymd_and_hms(2024, 5, 1, 9, 0, 0).unwrap();
    let inner = MockFileSystem::new();
    inner.add_file_at("ctx/big/tree.bin", "data", t);

    let (open, gate) = mpsc::channel();
    let fs = GatedFileSystem {
        inner,
        gate: Mutex::new(gate),
        opened: AtomicBool::new(false),
    };
    let docker = DockerCli::with_fs("docker", Arc::new(fs));

    let opener = tokio::spawn(async move {
        open.send(()).unwrap();
    });

    let newest = with_timeout(docker.last_modified_time(
        &Vars::new(),
        "ctx",
        &[Artifact::source_only(".")],
    ))
    .await
    .unwrap();
    opener.await.unwrap();

    assert_eq!(newest, Some(t));
}
