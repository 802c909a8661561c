use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use anyhow::{anyhow, bail, Result};
use chrono::{Duration, TimeZone, Utc};
use layerdag::exec::{
    CommitInfo, ContainerEngine, ContainerInfo, EngineFuture, ImageInfo, TagInfo,
};
use layerdag::types::{Artifact, Timestamp, Vars};

/// One recorded call on the [`FakeEngine`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineCall {
    BuildImage { context: String, tag: String },
    RunContainer { detached: bool, args: Vec<String> },
    TagImage { image: String, force: bool, reference: String },
    CommitContainer { container: String },
    CopyIntoContainer { context: String, target_dir: String, dest: String, artifacts: Vec<Artifact> },
    LastModifiedTime { context: String },
    StopContainer(String),
    RemoveContainer(String),
    RemoveImage(String),
    InspectImage(String),
    InspectContainer(String),
}

impl EngineCall {
    /// Whether the call changes engine state (as opposed to a query).
    pub fn is_mutation(&self) -> bool {
        !matches!(
            self,
            EngineCall::LastModifiedTime { .. }
                | EngineCall::InspectImage(_)
                | EngineCall::InspectContainer(_)
        )
    }

    /// Whether the call builds or commits an image.
    pub fn is_build(&self) -> bool {
        matches!(
            self,
            EngineCall::BuildImage { .. } | EngineCall::CommitContainer { .. }
        )
    }
}

#[derive(Debug)]
struct FakeState {
    now: Timestamp,
    counter: u64,
    calls: Vec<EngineCall>,
    /// Keyed by normalised reference (`repo:tag` or id).
    images: HashMap<String, ImageInfo>,
    containers: HashMap<String, ContainerInfo>,
    modified: HashMap<String, Timestamp>,
    /// Image → (container id, container name) for detached runs.
    run_as: HashMap<String, (String, String)>,
    /// (operation, key) pairs that fail; key `*` matches anything.
    failures: HashSet<(String, String)>,
    /// Tags whose rebuilds are served from cache and keep the old image.
    cached: HashSet<String>,
}

/// In-memory container engine.
///
/// - records every call, in order
/// - keeps images and containers in maps, stamped by a fake clock that
///   advances one minute per build, commit or run
/// - can be told to fail specific operations
#[derive(Debug, Clone)]
pub struct FakeEngine {
    state: Arc<Mutex<FakeState>>,
}

fn normalise(reference: &str) -> String {
    reference
        .parse::<TagInfo>()
        .map(|t| t.to_string())
        .unwrap_or_else(|_| reference.to_string())
}

/// The image argument of a `run` invocation: the first argument that is
/// neither `--link` nor its value.
fn image_arg(args: &[String]) -> String {
    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        if arg == "--link" {
            iter.next();
            continue;
        }
        return arg.clone();
    }
    String::new()
}

impl Default for FakeEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeEngine {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(FakeState {
                now: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
                counter: 0,
                calls: Vec::new(),
                images: HashMap::new(),
                containers: HashMap::new(),
                modified: HashMap::new(),
                run_as: HashMap::new(),
                failures: HashSet::new(),
                cached: HashSet::new(),
            })),
        }
    }

    /// Current time of the fake clock.
    pub fn now(&self) -> Timestamp {
        self.state.lock().unwrap().now
    }

    /// Move the fake clock forward.
    pub fn advance(&self, minutes: i64) -> Timestamp {
        let mut s = self.state.lock().unwrap();
        s.now += Duration::minutes(minutes);
        s.now
    }

    /// Pretend an image with this tag already exists.
    pub fn add_image(&self, tag: &str, created: Timestamp) {
        let mut s = self.state.lock().unwrap();
        s.counter += 1;
        let id = format!("sha256:pre{}", s.counter);
        s.images.insert(
            normalise(tag),
            ImageInfo {
                created,
                id,
                container: None,
            },
        );
    }

    pub fn has_image(&self, tag: &str) -> bool {
        self.state.lock().unwrap().images.contains_key(&normalise(tag))
    }

    pub fn image(&self, tag: &str) -> Option<ImageInfo> {
        self.state.lock().unwrap().images.get(&normalise(tag)).cloned()
    }

    /// Set the modification time reported for a context directory.
    pub fn set_modified(&self, context: &str, at: Timestamp) {
        self.state
            .lock()
            .unwrap()
            .modified
            .insert(context.to_string(), at);
    }

    /// Detached runs of `image` return `id`, and inspecting `id` yields `name`.
    pub fn run_as(&self, image: &str, id: &str, name: &str) {
        self.state
            .lock()
            .unwrap()
            .run_as
            .insert(image.to_string(), (id.to_string(), name.to_string()));
    }

    /// Rebuilding `tag` leaves an existing image untouched, like a docker
    /// build where every layer is a cache hit.
    pub fn cache_builds(&self, tag: &str) {
        self.state.lock().unwrap().cached.insert(normalise(tag));
    }

    /// Make `op` fail for `key` (`*` for any key).
    ///
    /// `op` is the trait method name, e.g. `"build_image"`; `key` is the tag,
    /// image, container or context the call is about.
    pub fn fail_on(&self, op: &str, key: &str) {
        self.state
            .lock()
            .unwrap()
            .failures
            .insert((op.to_string(), key.to_string()));
    }

    pub fn calls(&self) -> Vec<EngineCall> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn clear_calls(&self) {
        self.state.lock().unwrap().calls.clear();
    }

    /// Containers currently known to the engine.
    pub fn containers(&self) -> Vec<String> {
        let mut ids: Vec<String> = self
            .state
            .lock()
            .unwrap()
            .containers
            .keys()
            .cloned()
            .collect();
        ids.sort();
        ids
    }

    /// Record a call, then either fail it or apply `f` to the state.
    fn call<T: Send + 'static>(
        &self,
        call: EngineCall,
        op: &str,
        key: &str,
        f: impl FnOnce(&mut FakeState) -> Result<T>,
    ) -> EngineFuture<'_, T> {
        let result = {
            let mut s = self.state.lock().unwrap();
            s.calls.push(call);
            let failing = s.failures.contains(&(op.to_string(), key.to_string()))
                || s.failures.contains(&(op.to_string(), "*".to_string()));
            if failing {
                Err(anyhow!("injected failure: {op} {key}"))
            } else {
                f(&mut *s)
            }
        };
        Box::pin(std::future::ready(result))
    }
}

fn tick(s: &mut FakeState) -> (Timestamp, u64) {
    s.now += Duration::minutes(1);
    s.counter += 1;
    (s.now, s.counter)
}

impl ContainerEngine for FakeEngine {
    fn build_image(&self, context: &str, tag: &str) -> EngineFuture<'_, ()> {
        let call = EngineCall::BuildImage {
            context: context.to_string(),
            tag: tag.to_string(),
        };
        let key = normalise(tag);
        self.call(call, "build_image", tag, move |s| {
            if s.cached.contains(&key) && s.images.contains_key(&key) {
                return Ok(());
            }
            let (now, n) = tick(s);
            s.images.insert(
                key,
                ImageInfo {
                    created: now,
                    id: format!("sha256:build{n}"),
                    container: None,
                },
            );
            Ok(())
        })
    }

    fn run_container(&self, detached: bool, args: Vec<String>) -> EngineFuture<'_, String> {
        let image = image_arg(&args);
        let call = EngineCall::RunContainer { detached, args };
        self.call(call, "run_container", &image.clone(), move |s| {
            let (now, n) = tick(s);
            if !detached {
                return Ok(String::new());
            }
            let (id, name) = s
                .run_as
                .get(&image)
                .cloned()
                .unwrap_or_else(|| (format!("c{n}"), format!("{}_c{n}", image.replace(['/', ':'], "_"))));
            s.containers.insert(
                id.clone(),
                ContainerInfo {
                    running: true,
                    created: now,
                    name,
                    exit_status: 0,
                },
            );
            Ok(id)
        })
    }

    fn tag_image(&self, image: &str, force: bool, info: &TagInfo) -> EngineFuture<'_, ()> {
        let reference = info.to_string();
        let call = EngineCall::TagImage {
            image: image.to_string(),
            force,
            reference: reference.clone(),
        };
        let source = image.to_string();
        self.call(call, "tag_image", &reference.clone(), move |s| {
            if !force && s.images.contains_key(&reference) {
                bail!("tag {reference} already exists");
            }
            let found = s
                .images
                .values()
                .find(|i| i.id == source)
                .or_else(|| s.images.get(&normalise(&source)))
                .cloned()
                .ok_or_else(|| anyhow!("No such image: {source}"))?;
            s.images.insert(reference, found);
            Ok(())
        })
    }

    fn commit_container(&self, container: &str, _info: &CommitInfo) -> EngineFuture<'_, String> {
        let call = EngineCall::CommitContainer {
            container: container.to_string(),
        };
        let container = container.to_string();
        self.call(call, "commit_container", &container.clone(), move |s| {
            if !s.containers.contains_key(&container) {
                bail!("No such container: {container}");
            }
            let (now, n) = tick(s);
            let id = format!("sha256:commit{n}");
            s.images.insert(
                normalise(&id),
                ImageInfo {
                    created: now,
                    id: id.clone(),
                    container: Some(container),
                },
            );
            Ok(id)
        })
    }

    fn copy_into_container(
        &self,
        _vars: &Vars,
        context: &str,
        target_dir: &str,
        artifacts: &[Artifact],
        dest: &str,
    ) -> EngineFuture<'_, ()> {
        let call = EngineCall::CopyIntoContainer {
            context: context.to_string(),
            target_dir: target_dir.to_string(),
            dest: dest.to_string(),
            artifacts: artifacts.to_vec(),
        };
        let dest = dest.to_string();
        self.call(call, "copy_into_container", context, move |s| {
            if !s.containers.contains_key(&dest) {
                bail!("No such container: {dest}");
            }
            Ok(())
        })
    }

    fn last_modified_time(
        &self,
        _vars: &Vars,
        context: &str,
        _artifacts: &[Artifact],
    ) -> EngineFuture<'_, Option<Timestamp>> {
        let call = EngineCall::LastModifiedTime {
            context: context.to_string(),
        };
        let context = context.to_string();
        self.call(call, "last_modified_time", &context.clone(), move |s| {
            Ok(s.modified.get(&context).copied())
        })
    }

    fn stop_container(&self, id: &str) -> EngineFuture<'_, ()> {
        let id = id.to_string();
        self.call(EngineCall::StopContainer(id.clone()), "stop_container", &id.clone(), move |s| {
            let c = s
                .containers
                .get_mut(&id)
                .ok_or_else(|| anyhow!("No such container: {id}"))?;
            c.running = false;
            Ok(())
        })
    }

    fn remove_container(&self, id: &str) -> EngineFuture<'_, ()> {
        let id = id.to_string();
        self.call(EngineCall::RemoveContainer(id.clone()), "remove_container", &id.clone(), move |s| {
            s.containers
                .remove(&id)
                .map(|_| ())
                .ok_or_else(|| anyhow!("No such container: {id}"))
        })
    }

    fn remove_image(&self, id: &str) -> EngineFuture<'_, ()> {
        let id = id.to_string();
        self.call(EngineCall::RemoveImage(id.clone()), "remove_image", &id.clone(), move |s| {
            s.images
                .remove(&normalise(&id))
                .map(|_| ())
                .ok_or_else(|| anyhow!("No such image: {id}"))
        })
    }

    fn inspect_image(&self, id: &str) -> EngineFuture<'_, Option<ImageInfo>> {
        let id = id.to_string();
        self.call(EngineCall::InspectImage(id.clone()), "inspect_image", &id.clone(), move |s| {
            Ok(s.images.get(&normalise(&id)).cloned())
        })
    }

    fn inspect_container(&self, id: &str) -> EngineFuture<'_, ContainerInfo> {
        let id = id.to_string();
        self.call(
            EngineCall::InspectContainer(id.clone()),
            "inspect_container",
            &id.clone(),
            move |s| {
                s.containers
                    .get(&id)
                    .cloned()
                    .ok_or_else(|| anyhow!("No such container: {id}"))
            },
        )
    }
}
