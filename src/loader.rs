use std::{
    collections::HashMap,
    path::{Path, PathBuf},
    sync::{Arc, Mutex},
};

use crate::texture::{Texture, TextureError};

type Slot = Arc<Mutex<Option<Result<Texture, TextureError>>>>;

/// Decodes textures on background workers.
pub struct Loader {
    choir: Arc<choir::Choir>,
    _workers: Vec<choir::WorkerHandle>,
}

impl Loader {
    pub fn new(worker_count: usize) -> Self {
        let choir = choir::Choir::new();
        let workers = (0..worker_count.max(1))
            .map(|i| choir.add_worker(&format!("loader-{}", i)))
            .collect();
        Self {
            choir,
            _workers: workers,
        }
    }

    pub fn request(&self, path: &Path) -> Request {
        log::info!("Loading texture {:?}", path);
        let slot = Slot::default();
        let task_slot = Arc::clone(&slot);
        let task_path = path.to_path_buf();
        let task = self
            .choir
            .spawn(format!("load {}", path.display()))
            .init(move |_| {
                let result = Texture::load_png(&task_path);
                if let Ok(mut guard) = task_slot.lock() {
                    *guard = Some(result);
                }
            })
            .run();
        Request {
            path: path.to_path_buf(),
            slot,
            task: Some(task),
        }
    }
}

/// A texture that is being decoded.
pub struct Request {
    path: PathBuf,
    slot: Slot,
    task: Option<choir::RunningTask>,
}

impl Request {
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Takes the result if the task has finished.
    fn take(&mut self) -> Option<Result<Texture, TextureError>> {
        let result = self.slot.lock().ok()?.take();
        if result.is_some() {
            self.task = None;
        }
        result
    }

    fn join(&mut self) {
        if let Some(task) = self.task.take() {
            task.join();
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SuspenseState {
    Loading,
    Loaded,
    Failed,
}

/// Holds back a subtree until all of its textures are available.
///
/// Transitions are one-way: `Loading` becomes `Loaded` once every request
/// resolved, or `Failed` as soon as one of them fails. There is no retry.
pub struct Suspense {
    requests: Vec<Request>,
    textures: HashMap<PathBuf, Arc<Texture>>,
    state: SuspenseState,
}

impl Suspense {
    pub fn new<'a>(loader: &Loader, paths: impl IntoIterator<Item = &'a Path>) -> Self {
        let mut requests: Vec<Request> = Vec::new();
        for path in paths {
            if requests.iter().all(|r| r.path() != path) {
                requests.push(loader.request(path));
            }
        }
        // results are only picked up by `poll`, even if already decoded
        let state = if requests.is_empty() {
            SuspenseState::Loaded
        } else {
            SuspenseState::Loading
        };
        Self {
            requests,
            textures: HashMap::new(),
            state,
        }
    }

    pub fn state(&self) -> SuspenseState {
        self.state
    }

    pub fn poll(&mut self) -> SuspenseState {
        if self.state != SuspenseState::Loading {
            return self.state;
        }
        let mut pending = Vec::with_capacity(self.requests.len());
        for mut request in self.requests.drain(..) {
            match request.take() {
                Some(Ok(texture)) => {
                    self.textures.insert(request.path, Arc::new(texture));
                }
                Some(Err(e)) => {
                    log::error!("Suspended subtree will not show: {}", e);
                    self.state = SuspenseState::Failed;
                }
                None => pending.push(request),
            }
        }
        self.requests = pending;
        if self.state == SuspenseState::Loading && self.requests.is_empty() {
            log::debug!("Suspended subtree resolved {} texture(s)", self.textures.len());
            self.state = SuspenseState::Loaded;
        }
        self.state
    }

    /// Blocks until every request finished, then polls.
    pub fn wait(&mut self) -> SuspenseState {
        for request in self.requests.iter_mut() {
            request.join();
        }
        self.poll()
    }

    pub fn texture(&self, path: &Path) -> Option<Arc<Texture>> {
        self.textures.get(path).cloned()
    }
}
