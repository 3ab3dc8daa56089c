//! Scene encoding on a dedicated background thread.
//!
//! Requests carry an owned clone of the scene; meshes, materials and
//! textures are shared `Arc`s so the clone is shallow. Replies stream back
//! on a per-request channel: any number of progress fractions, then
//! exactly one result.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam_channel::{Receiver, Sender, TryRecvError};
use lux_core::Scene;

use crate::encoder::{generate_with_cancel, GenerateOptions, GeneratedScene};
use crate::error::{EncodeError, EncodeResult};
use crate::progress::ProgressFn;

const WORKER_NAME: &str = "lux-scene-encoder";

struct Request {
    scene: Scene,
    options: GenerateOptions,
    reply: Sender<Reply>,
}

enum Reply {
    Progress(f32),
    Done(EncodeResult<GeneratedScene>),
}

/// Handle to an encode running on the worker.
pub struct GenerateTask {
    replies: Receiver<Reply>,
    on_progress: Option<ProgressFn>,
}

impl GenerateTask {
    fn resolved(result: EncodeResult<GeneratedScene>) -> Self {
        let (reply, replies) = crossbeam_channel::bounded(1);
        // The receiver is alive, so this cannot fail
        let _ = reply.send(Reply::Done(result));
        Self {
            replies,
            on_progress: None,
        }
    }

    fn forward(&self, fraction: f32) {
        if let Some(on_progress) = &self.on_progress {
            on_progress(fraction);
        }
    }

    /// Block until the encode finishes, forwarding progress on this thread.
    pub fn wait(self) -> EncodeResult<GeneratedScene> {
        loop {
            match self.replies.recv() {
                Ok(Reply::Progress(fraction)) => self.forward(fraction),
                Ok(Reply::Done(result)) => return result,
                Err(_) => return Err(EncodeError::WorkerDisconnected),
            }
        }
    }

    /// Poll for the result without blocking.
    ///
    /// Returns `Some` once; the task is spent afterwards.
    pub fn try_result(&mut self) -> Option<EncodeResult<GeneratedScene>> {
        loop {
            match self.replies.try_recv() {
                Ok(Reply::Progress(fraction)) => self.forward(fraction),
                Ok(Reply::Done(result)) => return Some(result),
                Err(TryRecvError::Empty) => return None,
                Err(TryRecvError::Disconnected) => return Some(Err(EncodeError::WorkerDisconnected)),
            }
        }
    }
}

/// A [`crate::SceneEncoder`] that runs on a background thread.
pub struct WorkerSceneEncoder {
    requests: Option<Sender<Request>>,
    handle: Option<JoinHandle<()>>,
    cancel: Arc<AtomicBool>,
}

impl WorkerSceneEncoder {
    /// Spawn the worker thread.
    pub fn new() -> EncodeResult<Self> {
        let (requests, inbox) = crossbeam_channel::unbounded::<Request>();
        let cancel = Arc::new(AtomicBool::new(false));
        let handle = thread::Builder::new().name(WORKER_NAME.to_string()).spawn({
            let cancel = cancel.clone();
            move || run(inbox, cancel)
        })?;
        log::debug!("Started {}", WORKER_NAME);

        Ok(Self {
            requests: Some(requests),
            handle: Some(handle),
            cancel,
        })
    }

    /// Queue an encode of a snapshot of `scene`.
    ///
    /// Progress is delivered to `options.on_progress` from
    /// [`GenerateTask::wait`] or [`GenerateTask::try_result`], on the
    /// calling thread.
    pub fn generate(&self, scene: &Scene, options: &GenerateOptions) -> GenerateTask {
        let Some(requests) = &self.requests else {
            return GenerateTask::resolved(Err(EncodeError::Disposed));
        };

        let (reply, replies) = crossbeam_channel::unbounded();
        let request = Request {
            scene: scene.clone(),
            options: GenerateOptions {
                bvh: options.bvh,
                on_progress: None,
            },
            reply,
        };
        if requests.send(request).is_err() {
            return GenerateTask::resolved(Err(EncodeError::WorkerDisconnected));
        }

        GenerateTask {
            replies,
            on_progress: options.on_progress.clone(),
        }
    }

    pub fn is_disposed(&self) -> bool {
        self.requests.is_none()
    }

    /// Cancel pending work and stop the worker.
    ///
    /// Outstanding tasks resolve to [`EncodeError::Disposed`]. Safe to call
    /// more than once.
    pub fn dispose(&mut self) {
        self.cancel.store(true, Ordering::Relaxed);
        self.requests.take();
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                log::error!("{} panicked", WORKER_NAME);
            }
            log::debug!("Stopped {}", WORKER_NAME);
        }
    }
}

impl Drop for WorkerSceneEncoder {
    fn drop(&mut self) {
        self.dispose();
    }
}

fn run(inbox: Receiver<Request>, cancel: Arc<AtomicBool>) {
    for Request {
        scene,
        mut options,
        reply,
    } in inbox.iter()
    {
        if cancel.load(Ordering::Relaxed) {
            let _ = reply.send(Reply::Done(Err(EncodeError::Disposed)));
            continue;
        }

        let progress = reply.clone();
        options.on_progress = Some(Arc::new(move |fraction: f32| {
            let _ = progress.send(Reply::Progress(fraction));
        }));

        let result = match generate_with_cancel(&scene, &options, &cancel) {
            Err(EncodeError::Cancelled) => Err(EncodeError::Disposed),
            other => other,
        };
        // The task may have been dropped; nobody is waiting then
        let _ = reply.send(Reply::Done(result));
    }
}
