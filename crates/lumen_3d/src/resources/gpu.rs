//! Lazily uploaded GPU handles and deferred deletion
//!
//! Resources are created on any thread but GPU objects may only be created
//! and destroyed on the render thread. A [`GpuResource`] uploads on first use
//! from the render thread; releasing it (explicitly or on drop) posts a
//! [`DeletionTask`] that the render thread applies on its next frame.

use crossbeam_channel::{unbounded, Receiver, Sender};
use parking_lot::Mutex;
use std::fmt;

/// Opaque backend handle
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct GpuId(pub u32);

/// What kind of GPU object a handle refers to
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    Mesh,
    Texture,
    Cubemap,
    Lightmap,
}

/// A pending deletion of a GPU object
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DeletionTask {
    pub kind: ResourceKind,
    pub id: GpuId,
}

/// Cloneable handle used to post deletions from any thread
#[derive(Clone, Debug)]
pub struct DeletionSender {
    sender: Sender<DeletionTask>,
}

impl DeletionSender {
    fn post(&self, task: DeletionTask) {
        // The queue outliving its senders is the normal shutdown path; a
        // closed queue means the GPU context is already gone.
        if self.sender.send(task).is_err() {
            tracing::trace!(?task, "deletion queue closed, dropping task");
        }
    }
}

/// Render-thread side of deferred deletion
pub struct DeletionQueue {
    sender: Sender<DeletionTask>,
    receiver: Receiver<DeletionTask>,
}

impl Default for DeletionQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl DeletionQueue {
    pub fn new() -> Self {
        let (sender, receiver) = unbounded();
        Self { sender, receiver }
    }

    /// Handle for resources to post deletions through
    pub fn sender(&self) -> DeletionSender {
        DeletionSender {
            sender: self.sender.clone(),
        }
    }

    /// Number of deletions waiting to be applied
    pub fn pending(&self) -> usize {
        self.receiver.len()
    }

    /// Apply every pending deletion; call on the render thread
    ///
    /// Returns the number of tasks applied.
    pub fn apply(&self, mut delete: impl FnMut(DeletionTask)) -> usize {
        let mut applied = 0;
        for task in self.receiver.try_iter() {
            delete(task);
            applied += 1;
        }
        if applied > 0 {
            tracing::trace!(applied, "applied GPU deletions");
        }
        applied
    }
}

struct Uploaded {
    id: GpuId,
    deleter: DeletionSender,
}

/// A GPU object created on first use and deleted exactly once
pub struct GpuResource {
    kind: ResourceKind,
    state: Mutex<Option<Uploaded>>,
}

impl fmt::Debug for GpuResource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GpuResource")
            .field("kind", &self.kind)
            .field("id", &self.id())
            .finish()
    }
}

impl GpuResource {
    pub fn new(kind: ResourceKind) -> Self {
        Self {
            kind,
            state: Mutex::new(None),
        }
    }

    pub fn kind(&self) -> ResourceKind {
        self.kind
    }

    /// Current handle, if uploaded
    pub fn id(&self) -> Option<GpuId> {
        self.state.lock().as_ref().map(|u| u.id)
    }

    pub fn is_uploaded(&self) -> bool {
        self.state.lock().is_some()
    }

    /// Return the cached handle, uploading first if needed
    ///
    /// `upload` runs at most once per upload cycle. The deleter is remembered
    /// so a later release reaches the queue of the context that created it.
    pub fn get_or_upload(&self, deleter: &DeletionSender, upload: impl FnOnce() -> GpuId) -> GpuId {
        let mut state = self.state.lock();
        if let Some(uploaded) = state.as_ref() {
            return uploaded.id;
        }
        let id = upload();
        *state = Some(Uploaded {
            id,
            deleter: deleter.clone(),
        });
        id
    }

    /// Schedule deletion of the GPU object
    ///
    /// Returns true when a deletion was posted. Releasing a resource that
    /// was never uploaded, or was already released, posts nothing. A
    /// released resource uploads again on its next use.
    pub fn release(&self) -> bool {
        let taken = self.state.lock().take();
        match taken {
            Some(uploaded) => {
                uploaded.deleter.post(DeletionTask {
                    kind: self.kind,
                    id: uploaded.id,
                });
                true
            }
            None => false,
        }
    }
}

impl Drop for GpuResource {
    fn drop(&mut self) {
        self.release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_upload_runs_once() {
        let queue = DeletionQueue::new();
        let resource = GpuResource::new(ResourceKind::Mesh);
        let mut uploads = 0;

        let a = resource.get_or_upload(&queue.sender(), || {
            uploads += 1;
            GpuId(7)
        });
        let b = resource.get_or_upload(&queue.sender(), || {
            uploads += 1;
            GpuId(8)
        });

        assert_eq!(a, GpuId(7));
        assert_eq!(b, GpuId(7));
        assert_eq!(uploads, 1);
    }

    #[test]
    fn test_release_posts_exactly_once() {
        let queue = DeletionQueue::new();
        let resource = GpuResource::new(ResourceKind::Texture);
        resource.get_or_upload(&queue.sender(), || GpuId(3));

        assert!(resource.release());
        assert!(!resource.release());
        drop(resource);

        let mut deleted = Vec::new();
        assert_eq!(queue.apply(|task| deleted.push(task)), 1);
        assert_eq!(
            deleted,
            vec![DeletionTask {
                kind: ResourceKind::Texture,
                id: GpuId(3)
            }]
        );
    }

    #[test]
    fn test_drop_releases() {
        let queue = DeletionQueue::new();
        {
            let resource = GpuResource::new(ResourceKind::Cubemap);
            resource.get_or_upload(&queue.sender(), || GpuId(1));
        }
        assert_eq!(queue.pending(), 1);
    }

    #[test]
    fn test_never_uploaded_posts_nothing() {
        let queue = DeletionQueue::new();
        drop(GpuResource::new(ResourceKind::Lightmap));
        assert_eq!(queue.apply(|_| {}), 0);
    }
}
