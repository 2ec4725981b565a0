//! Objects requested for drawing this frame

use crate::scene::SharedObject;
use crossbeam_channel::{unbounded, Receiver, Sender};

/// Cloneable producer side of a [`RenderQueue`]
#[derive(Clone)]
pub struct RenderSubmitter {
    sender: Sender<SharedObject>,
}

impl RenderSubmitter {
    /// Request that an object is drawn next frame
    pub fn submit(&self, object: &SharedObject) {
        // The receiver lives in the queue, which outlives every submitter it
        // hands out unless the renderer was dropped.
        let _ = self.sender.send(object.clone());
    }
}

/// Multi-producer queue drained by the render thread once per frame
pub struct RenderQueue {
    sender: Sender<SharedObject>,
    receiver: Receiver<SharedObject>,
}

impl Default for RenderQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl RenderQueue {
    pub fn new() -> Self {
        let (sender, receiver) = unbounded();
        Self { sender, receiver }
    }

    /// Handle for other threads to submit objects through
    pub fn submitter(&self) -> RenderSubmitter {
        RenderSubmitter {
            sender: self.sender.clone(),
        }
    }

    pub fn submit(&self, object: &SharedObject) {
        let _ = self.sender.send(object.clone());
    }

    /// Number of objects waiting
    pub fn len(&self) -> usize {
        self.receiver.len()
    }

    pub fn is_empty(&self) -> bool {
        self.receiver.is_empty()
    }

    /// Take everything queued so far, leaving the queue empty
    pub fn drain(&self) -> Vec<SharedObject> {
        self.receiver.try_iter().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::{RenderObject, SceneBuilder};
    use glam::Mat4;
    use std::sync::Arc;

    fn object() -> SharedObject {
        let mut builder = SceneBuilder::new();
        let root = builder.node("root", Mat4::IDENTITY, &[], &[]).unwrap();
        let model = Arc::new(builder.build("empty", root, vec![]).unwrap());
        RenderObject::new(model).into_shared()
    }

    #[test]
    fn test_drain_empties_queue() {
        let queue = RenderQueue::new();
        let submitter = queue.submitter();
        let a = object();

        let handle = std::thread::spawn(move || submitter.submit(&a));
        handle.join().unwrap();
        queue.submit(&object());

        assert_eq!(queue.len(), 2);
        assert_eq!(queue.drain().len(), 2);
        assert!(queue.is_empty());
        assert!(queue.drain().is_empty());
    }
}
