//! Shared node ownership for signal and computed handles.

use std::rc::{Rc, Weak};

use super::runtime::RuntimeInner;
use crate::error::{ReactiveError, Result};
use crate::graph::NodeId;

/// Owner of one graph node. Every clone of a [`Signal`](crate::Signal) or
/// [`Computed`](crate::Computed) shares one `NodeRef`; when the last clone
/// goes away the node is released from the graph.
pub(crate) struct NodeRef {
    runtime: Weak<RuntimeInner>,
    id: NodeId,
}

impl NodeRef {
    pub(crate) fn new(runtime: &Rc<RuntimeInner>, id: NodeId) -> Rc<Self> {
        Rc::new(Self {
            runtime: Rc::downgrade(runtime),
            id,
        })
    }

    pub(crate) fn id(&self) -> NodeId {
        self.id
    }

    pub(crate) fn runtime(&self) -> Result<Rc<RuntimeInner>> {
        self.runtime.upgrade().ok_or(ReactiveError::RuntimeDropped)
    }
}

impl Drop for NodeRef {
    fn drop(&mut self) {
        if let Some(runtime) = self.runtime.upgrade() {
            runtime.release(self.id);
        }
    }
}
