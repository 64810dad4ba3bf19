//! Node context injection
//!
//! Thread-local storage for the node and application role currently being
//! simulated, so every span opened while handling an event carries them.

use std::cell::RefCell;

use icens_core::{AppRole, NodeId};
use uuid::Uuid;

/// Node context data stored in thread-local storage
#[derive(Debug, Clone)]
pub struct NodeContextData {
    /// The node's identity as a string
    pub node_id: String,
    /// Which application on the node is acting
    pub role: AppRole,
    /// Unique instance ID for this application session
    pub instance_id: Uuid,
}

thread_local! {
    static NODE_CONTEXT: RefCell<Option<NodeContextData>> = const { RefCell::new(None) };
}

/// RAII guard for node context
///
/// Sets the node context for the current thread; restores the previous
/// context (if any) when dropped.
///
/// ```ignore
/// use icens_core::{AppRole, NodeId};
/// use icens_logging::context::NodeContextGuard;
///
/// let _guard = NodeContextGuard::new(NodeId::new(0), AppRole::Producer);
/// tracing::info!("emitting");
/// ```
pub struct NodeContextGuard {
    previous: Option<NodeContextData>,
}

impl NodeContextGuard {
    pub fn new(node: NodeId, role: AppRole) -> Self {
        Self::with_instance_id(node, role, Uuid::new_v4())
    }

    /// Create a guard with a specific instance ID
    ///
    /// Useful to keep one ID per application across many events.
    pub fn with_instance_id(node: NodeId, role: AppRole, instance_id: Uuid) -> Self {
        let previous = NODE_CONTEXT.with(|ctx| ctx.borrow().clone());

        let new_ctx = NodeContextData {
            node_id: node.to_string(),
            role,
            instance_id,
        };
        NODE_CONTEXT.with(|ctx| *ctx.borrow_mut() = Some(new_ctx));

        Self { previous }
    }

    /// Get the current node context (if any)
    pub fn current() -> Option<NodeContextData> {
        NODE_CONTEXT.with(|ctx| ctx.borrow().clone())
    }

    /// Get the current node ID (if set)
    pub fn current_node_id() -> Option<String> {
        Self::current().map(|ctx| ctx.node_id)
    }
}

impl Drop for NodeContextGuard {
    fn drop(&mut self) {
        NODE_CONTEXT.with(|ctx| *ctx.borrow_mut() = self.previous.take());
    }
}

/// Run a block with a node context in place
///
/// ```ignore
/// with_node_context!(NodeId::new(2), AppRole::Subscriber, {
///     tracing::info!("joined");
/// });
/// ```
#[macro_export]
macro_rules! with_node_context {
    ($node:expr, $role:expr, $body:block) => {{
        let _guard = $crate::context::NodeContextGuard::new($node, $role);
        $body
    }};
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_node_context_guard() {
        assert!(NodeContextGuard::current().is_none());

        {
            let _guard = NodeContextGuard::new(NodeId::new(0), AppRole::Producer);
            let ctx = NodeContextGuard::current().unwrap();
            assert_eq!(ctx.node_id, "N0");
            assert_eq!(ctx.role, AppRole::Producer);
        }

        assert!(NodeContextGuard::current().is_none());
    }

    #[test]
    fn test_nested_contexts() {
        {
            let _outer = NodeContextGuard::new(NodeId::new(2), AppRole::Subscriber);
            assert_eq!(NodeContextGuard::current_node_id(), Some("N2".to_string()));

            {
                let _inner = NodeContextGuard::new(NodeId::new(0), AppRole::Producer);
                assert_eq!(NodeContextGuard::current_node_id(), Some("N0".to_string()));
            }

            assert_eq!(NodeContextGuard::current_node_id(), Some("N2".to_string()));
        }

        assert!(NodeContextGuard::current_node_id().is_none());
    }

    #[test]
    fn test_with_instance_id() {
        let instance_id = Uuid::new_v4();
        let _guard = NodeContextGuard::with_instance_id(NodeId::new(4), AppRole::Subscriber, instance_id);
        assert_eq!(NodeContextGuard::current().unwrap().instance_id, instance_id);
    }

    #[test]
    fn test_macro_scopes_context() {
        let seen = with_node_context!(NodeId::new(3), AppRole::Subscriber, {
            NodeContextGuard::current_node_id()
        });
        assert_eq!(seen, Some("N3".to_string()));
        assert!(NodeContextGuard::current().is_none());
    }
}
