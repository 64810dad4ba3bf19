//! Custom tracing layers
//!
//! [`NodeContextLayer`] attaches the active [`NodeContextGuard`] data to every
//! span created in its scope.

use tracing::{Subscriber, span};
use tracing_subscriber::{
    layer::{Context, Layer},
    registry::LookupSpan,
};

use crate::context::{NodeContextData, NodeContextGuard};

/// Layer that injects node context into spans
#[derive(Debug, Default)]
pub struct NodeContextLayer;

impl NodeContextLayer {
    pub fn new() -> Self {
        Self
    }
}

/// Extension data stored on spans
#[derive(Debug, Clone)]
pub struct NodeContextExtension {
    pub data: NodeContextData,
}

impl<S> Layer<S> for NodeContextLayer
where
    S: Subscriber + for<'lookup> LookupSpan<'lookup>,
{
    fn on_new_span(&self, _attrs: &span::Attributes<'_>, id: &span::Id, ctx: Context<'_, S>) {
        if let Some(span) = ctx.span(id) {
            if let Some(node_ctx) = NodeContextGuard::current() {
                span.extensions_mut()
                    .insert(NodeContextExtension { data: node_ctx });
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use icens_core::{AppRole, NodeId};
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::registry::Registry;

    /// Checks the extension from inside the span via a second layer
    struct Probe(std::sync::Arc<std::sync::Mutex<Option<String>>>);

    impl<S> Layer<S> for Probe
    where
        S: Subscriber + for<'lookup> LookupSpan<'lookup>,
    {
        fn on_new_span(&self, _attrs: &span::Attributes<'_>, id: &span::Id, ctx: Context<'_, S>) {
            if let Some(span) = ctx.span(id) {
                let node = span
                    .extensions()
                    .get::<NodeContextExtension>()
                    .map(|ext| ext.data.node_id.clone());
                *self.0.lock().unwrap() = node;
            }
        }
    }

    #[test]
    fn test_span_receives_node_context() {
        let seen = std::sync::Arc::new(std::sync::Mutex::new(None));
        let subscriber = Registry::default()
            .with(NodeContextLayer::new())
            .with(Probe(seen.clone()));

        tracing::subscriber::with_default(subscriber, || {
            let _guard = NodeContextGuard::new(NodeId::new(1), AppRole::Subscriber);
            let _span = tracing::info_span!("event").entered();
        });

        assert_eq!(seen.lock().unwrap().as_deref(), Some("N1"));
    }
}
