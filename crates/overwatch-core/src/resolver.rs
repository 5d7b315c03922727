//! Addressee resolution from object labels.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::event::Event;
use crate::source::{EventSource, ResourceKind};

/// Resolves the mention attached to a notification.
///
/// The mention is read from a label on the event's involved object. Objects
/// of unsupported kinds, failed lookups and missing labels all fall back to
/// the configured default.
#[derive(Clone)]
pub struct MentionResolver {
    source: Arc<dyn EventSource>,
    label_key: String,
    default_mention: String,
    namespace: String,
}

impl std::fmt::Debug for MentionResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MentionResolver")
            .field("label_key", &self.label_key)
            .field("default_mention", &self.default_mention)
            .field("namespace", &self.namespace)
            .finish_non_exhaustive()
    }
}

impl MentionResolver {
    /// Creates a resolver reading `label_key` from objects in `namespace`.
    ///
    /// An empty `label_key` disables lookups.
    #[must_use]
    pub fn new(
        source: Arc<dyn EventSource>,
        namespace: impl Into<String>,
        label_key: impl Into<String>,
        default_mention: impl Into<String>,
    ) -> Self {
        Self {
            source,
            label_key: label_key.into(),
            default_mention: default_mention.into(),
            namespace: namespace.into(),
        }
    }

    /// The mention used when no label is found.
    #[must_use]
    pub fn default_mention(&self) -> &str {
        &self.default_mention
    }

    /// Resolves the mention for an event.
    pub async fn resolve(&self, event: &Event) -> String {
        if self.label_key.is_empty() {
            return self.default_mention.clone();
        }

        let object = &event.involved_object;
        let kind = match object.kind.parse::<ResourceKind>() {
            Ok(kind) => kind,
            Err(_) => {
                debug!(kind = %object.kind, "cannot retrieve label for unsupported kind");
                return self.default_mention.clone();
            }
        };

        let namespace = if event.namespace.is_empty() {
            self.namespace.as_str()
        } else {
            event.namespace.as_str()
        };

        match self.source.get_resource(kind, namespace, &object.name).await {
            Ok(meta) => {
                if let Some(mention) = meta.label(&self.label_key) {
                    return mention.to_string();
                }
                warn!(
                    kind = %kind,
                    name = %object.name,
                    label = %self.label_key,
                    default = %self.default_mention,
                    "mention label not found, using default"
                );
            }
            Err(e) => {
                warn!(
                    kind = %kind,
                    name = %object.name,
                    error = %e,
                    default = %self.default_mention,
                    "unable to look up involved object, using default mention"
                );
            }
        }

        self.default_mention.clone()
    }
}
