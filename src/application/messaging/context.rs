//! Context passed to every listener

use std::sync::Arc;

use crate::domain::traits::ChatPlatform;

/// Shared handle to the chat platform for the duration of one event
#[derive(Clone)]
pub struct Context {
    platform: Arc<dyn ChatPlatform>,
}

impl Context {
    pub fn new(platform: Arc<dyn ChatPlatform>) -> Self {
        Self { platform }
    }

    pub fn platform(&self) -> &dyn ChatPlatform {
        self.platform.as_ref()
    }
}

impl std::fmt::Debug for Context {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Context")
            .field("user", &self.platform.current_user().name)
            .finish()
    }
}
