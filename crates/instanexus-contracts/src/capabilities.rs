use serde::{Deserialize, Serialize};

/// Which remote services this process can use.
///
/// Built once when the engine is constructed and handed around by value.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientCapabilities {
    /// Image task API key present.
    pub task_api: bool,
    /// Caption model reachable (key present, and probe passed when one ran).
    pub captions: bool,
}

impl ClientCapabilities {
    pub fn new(task_api: bool, captions: bool) -> Self {
        Self { task_api, captions }
    }

    pub fn any(&self) -> bool {
        self.task_api || self.captions
    }

    pub fn without_captions(self) -> Self {
        Self {
            captions: false,
            ..self
        }
    }
}
