//! Uniform `{success, message, data}` response wrapper
//!
//! Every backend endpoint answers with this shape, including failures
//! (`success: false`, `data: null`). Authentication failures at login are
//! reported through the envelope, not as transport errors.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope<T> {
    pub success: bool,
    #[serde(default)]
    pub message: String,
    pub data: Option<T>,
}

impl<T> Envelope<T> {
    /// The payload of a successful envelope, if any.
    pub fn into_data(self) -> Option<T> {
        if self.success { self.data } else { None }
    }
}
