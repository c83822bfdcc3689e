use std::sync::Arc;

use crate::error::{GuardError, GuardResult};
use crate::models::FocusRef;

const ENABLE_LOGS: bool = true;
const LOG_TAG: &str = "field";

use crate::{log_debug, log_warn};

/// Text read/write on the element behind a `FocusRef`.
pub trait FieldIo: Send + Sync {
    fn read(&self, focus: FocusRef) -> GuardResult<String>;
    fn write(&self, focus: FocusRef, text: &str) -> GuardResult<()>;
}

/// Thin wrapper that normalises primitive failures into the two field
/// errors the coordinator acts on.
#[derive(Clone)]
pub struct FieldAccessor {
    io: Arc<dyn FieldIo>,
}

impl FieldAccessor {
    pub fn new(io: Arc<dyn FieldIo>) -> Self {
        Self { io }
    }

    pub fn read_text(&self, focus: FocusRef) -> GuardResult<String> {
        match self.io.read(focus) {
            Ok(text) => {
                log_debug!("read {} chars from {:?}", text.chars().count(), focus);
                Ok(text)
            }
            Err(err @ GuardError::FieldReadFailed(_)) => Err(err),
            Err(other) => Err(GuardError::FieldReadFailed(other.to_string())),
        }
    }

    pub fn write_text(&self, focus: FocusRef, text: &str) -> GuardResult<()> {
        match self.io.write(focus, text) {
            Ok(()) => Ok(()),
            Err(err) => {
                log_warn!("write to {:?} rejected: {err}", focus);
                match err {
                    GuardError::FieldWriteFailed(_) => Err(err),
                    other => Err(GuardError::FieldWriteFailed(other.to_string())),
                }
            }
        }
    }
}

/// Whitespace-separated word count, the unit for the validation threshold.
pub fn word_count(text: &str) -> usize {
    text.split_whitespace().count()
}
