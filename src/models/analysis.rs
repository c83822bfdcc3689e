use serde::{Deserialize, Serialize};

/// Verdict returned by a validator, in the JSON shape the prompt asks for.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Analysis {
    pub approved: bool,
    #[serde(default)]
    pub word_count: u32,
    #[serde(default)]
    pub read_time_seconds: u32,
    #[serde(default)]
    pub grade_level: f64,
    #[serde(default)]
    pub issues: Vec<String>,
    #[serde(default)]
    pub suggestion: String,
}

impl Analysis {
    pub fn approved_empty() -> Self {
        Self {
            approved: true,
            ..Self::default()
        }
    }
}
