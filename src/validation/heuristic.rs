use async_trait::async_trait;

use crate::error::GuardResult;
use crate::models::Analysis;

use super::{ValidationContext, Validator};

const PASSIVE_INDICATORS: [&str; 6] = ["was", "were", "been", "being", "is being", "are being"];
const WORDS_PER_MINUTE: usize = 200;
const SUGGESTION_WORDS: usize = 50;

/// Local stand-in for the LLM check: a length limit, a crude passive-voice
/// sniff and rough readability numbers. Only the length limit rejects.
#[derive(Debug, Clone)]
pub struct HeuristicValidator {
    max_words: usize,
}

impl HeuristicValidator {
    pub fn new(max_words: usize) -> Self {
        Self { max_words }
    }

    pub fn analyze(&self, text: &str) -> Analysis {
        let words: Vec<&str> = text.split_whitespace().collect();
        if words.is_empty() {
            return Analysis::approved_empty();
        }
        let word_count = words.len();

        let mut issues = Vec::new();
        let too_long = word_count > self.max_words;
        if too_long {
            issues.push("message is quite long".to_string());
        }

        let padded = format!(" {} ", words.join(" ").to_lowercase());
        if PASSIVE_INDICATORS
            .iter()
            .any(|indicator| padded.contains(&format!(" {indicator} ")))
        {
            issues.push("possible passive voice detected".to_string());
        }

        let read_time_seconds = ((word_count * 60) / WORDS_PER_MINUTE).max(1);
        let grade_level = (word_count as f64 / 10.0).min(12.0);

        let suggestion = if too_long {
            let cut = SUGGESTION_WORDS.min(word_count);
            format!("{}...", words[..cut].join(" "))
        } else {
            String::new()
        };

        Analysis {
            approved: !too_long,
            word_count: word_count as u32,
            read_time_seconds: read_time_seconds as u32,
            grade_level,
            issues,
            suggestion,
        }
    }
}

impl Default for HeuristicValidator {
    fn default() -> Self {
        Self::new(100)
    }
}

#[async_trait]
impl Validator for HeuristicValidator {
    async fn validate(&self, content: &str, _context: &ValidationContext) -> GuardResult<Analysis> {
        Ok(self.analyze(content))
    }
}
