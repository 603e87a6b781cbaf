//! Prompt templates and lenient parsing of model output.
//!
//! Models are asked for JSON but often wrap it in a markdown fence or add
//! chatter around it. Anything that still fails to parse is kept as plain
//! text in the most relevant field instead of being dropped.

use regex::Regex;
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::session::analysis::{DebugResult, ExplanationResult, ValidationResult};

const NO_ERROR_MESSAGE: &str = "No specific error message provided";

/// Prompt for a free-text question.
#[must_use]
pub fn query_prompt(query: &str) -> String {
    format!(
        "You are a spreadsheet expert helping users with Excel tasks.\n\
         Answer clearly and accurately, include short examples where they help, \
         and point out best practices.\n\n\
         User query: {query}\n"
    )
}

/// Prompt asking for a [`ValidationResult`] as JSON.
#[must_use]
pub fn validation_prompt(formula: &str) -> String {
    format!(
        "Review this Excel formula.\n\
         Formula: {formula}\n\n\
         Say whether it is valid, what it does, which issues or improvements apply, \
         which best practices to follow, and which alternatives exist.\n\n\
         Reply with JSON only, using these keys:\n\
         - is_valid: boolean\n\
         - explanation: string\n\
         - issues: array of strings\n\
         - best_practices: array of strings\n\
         - alternatives: array of strings\n"
    )
}

/// Prompt asking for an [`ExplanationResult`] as JSON.
#[must_use]
pub fn explanation_prompt(formula: &str) -> String {
    format!(
        "Explain this Excel formula.\n\
         Formula: {formula}\n\n\
         Walk through it step by step, describe each part, list common use cases \
         and give tips for using it well.\n\n\
         Reply with JSON only, using these keys:\n\
         - steps: array of strings\n\
         - components: array of objects with \"part\" and \"explanation\" keys\n\
         - use_cases: array of strings\n\
         - tips: array of strings\n"
    )
}

/// Prompt asking for a [`DebugResult`] as JSON.
///
/// A missing or blank error message is described as such in the prompt.
#[must_use]
pub fn debug_prompt(formula: &str, error_message: Option<&str>) -> String {
    let error_message = error_message
        .filter(|message| !message.trim().is_empty())
        .unwrap_or(NO_ERROR_MESSAGE);
    format!(
        "Debug this Excel formula.\n\
         Formula: {formula}\n\
         Error message: {error_message}\n\n\
         List the likely causes, how to fix the formula, how to prevent the problem \
         and alternative approaches.\n\n\
         Reply with JSON only, using these keys:\n\
         - causes: array of strings\n\
         - fixes: array of strings\n\
         - prevention: array of strings\n\
         - alternatives: array of strings\n"
    )
}

/// Turns raw model text into analysis results.
#[derive(Clone, Debug)]
pub struct ResponseParser {
    fence: Regex,
}

impl ResponseParser {
    /// Build a parser.
    ///
    /// # Errors
    /// Returns an error if the fence pattern fails to compile.
    pub fn new() -> Result<Self, regex::Error> {
        Ok(Self {
            fence: Regex::new(r"(?s)```(?:json|JSON)?\s*(\{.*?\})\s*```")?,
        })
    }

    /// Locate the JSON object in `text`.
    ///
    /// Prefers a fenced block, then the span from the first `{` to the last `}`.
    #[must_use]
    pub fn extract_json<'a>(&self, text: &'a str) -> Option<&'a str> {
        if let Some(body) = self
            .fence
            .captures(text)
            .and_then(|caps| caps.get(1))
        {
            return Some(body.as_str());
        }
        let start = text.find('{')?;
        let end = text.rfind('}')?;
        (start < end).then(|| &text[start..=end])
    }

    fn parse<T: DeserializeOwned>(&self, text: &str) -> Option<T> {
        let json = self.extract_json(text)?;
        match serde_json::from_str(json) {
            Ok(value) => Some(value),
            Err(err) => {
                debug!(%err, "model output is not the expected JSON");
                None
            }
        }
    }

    /// Parse a validation answer, keeping unparsable text as the explanation.
    #[must_use]
    pub fn validation(&self, text: &str) -> ValidationResult {
        self.parse(text).unwrap_or_else(|| ValidationResult {
            is_valid: true,
            explanation: text.trim().to_string(),
            ..ValidationResult::default()
        })
    }

    /// Parse an explanation answer, keeping unparsable text as a single step.
    #[must_use]
    pub fn explanation(&self, text: &str) -> ExplanationResult {
        self.parse(text).unwrap_or_else(|| ExplanationResult {
            steps: vec![text.trim().to_string()],
            ..ExplanationResult::default()
        })
    }

    /// Parse a debug answer, keeping unparsable text as a single fix.
    #[must_use]
    pub fn debug(&self, text: &str) -> DebugResult {
        self.parse(text).unwrap_or_else(|| DebugResult {
            fixes: vec![text.trim().to_string()],
            ..DebugResult::default()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parser() -> Option<ResponseParser> {
        ResponseParser::new().ok()
    }

    #[test]
    fn test_extract_fenced_json() {
        let Some(parser) = parser() else { return };
        let text = "Here you go:\n```json\n{\"is_valid\": false}\n```\nHope it helps {really}";
        assert_eq!(parser.extract_json(text), Some("{\"is_valid\": false}"));
    }

    #[test]
    fn test_extract_outermost_braces() {
        let Some(parser) = parser() else { return };
        let text = "Sure! {\"steps\": [\"a\"], \"components\": [{\"part\": \"A1\"}]} Done.";
        assert_eq!(
            parser.extract_json(text),
            Some("{\"steps\": [\"a\"], \"components\": [{\"part\": \"A1\"}]}")
        );
        assert_eq!(parser.extract_json("no json here"), None);
        assert_eq!(parser.extract_json("} backwards {"), None);
    }

    #[test]
    fn test_validation_parses_json() {
        let Some(parser) = parser() else { return };
        let result = parser.validation(
            "```json\n{\"is_valid\": false, \"explanation\": \"Missing paren\", \"issues\": [\"Unbalanced\"]}\n```",
        );
        assert!(!result.is_valid);
        assert_eq!(result.explanation, "Missing paren");
        assert_eq!(result.issues, ["Unbalanced"]);
        assert!(result.alternatives.is_empty());
    }

    #[test]
    fn test_fallbacks_keep_raw_text() {
        let Some(parser) = parser() else { return };
        let raw = "  The formula sums column A.  ";

        let validation = parser.validation(raw);
        assert!(validation.is_valid);
        assert_eq!(validation.explanation, "The formula sums column A.");

        let explanation = parser.explanation(raw);
        assert_eq!(explanation.steps, ["The formula sums column A."]);
        assert!(explanation.components.is_empty());

        let debug = parser.debug(raw);
        assert_eq!(debug.fixes, ["The formula sums column A."]);
        assert!(debug.causes.is_empty());
    }

    #[test]
    fn test_wrong_shape_falls_back() {
        let Some(parser) = parser() else { return };
        let result = parser.debug("{\"fixes\": \"not a list\"}");
        assert_eq!(result.fixes, ["{\"fixes\": \"not a list\"}"]);
    }

    #[test]
    fn test_debug_prompt_error_message() {
        let with = debug_prompt("=A1/B1", Some("#DIV/0!"));
        assert!(with.contains("Error message: #DIV/0!"));
        for missing in [None, Some(""), Some("   ")] {
            let prompt = debug_prompt("=A1/B1", missing);
            assert!(prompt.contains(NO_ERROR_MESSAGE));
        }
    }

    #[test]
    fn test_prompts_embed_input() {
        assert!(query_prompt("How do I use VLOOKUP?").contains("How do I use VLOOKUP?"));
        assert!(validation_prompt("=SUM(A:A)").contains("Formula: =SUM(A:A)"));
        assert!(explanation_prompt("=SUM(A:A)").contains("use_cases"));
    }
}
