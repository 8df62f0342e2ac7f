//! HTTP request and response bodies for batch runs.

use serde::{Deserialize, Serialize};

use crate::error::ProtocolError;

/// Body of `POST /api/run_source/`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSourceRequest {
    #[serde(default)]
    pub source_code: String,
    #[serde(default)]
    pub source_lang: String,
    #[serde(default)]
    pub stdin: String,
}

impl RunSourceRequest {
    pub fn validate(&self) -> Result<(), ProtocolError> {
        require("source_code", &self.source_code)?;
        require("source_lang", &self.source_lang)
    }
}

/// Body of `POST /api/run_converted/`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunConvertedRequest {
    #[serde(default)]
    pub converted_code: String,
    #[serde(default)]
    pub converted_lang: String,
    #[serde(default)]
    pub stdin: String,
}

impl RunConvertedRequest {
    pub fn validate(&self) -> Result<(), ProtocolError> {
        require("converted_code", &self.converted_code)?;
        require("converted_lang", &self.converted_lang)
    }
}

/// Response of both batch run endpoints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunResponse {
    pub output: String,
    /// Whether the program compiled, ran and exited with status zero.
    #[serde(default)]
    pub success: bool,
}

/// Body of `POST /api/compare/`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompareRequest {
    #[serde(default, alias = "output_a")]
    pub original_output: String,
    #[serde(default, alias = "output_b")]
    pub converted_output: String,
}

/// Result of comparing two program outputs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompareResponse {
    pub match_direct: bool,
    pub match_normalized: bool,
    pub consistent: bool,
    pub diff_preview: String,
}

/// One entry of `GET /api/languages`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LanguageInfo {
    pub language: String,
    pub aliases: Vec<String>,
    pub compiled: bool,
    /// The first program the pipeline invokes (compiler or interpreter).
    pub program: String,
    /// Whether `program` was found on `PATH`.
    pub available: bool,
}

fn require(field: &str, value: &str) -> Result<(), ProtocolError> {
    if value.trim().is_empty() {
        Err(ProtocolError::missing_field(field))
    } else {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_source_request_stdin_is_optional() {
        let req: RunSourceRequest =
            serde_json::from_str(r#"{"source_code":"print(1)","source_lang":"py"}"#).unwrap();
        assert_eq!(req.stdin, "");
        assert!(req.validate().is_ok());
    }

    #[test]
    fn test_run_source_request_requires_language() {
        let req: RunSourceRequest = serde_json::from_str(r#"{"source_code":"x"}"#).unwrap();
        assert_eq!(
            req.validate(),
            Err(ProtocolError::missing_field("source_lang"))
        );
    }

    #[test]
    fn test_compare_request_accepts_short_field_names() {
        let req: CompareRequest =
            serde_json::from_str(r#"{"output_a":"1","output_b":"2"}"#).unwrap();
        assert_eq!(req.original_output, "1");
        assert_eq!(req.converted_output, "2");
    }

    #[test]
    fn test_run_converted_request_requires_code() {
        let req: RunConvertedRequest =
            serde_json::from_str(r#"{"converted_code":"  ","converted_lang":"go"}"#).unwrap();
        assert_eq!(
            req.validate(),
            Err(ProtocolError::missing_field("converted_code"))
        );
    }
}
