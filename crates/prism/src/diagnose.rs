//! Natural-language diagnosis of engine errors.
//!
//! Tool callers are usually LLMs iterating on shader source, so raw engine
//! errors get paired with an explanation of what to fix. Rules match on
//! substrings of the error text, first match wins.

use serde::Serialize;

use crate::engine::EngineError;

/// Structured error surfaced in render/validate outcomes.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorDetail {
    pub kind: ErrorKind,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub engine_code: Option<String>,
    pub explanation: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Validation,
    Compile,
    Render,
    Timeout,
    Internal,
}

impl ErrorDetail {
    pub fn from_engine(error: &EngineError, context: &str) -> Self {
        let (kind, code) = match error {
            EngineError::Compile { .. } => (ErrorKind::Compile, None),
            EngineError::Render { code, .. } => (ErrorKind::Render, code.clone()),
            EngineError::Timeout { .. } => (ErrorKind::Timeout, None),
            EngineError::Unavailable { .. } => (ErrorKind::Internal, None),
            EngineError::Io(_) => (ErrorKind::Internal, None),
        };
        let message = error.to_string();
        Self {
            kind,
            explanation: explain(&message, context),
            engine_code: code,
            message,
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        let message = message.into();
        Self {
            kind: ErrorKind::Validation,
            explanation: explain(&message, "shader validation"),
            engine_code: None,
            message,
        }
    }
}

type Predicate = fn(&str) -> bool;
type Template = fn(&str) -> String;

/// Ordered diagnosis rules. Predicates see the lowercased message; the
/// first match wins, so more specific rules sit above the generic ones
/// they would otherwise shadow.
const RULES: &[(Predicate, Template)] = &[
    (
        |m| m.contains("main") && m.contains("function"),
        |_| {
            "The shader is missing a main function. ISF shaders require a 'void main()' \
             function to define the fragment shader entry point."
                .to_string()
        },
    ),
    (
        |m| m.contains("syntax"),
        |msg| {
            format!(
                "The shader contains syntax errors: {}. Please check the GLSL syntax and \
                 ensure all brackets, semicolons, and function calls are properly formatted.",
                msg
            )
        },
    ),
    (
        |m| m.contains("uniform") && m.contains("not found"),
        |msg| {
            format!(
                "The shader references a uniform variable that is not defined: {}. Make sure \
                 all uniform variables are properly declared.",
                msg
            )
        },
    ),
    (
        |m| m.contains("texture") && m.contains("not found"),
        |msg| {
            format!(
                "The shader references a texture that is not available: {}. Ensure all \
                 texture inputs are properly defined in the ISF metadata.",
                msg
            )
        },
    ),
    (
        |m| m.contains("compilation"),
        |msg| {
            format!(
                "The shader failed to compile: {}. This usually indicates syntax errors, \
                 undefined variables, or unsupported GLSL features.",
                msg
            )
        },
    ),
    (
        |m| m.contains("validation"),
        |msg| {
            format!(
                "Shader validation failed: {}. The shader may be missing required components \
                 or have invalid ISF metadata.",
                msg
            )
        },
    ),
    (
        |m| m.contains("file") && m.contains("not found"),
        |msg| {
            format!(
                "File not found: {}. Please check that the file path is correct and the file \
                 exists.",
                msg
            )
        },
    ),
    (
        |m| m.contains("permission"),
        |msg| {
            format!(
                "Permission denied: {}. The program cannot access the specified file or \
                 directory.",
                msg
            )
        },
    ),
    (
        |m| m.contains("memory"),
        |msg| {
            format!(
                "Memory allocation error: {}. The requested render size may be too large for \
                 available system memory.",
                msg
            )
        },
    ),
];

/// Map a raw error message to an actionable explanation.
pub fn explain(error_message: &str, context: &str) -> String {
    let lower = error_message.to_lowercase();

    for (matches, template) in RULES {
        if matches(&lower) {
            return template(error_message);
        }
    }

    if context.is_empty() {
        format!("An error occurred: {}", error_message)
    } else {
        format!("Error occurred during {}: {}", context, error_message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_main_rule() {
        let explanation = explain("Shader does not contain main function", "rendering");
        assert!(explanation.contains("void main()"));
    }

    #[test]
    fn syntax_rule_keeps_original_text() {
        let explanation = explain("syntax error in ISF JSON header", "rendering");
        assert!(explanation.contains("syntax error in ISF JSON header"));
        assert!(explanation.contains("GLSL syntax"));
    }

    #[test]
    fn uniform_rule_requires_both_substrings() {
        let hit = explain("uniform 'speed' not found", "rendering");
        assert!(hit.contains("uniform variable"));

        // "uniform" alone falls through to the generic rule.
        let miss = explain("uniform buffer overflow", "rendering");
        assert!(miss.starts_with("Error occurred during rendering"));
    }

    #[test]
    fn ordered_rules_pick_first_match() {
        // Has both "syntax" and "compilation"; syntax wins by order.
        let explanation = explain("compilation aborted: syntax issue on line 3", "rendering");
        assert!(explanation.contains("GLSL syntax"));
    }

    #[test]
    fn memory_rule() {
        let explanation = explain("out of memory allocating framebuffer", "rendering");
        assert!(explanation.contains("too large"));
    }

    #[test]
    fn generic_fallback_uses_context() {
        assert_eq!(
            explain("something odd", "frame rendering"),
            "Error occurred during frame rendering: something odd"
        );
        assert_eq!(explain("something odd", ""), "An error occurred: something odd");
    }

    #[test]
    fn engine_error_detail_kinds() {
        let compile = ErrorDetail::from_engine(
            &EngineError::Compile {
                message: "Shader does not contain main function".to_string(),
            },
            "rendering",
        );
        assert_eq!(compile.kind, ErrorKind::Compile);
        assert!(compile.explanation.contains("void main()"));

        let timeout = ErrorDetail::from_engine(&EngineError::Timeout { ms: 30_000 }, "rendering");
        assert_eq!(timeout.kind, ErrorKind::Timeout);

        let render = ErrorDetail::from_engine(
            &EngineError::Render {
                message: "GL_INVALID_OPERATION".to_string(),
                code: Some("0x0502".to_string()),
            },
            "rendering",
        );
        assert_eq!(render.engine_code.as_deref(), Some("0x0502"));
    }
}
