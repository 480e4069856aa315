//! Resource catalog types. Resources are read-only artifacts addressed by
//! an opaque URI, generated on demand from static templates.

use serde::{Deserialize, Serialize};

/// A resource the server can provide.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Resource {
    /// URI identifying the resource, e.g. `isf://examples/basic`.
    pub uri: String,

    pub name: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
}

impl Resource {
    pub fn new(uri: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            name: name.into(),
            description: None,
            mime_type: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_mime_type(mut self, mime_type: impl Into<String>) -> Self {
        self.mime_type = Some(mime_type.into());
        self
    }
}

/// Text contents of a read resource.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceContents {
    pub uri: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,

    pub text: String,
}

impl ResourceContents {
    pub fn text(uri: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            mime_type: None,
            text: text.into(),
        }
    }

    pub fn text_with_mime(
        uri: impl Into<String>,
        text: impl Into<String>,
        mime_type: impl Into<String>,
    ) -> Self {
        Self {
            uri: uri.into(),
            mime_type: Some(mime_type.into()),
            text: text.into(),
        }
    }
}

/// Result of resources/list.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListResourcesResult {
    pub resources: Vec<Resource>,
}

impl ListResourcesResult {
    pub fn all(resources: Vec<Resource>) -> Self {
        Self { resources }
    }
}

/// Result of resources/read.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReadResourceResult {
    pub contents: Vec<ResourceContents>,
}

impl ReadResourceResult {
    pub fn single(contents: ResourceContents) -> Self {
        Self {
            contents: vec![contents],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resource_serialization() {
        let res = Resource::new("isf://examples/basic", "Basic ISF Shader Example")
            .with_description("A simple ISF shader example with basic color output")
            .with_mime_type("text/plain");

        let json = serde_json::to_value(&res).unwrap();
        assert_eq!(json["uri"], "isf://examples/basic");
        assert_eq!(json["mimeType"], "text/plain");
    }

    #[test]
    fn read_result_shape() {
        let result = ReadResourceResult::single(ResourceContents::text_with_mime(
            "isf://examples/basic",
            "void main() {}",
            "text/plain",
        ));

        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["contents"][0]["uri"], "isf://examples/basic");
        assert_eq!(json["contents"][0]["text"], "void main() {}");
    }
}
