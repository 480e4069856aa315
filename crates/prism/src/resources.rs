//! Example shader resources served under `isf://examples/`.

use prismproto::{Resource, ResourceContents};

pub const BASIC_SHADER: &str = r#"/*{
    "DESCRIPTION": "Basic ISF Shader Example",
    "CREDIT": "Generated by prism",
    "CATEGORIES": ["Basic"],
    "INPUTS": [],
    "PASSES": [
        {
            "TARGET": "bufferVariableA",
            "PERSISTENT": true,
            "FLOAT": true
        }
    ]
}*/

void main() {
    vec2 uv = gl_FragCoord.xy / RENDERSIZE.xy;
    vec3 color = vec3(uv.x, uv.y, 0.5);
    gl_FragColor = vec4(color, 1.0);
}"#;

pub const ANIMATED_SHADER: &str = r#"/*{
    "DESCRIPTION": "Animated ISF Shader Example",
    "CREDIT": "Generated by prism",
    "CATEGORIES": ["Animation"],
    "INPUTS": [],
    "PASSES": [
        {
            "TARGET": "bufferVariableA",
            "PERSISTENT": true,
            "FLOAT": true
        }
    ]
}*/

void main() {
    vec2 uv = gl_FragCoord.xy / RENDERSIZE.xy;

    float wave = sin(uv.x * 10.0 + TIME * 2.0) * 0.5 + 0.5;
    wave += sin(uv.y * 8.0 + TIME * 1.5) * 0.5 + 0.5;

    vec3 color = vec3(wave, wave * 0.5, wave * 0.8);
    gl_FragColor = vec4(color, 1.0);
}"#;

pub const GRADIENT_SHADER: &str = r#"/*{
    "DESCRIPTION": "Gradient ISF Shader Example",
    "CREDIT": "Generated by prism",
    "CATEGORIES": ["Gradient"],
    "INPUTS": [],
    "PASSES": [
        {
            "TARGET": "bufferVariableA",
            "PERSISTENT": true,
            "FLOAT": true
        }
    ]
}*/

void main() {
    vec2 uv = gl_FragCoord.xy / RENDERSIZE.xy;

    vec2 center = vec2(0.5, 0.5);
    float dist = distance(uv, center);

    vec3 color = vec3(1.0 - dist, dist, 0.5);
    gl_FragColor = vec4(color, 1.0);
}"#;

const CATALOG: &[(&str, &str, &str, &str)] = &[
    (
        "isf://examples/basic",
        "Basic ISF Shader Example",
        "A simple ISF shader example with basic color output",
        BASIC_SHADER,
    ),
    (
        "isf://examples/animated",
        "Animated ISF Shader Example",
        "An animated ISF shader example with time-based animation",
        ANIMATED_SHADER,
    ),
    (
        "isf://examples/gradient",
        "Gradient ISF Shader Example",
        "A gradient-based ISF shader example",
        GRADIENT_SHADER,
    ),
];

/// List the example shaders, in catalog order.
pub fn list() -> Vec<Resource> {
    CATALOG
        .iter()
        .map(|(uri, name, description, _)| {
            Resource::new(*uri, *name)
                .with_description(*description)
                .with_mime_type("text/plain")
        })
        .collect()
}

/// Look up one example shader's source by URI.
pub fn read(uri: &str) -> Option<ResourceContents> {
    CATALOG
        .iter()
        .find(|(catalog_uri, ..)| *catalog_uri == uri)
        .map(|(uri, _, _, source)| ResourceContents::text_with_mime(*uri, *source, "text/plain"))
}
