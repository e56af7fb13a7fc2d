//! Serde model for the archive's manifest response.

use serde::Deserialize;

// ==================== Envelope ====================

/// Outer JSON wrapper returned by the manifest endpoint.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub(crate) struct Envelope {
    pub success: bool,
    /// JSON-encoded IIIF manifest. Usually a string; some responses inline the object.
    #[serde(default)]
    pub value: Option<serde_json::Value>,
    #[serde(default)]
    pub error_message: Option<String>,
}

// ==================== IIIF Presentation ====================

/// The subset of a IIIF manifest needed to locate page images.
#[derive(Debug, Deserialize)]
pub(crate) struct IiifManifest {
    pub sequences: Vec<IiifSequence>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct IiifSequence {
    pub canvases: Vec<IiifCanvas>,
}

/// One page.
#[derive(Debug, Deserialize)]
pub(crate) struct IiifCanvas {
    pub images: Vec<IiifImage>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct IiifImage {
    #[serde(rename = "@id")]
    pub id: String,
}
