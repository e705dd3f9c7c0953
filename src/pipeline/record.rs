use serde::{Deserialize, Serialize};

/// An article record in flight through the pipeline
///
/// `url` is its identity. The record is created by the item extractor and
/// owned by one pipeline run until it is committed or dropped.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CandidateRecord {
    pub url: String,
    pub headline: String,
    pub text: String,
    pub author: String,
    #[serde(default)]
    pub countries_mentioned: Vec<String>,
}

impl CandidateRecord {
    /// Value of a mandatory field by name
    pub fn field(&self, name: &str) -> Option<&str> {
        match name {
            "url" => Some(&self.url),
            "headline" => Some(&self.headline),
            "text" => Some(&self.text),
            "author" => Some(&self.author),
            _ => None,
        }
    }
}
