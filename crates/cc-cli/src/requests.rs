//! JSON-lines request input and result output.
//!
//! One request per line:
//!
//! ```text
//! {"url": "https://tracker.example/t.js", "source_url": "https://news.example/", "type": "script"}
//! ```

use std::fs;

use serde::{Deserialize, Serialize};

use cc_core::psl::SiteResolver;
use cc_core::{ClassificationRequest, ClassificationResult, ResourceType};

#[derive(Debug, Clone, Deserialize)]
pub struct RequestRecord {
    pub url: String,
    #[serde(default)]
    pub source_url: Option<String>,
    #[serde(default, rename = "type")]
    pub resource_type: Option<String>,
    /// Overrides the third-party flag derived from the sites
    #[serde(default)]
    pub third_party: Option<bool>,
}

impl RequestRecord {
    pub fn to_request(&self, resolver: &dyn SiteResolver) -> ClassificationRequest {
        let resource_type = self
            .resource_type
            .as_deref()
            .map_or(ResourceType::Other, ResourceType::from_tag);
        let request =
            ClassificationRequest::from_urls(&self.url, self.source_url.as_deref(), resource_type, resolver);

        match self.third_party {
            Some(third_party) if third_party != request.is_third_party() => ClassificationRequest::new(
                request.url(),
                request.schemeless_site(),
                request.source_schemeless_site(),
                resource_type,
                third_party,
            ),
            _ => request,
        }
    }
}

pub fn parse_requests(text: &str) -> Result<Vec<RequestRecord>, String> {
    text.lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(i, line)| serde_json::from_str(line).map_err(|e| format!("Invalid request on line {}: {}", i + 1, e)))
        .collect()
}

pub fn read_requests(path: &str) -> Result<Vec<RequestRecord>, String> {
    let text = fs::read_to_string(path).map_err(|e| format!("Failed to read '{}': {}", path, e))?;
    parse_requests(&text)
}

#[derive(Debug, Serialize)]
pub struct ResultRecord {
    pub outcome: String,
    pub hit: bool,
    pub exception: bool,
    pub important: bool,
}

impl From<ClassificationResult> for ResultRecord {
    fn from(result: ClassificationResult) -> Self {
        Self {
            outcome: result.outcome().to_string(),
            hit: result.hit(),
            exception: result.exception(),
            important: result.important(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ClassifiedRecord<'a> {
    pub url: &'a str,
    pub site: &'a str,
    pub source_site: &'a str,
    pub third_party: bool,
    pub block: ResultRecord,
    pub annotate: ResultRecord,
}
