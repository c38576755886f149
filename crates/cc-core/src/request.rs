//! Normalized request descriptor handed to the matcher.

use crate::psl::SiteResolver;
use crate::types::ResourceType;
use crate::url::extract_host;

/// A read-only view of one network request.
///
/// Constructed once per request. A request built from an empty URL or an
/// empty site is kept but marked invalid, and the matcher rejects it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassificationRequest {
    url: String,
    schemeless_site: String,
    source_schemeless_site: String,
    resource_type: ResourceType,
    third_party: bool,
    valid: bool,
}

impl ClassificationRequest {
    /// Build from already-extracted parts.
    pub fn new(
        url: impl Into<String>,
        schemeless_site: impl Into<String>,
        source_schemeless_site: impl Into<String>,
        resource_type: ResourceType,
        third_party: bool,
    ) -> Self {
        let url = url.into();
        let schemeless_site = schemeless_site.into().to_ascii_lowercase();
        let valid = !url.is_empty() && !schemeless_site.is_empty();
        Self {
            url,
            schemeless_site,
            source_schemeless_site: source_schemeless_site.into().to_ascii_lowercase(),
            resource_type,
            third_party,
            valid,
        }
    }

    /// Build from the request URL and the initiating document URL.
    ///
    /// Sites are derived with `resolver`. A request whose source site is
    /// unknown is treated as third-party.
    pub fn from_urls(
        url: &str,
        source_url: Option<&str>,
        resource_type: ResourceType,
        resolver: &dyn SiteResolver,
    ) -> Self {
        let site = extract_host(url)
            .map(|host| resolver.schemeless_site(&host.to_ascii_lowercase()).to_string())
            .unwrap_or_default();

        let source_site = source_url
            .and_then(extract_host)
            .map(|host| resolver.schemeless_site(&host.to_ascii_lowercase()).to_string())
            .unwrap_or_default();

        let third_party = source_site.is_empty() || source_site != site;

        Self::new(url, site, source_site, resource_type, third_party)
    }

    pub fn is_valid(&self) -> bool {
        self.valid
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn schemeless_site(&self) -> &str {
        &self.schemeless_site
    }

    /// Site of the initiating document; empty when unavailable.
    pub fn source_schemeless_site(&self) -> &str {
        &self.source_schemeless_site
    }

    pub fn resource_type(&self) -> ResourceType {
        self.resource_type
    }

    pub fn is_third_party(&self) -> bool {
        self.third_party
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::psl::HeuristicSiteResolver;

    #[test]
    fn test_new_marks_missing_parts_invalid() {
        let ok = ClassificationRequest::new("https://a.example/", "a.example", "", ResourceType::Image, true);
        assert!(ok.is_valid());

        let no_url = ClassificationRequest::new("", "a.example", "", ResourceType::Image, true);
        assert!(!no_url.is_valid());

        let no_site = ClassificationRequest::new("https://a.example/", "", "", ResourceType::Image, true);
        assert!(!no_site.is_valid());
    }

    #[test]
    fn test_from_urls_derives_sites() {
        let req = ClassificationRequest::from_urls(
            "https://cdn.Tracker.example/t.js",
            Some("https://www.news.example/article"),
            ResourceType::Script,
            &HeuristicSiteResolver,
        );
        assert!(req.is_valid());
        assert_eq!(req.schemeless_site(), "tracker.example");
        assert_eq!(req.source_schemeless_site(), "news.example");
        assert!(req.is_third_party());
    }

    #[test]
    fn test_from_urls_same_site_is_first_party() {
        let req = ClassificationRequest::from_urls(
            "https://static.news.example/app.js",
            Some("https://www.news.example/"),
            ResourceType::Script,
            &HeuristicSiteResolver,
        );
        assert!(!req.is_third_party());
    }

    #[test]
    fn test_from_urls_unknown_source_is_third_party() {
        let req = ClassificationRequest::from_urls(
            "https://tracker.example/p",
            None,
            ResourceType::Ping,
            &HeuristicSiteResolver,
        );
        assert!(req.is_third_party());
        assert_eq!(req.source_schemeless_site(), "");
    }

    #[test]
    fn test_from_urls_without_host_is_invalid() {
        let req = ClassificationRequest::from_urls("about:blank", None, ResourceType::Other, &HeuristicSiteResolver);
        assert!(!req.is_valid());
    }
}
