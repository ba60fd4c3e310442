//! Crossref resolver: publisher full-text links for a PubMed record.
//!
//! The PMID is mapped to a DOI through Entrez, then `GET /works/{doi}` on the
//! Crossref REST API lists the publisher's full-text links with their declared
//! content types. Links are returned PDF first, then XML, then everything else.

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::header::HeaderMap;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::auth::ClickThroughToken;
use crate::config::HttpSettings;
use crate::download::{ArticleFormat, RequestPacer, RetryPolicy};
use crate::parser::Pmid;

use super::entrez::EntrezClient;
use super::http_client::MetadataClient;
use super::utils::{cambridge_url, fix_springer_link_url};
use super::{ResolveContext, ResolveError, ResolveStep, ResolvedResource, Resolver, SourceKind};

// ==================== Crossref API Response Types ====================

/// Top-level Crossref API response.
#[derive(Debug, Deserialize)]
pub(crate) struct CrossrefResponse {
    pub status: String,
    pub message: CrossrefMessage,
}

/// The `message` field from a Crossref works response.
#[derive(Debug, Deserialize)]
pub(crate) struct CrossrefMessage {
    #[serde(rename = "DOI")]
    pub doi: Option<String>,
    pub link: Option<Vec<CrossrefLink>>,
}

/// A resource link from the Crossref response.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub(crate) struct CrossrefLink {
    /// The URL field is uppercase in the Crossref response.
    #[serde(rename = "URL")]
    pub url: String,
    pub content_type: Option<String>,
}

// ==================== CrossrefResolver ====================

/// Resolves PMIDs to publisher full-text links via Entrez and Crossref.
///
/// All requests include a `mailto` query parameter to access Crossref's
/// polite pool. When a click-through token is configured, it is attached to
/// every returned resource as a sensitive `CR-Clickthrough-Client-Token` header.
pub struct CrossrefResolver {
    client: MetadataClient,
    base_url: String,
    mailto: String,
    entrez: Arc<EntrezClient>,
}

impl CrossrefResolver {
    /// Creates a resolver against the Crossref API at `base_url`.
    ///
    /// # Errors
    ///
    /// Returns [`ResolveError`] if the mailto contains control characters or
    /// the HTTP client cannot be built.
    #[tracing::instrument(skip_all, fields(base_url))]
    pub fn new(
        base_url: &str,
        mailto: &str,
        entrez: Arc<EntrezClient>,
        http: &HttpSettings,
    ) -> Result<Self, ResolveError> {
        if mailto.chars().any(|c| c == '\n' || c == '\r' || c == '\0') {
            return Err(ResolveError::resolution_failed(
                mailto,
                "mailto contains invalid control characters",
            ));
        }
        Ok(Self {
            client: MetadataClient::new("crossref", http)?,
            base_url: base_url.trim_end_matches('/').to_string(),
            mailto: mailto.to_string(),
            entrez,
        })
    }

    /// Paces requests with the run's shared `pacer` and retries refusals per `retry`.
    #[must_use]
    pub fn with_pacing(mut self, pacer: Arc<RequestPacer>, retry: RetryPolicy) -> Self {
        self.client = self.client.with_pacing(pacer, retry);
        self
    }

    async fn fetch_links(&self, pmid: &Pmid, doi: &str) -> Result<Vec<CrossrefLink>, ResolveError> {
        let url = format!(
            "{}/works/{}?mailto={}",
            self.base_url,
            urlencoding::encode(doi),
            urlencoding::encode(&self.mailto)
        );
        debug!(api_url = %url, "Calling Crossref API");

        let response = self.client.get(&url).await.map_err(|e| {
            warn!(error = %e, "Crossref API request failed");
            ResolveError::resolution_failed(
                pmid.as_str(),
                "Cannot reach Crossref API. Check your network connection.",
            )
        })?;

        let status = response.status();
        if !status.is_success() {
            let reason = match status.as_u16() {
                404 => format!("DOI {doi} not found in Crossref"),
                429 => "Crossref rate limit exceeded. Try again in a few seconds.".to_string(),
                s if s >= 500 => "Crossref API unavailable. Try again later.".to_string(),
                s => format!("Crossref API returned HTTP {s}"),
            };
            debug!(status = status.as_u16(), %reason, "Crossref API error");
            return Err(ResolveError::resolution_failed(pmid.as_str(), &reason));
        }

        let body = response.json::<CrossrefResponse>().await.map_err(|e| {
            warn!(error = %e, "Failed to parse Crossref response JSON");
            ResolveError::resolution_failed(pmid.as_str(), "Unexpected Crossref API response format")
        })?;

        if !body.status.eq_ignore_ascii_case("ok") {
            warn!(status = %body.status, "Crossref response status was not ok");
            return Err(ResolveError::resolution_failed(
                pmid.as_str(),
                "Unexpected Crossref response status",
            ));
        }

        debug!(doi = body.message.doi.as_deref().unwrap_or(doi), "Crossref record found");
        Ok(body.message.link.unwrap_or_default())
    }
}

impl std::fmt::Debug for CrossrefResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CrossrefResolver")
            .field("base_url", &self.base_url)
            .field("mailto", &self.mailto)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl Resolver for CrossrefResolver {
    fn name(&self) -> &'static str {
        "crossref"
    }

    fn source(&self) -> SourceKind {
        SourceKind::Crossref
    }

    #[tracing::instrument(skip(self, ctx), fields(resolver = "crossref", pmid = %pmid))]
    async fn resolve(
        &self,
        pmid: &Pmid,
        ctx: &ResolveContext,
    ) -> Result<ResolveStep, ResolveError> {
        let doi = match self.entrez.pmid_to_doi(pmid).await {
            Ok(Some(doi)) => doi,
            Ok(None) => {
                return Ok(ResolveStep::Failed(ResolveError::resolution_failed(
                    pmid.as_str(),
                    "PubMed record has no DOI",
                )));
            }
            Err(err) => return Ok(ResolveStep::Failed(err)),
        };

        let links = match self.fetch_links(pmid, &doi).await {
            Ok(links) => links,
            Err(err) => return Ok(ResolveStep::Failed(err)),
        };
        if links.is_empty() {
            return Ok(ResolveStep::Failed(ResolveError::resolution_failed(
                pmid.as_str(),
                &format!("Crossref lists no full-text links for {doi}"),
            )));
        }

        let resources = build_resources(&doi, links, ctx.credential.as_ref());
        debug!(count = resources.len(), "Crossref resources");
        Ok(ResolveStep::Resources(resources))
    }
}

// ==================== Extraction Helpers ====================

/// Turns Crossref links into ordered, deduplicated resources.
///
/// Cambridge DOIs are served from a single fixed view URL regardless of the
/// listed links. SpringerLink URLs are rewritten to their current form.
fn build_resources(
    doi: &str,
    links: Vec<CrossrefLink>,
    credential: Option<&ClickThroughToken>,
) -> Vec<ResolvedResource> {
    let headers = credential_headers(credential);

    if let Some(url) = cambridge_url(doi) {
        return vec![ResolvedResource::new(url, ArticleFormat::Unknown).with_headers(headers)];
    }

    let mut resources: Vec<ResolvedResource> = Vec::with_capacity(links.len());
    for link in links {
        let url = fix_springer_link_url(link.url.trim());
        if url.is_empty() || resources.iter().any(|r| r.url == url) {
            continue;
        }
        resources.push(
            ResolvedResource::new(url, ArticleFormat::Unknown)
                .with_declared_content_type(link.content_type)
                .with_headers(headers.clone()),
        );
    }

    resources.sort_by_key(|r| match r.format {
        ArticleFormat::Pdf => 0,
        ArticleFormat::Xml => 1,
        ArticleFormat::Text | ArticleFormat::Unknown => 2,
    });
    resources
}

fn credential_headers(credential: Option<&ClickThroughToken>) -> HeaderMap {
    let mut headers = HeaderMap::new();
    if let Some((name, value)) = credential.and_then(ClickThroughToken::header) {
        headers.insert(name, value);
    }
    headers
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::test_support::socket_guard::start_mock_server_or_skip;
    use serde_json::json;
    use wiremock::matchers::{method, path, path_regex, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn link(url: &str, content_type: Option<&str>) -> CrossrefLink {
        CrossrefLink {
            url: url.to_string(),
            content_type: content_type.map(ToString::to_string),
        }
    }

    #[test]
    fn test_build_resources_orders_pdf_then_xml_then_other() {
        let resources = build_resources(
            "10.1000/abc",
            vec![
                link("https://pub.example/a.html", Some("text/html")),
                link("https://pub.example/a.xml", Some("text/xml")),
                link("https://pub.example/a.pdf", Some("application/pdf")),
                link("https://pub.example/a.pdf", Some("application/pdf")),
            ],
            None,
        );
        let urls: Vec<&str> = resources.iter().map(|r| r.url.as_str()).collect();
        assert_eq!(
            urls,
            vec![
                "https://pub.example/a.pdf",
                "https://pub.example/a.xml",
                "https://pub.example/a.html"
            ]
        );
        assert_eq!(resources[0].format, ArticleFormat::Pdf);
        assert_eq!(resources[1].format, ArticleFormat::Xml);
        assert_eq!(resources[2].format, ArticleFormat::Unknown);
    }

    #[test]
    fn test_build_resources_unspecified_type_is_unknown() {
        let resources = build_resources(
            "10.1000/abc",
            vec![link("https://pub.example/fulltext", Some("unspecified"))],
            None,
        );
        assert_eq!(resources[0].format, ArticleFormat::Unknown);
        assert_eq!(
            resources[0].declared_content_type.as_deref(),
            Some("unspecified")
        );
    }

    #[test]
    fn test_build_resources_cambridge_doi_uses_view_url() {
        let resources = build_resources(
            "10.1017/S0007114512001234",
            vec![link("https://www.cambridge.org/core/product/x", Some("unspecified"))],
            None,
        );
        assert_eq!(resources.len(), 1);
        assert!(resources[0].url.ends_with("/content/view/S0007114512001234"));
    }

    #[test]
    fn test_build_resources_rewrites_springerlink() {
        let resources = build_resources(
            "10.1007/s00125-012-2500-1",
            vec![link(
                "http://www.springerlink.com/content/pdf/10.1007/s00125-012-2500-1",
                Some("application/pdf"),
            )],
            None,
        );
        assert_eq!(
            resources[0].url,
            "https://link.springer.com/content/pdf/10.1007%2Fs00125-012-2500-1"
        );
    }

    #[test]
    fn test_build_resources_attaches_sensitive_token_header() {
        let token = ClickThroughToken::new("tok-1").unwrap();
        let resources = build_resources(
            "10.1000/abc",
            vec![link("https://pub.example/a.pdf", Some("application/pdf"))],
            Some(&token),
        );
        let value = resources[0]
            .headers
            .get("cr-clickthrough-client-token")
            .unwrap();
        assert_eq!(value.to_str().unwrap(), "tok-1");
        assert!(value.is_sensitive());
    }

    #[test]
    fn test_build_resources_without_token_has_no_header() {
        let resources = build_resources(
            "10.1000/abc",
            vec![link("https://pub.example/a.pdf", Some("application/pdf"))],
            None,
        );
        assert!(resources[0].headers.is_empty());
    }

    #[test]
    fn test_crossref_response_deserializes_links() {
        let body = json!({
            "status": "ok",
            "message": {
                "DOI": "10.1000/abc",
                "link": [{
                    "URL": "https://pub.example/a.pdf",
                    "content-type": "application/pdf",
                    "content-version": "vor",
                    "intended-application": "text-mining"
                }]
            }
        });
        let parsed: CrossrefResponse = serde_json::from_value(body).unwrap();
        let links = parsed.message.link.unwrap();
        assert_eq!(links[0].url, "https://pub.example/a.pdf");
        assert_eq!(links[0].content_type.as_deref(), Some("application/pdf"));
    }

    async fn mount_esummary(server: &MockServer, pmid: &str, doi: Option<&str>) {
        let ids = match doi {
            Some(doi) => json!([{"idtype": "doi", "value": doi}]),
            None => json!([]),
        };
        let mut result = serde_json::Map::new();
        result.insert(pmid.to_string(), json!({ "articleids": ids }));
        Mock::given(method("GET"))
            .and(path("/entrez/eutils/esummary.fcgi"))
            .and(query_param("id", pmid))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "result": result })))
            .mount(server)
            .await;
    }

    fn resolver(server: &MockServer) -> CrossrefResolver {
        let http = HttpSettings::resolver_default();
        let entrez = Arc::new(
            EntrezClient::new(
                &format!("{}/entrez/eutils", server.uri()),
                "me@example.org",
                &http,
            )
            .unwrap(),
        );
        CrossrefResolver::new(&server.uri(), "me@example.org", entrez, &http).unwrap()
    }

    #[tokio::test]
    async fn test_resolve_returns_links_from_crossref() {
        let Some(server) = start_mock_server_or_skip().await else {
            return;
        };
        mount_esummary(&server, "100", Some("10.1000/abc")).await;
        Mock::given(method("GET"))
            .and(path_regex(r"^/works/"))
            .and(query_param("mailto", "me@example.org"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "status": "ok",
                "message": {"DOI": "10.1000/abc", "link": [
                    {"URL": format!("{}/files/a.pdf", server.uri()), "content-type": "application/pdf"}
                ]}
            })))
            .mount(&server)
            .await;

        let step = resolver(&server)
            .resolve(&Pmid::parse("100").unwrap(), &ResolveContext::default())
            .await
            .unwrap();
        match step {
            ResolveStep::Resources(resources) => {
                assert_eq!(resources.len(), 1);
                assert_eq!(resources[0].format, ArticleFormat::Pdf);
            }
            ResolveStep::Failed(err) => panic!("Expected resources, got {err}"),
        }
    }

    #[tokio::test]
    async fn test_resolve_without_doi_fails_softly() {
        let Some(server) = start_mock_server_or_skip().await else {
            return;
        };
        mount_esummary(&server, "101", None).await;

        let step = resolver(&server)
            .resolve(&Pmid::parse("101").unwrap(), &ResolveContext::default())
            .await
            .unwrap();
        match step {
            ResolveStep::Failed(err) => assert!(err.to_string().contains("no DOI")),
            ResolveStep::Resources(_) => panic!("Expected failure"),
        }
    }

    #[tokio::test]
    async fn test_resolve_crossref_404_fails_softly() {
        let Some(server) = start_mock_server_or_skip().await else {
            return;
        };
        mount_esummary(&server, "102", Some("10.1000/missing")).await;
        Mock::given(method("GET"))
            .and(path_regex(r"^/works/"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let step = resolver(&server)
            .resolve(&Pmid::parse("102").unwrap(), &ResolveContext::default())
            .await
            .unwrap();
        assert!(matches!(step, ResolveStep::Failed(_)));
    }

    #[tokio::test]
    async fn test_resolve_record_without_links_fails_softly() {
        let Some(server) = start_mock_server_or_skip().await else {
            return;
        };
        mount_esummary(&server, "103", Some("10.1000/nolinks")).await;
        Mock::given(method("GET"))
            .and(path_regex(r"^/works/"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "status": "ok",
                "message": {"DOI": "10.1000/nolinks"}
            })))
            .mount(&server)
            .await;

        let step = resolver(&server)
            .resolve(&Pmid::parse("103").unwrap(), &ResolveContext::default())
            .await
            .unwrap();
        match step {
            ResolveStep::Failed(err) => assert!(err.to_string().contains("no full-text links")),
            ResolveStep::Resources(_) => panic!("Expected failure"),
        }
    }
}
