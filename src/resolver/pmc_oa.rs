//! PubMed Central Open Access resolver.
//!
//! The PMID is mapped to a PMCID through Entrez, then the PMC OA web service
//! (`oa.fcgi`) says whether the article is in the Open Access subset and lists
//! its packages. Open Access articles yield the OAI-PMH `GetRecord` XML and, when
//! listed, the PDF.

use std::sync::Arc;

use async_trait::async_trait;
use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};
use tracing::{debug, warn};

use crate::config::{ENTREZ_TOOL_NAME, HttpSettings};
use crate::download::{ArticleFormat, RequestPacer, RetryPolicy};
use crate::parser::Pmid;

use super::entrez::EntrezClient;
use super::http_client::MetadataClient;
use super::utils::ncbi_ftp_to_https;
use super::{ResolveContext, ResolveError, ResolveStep, ResolvedResource, Resolver, SourceKind};

/// OAI identifier namespace for PubMed Central records.
const OAI_IDENTIFIER_PREFIX: &str = "oai:pubmedcentral.nih.gov:";

/// Parsed answer of the OA web service.
#[derive(Debug, Default, PartialEq, Eq)]
pub(crate) struct OaListing {
    /// `<error code=..>message</error>`, when present.
    pub error: Option<(String, String)>,
    /// Whether a `<record>` element was present.
    pub has_record: bool,
    /// `(format, href)` for each `<link>` of the record.
    pub links: Vec<(String, String)>,
}

/// Resolves PMIDs against the PMC Open Access subset.
pub struct PmcOaResolver {
    client: MetadataClient,
    oa_service: String,
    oai_service: String,
    email: String,
    entrez: Arc<EntrezClient>,
}

impl PmcOaResolver {
    /// Creates a resolver using the given OA (`oa.fcgi`) and OAI-PMH (`oai.cgi`) endpoints.
    ///
    /// # Errors
    ///
    /// Returns [`ResolveError::ClientBuild`] if the HTTP client cannot be built.
    pub fn new(
        oa_service: &str,
        oai_service: &str,
        email: &str,
        entrez: Arc<EntrezClient>,
        http: &HttpSettings,
    ) -> Result<Self, ResolveError> {
        Ok(Self {
            client: MetadataClient::new("pmc-oa", http)?,
            oa_service: oa_service.to_string(),
            oai_service: oai_service.to_string(),
            email: email.to_string(),
            entrez,
        })
    }

    /// Paces requests with the run's shared `pacer` and retries refusals per `retry`.
    #[must_use]
    pub fn with_pacing(mut self, pacer: Arc<RequestPacer>, retry: RetryPolicy) -> Self {
        self.client = self.client.with_pacing(pacer, retry);
        self
    }

    /// OAI-PMH `GetRecord` URL for a PMCID (`PMC1234567` or bare digits).
    #[must_use]
    pub fn oai_record_url(&self, pmcid: &str) -> String {
        let digits = pmcid.trim().trim_start_matches(|c: char| c.is_ascii_alphabetic());
        format!(
            "{}?verb=GetRecord&identifier={OAI_IDENTIFIER_PREFIX}{digits}&metadataPrefix=pmc",
            self.oai_service
        )
    }

    async fn fetch_listing(&self, pmid: &Pmid, pmcid: &str) -> Result<OaListing, ResolveError> {
        let url = format!(
            "{}?id={}&tool={}&email={}",
            self.oa_service,
            urlencoding::encode(pmcid),
            ENTREZ_TOOL_NAME,
            urlencoding::encode(&self.email)
        );
        debug!(api_url = %url, "Calling PMC OA service");

        let response = self.client.get(&url).await.map_err(|e| {
            warn!(error = %e, "PMC OA request failed");
            ResolveError::resolution_failed(
                pmid.as_str(),
                "Cannot reach the PMC OA service. Check your network connection.",
            )
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(ResolveError::resolution_failed(
                pmid.as_str(),
                &format!("PMC OA service returned HTTP {}", status.as_u16()),
            ));
        }

        let body = response.text().await.map_err(|e| {
            warn!(error = %e, "Failed to read PMC OA response");
            ResolveError::resolution_failed(pmid.as_str(), "Unreadable PMC OA response")
        })?;

        parse_oa_listing(&body).map_err(|e| {
            warn!(error = %e, "Failed to parse PMC OA XML");
            ResolveError::resolution_failed(pmid.as_str(), "Unexpected PMC OA response format")
        })
    }
}

impl std::fmt::Debug for PmcOaResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PmcOaResolver")
            .field("oa_service", &self.oa_service)
            .field("oai_service", &self.oai_service)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl Resolver for PmcOaResolver {
    fn name(&self) -> &'static str {
        "pmc-oa"
    }

    fn source(&self) -> SourceKind {
        SourceKind::PmcOa
    }

    #[tracing::instrument(skip(self, _ctx), fields(resolver = "pmc-oa", pmid = %pmid))]
    async fn resolve(
        &self,
        pmid: &Pmid,
        _ctx: &ResolveContext,
    ) -> Result<ResolveStep, ResolveError> {
        let pmcid = match self.entrez.pmid_to_pmcid(pmid).await {
            Ok(Some(pmcid)) => pmcid,
            Ok(None) => {
                return Ok(ResolveStep::Failed(ResolveError::resolution_failed(
                    pmid.as_str(),
                    "not in PubMed Central",
                )));
            }
            Err(err) => return Ok(ResolveStep::Failed(err)),
        };

        let listing = match self.fetch_listing(pmid, &pmcid).await {
            Ok(listing) => listing,
            Err(err) => return Ok(ResolveStep::Failed(err)),
        };

        if let Some((code, message)) = listing.error {
            debug!(%pmcid, %code, %message, "PMC OA service refused");
            return Ok(ResolveStep::Failed(ResolveError::resolution_failed(
                pmid.as_str(),
                &format!("{pmcid} is not in the open-access subset ({code})"),
            )));
        }
        if !listing.has_record {
            return Ok(ResolveStep::Failed(ResolveError::resolution_failed(
                pmid.as_str(),
                &format!("PMC OA service returned no record for {pmcid}"),
            )));
        }

        let mut resources = vec![ResolvedResource::new(
            self.oai_record_url(&pmcid),
            ArticleFormat::Xml,
        )];
        for (format, href) in &listing.links {
            if !format.eq_ignore_ascii_case("pdf") {
                continue;
            }
            let url = ncbi_ftp_to_https(href);
            if resources.iter().all(|r| r.url != url) {
                resources.push(ResolvedResource::new(url, ArticleFormat::Pdf));
            }
        }

        debug!(%pmcid, count = resources.len(), "PMC OA resources");
        Ok(ResolveStep::Resources(resources))
    }
}

/// Parses the XML returned by `oa.fcgi`.
pub(crate) fn parse_oa_listing(xml: &str) -> Result<OaListing, quick_xml::Error> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut listing = OaListing::default();
    let mut in_error = false;
    let mut error_code = String::new();
    let mut error_text = String::new();

    loop {
        match reader.read_event()? {
            Event::Start(ref e) => match e.local_name().as_ref() {
                b"error" => {
                    in_error = true;
                    error_code = attribute(e, b"code").unwrap_or_default();
                }
                b"record" => listing.has_record = true,
                b"link" => push_link(&mut listing, e),
                _ => {}
            },
            Event::Empty(ref e) => match e.local_name().as_ref() {
                b"error" => {
                    listing.error = Some((attribute(e, b"code").unwrap_or_default(), String::new()));
                }
                b"record" => listing.has_record = true,
                b"link" => push_link(&mut listing, e),
                _ => {}
            },
            Event::Text(ref t) if in_error => {
                let text = t
                    .unescape()
                    .map_or_else(|_| String::from_utf8_lossy(t).into_owned(), |v| v.into_owned());
                error_text.push_str(&text);
            }
            Event::End(ref e) if e.local_name().as_ref() == b"error" => {
                in_error = false;
                listing.error = Some((
                    std::mem::take(&mut error_code),
                    std::mem::take(&mut error_text),
                ));
            }
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(listing)
}

fn push_link(listing: &mut OaListing, element: &BytesStart<'_>) {
    if let (Some(format), Some(href)) = (attribute(element, b"format"), attribute(element, b"href")) {
        listing.links.push((format, href));
    }
}

fn attribute(element: &BytesStart<'_>, name: &[u8]) -> Option<String> {
    element
        .attributes()
        .flatten()
        .find(|attr| attr.key.as_ref() == name)
        .map(|attr| {
            attr.unescape_value().map_or_else(
                |_| String::from_utf8_lossy(&attr.value).into_owned(),
                std::borrow::Cow::into_owned,
            )
        })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::test_support::socket_guard::start_mock_server_or_skip;
    use serde_json::json;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const OA_RECORD: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<OA><responseDate>2024-01-01 00:00:00</responseDate>
<request id="PMC5334499">https://www.ncbi.nlm.nih.gov/pmc/utils/oa/oa.fcgi?id=PMC5334499</request>
<records returned-count="1" total-count="1">
<record id="PMC5334499" citation="Sci Rep. 2017; 7:43520" license="CC BY" retracted="no">
<link format="tgz" updated="2017-03-06 17:52:06" href="ftp://ftp.ncbi.nlm.nih.gov/pub/pmc/oa_package/8e/71/PMC5334499.tar.gz" />
<link format="pdf" updated="2017-03-06 17:52:06" href="ftp://ftp.ncbi.nlm.nih.gov/pub/pmc/oa_pdf/8e/71/srep43520.PMC5334499.pdf" />
</record>
</records>
</OA>"#;

    const OA_ERROR: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<OA><responseDate>2024-01-01 00:00:00</responseDate>
<request id="PMC1">https://www.ncbi.nlm.nih.gov/pmc/utils/oa/oa.fcgi?id=PMC1</request>
<error code="idIsNotOpenAccess">identifier 'PMC1' is not Open Access</error>
</OA>"#;

    #[test]
    fn test_parse_oa_listing_record_with_links() {
        let listing = parse_oa_listing(OA_RECORD).unwrap();
        assert!(listing.error.is_none());
        assert!(listing.has_record);
        assert_eq!(listing.links.len(), 2);
        assert_eq!(listing.links[1].0, "pdf");
        assert!(listing.links[1].1.ends_with("srep43520.PMC5334499.pdf"));
    }

    #[test]
    fn test_parse_oa_listing_error() {
        let listing = parse_oa_listing(OA_ERROR).unwrap();
        let (code, message) = listing.error.unwrap();
        assert_eq!(code, "idIsNotOpenAccess");
        assert!(message.contains("not Open Access"));
        assert!(!listing.has_record);
    }

    #[test]
    fn test_parse_oa_listing_rejects_malformed_xml() {
        assert!(parse_oa_listing("<OA><records></OA>").is_err());
    }

    async fn resolver_for(server: &MockServer) -> PmcOaResolver {
        let http = HttpSettings::resolver_default();
        let entrez = Arc::new(
            EntrezClient::new(&format!("{}/entrez/eutils", server.uri()), "me@example.org", &http)
                .unwrap(),
        );
        PmcOaResolver::new(
            &format!("{}/pmc/utils/oa/oa.fcgi", server.uri()),
            &format!("{}/pmc/oai/oai.cgi", server.uri()),
            "me@example.org",
            entrez,
            &http,
        )
        .unwrap()
    }

    async fn mount_elink(server: &MockServer, pmid: &str, pmc_digits: Option<&str>) {
        let linksetdbs = match pmc_digits {
            Some(id) => json!([{"dbto": "pmc", "linkname": "pubmed_pmc", "links": [id]}]),
            None => json!([]),
        };
        Mock::given(method("GET"))
            .and(path("/entrez/eutils/elink.fcgi"))
            .and(query_param("id", pmid))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "linksets": [{"dbfrom": "pubmed", "ids": [pmid], "linksetdbs": linksetdbs}]
            })))
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn test_oai_record_url_uses_digits() {
        let Some(server) = start_mock_server_or_skip().await else {
            return;
        };
        let resolver = resolver_for(&server).await;
        assert_eq!(
            resolver.oai_record_url("PMC5334499"),
            format!(
                "{}/pmc/oai/oai.cgi?verb=GetRecord&identifier=oai:pubmedcentral.nih.gov:5334499&metadataPrefix=pmc",
                server.uri()
            )
        );
    }

    #[tokio::test]
    async fn test_resolve_open_access_article() {
        let Some(server) = start_mock_server_or_skip().await else {
            return;
        };
        mount_elink(&server, "28249574", Some("5334499")).await;
        Mock::given(method("GET"))
            .and(path("/pmc/utils/oa/oa.fcgi"))
            .and(query_param("id", "PMC5334499"))
            .respond_with(ResponseTemplate::new(200).set_body_string(OA_RECORD))
            .mount(&server)
            .await;

        let step = resolver_for(&server)
            .await
            .resolve(&Pmid::parse("28249574").unwrap(), &ResolveContext::default())
            .await
            .unwrap();
        let ResolveStep::Resources(resources) = step else {
            panic!("Expected resources");
        };
        assert_eq!(resources.len(), 2);
        assert_eq!(resources[0].format, ArticleFormat::Xml);
        assert!(resources[0].url.contains("identifier=oai:pubmedcentral.nih.gov:5334499"));
        assert_eq!(resources[1].format, ArticleFormat::Pdf);
        assert!(resources[1].url.starts_with("https://ftp.ncbi.nlm.nih.gov/pub/pmc/oa_pdf/"));
    }

    #[tokio::test]
    async fn test_resolve_not_open_access_fails_softly() {
        let Some(server) = start_mock_server_or_skip().await else {
            return;
        };
        mount_elink(&server, "1", Some("1")).await;
        Mock::given(method("GET"))
            .and(path("/pmc/utils/oa/oa.fcgi"))
            .respond_with(ResponseTemplate::new(200).set_body_string(OA_ERROR))
            .mount(&server)
            .await;

        let step = resolver_for(&server)
            .await
            .resolve(&Pmid::parse("1").unwrap(), &ResolveContext::default())
            .await
            .unwrap();
        match step {
            ResolveStep::Failed(err) => assert!(err.to_string().contains("open-access")),
            ResolveStep::Resources(_) => panic!("Expected failure"),
        }
    }

    #[tokio::test]
    async fn test_resolve_without_pmc_copy_fails_softly() {
        let Some(server) = start_mock_server_or_skip().await else {
            return;
        };
        mount_elink(&server, "2", None).await;

        let step = resolver_for(&server)
            .await
            .resolve(&Pmid::parse("2").unwrap(), &ResolveContext::default())
            .await
            .unwrap();
        match step {
            ResolveStep::Failed(err) => assert!(err.to_string().contains("PubMed Central")),
            ResolveStep::Resources(_) => panic!("Expected failure"),
        }
    }
}
