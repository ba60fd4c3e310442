//! NCBI E-utilities lookups for a PubMed record.
//!
//! Two questions are asked of Entrez: which DOI a PMID carries (`esummary`)
//! and whether it has a PubMed Central copy (`elink`, `pubmed_pmc`).

use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, warn};

use crate::config::{ENTREZ_TOOL_NAME, HttpSettings};
use crate::download::{RequestPacer, RetryPolicy};
use crate::parser::Pmid;

use super::ResolveError;
use super::http_client::MetadataClient;

/// Entrez client shared by the Crossref and PMC OA resolvers.
pub struct EntrezClient {
    client: MetadataClient,
    base_url: String,
    email: String,
}

impl EntrezClient {
    /// Creates a client against `base_url` (the `.../entrez/eutils` directory).
    ///
    /// # Errors
    ///
    /// Returns [`ResolveError::ClientBuild`] if the HTTP client cannot be built.
    pub fn new(base_url: &str, email: &str, http: &HttpSettings) -> Result<Self, ResolveError> {
        Ok(Self {
            client: MetadataClient::new("entrez", http)?,
            base_url: base_url.trim_end_matches('/').to_string(),
            email: email.to_string(),
        })
    }

    /// Paces requests with the run's shared `pacer` and retries refusals per `retry`.
    #[must_use]
    pub fn with_pacing(mut self, pacer: Arc<RequestPacer>, retry: RetryPolicy) -> Self {
        self.client = self.client.with_pacing(pacer, retry);
        self
    }

    /// Looks up the DOI recorded for `pmid`.
    ///
    /// Prefers the `doi` article id; falls back to an `elocationid` of the form
    /// `doi: 10.xxx/yyy`. `Ok(None)` when the record has no DOI.
    ///
    /// # Errors
    ///
    /// Returns [`ResolveError::ResolutionFailed`] when Entrez cannot be reached
    /// or answers with something unparseable.
    #[tracing::instrument(skip(self), fields(pmid = %pmid))]
    pub async fn pmid_to_doi(&self, pmid: &Pmid) -> Result<Option<String>, ResolveError> {
        let url = format!(
            "{}/esummary.fcgi?db=pubmed&id={}&retmode=json&tool={}&email={}",
            self.base_url,
            urlencoding::encode(pmid.as_str()),
            ENTREZ_TOOL_NAME,
            urlencoding::encode(&self.email),
        );
        let body = self.get_json(pmid, &url).await?;
        let doi = extract_doi(&body, pmid.as_str());
        debug!(doi = doi.as_deref().unwrap_or("-"), "esummary lookup");
        Ok(doi)
    }

    /// Looks up the PubMed Central id (`PMC1234567`) linked to `pmid`.
    ///
    /// `Ok(None)` when the article has no PMC copy.
    ///
    /// # Errors
    ///
    /// Returns [`ResolveError::ResolutionFailed`] when Entrez cannot be reached
    /// or answers with something unparseable.
    #[tracing::instrument(skip(self), fields(pmid = %pmid))]
    pub async fn pmid_to_pmcid(&self, pmid: &Pmid) -> Result<Option<String>, ResolveError> {
        let url = format!(
            "{}/elink.fcgi?dbfrom=pubmed&db=pmc&linkname=pubmed_pmc&id={}&retmode=json&tool={}&email={}",
            self.base_url,
            urlencoding::encode(pmid.as_str()),
            ENTREZ_TOOL_NAME,
            urlencoding::encode(&self.email),
        );
        let body = self.get_json(pmid, &url).await?;
        let pmcid = extract_pmcid(&body);
        debug!(pmcid = pmcid.as_deref().unwrap_or("-"), "elink lookup");
        Ok(pmcid)
    }

    async fn get_json(&self, pmid: &Pmid, url: &str) -> Result<Value, ResolveError> {
        let response = self.client.get(url).await.map_err(|e| {
            warn!(error = %e, "Entrez request failed");
            ResolveError::resolution_failed(
                pmid.as_str(),
                "Cannot reach NCBI E-utilities. Check your network connection.",
            )
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(ResolveError::resolution_failed(
                pmid.as_str(),
                &format!("NCBI E-utilities returned HTTP {}", status.as_u16()),
            ));
        }

        response.json::<Value>().await.map_err(|e| {
            warn!(error = %e, "Failed to parse Entrez JSON");
            ResolveError::resolution_failed(pmid.as_str(), "Unexpected E-utilities response format")
        })
    }
}

impl std::fmt::Debug for EntrezClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EntrezClient")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

fn extract_doi(body: &Value, pmid: &str) -> Option<String> {
    let record = &body["result"][pmid];

    let from_ids = record["articleids"].as_array().and_then(|ids| {
        ids.iter()
            .find(|id| id["idtype"].as_str() == Some("doi"))
            .and_then(|id| id["value"].as_str())
            .map(str::trim)
            .filter(|doi| !doi.is_empty())
            .map(ToString::to_string)
    });

    from_ids.or_else(|| {
        record["elocationid"]
            .as_str()
            .and_then(doi_from_elocation)
    })
}

fn doi_from_elocation(elocation: &str) -> Option<String> {
    elocation
        .split("doi:")
        .nth(1)
        .map(|rest| rest.split_whitespace().next().unwrap_or(""))
        .map(|doi| doi.trim_end_matches(['.', ',', ';']))
        .filter(|doi| !doi.is_empty())
        .map(ToString::to_string)
}

fn extract_pmcid(body: &Value) -> Option<String> {
    body["linksets"]
        .as_array()?
        .iter()
        .filter_map(|linkset| linkset["linksetdbs"].as_array())
        .flatten()
        .find(|db| db["linkname"].as_str() == Some("pubmed_pmc") || db["dbto"].as_str() == Some("pmc"))
        .and_then(|db| db["links"].as_array()?.first().cloned())
        .and_then(|link| match link {
            Value::String(s) => Some(s),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        })
        .map(|id| {
            let id = id.trim();
            if id.to_ascii_uppercase().starts_with("PMC") {
                format!("PMC{}", &id[3..])
            } else {
                format!("PMC{id}")
            }
        })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::test_support::socket_guard::start_mock_server_or_skip;
    use serde_json::json;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, ResponseTemplate};

    #[test]
    fn test_extract_doi_prefers_article_ids() {
        let body = json!({"result": {"uids": ["1"], "1": {
            "articleids": [
                {"idtype": "pubmed", "value": "1"},
                {"idtype": "doi", "value": "10.1000/abc"}
            ],
            "elocationid": "doi: 10.9999/other"
        }}});
        assert_eq!(extract_doi(&body, "1").unwrap(), "10.1000/abc");
    }

    #[test]
    fn test_extract_doi_falls_back_to_elocation() {
        let body = json!({"result": {"1": {
            "articleids": [{"idtype": "pubmed", "value": "1"}],
            "elocationid": "pii: S0001. doi: 10.1017/S0007114512001234."
        }}});
        assert_eq!(extract_doi(&body, "1").unwrap(), "10.1017/S0007114512001234");
    }

    #[test]
    fn test_extract_doi_none_when_absent() {
        let body = json!({"result": {"1": {"articleids": [], "elocationid": ""}}});
        assert!(extract_doi(&body, "1").is_none());
        assert!(extract_doi(&json!({}), "1").is_none());
    }

    #[test]
    fn test_extract_pmcid_from_string_and_number_links() {
        let body = json!({"linksets": [{"dbfrom": "pubmed", "linksetdbs": [
            {"dbto": "pmc", "linkname": "pubmed_pmc", "links": ["5334499"]}
        ]}]});
        assert_eq!(extract_pmcid(&body).unwrap(), "PMC5334499");

        let body = json!({"linksets": [{"linksetdbs": [
            {"dbto": "pmc", "linkname": "pubmed_pmc", "links": [5334499]}
        ]}]});
        assert_eq!(extract_pmcid(&body).unwrap(), "PMC5334499");
    }

    #[test]
    fn test_extract_pmcid_none_without_pmc_link() {
        let body = json!({"linksets": [{"dbfrom": "pubmed", "ids": ["1"]}]});
        assert!(extract_pmcid(&body).is_none());
    }

    #[tokio::test]
    async fn test_pmid_to_doi_against_mock() {
        let Some(server) = start_mock_server_or_skip().await else {
            return;
        };
        Mock::given(method("GET"))
            .and(path("/entrez/eutils/esummary.fcgi"))
            .and(query_param("id", "42"))
            .and(query_param("email", "me@example.org"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "result": {"42": {"articleids": [{"idtype": "doi", "value": "10.1/x"}]}}
            })))
            .mount(&server)
            .await;

        let client = EntrezClient::new(
            &format!("{}/entrez/eutils", server.uri()),
            "me@example.org",
            &HttpSettings::resolver_default(),
        )
        .unwrap();
        let doi = client.pmid_to_doi(&Pmid::parse("42").unwrap()).await.unwrap();
        assert_eq!(doi.as_deref(), Some("10.1/x"));
    }

    #[tokio::test]
    async fn test_entrez_http_error_is_resolution_failed() {
        let Some(server) = start_mock_server_or_skip().await else {
            return;
        };
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let client = EntrezClient::new(
            &server.uri(),
            "me@example.org",
            &HttpSettings::resolver_default(),
        )
        .unwrap();
        let err = client
            .pmid_to_pmcid(&Pmid::parse("42").unwrap())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("500"), "got {err}");
    }
}
