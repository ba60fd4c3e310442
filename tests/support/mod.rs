//! Mock NCBI and Crossref services for integration tests.
//!
//! Every service is mounted on one wiremock server at the paths used by
//! `Endpoints::all_at`.

#![allow(dead_code)]

pub mod socket_guard;

use std::path::Path;
use std::time::Duration;

use grabber_core::{Endpoints, GrabConfig};
use serde_json::json;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const EMAIL: &str = "tester@example.org";

/// Writes `wanted.csv` with a `PMID` header.
pub fn write_wanted(dir: &Path, ids: &[&str]) {
    let mut csv = String::from("PMID\n");
    for id in ids {
        csv.push_str(id);
        csv.push('\n');
    }
    std::fs::write(dir.join("wanted.csv"), csv).unwrap();
}

/// Config for `dir` with every endpoint on `server`, a single attempt per
/// request and no request spacing.
pub fn config_for(dir: &Path, server: &MockServer) -> GrabConfig {
    GrabConfig::new(dir, EMAIL)
        .with_endpoints(Endpoints::all_at(&server.uri()))
        .with_max_attempts(1)
        .with_request_interval(Duration::ZERO)
}

/// esummary answer for `pmid`, with or without a DOI.
pub async fn mount_esummary(server: &MockServer, pmid: &str, doi: Option<&str>) {
    let ids = match doi {
        Some(doi) => json!([{"idtype": "pubmed", "value": pmid}, {"idtype": "doi", "value": doi}]),
        None => json!([{"idtype": "pubmed", "value": pmid}]),
    };
    let mut result = serde_json::Map::new();
    result.insert("uids".to_string(), json!([pmid]));
    result.insert(pmid.to_string(), json!({ "uid": pmid, "articleids": ids }));
    Mock::given(method("GET"))
        .and(path("/entrez/eutils/esummary.fcgi"))
        .and(query_param("id", pmid))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "result": result })))
        .mount(server)
        .await;
}

/// elink answer for `pmid`, linking to `PMC{pmc_digits}` when given.
pub async fn mount_elink(server: &MockServer, pmid: &str, pmc_digits: Option<&str>) {
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

/// Crossref `works` record for `doi` listing `(url, content-type)` links.
pub async fn mount_crossref_work(server: &MockServer, doi: &str, links: &[(String, &str)]) {
    let links: Vec<_> = links
        .iter()
        .map(|(url, content_type)| {
            json!({"URL": url, "content-type": content_type, "intended-application": "text-mining"})
        })
        .collect();
    Mock::given(method("GET"))
        .and(path(format!("/works/{}", urlencoding::encode(doi))))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": "ok",
            "message-type": "work",
            "message": {"DOI": doi, "link": links}
        })))
        .mount(server)
        .await;
}

/// OA listing for an open-access `PMC{digits}` without a PDF.
pub async fn mount_oa_record(server: &MockServer, digits: &str) {
    let body = format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<OA><responseDate>2024-01-01 00:00:00</responseDate>
<request id="PMC{digits}">oa.fcgi?id=PMC{digits}</request>
<records returned-count="1" total-count="1">
<record id="PMC{digits}" citation="Test. 2020" license="CC BY" retracted="no">
<link format="tgz" updated="2020-01-01 00:00:00" href="ftp://ftp.ncbi.nlm.nih.gov/pub/pmc/oa_package/00/00/PMC{digits}.tar.gz" />
</record>
</records>
</OA>"#
    );
    Mock::given(method("GET"))
        .and(path("/pmc/utils/oa/oa.fcgi"))
        .and(query_param("id", format!("PMC{digits}")))
        .respond_with(ResponseTemplate::new(200).set_body_string(body))
        .mount(server)
        .await;
}

/// OAI-PMH `GetRecord` answer for `PMC{digits}` with a JATS body.
pub async fn mount_oai_record(server: &MockServer, digits: &str, body_text: &str) {
    let xml = format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<OAI-PMH xmlns="http://www.openarchives.org/OAI/2.0/">
<GetRecord><record>
<header><identifier>oai:pubmedcentral.nih.gov:{digits}</identifier></header>
<metadata><article xmlns="https://jats.nlm.nih.gov/ns/archiving/1.3/">
<front><article-meta><title-group><article-title>Title</article-title></title-group></article-meta></front>
<body><sec><p>{body_text}</p></sec></body>
</article></metadata>
</record></GetRecord>
</OAI-PMH>"#
    );
    Mock::given(method("GET"))
        .and(path("/pmc/oai/oai.cgi"))
        .and(query_param("verb", "GetRecord"))
        .and(query_param(
            "identifier",
            format!("oai:pubmedcentral.nih.gov:{digits}"),
        ))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "text/xml; charset=UTF-8")
                .set_body_bytes(xml.into_bytes()),
        )
        .mount(server)
        .await;
}

/// A PDF served at `route`.
pub async fn mount_pdf(server: &MockServer, route: &str) {
    Mock::given(method("GET"))
        .and(path(route.to_string()))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "application/pdf")
                .set_body_bytes(b"%PDF-1.5 test".to_vec()),
        )
        .mount(server)
        .await;
}

/// An HTML landing page served at `route`.
pub async fn mount_landing_page(server: &MockServer, route: &str) {
    Mock::given(method("GET"))
        .and(path(route.to_string()))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "text/html")
                .set_body_bytes(b"<html>publisher page</html>".to_vec()),
        )
        .mount(server)
        .await;
}

/// Number of requests the server has seen so far.
pub async fn request_count(server: &MockServer) -> usize {
    server
        .received_requests()
        .await
        .map_or(0, |requests| requests.len())
}
