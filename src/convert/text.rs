//! Body text extraction from JATS article XML.

use quick_xml::Reader;
use quick_xml::events::Event;

/// Returns the whitespace-joined text of the first `<article>`'s `<body>`.
///
/// Works on a bare JATS document and on an OAI-PMH `GetRecord` envelope,
/// where the article sits inside `<metadata>`. Namespaces are ignored.
/// `Ok(None)` when there is no article, no body, or the body has no text.
///
/// # Errors
///
/// Returns the parser error for malformed XML.
pub fn xml_to_text(xml: &str) -> Result<Option<String>, quick_xml::Error> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut article_depth = 0usize;
    let mut body_depth = 0usize;
    let mut pieces: Vec<String> = Vec::new();

    loop {
        match reader.read_event()? {
            Event::Start(e) => {
                if body_depth > 0 {
                    body_depth += 1;
                } else {
                    match e.local_name().as_ref() {
                        b"article" => article_depth += 1,
                        b"body" if article_depth > 0 => body_depth = 1,
                        _ => {}
                    }
                }
            }
            Event::End(e) => {
                if body_depth > 0 {
                    body_depth -= 1;
                    if body_depth == 0 {
                        break;
                    }
                } else if e.local_name().as_ref() == b"article" {
                    article_depth = article_depth.saturating_sub(1);
                }
            }
            Event::Text(t) if body_depth > 0 => {
                let text = t
                    .unescape()
                    .map_or_else(|_| String::from_utf8_lossy(&t).into_owned(), |v| v.into_owned());
                pieces.push(text);
            }
            Event::CData(c) if body_depth > 0 => {
                pieces.push(String::from_utf8_lossy(&c).into_owned());
            }
            Event::Eof => break,
            _ => {}
        }
    }

    let text = pieces
        .iter()
        .flat_map(|piece| piece.split_whitespace())
        .collect::<Vec<_>>()
        .join(" ");
    Ok((!text.is_empty()).then_some(text))
}
