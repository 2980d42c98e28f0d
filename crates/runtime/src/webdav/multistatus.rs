//! Reading `207 Multi-Status` PROPFIND responses

use chrono::{DateTime, Utc};
use roxmltree::{Document, Node};

use super::RemoteFile;
use crate::error::{ClientError, ClientResult};

const DAV: &str = "DAV:";

/// Entries of a multistatus document, in document order
pub(crate) fn parse(xml: &str) -> ClientResult<Vec<RemoteFile>> {
    let document = Document::parse(xml).map_err(|e| ClientError::Xml(e.to_string()))?;
    if !document.root_element().has_tag_name((DAV, "multistatus")) {
        return Err(ClientError::Xml(format!(
            "expected a DAV: multistatus document, found <{}>",
            document.root_element().tag_name().name()
        )));
    }

    Ok(document
        .root_element()
        .children()
        .filter(|node| node.has_tag_name((DAV, "response")))
        .map(entry)
        .collect())
}

fn entry(response: Node<'_, '_>) -> RemoteFile {
    let uri = child_text(response, "href").unwrap_or_default();

    // Prefer the propstat that actually succeeded
    let propstats: Vec<Node<'_, '_>> = response
        .children()
        .filter(|node| node.has_tag_name((DAV, "propstat")))
        .collect();
    let prop = propstats
        .iter()
        .find(|propstat| child_text(**propstat, "status").is_some_and(|status| status.contains(" 200 ")))
        .or_else(|| propstats.first())
        .and_then(|propstat| child(*propstat, "prop"));

    let text = |name: &str| {
        prop.and_then(|prop| child_text(prop, name))
            .filter(|value| !value.is_empty())
    };

    let is_directory = prop
        .and_then(|prop| child(prop, "resourcetype"))
        .is_some_and(|kind| child(kind, "collection").is_some());

    let filename = text("displayname").unwrap_or_else(|| last_segment(&uri));

    let mut file = RemoteFile::new(uri, filename);
    file.is_directory = is_directory;
    file.length = text("getcontentlength")
        .and_then(|length| length.parse().ok())
        .unwrap_or(0);
    file.etag = text("getetag");
    file.content_type = text("getcontenttype");
    file.last_modified = text("getlastmodified").as_deref().and_then(parse_date);
    file.creation_date = text("creationdate").as_deref().and_then(parse_date);
    file
}

fn child<'a, 'input>(node: Node<'a, 'input>, name: &str) -> Option<Node<'a, 'input>> {
    node.children().find(|child| child.has_tag_name((DAV, name)))
}

fn child_text(node: Node<'_, '_>, name: &str) -> Option<String> {
    child(node, name).map(|child| child.text().unwrap_or_default().trim().to_string())
}

fn last_segment(uri: &str) -> String {
    uri.trim_end_matches('/')
        .rsplit('/')
        .next()
        .unwrap_or_default()
        .to_string()
}

/// `creationdate` is RFC 3339, `getlastmodified` is an HTTP date
fn parse_date(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .or_else(|_| DateTime::parse_from_rfc2822(value))
        .ok()
        .map(|date| date.with_timezone(&Utc))
}
