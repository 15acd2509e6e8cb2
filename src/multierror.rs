//! Multi-Status (207) response bodies.
//!
//! PROPFIND results and the per-resource failure reports of COPY/MOVE both
//! render as a `<d:multistatus>` document. The writer handles escaping, so
//! hrefs and descriptions can be passed through as-is.

use std::io::Write;
use std::time::SystemTime;

use http::{Response, StatusCode};
use xml::writer::{EmitterConfig, EventWriter, XmlEvent};

use crate::body::Body;
use crate::errors::DavResult;
use crate::util::systemtime_to_httpdate;

/// One resource in a PROPFIND response.
#[derive(Debug, Clone)]
pub(crate) struct PropEntry {
    /// Percent-encoded href; collections end with `/`.
    pub href: String,
    pub displayname: String,
    pub is_dir: bool,
    pub size: u64,
    pub modified: SystemTime,
}

/// One failed resource of a COPY/MOVE.
#[derive(Debug, Clone)]
pub(crate) struct ResourceError {
    pub href: String,
    pub status: StatusCode,
    pub description: String,
}

pub(crate) fn propfind_body(entries: &[PropEntry]) -> DavResult<String> {
    let mut out = Vec::new();
    let mut w = EmitterConfig::new()
        .write_document_declaration(true)
        .create_writer(&mut out);
    w.write(XmlEvent::start_element("d:multistatus").ns("d", "DAV:"))?;
    for entry in entries {
        w.write(XmlEvent::start_element("d:response"))?;
        text_element(&mut w, "d:href", &entry.href)?;
        w.write(XmlEvent::start_element("d:propstat"))?;
        w.write(XmlEvent::start_element("d:prop"))?;
        text_element(&mut w, "d:displayname", &entry.displayname)?;
        text_element(&mut w, "d:getcontentlength", &entry.size.to_string())?;
        text_element(
            &mut w,
            "d:getlastmodified",
            &systemtime_to_httpdate(entry.modified),
        )?;
        w.write(XmlEvent::start_element("d:resourcetype"))?;
        if entry.is_dir {
            w.write(XmlEvent::start_element("d:collection"))?;
            w.write(XmlEvent::end_element())?;
        }
        w.write(XmlEvent::end_element())?;
        let contenttype = if entry.is_dir {
            "httpd/unix-directory"
        } else {
            "application/octet-stream"
        };
        text_element(&mut w, "d:getcontenttype", contenttype)?;
        w.write(XmlEvent::end_element())?; // prop
        text_element(&mut w, "d:status", "HTTP/1.1 200 OK")?;
        w.write(XmlEvent::end_element())?; // propstat
        w.write(XmlEvent::end_element())?; // response
    }
    w.write(XmlEvent::end_element())?; // multistatus
    Ok(String::from_utf8_lossy(&out).into_owned())
}

pub(crate) fn multistatus_error_body(errors: &[ResourceError]) -> DavResult<String> {
    let mut out = Vec::new();
    let mut w = EmitterConfig::new()
        .write_document_declaration(true)
        .create_writer(&mut out);
    w.write(XmlEvent::start_element("d:multistatus").ns("d", "DAV:"))?;
    for err in errors {
        w.write(XmlEvent::start_element("d:response"))?;
        text_element(&mut w, "d:href", &err.href)?;
        let status = format!(
            "HTTP/1.1 {} {}",
            err.status.as_u16(),
            err.status.canonical_reason().unwrap_or("")
        );
        text_element(&mut w, "d:status", status.trim_end())?;
        text_element(&mut w, "d:responsedescription", &err.description)?;
        w.write(XmlEvent::end_element())?;
    }
    w.write(XmlEvent::end_element())?;
    Ok(String::from_utf8_lossy(&out).into_owned())
}

/// Wrap a rendered multistatus document in a 207 response.
pub(crate) fn multistatus_response(body: String) -> Response<Body> {
    Response::builder()
        .status(StatusCode::MULTI_STATUS)
        .header("Content-Type", "application/xml; charset=utf-8")
        .header("Content-Length", body.len().to_string())
        .body(Body::from(body))
        .unwrap()
}

fn text_element<W: Write>(
    w: &mut EventWriter<W>,
    name: &str,
    text: &str,
) -> xml::writer::Result<()> {
    w.write(XmlEvent::start_element(name))?;
    if !text.is_empty() {
        w.write(XmlEvent::characters(text))?;
    }
    w.write(XmlEvent::end_element())?;
    Ok(())
}
