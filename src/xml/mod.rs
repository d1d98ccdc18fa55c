//! XML parsing utilities for storage service responses.

use crate::error::{ResponseError, StorageError};
use crate::operation::ExtendedError;
use crate::types::{parse_http_date, BlobItem, BlobProperties};
use quick_xml::events::Event;
use quick_xml::Reader;

/// One page of a blob enumeration, as returned by the service.
#[derive(Debug, Clone, Default)]
pub struct EnumerationResults {
    /// Blobs in the page.
    pub blobs: Vec<BlobItem>,
    /// Virtual directory prefixes in the page.
    pub prefixes: Vec<String>,
    /// Marker for the next page, if the listing is not complete.
    pub next_marker: Option<String>,
}

/// Parse a storage `<Error>` document.
///
/// `Code` and `Message` become the extended error's code and message; any other
/// child element is kept as a detail.
pub fn parse_error_response(xml: &str) -> Result<ExtendedError, StorageError> {
    let mut reader = Reader::from_str(xml);
    reader.trim_text(true);

    let mut error = ExtendedError::default();
    let mut code = String::new();
    let mut message = String::new();
    let mut in_error = false;
    let mut current_element = String::new();

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => {
                let name = String::from_utf8_lossy(e.name().as_ref()).to_string();
                if name == "Error" {
                    in_error = true;
                } else {
                    current_element = name;
                }
            }
            Ok(Event::Text(e)) if in_error => {
                let text = e.unescape().unwrap_or_default().to_string();
                match current_element.as_str() {
                    "Code" => code = text,
                    "Message" => message = text,
                    "" => {}
                    other => error.add_detail(other.to_string(), text),
                }
            }
            Ok(Event::End(e)) => {
                if e.name().as_ref() == b"Error" {
                    in_error = false;
                }
                current_element.clear();
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(ResponseError::XmlParseError {
                    message: e.to_string(),
                }
                .into());
            }
            _ => {}
        }
    }

    if code.is_empty() && message.is_empty() {
        return Err(ResponseError::MissingField {
            field: "Code".to_string(),
        }
        .into());
    }

    error.set_code(code);
    error.set_message(message);
    Ok(error)
}

/// Parse a List Blobs `<EnumerationResults>` document.
pub fn parse_list_blobs(xml: &str) -> Result<EnumerationResults, StorageError> {
    let mut reader = Reader::from_str(xml);
    reader.trim_text(true);

    let mut output = EnumerationResults::default();
    let mut current_blob: Option<BlobItem> = None;
    let mut in_blob_prefix = false;
    let mut in_properties = false;
    let mut current_element = String::new();

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => {
                let name = String::from_utf8_lossy(e.name().as_ref()).to_string();

                match name.as_str() {
                    "Blob" => {
                        current_blob = Some(BlobItem {
                            name: String::new(),
                            properties: BlobProperties::default(),
                        });
                    }
                    "BlobPrefix" => in_blob_prefix = true,
                    "Properties" if current_blob.is_some() => in_properties = true,
                    _ => {}
                }
                current_element = name;
            }
            Ok(Event::Text(e)) => {
                let text = e.unescape().unwrap_or_default().to_string();

                if let Some(blob) = current_blob.as_mut() {
                    if in_properties {
                        let properties = &mut blob.properties;
                        match current_element.as_str() {
                            "Last-Modified" => properties.last_modified = parse_http_date(&text),
                            "Etag" => properties.etag = Some(text),
                            "Content-Length" => {
                                properties.content_length = text.parse().unwrap_or(0)
                            }
                            "Content-Type" => properties.content_type = Some(text),
                            "Content-MD5" => properties.content_md5 = Some(text),
                            "BlobType" => properties.blob_type = Some(text),
                            _ => {}
                        }
                    } else if current_element == "Name" {
                        blob.name = text;
                    }
                } else if in_blob_prefix {
                    if current_element == "Name" {
                        output.prefixes.push(text);
                    }
                } else if current_element == "NextMarker" {
                    output.next_marker = Some(text);
                }
            }
            Ok(Event::End(e)) => {
                match e.name().as_ref() {
                    b"Blob" => {
                        if let Some(blob) = current_blob.take() {
                            output.blobs.push(blob);
                        }
                    }
                    b"BlobPrefix" => in_blob_prefix = false,
                    b"Properties" => in_properties = false,
                    _ => {}
                }
                current_element.clear();
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(ResponseError::XmlParseError {
                    message: e.to_string(),
                }
                .into());
            }
            _ => {}
        }
    }

    output.next_marker = output.next_marker.filter(|m| !m.is_empty());
    Ok(output)
}
