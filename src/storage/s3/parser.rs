use chrono::{DateTime, NaiveDateTime, Utc};
use quick_xml::events::Event;
use quick_xml::Reader;

use crate::storage::traits::{S3Object, StorageError};

/// Parses a `LastModified` value
///
/// Accepts RFC3339 with or without fractional seconds, then falls back to a
/// zone-less whole-second timestamp read as UTC.
pub fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();
    if let Ok(parsed) = DateTime::parse_from_rfc3339(value) {
        return Some(parsed.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(value.trim_end_matches('Z'), "%Y-%m-%dT%H:%M:%S")
        .ok()
        .map(|naive| naive.and_utc())
}

#[derive(Default)]
struct PartialObject {
    key: Option<String>,
    size: u64,
    last_modified: Option<DateTime<Utc>>,
    etag: Option<String>,
}

/// Parses a ListObjectsV2 response body, most recently modified first
///
/// A missing `<Size>` counts as 0 and a missing or unreadable
/// `<LastModified>` as `now`. A body that is not a `ListBucketResult` at all
/// is an error; one that breaks off midway yields the entries read so far.
pub fn parse_list_objects_response(
    xml_content: &str,
    now: DateTime<Utc>,
) -> Result<Vec<S3Object>, StorageError> {
    let mut reader = Reader::from_str(xml_content);

    let mut objects = Vec::new();
    let mut buf = Vec::new();
    let mut current_object: Option<PartialObject> = None;
    let mut current_text = String::new();
    let mut saw_root = false;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) => {
                match e.name().as_ref() {
                    b"ListBucketResult" => saw_root = true,
                    b"Contents" => current_object = Some(PartialObject::default()),
                    _ => {}
                }
                current_text.clear();
            }
            Ok(Event::Text(e)) => match e.unescape() {
                Ok(text) => current_text.push_str(&text),
                Err(err) => log::warn!("Skipping undecodable text in list response: {}", err),
            },
            Ok(Event::CData(e)) => {
                current_text.push_str(&String::from_utf8_lossy(&e.into_inner()));
            }
            Ok(Event::End(ref e)) => {
                let element_name = e.name();
                if element_name.as_ref() == b"Contents" {
                    if let Some(obj) = current_object.take() {
                        push_object(&mut objects, obj, now);
                    }
                } else if let Some(ref mut obj) = current_object {
                    match element_name.as_ref() {
                        b"Key" => obj.key = Some(current_text.clone()),
                        b"Size" => obj.size = current_text.trim().parse().unwrap_or(0),
                        b"LastModified" => obj.last_modified = parse_timestamp(&current_text),
                        b"ETag" => obj.etag = Some(current_text.trim().trim_matches('"').to_string()),
                        _ => {}
                    }
                }
                current_text.clear();
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                if !saw_root {
                    return Err(StorageError::MalformedResponse(format!(
                        "XML parsing error: {}",
                        e
                    )));
                }
                log::warn!(
                    "List response stopped parsing at byte {}: {}; keeping {} entries",
                    reader.buffer_position(),
                    e,
                    objects.len()
                );
                break;
            }
            _ => {}
        }
        buf.clear();
    }

    if !saw_root {
        return Err(StorageError::MalformedResponse(
            "response is not a ListBucketResult document".to_string(),
        ));
    }

    sort_newest_first(&mut objects);
    Ok(objects)
}

fn push_object(objects: &mut Vec<S3Object>, obj: PartialObject, now: DateTime<Utc>) {
    let Some(key) = obj.key else {
        log::warn!("Skipping <Contents> entry without a <Key>");
        return;
    };
    let last_modified = obj.last_modified.unwrap_or_else(|| {
        log::warn!("Missing or unreadable LastModified for '{}', using now", key);
        now
    });
    objects.push(S3Object {
        key,
        size: obj.size,
        last_modified,
        etag: obj.etag,
    });
}

/// Most recently modified first; ties keep key order for stable output
pub fn sort_newest_first(objects: &mut [S3Object]) {
    objects.sort_by(|a, b| {
        b.last_modified
            .cmp(&a.last_modified)
            .then_with(|| a.key.cmp(&b.key))
    });
}
