//! Parser for the aviationweather.gov dataserver XML
//!
//! Turns one response document into a map of station id to [`Metar`]. The
//! document level is strict (a malformed document or a missing/incomplete
//! `data` container fails the whole parse), while the per-station level is
//! tolerant: unknown tags and uncoercible values are logged anomalies that
//! never fail a block.

use std::collections::HashMap;

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use thiserror::Error;
use tracing::{debug, warn};

use crate::metar::{FieldOutcome, Metar};

/// Failure to parse a dataserver response document.
/// No partial result map is produced in any of these cases.
#[derive(Error, Debug)]
pub enum ParseFailure {
    /// The document could not be decoded as XML
    #[error("malformed METAR document: {source}")]
    Xml {
        #[from]
        source: quick_xml::Error,
    },

    /// The document has no `data` result container
    #[error("METAR document has no data element")]
    MissingData,

    /// The `data` container lacks its `num_results` attribute
    #[error("data element is missing the num_results attribute")]
    MissingResultCount,
}

/// One accumulated child of a `METAR` block, in document order
enum BlockItem {
    Field { tag: String, value: String },
    Sky { cover: Option<String>, base: Option<String> },
}

/// Parse a dataserver response into a station id → [`Metar`] map.
///
/// Stations absent from the response are simply absent from the map; the
/// caller decides what "missing" means.
pub fn parse_metar_xml(xml: &str) -> Result<HashMap<String, Metar>, ParseFailure> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut result: HashMap<String, Metar> = HashMap::new();
    let mut data_seen = false;
    let mut in_data = false;
    // Children of the current METAR block, None when outside a block
    let mut block: Option<Vec<BlockItem>> = None;
    // Tag, text accumulator and nesting depth for the current child of a
    // block. Container children (e.g. quality_control_flags wrapping its
    // flag elements) fold their nested text into the outer field.
    let mut current: Option<(String, String, usize)> = None;

    loop {
        match reader.read_event()? {
            Event::Start(e) if !in_data => {
                if e.name().as_ref() == b"data" {
                    check_result_count(&e)?;
                    data_seen = true;
                    in_data = true;
                }
            }
            Event::Start(e) if in_data && block.is_none() => {
                if e.name().as_ref() == b"METAR" {
                    block = Some(Vec::new());
                } else {
                    warn!(
                        tag = %String::from_utf8_lossy(e.name().as_ref()),
                        "non-METAR element under data"
                    );
                    let owned = e.to_owned();
                    reader.read_to_end(owned.name())?;
                }
            }
            Event::Start(e) if block.is_some() => {
                match current.as_mut() {
                    Some((_, _, depth)) => *depth += 1,
                    None => {
                        current = Some((
                            String::from_utf8_lossy(e.name().as_ref()).into_owned(),
                            String::new(),
                            0,
                        ));
                    }
                }
            }
            Event::Empty(e) if current.is_none() => {
                if let Some(items) = block.as_mut() {
                    if e.name().as_ref() == b"sky_condition" {
                        items.push(BlockItem::Sky {
                            cover: attribute_value(&e, b"sky_cover"),
                            base: attribute_value(&e, b"cloud_base_ft_agl"),
                        });
                    } else {
                        items.push(BlockItem::Field {
                            tag: String::from_utf8_lossy(e.name().as_ref()).into_owned(),
                            value: String::new(),
                        });
                    }
                }
            }
            Event::Text(t) => {
                if let Some((_, text, _)) = current.as_mut() {
                    text.push_str(&t.unescape()?);
                }
            }
            Event::CData(t) => {
                if let Some((_, text, _)) = current.as_mut() {
                    text.push_str(&String::from_utf8_lossy(&t));
                }
            }
            Event::End(e) => {
                if in_data && e.name().as_ref() == b"data" {
                    in_data = false;
                } else if block.is_some() && e.name().as_ref() == b"METAR" {
                    if let Some(items) = block.take() {
                        if let Some(metar) = assemble_block(items) {
                            result.insert(metar.station.clone(), metar);
                        }
                    }
                    current = None;
                } else if let Some((tag, value, depth)) = current.take() {
                    if depth > 0 {
                        current = Some((tag, value, depth - 1));
                    } else if let Some(items) = block.as_mut() {
                        items.push(BlockItem::Field { tag, value });
                    }
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if !data_seen {
        return Err(ParseFailure::MissingData);
    }
    Ok(result)
}

/// The `data` element must declare how many results it carries
fn check_result_count(e: &BytesStart<'_>) -> Result<(), ParseFailure> {
    match attribute_value(e, b"num_results") {
        Some(count) => {
            debug!(num_results = %count, "found data element");
            Ok(())
        }
        None => Err(ParseFailure::MissingResultCount),
    }
}

fn attribute_value(e: &BytesStart<'_>, name: &[u8]) -> Option<String> {
    e.attributes()
        .flatten()
        .find(|attr| attr.key.as_ref() == name)
        .and_then(|attr| attr.unescape_value().ok())
        .map(|value| value.into_owned())
}

/// Build one [`Metar`] from the accumulated children of a block.
/// A block without a station identifier is a logged anomaly, not a failure.
fn assemble_block(items: Vec<BlockItem>) -> Option<Metar> {
    let station = items.iter().find_map(|item| match item {
        BlockItem::Field { tag, value } if tag == "station_id" && !value.is_empty() => {
            Some(value.clone())
        }
        _ => None,
    });
    let Some(station) = station else {
        warn!("METAR block without a station_id, skipping");
        return None;
    };

    let mut metar = Metar::new(station);
    for item in items {
        match item {
            BlockItem::Field { tag, value } => {
                if tag == "station_id" {
                    continue;
                }
                if metar.set_field(&tag, &value) == FieldOutcome::Unknown {
                    warn!(station = %metar.station, tag = %tag, "unexpected element in METAR block");
                }
            }
            BlockItem::Sky { cover, base } => {
                metar.add_sky_condition(cover.as_deref(), base.as_deref());
            }
        }
    }
    Some(metar)
}
