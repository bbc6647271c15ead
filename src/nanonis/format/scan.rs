//! # Scan (`.sxm`) Dialect
//!
//! A scan header is LF-separated. Each `:TAG:` line names a field whose value
//! sits on the following line(s):
//!
//! ```text
//! :SCAN_PIXELS:
//!        256       256
//! :DATA_INFO:
//! 	Channel	Name	Unit	Direction	Calibration	Offset
//! 	14	Z	m	both	-1.000E-8	0.000E+0
//!
//! :SCANIT_END:
//! ```
//!
//! After `:SCANIT_END:` comes a two byte marker and then, per channel, the
//! forward image followed by the backward image.

use std::collections::HashMap;
use std::io::{BufRead, Seek};

use log::{debug, info, trace};
use ndarray::{s, Array4};

use super::locator::HeaderLocation;
use crate::nanonis::codec::elements;
use crate::nanonis::types::error::{NanonisError, Result};
use crate::nanonis::types::filetypes::{ElementEncoding, FileKind};
use crate::nanonis::types::models::{
    DecodeOptions, Decoded, Header, HeaderValue, ScanChannel, Signal, Signals, Table,
};
use crate::nanonis::utils;

const KIND: FileKind = FileKind::Scan;

/// The blank line before the end tag, the end tag line and the marker bytes.
const TRAILING_ENTRIES: usize = 3;

/// Tags whose tab-indented lines form a table.
const TABLE_TAGS: [&str; 3] = [":DATA_INFO:", ":Z-CONTROLLER:", ":Multipass-Config:"];
/// Tags that swallow every line up to the next tag.
const MULTILINE_TAGS: [&str; 1] = [":COMMENT:"];

/// Keys whose text is split on whitespace.
const SPLIT_KEYS: [&str; 4] = ["scan_offset", "scan_pixels", "scan_range", "scan_time"];
/// Keys cast to floats (lists for split keys).
const FLOAT_KEYS: [&str; 5] = ["scan_offset", "scan_range", "scan_time", "bias", "acq_time"];
/// Keys cast to integer lists.
const INT_LIST_KEYS: [&str; 1] = ["scan_pixels"];

/// Both directions are always recorded.
const NUM_DIRECTIONS: usize = 2;

fn is_tag(line: &str) -> bool {
    line.starts_with(':')
}

fn tag_key(tag: &str) -> String {
    tag.trim_matches(':').to_lowercase()
}

fn table_row(line: &str) -> Vec<String> {
    line.trim_matches('\t').split('\t').map(str::to_string).collect()
}

/// Walks the tagged lines into raw text and table values.
fn walk(entries: &[&str]) -> HashMap<String, HeaderValue> {
    let mut fields = HashMap::new();
    let mut i = 0;
    while i < entries.len() {
        let tag = entries[i].trim_end();
        i += 1;
        if !is_tag(tag) {
            continue;
        }
        let key = tag_key(tag);

        let value = if TABLE_TAGS.contains(&tag) {
            let mut rows = Vec::new();
            while i < entries.len() && !is_tag(entries[i]) {
                if entries[i].starts_with('\t') {
                    rows.push(table_row(entries[i].trim_end_matches('\r')));
                }
                i += 1;
            }
            let table = match rows.split_first() {
                Some((names, body)) => Table::from_rows(names.clone(), body),
                None => Table::default(),
            };
            HeaderValue::Table(table)
        } else if MULTILINE_TAGS.contains(&tag) {
            let start = i;
            while i < entries.len() && !is_tag(entries[i]) {
                i += 1;
            }
            HeaderValue::Text(entries[start..i].join("\n").trim_end().to_string())
        } else {
            match entries.get(i) {
                Some(line) if !is_tag(line) => {
                    i += 1;
                    HeaderValue::Text(line.trim().to_string())
                }
                _ => HeaderValue::Text(String::new()),
            }
        };
        trace!("Scan header field {:?}", key);
        fields.insert(key, value);
    }
    fields
}

fn take_text(fields: &mut HashMap<String, HeaderValue>, key: &str) -> Result<String> {
    match fields.remove(key) {
        Some(HeaderValue::Text(text)) => Ok(text),
        Some(other) => Err(NanonisError::malformed(KIND, key, other.to_string(), "text")),
        None => Err(NanonisError::missing_key(KIND, key)),
    }
}

fn parse_floats(key: &str, tokens: &[String]) -> Result<Vec<f64>> {
    tokens
        .iter()
        .map(|token| {
            token
                .parse()
                .map_err(|_| NanonisError::malformed(KIND, key, tokens.join(" "), "numbers"))
        })
        .collect()
}

/// Parses a scan header. Keys are lower-cased tag names.
pub fn parse_header(raw: &[u8]) -> Result<Header> {
    let (text, _) = utils::decode_lossy(raw);
    let entries = utils::header_entries(&text, "\n", TRAILING_ENTRIES);
    let mut fields = walk(&entries);

    let mut split: HashMap<&str, Vec<String>> = HashMap::new();
    for key in SPLIT_KEYS {
        let tokens = take_text(&mut fields, key)?
            .split_whitespace()
            .map(str::to_string)
            .collect();
        split.insert(key, tokens);
    }

    let mut header = Header::new(KIND);
    for key in FLOAT_KEYS {
        let value = match split.remove(key) {
            Some(tokens) => HeaderValue::FloatList(parse_floats(key, &tokens)?),
            None => {
                let text = take_text(&mut fields, key)?;
                HeaderValue::Float(
                    text.trim()
                        .parse()
                        .map_err(|_| NanonisError::malformed(KIND, key, text.clone(), "a number"))?,
                )
            }
        };
        header.insert(key, value);
    }
    for key in INT_LIST_KEYS {
        let tokens = split.remove(key).unwrap_or_default();
        let values = tokens
            .iter()
            .map(|token| {
                token
                    .parse()
                    .map_err(|_| NanonisError::malformed(KIND, key, tokens.join(" "), "integers"))
            })
            .collect::<Result<Vec<i64>>>()?;
        header.insert(key, HeaderValue::IntList(values));
    }

    for (key, value) in fields {
        header.insert(key, value);
    }
    Ok(header)
}

/// The payload geometry a scan header declares.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanGeometry {
    pub nx: usize,
    pub ny: usize,
    /// Channel names from the `Name` column of `:DATA_INFO:`.
    pub channels: Vec<String>,
}

impl ScanGeometry {
    pub fn from_header(header: &Header) -> Result<Self> {
        let channels = header
            .table("data_info")?
            .column("Name")
            .ok_or_else(|| NanonisError::missing_key(KIND, "data_info.Name"))?
            .to_vec();
        let (nx, ny) = match header.int_list("scan_pixels")? {
            [nx, ny] if *nx >= 0 && *ny >= 0 => (*nx as usize, *ny as usize),
            other => {
                return Err(NanonisError::malformed(
                    KIND,
                    "scan_pixels",
                    format!("{:?}", other),
                    "two non-negative pixel counts",
                ))
            }
        };
        Ok(Self { nx, ny, channels })
    }

    /// Elements the whole payload must hold.
    pub fn num_elements(&self) -> usize {
        self.channels
            .len()
            .saturating_mul(NUM_DIRECTIONS)
            .saturating_mul(self.nx)
            .saturating_mul(self.ny)
    }
}

/// Reshapes a flat payload into `(num_channels, 2, ny, nx)` and splits it per
/// channel into forward and backward images.
pub fn decode_payload(
    payload: &[u8],
    geometry: &ScanGeometry,
    encoding: ElementEncoding,
) -> Result<Vec<(String, ScanChannel)>> {
    let expected = geometry.num_elements();
    let flat = elements::decode(payload, encoding, expected)?;
    let actual = flat.len();
    let shape = (geometry.channels.len(), NUM_DIRECTIONS, geometry.ny, geometry.nx);
    let shaped = Array4::from_shape_vec(shape, flat).map_err(|_| NanonisError::PayloadSizeMismatch {
        expected,
        actual,
        trailing_bytes: 0,
    })?;

    Ok(geometry
        .channels
        .iter()
        .enumerate()
        .map(|(i, name)| {
            let channel = ScanChannel {
                forward: shaped.slice(s![i, 0, .., ..]).to_owned(),
                backward: shaped.slice(s![i, 1, .., ..]).to_owned(),
            };
            (name.clone(), channel)
        })
        .collect())
}

/// Picks the caller's encoding, then the header's `:SCANIT_TYPE:`, then the default.
pub fn resolve_encoding(header: &Header, requested: Option<ElementEncoding>) -> ElementEncoding {
    requested
        .or_else(|| {
            header
                .text("scanit_type")
                .ok()
                .and_then(ElementEncoding::from_scanit_type)
        })
        .unwrap_or_default()
}

/// Runs the scan pipeline on a located file.
pub fn decode<R: BufRead + Seek>(
    reader: &mut R,
    location: &HeaderLocation,
    options: &DecodeOptions,
) -> Result<Decoded> {
    let header = parse_header(&location.raw_header)?;
    let geometry = ScanGeometry::from_header(&header)?;
    let encoding = resolve_encoding(&header, options.encoding);
    debug!(
        "Scan geometry: {} x {} pixels, {} channels, {}",
        geometry.nx,
        geometry.ny,
        geometry.channels.len(),
        encoding
    );

    let payload = super::read_payload(reader, location.byte_offset)?;
    let channels = decode_payload(&payload, &geometry, encoding)?;

    let mut signals = Signals::new();
    let mut warnings = Vec::new();
    for (name, channel) in channels {
        super::insert_signal(&mut signals, &mut warnings, KIND, name, Signal::Scan(channel));
    }
    info!("Decoded scan with {} channels", geometry.channels.len());
    Ok(Decoded {
        header,
        signals,
        warnings,
    })
}
