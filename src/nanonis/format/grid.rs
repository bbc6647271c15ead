//! # Grid (`.3ds`) Dialect
//!
//! A grid header is CRLF-separated `key=value` text closed by `:HEADER_END:`.
//! Big-endian floats follow, one pixel after another. Each pixel holds:
//!
//! ```text
//! [num_parameters]                 fixed + experiment parameters
//! [num_sweep_signal] x num_channels one sweep per channel, in header order
//! ```
//!
//! The parameter block feeds two derived signals: the sweep axis (from the
//! sweep bounds at pixel (0, 0)) and the topography (parameter index 4).

use std::collections::HashMap;
use std::io::{BufRead, Seek};

use log::{debug, info, trace, warn};
use ndarray::{s, Array1, Array2, Array3, Axis};

use super::locator::HeaderLocation;
use crate::nanonis::codec::elements;
use crate::nanonis::types::error::{NanonisError, Result};
use crate::nanonis::types::filetypes::{ElementEncoding, FileKind};
use crate::nanonis::types::models::{DecodeOptions, Decoded, Header, HeaderValue, Signal, Signals};
use crate::nanonis::utils;

const KIND: FileKind = FileKind::Grid;

/// The end-tag line and the empty entry after its CRLF.
const TRAILING_ENTRIES: usize = 2;

/// Parameter-block index of the sweep start value.
pub const SWEEP_START_INDEX: usize = 0;
/// Parameter-block index of the sweep end value.
pub const SWEEP_END_INDEX: usize = 1;
/// Parameter-block index of the z-controller height.
///
/// Fixed by the vendor's parameter order: two sweep bounds, then X, Y and Z.
/// Files recorded with other experiment parameters hold something else here.
pub const TOPOGRAPHY_INDEX: usize = 4;

/// Signal name of the parameter block.
pub const PARAMS: &str = "params";
/// Signal name of the derived sweep axis.
pub const SWEEP_SIGNAL: &str = "sweep_signal";
/// Signal name of the derived topography.
pub const TOPO: &str = "topo";

/// Raw `key=value` entries awaiting typed extraction.
struct RawEntries {
    entries: HashMap<String, HeaderValue>,
}

impl RawEntries {
    fn parse(text: &str) -> Self {
        let mut entries = HashMap::new();
        for (index, entry) in utils::header_entries(text, "\r\n", TRAILING_ENTRIES)
            .into_iter()
            .enumerate()
        {
            if entry.is_empty() {
                continue;
            }
            match entry.split_once('=') {
                Some((key, raw)) => {
                    trace!("Grid header entry {:?} = {:?}", key, raw);
                    entries.insert(key.to_string(), utils::split_raw_value(raw));
                }
                None => warn!("Skipping grid header line {} without '=': {:?}", index + 1, entry),
            }
        }
        Self { entries }
    }

    fn apply_overrides(&mut self, overrides: &HashMap<String, String>) {
        for (key, raw) in overrides {
            let action = if self.entries.contains_key(key) { "Replacing" } else { "Injecting" };
            debug!("{} grid header key {:?} with override {:?}", action, key, raw);
            self.entries.insert(key.clone(), utils::split_raw_value(raw));
        }
    }

    fn take(&mut self, key: &str) -> Result<HeaderValue> {
        self.entries
            .remove(key)
            .ok_or_else(|| NanonisError::missing_key(KIND, key))
    }

    fn take_scalar(&mut self, key: &str) -> Result<String> {
        match self.take(key)? {
            HeaderValue::Text(text) => Ok(text),
            other => Err(NanonisError::malformed(KIND, key, other.to_string(), "a single value")),
        }
    }

    /// A list entry; one bare value becomes a one-element list.
    fn take_list(&mut self, key: &str) -> Result<Vec<String>> {
        match self.take(key)? {
            HeaderValue::Text(text) => Ok(vec![text]),
            HeaderValue::List(items) => Ok(items),
            other => Err(NanonisError::malformed(KIND, key, other.to_string(), "a list")),
        }
    }

    fn take_int(&mut self, key: &str) -> Result<i64> {
        let text = self.take_scalar(key)?;
        parse_int(key, &text)
    }

    fn take_float(&mut self, key: &str) -> Result<f64> {
        let text = self.take_scalar(key)?;
        parse_float(key, &text)
    }

    fn take_optional(&mut self, key: &str) -> Option<HeaderValue> {
        self.entries.remove(key)
    }
}

fn parse_int(key: &str, text: &str) -> Result<i64> {
    text.trim()
        .parse()
        .map_err(|_| NanonisError::malformed(KIND, key, text, "an integer"))
}

fn parse_float(key: &str, text: &str) -> Result<f64> {
    text.trim()
        .parse()
        .map_err(|_| NanonisError::malformed(KIND, key, text, "a number"))
}

/// Parses a grid header into typed fields.
///
/// `overrides` replace or inject raw entries before extraction, so a caller
/// can patch a malformed header. Keys the grammar does not know are kept as
/// raw text or lists.
pub fn parse_header(raw: &[u8], overrides: &HashMap<String, String>) -> Result<Header> {
    let (text, _) = utils::decode_lossy(raw);
    let mut raw_entries = RawEntries::parse(&text);
    raw_entries.apply_overrides(overrides);

    let mut header = Header::new(KIND);

    // Pixel grid
    let dim = raw_entries.take_scalar("Grid dim")?;
    let dim_px = dim
        .split(" x ")
        .map(|part| parse_int("Grid dim", part))
        .collect::<Result<Vec<_>>>()?;
    if dim_px.len() != 2 {
        return Err(NanonisError::malformed(KIND, "Grid dim", dim, "`<nx> x <ny>`"));
    }
    header.insert("dim_px", HeaderValue::IntList(dim_px));

    // Position, size and angle
    let settings = raw_entries.take_list("Grid settings")?;
    if settings.len() < 5 {
        return Err(NanonisError::malformed(
            KIND,
            "Grid settings",
            settings.join(";"),
            "five values (position x/y, size x/y, angle)",
        ));
    }
    let settings = settings
        .iter()
        .map(|value| parse_float("Grid settings", value))
        .collect::<Result<Vec<_>>>()?;
    header.insert("pos_xy", HeaderValue::FloatList(settings[0..2].to_vec()));
    header.insert("size_xy", HeaderValue::FloatList(settings[2..4].to_vec()));
    header.insert("angle", HeaderValue::Float(settings[4]));

    // Parameter block layout
    header.insert("sweep_signal", raw_entries.take("Sweep Signal")?);
    header.insert("fixed_parameters", raw_entries.take("Fixed parameters")?);
    header.insert("experimental_parameters", raw_entries.take("Experiment parameters")?);

    header.insert("num_parameters", HeaderValue::Int(raw_entries.take_int("# Parameters (4 byte)")?));
    header.insert("experiment_size", HeaderValue::Int(raw_entries.take_int("Experiment size (bytes)")?));
    header.insert("num_sweep_signal", HeaderValue::Int(raw_entries.take_int("Points")?));

    // Channels, always a list
    let channels = raw_entries.take_list("Channels")?;
    header.insert("num_channels", HeaderValue::Int(channels.len() as i64));
    header.insert("channels", HeaderValue::List(channels));

    header.insert(
        "measure_delay",
        HeaderValue::Float(raw_entries.take_float("Delay before measuring (s)")?),
    );

    // Optional metadata
    for (raw_key, key) in [
        ("Experiment", "experiment_name"),
        ("Start time", "start_time"),
        ("End time", "end_time"),
        ("User", "user"),
        ("Comment", "comment"),
    ] {
        if let Some(value) = raw_entries.take_optional(raw_key) {
            header.insert(key, value);
        }
    }

    // Unknown keys pass through
    for (key, value) in raw_entries.entries {
        if !header.contains_key(&key) {
            header.insert(key, value);
        }
    }

    Ok(header)
}

/// The payload geometry a grid header declares.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GridGeometry {
    pub nx: usize,
    pub ny: usize,
    pub num_parameters: usize,
    pub num_sweep_signal: usize,
    pub channels: Vec<String>,
}

impl GridGeometry {
    pub fn from_header(header: &Header) -> Result<Self> {
        let (nx, ny) = match header.int_list("dim_px")? {
            [nx, ny] => (to_count("dim_px", *nx)?, to_count("dim_px", *ny)?),
            other => {
                return Err(NanonisError::malformed(
                    KIND,
                    "dim_px",
                    format!("{:?}", other),
                    "two dimensions",
                ))
            }
        };
        Ok(Self {
            nx,
            ny,
            num_parameters: header.count("num_parameters")?,
            num_sweep_signal: header.count("num_sweep_signal")?,
            channels: header
                .text_list("channels")?
                .into_iter()
                .map(str::to_string)
                .collect(),
        })
    }

    /// Elements belonging to one pixel.
    pub fn pixel_stride(&self) -> usize {
        self.num_parameters
            .saturating_add(self.num_sweep_signal.saturating_mul(self.channels.len()))
    }

    /// Elements the whole payload must hold.
    pub fn num_elements(&self) -> usize {
        self.nx
            .saturating_mul(self.ny)
            .saturating_mul(self.pixel_stride())
    }
}

fn to_count(key: &str, value: i64) -> Result<usize> {
    usize::try_from(value)
        .map_err(|_| NanonisError::malformed(KIND, key, value.to_string(), "a non-negative integer"))
}

/// The reshaped payload: parameter block plus one sweep block per channel.
#[derive(Debug, Clone)]
pub struct GridPayload {
    /// Shape `(ny, nx, num_parameters)`.
    pub params: Array3<f64>,
    /// Channel name and block of shape `(ny, nx, num_sweep_signal)`, in header order.
    pub channels: Vec<(String, Array3<f64>)>,
}

/// Reshapes a flat payload into `(ny, nx, pixel_stride)` and slices it.
pub fn decode_payload(
    payload: &[u8],
    geometry: &GridGeometry,
    encoding: ElementEncoding,
) -> Result<GridPayload> {
    let stride = geometry.pixel_stride();
    let expected = geometry.num_elements();
    let flat = elements::decode(payload, encoding, expected)?;
    let actual = flat.len();
    let shaped = Array3::from_shape_vec((geometry.ny, geometry.nx, stride), flat).map_err(|_| {
        NanonisError::PayloadSizeMismatch {
            expected,
            actual,
            trailing_bytes: 0,
        }
    })?;

    let num_parameters = geometry.num_parameters;
    let num_sweep = geometry.num_sweep_signal;
    let params = shaped.slice(s![.., .., ..num_parameters]).to_owned();
    let channels = geometry
        .channels
        .iter()
        .enumerate()
        .map(|(i, name)| {
            let start = num_parameters + i * num_sweep;
            let stop = num_parameters + (i + 1) * num_sweep;
            (name.clone(), shaped.slice(s![.., .., start..stop]).to_owned())
        })
        .collect();

    Ok(GridPayload { params, channels })
}

/// Evenly spaced sweep values between the bounds stored at pixel (0, 0).
///
/// Every pixel is assumed to share the same sweep range.
pub fn derive_sweep_signal(params: &Array3<f64>, num_sweep_signal: usize) -> Result<Array1<f64>> {
    let available = params.len_of(Axis(2));
    let bound = |index: usize| {
        params
            .get((0, 0, index))
            .copied()
            .ok_or(NanonisError::ParameterOutOfRange {
                field: SWEEP_SIGNAL,
                index,
                available,
            })
    };
    let start = bound(SWEEP_START_INDEX)?;
    let end = bound(SWEEP_END_INDEX)?;
    Ok(Array1::linspace(start, end, num_sweep_signal))
}

/// The z-controller height of every pixel, shape `(ny, nx)`.
pub fn extract_topography(params: &Array3<f64>) -> Result<Array2<f64>> {
    let available = params.len_of(Axis(2));
    if available <= TOPOGRAPHY_INDEX {
        return Err(NanonisError::ParameterOutOfRange {
            field: TOPO,
            index: TOPOGRAPHY_INDEX,
            available,
        });
    }
    Ok(params.index_axis(Axis(2), TOPOGRAPHY_INDEX).to_owned())
}

/// Logs header fields that disagree with the geometry; never fatal.
fn check_consistency(header: &Header, geometry: &GridGeometry, element_size: usize) {
    if let Ok(experiment_size) = header.count("experiment_size") {
        let declared = geometry.num_sweep_signal * geometry.channels.len() * element_size;
        if experiment_size != declared {
            warn!(
                "Grid experiment size is {} bytes but {} points x {} channels need {}",
                experiment_size,
                geometry.num_sweep_signal,
                geometry.channels.len(),
                declared
            );
        }
    }

    let named = ["fixed_parameters", "experimental_parameters"]
        .iter()
        .filter_map(|key| header.text_list(key).ok())
        .map(|names| names.iter().filter(|name| !name.is_empty()).count())
        .sum::<usize>();
    if named != geometry.num_parameters {
        warn!(
            "Grid header names {} parameters but declares {}",
            named, geometry.num_parameters
        );
    }
}

/// Runs the grid pipeline on a located file.
pub fn decode<R: BufRead + Seek>(
    reader: &mut R,
    location: &HeaderLocation,
    options: &DecodeOptions,
) -> Result<Decoded> {
    let header = parse_header(&location.raw_header, &options.header_overrides)?;
    let geometry = GridGeometry::from_header(&header)?;
    let encoding = options.encoding.unwrap_or_default();
    check_consistency(&header, &geometry, encoding.size());

    debug!(
        "Grid geometry: {} x {} pixels, stride {} ({} parameters + {} points x {} channels), {}",
        geometry.nx,
        geometry.ny,
        geometry.pixel_stride(),
        geometry.num_parameters,
        geometry.num_sweep_signal,
        geometry.channels.len(),
        encoding
    );

    // The raw bytes are released before the derived fields are built.
    let GridPayload { params, channels } = {
        let payload = super::read_payload(reader, location.byte_offset)?;
        decode_payload(&payload, &geometry, encoding)?
    };

    let sweep_signal = derive_sweep_signal(&params, geometry.num_sweep_signal)?;
    let topo = extract_topography(&params)?;

    let mut signals = Signals::new();
    let mut warnings = Vec::new();
    for (name, block) in channels {
        super::insert_signal(&mut signals, &mut warnings, KIND, name, Signal::Volume(block));
    }
    // Derived entries win over channels of the same name.
    for (name, signal) in [
        (PARAMS, Signal::Volume(params)),
        (SWEEP_SIGNAL, Signal::Trace(sweep_signal)),
        (TOPO, Signal::Image(topo)),
    ] {
        super::insert_signal(&mut signals, &mut warnings, KIND, name.to_string(), signal);
    }

    info!("Decoded grid with {} channels", geometry.channels.len());
    Ok(Decoded {
        header,
        signals,
        warnings,
    })
}
