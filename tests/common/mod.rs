//! Synthetic vendor files for the integration tests.
#![allow(dead_code)]

use std::fs;
use std::path::PathBuf;

use byteorder::{BigEndian, LittleEndian, WriteBytesExt};
use tempfile::TempDir;

pub const EXPERIMENT_PARAMETERS: [&str; 8] = [
    "X (m)",
    "Y (m)",
    "Z (m)",
    "Z offset (m)",
    "Settling time (s)",
    "Integration time (s)",
    "Z-Ctrl hold",
    "Final Z (m)",
];

pub fn write_fixture(dir: &TempDir, name: &str, bytes: &[u8]) -> PathBuf {
    let path = dir.path().join(name);
    fs::write(&path, bytes).unwrap_or_else(|e| panic!("failed to write {}: {}", path.display(), e));
    path
}

/// A grid file description; values are chosen so every element is unique
/// and exact in f32.
pub struct GridFixture {
    pub nx: usize,
    pub ny: usize,
    pub points: usize,
    pub channels: Vec<&'static str>,
    pub experiment_parameters: Vec<&'static str>,
}

impl GridFixture {
    pub fn new(nx: usize, ny: usize, points: usize, channels: &[&'static str]) -> Self {
        Self {
            nx,
            ny,
            points,
            channels: channels.to_vec(),
            experiment_parameters: EXPERIMENT_PARAMETERS.to_vec(),
        }
    }

    pub fn num_parameters(&self) -> usize {
        2 + self.experiment_parameters.len()
    }

    pub fn entries(&self) -> Vec<(&'static str, String)> {
        vec![
            ("Grid dim", format!("\"{} x {}\"", self.nx, self.ny)),
            (
                "Grid settings",
                "4.026839E-9;-4.295725E-8;1.500000E-8;1.500000E-8;0.000000E+0".to_string(),
            ),
            ("Filetype", "Linear".to_string()),
            ("Sweep Signal", "\"Bias (V)\"".to_string()),
            ("Fixed parameters", "\"Sweep Start;Sweep End\"".to_string()),
            (
                "Experiment parameters",
                format!("\"{}\"", self.experiment_parameters.join(";")),
            ),
            ("# Parameters (4 byte)", self.num_parameters().to_string()),
            (
                "Experiment size (bytes)",
                (self.points * self.channels.len() * 4).to_string(),
            ),
            ("Points", self.points.to_string()),
            ("Channels", format!("\"{}\"", self.channels.join(";"))),
            ("Delay before measuring (s)", "0.000000E+0".to_string()),
            ("Experiment", "\"Grid Spectroscopy\"".to_string()),
            ("Start time", "\"21.10.2014 16:48:06\"".to_string()),
            ("End time", "\"23.10.2014 10:42:19\"".to_string()),
            ("User", String::new()),
            ("Comment", String::new()),
        ]
    }

    /// Header bytes up to and including the end tag, leaving out `omit` keys.
    pub fn header(&self, omit: &[&str]) -> Vec<u8> {
        let mut text = String::new();
        for (key, value) in self.entries() {
            if omit.contains(&key) {
                continue;
            }
            text.push_str(&format!("{}={}\r\n", key, value));
        }
        text.push_str(":HEADER_END:\r\n");
        text.into_bytes()
    }

    pub fn param_value(&self, y: usize, x: usize, k: usize) -> f32 {
        match k {
            0 => -1.0,
            1 => 1.0,
            4 => (y * 100 + x) as f32,
            _ => k as f32 * 0.5,
        }
    }

    pub fn channel_value(&self, channel: usize, y: usize, x: usize, point: usize) -> f32 {
        let pixel = y * self.nx + x;
        (channel * 1_000_000 + (pixel % 10_000) * 1000 + point % 1000) as f32
    }

    /// The element sequence in file order: row by row, pixel by pixel.
    pub fn elements(&self) -> Vec<f32> {
        let mut values = Vec::with_capacity(
            self.nx * self.ny * (self.num_parameters() + self.points * self.channels.len()),
        );
        for y in 0..self.ny {
            for x in 0..self.nx {
                for k in 0..self.num_parameters() {
                    values.push(self.param_value(y, x, k));
                }
                for c in 0..self.channels.len() {
                    for p in 0..self.points {
                        values.push(self.channel_value(c, y, x, p));
                    }
                }
            }
        }
        values
    }

    pub fn payload(&self) -> Vec<u8> {
        be_f32(&self.elements())
    }

    pub fn file(&self) -> Vec<u8> {
        let mut bytes = self.header(&[]);
        bytes.extend(self.payload());
        bytes
    }
}

pub fn be_f32(values: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(values.len() * 4);
    for value in values {
        bytes.write_f32::<BigEndian>(*value).expect("write to Vec");
    }
    bytes
}

pub fn le_f32(values: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(values.len() * 4);
    for value in values {
        bytes.write_f32::<LittleEndian>(*value).expect("write to Vec");
    }
    bytes
}

pub fn le_f64(values: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(values.len() * 8);
    for value in values {
        bytes.write_f64::<LittleEndian>(f64::from(*value)).expect("write to Vec");
    }
    bytes
}

/// A scan file description.
pub struct ScanFixture {
    pub nx: usize,
    pub ny: usize,
    pub channels: Vec<&'static str>,
    pub scanit_type: &'static str,
    pub comment: Vec<&'static str>,
}

impl ScanFixture {
    pub fn new(nx: usize, ny: usize, channels: &[&'static str]) -> Self {
        Self {
            nx,
            ny,
            channels: channels.to_vec(),
            scanit_type: "FLOAT            MSBFIRST",
            comment: vec!["approach at 1 nA", "tip conditioned on Au(111)"],
        }
    }

    /// Header bytes through the end-tag line and the two marker bytes.
    pub fn header(&self) -> Vec<u8> {
        let mut text = String::new();
        let mut field = |tag: &str, value: &str| {
            text.push_str(&format!(":{}:\n{}\n", tag, value));
        };
        field("NANONIS_VERSION", "2");
        field("SCANIT_TYPE", &format!("              {}", self.scanit_type));
        field("REC_DATE", "21.10.2014");
        field("REC_TIME", "16:48:06");
        field("SCAN_PIXELS", &format!("       {}       {}", self.nx, self.ny));
        field("SCAN_TIME", "             1.000E+1             1.000E+1");
        field("SCAN_RANGE", "           1.000000E-8           1.000000E-8");
        field("SCAN_OFFSET", "        -2.500000E-9         3.000000E-9");
        field("SCAN_ANGLE", "            0.000E+0");
        field("SCAN_DIR", "up");
        field("BIAS", "            1.000E-1");
        text.push_str(":Z-CONTROLLER:\n");
        text.push_str("\tName\ton\tSetpoint\tP-gain\tI-gain\tT-const\n");
        text.push_str("\tlog Current\t1\t1.000E-10 A\t6.000E-12 m\t1.000E-8 m/s\t6.000E-4 s\n");
        text.push_str(":Multipass-Config:\n");
        text.push_str("\tRecord-Ch\tPlayback\tPlayback-Offset\tBias-override\tBias\n");
        text.push_str("\t1\tFALSE\t0.000E+0\tFALSE\t-5.000E-1\n");
        text.push_str("\t2\tTRUE\t1.000E-10\tTRUE\t5.000E-1\n");
        text.push_str(":COMMENT:\n");
        for line in &self.comment {
            text.push_str(line);
            text.push('\n');
        }
        text.push_str(":ACQ_TIME:\n           40.0\n");
        text.push_str(":DATA_INFO:\n");
        text.push_str("\tChannel\tName\tUnit\tDirection\tCalibration\tOffset\n");
        for (i, name) in self.channels.iter().enumerate() {
            text.push_str(&format!("\t{}\t{}\tA\tboth\t1.000E+0\t0.000E+0\n", i, name));
        }
        text.push_str("\n:SCANIT_END:\n");
        let mut bytes = text.into_bytes();
        bytes.extend_from_slice(&[0x1A, 0x04]);
        bytes
    }

    pub fn value(&self, channel: usize, direction: usize, y: usize, x: usize) -> f32 {
        (channel * 100_000 + direction * 10_000 + y * self.nx + x) as f32
    }

    pub fn elements(&self) -> Vec<f32> {
        let mut values = Vec::new();
        for c in 0..self.channels.len() {
            for d in 0..2 {
                for y in 0..self.ny {
                    for x in 0..self.nx {
                        values.push(self.value(c, d, y, x));
                    }
                }
            }
        }
        values
    }

    pub fn file(&self) -> Vec<u8> {
        let mut bytes = self.header();
        bytes.extend(be_f32(&self.elements()));
        bytes
    }
}

pub const SPEC_COLUMNS: [&str; 3] = ["Bias calc (V)", "Current (A)", "LI Demod 1 X (A)"];

/// A point spectroscopy file with `rows` data rows.
pub fn spec_file(rows: usize) -> Vec<u8> {
    let mut text = String::new();
    text.push_str("Experiment\tbias spectroscopy\t\r\n");
    text.push_str("Date\t21.10.2014 16:48:06\t\r\n");
    text.push_str("User\t\t\r\n");
    text.push_str("Saved Date\t21.10.2014 16:50:00\r\n");
    text.push_str("Comment\r\n");
    text.push_str("Bias Spectroscopy>Channels\tCurrent (A);LI Demod 1 X (A)\t\r\n");
    text.push_str("\r\n[DATA]\r\n");
    text.push_str(&SPEC_COLUMNS.join("\t"));
    text.push_str("\t\r\n");
    for row in 0..rows {
        text.push_str(&format!(
            "{:.6E}\t{:.6E}\t{:.6E}\r\n",
            -1.0 + row as f64 * 0.01,
            row as f64 * 1e-12,
            -(row as f64) * 1e-13
        ));
    }
    text.into_bytes()
}
