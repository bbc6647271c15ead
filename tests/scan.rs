mod common;

use std::io::Cursor;

use common::{be_f32, le_f32, write_fixture, ScanFixture};
use nanonis_reader::{
    DecodeOptions, DecodeWarning, DecodedFile, ElementEncoding, FileKind, HeaderValue,
    NanonisError,
};
use tempfile::tempdir;

const CHANNELS: [&str; 4] = ["Z", "Current", "LI_Demod_1_X", "LI_Demod_1_Y"];

fn decode_bytes(bytes: Vec<u8>, options: &DecodeOptions) -> nanonis_reader::Result<DecodedFile> {
    DecodedFile::from_reader(&mut Cursor::new(bytes), FileKind::Scan, options)
}

#[test]
fn scan_channels_split_into_forward_and_backward() {
    let fixture = ScanFixture::new(64, 64, &CHANNELS);
    let dir = tempdir().expect("tempdir");
    let path = write_fixture(&dir, "img_001.sxm", &fixture.file());

    let scan = DecodedFile::open(&path).expect("open scan");
    assert_eq!(scan.kind(), FileKind::Scan);
    assert_eq!(scan.byte_offset(), fixture.header().len() as u64);
    assert_eq!(scan.signals().len(), CHANNELS.len());

    for (c, name) in CHANNELS.iter().enumerate() {
        let channel = scan
            .scan_channel(name)
            .unwrap_or_else(|| panic!("missing channel {}", name));
        assert_eq!(channel.forward.shape(), &[64, 64]);
        assert_eq!(channel.backward.shape(), &[64, 64]);
        for (y, x) in [(0, 0), (0, 63), (63, 0), (31, 17), (63, 63)] {
            assert_eq!(channel.forward[[y, x]], f64::from(fixture.value(c, 0, y, x)));
            assert_eq!(channel.backward[[y, x]], f64::from(fixture.value(c, 1, y, x)));
        }
    }
}

#[test]
fn scan_header_is_lower_cased_and_cast() {
    let fixture = ScanFixture::new(8, 4, &CHANNELS);
    let scan = decode_bytes(fixture.file(), &DecodeOptions::default()).expect("decode scan");
    let header = scan.header();

    assert_eq!(header.int_list("scan_pixels").unwrap(), &[8, 4]);
    assert_eq!(header.float_list("scan_range").unwrap(), &[1e-8, 1e-8]);
    assert_eq!(header.float_list("scan_offset").unwrap(), &[-2.5e-9, 3e-9]);
    assert_eq!(header.float_list("scan_time").unwrap(), &[10.0, 10.0]);
    assert_eq!(header.float("bias").unwrap(), 0.1);
    assert_eq!(header.float("acq_time").unwrap(), 40.0);
    assert_eq!(header.text("scan_dir").unwrap(), "up");
    assert_eq!(header.text("rec_date").unwrap(), "21.10.2014");
    assert_eq!(header.text("scanit_type").unwrap(), "FLOAT            MSBFIRST");
    assert!(!header.contains_key("SCAN_PIXELS"));
    assert!(header.keys().all(|key| key == key.to_lowercase()), "keys not lower-cased");

    assert_eq!(
        header.text("comment").unwrap(),
        "approach at 1 nA\ntip conditioned on Au(111)"
    );

    let data_info = header.table("data_info").expect("data_info table");
    assert_eq!(
        data_info.column_names().collect::<Vec<_>>(),
        vec!["Channel", "Name", "Unit", "Direction", "Calibration", "Offset"]
    );
    assert_eq!(data_info.num_rows(), CHANNELS.len());
    assert_eq!(data_info.column("Name").unwrap(), &CHANNELS.map(String::from));
    assert_eq!(data_info.column("Channel").unwrap()[3], "3");

    let z_controller = header.table("z-controller").expect("z-controller table");
    assert_eq!(z_controller.num_rows(), 1);
    assert_eq!(z_controller.column("Name").unwrap(), &["log Current".to_string()]);
    assert_eq!(z_controller.column("Setpoint").unwrap(), &["1.000E-10 A".to_string()]);
    assert!(matches!(header.get("z-controller"), Some(HeaderValue::Table(_))));

    let multipass = header.table("multipass-config").expect("multipass-config table");
    assert_eq!(
        multipass.column_names().collect::<Vec<_>>(),
        vec!["Record-Ch", "Playback", "Playback-Offset", "Bias-override", "Bias"]
    );
    assert_eq!(multipass.num_rows(), 2);
    assert_eq!(multipass.column("Playback").unwrap(), &["FALSE".to_string(), "TRUE".to_string()]);
    assert_eq!(multipass.column("Bias").unwrap()[1], "5.000E-1");
}

#[test]
fn scan_tag_without_value_is_empty_text() {
    let fixture = ScanFixture::new(3, 2, &CHANNELS[..1]);
    let header = String::from_utf8(fixture.header()).unwrap();
    let mut bytes = header.replace(":SCAN_DIR:\nup\n", ":SCAN_DIR:\n").into_bytes();
    bytes.extend(be_f32(&fixture.elements()));

    let scan = decode_bytes(bytes, &DecodeOptions::default()).expect("decode scan");
    assert_eq!(scan.header().text("scan_dir").unwrap(), "");
    assert_eq!(scan.header().float("bias").unwrap(), 0.1, "the next tag keeps its value");
}

#[test]
fn scan_duplicate_channel_names_are_reported() {
    let fixture = ScanFixture::new(2, 2, &["Z", "Z"]);
    let scan = decode_bytes(fixture.file(), &DecodeOptions::default()).expect("decode scan");

    assert_eq!(scan.signals().len(), 1);
    assert_eq!(
        scan.warnings(),
        &[DecodeWarning::DuplicateSignal {
            name: "Z".to_string()
        }]
    );
    // The later channel replaces the earlier one.
    let z = scan.scan_channel("Z").unwrap();
    assert_eq!(z.forward[[1, 1]], f64::from(fixture.value(1, 0, 1, 1)));
}

#[test]
fn scan_encoding_follows_scanit_type() {
    let mut fixture = ScanFixture::new(5, 3, &CHANNELS[..2]);
    fixture.scanit_type = "FLOAT            LSBFIRST";
    let mut bytes = fixture.header();
    bytes.extend(le_f32(&fixture.elements()));

    let scan = decode_bytes(bytes.clone(), &DecodeOptions::default()).expect("decode LSB scan");
    let current = scan.scan_channel("Current").unwrap();
    assert_eq!(current.backward[[2, 4]], f64::from(fixture.value(1, 1, 2, 4)));

    // An explicit encoding wins over the header.
    let forced = decode_bytes(
        bytes,
        &DecodeOptions::new().with_encoding(ElementEncoding::BigEndianF32),
    )
    .expect("forced encoding still has the right size");
    let current = forced.scan_channel("Current").unwrap();
    assert_ne!(current.backward[[2, 4]], f64::from(fixture.value(1, 1, 2, 4)));
}

#[test]
fn scan_payload_size_mismatch_is_rejected() {
    let fixture = ScanFixture::new(6, 6, &CHANNELS);
    let mut bytes = fixture.header();
    let mut elements = fixture.elements();
    elements.truncate(elements.len() - 6);
    bytes.extend(be_f32(&elements));

    match decode_bytes(bytes, &DecodeOptions::default()) {
        Err(NanonisError::PayloadSizeMismatch {
            expected, actual, ..
        }) => {
            assert_eq!(expected, 4 * 2 * 6 * 6);
            assert_eq!(actual, expected - 6);
        }
        other => panic!("expected PayloadSizeMismatch, got {:?}", other),
    }
}

#[test]
fn scan_without_pixels_is_rejected() {
    let fixture = ScanFixture::new(4, 4, &CHANNELS[..1]);
    let header = String::from_utf8(fixture.header()).unwrap();
    let (before, after) = header.split_once(":SCAN_PIXELS:\n").unwrap();
    let (_, after) = after.split_once('\n').unwrap();
    let mut bytes = format!("{}{}", before, after).into_bytes();
    bytes.extend(be_f32(&fixture.elements()));

    match decode_bytes(bytes, &DecodeOptions::default()) {
        Err(NanonisError::MissingHeaderKey { kind, key, hint }) => {
            assert_eq!(kind, FileKind::Scan);
            assert_eq!(key, "scan_pixels");
            assert!(hint.is_empty(), "scan headers cannot be patched");
        }
        other => panic!("expected MissingHeaderKey, got {:?}", other),
    }
}

#[test]
fn scan_without_end_tag_is_rejected() {
    let fixture = ScanFixture::new(2, 2, &CHANNELS[..1]);
    let header = String::from_utf8(fixture.header()).unwrap();
    let truncated = header.split(":SCANIT_END:").next().unwrap().to_string();

    match decode_bytes(truncated.into_bytes(), &DecodeOptions::default()) {
        Err(NanonisError::HeaderNotFound { kind, tag }) => {
            assert_eq!(kind, FileKind::Scan);
            assert_eq!(tag, ":SCANIT_END:");
        }
        other => panic!("expected HeaderNotFound, got {:?}", other),
    }
}

#[test]
fn scan_ignores_grid_overrides() {
    let fixture = ScanFixture::new(3, 3, &CHANNELS[..1]);
    let options = DecodeOptions::new().with_override("scan_pixels", "1 1");
    let scan = decode_bytes(fixture.file(), &options).expect("overrides are ignored");
    assert_eq!(scan.header().int_list("scan_pixels").unwrap(), &[3, 3]);
}
