mod common;

use std::io::Cursor;

use anyhow::Result;
use float_cmp::assert_approx_eq;

use grib_core::grib::bitmap::BitmapRef;
use grib_core::{DecoderConfig, GribError, GribReader, RecordError};

use common::*;

fn latlon_message() -> Vec<u8> {
    let codes: Vec<u32> = (0..12).collect();
    grib1(&[
        pds(7, 0x80, 0),
        gds_latlon(4, 3, (60_000, -10_000), (58_000, -7_000), 0),
        bds(IBM_ONE, 0, 8, &codes),
    ])
}

/// 12 points of which 10 present, bit map section length one octet too long.
fn ecmwf_message() -> Vec<u8> {
    let mut present = [true; 12];
    present[1] = false;
    present[6] = false;
    let codes: Vec<u32> = (0..10).collect();
    grib1(&[
        pds(98, 0xc0, 0),
        gds_latlon(4, 3, (60_000, -10_000), (58_000, -7_000), 0),
        bms(&present, 1),
        bds(IBM_ONE, 0, 8, &codes),
    ])
}

#[test]
fn decodes_simple_edition_1_message() -> Result<()> {
    let bytes = latlon_message();
    let mut reader = GribReader::new(Cursor::new(bytes));

    let message = reader.next_message().unwrap()?;
    assert_eq!(message.indicator.edition, 1);
    assert_eq!(message.identification.centre_id, 7);
    assert_eq!(message.records.len(), 1);

    let record = message.records[0].as_ref().map_err(Clone::clone)?;
    assert_eq!(record.edition, 1);
    assert_eq!(record.bitmap, BitmapRef::Absent);
    assert_eq!(record.grid_definition.num_points, 12);
    assert_eq!(record.data_representation.num_values, 12);

    let pairs: Vec<_> = reader.read_grid_values(record)?.collect();
    assert_eq!(pairs.len(), 12);
    let (first, value) = pairs[0];
    assert_approx_eq!(f64, first.lat, 60.0, epsilon = 1e-9);
    assert_approx_eq!(f64, first.lon, 350.0, epsilon = 1e-9);
    assert_eq!(value, Some(1.0));

    let (last, value) = pairs[11];
    assert_approx_eq!(f64, last.lat, 58.0, epsilon = 1e-9);
    assert_approx_eq!(f64, last.lon, 353.0, epsilon = 1e-9);
    assert_eq!(value, Some(12.0));

    assert!(reader.next_message().is_none());
    Ok(())
}

#[test]
fn missing_grid_description_fails_the_record() -> Result<()> {
    let codes: Vec<u32> = (0..12).collect();
    let bytes = grib1(&[pds(7, 0x00, 0), bds(IBM_ONE, 0, 8, &codes)]);

    let message = GribReader::new(Cursor::new(bytes)).next_message().unwrap()?;
    assert!(matches!(
        message.records[0],
        Err(RecordError::UnsupportedTemplate {
            section: 2,
            template: 255,
            ..
        })
    ));
    Ok(())
}

#[test]
fn ecmwf_bitmap_length_is_corrected() -> Result<()> {
    testing_logger::setup();

    let mut reader = GribReader::new(Cursor::new(ecmwf_message()));
    let message = reader.next_message().unwrap()?;
    assert_eq!(message.identification.centre_id, 98);

    let record = message.records[0].as_ref().map_err(Clone::clone)?;
    assert!(matches!(record.bitmap, BitmapRef::Grib1 { length: 8, .. }));

    let values = reader.read_values(record)?;
    assert_eq!(values.len(), 12);
    assert_eq!(values[0], Some(1.0));
    assert_eq!(values[1], None);
    assert_eq!(values[2], Some(2.0));
    assert_eq!(values[6], None);
    assert_eq!(values[11], Some(10.0));

    testing_logger::validate(|logs| {
        assert!(logs
            .iter()
            .any(|log| log.level == log::Level::Warn && log.body.contains("ECMWF bit map section")));
    });
    Ok(())
}

#[test]
fn ecmwf_bitmap_length_is_kept_when_disabled() {
    let config = DecoderConfig {
        ecmwf_bitmap_workaround: false,
        ..Default::default()
    };
    let mut reader = GribReader::with_config(Cursor::new(ecmwf_message()), config);

    assert!(matches!(
        reader.next_message(),
        Some(Err(GribError::SectionLength { section: 4, .. }))
    ));
    assert!(reader.next_message().is_none());
}

#[test]
fn end_section_in_place_of_data_section() {
    let bytes = grib1(&[
        pds(7, 0x80, 0),
        gds_latlon(4, 3, (60_000, -10_000), (58_000, -7_000), 0),
    ]);

    assert!(matches!(
        GribReader::new(Cursor::new(bytes)).next_message(),
        Some(Err(GribError::UnexpectedSection { found: 5, .. }))
    ));
}
