use std::io::{self, Read, Seek};
use std::sync::Arc;

use crate::config::DecoderConfig;
use crate::grib::bitmap::{Bitmap, BitmapRef, BITMAP_FOLLOWS, BITMAP_PREVIOUS};
use crate::grib::cursor::BitCursor;
use crate::grib::packing::{self, Jpeg2000Codec};
use crate::grib::sections::grib1::{
    self, ProductDefinitionSection, BDS_HEADER_SIZE, SECTION_LENGTH_SIZE,
};
use crate::grib::sections::sect1::Identification;
use crate::grib::sections::sect3::GridDefinition;
use crate::grib::sections::sect4;
use crate::grib::sections::sect5::DataRepresentation;
use crate::grib::sections::{
    decode_body, record_level, Indicator, ProductDefinition, SectionHeader, SectionRef,
    SECT0_IS_MAGIC, SECT8_ES_MAGIC, SECT8_ES_SIZE,
};
use crate::grib::{GribError, GridValues, Message, Record, RecordError, Result};

/// Octets of an edition 2 section header: length (4) and number (1).
const SECT_HEADER_SIZE: u64 = 5;
const SECT0_IS_MAGIC_SIZE: u64 = SECT0_IS_MAGIC.len() as u64;
/// Conventional number of the edition 1 end section.
const GRIB1_END_SECTION: u8 = 5;
const ECMWF: u8 = 98;

type Shared<T> = std::result::Result<Arc<T>, RecordError>;

/// Where the scanner stands in the stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanState {
    /// Looking for the next `GRIB` magic.
    Seeking,
    IndicatorRead { start: u64, end: u64 },
    /// `last` is the number of the last section decoded.
    SectionsRead { start: u64, end: u64, last: u8 },
    Complete { end: u64 },
    /// A failure left no known place to resume from.
    Halted,
    /// The stream is exhausted.
    Finished,
}

/// Pull based GRIB decoder over a seekable stream.
///
/// Scanning a message only decodes its metadata sections; the bitmap and data
/// payloads are read back on demand through [`GribReader::read_values`].
pub struct GribReader<R> {
    cursor: BitCursor<R>,
    config: DecoderConfig,
    jpeg2000: Option<Box<dyn Jpeg2000Codec>>,
    state: ScanState,
    magics_found: usize,
}

impl<R: Read + Seek> GribReader<R> {
    pub fn new(reader: R) -> Self {
        Self::with_config(reader, DecoderConfig::default())
    }

    pub fn with_config(reader: R, config: DecoderConfig) -> Self {
        Self {
            cursor: BitCursor::new(reader),
            config,
            jpeg2000: None,
            state: ScanState::Seeking,
            magics_found: 0,
        }
    }

    pub fn with_jpeg2000_codec(mut self, codec: Box<dyn Jpeg2000Codec>) -> Self {
        self.jpeg2000 = Some(codec);
        self
    }

    pub fn config(&self) -> &DecoderConfig {
        &self.config
    }

    pub fn state(&self) -> ScanState {
        self.state
    }

    /// Hands the stream back to the caller.
    pub fn into_inner(self) -> R {
        self.cursor.into_inner()
    }

    pub fn messages(&mut self) -> Messages<'_, R> {
        Messages { reader: self }
    }

    /// Scans for the next message and decodes its sections.
    ///
    /// A failed message yields one error and scanning resumes at its end.
    /// Returns `None` once the stream is exhausted or scanning halted.
    pub fn next_message(&mut self) -> Option<Result<Message>> {
        if matches!(self.state, ScanState::Halted | ScanState::Finished) {
            return None;
        }

        let start = match self.seek_magic() {
            Ok(Some(start)) => start,
            Ok(None) if self.magics_found == 0 => {
                self.state = ScanState::Finished;
                return Some(Err(GribError::BadMagic));
            }
            Ok(None) => {
                debug!("End of stream after {} messages", self.magics_found);
                self.state = ScanState::Finished;
                return None;
            }
            Err(e) => {
                self.state = ScanState::Halted;
                return Some(Err(e.into()));
            }
        };

        Some(self.read_message(start))
    }

    fn seek_magic(&mut self) -> io::Result<Option<u64>> {
        self.state = ScanState::Seeking;
        let from = self.cursor.position();
        let mut matched = 0;
        let mut byte = [0; 1];

        loop {
            if self.cursor.read_available(&mut byte)? == 0 {
                return Ok(None);
            }
            if byte[0] == SECT0_IS_MAGIC[matched] {
                matched += 1;
                if matched == SECT0_IS_MAGIC.len() {
                    let start = self.cursor.position() - SECT0_IS_MAGIC_SIZE;
                    if start > from {
                        debug!("Skipped {} octets before message at {}", start - from, start);
                    }
                    self.magics_found += 1;
                    return Ok(Some(start));
                }
            } else {
                matched = if byte[0] == SECT0_IS_MAGIC[0] { 1 } else { 0 };
            }
        }
    }

    fn read_message(&mut self, start: u64) -> Result<Message> {
        let indicator = match self.read_indicator() {
            Ok(indicator) => indicator,
            Err(GribError::Io(e)) if e.kind() == io::ErrorKind::UnexpectedEof => {
                self.state = ScanState::Finished;
                return Err(truncated(start)(e));
            }
            Err(e) => {
                self.state = ScanState::Halted;
                return Err(e);
            }
        };

        if indicator.total_length < indicator.size() + SECT8_ES_SIZE {
            // not a message after all, look again right after the magic
            if let Err(e) = self.cursor.seek(start + SECT0_IS_MAGIC_SIZE) {
                self.state = ScanState::Halted;
                return Err(e.into());
            }
            self.state = ScanState::Seeking;
            return Err(GribError::SectionLength {
                section: 0,
                reason: format!(
                    "total length {} is shorter than the indicator and end sections",
                    indicator.total_length
                ),
            });
        }

        let end = start + indicator.total_length;
        self.state = ScanState::IndicatorRead { start, end };
        debug!(
            "GRIB{} message at {}, {} octets",
            indicator.edition, start, indicator.total_length
        );

        let result = match indicator.edition {
            1 => self.read_grib1(start, indicator),
            _ => self.read_grib2(start, indicator),
        }
        .map_err(|e| match e {
            GribError::Io(e) if e.kind() == io::ErrorKind::UnexpectedEof => truncated(start)(e),
            e => e,
        });

        match self.cursor.seek(end) {
            Ok(()) if result.is_ok() => self.state = ScanState::Complete { end },
            Ok(()) => self.state = ScanState::Seeking,
            Err(e) => {
                self.state = ScanState::Halted;
                if result.is_ok() {
                    return Err(e.into());
                }
            }
        }

        result
    }

    /// Octets 5 onwards of section 0.
    fn read_indicator(&mut self) -> Result<Indicator> {
        let mut buf = [0; 4];
        self.cursor.read_exact(&mut buf)?;

        match buf[3] {
            1 => Ok(Indicator {
                edition: 1,
                discipline: None,
                total_length: u32::from_be_bytes([0, buf[0], buf[1], buf[2]]) as u64,
            }),
            2 => Ok(Indicator {
                edition: 2,
                discipline: Some(buf[2]),
                total_length: self.cursor.read_u64()?,
            }),
            edition => Err(GribError::UnsupportedEdition(edition)),
        }
    }

    fn read_grib2(&mut self, start: u64, indicator: Indicator) -> Result<Message> {
        let end = start + indicator.total_length;
        let discipline = indicator.discipline.unwrap_or_default();

        let mut identification = None;
        let mut grid: Option<Shared<GridDefinition>> = None;
        let mut product: Option<Shared<ProductDefinition>> = None;
        let mut representation: Option<Shared<DataRepresentation>> = None;
        let mut bitmap: Option<std::result::Result<BitmapRef, RecordError>> = None;
        let mut defined_bitmap = None;
        let mut records = Vec::new();
        let mut last = 0;

        loop {
            let header = match self.read_grib2_header(start, end)? {
                Some(header) => header,
                None if last == 7 => break,
                None => {
                    return Err(GribError::UnexpectedSection {
                        expected: expected_after(last).to_string(),
                        found: 8,
                    })
                }
            };

            if !follows(last, header.number) {
                return Err(GribError::UnexpectedSection {
                    expected: expected_after(last).to_string(),
                    found: header.number,
                });
            }
            if header.size < SECT_HEADER_SIZE || header.end() + SECT8_ES_SIZE > end {
                return Err(GribError::SectionLength {
                    section: header.number,
                    reason: format!(
                        "{} octets at {} do not fit the message ending at {}",
                        header.size, header.offset, end
                    ),
                });
            }

            let body = self
                .cursor
                .read_bytes((header.size - SECT_HEADER_SIZE) as usize)?;
            let body_len = body.len();

            match header.number {
                1 => identification = Some(decode_body(1, body, Identification::decode)?),
                2 => debug!("Local use section of {} octets at {}", body_len, header.offset),
                3 => {
                    let definition =
                        record_level(decode_body(3, body, |c| GridDefinition::decode(c, body_len)))?;
                    grid = Some(definition.map(Arc::new));
                }
                4 => {
                    let definition = record_level(decode_body(4, body, |c| {
                        sect4::ProductDefinition::decode(c, discipline)
                    }))?;
                    product = Some(definition.map(|pd| Arc::new(ProductDefinition::Edition2(pd))));
                }
                5 => {
                    let definition = record_level(decode_body(5, body, DataRepresentation::decode))?;
                    representation = Some(definition.map(Arc::new));
                }
                6 => {
                    let npts = match &grid {
                        Some(Ok(definition)) => definition.num_points,
                        _ => 0,
                    };
                    bitmap = Some(match body.first().copied() {
                        Some(BITMAP_FOLLOWS) => {
                            let bitmap = BitmapRef::Grib2 {
                                offset: header.offset,
                                length: header.size,
                            };
                            defined_bitmap = Some(bitmap);
                            Ok(bitmap)
                        }
                        Some(BITMAP_PREVIOUS) => defined_bitmap.ok_or_else(|| {
                            RecordError::MalformedPacking(String::from(
                                "bitmap refers to a previous bitmap but none was defined",
                            ))
                        }),
                        Some(_) => record_level(decode_body(6, body, |c| {
                            Bitmap::decode(c, header.size, npts)
                        }))?
                        .map(|_| BitmapRef::Absent),
                        None => {
                            return Err(GribError::SectionLength {
                                section: 6,
                                reason: String::from("no bitmap indicator"),
                            })
                        }
                    });
                }
                7 => {
                    let data = SectionRef {
                        offset: header.offset + SECT_HEADER_SIZE,
                        length: header.size - SECT_HEADER_SIZE,
                    };
                    records.push(make_record(
                        2,
                        shared(&grid, 3)?,
                        shared(&product, 4)?,
                        shared(&representation, 5)?,
                        bitmap.clone().ok_or_else(|| missing_before_data(6))?,
                        data,
                    ));
                }
                _ => unreachable!("section order already checked"),
            }

            self.state = ScanState::SectionsRead {
                start,
                end,
                last: header.number,
            };
            last = header.number;
        }

        if self.cursor.position() != end {
            debug!(
                "End section ends at {} but the message declares {}",
                self.cursor.position(),
                end
            );
        }

        Ok(Message {
            offset: start,
            indicator,
            identification: identification.ok_or_else(|| missing_before_data(1))?,
            records,
        })
    }

    /// Reads the next section header, or `None` on the end section.
    fn read_grib2_header(&mut self, start: u64, end: u64) -> Result<Option<SectionHeader>> {
        let offset = self.cursor.position();
        if offset + SECT8_ES_SIZE > end {
            return Err(GribError::TruncatedMessage {
                offset: start,
                reason: format!("no end section before the message end at {}", end),
            });
        }

        let mut buf = [0; 4];
        self.cursor.read_exact(&mut buf)?;
        if buf == SECT8_ES_MAGIC {
            return Ok(None);
        }
        if offset + SECT_HEADER_SIZE + SECT8_ES_SIZE > end {
            return Err(GribError::TruncatedMessage {
                offset: start,
                reason: format!("no end section at {}", offset),
            });
        }

        Ok(Some(SectionHeader {
            offset,
            size: u32::from_be_bytes(buf) as u64,
            number: self.cursor.read_u8()?,
        }))
    }

    fn read_grib1(&mut self, start: u64, indicator: Indicator) -> Result<Message> {
        let end = start + indicator.total_length;

        let header = self.read_grib1_header(1, "product definition section", end)?;
        let body = self.read_grib1_body(&header)?;
        let pds = decode_body(1, body, ProductDefinitionSection::decode)?;
        self.state = ScanState::SectionsRead { start, end, last: 1 };

        let grid = if pds.has_gds() {
            let header = self.read_grib1_header(2, "grid description section", end)?;
            let body = self.read_grib1_body(&header)?;
            let body_len = body.len();
            self.state = ScanState::SectionsRead { start, end, last: 2 };
            record_level(decode_body(2, body, |c| grib1::gds::decode(c, body_len)))?
        } else {
            Err(RecordError::UnsupportedTemplate {
                section: 2,
                template: pds.grid_id as u16,
                reason: String::from("predefined grids are not supported"),
            })
        };

        let bitmap = if pds.has_bms() {
            let mut header = self.read_grib1_header(3, "bit map section", end)?;
            if self.config.ecmwf_bitmap_workaround && pds.centre == ECMWF {
                self.ecmwf_bitmap_length(&mut header, end)?;
            }
            self.cursor.seek(header.end())?;
            self.state = ScanState::SectionsRead { start, end, last: 3 };
            BitmapRef::Grib1 {
                offset: header.offset,
                length: header.size,
            }
        } else {
            BitmapRef::Absent
        };

        let header = self.read_grib1_header(4, "binary data section", end)?;
        if header.size < BDS_HEADER_SIZE {
            return Err(GribError::SectionLength {
                section: 4,
                reason: format!("{} octets cannot hold the data header", header.size),
            });
        }
        let head = self
            .cursor
            .read_bytes((BDS_HEADER_SIZE - SECTION_LENGTH_SIZE) as usize)?;
        let representation = record_level(decode_body(4, head, |c| {
            grib1::bds::decode(c, header.size, pds.decimal_scale_factor)
        }))?;
        let data = SectionRef {
            offset: header.offset + BDS_HEADER_SIZE,
            length: header.size - BDS_HEADER_SIZE,
        };
        self.cursor.seek(header.end())?;
        self.state = ScanState::SectionsRead { start, end, last: 4 };

        let mut buf = [0; 4];
        self.cursor.read_exact(&mut buf)?;
        if buf != SECT8_ES_MAGIC {
            return Err(GribError::TruncatedMessage {
                offset: start,
                reason: format!("no end section after the data section at {}", header.offset),
            });
        }

        let identification = pds.identification();
        let record = make_record(
            1,
            grid.map(Arc::new),
            Ok(Arc::new(ProductDefinition::Edition1(pds))),
            representation.map(Arc::new),
            Ok(bitmap),
            data,
        );

        Ok(Message {
            offset: start,
            indicator,
            identification,
            records: vec![record],
        })
    }

    fn read_grib1_header(&mut self, number: u8, name: &str, end: u64) -> Result<SectionHeader> {
        let offset = self.cursor.position();
        let mut buf = [0; 4];
        if offset + SECT8_ES_SIZE <= end {
            self.cursor.read_exact(&mut buf)?;
        }
        if offset + SECT8_ES_SIZE > end || buf == SECT8_ES_MAGIC {
            return Err(GribError::UnexpectedSection {
                expected: name.to_string(),
                found: GRIB1_END_SECTION,
            });
        }

        let size = u32::from_be_bytes([0, buf[0], buf[1], buf[2]]) as u64;
        if size <= SECTION_LENGTH_SIZE || offset + size + SECT8_ES_SIZE > end {
            return Err(GribError::SectionLength {
                section: number,
                reason: format!(
                    "{} of {} octets at {} does not fit the message ending at {}",
                    name, size, offset, end
                ),
            });
        }
        self.cursor.seek(offset + SECTION_LENGTH_SIZE)?;

        Ok(SectionHeader {
            offset,
            size,
            number,
        })
    }

    fn read_grib1_body(&mut self, header: &SectionHeader) -> Result<Vec<u8>> {
        Ok(self
            .cursor
            .read_bytes((header.size - SECTION_LENGTH_SIZE) as usize)?)
    }

    /// Known ECMWF encoder defect: the bit map section length can be one octet
    /// too long. When the data section found after it would overrun the
    /// message, the bit map is taken one octet shorter.
    fn ecmwf_bitmap_length(&mut self, bms: &mut SectionHeader, end: u64) -> Result<()> {
        let bds_offset = bms.end();
        if bds_offset + SECTION_LENGTH_SIZE > end {
            return Ok(());
        }
        self.cursor.seek(bds_offset)?;
        let bds_size = self.cursor.read_u24()? as u64;
        if bds_offset + bds_size + SECT8_ES_SIZE > end && bms.size > 6 {
            warn!(
                "ECMWF bit map section at {} overruns the message end {}, length {} taken as {}",
                bms.offset,
                end,
                bms.size,
                bms.size - 1
            );
            bms.size -= 1;
        }
        Ok(())
    }

    /// Decodes the values of `record`, one per grid point in scanning order;
    /// points masked by the bitmap or coded as missing are `None`.
    pub fn read_values(&mut self, record: &Record) -> Result<Vec<Option<f64>>> {
        let npts = record.grid_definition.num_points;
        let bitmap = self.read_bitmap(record.bitmap, npts)?;

        self.cursor.seek(record.data.offset)?;
        let payload = self
            .cursor
            .read_bytes(record.data.length as usize)
            .map_err(truncated(record.data.offset))?;

        let representation = &record.data_representation;
        Ok(packing::decode_values(
            &payload,
            &representation.packing,
            representation.num_values,
            &bitmap,
            npts,
            self.jpeg2000.as_deref(),
        )?)
    }

    /// Decodes the values of `record` paired with the coordinates of their
    /// grid points.
    pub fn read_grid_values<'a>(&mut self, record: &'a Record) -> Result<GridValues<'a>> {
        let values = self.read_values(record)?;
        Ok(GridValues::new(&record.grid_definition.grid, values, self.tolerance())?)
    }

    /// As [`GribReader::read_grid_values`], rotated grids being given in true
    /// latitude and longitude.
    pub fn read_geographic_values<'a>(&mut self, record: &'a Record) -> Result<GridValues<'a>> {
        let values = self.read_values(record)?;
        Ok(GridValues::geographic(
            &record.grid_definition.grid,
            values,
            self.tolerance(),
        )?)
    }

    fn tolerance(&self) -> Option<f64> {
        self.config
            .check_geometry
            .then(|| self.config.geometry_tolerance)
    }

    fn read_bitmap(&mut self, bitmap: BitmapRef, npts: usize) -> Result<Bitmap> {
        match bitmap {
            BitmapRef::Absent => Ok(Bitmap::Absent),
            BitmapRef::Grib2 { offset, length } => {
                let body = self.read_section_body(offset, SECT_HEADER_SIZE, length)?;
                decode_body(6, body, |c| Bitmap::decode(c, length, npts))
            }
            BitmapRef::Grib1 { offset, length } => {
                let body = self.read_section_body(offset, SECTION_LENGTH_SIZE, length)?;
                decode_body(3, body, |c| Bitmap::decode_grib1(c, length, npts))
            }
        }
    }

    fn read_section_body(&mut self, offset: u64, header_size: u64, length: u64) -> Result<Vec<u8>> {
        self.cursor.seek(offset + header_size)?;
        self.cursor
            .read_bytes(length.saturating_sub(header_size) as usize)
            .map_err(truncated(offset))
    }
}

/// Iterator over the remaining messages of a [`GribReader`].
pub struct Messages<'a, R> {
    reader: &'a mut GribReader<R>,
}

impl<'a, R: Read + Seek> Iterator for Messages<'a, R> {
    type Item = Result<Message>;

    fn next(&mut self) -> Option<Self::Item> {
        self.reader.next_message()
    }
}

fn truncated(offset: u64) -> impl FnOnce(io::Error) -> GribError {
    move |e| {
        if e.kind() == io::ErrorKind::UnexpectedEof {
            GribError::TruncatedMessage {
                offset,
                reason: String::from("stream ends inside the message"),
            }
        } else {
            e.into()
        }
    }
}

/// Edition 2 section order, including the repetition of sections 2 to 7.
fn follows(last: u8, number: u8) -> bool {
    matches!(
        (last, number),
        (0, 1) | (1, 2) | (1, 3) | (2, 3) | (3, 4) | (4, 5) | (5, 6) | (6, 7) | (7, 2) | (7, 3) | (7, 4)
    )
}

fn expected_after(last: u8) -> &'static str {
    match last {
        0 => "section 1",
        1 => "section 2 or 3",
        2 => "section 3",
        3 => "section 4",
        4 => "section 5",
        5 => "section 6",
        6 => "section 7",
        _ => "section 2, 3, 4 or end section",
    }
}

fn missing_before_data(number: u8) -> GribError {
    GribError::UnexpectedSection {
        expected: format!("section {}", number),
        found: 7,
    }
}

fn shared<T>(slot: &Option<Shared<T>>, number: u8) -> Result<Shared<T>> {
    slot.clone().ok_or_else(|| missing_before_data(number))
}

fn make_record(
    edition: u8,
    grid_definition: Shared<GridDefinition>,
    product_definition: Shared<ProductDefinition>,
    data_representation: Shared<DataRepresentation>,
    bitmap: std::result::Result<BitmapRef, RecordError>,
    data: SectionRef,
) -> std::result::Result<Record, RecordError> {
    Ok(Record {
        edition,
        grid_definition: grid_definition?,
        product_definition: product_definition?,
        data_representation: data_representation?,
        bitmap: bitmap?,
        data,
    })
}
