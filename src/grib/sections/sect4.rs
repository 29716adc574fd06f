use std::io::Read;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use crate::grib::cursor::BitCursor;
use crate::grib::sections::sect1::ref_time;
use crate::grib::{RecordError, Result};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProductDefinition {
    /// Discipline of the message the product belongs to (Code Table 0.0)
    pub discipline: u8,
    /// Number of coordinate values after Template
    pub num_coordinates: u16,
    /// Product Definition Template Number
    pub template_number: u16,
    pub product: Product,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Product {
    pub parameter_category: u8,
    pub parameter_number: u8,
    pub process_type: u8,
    pub background_process: u8,
    pub analysis_process: u8,
    pub hours: u16,
    pub minutes: u8,
    /// Indicator of unit of time range (see Code Table 4.4)
    pub time_unit: u8,
    pub forecast_time_value: u32,
    #[serde(skip)]
    pub forecast_time: Option<Duration>,
    pub first_surface: Surface,
    pub second_surface: Surface,
    /// Template 4.1
    pub ensemble: Option<Ensemble>,
    /// Template 4.8
    pub statistics: Option<Statistics>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Surface {
    pub surface_type: u8,
    pub scale_factor: i8,
    pub scaled_value: Option<u32>,
}

impl Surface {
    pub fn value(&self) -> Option<f64> {
        match (self.surface_type, self.scaled_value) {
            (u8::MAX, _) | (_, None) => None,
            (_, Some(v)) => Some(v as f64 * 10_f64.powi(-(self.scale_factor as i32))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Ensemble {
    pub forecast_type: u8,
    pub perturbation_number: u8,
    pub num_forecasts: u8,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Statistics {
    pub end_of_interval: Option<DateTime<Utc>>,
    pub num_missing: u32,
    pub time_ranges: Vec<TimeRange>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TimeRange {
    pub statistical_process: u8,
    pub increment_type: u8,
    pub unit: u8,
    pub length: u32,
    pub increment_unit: u8,
    pub increment: u32,
}

/// Code Table 4.4. Months, years and longer are counted in 30 and 365 day units.
/// Values past the range of a `Duration` become `None` with a warning.
pub fn forecast_duration(unit: u8, value: i64) -> Option<Duration> {
    let duration = match unit {
        0 => Duration::try_minutes(value),
        1 => Duration::try_hours(value),
        2 => Duration::try_days(value),
        3 => value.checked_mul(30).and_then(Duration::try_days),
        4 => value.checked_mul(365).and_then(Duration::try_days),
        5 => value.checked_mul(10 * 365).and_then(Duration::try_days),
        6 => value.checked_mul(30 * 365).and_then(Duration::try_days),
        7 => value.checked_mul(100 * 365).and_then(Duration::try_days),
        10 => value.checked_mul(3).and_then(Duration::try_hours),
        11 => value.checked_mul(6).and_then(Duration::try_hours),
        12 => value.checked_mul(12).and_then(Duration::try_hours),
        13 => Duration::try_seconds(value),
        n => {
            warn!("Forecast Time Unit `{}` does not exist.", n);
            return None;
        }
    };
    if duration.is_none() {
        warn!("Forecast time {} in unit `{}` is out of range.", value, unit);
    }
    duration
}

impl ProductDefinition {
    pub(crate) fn decode<R: Read>(cursor: &mut BitCursor<R>, discipline: u8) -> Result<Self> {
        let num_coordinates = cursor.read_u16()?;
        let template_number = cursor.read_u16()?;

        if !matches!(template_number, 0 | 1 | 8) {
            return Err(RecordError::UnsupportedTemplate {
                section: 4,
                template: template_number,
                reason: String::from("no decoder for this product definition template"),
            }
            .into());
        }

        let parameter_category = cursor.read_u8()?;
        let parameter_number = cursor.read_u8()?;
        let process_type = cursor.read_u8()?;
        let background_process = cursor.read_u8()?;
        let analysis_process = cursor.read_u8()?;
        let hours = cursor.read_u16()?;
        let minutes = cursor.read_u8()?;
        let time_unit = cursor.read_u8()?;
        let forecast_time_value = cursor.read_u32()?;
        let first_surface = read_surface(cursor)?;
        let second_surface = read_surface(cursor)?;

        let ensemble = if template_number == 1 {
            Some(Ensemble {
                forecast_type: cursor.read_u8()?,
                perturbation_number: cursor.read_u8()?,
                num_forecasts: cursor.read_u8()?,
            })
        } else {
            None
        };

        let statistics = if template_number == 8 {
            let year = cursor.read_u16()?;
            let mut fields = [0; 5];
            cursor.read_exact(&mut fields)?;
            let num_ranges = cursor.read_u8()?;
            let num_missing = cursor.read_u32()?;
            let time_ranges = (0..num_ranges)
                .map(|_| -> Result<TimeRange> {
                    Ok(TimeRange {
                        statistical_process: cursor.read_u8()?,
                        increment_type: cursor.read_u8()?,
                        unit: cursor.read_u8()?,
                        length: cursor.read_u32()?,
                        increment_unit: cursor.read_u8()?,
                        increment: cursor.read_u32()?,
                    })
                })
                .collect::<Result<Vec<_>>>()?;
            Some(Statistics {
                end_of_interval: ref_time(
                    year as i32,
                    fields[0],
                    fields[1],
                    fields[2],
                    fields[3],
                    fields[4],
                ),
                num_missing,
                time_ranges,
            })
        } else {
            None
        };

        Ok(Self {
            discipline,
            num_coordinates,
            template_number,
            product: Product {
                parameter_category,
                parameter_number,
                process_type,
                background_process,
                analysis_process,
                hours,
                minutes,
                time_unit,
                forecast_time_value,
                forecast_time: forecast_duration(time_unit, forecast_time_value as i64),
                first_surface,
                second_surface,
                ensemble,
                statistics,
            },
        })
    }
}

fn read_surface<R: Read>(cursor: &mut BitCursor<R>) -> Result<Surface> {
    Ok(Surface {
        surface_type: cursor.read_u8()?,
        scale_factor: cursor.read_i8()?,
        scaled_value: cursor.read_u32_opt()?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn template_0(template: u16) -> Vec<u8> {
        let mut body = vec![0, 0];
        body.extend(template.to_be_bytes());
        body.extend([2, 2, 2, 0, 96, 0, 0, 0, 1]);
        body.extend(6u32.to_be_bytes());
        body.extend([103, 0, 0, 0, 0, 10, 255, 255, 255, 255, 255, 255]);
        body
    }

    #[test]
    fn decodes_template_0() {
        let body = template_0(0);
        let pd = ProductDefinition::decode(&mut BitCursor::new(Cursor::new(body)), 0).unwrap();
        assert_eq!(pd.product.parameter_category, 2);
        assert_eq!(pd.product.parameter_number, 2);
        assert_eq!(pd.product.forecast_time, Some(Duration::hours(6)));
        assert_eq!(pd.product.first_surface.value(), Some(10.0));
        assert_eq!(pd.product.second_surface.value(), None);
    }

    #[test]
    fn decodes_statistics_of_template_8() {
        let mut body = template_0(8);
        body.extend([0x07, 0xe5, 10, 21, 12, 0, 0, 1]);
        body.extend(0u32.to_be_bytes());
        body.extend([1, 2, 1]);
        body.extend(6u32.to_be_bytes());
        body.push(255);
        body.extend(0u32.to_be_bytes());
        let pd = ProductDefinition::decode(&mut BitCursor::new(Cursor::new(body)), 0).unwrap();
        let stats = pd.product.statistics.unwrap();
        assert!(stats.end_of_interval.is_some());
        assert_eq!(stats.time_ranges.len(), 1);
        assert_eq!(stats.time_ranges[0].statistical_process, 1);
        assert_eq!(stats.time_ranges[0].length, 6);
    }

    #[test]
    fn unknown_template_is_a_record_error() {
        let body = template_0(15);
        assert!(matches!(
            ProductDefinition::decode(&mut BitCursor::new(Cursor::new(body)), 0),
            Err(crate::grib::GribError::Record(RecordError::UnsupportedTemplate {
                section: 4,
                template: 15,
                ..
            }))
        ));
    }

    #[test]
    fn unknown_time_unit_is_undefined() {
        testing_logger::setup();
        assert_eq!(forecast_duration(9, 1), None);
        testing_logger::validate(|logs| {
            assert_eq!(logs.len(), 1);
            assert_eq!(logs[0].level, log::Level::Warn);
        });
    }

    #[test]
    fn long_time_units_out_of_range() {
        testing_logger::setup();
        for unit in 3..=7 {
            assert_eq!(forecast_duration(unit, u32::MAX as i64), None);
        }
        assert_eq!(forecast_duration(1, 24), Some(Duration::days(1)));
        testing_logger::validate(|logs| {
            assert_eq!(logs.len(), 5);
            assert!(logs
                .iter()
                .all(|log| log.level == log::Level::Warn && log.body.contains("out of range")));
        });
    }
}
