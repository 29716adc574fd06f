#[macro_use]
extern crate log;

use std::fs::File;
use std::io::{self, BufReader, Write};
use std::path::PathBuf;

use anyhow::Context;
use structopt::StructOpt;

use grib_core::config::AppConfig;
use grib_core::error::{Error, Result};
use grib_core::grib::grid::Coordinate;
use grib_core::grib::{GribReader, Message, Record};

#[derive(Debug, StructOpt)]
#[structopt(name = "gribdump", about = "Lists the messages and records of a GRIB file")]
struct Cli {
    /// config file
    #[structopt(long = "config", short = "c", default_value = "gribdump.yaml")]
    config_file: PathBuf,

    /// decode and print the values of every record
    #[structopt(long)]
    values: bool,

    /// one JSON document per message
    #[structopt(long)]
    json: bool,

    /// GRIB file
    #[structopt(parse(from_os_str))]
    file: PathBuf,
}

fn main() -> anyhow::Result<()> {
    std::env::var("RUST_LOG")
        .map_err(|_| {
            std::env::set_var("RUST_LOG", "error,grib_core=info,gribdump=info");
        })
        .unwrap_or_default();
    env_logger::init();

    let args = Cli::from_args();

    let config: AppConfig = confy::load_path(&args.config_file)
        .with_context(|| format!("loading config {}", args.config_file.display()))?;

    let file = File::open(&args.file).with_context(|| format!("opening {}", args.file.display()))?;
    let mut reader = GribReader::with_config(BufReader::new(file), config.decoder);

    let stdout = io::stdout();
    let mut out = stdout.lock();
    let mut index = 0;

    while let Some(message) = reader.next_message() {
        match message {
            Ok(message) => dump_message(&mut reader, &mut out, index, &message, &args)?,
            Err(e) => error!("Message {} : {}", index, e),
        }
        index += 1;
    }

    Ok(())
}

fn dump_message<R: io::Read + io::Seek, W: Write>(
    reader: &mut GribReader<R>,
    out: &mut W,
    index: usize,
    message: &Message,
    args: &Cli,
) -> Result<()> {
    if args.json {
        let values = if args.values {
            message
                .records
                .iter()
                .map(|record| {
                    match record
                        .as_ref()
                        .map_err(|e| Error::from(e.clone()))
                        .and_then(|record| read_record(reader, record))
                    {
                        Ok(values) => Some(values),
                        Err(e) => {
                            error!("Message {} : {}", index, e);
                            None
                        }
                    }
                })
                .collect::<Vec<_>>()
        } else {
            Vec::new()
        };
        serde_json::to_writer(&mut *out, &serde_json::json!({ "message": message, "values": values }))?;
        writeln!(out)?;
        return Ok(());
    }

    writeln!(
        out,
        "{} : GRIB{} at {}, {} octets, centre {}, reference time {}",
        index,
        message.indicator.edition,
        message.offset,
        message.indicator.total_length,
        message.identification.centre_id,
        message
            .identification
            .ref_time
            .map(|t| t.to_rfc3339())
            .unwrap_or_else(|| String::from("invalid")),
    )?;

    for (number, record) in message.records.iter().enumerate() {
        let record = match record {
            Ok(record) => record,
            Err(e) => {
                writeln!(out, "  {}.{} : {}", index, number, e)?;
                continue;
            }
        };

        let (discipline, category, parameter) = record.product_definition.parameter();
        writeln!(
            out,
            "  {}.{} : parameter {}.{}.{}, forecast {}, {} with {} points, {} values {}",
            index,
            number,
            discipline,
            category,
            parameter,
            record
                .product_definition
                .forecast_time()
                .map(|d| format!("{}h", d.num_hours()))
                .unwrap_or_else(|| String::from("-")),
            record.grid_definition.grid.name(),
            record.grid_definition.num_points,
            record.data_representation.num_values,
            record.data_representation.packing.name(),
        )?;

        if args.values {
            match read_record(reader, record) {
                Ok(values) => {
                    for (coordinate, value) in values {
                        match value {
                            Some(value) => writeln!(out, "    {:.6} {:.6} {}", coordinate.lat, coordinate.lon, value)?,
                            None => writeln!(out, "    {:.6} {:.6} missing", coordinate.lat, coordinate.lon)?,
                        }
                    }
                }
                Err(e) => error!("Record {}.{} : {}", index, number, e),
            }
        }
    }

    Ok(())
}

fn read_record<R: io::Read + io::Seek>(
    reader: &mut GribReader<R>,
    record: &Record,
) -> Result<Vec<(Coordinate, Option<f64>)>> {
    Ok(reader.read_geographic_values(record)?.collect())
}
