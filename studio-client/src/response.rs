//! Decoding of InfluxDB annotated CSV query responses
//!
//! A response holds one or more tables separated by blank lines. Every table
//! starts with optional `#` annotation rows followed by its own header row, so
//! tables are decoded one at a time and their rows concatenated.

use chrono::{DateTime, Utc};
use tracing::debug;

use studio_common::RawRecord;

use crate::error::{ClientError, ClientResult};

const TIME_COLUMN: &str = "_time";
const FIELD_COLUMN: &str = "_field";
const VALUE_COLUMN: &str = "_value";
const ERROR_COLUMN: &str = "error";

/// Flatten every table of an annotated CSV body into raw records
pub fn decode_annotated_csv(body: &str) -> ClientResult<Vec<RawRecord>> {
    let mut records = Vec::new();
    let mut skipped = 0usize;

    for block in table_blocks(body) {
        skipped += decode_table(&block, &mut records)?;
    }

    if skipped > 0 {
        debug!("Skipped {} rows without a numeric value", skipped);
    }

    Ok(records)
}

/// Split the body into blank-line separated tables
fn table_blocks(body: &str) -> Vec<String> {
    let mut blocks = Vec::new();
    let mut current = String::new();

    for line in body.lines() {
        if line.trim().is_empty() {
            if !current.is_empty() {
                blocks.push(std::mem::take(&mut current));
            }
            continue;
        }
        current.push_str(line);
        current.push('\n');
    }
    if !current.is_empty() {
        blocks.push(current);
    }

    blocks
}

/// Decode one table into `records`, returning how many rows were skipped
fn decode_table(block: &str, records: &mut Vec<RawRecord>) -> ClientResult<usize> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .comment(Some(b'#'))
        .flexible(true)
        .from_reader(block.as_bytes());

    let headers = reader.headers()?.clone();
    let position = |name: &str| headers.iter().position(|h| h == name);

    let (time_idx, field_idx, value_idx) =
        match (position(TIME_COLUMN), position(FIELD_COLUMN), position(VALUE_COLUMN)) {
            (Some(t), Some(f), Some(v)) => (t, f, v),
            _ => {
                if let Some(error_idx) = position(ERROR_COLUMN) {
                    let message = reader
                        .records()
                        .next()
                        .transpose()?
                        .and_then(|row| row.get(error_idx).map(str::to_string))
                        .unwrap_or_else(|| "unknown query error".to_string());
                    return Err(ClientError::Query { status: 200, message });
                }
                if reader.records().next().is_none() {
                    return Ok(0);
                }
                return Err(ClientError::InvalidRecord(format!(
                    "table without {}, {} and {} columns",
                    TIME_COLUMN, FIELD_COLUMN, VALUE_COLUMN
                )));
            }
        };

    let mut skipped = 0;
    for row in reader.records() {
        let row = row?;
        let column = |idx: usize| row.get(idx).unwrap_or("").trim();

        let value = match column(value_idx).parse::<f64>() {
            Ok(value) => value,
            Err(_) => {
                skipped += 1;
                continue;
            }
        };

        let time = parse_time(column(time_idx))?;
        records.push(RawRecord::new(time, column(field_idx), value));
    }

    Ok(skipped)
}

fn parse_time(raw: &str) -> ClientResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|time| time.with_timezone(&Utc))
        .map_err(|e| ClientError::InvalidRecord(format!("bad timestamp {:?}: {}", raw, e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    const TWO_TABLES: &str = "#datatype,string,long,dateTime:RFC3339,dateTime:RFC3339,dateTime:RFC3339,double,string,string\r\n\
#group,false,false,true,true,false,false,true,true\r\n\
#default,_result,,,,,,,\r\n\
,result,table,_start,_stop,_time,_value,_field,_measurement\r\n\
,,0,2024-05-01T00:00:00Z,2024-05-08T00:00:00Z,2024-05-02T10:00:00Z,21.5,temperature,studio-dht22\r\n\
,,0,2024-05-01T00:00:00Z,2024-05-08T00:00:00Z,2024-05-02T10:05:00Z,21.75,temperature,studio-dht22\r\n\
\r\n\
#datatype,string,long,dateTime:RFC3339,dateTime:RFC3339,dateTime:RFC3339,long,string,string\r\n\
#group,false,false,true,true,false,false,true,true\r\n\
#default,_result,,,,,,,\r\n\
,result,table,_start,_stop,_time,_value,_field,_measurement\r\n\
,,1,2024-05-01T00:00:00Z,2024-05-08T00:00:00Z,2024-05-02T10:00:00Z,412,co2_ppm,studio-dht22\r\n\
\r\n";

    #[test]
    fn test_decodes_every_table() {
        let records = decode_annotated_csv(TWO_TABLES).unwrap();
        assert_eq!(records.len(), 3);

        assert_eq!(records[0].field, "temperature");
        assert_eq!(records[0].value, 21.5);
        assert_eq!(
            records[0].time,
            Utc.with_ymd_and_hms(2024, 5, 2, 10, 0, 0).unwrap()
        );
        assert_eq!(records[2].field, "co2_ppm");
        assert_eq!(records[2].value, 412.0);
    }

    #[test]
    fn test_empty_body_yields_no_records() {
        assert!(decode_annotated_csv("").unwrap().is_empty());
        assert!(decode_annotated_csv("\r\n\r\n").unwrap().is_empty());
    }

    #[test]
    fn test_header_only_table_yields_no_records() {
        let body = ",result,table,_time,_value,_field\n";
        assert!(decode_annotated_csv(body).unwrap().is_empty());
    }

    #[test]
    fn test_non_numeric_values_are_skipped() {
        let body = ",result,table,_time,_value,_field\n\
,,0,2024-05-02T10:00:00Z,online,status\n\
,,0,2024-05-02T10:00:00Z,,lux\n\
,,0,2024-05-02T10:00:00Z,120.5,lux\n";
        let records = decode_annotated_csv(body).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].field, "lux");
    }

    #[test]
    fn test_offset_timestamps_are_normalized() {
        let body = ",result,table,_time,_value,_field\n,,0,2024-05-02T12:00:00+02:00,1,lux\n";
        let records = decode_annotated_csv(body).unwrap();
        assert_eq!(
            records[0].time,
            Utc.with_ymd_and_hms(2024, 5, 2, 10, 0, 0).unwrap()
        );
    }

    #[test]
    fn test_in_band_error_table() {
        let body = "#datatype,string,string\n#group,true,true\n#default,,\n,error,reference\n,\"bucket \"\"Studo\"\" not found\",\n";
        match decode_annotated_csv(body) {
            Err(ClientError::Query { message, .. }) => {
                assert_eq!(message, "bucket \"Studo\" not found");
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_bad_timestamp_is_rejected() {
        let body = ",result,table,_time,_value,_field\n,,0,yesterday,1,lux\n";
        assert!(matches!(
            decode_annotated_csv(body),
            Err(ClientError::InvalidRecord(_))
        ));
    }

    #[test]
    fn test_table_with_unexpected_columns_is_rejected() {
        let body = ",result,table,name\n,,0,studio\n";
        assert!(matches!(
            decode_annotated_csv(body),
            Err(ClientError::InvalidRecord(_))
        ));
    }
}
