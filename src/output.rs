//! CSV rendering for conversion results.
//!
//! Rows are handed over wholesale per conversion; there is no appending or
//! streaming. The header row is always present, even for an empty table.

use anyhow::Result;
use tracing::debug;

use crate::record::CanonicalRecord;
use csv::WriterBuilder;

/// Serializes canonical records to CSV bytes with the header row included.
pub fn to_csv_bytes(rows: &[CanonicalRecord]) -> Result<Vec<u8>> {
    let mut writer = WriterBuilder::new().from_writer(Vec::new());

    if rows.is_empty() {
        // serialize() derives the header from the first record, so an empty
        // table needs it written explicitly.
        writer.write_record([
            "uuid",
            "timestamp",
            "latitude",
            "longitude",
            "valueType",
            "sensorDataValue",
        ])?;
    }
    for row in rows {
        writer.serialize(row)?;
    }

    writer.flush()?;
    Ok(writer.into_inner()?)
}

/// Writes a conversion result to a local CSV file, replacing any previous
/// content.
pub fn write_csv_file(path: &str, rows: &[CanonicalRecord]) -> Result<()> {
    debug!(path, rows = rows.len(), "Writing CSV file");
    std::fs::write(path, to_csv_bytes(rows)?)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::env;
    use std::fs;
    use std::path::Path;
    use uuid::Uuid;

    fn sample_row() -> CanonicalRecord {
        CanonicalRecord {
            uuid: Uuid::new_v4(),
            timestamp: "2024-03-01 10:00:00".to_string(),
            latitude: 50.5,
            longitude: 4.5,
            value_type: "P1".to_string(),
            value: json!("12"),
        }
    }

    #[test]
    fn test_header_order() {
        let bytes = to_csv_bytes(&[sample_row()]).unwrap();
        let content = String::from_utf8(bytes).unwrap();

        assert_eq!(
            content.lines().next().unwrap(),
            "uuid,timestamp,latitude,longitude,valueType,sensorDataValue"
        );
    }

    #[test]
    fn test_empty_table_still_has_header() {
        let bytes = to_csv_bytes(&[]).unwrap();
        let content = String::from_utf8(bytes).unwrap();

        assert_eq!(
            content.trim_end(),
            "uuid,timestamp,latitude,longitude,valueType,sensorDataValue"
        );
    }

    #[test]
    fn test_one_line_per_row() {
        let rows = vec![sample_row(), sample_row(), sample_row()];
        let bytes = to_csv_bytes(&rows).unwrap();
        let content = String::from_utf8(bytes).unwrap();

        // 1 header + 3 data rows
        assert_eq!(content.lines().count(), 4);
    }

    #[test]
    fn test_null_value_serializes_as_empty_field() {
        let mut row = sample_row();
        row.value = json!(null);
        let bytes = to_csv_bytes(&[row]).unwrap();
        let content = String::from_utf8(bytes).unwrap();

        let data_line = content.lines().nth(1).unwrap();
        assert!(data_line.ends_with(",P1,"));
    }

    #[test]
    fn test_write_csv_file_replaces_previous_content() {
        let path = format!(
            "{}/sensornet_ingest_test_write.csv",
            env::temp_dir().display()
        );
        let _ = fs::remove_file(&path);

        write_csv_file(&path, &[sample_row(), sample_row()]).unwrap();
        write_csv_file(&path, &[sample_row()]).unwrap();

        assert!(Path::new(&path).exists());
        let content = fs::read_to_string(&path).unwrap();
        assert_eq!(content.lines().count(), 2);

        fs::remove_file(&path).unwrap();
    }
}
