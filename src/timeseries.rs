// src/timeseries.rs

use anyhow::{Context, Result};
use std::fs::File;
use std::path::Path;

use crate::types::MetricsRow;

/// Appends one `MetricsRow` per decoded frame to a CSV file. Undefined
/// metrics serialize as empty fields; the header comes from the row's field
/// order, so downstream consumers can rely on a fixed column layout.
pub struct TimeSeriesWriter {
    writer: csv::Writer<File>,
    rows_written: u64,
}

impl TimeSeriesWriter {
    pub fn create(path: &Path) -> Result<Self> {
        let writer = csv::Writer::from_path(path)
            .with_context(|| format!("failed to create metrics CSV at {}", path.display()))?;
        Ok(Self {
            writer,
            rows_written: 0,
        })
    }

    pub fn append(&mut self, row: &MetricsRow) -> Result<()> {
        self.writer.serialize(row)?;
        self.rows_written += 1;
        Ok(())
    }

    /// Flushes and returns the number of rows written.
    pub fn finish(mut self) -> Result<u64> {
        self.writer.flush()?;
        Ok(self.rows_written)
    }
}

/// Reads the full time series back for the aggregation pass.
pub fn read_rows(path: &Path) -> Result<Vec<MetricsRow>> {
    let mut reader = csv::Reader::from_path(path)
        .with_context(|| format!("failed to open metrics CSV at {}", path.display()))?;
    let mut rows = Vec::new();
    for record in reader.deserialize() {
        let row: MetricsRow = record.context("malformed metrics CSV row")?;
        rows.push(row);
    }
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{JointAngleSet, VelocitySample};

    const EXPECTED_HEADER: &str = "frame,time_s,knee_angle_right,knee_angle_left,\
hip_angle_right,hip_angle_left,ankle_angle_right,ankle_angle_left,\
foot_speed_right,foot_speed_norm";

    fn sample_row(frame: u64) -> MetricsRow {
        let angles = JointAngleSet {
            knee_right: Some(150.0),
            knee_left: Some(130.0),
            ..Default::default()
        };
        MetricsRow::new(frame, frame as f64 / 25.0, &angles, &VelocitySample::default())
    }

    #[test]
    fn test_header_column_order() {
        let mut writer = csv::Writer::from_writer(vec![]);
        writer.serialize(sample_row(1)).unwrap();
        let data = String::from_utf8(writer.into_inner().unwrap()).unwrap();
        let header = data.lines().next().unwrap();
        assert_eq!(header, EXPECTED_HEADER);
    }

    #[test]
    fn test_undefined_metrics_serialize_as_empty_fields() {
        let row = MetricsRow::new(
            3,
            0.12,
            &JointAngleSet::default(),
            &VelocitySample::default(),
        );
        let mut writer = csv::Writer::from_writer(vec![]);
        writer.serialize(&row).unwrap();
        let data = String::from_utf8(writer.into_inner().unwrap()).unwrap();
        let line = data.lines().nth(1).unwrap();
        assert_eq!(line, "3,0.12,,,,,,,,");
    }

    #[test]
    fn test_roundtrip_preserves_undefined() {
        let rows = vec![
            sample_row(1),
            MetricsRow::new(
                2,
                0.08,
                &JointAngleSet::default(),
                &VelocitySample::default(),
            ),
        ];

        let mut writer = csv::Writer::from_writer(vec![]);
        for row in &rows {
            writer.serialize(row).unwrap();
        }
        let data = writer.into_inner().unwrap();

        let mut reader = csv::Reader::from_reader(data.as_slice());
        let parsed: Vec<MetricsRow> = reader.deserialize().map(|r| r.unwrap()).collect();
        assert_eq!(parsed, rows);
        assert_eq!(parsed[1].knee_angle_right, None);
    }
}
