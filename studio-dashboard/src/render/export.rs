use std::fs::File;
use std::io::Write;
use std::path::Path;

use tracing::info;

use super::format_time;
use crate::error::DashboardResult;
use crate::pivot::PivotTable;

/// Write the pivoted table as CSV with `_time` as the first column
pub fn write_csv<W: Write>(table: &PivotTable, writer: W) -> DashboardResult<()> {
    let mut csv_writer = csv::Writer::from_writer(writer);

    let mut header = Vec::with_capacity(table.column_count() + 1);
    header.push("_time");
    header.extend(table.columns().iter().map(String::as_str));
    csv_writer.write_record(&header)?;

    for row in table.rows() {
        let mut record = Vec::with_capacity(row.values.len() + 1);
        record.push(format_time(&row.time));
        record.extend(
            row.values
                .iter()
                .map(|value| value.map(|v| v.to_string()).unwrap_or_default()),
        );
        csv_writer.write_record(&record)?;
    }

    csv_writer.flush()?;
    Ok(())
}

pub fn export_csv_file<P: AsRef<Path>>(table: &PivotTable, path: P) -> DashboardResult<()> {
    let path = path.as_ref();
    let file = File::create(path)?;
    write_csv(table, file)?;
    info!("Exported {} rows to {}", table.row_count(), path.display());
    Ok(())
}
