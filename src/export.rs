use std::fs::{self, File};
use std::path::{Path, PathBuf};

use polars::prelude::*;
use tracing::info;

use crate::domain::CompassError;
use crate::row::Row;

/// Column order for a set of rows: `id` first, then fields in the order they
/// first appear.
pub fn columns_of(rows: &[Row]) -> Vec<String> {
    let mut columns = vec!["id".to_string()];
    for row in rows {
        for (name, _) in row.fields() {
            if !columns.contains(name) {
                columns.push(name.clone());
            }
        }
    }
    columns
}

/// Writes `rows` as CSV to `<dir>/<stem>.csv` and returns the written path.
pub fn export_csv(rows: &[Row], dir: &Path, stem: &str) -> Result<PathBuf, CompassError> {
    fs::create_dir_all(dir)?;
    let path = dir.join(format!("{stem}.csv"));

    let columns: Vec<Column> = columns_of(rows)
        .iter()
        .map(|name| {
            // Missing fields become nulls, written as empty cells.
            let values: Vec<Option<String>> = rows
                .iter()
                .map(|row| {
                    if name == "id" {
                        Some(row.id().to_string())
                    } else {
                        row.get(name).map(|v| v.to_string())
                    }
                })
                .collect();
            Column::new(name.as_str().into(), values)
        })
        .collect();
    let mut df = DataFrame::new(columns)?;

    let mut file = File::create(&path)?;
    CsvWriter::new(&mut file)
        .include_header(true)
        .finish(&mut df)?;
    info!("Exported {} rows to {}", df.height(), path.display());
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::row::RowKind;

    #[test]
    fn writes_all_rows_with_header() {
        let rows = vec![
            Row::new("P1", RowKind::Patient)
                .with("name", "Ravi, Kumar")
                .with("diseases", vec!["Lung Cancer", "Asthma"]),
            Row::new("P2", RowKind::Patient)
                .with("name", "Meera")
                .with("village", "Loni"),
        ];
        assert_eq!(columns_of(&rows), vec!["id", "name", "diseases", "village"]);

        let dir = std::env::temp_dir().join(format!("compass-export-{}", std::process::id()));
        let path = export_csv(&rows, &dir, "patients").unwrap();
        let written = fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = written.lines().collect();
        assert_eq!(lines[0], "id,name,diseases,village");
        assert_eq!(lines[1], "P1,\"Ravi, Kumar\",\"Lung Cancer, Asthma\",");
        assert_eq!(lines.len(), 3);
        fs::remove_dir_all(&dir).unwrap();
    }
}
