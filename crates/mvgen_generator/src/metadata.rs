//! The `data.csv` sidecar: one row per rendered shot.
//!
//! Columns are fixed by the light count when the header is written:
//! `index, object, view-x, view-y, view-z`, then six columns per light.

use std::borrow::Cow;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;

use mvgen_math::Vec3;

use crate::capability::LightParams;

/// Columns before the per-light block.
pub const BASE_COLUMNS: usize = 5;

/// Columns contributed by each light.
pub const LIGHT_COLUMNS: usize = 6;

/// Header names for a table covering `light_count` lights.
pub fn header(light_count: usize) -> Vec<String> {
    let mut columns: Vec<String> = ["index", "object", "view-x", "view-y", "view-z"]
        .iter()
        .map(|c| c.to_string())
        .collect();
    for i in 0..light_count {
        for axis in ["x", "y", "z", "r", "g", "b"] {
            columns.push(format!("light_{i}-{axis}"));
        }
    }
    columns
}

/// Quote a field when it contains a delimiter, quote or line break.
fn escape_field(field: &str) -> Cow<'_, str> {
    if field.contains([',', '"', '\n', '\r']) {
        Cow::Owned(format!("\"{}\"", field.replace('"', "\"\"")))
    } else {
        Cow::Borrowed(field)
    }
}

/// One shot's metadata, built up while the shot is staged.
#[derive(Debug, Clone, PartialEq)]
pub struct MetadataRow {
    pub index: usize,
    pub object: String,
    pub view: Vec3,
    pub lights: Vec<LightParams>,
}

impl MetadataRow {
    pub fn new(index: usize, object: impl Into<String>, view: Vec3) -> Self {
        Self {
            index,
            object: object.into(),
            view,
            lights: Vec::new(),
        }
    }

    pub fn push_light(&mut self, params: LightParams) {
        self.lights.push(params);
    }

    /// Number of columns this row occupies.
    pub fn column_count(&self) -> usize {
        BASE_COLUMNS + LIGHT_COLUMNS * self.lights.len()
    }

    /// Field values in column order.
    pub fn fields(&self) -> Vec<String> {
        let mut fields = Vec::with_capacity(self.column_count());
        fields.push(self.index.to_string());
        fields.push(self.object.clone());
        fields.extend(self.view.to_array().iter().map(f32::to_string));
        for light in &self.lights {
            let [x, y, z, _, _, _] = light.to_row();
            fields.extend([x, y, z].iter().map(f32::to_string));
            fields.extend(light.color.iter().map(u8::to_string));
        }
        fields
    }
}

/// Writer for the metadata table.
///
/// The header is written on construction. Dropping the table closes the
/// underlying file; call [`MetadataTable::finish`] to surface flush errors.
pub struct MetadataTable<W: Write = BufWriter<File>> {
    writer: W,
    columns: usize,
    rows: usize,
}

impl MetadataTable<BufWriter<File>> {
    /// Create the CSV file at `path` and write its header.
    pub fn create<P: AsRef<Path>>(path: P, light_count: usize) -> io::Result<Self> {
        let file = File::create(path.as_ref())?;
        Self::new(BufWriter::new(file), light_count)
    }
}

impl<W: Write> MetadataTable<W> {
    pub fn new(writer: W, light_count: usize) -> io::Result<Self> {
        let mut table = Self {
            writer,
            columns: BASE_COLUMNS + LIGHT_COLUMNS * light_count,
            rows: 0,
        };
        let header = header(light_count);
        table.write_record(&header)?;
        Ok(table)
    }

    fn write_record(&mut self, fields: &[String]) -> io::Result<()> {
        let line = fields
            .iter()
            .map(|f| escape_field(f))
            .collect::<Vec<_>>()
            .join(",");
        // RFC 4180 line ending
        write!(self.writer, "{line}\r\n")
    }

    /// Append a row. The row must match the header's column count.
    pub fn write_row(&mut self, row: &MetadataRow) -> io::Result<()> {
        if row.column_count() != self.columns {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!(
                    "metadata row {} has {} columns, header has {}",
                    row.index,
                    row.column_count(),
                    self.columns
                ),
            ));
        }
        self.write_record(&row.fields())?;
        self.rows += 1;
        Ok(())
    }

    pub fn columns(&self) -> usize {
        self.columns
    }

    /// Data rows written so far (header excluded).
    pub fn rows(&self) -> usize {
        self.rows
    }

    /// Flush and hand back the writer.
    pub fn finish(mut self) -> io::Result<W> {
        self.writer.flush()?;
        Ok(self.writer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn light(x: f32, color: [u8; 3]) -> LightParams {
        LightParams::new(Vec3::new(x, 0.5, -1.0), color)
    }

    #[test]
    fn test_header() {
        assert_eq!(
            header(0),
            vec!["index", "object", "view-x", "view-y", "view-z"]
        );

        let two = header(2);
        assert_eq!(two.len(), 17);
        assert_eq!(&two[5..11], ["light_0-x", "light_0-y", "light_0-z", "light_0-r", "light_0-g", "light_0-b"]);
        assert_eq!(two[16], "light_1-b");
    }

    #[test]
    fn test_row_fields() {
        let mut row = MetadataRow::new(3, "cube", Vec3::new(1.0, -2.5, 0.25));
        row.push_light(light(4.0, [255, 0, 12]));

        assert_eq!(row.column_count(), 11);
        assert_eq!(
            row.fields(),
            vec!["3", "cube", "1", "-2.5", "0.25", "4", "0.5", "-1", "255", "0", "12"]
        );
    }

    #[test]
    fn test_table_output() {
        let mut table = MetadataTable::new(Vec::new(), 1).unwrap();
        let mut row = MetadataRow::new(0, "cube", Vec3::ZERO);
        row.push_light(light(1.0, [1, 2, 3]));
        table.write_row(&row).unwrap();
        assert_eq!(table.rows(), 1);

        let text = String::from_utf8(table.finish().unwrap()).unwrap();
        let lines: Vec<&str> = text.split("\r\n").filter(|l| !l.is_empty()).collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("index,object,view-x"));
        assert_eq!(lines[1], "0,cube,0,0,0,1,0.5,-1,1,2,3");
    }

    #[test]
    fn test_column_mismatch_rejected() {
        let mut table = MetadataTable::new(Vec::new(), 2).unwrap();
        let row = MetadataRow::new(0, "cube", Vec3::ZERO);

        let err = table.write_row(&row).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidInput);
        assert_eq!(table.rows(), 0);
    }

    #[test]
    fn test_object_name_escaped() {
        assert_eq!(escape_field("plain"), "plain");
        assert_eq!(escape_field("a,b"), "\"a,b\"");
        assert_eq!(escape_field("say \"hi\""), "\"say \"\"hi\"\"\"");
    }
}
