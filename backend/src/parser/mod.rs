//! Wide table parser with encoding and layout auto-detection.
//!
//! Two layouts are understood:
//!
//! - Eurostat SDMX TSV: the first column packs the comma-joined dimension
//!   codes (`freq,unit,geo\TIME_PERIOD`), the remaining tab-separated
//!   columns are periods whose cells may carry status flags (`12.3 p`, `:`).
//! - Plain delimited wide tables with one column per dimension.
//!
//! Parsing never interprets period headers; that is the reshaper's job.

use serde::Serialize;
use std::path::Path;

use crate::error::{TableError, TableResult};
use crate::models::{parse_observation, CellValue, WideObservationTable, COMPOUND_GEO_COLUMN};

/// Layout of a parsed table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum TableFormat {
    EurostatTsv,
    Delimited,
}

/// Result of parsing with metadata
#[derive(Debug, Clone)]
pub struct ParseResult {
    pub table: WideObservationTable,
    /// Detected or used encoding
    pub encoding: String,
    /// Detected or used delimiter
    pub delimiter: char,
    pub format: TableFormat,
}

/// Detect the encoding of raw bytes using chardet
pub fn detect_encoding(bytes: &[u8]) -> String {
    let result = chardet::detect(bytes);
    let charset = result.0;

    match charset.to_lowercase().as_str() {
        "ascii" | "utf-8" | "utf8" | "" => "utf-8".to_string(),
        "iso-8859-1" | "iso-8859-15" | "latin-1" | "latin1" => "iso-8859-1".to_string(),
        "windows-1252" | "cp1252" => "windows-1252".to_string(),
        _ => charset,
    }
}

/// Decode bytes to string using the specified encoding
pub fn decode_content(bytes: &[u8], encoding: &str) -> TableResult<String> {
    match encoding.to_lowercase().as_str() {
        "utf-8" | "utf8" | "ascii" => Ok(String::from_utf8(bytes.to_vec())
            .unwrap_or_else(|e| String::from_utf8_lossy(e.as_bytes()).to_string())),
        "iso-8859-1" | "latin-1" | "latin1" => {
            Ok(encoding_rs::ISO_8859_15.decode(bytes).0.to_string())
        }
        "windows-1252" | "cp1252" => Ok(encoding_rs::WINDOWS_1252.decode(bytes).0.to_string()),
        other => match encoding_rs::Encoding::for_label(other.as_bytes()) {
            Some(enc) => Ok(enc.decode(bytes).0.to_string()),
            None => Err(TableError::EncodingError(format!(
                "unsupported encoding '{}'",
                other
            ))),
        },
    }
}

/// Detect the delimiter by counting occurrences in the first line
pub fn detect_delimiter(content: &str) -> char {
    let first_line = content.lines().next().unwrap_or("");

    let separators = ['\t', ';', ',', '|'];
    let mut best_sep = ',';
    let mut best_count = 0;

    for &sep in &separators {
        let count = first_line.matches(sep).count();
        if count > best_count {
            best_count = count;
            best_sep = sep;
        }
    }

    best_sep
}

/// Whether the header line uses the Eurostat packed-dimension layout.
pub fn is_eurostat_layout(content: &str) -> bool {
    content
        .lines()
        .next()
        .and_then(|line| line.split('\t').next())
        .is_some_and(|first| first.contains(',') && first.trim().ends_with("\\TIME_PERIOD"))
}

/// Parse table text, picking the layout from the header line.
pub fn parse_table(content: &str) -> TableResult<WideObservationTable> {
    if is_eurostat_layout(content) {
        parse_eurostat_tsv(content)
    } else {
        parse_delimited(content, detect_delimiter(content))
    }
}

/// Parse a Eurostat SDMX TSV payload.
pub fn parse_eurostat_tsv(content: &str) -> TableResult<WideObservationTable> {
    let content = content.trim_start_matches('\u{feff}');
    if content.trim().is_empty() {
        return Err(TableError::EmptyTable);
    }

    let mut lines = content.lines();
    let header_line = lines.next().ok_or(TableError::NoHeader)?;
    let mut header_cells = header_line.split('\t');

    let dimension_headers: Vec<String> = header_cells
        .next()
        .ok_or(TableError::NoHeader)?
        .split(',')
        .map(|s| s.trim().to_string())
        .collect();
    let period_headers: Vec<String> = header_cells.map(|s| s.trim().to_string()).collect();

    let dim_count = dimension_headers.len();
    let expected = dim_count + period_headers.len();

    let mut headers = dimension_headers;
    headers.extend(period_headers);

    let mut rows = Vec::new();
    for (line_idx, line) in lines.enumerate() {
        let line_num = line_idx + 2;
        if line.trim().is_empty() {
            continue;
        }

        let mut cells = line.split('\t');
        let codes: Vec<CellValue> = cells
            .next()
            .unwrap_or("")
            .split(',')
            .map(|s| CellValue::Text(s.trim().to_string()))
            .collect();
        if codes.len() != dim_count {
            return Err(TableError::RaggedRow {
                line: line_num,
                expected: dim_count,
                found: codes.len(),
            });
        }

        let mut row = codes;
        row.extend(cells.map(|raw| match parse_observation(raw) {
            Some(v) => CellValue::Number(v),
            None => CellValue::Missing,
        }));

        if row.len() != expected {
            return Err(TableError::RaggedRow {
                line: line_num,
                expected,
                found: row.len(),
            });
        }
        rows.push(row);
    }

    Ok(WideObservationTable::new(headers, rows))
}

/// Parse a delimited wide table with one column per dimension.
///
/// Cells are kept as text; empty cells become [`CellValue::Missing`].
pub fn parse_delimited(content: &str, delimiter: char) -> TableResult<WideObservationTable> {
    let content = content.trim_start_matches('\u{feff}');
    if content.trim().is_empty() {
        return Err(TableError::EmptyTable);
    }

    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter as u8)
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_reader(content.as_bytes());

    let headers: Vec<String> = reader.headers()?.iter().map(str::to_string).collect();
    if headers.is_empty() || headers.iter().all(String::is_empty) {
        return Err(TableError::NoHeader);
    }

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        if record.iter().all(str::is_empty) {
            continue;
        }
        rows.push(
            record
                .iter()
                .map(|cell| {
                    if cell.is_empty() {
                        CellValue::Missing
                    } else {
                        CellValue::Text(cell.to_string())
                    }
                })
                .collect(),
        );
    }

    Ok(WideObservationTable::new(headers, rows))
}

/// Parse table bytes with auto-detection of encoding and layout.
pub fn parse_bytes_auto(bytes: &[u8]) -> TableResult<ParseResult> {
    if bytes.is_empty() {
        return Err(TableError::EmptyTable);
    }

    let encoding = detect_encoding(bytes);
    let content = decode_content(bytes, &encoding)?;

    let (format, delimiter) = if is_eurostat_layout(&content) {
        (TableFormat::EurostatTsv, '\t')
    } else {
        (TableFormat::Delimited, detect_delimiter(&content))
    };

    let table = match format {
        TableFormat::EurostatTsv => parse_eurostat_tsv(&content)?,
        TableFormat::Delimited => parse_delimited(&content, delimiter)?,
    };

    Ok(ParseResult {
        table,
        encoding,
        delimiter,
        format,
    })
}

/// Parse a table file with auto-detection of encoding and layout.
pub fn parse_table_file<P: AsRef<Path>>(path: P) -> TableResult<ParseResult> {
    let bytes = std::fs::read(path.as_ref())?;
    parse_bytes_auto(&bytes)
}

/// Header of the compound geography column, if the table still carries it.
pub fn compound_geo_header(table: &WideObservationTable) -> Option<&str> {
    table
        .headers
        .iter()
        .find(|h| h.as_str() == COMPOUND_GEO_COLUMN)
        .map(String::as_str)
}

#[cfg(test)]
mod tests {
    use super::*;

    const EUROSTAT_SAMPLE: &str = "freq,unit,nace_r2,s_adj,na_item,geo\\TIME_PERIOD\t2019Q4 \t2020Q1 \t2020Q2 \n\
Q,PC_GDP,J,NSA,B1G,IT\t5.1 \t5.3 p\t: \n\
Q,PC_GDP,J,NSA,B1G,FR\t6.0 \t:\t6.4 e\n";

    #[test]
    fn test_eurostat_layout_detected() {
        assert!(is_eurostat_layout(EUROSTAT_SAMPLE));
        assert!(!is_eurostat_layout("geo,unit,2020Q1\nIT,PC,1"));
    }

    #[test]
    fn test_parse_eurostat_tsv() {
        let table = parse_eurostat_tsv(EUROSTAT_SAMPLE).unwrap();

        assert_eq!(table.headers.len(), 9);
        assert_eq!(table.headers[5], COMPOUND_GEO_COLUMN);
        assert_eq!(table.headers[6], "2019Q4");
        assert_eq!(table.row_count(), 2);
        assert_eq!(table.rows[0][5], CellValue::Text("IT".into()));
        assert_eq!(table.rows[0][7], CellValue::Number(5.3));
        assert_eq!(table.rows[0][8], CellValue::Missing);
        assert_eq!(table.rows[1][8], CellValue::Number(6.4));
        assert!(compound_geo_header(&table).is_some());
    }

    #[test]
    fn test_eurostat_ragged_row() {
        let tsv = "freq,unit,geo\\TIME_PERIOD\t2020Q1\nQ,PC\t1.0\n";
        let err = parse_eurostat_tsv(tsv).unwrap_err();
        assert!(matches!(err, TableError::RaggedRow { line: 2, expected: 3, found: 2 }));
    }

    #[test]
    fn test_parse_delimited_semicolon() {
        let csv = "geo;unit;2020Q1;2020Q2\nIT;PC;1.5;\nFR;PC;2;3\n";
        let table = parse_delimited(csv, ';').unwrap();

        assert_eq!(table.headers, vec!["geo", "unit", "2020Q1", "2020Q2"]);
        assert_eq!(table.rows[0][2].as_number(), Some(1.5));
        assert_eq!(table.rows[0][3], CellValue::Missing);
        assert_eq!(table.rows[1][0].as_code(), "FR");
    }

    #[test]
    fn test_parse_delimited_ragged_is_error() {
        let csv = "geo,2020Q1\nIT,1,2\n";
        assert!(matches!(parse_delimited(csv, ','), Err(TableError::Csv(_))));
    }

    #[test]
    fn test_empty_table_error() {
        assert!(matches!(parse_table(""), Err(TableError::EmptyTable)));
        assert!(matches!(parse_bytes_auto(b""), Err(TableError::EmptyTable)));
    }

    #[test]
    fn test_detect_delimiter() {
        assert_eq!(detect_delimiter("a;b;c\n1;2;3"), ';');
        assert_eq!(detect_delimiter("a,b,c\n1,2,3"), ',');
        assert_eq!(detect_delimiter("a\tb\tc"), '\t');
        assert_eq!(detect_delimiter("a|b|c"), '|');
    }

    #[test]
    fn test_auto_parse_eurostat_bytes() {
        let result = parse_bytes_auto(EUROSTAT_SAMPLE.as_bytes()).unwrap();
        assert_eq!(result.format, TableFormat::EurostatTsv);
        assert_eq!(result.delimiter, '\t');
        assert_eq!(result.encoding, "utf-8");
        assert_eq!(result.table.row_count(), 2);
    }

    #[test]
    fn test_latin1_decoding() {
        // "Société" in ISO-8859-1
        let bytes: &[u8] = &[0x53, 0x6F, 0x63, 0x69, 0xE9, 0x74, 0xE9];
        let decoded = decode_content(bytes, "iso-8859-1").unwrap();
        assert!(decoded.contains("Soci"));
    }
}
