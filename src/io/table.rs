//! Raw tabular decode.
//!
//! Both upstream shapes (plain CSV and an HTML page carrying a `<table>`)
//! decode into the same `RawTable` of untyped string cells, so normalization
//! never has to know which wire format a feed used.

use scraper::{Html, Selector};

use crate::data::fetch::FeedFormat;
use crate::error::AppError;
use crate::io::ingest::RowError;

/// An untyped table: one header row plus string cell rows.
///
/// `decode_errors` records rows the decoder itself could not produce (e.g.
/// malformed CSV records); ingest folds them into its row-error report.
#[derive(Debug, Clone, Default)]
pub struct RawTable {
    pub headers: Vec<String>,
    pub rows: Vec<RawRow>,
    pub decode_errors: Vec<RowError>,
}

/// One undecoded row with its 1-based source line for error reporting.
#[derive(Debug, Clone)]
pub struct RawRow {
    pub line: usize,
    pub fields: Vec<String>,
}

impl RawTable {
    /// Decode bytes using the pinned format, or sniff when none is pinned.
    pub fn decode(bytes: &[u8], format: Option<FeedFormat>) -> Result<RawTable, AppError> {
        match format.unwrap_or_else(|| FeedFormat::sniff(bytes)) {
            FeedFormat::Csv => RawTable::from_csv(bytes),
            FeedFormat::HtmlTable => RawTable::from_html(bytes),
        }
    }

    /// Decode a comma-separated payload; the first record is the header.
    pub fn from_csv(bytes: &[u8]) -> Result<RawTable, AppError> {
        let mut reader = csv::ReaderBuilder::new()
            .flexible(true)
            .trim(csv::Trim::All)
            .from_reader(bytes);

        let headers = reader
            .headers()
            .map_err(|e| AppError::schema(format!("Failed to read CSV headers: {e}")))?
            .iter()
            .map(str::to_string)
            .collect();

        let mut rows = Vec::new();
        let mut decode_errors = Vec::new();

        for (idx, result) in reader.records().enumerate() {
            // +2 because:
            // - records() starts at line 1 after headers
            // - CSV is 1-based line numbers
            let line = idx + 2;
            match result {
                Ok(record) => rows.push(RawRow {
                    line,
                    fields: record.iter().map(str::to_string).collect(),
                }),
                Err(e) => decode_errors.push(RowError {
                    line,
                    message: format!("CSV parse error: {e}"),
                }),
            }
        }

        Ok(RawTable {
            headers,
            rows,
            decode_errors,
        })
    }

    /// Decode the first `<table>` in an HTML document.
    ///
    /// The county page renders the dataset as a plain table; the first row
    /// with any non-empty cell is the header, as in the original page markup.
    pub fn from_html(bytes: &[u8]) -> Result<RawTable, AppError> {
        let text = String::from_utf8_lossy(bytes);
        let document = Html::parse_document(&text);

        let table_sel = selector("table")?;
        let tr_sel = selector("tr")?;
        let cell_sel = selector("th, td")?;

        let table = document
            .select(&table_sel)
            .next()
            .ok_or_else(|| AppError::schema("No <table> found in HTML payload."))?;

        let mut headers: Option<Vec<String>> = None;
        let mut rows = Vec::new();

        for (idx, tr) in table.select(&tr_sel).enumerate() {
            let line = idx + 1;
            let fields: Vec<String> = tr
                .select(&cell_sel)
                .map(|cell| cell.text().collect::<String>().trim().to_string())
                .collect();

            if fields.iter().all(|f| f.is_empty()) {
                continue;
            }

            match headers {
                None => headers = Some(fields),
                Some(_) => rows.push(RawRow { line, fields }),
            }
        }

        let headers = headers
            .ok_or_else(|| AppError::schema("HTML <table> has no header row."))?;

        Ok(RawTable {
            headers,
            rows,
            decode_errors: Vec::new(),
        })
    }
}

fn selector(css: &str) -> Result<Selector, AppError> {
    Selector::parse(css)
        .map_err(|e| AppError::schema(format!("Invalid selector '{css}': {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn csv_decode_basic() {
        let bytes = b"City,Reported Date\nFort Collins, 3/1/2020 \nLoveland,3/2/2020\n";
        let table = RawTable::from_csv(bytes).unwrap();
        assert_eq!(table.headers, vec!["City", "Reported Date"]);
        assert_eq!(table.rows.len(), 2);
        assert_eq!(table.rows[0].line, 2);
        assert_eq!(table.rows[0].fields, vec!["Fort Collins", "3/1/2020"]);
        assert!(table.decode_errors.is_empty());
    }

    #[test]
    fn html_decode_first_table() {
        let html = br#"
            <html><body>
            <p>Larimer County data</p>
            <table>
              <tr><td>City</td><td>Reported Date</td><td>Age</td><td>Sex</td></tr>
              <tr><td> fort collins </td><td>3/1/2020</td><td>34</td><td>M</td></tr>
              <tr><td></td><td></td><td></td><td></td></tr>
              <tr><td>Loveland</td><td>3/2/2020</td><td>70</td><td>F</td></tr>
            </table>
            </body></html>
        "#;
        let table = RawTable::from_html(html).unwrap();
        assert_eq!(table.headers, vec!["City", "Reported Date", "Age", "Sex"]);
        // The all-empty separator row is skipped during decode.
        assert_eq!(table.rows.len(), 2);
        assert_eq!(table.rows[0].fields[0], "fort collins");
        assert_eq!(table.rows[1].fields[0], "Loveland");
    }

    #[test]
    fn html_without_table_is_schema_error() {
        let err = RawTable::from_html(b"<html><body><p>nope</p></body></html>").unwrap_err();
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn decode_sniffs_format_when_unpinned() {
        let csv = b"city,reported_date\nLoveland,3/2/2020\n";
        let table = RawTable::decode(csv, None).unwrap();
        assert_eq!(table.rows.len(), 1);

        let html = b"<table><tr><td>city</td></tr><tr><td>Loveland</td></tr></table>";
        let table = RawTable::decode(html, None).unwrap();
        assert_eq!(table.rows.len(), 1);
    }
}
