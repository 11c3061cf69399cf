use std::io::{Read, Write};
use std::path::Path;

use calamine::{open_workbook_auto, Data, Reader};
use tracing::debug;

use crate::error::ParseError;
use crate::models::Dataset;

/// Reads an uploaded questionnaire file, picking the parser by extension.
pub fn load(path: &Path) -> Result<Dataset, ParseError> {
    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();

    let dataset = match extension.as_str() {
        "csv" => {
            let file = std::fs::File::open(path).map_err(|source| ParseError::Io {
                path: path.to_path_buf(),
                source,
            })?;
            read_csv(file)?
        }
        "xlsx" | "xlsm" | "xls" | "ods" => read_workbook(path)?,
        _ => return Err(ParseError::UnsupportedFormat(extension)),
    };

    if dataset.headers.is_empty() {
        return Err(ParseError::MissingHeader(path.to_path_buf()));
    }

    debug!(
        path = %path.display(),
        rows = dataset.len(),
        columns = dataset.headers.len(),
        "loaded dataset"
    );
    Ok(dataset)
}

pub fn read_csv<R: Read>(input: R) -> Result<Dataset, ParseError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .from_reader(input);

    let headers = reader
        .headers()?
        .iter()
        .map(str::to_string)
        .collect::<Vec<_>>();

    let mut rows = Vec::new();
    for result in reader.records() {
        let record = result?;
        rows.push(record.iter().map(str::to_string).collect());
    }

    Ok(Dataset::new(headers, rows))
}

fn read_workbook(path: &Path) -> Result<Dataset, ParseError> {
    let mut workbook =
        open_workbook_auto(path).map_err(|err| ParseError::Workbook(err.to_string()))?;
    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| ParseError::MissingHeader(path.to_path_buf()))?
        .map_err(|err| ParseError::Workbook(err.to_string()))?;

    let mut rows = range.rows();
    let headers = match rows.next() {
        Some(cells) if !is_blank(cells) => cells.iter().map(cell_text).collect::<Vec<_>>(),
        _ => return Err(ParseError::MissingHeader(path.to_path_buf())),
    };

    let rows = rows
        .filter(|cells| !is_blank(cells))
        .map(|cells| cells.iter().map(cell_text).collect())
        .collect();

    Ok(Dataset::new(headers, rows))
}

fn is_blank(cells: &[Data]) -> bool {
    cells.iter().all(|cell| matches!(cell, Data::Empty))
}

fn cell_text(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        Data::String(text) => text.clone(),
        Data::Int(value) => value.to_string(),
        Data::Float(value) => value.to_string(),
        other => other.to_string(),
    }
}

pub fn write_csv<W: Write>(dataset: &Dataset, output: W) -> Result<(), ParseError> {
    let mut writer = csv::Writer::from_writer(output);
    writer.write_record(&dataset.headers)?;
    for row in &dataset.rows {
        writer.write_record(row)?;
    }
    writer.flush().map_err(csv::Error::from)?;
    Ok(())
}

/// UTF-8 CSV export, header row included.
pub fn to_csv_bytes(dataset: &Dataset) -> Result<Vec<u8>, ParseError> {
    let mut buffer = Vec::new();
    write_csv(dataset, &mut buffer)?;
    Ok(buffer)
}

#[cfg(test)]
mod tests {
    use rust_xlsxwriter::Workbook;

    use super::*;

    #[test]
    fn reads_headers_and_rows_from_csv() {
        let input = "Name,Class,Q1\nAvery Lee,7A,3\nKiara Patel,7B,1\n";
        let dataset = read_csv(input.as_bytes()).unwrap();
        assert_eq!(dataset.headers, vec!["Name", "Class", "Q1"]);
        assert_eq!(dataset.len(), 2);
        assert_eq!(dataset.cell(1, 0), "Kiara Patel");
    }

    #[test]
    fn ragged_rows_are_parse_errors() {
        let input = "Name,Q1\nAvery,3,extra\n";
        let err = read_csv(input.as_bytes()).unwrap_err();
        assert!(matches!(err, ParseError::Csv(_)));
    }

    #[test]
    fn header_only_file_is_an_empty_dataset() {
        let dataset = read_csv("Name,Q1\n".as_bytes()).unwrap();
        assert!(dataset.is_empty());
        assert_eq!(dataset.headers.len(), 2);
    }

    #[test]
    fn export_keeps_columns_and_quotes_commas() {
        let dataset = Dataset::new(
            vec!["Name".into(), "Status".into()],
            vec![vec!["Lee, Avery".into(), "Not at risk".into()]],
        );
        let bytes = to_csv_bytes(&dataset).unwrap();
        assert_eq!(
            String::from_utf8(bytes).unwrap(),
            "Name,Status\n\"Lee, Avery\",Not at risk\n"
        );
    }

    #[test]
    fn load_rejects_unknown_extensions() {
        let tmp = tempfile::tempdir().expect("tmpdir");
        let path = tmp.path().join("answers.txt");
        std::fs::write(&path, "Name\n").expect("write");
        assert!(matches!(load(&path), Err(ParseError::UnsupportedFormat(ext)) if ext == "txt"));
    }

    #[test]
    fn load_reports_missing_files() {
        let tmp = tempfile::tempdir().expect("tmpdir");
        let err = load(&tmp.path().join("absent.csv")).unwrap_err();
        assert!(matches!(err, ParseError::Io { .. }));
    }

    #[test]
    fn load_round_trips_a_csv_file() {
        let tmp = tempfile::tempdir().expect("tmpdir");
        let path = tmp.path().join("answers.CSV");
        std::fs::write(&path, "Name,Q1\nAvery,2\n").expect("write");
        let dataset = load(&path).unwrap();
        assert_eq!(dataset.rows, vec![vec!["Avery".to_string(), "2".to_string()]]);
    }

    #[test]
    fn reads_the_first_worksheet_of_a_workbook() {
        let tmp = tempfile::tempdir().expect("tmpdir");
        let path = tmp.path().join("answers.xlsx");
        let mut workbook = Workbook::new();
        let sheet = workbook.add_worksheet();
        sheet.write_string(0, 0, "Nama").expect("header");
        sheet.write_string(0, 1, "Q1").expect("header");
        sheet.write_string(1, 0, "Avery").expect("cell");
        sheet.write_number(1, 1, 3.0).expect("cell");
        sheet.write_string(3, 0, "Jules").expect("cell");
        sheet.write_number(3, 1, 2.5).expect("cell");
        workbook.add_worksheet().write_string(0, 0, "ignored").expect("cell");
        workbook.save(&path).expect("save");

        let dataset = load(&path).unwrap();
        assert_eq!(dataset.headers, vec!["Nama", "Q1"]);
        assert_eq!(
            dataset.rows,
            vec![
                vec!["Avery".to_string(), "3".to_string()],
                vec!["Jules".to_string(), "2.5".to_string()],
            ]
        );
    }

    #[test]
    fn workbook_without_a_header_row_is_rejected() {
        let tmp = tempfile::tempdir().expect("tmpdir");
        let path = tmp.path().join("blank.xlsx");
        let mut workbook = Workbook::new();
        workbook.add_worksheet();
        workbook.save(&path).expect("save");

        assert!(matches!(load(&path), Err(ParseError::MissingHeader(_))));
    }

    #[test]
    fn load_rejects_empty_csv() {
        let tmp = tempfile::tempdir().expect("tmpdir");
        let path = tmp.path().join("empty.csv");
        std::fs::write(&path, "").expect("write");
        assert!(matches!(load(&path), Err(ParseError::MissingHeader(_))));
    }
}
