use std::collections::BTreeMap;
use std::path::Path;
use std::sync::LazyLock;

use csv::{ReaderBuilder, Trim};
use regex::Regex;
use serde::Serialize;

use crate::error::FlowcellError;
use crate::fs_util::{read_text, strip_byte_order_mark};
use crate::record::Record;

pub const FILE_NAME: &str = "SampleSheet.csv";

static SAMPLE_ID_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^sample[_ ]?id$").unwrap());
static SAMPLE_NAME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^sample[_ ]?name$").unwrap());
static PROJECT_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)project$").unwrap());

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Section {
    Header,
    Reads,
    Settings,
    Data,
    Other,
}

impl Section {
    fn from_marker(line: &str) -> Option<Self> {
        let token = line.split(',').next().unwrap_or_default().trim();
        let name = token.strip_prefix('[')?.strip_suffix(']')?;
        let section = match name.trim().to_ascii_lowercase().as_str() {
            "header" => Section::Header,
            "reads" => Section::Reads,
            "settings" => Section::Settings,
            "data" => Section::Data,
            _ => Section::Other,
        };
        Some(section)
    }
}

/// A sample manifest split into its `[Header]`, `[Reads]`, `[Settings]`
/// and `[Data]` sections.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SampleSheet {
    pub header: BTreeMap<String, String>,
    pub settings: Vec<String>,
    pub reads: Vec<String>,
    pub records: Vec<Record>,
    pub columns: Vec<String>,
    pub sample_id_column: Option<String>,
    pub sample_name_column: Option<String>,
    pub project_column: Option<String>,
}

impl SampleSheet {
    pub fn parse(text: &str, input: &str) -> Result<Self, FlowcellError> {
        let mut sheet = SampleSheet::default();
        let mut data_lines = Vec::new();
        let mut section: Option<Section> = None;

        let lines = strip_byte_order_mark(text)
            .lines()
            .map(|line| line.trim_end_matches('\r'));
        for line in lines {
            if is_blank(line) {
                continue;
            }
            if let Some(marker) = Section::from_marker(line) {
                section = Some(marker);
                continue;
            }
            // A manifest without any section marker is a bare data table.
            let current = *section.get_or_insert(Section::Data);
            match current {
                Section::Header => {
                    let mut tokens = line.split(',');
                    let (Some(key), Some(value)) = (tokens.next(), tokens.next()) else {
                        return Err(FlowcellError::format(
                            input,
                            format!("header line without a value: {line:?}"),
                        ));
                    };
                    sheet
                        .header
                        .insert(key.trim().to_string(), value.trim().to_string());
                }
                Section::Reads => sheet.reads.push(first_token(line)),
                Section::Settings => sheet.settings.push(first_token(line)),
                Section::Data => data_lines.push(line),
                Section::Other => {
                    tracing::debug!(input, line, "ignoring line in unknown manifest section");
                }
            }
        }

        let (columns, records) = parse_table(&data_lines, input)?;
        sheet.sample_id_column = find_column(&columns, &SAMPLE_ID_RE);
        sheet.sample_name_column = find_column(&columns, &SAMPLE_NAME_RE);
        sheet.project_column = find_column(&columns, &PROJECT_RE);
        sheet.columns = columns;
        sheet.records = records;
        Ok(sheet)
    }

    pub fn from_path(path: &Path) -> Result<Self, FlowcellError> {
        let text = read_text(path)?;
        let sheet = Self::parse(&text, &path.display().to_string())?;
        tracing::debug!(
            path = %path.display(),
            records = sheet.records.len(),
            "parsed sample manifest"
        );
        Ok(sheet)
    }

    pub fn sample_id<'a>(&self, record: &'a Record) -> Option<&'a str> {
        self.sample_id_column
            .as_deref()
            .and_then(|column| record.get(column))
    }

    pub fn sample_name<'a>(&self, record: &'a Record) -> Option<&'a str> {
        self.sample_name_column
            .as_deref()
            .and_then(|column| record.get(column))
    }

    pub fn project<'a>(&self, record: &'a Record) -> Option<&'a str> {
        self.project_column
            .as_deref()
            .and_then(|column| record.get(column))
    }
}

fn is_blank(line: &str) -> bool {
    line.chars().all(|ch| ch == ',' || ch.is_whitespace())
}

fn first_token(line: &str) -> String {
    line.split(',').next().unwrap_or_default().trim().to_string()
}

fn find_column(columns: &[String], pattern: &Regex) -> Option<String> {
    columns
        .iter()
        .find(|column| pattern.is_match(column))
        .cloned()
}

/// Parses the buffered `[Data]` lines as a header-first table.
///
/// Short rows are padded with empty cells. Cells past the named columns
/// (trailing commas, unnamed columns) must be empty.
fn parse_table(lines: &[&str], input: &str) -> Result<(Vec<String>, Vec<Record>), FlowcellError> {
    if lines.is_empty() {
        return Ok((Vec::new(), Vec::new()));
    }
    let joined = lines.join("\n");
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(Trim::All)
        .from_reader(joined.as_bytes());

    let headers = reader
        .headers()
        .map_err(|err| FlowcellError::format(input, err.to_string()))?
        .iter()
        .map(str::to_string)
        .collect::<Vec<_>>();
    let columns = headers
        .iter()
        .filter(|name| !name.is_empty())
        .cloned()
        .collect::<Vec<_>>();

    let mut records = Vec::new();
    for (row, result) in reader.records().enumerate() {
        let cells = result.map_err(|err| FlowcellError::format(input, err.to_string()))?;
        let mut record = Record::new();
        for (index, name) in headers.iter().enumerate() {
            let value = cells.get(index).unwrap_or_default();
            if !name.is_empty() {
                record.insert(name.as_str(), value);
            } else if !value.is_empty() {
                return Err(FlowcellError::format(
                    input,
                    format!("data row {} has a value under an unnamed column", row + 1),
                ));
            }
        }
        if cells.iter().skip(headers.len()).any(|cell| !cell.is_empty()) {
            return Err(FlowcellError::format(
                input,
                format!("data row {} has more cells than columns", row + 1),
            ));
        }
        records.push(record);
    }
    Ok((columns, records))
}
