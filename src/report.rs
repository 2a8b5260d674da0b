use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use serde::Serialize;

use crate::error::FlowcellError;
use crate::fs_util::read_text;
use crate::record::Record;

/// Name given to the first column of every entity header row.
pub const LANE_COLUMN: &str = "Lane";
/// Name given to the first of several `Clusters` columns in one header row.
pub const RAW_CLUSTERS_COLUMN: &str = "Clusters (Raw)";
const CLUSTERS_COLUMN: &str = "Clusters";

const SUMMARY_TABLE: usize = 1;
const ENTITY_TABLE: usize = 2;

static TABLE: LazyLock<Selector> = LazyLock::new(|| Selector::parse("table").unwrap());
static ROW: LazyLock<Selector> = LazyLock::new(|| Selector::parse("tr").unwrap());
static LINE_BREAK_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)<br\s*/?>").unwrap());
static TAG_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[^>]*>").unwrap());

/// Which demultiplexing report a [`LaneReport`] was read from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportKind {
    LaneBarcode,
    Lane,
}

impl ReportKind {
    pub fn file_name(self) -> &'static str {
        match self {
            ReportKind::LaneBarcode => "laneBarcode.html",
            ReportKind::Lane => "lane.html",
        }
    }
}

/// The flowcell summary and per-lane (or per-lane-and-sample) rows of a
/// demultiplexing HTML report.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct LaneReport {
    pub summary: Record,
    pub rows: Vec<Record>,
}

impl LaneReport {
    pub fn parse(html: &str, input: &str) -> Result<Self, FlowcellError> {
        let document = Html::parse_document(html);
        let tables = document.select(&TABLE).collect::<Vec<_>>();
        if tables.len() <= ENTITY_TABLE {
            return Err(FlowcellError::format(
                input,
                format!(
                    "expected at least {} tables, found {}",
                    ENTITY_TABLE + 1,
                    tables.len()
                ),
            ));
        }

        let summary = parse_summary(tables[SUMMARY_TABLE], input)?;
        let rows = parse_entities(tables[ENTITY_TABLE]);
        Ok(Self { summary, rows })
    }

    pub fn from_path(path: &Path) -> Result<Self, FlowcellError> {
        let html = read_text(path)?;
        let report = Self::parse(&html, &path.display().to_string())?;
        tracing::debug!(path = %path.display(), rows = report.rows.len(), "parsed lane report");
        Ok(report)
    }
}

fn parse_summary(table: ElementRef<'_>, input: &str) -> Result<Record, FlowcellError> {
    let mut headers = Vec::new();
    let mut values = None;
    for row in table.select(&ROW) {
        headers.extend(cells(row, "th").map(header_text));
        if values.is_none() {
            let data = cells(row, "td").map(cell_text).collect::<Vec<_>>();
            if !data.is_empty() {
                values = Some(data);
            }
        }
    }
    let values = values
        .ok_or_else(|| FlowcellError::format(input, "flowcell summary table has no data row"))?;
    Ok(headers.into_iter().zip(values).collect())
}

/// Header rows (re)define the columns for the data rows that follow them.
fn parse_entities(table: ElementRef<'_>) -> Vec<Record> {
    let mut columns: Vec<String> = Vec::new();
    let mut records: Vec<Record> = Vec::new();
    for row in table.select(&ROW) {
        let headers = cells(row, "th").map(header_text).collect::<Vec<_>>();
        if !headers.is_empty() {
            columns = canonical_columns(headers);
            continue;
        }
        let data = cells(row, "td").map(cell_text).collect::<Vec<_>>();
        if !data.is_empty() {
            records.push(columns.iter().cloned().zip(data).collect());
        }
    }
    records
}

fn canonical_columns(mut headers: Vec<String>) -> Vec<String> {
    if let Some(first) = headers.first_mut() {
        *first = LANE_COLUMN.to_string();
    }
    let clusters = headers
        .iter()
        .filter(|name| name.as_str() == CLUSTERS_COLUMN)
        .count();
    if clusters > 1 {
        if let Some(first) = headers
            .iter_mut()
            .find(|name| name.as_str() == CLUSTERS_COLUMN)
        {
            *first = RAW_CLUSTERS_COLUMN.to_string();
        }
    }
    headers
}

fn cells<'a>(row: ElementRef<'a>, tag: &'static str) -> impl Iterator<Item = ElementRef<'a>> {
    row.children()
        .filter_map(ElementRef::wrap)
        .filter(move |cell| cell.value().name() == tag)
}

fn header_text(cell: ElementRef<'_>) -> String {
    let html = cell.inner_html();
    let spaced = LINE_BREAK_RE.replace_all(&html, " ");
    let stripped = TAG_RE.replace_all(&spaced, "");
    let decoded = stripped
        .replace("&gt;", ">")
        .replace("&lt;", "<")
        .replace("&nbsp;", " ")
        .replace("&amp;", "&");
    collapse_whitespace(&decoded)
}

fn cell_text(cell: ElementRef<'_>) -> String {
    collapse_whitespace(&cell.text().collect::<String>())
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
