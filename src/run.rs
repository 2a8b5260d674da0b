use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use camino::{Utf8Path, Utf8PathBuf};
use regex::Regex;
use serde_json::{Map, Value};

use crate::cycle_times::{self, CycleInterval};
use crate::diagnostics::{DiagnosticEvent, DiagnosticSink};
use crate::error::FlowcellError;
use crate::fs_util::read_text;
use crate::reconcile::{Document, NAME_FIELD};
use crate::report::{LaneReport, ReportKind};
use crate::run_info::RunInfo;
use crate::run_parameters::{self, RunParameters};
use crate::samplesheet::{self, SampleSheet};

const COMPONENT: &str = "run";

static RUN_NAME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d{6})_([ST-]*\w+\d+)_\d+_([AB]?)([A-Z0-9\-]+)").unwrap());

/// Parts of a run folder name such as `150424_ST-E00214_0031_BH2WY7CCXX`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunName {
    pub date: String,
    pub instrument: String,
    pub position: String,
    pub flowcell_id: String,
}

impl RunName {
    /// `<date>_<position><flowcell>`, the key documents are stored under.
    pub fn document_name(&self) -> String {
        format!("{}_{}{}", self.date, self.position, self.flowcell_id)
    }
}

impl fmt::Display for RunName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.document_name())
    }
}

impl FromStr for RunName {
    type Err = FlowcellError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let captures = RUN_NAME_RE
            .captures(value.trim())
            .ok_or_else(|| FlowcellError::InvalidRunName(value.to_string()))?;
        let group = |index: usize| {
            captures
                .get(index)
                .map(|m| m.as_str().to_string())
                .unwrap_or_default()
        };
        Ok(Self {
            date: group(1),
            instrument: group(2),
            position: group(3),
            flowcell_id: group(4),
        })
    }
}

/// File layout of one run folder.
#[derive(Debug, Clone)]
pub struct RunFolder {
    root: Utf8PathBuf,
    name: RunName,
}

impl RunFolder {
    pub fn open(root: &Utf8Path) -> Result<Self, FlowcellError> {
        if !root.as_std_path().is_dir() {
            return Err(FlowcellError::NotFound(root.as_std_path().to_path_buf()));
        }
        let folder_name = root
            .file_name()
            .ok_or_else(|| FlowcellError::InvalidRunName(root.to_string()))?;
        Ok(Self {
            root: root.to_path_buf(),
            name: folder_name.parse()?,
        })
    }

    pub fn root(&self) -> &Utf8Path {
        &self.root
    }

    pub fn name(&self) -> &RunName {
        &self.name
    }

    pub fn run_info_path(&self) -> Utf8PathBuf {
        self.root.join("RunInfo.xml")
    }

    pub fn run_parameters_path(&self) -> Utf8PathBuf {
        run_parameters::FILE_NAMES
            .iter()
            .map(|name| self.root.join(name))
            .find(|path| path.as_std_path().exists())
            .unwrap_or_else(|| self.root.join(run_parameters::FILE_NAMES[0]))
    }

    pub fn samplesheet_path(&self) -> Utf8PathBuf {
        self.root.join(samplesheet::FILE_NAME)
    }

    pub fn report_path(&self, kind: ReportKind) -> Utf8PathBuf {
        self.root
            .join("Demultiplexing")
            .join("Reports")
            .join("html")
            .join(&self.name.flowcell_id)
            .join("all")
            .join("all")
            .join("all")
            .join(kind.file_name())
    }

    pub fn cycle_times_path(&self) -> Utf8PathBuf {
        self.root.join("Logs").join(cycle_times::FILE_NAME)
    }

    pub fn stats_path(&self) -> Utf8PathBuf {
        self.root
            .join("Demultiplexing")
            .join("Stats")
            .join("Stats.json")
    }

    /// Parses every source found in the folder. Missing sources are skipped;
    /// any other failure aborts.
    pub fn parse(&self, sink: &dyn DiagnosticSink) -> Result<ParsedRun, FlowcellError> {
        let run_info = optional(
            RunInfo::from_path(self.run_info_path().as_std_path(), sink),
            "run info",
            sink,
        )?;
        let run_parameters = optional(
            RunParameters::from_path(self.run_parameters_path().as_std_path()),
            "run parameters",
            sink,
        )?;
        let samplesheet = optional(
            SampleSheet::from_path(self.samplesheet_path().as_std_path()),
            "sample sheet",
            sink,
        )?;
        let lane_barcodes = optional(
            LaneReport::from_path(self.report_path(ReportKind::LaneBarcode).as_std_path()),
            "lane barcode report",
            sink,
        )?;
        let lanes = optional(
            LaneReport::from_path(self.report_path(ReportKind::Lane).as_std_path()),
            "lane report",
            sink,
        )?;
        let cycle_times = optional(
            cycle_times::from_path(self.cycle_times_path().as_std_path()),
            "cycle times",
            sink,
        )?;
        let json_stats = optional(read_json(&self.stats_path()), "demultiplexing stats", sink)?;

        Ok(ParsedRun {
            name: self.name.document_name(),
            run_info,
            run_parameters,
            samplesheet,
            lane_barcodes,
            lanes,
            cycle_times,
            json_stats,
        })
    }
}

fn optional<T>(
    result: Result<T, FlowcellError>,
    source: &str,
    sink: &dyn DiagnosticSink,
) -> Result<Option<T>, FlowcellError> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(FlowcellError::NotFound(path)) => {
            sink.event(DiagnosticEvent::info(
                COMPONENT,
                format!("no {source} at {}, skipping", path.display()),
            ));
            Ok(None)
        }
        Err(err) => Err(err),
    }
}

fn read_json(path: &Utf8Path) -> Result<Value, FlowcellError> {
    let text = read_text(path.as_std_path())?;
    serde_json::from_str(&text).map_err(|err| FlowcellError::format(path.as_str(), err.to_string()))
}

/// Everything parsed from one run folder.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedRun {
    pub name: String,
    pub run_info: Option<RunInfo>,
    pub run_parameters: Option<RunParameters>,
    pub samplesheet: Option<SampleSheet>,
    pub lane_barcodes: Option<LaneReport>,
    pub lanes: Option<LaneReport>,
    pub cycle_times: Option<Vec<CycleInterval>>,
    pub json_stats: Option<Value>,
}

impl ParsedRun {
    /// Assembles the run document; sources that were not found have no key.
    pub fn to_document(&self) -> Document {
        let mut document = Map::new();
        document.insert(NAME_FIELD.to_string(), Value::String(self.name.clone()));

        if let Some(info) = &self.run_info {
            document.insert("RunInfo".to_string(), info.data.clone().into_value());
            if let Some(recipe) = &info.recipe {
                document.insert("recipe".to_string(), Value::String(recipe.clone()));
            }
        }
        if let Some(params) = &self.run_parameters {
            document.insert("RunParameters".to_string(), params.data.clone().into_value());
        }
        if let Some(sheet) = &self.samplesheet {
            document.insert(
                "samplesheet_csv".to_string(),
                Value::Array(sheet.records.iter().map(|record| record.to_value()).collect()),
            );
        }

        let mut demux = Map::new();
        if let Some(report) = &self.lane_barcodes {
            demux.insert("Flowcell_stats".to_string(), report.summary.to_value());
            demux.insert(
                "Barcode_lane_statistics".to_string(),
                Value::Array(report.rows.iter().map(|row| row.to_value()).collect()),
            );
        }
        if let Some(report) = &self.lanes {
            demux.insert(
                "Lanes_stats".to_string(),
                Value::Array(report.rows.iter().map(|row| row.to_value()).collect()),
            );
        }
        if !demux.is_empty() {
            let mut illumina = Map::new();
            illumina.insert("Demultiplex_Stats".to_string(), Value::Object(demux));
            document.insert("illumina".to_string(), Value::Object(illumina));
        }

        if let Some(cycles) = &self.cycle_times {
            document.insert(
                "time_cycles".to_string(),
                Value::Array(cycles.iter().map(CycleInterval::to_value).collect()),
            );
        }
        if let Some(stats) = &self.json_stats {
            document.insert("Json_Stats".to_string(), stats.clone());
        }
        document
    }
}
