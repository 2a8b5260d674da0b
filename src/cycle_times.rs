use std::path::Path;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::error::FlowcellError;
use crate::fs_util::read_text;

pub const FILE_NAME: &str = "CycleTimes.txt";

const DOCUMENT_TIMESTAMP: &str = "%Y-%m-%dT%H:%M:%S%.3f";
const TIMESTAMP_FORMATS: [&str; 2] = ["%m/%d/%Y %H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CycleInterval {
    pub cycle_number: u32,
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
}

impl CycleInterval {
    pub fn to_value(&self) -> Value {
        json!({
            "cycle_number": self.cycle_number,
            "start": self.start.format(DOCUMENT_TIMESTAMP).to_string(),
            "end": self.end.format(DOCUMENT_TIMESTAMP).to_string(),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct CycleEvent {
    cycle_number: u32,
    at: NaiveDateTime,
}

/// Parses a cycle timing log (`date time barcode cycle info...`, one header
/// line) into one interval per run of consecutive lines sharing a cycle number.
pub fn parse(text: &str, input: &str) -> Result<Vec<CycleInterval>, FlowcellError> {
    let events = text
        .lines()
        .enumerate()
        .skip(1)
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(index, line)| parse_event(line, index + 1, input))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(aggregate(&events))
}

pub fn from_path(path: &Path) -> Result<Vec<CycleInterval>, FlowcellError> {
    let text = read_text(path)?;
    let cycles = parse(&text, &path.display().to_string())?;
    tracing::debug!(path = %path.display(), cycles = cycles.len(), "parsed cycle times");
    Ok(cycles)
}

fn aggregate(events: &[CycleEvent]) -> Vec<CycleInterval> {
    let Some((first, rest)) = events.split_first() else {
        return Vec::new();
    };
    let seed = |event: &CycleEvent| CycleInterval {
        cycle_number: event.cycle_number,
        start: event.at,
        end: event.at,
    };

    let (mut intervals, current) =
        rest.iter()
            .fold((Vec::new(), seed(first)), |(mut done, mut current), event| {
                if event.cycle_number == current.cycle_number {
                    current.end = event.at;
                } else {
                    done.push(current);
                    current = seed(event);
                }
                (done, current)
            });
    intervals.push(current);
    intervals
}

fn parse_event(line: &str, line_number: usize, input: &str) -> Result<CycleEvent, FlowcellError> {
    let fields = line.split_whitespace().collect::<Vec<_>>();
    let [date, time, _barcode, cycle, ..] = fields.as_slice() else {
        return Err(FlowcellError::format(
            input,
            format!("line {line_number}: expected date, time, barcode and cycle fields"),
        ));
    };

    let stamp = format!("{date} {time}");
    let at = TIMESTAMP_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(&stamp, format).ok())
        .ok_or_else(|| {
            FlowcellError::format(input, format!("line {line_number}: bad timestamp {stamp:?}"))
        })?;
    let cycle_number = cycle.parse::<u32>().map_err(|_| {
        FlowcellError::format(input, format!("line {line_number}: bad cycle number {cycle:?}"))
    })?;

    Ok(CycleEvent { cycle_number, at })
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;

    fn at(h: u32, m: u32, s: u32, ms: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2019, 5, 20)
            .unwrap()
            .and_hms_milli_opt(h, m, s, ms)
            .unwrap()
    }

    #[test]
    fn repeated_cycle_numbers_start_new_intervals() {
        let events = [
            CycleEvent { cycle_number: 1, at: at(10, 0, 0, 0) },
            CycleEvent { cycle_number: 2, at: at(10, 5, 0, 0) },
            CycleEvent { cycle_number: 1, at: at(10, 9, 0, 0) },
        ];
        let intervals = aggregate(&events);
        assert_eq!(
            intervals.iter().map(|i| i.cycle_number).collect::<Vec<_>>(),
            vec![1, 2, 1]
        );
    }

    #[test]
    fn accepts_iso_dates() {
        let cycles = parse(
            "Date\tTime\tBarcode\tCycle\tInfo\n2019-05-20\t10:00:00.500\tFC\t7\tImaging\n",
            "test",
        )
        .unwrap();
        assert_eq!(cycles[0].start, at(10, 0, 0, 500));
    }

    #[test]
    fn short_line_is_format_error() {
        let err = parse("header\n05/20/2019 10:00:00.000 FC\n", "test").unwrap_err();
        assert!(matches!(err, FlowcellError::Format { .. }));
    }
}
