use std::fs::File;
use std::io::Write;
use std::path::Path;

use serde::Serialize;

use crate::error::Result;

/// Append-only CSV sink for controller progress rows.
///
/// A disabled sink accepts rows and drops them.
pub struct Telemetry {
    writer: Option<csv::Writer<Box<dyn Write>>>,
}

impl Telemetry {
    pub fn disabled() -> Telemetry {
        Telemetry { writer: None }
    }

    pub fn to_path(path: impl AsRef<Path>) -> Result<Telemetry> {
        let file = File::create(path)?;
        Ok(Telemetry::to_writer(Box::new(file)))
    }

    // rows of different controllers may share one file, hence flexible
    pub fn to_writer(writer: Box<dyn Write>) -> Telemetry {
        Telemetry {
            writer: Some(csv::WriterBuilder::new().flexible(true).from_writer(writer)),
        }
    }

    // header comes from the first record's field names
    pub fn record<R: Serialize>(&mut self, row: &R) -> Result<()> {
        if let Some(writer) = self.writer.as_mut() {
            writer.serialize(row)?;
        }
        Ok(())
    }

    pub fn flush(&mut self) -> Result<()> {
        if let Some(writer) = self.writer.as_mut() {
            writer.flush()?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct HillClimbRow {
    pub iteration: u64,
    pub elapsed_ms: u64,
    pub current_cost: f64,
    // empty until a feasible state is seen
    pub best_cost: Option<f64>,
    pub hard_violations: u64,
    pub improvements: u64,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct AnnealingRow {
    pub iteration: u64,
    pub elapsed_ms: u64,
    pub current_cost: f64,
    pub best_cost: Option<f64>,
    pub temperature: f64,
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LogStatus {
    Initial,
    Better,
    NoImprovement,
    Optimal,
    Timeout,
    Final,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ViolationRow {
    pub iteration: u64,
    pub elapsed_ms: u64,
    pub violations: u64,
    pub status: LogStatus,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn writes_header_and_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pails.csv");
        let mut telemetry = Telemetry::to_path(&path).unwrap();
        for (iteration, status) in [(0, LogStatus::Initial), (500, LogStatus::NoImprovement)] {
            telemetry
                .record(&ViolationRow {
                    iteration,
                    elapsed_ms: iteration / 10,
                    violations: 7,
                    status,
                })
                .unwrap();
        }
        telemetry.flush().unwrap();
        drop(telemetry);

        let text = fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "iteration,elapsed_ms,violations,status");
        assert_eq!(lines[1], "0,0,7,INITIAL");
        assert_eq!(lines[2], "500,50,7,NO_IMPROVEMENT");
    }

    #[test]
    fn disabled_sink_accepts_rows() {
        let mut telemetry = Telemetry::disabled();
        let row = AnnealingRow {
            iteration: 1,
            elapsed_ms: 2,
            current_cost: 3.0,
            best_cost: Some(3.0),
            temperature: 5000.0,
        };
        telemetry.record(&row).unwrap();
        telemetry.flush().unwrap();
    }
}
