//! CSV export of recorded scan data.
//!
//! Writes the raw per-repeat log and the position-averaged series of one
//! run to disk: `<name>.csv` for the raw samples and `<name>_avg.csv` for
//! the averaged curve. Run metadata goes into `#`-prefixed header lines so
//! the files remain self-describing after leaving the acquisition machine.

use crate::engine::recorder::AveragedPoint;
use crate::error::EngineResult;
use crate::measurement::MeasurementSample;
use crate::metadata::RunMetadata;
use std::fs::File;
use std::io::Write;
use std::path::Path;

/// Write raw and averaged data files for one run.
///
/// `path` names the raw-data file; the averaged series lands next to it
/// with an `_avg` suffix before the extension.
pub fn export_run<P: AsRef<Path>>(
    path: P,
    meta: &RunMetadata,
    raw: &[MeasurementSample],
    averaged: &[AveragedPoint],
) -> EngineResult<()> {
    let path = path.as_ref();
    write_raw(path, meta, raw)?;
    write_averaged(&averaged_path(path), meta, averaged)?;
    Ok(())
}

fn averaged_path(path: &Path) -> std::path::PathBuf {
    let stem = path.file_stem().unwrap_or_default().to_string_lossy();
    let name = match path.extension() {
        Some(ext) => format!("{stem}_avg.{}", ext.to_string_lossy()),
        None => format!("{stem}_avg"),
    };
    path.with_file_name(name)
}

fn write_header(file: &mut File, meta: &RunMetadata) -> EngineResult<()> {
    writeln!(file, "# run_id: {}", meta.run_id)?;
    writeln!(file, "# started_at: {}", meta.started_at.to_rfc3339())?;
    writeln!(file, "# tag: {}", meta.tag)?;
    writeln!(
        file,
        "# scan: {} mm to {} mm, step {} mm, {} repeats, {} scans",
        meta.scan.start_mm,
        meta.scan.end_mm,
        meta.scan.step_mm,
        meta.scan.repeats_per_point,
        meta.scan.scan_count
    )?;
    Ok(())
}

fn write_raw(path: &Path, meta: &RunMetadata, raw: &[MeasurementSample]) -> EngineResult<()> {
    let mut file = File::create(path)?;
    write_header(&mut file, meta)?;

    let mut writer = csv::Writer::from_writer(file);
    writer.write_record([
        "timestamp",
        "scan_index",
        "point_index",
        "delay_position_mm",
        "x_v",
        "y_v",
        "r_v",
    ])?;
    for sample in raw {
        writer.write_record([
            sample.timestamp.to_rfc3339(),
            sample.scan_index.to_string(),
            sample.point_index.to_string(),
            sample.position_mm.to_string(),
            sample.x_v.to_string(),
            sample.y_v.to_string(),
            sample.r_v.to_string(),
        ])?;
    }
    writer.flush()?;
    Ok(())
}

fn write_averaged(
    path: &Path,
    meta: &RunMetadata,
    averaged: &[AveragedPoint],
) -> EngineResult<()> {
    let mut file = File::create(path)?;
    write_header(&mut file, meta)?;

    let mut writer = csv::Writer::from_writer(file);
    writer.write_record(["delay_position_mm", "samples", "x_v", "y_v", "r_v"])?;
    for point in averaged {
        writer.write_record([
            point.position_mm.to_string(),
            point.samples.to_string(),
            point.x_v.to_string(),
            point.y_v.to_string(),
            point.r_v.to_string(),
        ])?;
    }
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ScanConfig;

    #[test]
    fn export_writes_both_files_with_metadata() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("run.csv");

        let meta = RunMetadata::new(&ScanConfig::default(), "test run");
        let raw = vec![
            MeasurementSample::new(0, 0, 0.0, 0.5, 0.1),
            MeasurementSample::new(0, 1, 1.0, 0.6, 0.2),
        ];
        let averaged = vec![AveragedPoint {
            position_mm: 0.0,
            samples: 1,
            x_v: 0.5,
            y_v: 0.1,
            r_v: 0.51,
        }];

        export_run(&path, &meta, &raw, &averaged).unwrap();

        let raw_text = std::fs::read_to_string(&path).unwrap();
        assert!(raw_text.starts_with("# run_id:"));
        assert!(raw_text.contains("delay_position_mm"));
        assert!(raw_text.lines().count() >= 7); // 4 header + 1 column row + 2 samples

        let avg_text = std::fs::read_to_string(dir.path().join("run_avg.csv")).unwrap();
        assert!(avg_text.contains("test run"));
        assert!(avg_text.contains("0.5"));
    }
}
