use std::path::Path;

use crate::algorithms::RoiTraces;

use super::{FormatError, Result};

fn check_columns(traces: &RoiTraces) -> Result<()> {
    if traces.traces.ncols() != traces.labels.len() || traces.centroids.nrows() != traces.labels.len()
    {
        return Err(FormatError::UnsupportedLayout(format!(
            "{} labels but {} trace columns and {} centroids",
            traces.labels.len(),
            traces.traces.ncols(),
            traces.centroids.nrows()
        )));
    }
    Ok(())
}

/// One row per frame (numbered from 1), one `ROI #<label>` column per ROI.
pub fn write_traces_csv(path: impl AsRef<Path>, traces: &RoiTraces) -> Result<()> {
    check_columns(traces)?;
    let mut writer = csv::Writer::from_path(path)?;
    let mut header = vec!["Frame".to_string()];
    header.extend(traces.labels.iter().map(|label| format!("ROI #{label}")));
    writer.write_record(&header)?;

    for (index, row) in traces.traces.rows().into_iter().enumerate() {
        let mut record = vec![(index + 1).to_string()];
        record.extend(row.iter().map(|value| value.to_string()));
        writer.write_record(&record)?;
    }
    writer.flush()?;
    Ok(())
}

/// `Label,X,Y` rows in label order.
pub fn write_centroids_csv(path: impl AsRef<Path>, traces: &RoiTraces) -> Result<()> {
    check_columns(traces)?;
    let mut writer = csv::Writer::from_path(path)?;
    writer.write_record(["Label", "X", "Y"])?;
    for (label, centroid) in traces.labels.iter().zip(traces.centroids.rows()) {
        writer.write_record([
            label.to_string(),
            centroid[0].to_string(),
            centroid[1].to_string(),
        ])?;
    }
    writer.flush()?;
    Ok(())
}
