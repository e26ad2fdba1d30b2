use std::io::Write;
use std::path::Path;

use crate::error::Result;
use crate::metrics::ScoreCurves;

/// Write the score curves as CSV: one row per episode (1-based)
pub fn export_scores_csv<P: AsRef<Path>>(curves: &ScoreCurves, path: P) -> Result<()> {
    let mut file = std::fs::File::create(path)?;
    write_scores_csv(curves, &mut file)
}

pub fn write_scores_csv<W: Write>(curves: &ScoreCurves, out: &mut W) -> Result<()> {
    writeln!(out, "episode,score,running_mean,running_median")?;

    for i in 0..curves.len() {
        writeln!(
            out,
            "{},{},{},{}",
            i + 1,
            curves.raw[i],
            curves.running_mean[i],
            curves.running_median[i]
        )?;
    }

    Ok(())
}
