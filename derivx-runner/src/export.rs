//! CSV export of a result surface's reporting window.
//!
//! Rows are written highest price first (the reverse of `calc_price` order
//! for an ascending ladder), one `price` column followed by `day_{n}`
//! columns numbered from 1 in surface coordinates.

use std::path::Path;

use anyhow::{bail, Context, Result};

use derivx_core::{ResultSurface, SurfaceWindow};

/// Render columns `[run_from, run_from + run_days)` of `surface` as CSV.
///
/// `calc_price` labels the surface rows in their stored order.
pub fn window_csv(
    surface: &ResultSurface,
    calc_price: &[f64],
    run_from: usize,
    run_days: usize,
) -> Result<String> {
    let window = surface
        .window(run_from, run_days)
        .context("reporting window does not fit the surface")?;
    render(&window, calc_price)
}

/// Write the reporting window to `path`.
pub fn write_window_csv(
    path: &Path,
    surface: &ResultSurface,
    calc_price: &[f64],
    run_from: usize,
    run_days: usize,
) -> Result<()> {
    let csv = window_csv(surface, calc_price, run_from, run_days)?;
    std::fs::write(path, csv).with_context(|| format!("failed to write {}", path.display()))
}

fn render(window: &SurfaceWindow<'_>, calc_price: &[f64]) -> Result<String> {
    if calc_price.len() != window.row_count() {
        bail!(
            "{} price labels for {} surface rows",
            calc_price.len(),
            window.row_count()
        );
    }

    let mut wtr = csv::Writer::from_writer(vec![]);

    let mut header = Vec::with_capacity(window.days() + 1);
    header.push("price".to_string());
    header.extend((0..window.days()).map(|d| format!("day_{}", window.start() + d + 1)));
    wtr.write_record(&header)?;

    let rows: Vec<&[f64]> = window.rows().collect();
    for (price, row) in calc_price.iter().zip(rows).rev() {
        let mut record = Vec::with_capacity(row.len() + 1);
        record.push(price.to_string());
        record.extend(row.iter().map(f64::to_string));
        wtr.write_record(&record)?;
    }

    let bytes = wtr.into_inner().context("failed to flush CSV writer")?;
    String::from_utf8(bytes).context("CSV output is not UTF-8")
}
