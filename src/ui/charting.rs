use crate::results::ChartSeries;

/// Compute X (session number) and Y (chars/min) bounds for the history chart
pub fn compute_chart_params(series: &ChartSeries) -> (f64, f64) {
    let sessions = series.speeds.last().map(|&(x, _)| x).unwrap_or(1.0);

    // a single point still needs a non-empty x range
    (sessions.max(2.0), series.y_max.max(100.0))
}

/// Format a simple numeric label consistently
pub fn format_label(val: f64) -> String {
    if (val - val.round()).abs() < f64::EPSILON {
        format!("{}", val.round())
    } else {
        format!("{val:.2}")
    }
}
