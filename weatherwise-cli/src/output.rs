use std::sync::Arc;

use chrono::NaiveDate;
use weatherwise_core::{
    AggregatedSummary, FetchOutcome, FetchReport, PipelineReport, ProviderClient,
};

pub fn print_providers(clients: &[Arc<dyn ProviderClient>]) {
    println!("{:<12} STATUS", "PROVIDER");
    for client in clients {
        let status = if client.is_available() { "ready" } else { "not configured" };
        println!("{:<12} {status}", client.name());
    }
}

pub fn print_fetch(report: &FetchReport) {
    if report.no_clients_dispatched() {
        println!("No providers available. Run `weatherwise providers` to check configuration.\n");
        return;
    }

    println!("Sources:");
    for attempt in &report.attempts {
        let marker = match attempt.outcome {
            FetchOutcome::Succeeded => "✓",
            FetchOutcome::Failed { .. } => "✗",
            FetchOutcome::Cancelled => "…",
        };
        println!(
            "  {marker} {:<12} {:>6} ms  {}",
            attempt.provider,
            attempt.latency.as_millis(),
            attempt.outcome
        );
    }
    for name in &report.unavailable {
        println!("  - {name:<12} skipped (unavailable)");
    }
    println!();
}

pub fn print_summary(summary: &AggregatedSummary) {
    println!("{:<14} {:>10} {:>10} {:>10} {:>6}", "FIELD", "MEDIAN", "MIN", "MAX", "N");
    for (metric, s) in summary.iter() {
        println!(
            "{:<14} {:>10} {:>10} {:>10} {:>6}",
            format!("{metric} ({})", metric.unit()),
            fmt_opt(s.value),
            fmt_opt(s.min),
            fmt_opt(s.max),
            s.count
        );
    }
    println!();
}

pub fn print_forecast(report: &PipelineReport) {
    println!("Temperature forecast for {} (°C):", report.location);
    println!("{:<14} {:>9} {:>9} {:>9}", "DAY", "FORECAST", "LOW", "HIGH");
    for row in report.future_rows() {
        println!(
            "{:<14} {:>9.2} {:>9.2} {:>9.2}",
            fmt_date(row.date),
            row.point,
            row.lower,
            row.upper
        );
    }
}

fn fmt_opt(value: Option<f64>) -> String {
    value.map(|v| format!("{v:.2}")).unwrap_or_else(|| "-".to_string())
}

fn fmt_date(date: NaiveDate) -> String {
    date.format("%a %d.%m.%Y").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_values_render_as_dash() {
        assert_eq!(fmt_opt(None), "-");
        assert_eq!(fmt_opt(Some(12.3456)), "12.35");
    }

    #[test]
    fn dates_render_day_first() {
        let date = NaiveDate::from_ymd_opt(2024, 1, 15).expect("valid date");
        assert_eq!(fmt_date(date), "Mon 15.01.2024");
    }
}
