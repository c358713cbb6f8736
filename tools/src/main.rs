//! analytics-runner: headless runner for the remittance customer analytics.
//!
//! Usage:
//!   analytics-runner --input transactions.csv --start 2024-01-01 --end 2024-06-30
//!   analytics-runner --input transactions.csv --country Tunisia --json
//!   analytics-runner --input transactions.csv --rfm-out rfm.csv
//!   analytics-runner --input transactions.csv --day 2024-05-10
//!   analytics-runner --input transactions.csv --ipc-mode

use anyhow::{anyhow, Context, Result};
use chrono::{NaiveDate, NaiveDateTime};
use remit_analytics_core::{
    aggregate::{day_summary, DaySummary},
    config::AnalyticsConfig,
    filter::FilterSpec,
    ingest::{read_csv_path, Dataset},
    report::{DashboardReport, Section},
    rfm::compute_rfm,
    Transaction,
};
use std::env;
use std::fs::File;
use std::io::{self, BufRead, Write};

#[derive(serde::Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum IpcCommand {
    GetReport,
    GetDay {
        date: NaiveDate,
    },
    SetFilter {
        start:   Option<NaiveDate>,
        end:     Option<NaiveDate>,
        country: Option<String>,
    },
    ExportRfm {
        path: String,
    },
    Quit,
}

fn main() -> Result<()> {
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    let input = flag_value(&args, "--input").ok_or_else(|| anyhow!("--input <csv> is required"))?;
    let config_path = flag_value(&args, "--config");
    let start = parse_arg::<NaiveDate>(&args, "--start");
    let end = parse_arg::<NaiveDate>(&args, "--end");
    let country = flag_value(&args, "--country").unwrap_or("All");
    let reference = parse_arg::<NaiveDate>(&args, "--reference-date")
        .and_then(|d| d.and_hms_opt(0, 0, 0));
    let day = parse_arg::<NaiveDate>(&args, "--day");
    let rfm_out = flag_value(&args, "--rfm-out");
    let json = args.iter().any(|a| a == "--json");
    let ipc_mode = args.iter().any(|a| a == "--ipc-mode");

    let config = match config_path {
        Some(path) => AnalyticsConfig::load(path)?,
        None => AnalyticsConfig::default(),
    };

    let dataset = read_csv_path(input, &config).with_context(|| format!("Cannot load {input}"))?;
    log::info!(
        "{input}: {} rows read, {} kept, {} dropped",
        dataset.report.rows_read,
        dataset.report.rows_kept,
        dataset.report.rows_dropped()
    );

    let Some(mut filter) = default_filter(&dataset.records, &config, country) else {
        println!("{input}: no usable transactions");
        return Ok(());
    };
    narrow_filter(&mut filter, start, end);

    if ipc_mode {
        return run_ipc_loop(&dataset, &config, filter, reference);
    }

    let report = DashboardReport::build(&dataset.records, &filter, &config, reference)?;

    if let Some(path) = rfm_out {
        export_rfm(&dataset.records, &filter, reference, path)?;
        if !json {
            println!("RFM profiles written to {path}");
        }
    }

    if let Some(date) = day {
        let summary = selected_day(&dataset.records, &filter, date)?;
        if json {
            println!("{}", serde_json::to_string_pretty(&summary)?);
        } else {
            print_day(&summary);
        }
        return Ok(());
    }

    if json {
        println!("{}", report.to_json()?);
    } else {
        print_summary(input, &dataset, &report);
    }
    Ok(())
}

/// Drill-down for one day of the filtered view.
fn selected_day(records: &[Transaction], filter: &FilterSpec, date: NaiveDate) -> Result<DaySummary> {
    day_summary(&filter.apply(records), date).ok_or_else(|| anyhow!("No day window for {date}"))
}

/// Full data range, with the country selection resolved to a code.
fn default_filter(records: &[Transaction], config: &AnalyticsConfig, country: &str) -> Option<FilterSpec> {
    let first = records.iter().map(|tx| tx.timestamp.date()).min()?;
    let last = records.iter().map(|tx| tx.timestamp.date()).max()?;
    Some(FilterSpec::for_dates(first, last, config.resolve_country_filter(country)))
}

fn narrow_filter(filter: &mut FilterSpec, start: Option<NaiveDate>, end: Option<NaiveDate>) {
    let bounds = FilterSpec::for_dates(
        start.unwrap_or(filter.start.date()),
        end.unwrap_or(filter.end.date()),
        None,
    );
    filter.start = bounds.start;
    filter.end = bounds.end;
}

fn export_rfm(
    records: &[Transaction],
    filter: &FilterSpec,
    reference: Option<NaiveDateTime>,
    path: &str,
) -> Result<()> {
    let analysis = compute_rfm(&filter.apply(records), reference)?;
    let file = File::create(path).with_context(|| format!("Cannot create {path}"))?;
    analysis.write_csv(file)?;
    log::info!("Wrote {} RFM profiles to {path}", analysis.profiles.len());
    Ok(())
}

fn run_ipc_loop(
    dataset: &Dataset,
    config: &AnalyticsConfig,
    mut filter: FilterSpec,
    reference: Option<NaiveDateTime>,
) -> Result<()> {
    let stdin = io::stdin();
    let mut stdout = io::stdout();
    let mut handle = stdin.lock();
    let mut buffer = String::new();

    loop {
        buffer.clear();
        let bytes_read = handle.read_line(&mut buffer)?;
        if bytes_read == 0 {
            break; // EOF
        }

        let cmd: IpcCommand = match serde_json::from_str(&buffer) {
            Ok(c) => c,
            Err(e) => {
                reply_error(&mut stdout, e)?;
                continue;
            }
        };

        match cmd {
            IpcCommand::Quit => break,
            IpcCommand::GetReport => {
                let report = DashboardReport::build(&dataset.records, &filter, config, reference)?;
                writeln!(stdout, "{}", serde_json::to_string(&report)?)?;
            }
            IpcCommand::GetDay { date } => match selected_day(&dataset.records, &filter, date) {
                Ok(summary) => writeln!(stdout, "{}", serde_json::to_string(&summary)?)?,
                Err(e) => reply_error(&mut stdout, e)?,
            },
            IpcCommand::SetFilter { start, end, country } => {
                if let Some(country) = country {
                    filter.country = config.resolve_country_filter(&country);
                }
                narrow_filter(&mut filter, start, end);
                let report = DashboardReport::build(&dataset.records, &filter, config, reference)?;
                writeln!(stdout, "{}", serde_json::to_string(&report)?)?;
            }
            IpcCommand::ExportRfm { path } => {
                match export_rfm(&dataset.records, &filter, reference, &path) {
                    Ok(()) => writeln!(stdout, "{}", serde_json::json!({ "exported": path }))?,
                    Err(e) => reply_error(&mut stdout, e)?,
                }
            }
        }
        stdout.flush()?;
    }
    Ok(())
}

fn reply_error(stdout: &mut io::Stdout, e: impl std::fmt::Display) -> Result<()> {
    let err_json = serde_json::json!({ "error": e.to_string() });
    writeln!(stdout, "{}", err_json)?;
    stdout.flush()?;
    Ok(())
}

fn print_summary(input: &str, dataset: &Dataset, report: &DashboardReport) {
    let load = &dataset.report;
    let filter = &report.filter;

    println!("=== LOAD ===");
    println!("  input:          {input}");
    println!("  rows read:      {}", load.rows_read);
    println!("  rows kept:      {}", load.rows_kept);
    println!("  rows dropped:   {}", load.rows_dropped());
    if !load.missing_columns.is_empty() {
        println!("  missing cols:   {}", load.missing_columns.join(", "));
    }

    println!();
    println!("=== FILTER ===");
    println!("  from:           {}", filter.start);
    println!("  to:             {}", filter.end);
    println!("  country:        {}", filter.country.as_deref().unwrap_or("All"));
    println!("  records:        {}", report.record_count);

    let status = &report.status_breakdown;
    println!();
    println!("=== STATUS ===");
    println!(
        "  transactions:   {} (complete {}, in progress {}, cancelled {})",
        status.transactions.total,
        status.transactions.complete,
        status.transactions.in_progress,
        status.transactions.cancelled
    );
    println!("  customers:      {}", status.customers.total);
    println!("  amount:         {:.2}", status.amounts.total.total);

    if let Some(kpis) = &report.kpis {
        println!();
        println!("=== LATEST DAY ({}) ===", kpis.latest_day);
        println!("  transactions:   {}", kpis.today.breakdown.transactions.total);
        println!("  new customers:  {}", kpis.today.new_customers.total);
        if let Some(big) = &kpis.today.biggest {
            println!("  biggest:        {:.2} ({})", big.amount, big.customer_id);
        }
    }

    println!();
    println!("=== COHORTS ===");
    match &report.cohorts {
        Section::Ready { value } => {
            for row in &value.table.rows {
                let cells: Vec<String> = value
                    .table
                    .indices
                    .iter()
                    .map(|i| row.retention.get(i).map(|r| format!("{r:5.1}")).unwrap_or_else(|| "    -".into()))
                    .collect();
                println!("  {:<16} {}", row.label(), cells.join(" "));
            }
        }
        Section::Unavailable { reason } => println!("  ({reason})"),
    }

    println!();
    println!("=== RFM SEGMENTS ===");
    match &report.rfm {
        Section::Ready { .. } => {
            for s in &report.segments {
                println!("  {:<14} {}", s.segment.label(), s.customers);
            }
        }
        Section::Unavailable { reason } => println!("  ({reason})"),
    }
}

fn print_day(summary: &DaySummary) {
    let tx = &summary.kpis.breakdown.transactions;
    let new = &summary.new_by_first_status;
    println!("=== DAY {} ===", summary.date);
    println!(
        "  transactions:   {} (complete {}, in progress {}, cancelled {})",
        tx.total, tx.complete, tx.in_progress, tx.cancelled
    );
    for (label, split) in [("cash pickup", &summary.cash_pickup), ("bank account", &summary.bank_transfer)] {
        println!(
            "  {label:<15} {} (complete {}, in progress {}, cancelled {})",
            split.total, split.complete, split.in_progress, split.cancelled
        );
    }
    println!("  active:         {}", summary.active_customers);
    println!(
        "  new customers:  {} (complete {}, in progress {}, cancelled {})",
        new.total, new.complete, new.in_progress, new.cancelled
    );
}

fn flag_value<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
    args.windows(2)
        .find(|w| w[0] == flag)
        .map(|w| w[1].as_str())
}

fn parse_arg<T: std::str::FromStr>(args: &[String], flag: &str) -> Option<T> {
    flag_value(args, flag).and_then(|v| v.parse().ok())
}
