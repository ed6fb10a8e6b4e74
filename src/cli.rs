use std::io::Write as _;

use anyhow::{bail, Context, Result};

use crate::config;
use crate::errlog::{ErrorRecord, ErrorSink, FileErrorLog};
use crate::model::iteration::{Iteration, TimeFrame};
use crate::processor::SprintProcessor;
use crate::store::azure::AzureStore;
use crate::store::WorkItemStore;

pub async fn run(args: &[String]) -> Result<()> {
    match args.first().map(String::as_str) {
        Some("close") => handle_close(&args[1..]).await,
        Some("iterations") => handle_iterations().await,
        Some("errors") => handle_errors(),
        None | Some("help") | Some("--help") | Some("-h") => {
            print_help();
            Ok(())
        }
        Some(other) => bail!("Unknown command: {other}\n\nRun `sprintclose help` for usage"),
    }
}

fn load_store() -> Result<AzureStore> {
    let config = config::load_config()?;
    let Some(azure) = config.azure else {
        bail!("No Azure DevOps credentials configured. Add an [azure] table to ~/.sprintclose/config.toml");
    };
    Ok(AzureStore::new(&azure))
}

/// Parse `sprintclose close` flags. Returns true when the previous sprint
/// should be closed into the current one instead of current into future.
pub fn parse_close_args(args: &[String]) -> Result<bool> {
    let mut previous = false;
    for arg in args {
        match arg.as_str() {
            "-p" | "--previous" => previous = true,
            other => bail!("Unknown flag for close: {other}\n\nUsage: sprintclose close [--previous]"),
        }
    }
    Ok(previous)
}

struct SprintPair {
    source: Iteration,
    destination: Iteration,
}

fn pick_iterations(iterations: &[Iteration], previous: bool) -> Result<SprintPair> {
    let current = iterations
        .iter()
        .find(|it| it.time_frame == TimeFrame::Current)
        .cloned();
    if previous {
        // The most recent past sprint closes into the current one.
        let past = iterations
            .iter()
            .filter(|it| it.time_frame == TimeFrame::Past)
            .last()
            .cloned();
        match (past, current) {
            (Some(source), Some(destination)) => Ok(SprintPair {
                source,
                destination,
            }),
            _ => bail!("Need a past and a current iteration to close the previous sprint"),
        }
    } else {
        let future = iterations
            .iter()
            .find(|it| it.time_frame == TimeFrame::Future)
            .cloned();
        match (current, future) {
            (Some(source), Some(destination)) => Ok(SprintPair {
                source,
                destination,
            }),
            _ => bail!("Need a current and a future iteration to close the current sprint"),
        }
    }
}

async fn handle_close(args: &[String]) -> Result<()> {
    let previous = parse_close_args(args)?;
    let store = load_store()?;
    let iterations = store
        .list_iterations()
        .await
        .context("Failed to list team iterations")?;
    let pair = pick_iterations(&iterations, previous)?;

    let log = FileErrorLog::new();
    let seen_before = log.read_all().len();

    let processor = SprintProcessor::new(&store, &log, pair.destination.clone());
    let outcome = processor
        .process(&pair.source, |pct| {
            print!(
                "\rClosing sprint '{}' into '{}'... {pct}%",
                pair.source.name, pair.destination.name
            );
            let _ = std::io::stdout().flush();
        })
        .await;
    println!();

    let summary = match outcome {
        Ok(summary) => summary,
        Err(e) => {
            log.record(ErrorRecord::new(e.to_string(), e.work_item_id()));
            return Err(e.into());
        }
    };

    if summary.errors_recorded == 0 {
        println!(
            "Sprint successfully closed ({} items in {} clusters)",
            summary.total_items, summary.clusters
        );
    } else {
        println!("Sprint closed with {} errors:", summary.errors_recorded);
        for record in log.read_all().into_iter().skip(seen_before) {
            print_record(&record);
        }
    }
    Ok(())
}

async fn handle_iterations() -> Result<()> {
    let store = load_store()?;
    let iterations = store
        .list_iterations()
        .await
        .context("Failed to list team iterations")?;
    if iterations.is_empty() {
        println!("No iterations found for the team.");
        return Ok(());
    }
    for it in &iterations {
        let marker = match it.time_frame {
            TimeFrame::Past => "past",
            TimeFrame::Current => "current",
            TimeFrame::Future => "future",
        };
        println!("{marker:<8} {} ({})", it.name, it.path);
    }
    Ok(())
}

fn handle_errors() -> Result<()> {
    let records = FileErrorLog::new().read_all();
    if records.is_empty() {
        println!("No errors recorded.");
        return Ok(());
    }
    for record in &records {
        print_record(record);
    }
    Ok(())
}

fn print_record(record: &ErrorRecord) {
    println!("  [{}] {}", record.timestamp, record.error);
}

pub fn print_help() {
    println!("sprintclose — close a sprint and carry unfinished work forward\n");
    println!("USAGE:");
    println!("  sprintclose close             Close the current sprint into the next one");
    println!("  sprintclose close --previous  Close the most recent past sprint into the current one");
    println!("  sprintclose iterations        List the team's iterations");
    println!("  sprintclose errors            Show errors recorded by earlier runs");
    println!();
    println!("Configuration lives in ~/.sprintclose/config.toml:");
    println!("  [azure]");
    println!("  organization = \"my-org\"");
    println!("  project = \"My Project\"");
    println!("  team = \"My Team\"");
    println!("  pat = \"<personal access token>\"");
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(strs: &[&str]) -> Vec<String> {
        strs.iter().map(|s| s.to_string()).collect()
    }

    fn iteration(name: &str, time_frame: TimeFrame) -> Iteration {
        Iteration {
            id: format!("id-{name}"),
            name: name.into(),
            path: format!("Proj\\{name}"),
            time_frame,
        }
    }

    #[test]
    fn parse_no_flags_closes_current() {
        assert!(!parse_close_args(&args(&[])).unwrap());
    }

    #[test]
    fn parse_previous_flag() {
        assert!(parse_close_args(&args(&["--previous"])).unwrap());
        assert!(parse_close_args(&args(&["-p"])).unwrap());
    }

    #[test]
    fn parse_unknown_flag_fails() {
        let result = parse_close_args(&args(&["--force"]));
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("--force"));
    }

    #[test]
    fn picks_current_into_future() {
        let iterations = vec![
            iteration("Sprint 1", TimeFrame::Past),
            iteration("Sprint 2", TimeFrame::Current),
            iteration("Sprint 3", TimeFrame::Future),
        ];
        let pair = pick_iterations(&iterations, false).unwrap();
        assert_eq!(pair.source.name, "Sprint 2");
        assert_eq!(pair.destination.name, "Sprint 3");
    }

    #[test]
    fn picks_most_recent_past_into_current() {
        let iterations = vec![
            iteration("Sprint 1", TimeFrame::Past),
            iteration("Sprint 2", TimeFrame::Past),
            iteration("Sprint 3", TimeFrame::Current),
        ];
        let pair = pick_iterations(&iterations, true).unwrap();
        assert_eq!(pair.source.name, "Sprint 2");
        assert_eq!(pair.destination.name, "Sprint 3");
    }

    #[test]
    fn missing_future_iteration_fails() {
        let iterations = vec![iteration("Sprint 2", TimeFrame::Current)];
        assert!(pick_iterations(&iterations, false).is_err());
    }

    #[test]
    fn missing_current_iteration_fails_for_previous() {
        let iterations = vec![iteration("Sprint 1", TimeFrame::Past)];
        assert!(pick_iterations(&iterations, true).is_err());
    }
}
