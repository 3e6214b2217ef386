// Copyright 2025 Cornell University
// released under BSD 3-Clause License
// author: Kevin Laeufer <laeufer@cornell.edu>

use clap::{Parser, Subcommand};
use std::sync::Arc;
use wavequery::query::{ActivityParams, ChangesParams, Condition, SummaryParams, TransitionParams};
use wavequery::*;

#[derive(Parser, Debug)]
#[command(name = "wavequery")]
#[command(author = "Kevin Laeufer <laeufer@berkeley.edu>")]
#[command(version)]
#[command(about = "Runs a single query against a VCD, FST or GHW file and prints the result as JSON.", long_about = None)]
struct Args {
    #[arg(value_name = "WAVEFORM", index = 1)]
    filename: String,
    #[arg(long)]
    single_thread: bool,
    #[command(subcommand)]
    query: Query,
}

#[derive(Subcommand, Debug)]
enum Query {
    /// Prints the waveform metadata.
    Info,
    /// Lists the changes of a signal.
    Changes {
        path: String,
        #[arg(long)]
        start: Option<Time>,
        #[arg(long)]
        end: Option<Time>,
        #[arg(long)]
        max: Option<usize>,
    },
    /// Summarizes the behavior of a signal.
    Summarize {
        path: String,
        #[arg(long)]
        max: Option<usize>,
    },
    /// Finds transitions such as `rises` or `equals --value 0x3`.
    Transitions {
        path: String,
        condition: String,
        #[arg(long)]
        value: Option<String>,
    },
    /// Lists the most active signals.
    Activity {
        #[arg(long)]
        scope: Option<String>,
        #[arg(long, default_value_t = 10)]
        limit: usize,
    },
    /// Compares two signals.
    Compare { a: String, b: String },
}

fn run(engine: &QueryEngine, session_id: &str, query: Query) -> Result<serde_json::Value> {
    let value = match query {
        Query::Info => serde_json::to_value(engine.waveform_info(session_id)?)?,
        Query::Changes {
            path,
            start,
            end,
            max,
        } => {
            let params = ChangesParams {
                start_time: start,
                end_time: end,
                max_changes: max,
                ..Default::default()
            };
            serde_json::to_value(engine.get_changes(session_id, &path, &params)?)?
        }
        Query::Summarize { path, max } => {
            let params = SummaryParams {
                max_changes: max.or(SummaryParams::default().max_changes),
                ..Default::default()
            };
            serde_json::to_value(engine.summarize_signal(session_id, &path, &params)?)?
        }
        Query::Transitions {
            path,
            condition,
            value,
        } => {
            let condition: Condition = condition.parse()?;
            let mut params = TransitionParams::new(condition);
            params.value = value;
            serde_json::to_value(engine.find_transition(session_id, &path, &params)?)?
        }
        Query::Activity { scope, limit } => {
            let params = ActivityParams {
                scope_path: scope,
                limit,
                ..Default::default()
            };
            serde_json::to_value(engine.search_by_activity(session_id, &params)?)?
        }
        Query::Compare { a, b } => serde_json::to_value(engine.compare(session_id, &a, &b, None, None)?)?,
    };
    Ok(value)
}

fn main() {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .init();
    let args = Args::parse();

    let registry = SessionRegistry::new(Arc::new(WellenStore), RegistryConfig::default());
    let engine = QueryEngine::new(Arc::new(registry));
    let options = LoadOptions {
        multi_thread: !args.single_thread,
        remove_scopes_with_empty_name: false,
    };

    let result = engine
        .open_waveform(&args.filename, options)
        .and_then(|opened| run(&engine, &opened.session_id, args.query));
    match result {
        Ok(value) => println!(
            "{}",
            serde_json::to_string_pretty(&value).expect("failed to serialize result")
        ),
        Err(e) => {
            eprintln!(
                "{}",
                serde_json::to_string_pretty(&e.to_report()).expect("failed to serialize error")
            );
            std::process::exit(1);
        }
    }
}
