#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Command-line adapter that boots a hexink demo stage and drives it to
//! completion with a fixed-step clock.

mod demo;

use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;

use anyhow::{bail, Result};
use clap::Parser;
use hexink_core::StageResult;
use hexink_stage::query;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::demo::DemoBoard;

/// Fixed simulation step applied on every loop iteration.
const TICK_STEP: Duration = Duration::from_millis(16);

/// Upper bound on loop iterations before the run is declared stalled.
const TICK_BUDGET: u32 = 100_000;

/// Command-line options for the demo stage.
#[derive(Debug, Parser)]
#[command(name = "hexink", about = "Runs a hexink demo stage to completion")]
struct Options {
    /// Number of ground columns on the demo board.
    #[arg(long, default_value_t = 7)]
    columns: i32,

    /// Number of ground rows on the demo board.
    #[arg(long, default_value_t = 5)]
    rows: i32,

    /// Pause between waves, in milliseconds.
    #[arg(long, default_value_t = 150)]
    sample_rate_ms: u64,

    /// Duration of every cell animation, in milliseconds.
    #[arg(long, default_value_t = 50)]
    animation_ms: u64,
}

/// Entry point for the hexink command-line interface.
fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let options = Options::parse();
    if options.columns <= 0 || options.rows <= 0 {
        bail!("the demo board needs at least one column and one row");
    }

    let board = DemoBoard {
        columns: options.columns,
        rows: options.rows,
        sample_rate: Duration::from_millis(options.sample_rate_ms),
        animation: Duration::from_millis(options.animation_ms),
    };

    let mut stage = demo::build_stage(&board);
    stage.setup();
    info!(
        columns = board.columns,
        rows = board.rows,
        "demo stage ready"
    );

    let finished: Rc<RefCell<Option<StageResult>>> = Rc::default();
    let sink = Rc::clone(&finished);
    stage.execute(move |result| *sink.borrow_mut() = Some(result));

    let mut last_frame = String::new();
    let mut ticks = 0u32;
    loop {
        let frame = demo::render(&stage, &board);
        if frame != last_frame {
            println!("{frame}");
            last_frame = frame;
        }

        if finished.borrow().is_some() {
            break;
        }
        if ticks >= TICK_BUDGET {
            bail!("the run stalled before draining the dirty set");
        }
        stage.tick(TICK_STEP);
        ticks += 1;
    }

    let result = finished
        .borrow_mut()
        .take()
        .expect("loop exits only after completion");
    println!("run finished after {ticks} ticks");
    for (kind, progress, target) in result.iter() {
        println!("  {kind:?}: {progress}/{target}");
    }
    debug_assert!(!query::is_running(&stage));
    stage.clear_pool();

    Ok(())
}
