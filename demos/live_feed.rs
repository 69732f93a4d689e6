/// Live Feed Example
///
/// This example demonstrates:
/// - A background producer writing into a table
/// - Consumers reading derived views while the producer runs
/// - Stopping the producer through its handle
///
/// Run with `RUST_LOG=debug` to see batching and recompute logs.

use liveseries::{
    spawn_feed, FeedConfig, FeedError, FeedOutcome, FeedStatus, Series, Table, Value, ValueKind,
};
use std::thread;
use std::time::Duration;

fn main() -> Result<(), FeedError> {
    env_logger::init();
    println!("=== LiveSeries Live Feed Example ===\n");

    let config = FeedConfig::from_json(r#"{ "name": "ticker", "interval_ms": 20 }"#)?;
    println!("Feed config: {:?}\n", config);

    let ticks = Table::new("ticks");
    ticks.add_series("seq", Series::new(ValueKind::Int64))?;
    ticks.add_series("price", Series::new(ValueKind::Float64))?;

    let price = ticks.get_series("price")?;
    let sorted = price.sorted()?;
    let unit = price.to_unit_range()?;
    let buckets = price.grouped_by(|v| {
        Value::Int32(v.to_f64().map_or(0, |p| (p / 10.0).floor() as i32))
    });

    // Deterministic pseudo-random walk
    let mut seq = 0i64;
    let mut level = 100.0f64;
    let producer = move |table: &Table| -> Result<FeedStatus, FeedError> {
        seq += 1;
        let step = ((seq * 7919) % 21 - 10) as f64 * 0.5;
        level += step;
        let batch = table.begin_changes("tick");
        table.append_row(vec![Value::Int64(seq), Value::Float64(level)])?;
        batch.finish();
        Ok(FeedStatus::Continue)
    };

    let handle = spawn_feed(config, ticks.clone(), producer)?;

    for _ in 0..5 {
        thread::sleep(Duration::from_millis(100));
        let _section = ticks.lock();
        let n = ticks.len();
        if n == 0 {
            continue;
        }
        println!(
            "rows={:3} low={:.1} high={:.1} last-scaled={:.2} buckets={}",
            n,
            sorted.series().get_double(0)?,
            sorted.series().get_double(n - 1)?,
            unit.get_double(n - 1)?,
            buckets.group_count()
        );
    }

    match handle.stop() {
        FeedOutcome::Stopped => println!("\nFeed stopped after {} rows", ticks.len()),
        FeedOutcome::Completed => println!("\nFeed ran out of data"),
        FeedOutcome::Failed(e) => println!("\nFeed failed: {}", e),
    }

    println!("\n=== Example Complete ===");
    Ok(())
}
