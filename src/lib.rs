/// LiveSeries - Reactive Typed Series and Tables
///
/// Typed series grouped into tables, plus derived views (sorted, grouped,
/// computed, filtered) that stay consistent with their sources. Changes flow
/// through a batching notification protocol: producers group mutations into
/// batches, listeners see one coalesced event per batch, and views recompute
/// and re-notify their own listeners.

pub mod error;
pub mod value;
pub mod sequence;
pub mod changes;
pub mod series;
pub mod table;
pub mod view;
pub mod sorted;
pub mod grouped;
pub mod calc;
pub mod feed;

pub use error::{Error, Result};
pub use value::{OrderClass, Value, ValueKind};
pub use sequence::{ArraySequence, Sequence, StorageHint, TieredVectorSequence};
pub use changes::{
    ChangeBatch, ChangeEvent, ChangeKinds, ChangeNotifier, EntityId, Observable, SectionGuard,
    Subscription,
};
pub use series::{Series, WeakSeries};
pub use table::{Table, WeakTable};
pub use view::{Binding, FilterView, SelectionView};
pub use sorted::{SortOrder, SortedView};
pub use grouped::GroupedView;
pub use calc::CalcView;
pub use feed::{
    spawn_feed, FeedConfig, FeedError, FeedHandle, FeedOutcome, FeedSource, FeedStatus, RowFeed,
};

#[cfg(test)]
mod integration_tests {
    use super::*;
    use parking_lot::Mutex;
    use std::sync::Arc;
    use std::thread;

    fn sales_table() -> Table {
        let table = Table::new("sales");
        table.add_series("product", Series::new(ValueKind::Generic)).unwrap();
        table.add_series("quantity", Series::new(ValueKind::Int32)).unwrap();
        table.add_series("price", Series::new(ValueKind::Float64)).unwrap();

        let batch = table.begin_changes("load");
        let rows = [("Widget", 10, 9.99), ("Gadget", 5, 19.99), ("Doohickey", 15, 4.99)];
        for (product, qty, price) in rows {
            table
                .append_row(vec![Value::from(product), Value::Int32(qty), Value::Float64(price)])
                .unwrap();
        }
        batch.finish();
        table
    }

    #[test]
    fn test_complete_workflow() {
        let table = sales_table();
        let quantity = table.get_series("quantity").unwrap();
        let price = table.get_series("price").unwrap();

        let total = CalcView::zip(&quantity, &price, ValueKind::Float64, |q, p| {
            Value::Float64(q.to_f64().unwrap_or(f64::NAN) * p.to_f64().unwrap_or(f64::NAN))
        });
        let ranked = total.series().sorted_by(|a, b| b.total_cmp(a));
        let by_size = quantity.grouped_by(|q| Value::Bool(q.as_i32().map_or(false, |n| n >= 10)));

        assert_eq!(total.len(), 3);
        assert!((total.get_double(0).unwrap() - 99.90).abs() < 0.01);
        assert!((total.get_double(1).unwrap() - 99.95).abs() < 0.01);
        assert!((total.get_double(2).unwrap() - 74.85).abs() < 0.01);
        assert_eq!(ranked.source_index(0), Some(1));
        assert_eq!(by_size.group(&Value::Bool(true)).unwrap().len(), 2);

        // One producer batch, one event per view
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = events.clone();
        let _sub = ranked.series().subscribe(move |e| sink.lock().push(e.chain()));

        let batch = table.begin_changes("reprice");
        price.set(2, Value::Float64(10.0)).unwrap();
        table
            .append_row(vec![Value::from("Thingamajig"), Value::Int32(1), Value::Float64(1.0)])
            .unwrap();
        batch.finish();

        assert_eq!(ranked.len(), 4);
        assert!((ranked.series().get_double(0).unwrap() - 150.0).abs() < 0.01);
        assert_eq!(ranked.source_index(0), Some(2));
        assert_eq!(by_size.group(&Value::Bool(false)).unwrap().len(), 2);

        let chains = events.lock();
        assert_eq!(chains.len(), 1);
        assert_eq!(chains[0][0], ranked.series().id());
        assert_eq!(chains[0][1], total.series().id());
    }

    #[test]
    fn test_member_views_never_see_partial_rows() {
        let table = Table::new("orders");
        table.add_series("qty", Series::new(ValueKind::Float64)).unwrap();
        table.add_series("price", Series::new(ValueKind::Float64)).unwrap();
        let qty = table.get_series("qty").unwrap();
        let price = table.get_series("price").unwrap();
        let total = CalcView::zip(&qty, &price, ValueKind::Float64, |q, p| {
            Value::Float64(q.to_f64().unwrap_or(f64::NAN) * p.to_f64().unwrap_or(f64::NAN))
        });

        let observed = Arc::new(Mutex::new(Vec::new()));
        let sink = observed.clone();
        let output = total.series().downgrade();
        let _sub = total.series().subscribe(move |_| {
            if let Some(series) = output.upgrade() {
                sink.lock().push(series.values());
            }
        });

        table.append_row(vec![Value::Float64(2.0), Value::Float64(3.0)]).unwrap();
        assert_eq!(*observed.lock(), vec![vec![Value::Float64(6.0)]]);

        let batch = table.begin_changes("reprice");
        qty.set(0, Value::Float64(4.0)).unwrap();
        price.set(0, Value::Float64(0.5)).unwrap();
        batch.finish();
        assert_eq!(observed.lock().len(), 2);
        assert_eq!(observed.lock()[1], vec![Value::Float64(2.0)]);
    }

    #[test]
    fn test_views_converge_after_table_batch() {
        let table = sales_table();
        let quantity = table.get_series("quantity").unwrap();
        let sorted = quantity.sorted().unwrap();
        let unit = quantity.to_unit_range().unwrap();

        let batch = table.begin_changes("reload");
        table.clear_rows().unwrap();
        for n in [4, 8, 2, 6] {
            table
                .append_row(vec![Value::from("x"), Value::Int32(n), Value::Float64(1.0)])
                .unwrap();
        }
        batch.finish();

        assert_eq!(
            sorted.values(),
            vec![Value::Int32(2), Value::Int32(4), Value::Int32(6), Value::Int32(8)]
        );
        assert_eq!(unit.series().doubles().unwrap(), vec![1.0 / 3.0, 1.0, 0.0, 2.0 / 3.0]);
    }

    #[test]
    fn test_producer_thread_with_reading_consumer() {
        let table = Table::new("ticks");
        table.add_series("seq", Series::new(ValueKind::Int64)).unwrap();
        table.add_series("value", Series::new(ValueKind::Float64)).unwrap();
        let seq = table.get_series("seq").unwrap();
        let sorted = seq.sorted_by(|a, b| b.total_cmp(a));

        let producer_table = table.clone();
        let producer = thread::spawn(move || {
            for i in 0..100i64 {
                let batch = producer_table.begin_changes("tick");
                producer_table
                    .append_row(vec![Value::Int64(i), Value::Float64(i as f64 * 0.5)])
                    .unwrap();
                batch.finish();
            }
        });

        for _ in 0..50 {
            let _section = table.lock();
            let lens: Vec<usize> = table.iter().map(|(_, s)| s.len()).collect();
            assert_eq!(lens[0], lens[1]);
        }
        producer.join().unwrap();

        assert_eq!(table.len(), 100);
        assert_eq!(sorted.len(), 100);
        assert_eq!(sorted.get(0).unwrap(), Value::Int64(99));
    }

    #[test]
    fn test_selection_over_feed() {
        let table = Table::new("quotes");
        table.add_series("symbol", Series::new(ValueKind::Generic)).unwrap();
        table.add_series("bid", Series::new(ValueKind::Float64)).unwrap();
        table.add_series("ask", Series::new(ValueKind::Float64)).unwrap();
        let prices = table.select(&["ask", "bid"]);

        let rows = vec![vec!["A", "1.0", "1.1"], vec!["B", "2.0", "2.2"]];
        let config = FeedConfig {
            interval_ms: 1,
            ..FeedConfig::default()
        };
        let handle = spawn_feed(config, table.clone(), RowFeed::new(rows)).unwrap();
        assert!(matches!(handle.join(), FeedOutcome::Completed));

        assert_eq!(prices.table().labels(), vec!["ask", "bid"]);
        assert_eq!(prices.table().row(1).unwrap(), vec![Value::Float64(2.2), Value::Float64(2.0)]);
    }
}
