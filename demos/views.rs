/// Views Example
///
/// This example demonstrates:
/// - FilterView to select rows of a series
/// - SelectionView to pick series of a table
/// - CalcView to add calculated series
/// - SortedView and GroupedView staying current as the source changes
/// - Chaining views

use liveseries::{CalcView, Series, Table, Value, ValueKind};

fn main() -> liveseries::Result<()> {
    env_logger::init();
    println!("=== LiveSeries Views Example ===\n");

    // 1. Create a sales table
    println!("1. Creating sales table...");
    let table = Table::new("sales");
    table.add_series("product", Series::new(ValueKind::Generic))?;
    table.add_series("category", Series::new(ValueKind::Generic))?;
    table.add_series("price", Series::new(ValueKind::Float64))?;
    table.add_series("quantity", Series::new(ValueKind::Int32))?;
    table.add_series("discount", Series::new(ValueKind::Float64))?;

    let items = vec![
        ("Laptop", "Electronics", 999.99, 5, 0.1),
        ("Mouse", "Electronics", 29.99, 20, 0.0),
        ("Desk", "Furniture", 299.99, 3, 0.15),
        ("Chair", "Furniture", 199.99, 8, 0.1),
        ("Monitor", "Electronics", 399.99, 10, 0.05),
    ];
    {
        let batch = table.begin_changes("load");
        for (product, category, price, quantity, discount) in items {
            table.append_row(vec![
                Value::from(product),
                Value::from(category),
                Value::Float64(price),
                Value::Int32(quantity),
                Value::Float64(discount),
            ])?;
        }
        batch.finish();
    }
    println!("   Added {} products\n", table.len());

    let category = table.get_series("category")?;
    let price = table.get_series("price")?;
    let quantity = table.get_series("quantity")?;
    let discount = table.get_series("discount")?;

    // 2. FilterView - prices above 250
    println!("2. Creating FilterView for prices above 250...");
    let expensive = price.filter(|v| v.as_f64().map_or(false, |p| p > 250.0));
    for i in 0..expensive.len() {
        let row = expensive.source_index(i).unwrap_or(0);
        println!("   {} at {}", table.get_value(row, "product")?, expensive.get(i)?);
    }
    println!();

    // 3. SelectionView - product and price only
    println!("3. Creating SelectionView...");
    let catalog = table.select(&["product", "price"]);
    println!("   Series in view: {:?}\n", catalog.table().labels());

    // 4. CalcView - revenue after discount
    println!("4. Creating CalcView for revenue...");
    let revenue = CalcView::new(&[&price, &quantity, &discount], ValueKind::Float64, |args| {
        let price = args[0].to_f64().unwrap_or(f64::NAN);
        let quantity = args[1].to_f64().unwrap_or(f64::NAN);
        let discount = args[2].to_f64().unwrap_or(f64::NAN);
        Value::Float64(price * quantity * (1.0 - discount))
    })?;
    for i in 0..revenue.len() {
        println!("   {}: {:.2}", table.get_value(i, "product")?, revenue.get_double(i)?);
    }
    println!();

    // 5. Chain: sort revenue, scale it to [0, 1]
    println!("5. Sorting revenue and scaling to unit range...");
    let ranked = revenue.series().sorted()?;
    let scaled = revenue.series().to_unit_range()?;
    println!("   Sorted: {:?}", ranked.series().doubles()?);
    println!("   Scaled: {:?}\n", scaled.series().doubles()?);

    // 6. GroupedView - products per category
    println!("6. Grouping by category...");
    let by_category = category.grouped();
    for (key, members) in by_category.iter() {
        println!("   {}: {} products", key, members.len());
    }
    println!();

    // 7. Views update when the source changes
    println!("7. Adding a product...");
    table.append_row(vec![
        Value::from("Lamp"),
        Value::from("Lighting"),
        Value::Float64(49.99),
        Value::Int32(12),
        Value::Float64(0.0),
    ])?;
    println!("   Revenue rows: {}", revenue.len());
    println!("   Highest revenue: {:.2}", ranked.series().get_double(ranked.len() - 1)?);
    println!("   Categories: {:?}", by_category.keys());
    println!("   Catalog rows: {}", catalog.table().len());

    println!("\n=== Example Complete ===");
    Ok(())
}
