/// Basic Table Operations Example
///
/// This example demonstrates:
/// - Creating typed series and grouping them into a table
/// - Appending rows, updating and removing values
/// - Listening to table changes and batching mutations

use liveseries::{Series, Table, Value, ValueKind};

fn main() -> liveseries::Result<()> {
    env_logger::init();
    println!("=== LiveSeries Basic Table Example ===\n");

    // 1. Create a table
    println!("1. Creating table...");
    let users = Table::new("users");
    users.add_series("id", Series::new(ValueKind::Int32))?;
    users.add_series("name", Series::new(ValueKind::Generic))?;
    users.add_series("email", Series::new(ValueKind::Generic))?;
    users.add_series("age", Series::new(ValueKind::Int32))?;
    println!("   Table '{}' created with {} series\n", users.name(), users.series_count());

    // 2. Listen for changes
    let _subscription = users.subscribe(|event| {
        println!("   [event] {:?} on {}", event.kinds(), event.source());
    });

    // 3. Add rows
    println!("3. Adding rows...");
    users.append_row(vec![
        Value::Int32(1),
        Value::from("Alice"),
        Value::from("alice@example.com"),
        Value::Int32(30),
    ])?;
    users.append_row(vec![
        Value::Int32(2),
        Value::from("Bob"),
        Value::from("bob@example.com"),
        Value::Null, // Stored as the empty value
    ])?;
    users.append_row(vec![
        Value::Int32(3),
        Value::from("Charlie"),
        Value::from("charlie@example.com"),
        Value::Int32(25),
    ])?;
    println!("   Added {} rows\n", users.len());

    // 4. Query data
    println!("4. Querying data...");
    let age = users.get_series("age")?;
    for i in 0..users.len() {
        let row = users.row(i)?;
        let shown = if age.is_empty_at(i)? {
            "N/A".to_string()
        } else {
            row[3].to_string()
        };
        println!("   Row {}: {} - {} (age: {})", i, row[1], row[2], shown);
    }
    println!();

    // 5. Get specific value
    println!("5. Getting specific value...");
    println!("   User 0 name: {}\n", users.get_value(0, "name")?);

    // 6. Update a value
    println!("6. Updating value...");
    age.set(1, Value::Int32(28))?;
    println!("   Bob's age is now {}\n", age.get_int(1)?);

    // 7. Batch several changes into one notification
    println!("7. Batching changes...");
    {
        let batch = users.begin_changes("promote");
        age.set(0, Value::Int32(31))?;
        age.set(2, Value::Int32(26))?;
        batch.finish();
    }
    println!();

    // 8. Remove a row from every series
    println!("8. Removing row 1...");
    {
        let batch = users.begin_changes("delete_row");
        for (_, series) in users.iter() {
            series.remove(1)?;
        }
        batch.finish();
    }
    println!("   Table now has {} rows\n", users.len());

    // 9. Table structure
    println!("9. Series: {:?}", users.labels());
    let email = users.remove_series("email")?;
    println!("   Removed 'email' ({} values), remaining: {:?}", email.len(), users.labels());

    println!("\n=== Example Complete ===");
    Ok(())
}
