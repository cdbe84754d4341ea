//! Queue inspection and maintenance commands.

use super::{open_queue, open_store};
use std::path::Path;

/// Prints the number of pending operations.
pub fn count(path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let store = open_store(path)?;
    println!("{}", open_queue(&store).count());
    Ok(())
}

/// Prints pending operations in replay order.
pub fn list(path: &Path, format: &str) -> Result<(), Box<dyn std::error::Error>> {
    let store = open_store(path)?;
    let entries = open_queue(&store).snapshot();

    match format {
        "json" => {
            println!("{}", serde_json::to_string_pretty(&entries)?);
        }
        _ => {
            if entries.is_empty() {
                println!("No pending operations");
            }
            for (position, entry) in entries.iter().enumerate() {
                println!(
                    "{:>3}. {:<24} {:<6} {:<16} retries={}",
                    position + 1,
                    entry.id,
                    entry.kind().to_string(),
                    entry.operation.transaction_id().to_string(),
                    entry.retry_count
                );
            }
        }
    }

    Ok(())
}

/// Discards every pending operation.
pub fn clear(path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let store = open_store(path)?;
    let queue = open_queue(&store);
    let discarded = queue.count();
    queue.clear();
    println!("Discarded {discarded} pending operation(s)");
    Ok(())
}
