use anyhow::Result;
use chrono::{TimeZone, Utc};
use geo::polygon;
use is2util::commons::basic_functions::TimeRange;
use is2util::{EgiOrder, OrderConfig, SubmissionMode};

/// Example: asynchronous ATL06 subset order over a small area of Greenland
fn main() -> Result<()> {
    env_logger::init();

    println!("=== Example: ATL06 subset order through EGI ===\n");

    let area = polygon![
        (x: -49.5, y: 69.1),
        (x: -48.9, y: 69.1),
        (x: -48.9, y: 69.4),
        (x: -49.5, y: 69.4),
        (x: -49.5, y: 69.1),
    ];

    let mut order = EgiOrder::new(OrderConfig::default())?;
    order.set_product("ATL06", "001");
    order.set_time_range(Some(TimeRange::new(
        Utc.with_ymd_and_hms(2019, 6, 1, 0, 0, 0).unwrap(),
        None,
    )));
    order.set_email(std::env::args().nth(1));

    println!("Submitting order...");
    let outcome = order.submit(&area, SubmissionMode::AsyncUrl)?;

    if let Some(order_id) = outcome.order_id() {
        println!("  - Order id: {}", order_id);
    }

    println!("\nDone.");

    Ok(())
}
