#![cfg(feature = "test-utils")]

use config::shared::SqlDestinationConfig;
use sink::destination::{SqlDestination, SqlDestinationHandle};
use sink::store::StateStore;
use sink::test_utils::destination::destination_options;
use sink::test_utils::driver::FakeDriver;

mod batching;
mod lifecycle;
mod retries;
mod schema;
mod sqlite;

/// Starts a destination writing through `driver` with state kept in `store`.
async fn start_destination<S: StateStore>(
    config: &SqlDestinationConfig,
    driver: &FakeDriver,
    store: S,
) -> SqlDestinationHandle<S> {
    let destination: SqlDestination<_, _> =
        SqlDestination::new(destination_options(config), driver.clone(), store);

    destination.start().await.unwrap()
}
