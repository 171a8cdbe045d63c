pub mod activity;
pub mod check;
pub mod config;
pub mod status;

use std::sync::Arc;

use stride_core::{Config, Database, SystemClock, Tracker};

/// Open the local database and wire a tracker over it.
///
/// The database is both the state store and the activity source.
pub fn open_tracker(config: &Config) -> Result<(Arc<Database>, Tracker), Box<dyn std::error::Error>> {
    let db = Arc::new(Database::open()?);
    let tracker = Tracker::from_config(db.clone(), db.clone(), Arc::new(SystemClock), config)?;
    Ok((db, tracker))
}
