pub mod collect;
pub mod commons;
pub mod error;
pub mod geometric;
pub mod granule;

pub use collect::egi::egi_order::{EgiOrder, OrderConfig, OrderOutcome, SubmissionMode};
pub use error::Is2Error;
pub use granule::loader::{load_icesat2, GranuleLoad};
pub use granule::product::Product;
