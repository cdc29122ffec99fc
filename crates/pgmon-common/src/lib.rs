pub mod error;

pub use error::{PgmonError, Result};
