pub mod error;
pub mod schema;
pub mod state;
pub mod test_utils;
pub mod utils;
pub mod validation;

pub use error::{CrmError, CrmResult, FieldError};
pub use state::AppState;
pub use utils::{create_conn, run_migrations, DbPool};
