// PostgreSQL backend
//
// - config: bb8 manager, options and pool setup
// - numeric: binary `numeric` and `uuid` codecs
// - params: `ToSql` for `RowValues`
// - query: statement execution and result extraction

pub mod config;
mod numeric;
pub mod params;
pub mod query;

pub use config::{PgManager, PostgresOptions, PostgresOptionsBuilder};
pub use params::Params;
pub use query::{build_result_set_from_statement, execute_statement};
