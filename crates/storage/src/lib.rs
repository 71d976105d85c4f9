pub mod artifact;
pub mod enrich;
pub mod error;

pub use artifact::{
    generated_columns, is_up_to_date, read_generated, read_results, read_table, write_generated,
    write_results, Table, RESULTS_COLUMNS,
};
pub use enrich::enrich;
pub use error::ArtifactError;
