pub mod extract;
pub mod html;
pub mod paginate;
pub mod stage;

pub use extract::{build_records, AgenticExtractor, DocumentExtractor, ExtractError};
pub use paginate::{split_to_pages, PaginateError};
pub use stage::{Stage, StageError};
