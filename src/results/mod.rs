mod response;
mod result_set;
mod row;

pub use response::Response;
pub use result_set::ResultSet;
pub use row::CustomDbRow;
