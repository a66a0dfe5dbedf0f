use super::result_set::ResultSet;

/// Everything SQL Server sent back for one request.
///
/// Lives only until it has been shaped for the caller.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Response {
    /// One entry per statement that returned a result set, in execution order.
    pub recordsets: Vec<ResultSet>,
}

impl Response {
    #[must_use]
    pub fn new(recordsets: Vec<ResultSet>) -> Self {
        Self { recordsets }
    }

    /// Consume the response, keeping only the first recordset (empty when there was none).
    #[must_use]
    pub fn into_recordset(self) -> ResultSet {
        self.recordsets.into_iter().next().unwrap_or_default()
    }
}
