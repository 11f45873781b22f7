//! Result type alias for scanfeed

use super::errors::ScanfeedError;

/// Result type alias for scanfeed operations
///
/// # Examples
///
/// ```
/// use scanfeed::domain::result::Result;
/// use scanfeed::domain::errors::ScanfeedError;
///
/// fn example_function() -> Result<String> {
///     Ok("success".to_string())
/// }
///
/// fn failing_function() -> Result<()> {
///     Err(ScanfeedError::Validation("Invalid input".to_string()))
/// }
/// ```
pub type Result<T> = std::result::Result<T, ScanfeedError>;
