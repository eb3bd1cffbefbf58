use thiserror::Error;
use trawl_browser::BrowserError;
use trawl_core::Category;

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("Browser error: {0}")]
    Browser(#[from] BrowserError),

    #[error("Invalid {field} selector '{selector}': {reason}")]
    InvalidSelector {
        field: String,
        selector: String,
        reason: String,
    },

    #[error("No strategy registered for {0}")]
    NoStrategy(Category),
}

pub type Result<T> = std::result::Result<T, ExtractError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_browser_error_conversion() {
        let err: ExtractError = BrowserError::Timeout("load".to_string()).into();
        assert!(matches!(err, ExtractError::Browser(_)));
        assert!(err.to_string().starts_with("Browser error"));
    }

    #[test]
    fn test_no_strategy_display() {
        let err = ExtractError::NoStrategy(Category::Assets);
        assert_eq!(err.to_string(), "No strategy registered for assets");
    }
}
