//! Tokenizing of the `--options` list into `(key, value)` pairs.

use wpfeed_core::error::AppError;

/// Splits `-O` tokens into pairs.
///
/// `key=value` is one pair (split at the first `=`). A bare `key` takes the
/// next token as its value. Empty tokens are skipped.
///
/// # Errors
///
/// Returns `AppError::ConfigError` naming a trailing key that has no value.
///
/// # Examples
///
/// ```
/// use wpfeed::options::parse_option_pairs;
///
/// let tokens: Vec<String> = ["max_pages=5", "search", "patreon"].iter().map(|s| s.to_string()).collect();
/// let pairs = parse_option_pairs(&tokens).unwrap();
/// assert_eq!(pairs, vec![
///     ("max_pages".to_string(), "5".to_string()),
///     ("search".to_string(), "patreon".to_string()),
/// ]);
/// ```
pub fn parse_option_pairs(tokens: &[String]) -> Result<Vec<(String, String)>, AppError> {
    let mut pairs = Vec::new();
    let mut tokens = tokens.iter().filter(|t| !t.trim().is_empty());

    while let Some(token) = tokens.next() {
        match token.split_once('=') {
            Some((key, value)) => pairs.push((key.trim().to_string(), value.to_string())),
            None => {
                let value = tokens.next().ok_or_else(|| {
                    AppError::ConfigError(format!("option '{}' has no value", token.trim()))
                })?;
                pairs.push((token.trim().to_string(), value.to_string()));
            }
        }
    }

    Ok(pairs)
}
