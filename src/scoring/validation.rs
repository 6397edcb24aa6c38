use super::config::ScoringConfig;

/// Validate scoring configuration at startup.
/// Returns all validation errors at once (not just the first).
pub fn validate_scoring(config: &ScoringConfig) -> Result<(), Vec<String>> {
    let compiled = config.compile()?;

    let errors: Vec<String> = compiled
        .problems()
        .into_iter()
        .map(|e| format!("scoring: {}", e))
        .collect();

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
