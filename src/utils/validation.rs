use crate::error::{RecError, Result};

pub fn validate_embedding(embedding: &[f32], expected_dim: usize) -> Result<()> {
    if embedding.len() != expected_dim {
        return Err(RecError::DimensionMismatch {
            expected: expected_dim,
            actual: embedding.len(),
        });
    }

    if embedding.iter().any(|v| !v.is_finite()) {
        return Err(RecError::InvalidInput(
            "Embedding contains invalid values (NaN or Infinity)".to_string(),
        ));
    }

    Ok(())
}

/// Clamp a requested fetch size into `1..=max`, falling back to `default`.
pub fn resolve_fetch_limit(requested: Option<usize>, default: usize, max: usize) -> Result<usize> {
    match requested {
        None => Ok(default.min(max)),
        Some(0) => Err(RecError::InvalidInput(
            "Number of recommendations must be greater than 0".to_string(),
        )),
        Some(limit) => Ok(limit.min(max)),
    }
}

pub fn validate_email(email: &str) -> Result<()> {
    let trimmed = email.trim();
    if trimmed.is_empty() {
        return Err(RecError::InvalidInput("Email cannot be empty".to_string()));
    }

    if trimmed.len() > 254 {
        return Err(RecError::InvalidInput("Email too long (max 254 characters)".to_string()));
    }

    match trimmed.split_once('@') {
        Some((local, domain)) if !local.is_empty() && domain.contains('.') => Ok(()),
        _ => Err(RecError::InvalidInput(format!("Invalid email address: {}", trimmed))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_embedding() {
        assert!(validate_embedding(&[0.1, 0.2], 2).is_ok());
        assert!(matches!(
            validate_embedding(&[0.1], 2),
            Err(RecError::DimensionMismatch { expected: 2, actual: 1 })
        ));
        assert!(validate_embedding(&[f32::NAN, 0.2], 2).is_err());
    }

    #[test]
    fn test_resolve_fetch_limit() {
        assert_eq!(resolve_fetch_limit(None, 20, 20).unwrap(), 20);
        assert_eq!(resolve_fetch_limit(Some(5), 20, 20).unwrap(), 5);
        assert_eq!(resolve_fetch_limit(Some(500), 20, 20).unwrap(), 20);
        assert!(resolve_fetch_limit(Some(0), 20, 20).is_err());
    }

    #[test]
    fn test_validate_email() {
        assert!(validate_email("user@example.com").is_ok());
        assert!(validate_email("").is_err());
        assert!(validate_email("no-at-sign").is_err());
        assert!(validate_email("@example.com").is_err());
    }
}
