//! Local form checks run before anything is sent to the verifier.

/// Normalise an email for submission.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

pub fn validate_email(email: &str) -> Result<(), String> {
    let email = email.trim();
    if email.is_empty() {
        return Err("Please enter your email address".to_string());
    }
    let Some((local, domain)) = email.split_once('@') else {
        return Err("Please enter a valid email".to_string());
    };
    if local.is_empty() || !domain.contains('.') || domain.starts_with('.') || domain.ends_with('.')
    {
        return Err("Please enter a valid email".to_string());
    }
    Ok(())
}

pub fn validate_sign_in(email: &str, password: &str) -> Result<(), String> {
    if email.trim().is_empty() || password.is_empty() {
        return Err("Please enter your email and password".to_string());
    }
    validate_email(email)
}

pub fn validate_sign_up(
    email: &str,
    password: &str,
    confirm_password: Option<&str>,
    min_password_length: usize,
) -> Result<(), String> {
    validate_email(email)?;
    if password.chars().count() < min_password_length {
        return Err(format!(
            "Password must be at least {min_password_length} characters"
        ));
    }
    if confirm_password.is_some_and(|cp| cp != password) {
        return Err("Passwords do not match".to_string());
    }
    Ok(())
}

/// A one-time code must be exactly `len` ASCII digits.
pub fn validate_code(code: &str, len: usize) -> Result<(), String> {
    let code = code.trim();
    if code.len() == len && code.bytes().all(|b| b.is_ascii_digit()) {
        Ok(())
    } else {
        Err(format!("Please enter the {len}-digit code from your authenticator app"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_email_shapes() {
        assert!(validate_email("a@b.com").is_ok());
        assert!(validate_email("  a@b.co.uk ").is_ok());
        assert!(validate_email("").is_err());
        assert!(validate_email("ab.com").is_err());
        assert!(validate_email("@b.com").is_err());
        assert!(validate_email("a@bcom").is_err());
        assert!(validate_email("a@b.").is_err());
    }

    #[test]
    fn test_sign_up_rules() {
        assert!(validate_sign_up("a@b.com", "longenough", Some("longenough"), 8).is_ok());
        assert!(validate_sign_up("a@b.com", "longenough", None, 8).is_ok());
        assert_eq!(
            validate_sign_up("a@b.com", "short", None, 8).unwrap_err(),
            "Password must be at least 8 characters"
        );
        assert_eq!(
            validate_sign_up("a@b.com", "longenough", Some("different"), 8).unwrap_err(),
            "Passwords do not match"
        );
    }

    #[test]
    fn test_code_shape() {
        assert!(validate_code("123456", 6).is_ok());
        assert!(validate_code(" 123456 ", 6).is_ok());
        assert!(validate_code("12345", 6).is_err());
        assert!(validate_code("12345a", 6).is_err());
        assert!(validate_code("１２３４５６", 6).is_err());
    }

    #[test]
    fn test_normalize_email() {
        assert_eq!(normalize_email("  Bob@Example.COM "), "bob@example.com");
    }
}
