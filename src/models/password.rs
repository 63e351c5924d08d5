//! Rules a new password has to satisfy.

/// Minimum number of characters in a password.
pub const MIN_LENGTH: usize = 8;

/// Passwords whose similarity to the username reaches this ratio are
/// rejected.
const MAX_SIMILARITY: f64 = 0.7;

static COMMON_PASSWORDS: &[&str] = &[
    "password", "password1", "password123", "12345678", "123456789",
    "1234567890", "qwerty123", "qwertyuiop", "iloveyou", "sunshine",
    "princess", "football", "baseball", "welcome1", "welcome123", "admin123",
    "letmein1", "trustno1", "passw0rd", "superman", "michael1", "dragon123",
    "monkey123", "abc12345", "11111111", "00000000", "asdfghjkl",
    "changeme", "jesus123", "blessed1",
];

#[derive(ApiError, Debug, Eq, Fail, PartialEq)]
pub enum PasswordError {
    #[fail(display = "The two password fields didn't match.")]
    #[api(code = "password:mismatch", status = "BAD_REQUEST")]
    Mismatch,
    #[fail(display = "This password is too short. It must contain at least \
        {} characters.", _0)]
    #[api(code = "password:too-short", status = "BAD_REQUEST")]
    TooShort(usize),
    #[fail(display = "This password is entirely numeric.")]
    #[api(code = "password:numeric", status = "BAD_REQUEST")]
    EntirelyNumeric,
    #[fail(display = "This password is too common.")]
    #[api(code = "password:common", status = "BAD_REQUEST")]
    TooCommon,
    #[fail(display = "The password is too similar to the username.")]
    #[api(code = "password:similar", status = "BAD_REQUEST")]
    TooSimilar,
}

/// Validate a new password, as typed twice by the user.
///
/// Returns all rules the password breaks.
pub fn validate(username: &str, password: &str, confirmation: &str)
-> Result<(), Vec<PasswordError>> {
    let mut errors = Vec::new();

    if password != confirmation {
        errors.push(PasswordError::Mismatch);
    }

    if password.chars().count() < MIN_LENGTH {
        errors.push(PasswordError::TooShort(MIN_LENGTH));
    }

    if !password.is_empty() && password.chars().all(|c| c.is_ascii_digit()) {
        errors.push(PasswordError::EntirelyNumeric);
    }

    let lower = password.to_lowercase();

    if COMMON_PASSWORDS.contains(&lower.trim()) {
        errors.push(PasswordError::TooCommon);
    }

    if is_similar(&lower, &username.to_lowercase()) {
        errors.push(PasswordError::TooSimilar);
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// Is `password` too similar to `username`, or to any of its parts?
fn is_similar(password: &str, username: &str) -> bool {
    if username.is_empty() {
        return false;
    }

    std::iter::once(username)
        .chain(username.split(|c: char| !c.is_alphanumeric()))
        .filter(|part| !part.is_empty())
        .any(|part| similarity(password, part) >= MAX_SIMILARITY)
}

/// Ratio of characters two strings have in common, in order, to their total
/// length.
fn similarity(a: &str, b: &str) -> f64 {
    let a = a.chars().collect::<Vec<_>>();
    let b = b.chars().collect::<Vec<_>>();

    if a.is_empty() && b.is_empty() {
        return 1.0;
    }

    // Longest common subsequence, one row at a time.
    let mut row = vec![0usize; b.len() + 1];
    for ca in &a {
        let mut diagonal = 0;
        for (inx, cb) in b.iter().enumerate() {
            let above = row[inx + 1];
            row[inx + 1] = if ca == cb {
                diagonal + 1
            } else {
                above.max(row[inx])
            };
            diagonal = above;
        }
    }

    2.0 * row[b.len()] as f64 / (a.len() + b.len()) as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_good_password() {
        assert_eq!(validate("grace", "Tr4ining-Day", "Tr4ining-Day"), Ok(()));
    }

    #[test]
    fn reports_every_broken_rule() {
        let errors = validate("grace", "1234", "12345").unwrap_err();
        assert_eq!(errors, vec![
            PasswordError::Mismatch,
            PasswordError::TooShort(MIN_LENGTH),
            PasswordError::EntirelyNumeric,
        ]);
    }

    #[test]
    fn rejects_common_passwords() {
        assert_eq!(validate("grace", "Password123", "Password123"),
            Err(vec![PasswordError::TooCommon]));
    }

    #[test]
    fn rejects_passwords_like_the_username() {
        assert_eq!(validate("jonathan.mwangi", "jonathan12", "jonathan12"),
            Err(vec![PasswordError::TooSimilar]));
        assert!(validate("jonathan", "river-stone-42", "river-stone-42").is_ok());
    }

    #[test]
    fn similarity_ratio() {
        assert_eq!(similarity("abcd", "abcd"), 1.0);
        assert_eq!(similarity("abcd", "wxyz"), 0.0);
        assert_eq!(similarity("abcd", "abxx"), 0.5);
    }
}
