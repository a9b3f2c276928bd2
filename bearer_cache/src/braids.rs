use aliri_braid::braid;
use std::fmt;

macro_rules! redacted {
    ($ty:ty: $hidden:literal, $default:literal) => {
        impl fmt::Debug for $ty {
            fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
                if f.alternate() {
                    f.write_str("\"")?;
                    write_truncated(&self.0, &mut *f, $default)?;
                    f.write_str("\"")
                } else {
                    f.write_str(concat!("***", $hidden, "***"))
                }
            }
        }

        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
                if f.alternate() {
                    write_truncated(&self.0, &mut *f, usize::MAX)
                } else {
                    f.write_str(concat!("***", $hidden, "***"))
                }
            }
        }
    };
}

/// Writes `value`, cut down to `f.width()` (or `default_len`) characters
///
/// A cut value keeps one character fewer and ends in `…`.
fn write_truncated(value: &str, f: &mut fmt::Formatter, default_len: usize) -> fmt::Result {
    let budget = f.width().unwrap_or(default_len);
    if value.chars().nth(budget).is_none() {
        return f.write_str(value);
    }

    let cut = value
        .char_indices()
        .nth(budget.saturating_sub(1))
        .map_or(0, |(idx, _)| idx);
    f.write_str(&value[..cut])?;
    f.write_str("…")
}

/// A client ID registered with the issuer
#[braid(serde)]
pub struct ClientId;

/// A client secret registered with the issuer
#[braid(serde, debug = "owned", display = "owned")]
pub struct ClientSecret;

redacted!(ClientSecretRef: "CLIENT SECRET", 5);

/// The audience a token is requested for
#[braid(serde)]
pub struct Audience;

/// A bearer access token
///
/// Formatting never prints the token unless the alternate flag is used,
/// so tokens can be passed to `tracing` fields safely.
#[braid(serde, debug = "owned", display = "owned")]
pub struct AccessToken;

redacted!(AccessTokenRef: "ACCESS TOKEN", 15);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn access_token_is_redacted_by_default() {
        let token = AccessTokenRef::from_static("abc123def456ghi789");
        assert_eq!(format!("{}", token), "***ACCESS TOKEN***");
        assert_eq!(format!("{:?}", token), "***ACCESS TOKEN***");
    }

    #[test]
    fn alternate_display_reveals_the_whole_token() {
        let token = AccessTokenRef::from_static("abc123def456ghi789");
        assert_eq!(format!("{:#}", token), "abc123def456ghi789");
    }

    #[test]
    fn alternate_debug_truncates_long_tokens() {
        let token = AccessTokenRef::from_static("abc123def456ghi789");
        assert_eq!(format!("{:#?}", token), "\"abc123def456gh…\"");
        assert_eq!(format!("{:#6?}", token), "\"abc12…\"");
    }

    #[test]
    fn client_secret_is_redacted() {
        let secret = ClientSecretRef::from_static("super-secret");
        assert_eq!(format!("{:?}", secret), "***CLIENT SECRET***");
        assert_eq!(format!("{:#?}", secret), "\"supe…\"");
    }

    #[test]
    fn values_that_fit_the_width_are_not_cut() {
        let secret = ClientSecretRef::from_static("abcde");
        assert_eq!(format!("{:#?}", secret), "\"abcde\"");
        assert_eq!(format!("{:#1?}", secret), "\"…\"");
        assert_eq!(format!("{:#3?}", ClientSecretRef::from_static("äöüß")), "\"äö…\"");
    }
}
