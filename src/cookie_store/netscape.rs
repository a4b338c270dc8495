//! Netscape cookie file parser.
//!
//! Parses the Netscape HTTP cookie file format (7 TAB-separated fields per
//! line) as written by browser export extensions and `curl -c`. Lines
//! prefixed with `#HttpOnly_` are cookies, not comments.

use std::io::BufRead;
use std::path::Path;

use tracing::{debug, instrument, warn};

use super::{Browser, CookieQuery, StoreError, StoredCookie};

const HTTP_ONLY_PREFIX: &str = "#HttpOnly_";

/// Errors that can occur while parsing a cookie file.
#[derive(Debug, thiserror::Error)]
pub enum CookieFileError {
    /// A line in the cookie file has an invalid format.
    #[error("line {line_number}: {reason} (got: {content})")]
    InvalidLine {
        /// 1-based line number in the cookie file.
        line_number: usize,
        /// The offending line content, value redacted.
        content: String,
        /// Description of what was wrong.
        reason: String,
    },

    /// I/O error reading the cookie file.
    #[error("failed to read cookie file: {0}")]
    Io(#[from] std::io::Error),

    /// No valid cookies found in a non-empty file.
    #[error("no valid cookies found in file ({malformed_count} lines failed to parse)")]
    NoCookiesFound {
        /// Number of malformed lines encountered.
        malformed_count: usize,
    },
}

/// Cookies parsed from a file plus warnings about skipped lines.
#[derive(Debug)]
pub struct ParseResult {
    /// Successfully parsed cookies.
    pub cookies: Vec<StoredCookie>,
    /// Warnings for malformed lines (line number and reason).
    pub warnings: Vec<(usize, String)>,
}

/// Parses a Netscape-format cookie file from a buffered reader.
///
/// Each data line must contain exactly 7 TAB-separated fields:
/// `domain`, `tailmatch`, `path`, `secure`, `expires`, `name`, `value`.
/// An `expires` of `0` marks a session cookie. Comment lines and blank
/// lines are skipped; malformed lines are collected as warnings.
///
/// # Errors
///
/// Returns [`CookieFileError::Io`] on read failure, or
/// [`CookieFileError::NoCookiesFound`] when a non-empty file yields zero
/// valid cookies.
#[instrument(level = "debug", skip(reader))]
pub fn parse_netscape_cookies(
    reader: impl BufRead,
    browser: &Browser,
) -> Result<ParseResult, CookieFileError> {
    let mut cookies = Vec::new();
    let mut warnings = Vec::new();
    let mut data_lines = 0;

    for (idx, line_result) in reader.lines().enumerate() {
        let line_number = idx + 1;
        let line = line_result?;
        let line = line.trim_end_matches(['\r', '\n']);
        if line.trim().is_empty() {
            continue;
        }

        let line = match line.strip_prefix(HTTP_ONLY_PREFIX) {
            Some(rest) => rest,
            None if line.starts_with('#') => continue,
            None => line,
        };
        data_lines += 1;

        match parse_cookie_line(line, line_number, browser) {
            Ok(cookie) => {
                debug!(
                    line = line_number,
                    domain = %cookie.domain,
                    name = %cookie.name,
                    "parsed cookie"
                );
                cookies.push(cookie);
            }
            Err(e) => {
                warn!(line = line_number, reason = %e, "skipping malformed cookie line");
                warnings.push((line_number, e.to_string()));
            }
        }
    }

    if cookies.is_empty() && data_lines > 0 {
        return Err(CookieFileError::NoCookiesFound {
            malformed_count: warnings.len(),
        });
    }

    Ok(ParseResult { cookies, warnings })
}

/// Reads `path` and returns the cookies matching `query` at time `now`.
pub(crate) async fn read_cookie_file(
    path: &Path,
    browser: &Browser,
    query: &CookieQuery,
    now: i64,
) -> Result<Vec<StoredCookie>, StoreError> {
    let content = match tokio::fs::read(path).await {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(StoreError::NotFound {
                browser: browser.to_string(),
            });
        }
        Err(e) => return Err(CookieFileError::Io(e).into()),
    };

    let parsed = parse_netscape_cookies(content.as_slice(), browser)?;
    Ok(parsed
        .cookies
        .into_iter()
        .filter(|cookie| query.matches(cookie, now))
        .collect())
}

fn parse_cookie_line(
    line: &str,
    line_number: usize,
    browser: &Browser,
) -> Result<StoredCookie, CookieFileError> {
    let invalid = |reason: String| CookieFileError::InvalidLine {
        line_number,
        content: redact_line_for_error(line),
        reason,
    };

    let fields: Vec<&str> = line.split('\t').collect();
    if fields.len() != 7 {
        return Err(invalid(format!(
            "expected 7 TAB-separated fields, found {}",
            fields.len()
        )));
    }

    for (value, field_name) in [(fields[1], "tailmatch"), (fields[3], "secure")] {
        if !matches!(value, "TRUE" | "FALSE") {
            return Err(invalid(format!(
                "{field_name} field must be TRUE or FALSE, got '{value}'"
            )));
        }
    }

    let expires = fields[4].parse::<i64>().ok().filter(|e| *e >= 0).ok_or_else(|| {
        invalid(format!(
            "expires field must be a non-negative integer, got '{}'",
            fields[4]
        ))
    })?;

    let domain = fields[0];
    let name = fields[5];
    if domain.is_empty() {
        return Err(invalid("domain field is empty".to_string()));
    }
    if name.is_empty() {
        return Err(invalid("cookie name field is empty".to_string()));
    }

    Ok(StoredCookie::new(
        browser.clone(),
        domain,
        name,
        fields[6],
        (expires > 0).then_some(expires),
    ))
}

/// Redacts the cookie value (7th field) from a line for error messages.
fn redact_line_for_error(line: &str) -> String {
    let fields: Vec<&str> = line.split('\t').collect();
    if fields.len() >= 7 {
        let mut redacted = fields[..6].join("\t");
        redacted.push_str("\t[REDACTED]");
        redacted
    } else {
        line.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use std::path::PathBuf;

    fn browser() -> Browser {
        Browser::CookieFile(PathBuf::from("cookies.txt"))
    }

    fn parse(input: &str) -> Result<ParseResult, CookieFileError> {
        parse_netscape_cookies(Cursor::new(input.as_bytes()), &browser())
    }

    #[test]
    fn test_parse_netscape_cookies_valid_file() {
        let input = "\
# Netscape HTTP Cookie File
.leetcode.com\tTRUE\t/\tFALSE\t0\tcsrftoken\tabc123
.leetcode.com\tTRUE\t/\tTRUE\t1700000000\tLEETCODE_SESSION\txyz789
";
        let result = parse(input).unwrap();
        assert_eq!(result.cookies.len(), 2);
        assert!(result.warnings.is_empty());

        assert_eq!(result.cookies[0].domain, ".leetcode.com");
        assert_eq!(result.cookies[0].name, "csrftoken");
        assert_eq!(result.cookies[0].value(), "abc123");
        assert_eq!(result.cookies[0].expires, None);
        assert_eq!(result.cookies[0].browser, browser());

        assert_eq!(result.cookies[1].expires, Some(1_700_000_000));
    }

    #[test]
    fn test_parse_netscape_cookies_http_only_prefix_is_a_cookie() {
        let input = "\
# Netscape HTTP Cookie File
#HttpOnly_.leetcode.com\tTRUE\t/\tTRUE\t0\tLEETCODE_SESSION\tsess
";
        let result = parse(input).unwrap();
        assert_eq!(result.cookies.len(), 1);
        assert_eq!(result.cookies[0].domain, ".leetcode.com");
        assert_eq!(result.cookies[0].value(), "sess");
    }

    #[test]
    fn test_parse_netscape_cookies_comment_and_blank_lines() {
        let input = "\
# Netscape HTTP Cookie File
# This is a comment

.example.com\tTRUE\t/\tFALSE\t0\tname\tvalue

# Another comment
";
        let result = parse(input).unwrap();
        assert_eq!(result.cookies.len(), 1);
        assert!(result.warnings.is_empty());
    }

    #[test]
    fn test_parse_netscape_cookies_malformed_lines_with_line_numbers() {
        let input = "\
# Header
.good.com\tTRUE\t/\tFALSE\t0\tname\tvalue
bad line without tabs
.also-good.com\tTRUE\t/\tFALSE\t0\tother\tval
";
        let result = parse(input).unwrap();
        assert_eq!(result.cookies.len(), 2);
        assert_eq!(result.warnings.len(), 1);
        assert_eq!(result.warnings[0].0, 3);
        assert!(result.warnings[0].1.contains("expected 7 TAB-separated fields"));
    }

    #[test]
    fn test_parse_netscape_cookies_empty_file() {
        let result = parse("").unwrap();
        assert!(result.cookies.is_empty());
        assert!(result.warnings.is_empty());
    }

    #[test]
    fn test_parse_netscape_cookies_all_malformed_returns_error() {
        let err = parse("bad line one\nanother bad line\n").unwrap_err();
        assert!(
            matches!(err, CookieFileError::NoCookiesFound { malformed_count: 2 }),
            "expected NoCookiesFound with 2 malformed, got: {err}"
        );
    }

    #[test]
    fn test_parse_netscape_cookies_rejects_bad_fields() {
        assert!(parse(".example.com\tYES\t/\tFALSE\t0\tname\tvalue\n").is_err());
        assert!(parse(".example.com\tTRUE\t/\tFALSE\tsoon\tname\tvalue\n").is_err());
        assert!(parse(".example.com\tTRUE\t/\tFALSE\t-5\tname\tvalue\n").is_err());
        assert!(parse("\tTRUE\t/\tFALSE\t0\tname\tvalue\n").is_err());
        assert!(parse(".example.com\tTRUE\t/\tFALSE\t0\t\tvalue\n").is_err());
    }

    #[test]
    fn test_parse_netscape_cookies_crlf_line_endings() {
        let input = "# Header\r\n.example.com\tTRUE\t/\tFALSE\t0\tname\tvalue\r\n";
        let result = parse(input).unwrap();
        assert_eq!(result.cookies.len(), 1);
        assert_eq!(result.cookies[0].value(), "value");
    }

    #[test]
    fn test_redact_line_for_error_hides_value() {
        let redacted = redact_line_for_error(".example.com\tTRUE\t/\tFALSE\t0\tname\tsecret_value");
        assert!(!redacted.contains("secret_value"));
        assert!(redacted.contains("[REDACTED]"));
        assert!(redacted.contains("name"));
    }

    #[tokio::test]
    async fn test_read_cookie_file_filters_by_query() {
        let temp = tempfile::TempDir::new().unwrap();
        let path = temp.path().join("cookies.txt");
        std::fs::write(
            &path,
            "\
.leetcode.com\tTRUE\t/\tTRUE\t0\tcsrftoken\tfresh
.leetcode.com\tTRUE\t/\tTRUE\t1000\tLEETCODE_SESSION\tstale
.github.com\tTRUE\t/\tTRUE\t0\tcsrftoken\tother
",
        )
        .unwrap();
        let browser = Browser::CookieFile(path.clone());

        let csrf = read_cookie_file(&path, &browser, &CookieQuery::valid("leetcode.com", "csrftoken"), 2000)
            .await
            .unwrap();
        assert_eq!(csrf.len(), 1);
        assert_eq!(csrf[0].value(), "fresh");

        let session = read_cookie_file(
            &path,
            &browser,
            &CookieQuery::valid("leetcode.com", "LEETCODE_SESSION"),
            2000,
        )
        .await
        .unwrap();
        assert!(session.is_empty());
    }

    #[tokio::test]
    async fn test_read_cookie_file_missing_is_not_found() {
        let path = PathBuf::from("/definitely/not/here/cookies.txt");
        let err = read_cookie_file(
            &path,
            &Browser::CookieFile(path.clone()),
            &CookieQuery::valid("leetcode.com", "csrftoken"),
            0,
        )
        .await
        .unwrap_err();
        assert!(matches!(err, StoreError::NotFound { .. }));
    }
}
