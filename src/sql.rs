//! Statement text preprocessing.
//!
//! Callers may prefix a query with `SET key=value;` statements, switch the
//! project with `USE name`, and leave off the trailing terminator. These
//! helpers normalise the text before it reaches the service.

use crate::settings::Settings;

/// Remove `--` line comments and `/* */` block comments outside quotes.
///
/// Optimizer hints (`/*+ ... */`) are kept.
pub fn strip_comments(sql: &str) -> String {
    let mut out = String::with_capacity(sql.len());
    let mut chars = sql.chars().peekable();
    let mut quote: Option<char> = None;

    while let Some(ch) = chars.next() {
        if let Some(q) = quote {
            out.push(ch);
            if ch == '\\' {
                if let Some(escaped) = chars.next() {
                    out.push(escaped);
                }
            } else if ch == q {
                quote = None;
            }
            continue;
        }

        match ch {
            '\'' | '"' | '`' => {
                quote = Some(ch);
                out.push(ch);
            }
            '-' if chars.peek() == Some(&'-') => {
                // line comment: drop up to, not including, the newline
                while let Some(&next) = chars.peek() {
                    if next == '\n' {
                        break;
                    }
                    chars.next();
                }
            }
            '/' if chars.peek() == Some(&'*') => {
                chars.next();
                if chars.peek() == Some(&'+') {
                    out.push_str("/*");
                    continue;
                }
                let mut prev = '\0';
                for next in chars.by_ref() {
                    if prev == '*' && next == '/' {
                        break;
                    }
                    prev = next;
                }
            }
            _ => out.push(ch),
        }
    }
    out
}

/// Byte offsets of `;` terminators outside quotes.
fn terminator_positions(sql: &str) -> Vec<usize> {
    let mut positions = Vec::new();
    let mut quote: Option<char> = None;
    let mut escaped = false;
    for (idx, ch) in sql.char_indices() {
        if let Some(q) = quote {
            if escaped {
                escaped = false;
            } else if ch == '\\' {
                escaped = true;
            } else if ch == q {
                quote = None;
            }
            continue;
        }
        match ch {
            '\'' | '"' | '`' => quote = Some(ch),
            ';' => positions.push(idx),
            _ => {}
        }
    }
    positions
}

/// Parse `SET key = value` into its pair.
fn parse_set_clause(statement: &str) -> Option<(String, String)> {
    let trimmed = statement.trim();
    let keyword = trimmed.get(..3)?;
    if !keyword.eq_ignore_ascii_case("set") {
        return None;
    }
    let rest = &trimmed[3..];
    if !rest.starts_with(char::is_whitespace) {
        return None;
    }
    let (key, value) = rest.split_once('=')?;
    let key = key.trim();
    if key.is_empty() {
        return None;
    }
    Some((key.to_string(), value.trim().to_string()))
}

/// Split leading `SET` statements off a statement text.
///
/// Returns the settings found and the remaining query, or `None` when the
/// text contained nothing but settings.
pub fn split_settings(sql: &str) -> (Settings, Option<String>) {
    let cleaned = strip_comments(sql);
    let mut settings = Settings::new();
    let mut start = 0;

    for end in terminator_positions(&cleaned) {
        match parse_set_clause(&cleaned[start..end]) {
            Some((key, value)) => {
                settings.set(key, value);
                start = end + 1;
            }
            None => break,
        }
    }

    let rest = &cleaned[start..];
    if let Some((key, value)) = parse_set_clause(rest) {
        // unterminated trailing SET
        settings.set(key, value);
        return (settings, None);
    }

    let rest = rest.trim();
    if rest.is_empty() {
        (settings, None)
    } else {
        (settings, Some(rest.to_string()))
    }
}

/// Project named by a `USE project` statement.
pub fn parse_use(sql: &str) -> Option<String> {
    let trimmed = sql.trim().trim_end_matches(';').trim_end();
    let keyword = trimmed.get(..3)?;
    if !keyword.eq_ignore_ascii_case("use") {
        return None;
    }
    let rest = &trimmed[3..];
    if !rest.starts_with(char::is_whitespace) {
        return None;
    }
    let project = rest.trim();
    if project.is_empty() || project.contains(char::is_whitespace) {
        return None;
    }
    Some(project.to_string())
}

/// Whether the first meaningful line of the text starts with `SELECT`.
///
/// Blank lines and lines starting with `--` or `#` are skipped.
pub fn is_query(sql: &str) -> bool {
    for line in sql.lines() {
        let line = line.trim_start();
        if line.is_empty() || line.starts_with("--") || line.starts_with('#') {
            continue;
        }
        let Some(keyword) = line.get(..6) else {
            return false;
        };
        let boundary = line[6..]
            .chars()
            .next()
            .map_or(true, |c| !c.is_alphanumeric() && c != '_');
        return keyword.eq_ignore_ascii_case("select") && boundary;
    }
    false
}

/// Append the statement terminator if it is missing.
pub fn ensure_terminated(sql: &str) -> String {
    let trimmed = sql.trim_end();
    if trimmed.ends_with(';') {
        trimmed.to_string()
    } else {
        format!("{};", trimmed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_settings_plain_query() {
        let sql = r#"select keyvalue(f1,";",":","mktActivityType") f1 from test_dirty;"#;
        let (settings, query) = split_settings(sql);
        assert!(settings.is_empty());
        assert_eq!(query.as_deref(), Some(sql));
    }

    #[test]
    fn test_split_settings_leading_sets() {
        let sql = "set odps.sql.timezone = UTC;\nSET priority=1;\nselect * from t;";
        let (settings, query) = split_settings(sql);
        assert_eq!(settings.get("odps.sql.timezone"), Some("UTC"));
        assert_eq!(settings.get("priority"), Some("1"));
        assert_eq!(query.as_deref(), Some("select * from t;"));
    }

    #[test]
    fn test_split_settings_only_settings() {
        let (settings, query) = split_settings("set a=b;  ");
        assert_eq!(settings.get("a"), Some("b"));
        assert!(query.is_none());

        let (settings, query) = split_settings("set a = b");
        assert_eq!(settings.get("a"), Some("b"));
        assert!(query.is_none());
    }

    #[test]
    fn test_split_settings_stops_at_first_query() {
        let (settings, query) = split_settings("select 1; set a=b;");
        assert!(settings.is_empty());
        assert_eq!(query.as_deref(), Some("select 1; set a=b;"));
    }

    #[test]
    fn test_strip_comments() {
        let sql = "-- leading\nselect /* note */ a, '--not' /*+ mapjoin(b) */ from t -- tail";
        assert_eq!(
            strip_comments(sql),
            "\nselect  a, '--not' /*+ mapjoin(b) */ from t "
        );
    }

    #[test]
    fn test_parse_use() {
        assert_eq!(parse_use("use analytics;").as_deref(), Some("analytics"));
        assert_eq!(parse_use("  USE  other ").as_deref(), Some("other"));
        assert!(parse_use("user_table").is_none());
        assert!(parse_use("use a b").is_none());
    }

    #[test]
    fn test_is_query() {
        assert!(is_query("select 1"));
        assert!(is_query("-- comment\n# other\n\n  SELECT * from t"));
        assert!(!is_query("insert into t select 1"));
        assert!(!is_query("selected"));
        assert!(!is_query(""));
    }

    #[test]
    fn test_ensure_terminated() {
        assert_eq!(ensure_terminated("select 1"), "select 1;");
        assert_eq!(ensure_terminated("select 1;  "), "select 1;");
    }
}
