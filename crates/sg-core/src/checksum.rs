//! SHA-256 checksum of migration content.

use sha2::{Digest, Sha256};

/// Compute the SHA-256 checksum of migration SQL.
///
/// Line endings are normalised to `\n` and trailing whitespace on each line
/// and at the end of the script is dropped, so a checkout with CRLF endings
/// produces the same checksum as the published migration.
pub fn compute_checksum(sql: &str) -> String {
    let mut hasher = Sha256::new();
    let normalized: Vec<&str> = sql.lines().map(str::trim_end).collect();
    hasher.update(normalized.join("\n").trim_end().as_bytes());
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_checksum_is_hex_sha256() {
        let sum = compute_checksum("CREATE TABLE users (id INTEGER);");
        assert_eq!(sum.len(), 64);
        assert!(sum.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_line_endings_do_not_change_checksum() {
        let unix = "CREATE TABLE a (id INTEGER);\nCREATE INDEX a_id ON a (id);\n";
        let windows = "CREATE TABLE a (id INTEGER);\r\nCREATE INDEX a_id ON a (id);\r\n";
        assert_eq!(compute_checksum(unix), compute_checksum(windows));
    }

    #[test]
    fn test_content_change_changes_checksum() {
        assert_ne!(
            compute_checksum("CREATE TABLE a (id INTEGER);"),
            compute_checksum("CREATE TABLE a (id BIGINT);")
        );
    }
}
