//! Mapping from source keys to file names.

/// Stem of the shared error log.
pub const ERROR_LOG_STEM: &str = "error";
/// Extension of every file the sink manages.
pub const LOG_EXTENSION: &str = "log";
/// Stem used for the empty key. Not a valid percent escape, so no other key maps to it.
const EMPTY_KEY_STEM: &str = "%empty";

/// File name of the active error log (`error.log`).
pub fn error_log_file_name() -> String {
    format!("{ERROR_LOG_STEM}.{LOG_EXTENSION}")
}

/// File name of error log backup `generation` (`error.<n>.log`, 1 = newest).
pub fn error_backup_file_name(generation: u32) -> String {
    format!("{ERROR_LOG_STEM}.{generation}.{LOG_EXTENSION}")
}

/// File name for a source key's log.
///
/// Every byte outside `[A-Za-z0-9-]` is percent-encoded, so distinct keys
/// always get distinct files and no key can escape the log directory. A key
/// that would land on the reserved error log name has its first letter
/// encoded as well (`error` -> `%65rror.log`).
pub fn key_file_name(key: &str) -> String {
    if key.is_empty() {
        return format!("{EMPTY_KEY_STEM}.{LOG_EXTENSION}");
    }

    let encoded = urlencoding::encode(key);
    let mut stem = String::with_capacity(encoded.len());
    for ch in encoded.chars() {
        match ch {
            '.' => stem.push_str("%2E"),
            '_' => stem.push_str("%5F"),
            '~' => stem.push_str("%7E"),
            ch => stem.push(ch),
        }
    }

    if stem.eq_ignore_ascii_case(ERROR_LOG_STEM) {
        let first = stem.remove(0);
        stem.insert_str(0, &format!("%{:02X}", first as u32));
    }

    format!("{stem}.{LOG_EXTENSION}")
}

/// Whether `file_name` is the active error log or one of its backups.
pub fn is_error_log_file(file_name: &str) -> bool {
    let Some(rest) = file_name
        .strip_prefix(ERROR_LOG_STEM)
        .and_then(|rest| rest.strip_suffix(LOG_EXTENSION))
    else {
        return false;
    };

    match rest {
        "." => true,
        _ => rest
            .strip_prefix('.')
            .and_then(|gen| gen.strip_suffix('.'))
            .is_some_and(|gen| !gen.is_empty() && gen.bytes().all(|b| b.is_ascii_digit())),
    }
}

/// Whether `file_name` carries the managed `.log` extension.
pub fn is_managed_file(file_name: &str) -> bool {
    file_name
        .rsplit_once('.')
        .is_some_and(|(stem, ext)| !stem.is_empty() && ext == LOG_EXTENSION)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn plain_key_maps_to_same_name() {
        assert_eq!(key_file_name("Nova"), "Nova.log");
        assert_eq!(key_file_name("zara-2"), "zara-2.log");
    }

    #[test]
    fn punctuation_is_percent_encoded() {
        assert_eq!(key_file_name("zara_sprite"), "zara%5Fsprite.log");
        assert_eq!(key_file_name("a b"), "a%20b.log");
        assert_eq!(key_file_name("100%"), "100%25.log");
        assert_eq!(key_file_name("~x"), "%7Ex.log");
        assert_eq!(key_file_name("Zoë"), "Zo%C3%AB.log");
    }

    #[test]
    fn path_characters_cannot_escape() {
        let name = key_file_name("../../etc/passwd");
        assert_eq!(name, "%2E%2E%2F%2E%2E%2Fetc%2Fpasswd.log");
        assert!(!name.contains('/'));
        assert_eq!(key_file_name(".."), "%2E%2E.log");
    }

    #[test]
    fn bedrock_prefix_does_not_collide_with_underscore() {
        assert_eq!(key_file_name(".Steve"), "%2ESteve.log");
        assert_eq!(key_file_name("_Steve"), "%5FSteve.log");
        assert_ne!(key_file_name(".Steve"), key_file_name("_Steve"));
    }

    #[test]
    fn distinct_keys_get_distinct_names() {
        let keys = [
            "", "%empty", "unknown", "error", "ERROR", "%65rror", "error.1", "error_1",
            "error%2E1", ".Steve", "_Steve", "%2ESteve", "a b", "a_b", "a.b", "a%20b",
        ];
        let names: HashSet<String> = keys.iter().map(|k| key_file_name(k)).collect();
        assert_eq!(names.len(), keys.len());
    }

    #[test]
    fn empty_key_gets_placeholder() {
        assert_eq!(key_file_name(""), "%empty.log");
        assert!(is_managed_file(&key_file_name("")));
    }

    #[test]
    fn reserved_name_is_escaped() {
        assert_eq!(key_file_name("error"), "%65rror.log");
        assert_eq!(key_file_name("ERROR"), "%45RROR.log");
        assert_eq!(key_file_name("error.1"), "error%2E1.log");
        assert!(!is_error_log_file(&key_file_name("error")));
        assert!(!is_error_log_file(&key_file_name("error.1")));
    }

    #[test]
    fn error_file_detection() {
        assert!(is_error_log_file("error.log"));
        assert!(is_error_log_file("error.1.log"));
        assert!(is_error_log_file("error.12.log"));
        assert!(!is_error_log_file("error..log"));
        assert!(!is_error_log_file("error.x.log"));
        assert!(!is_error_log_file("_error.log"));
        assert!(!is_error_log_file("Nova.log"));
    }

    #[test]
    fn managed_file_detection() {
        assert!(is_managed_file("Nova.log"));
        assert!(is_managed_file("error.3.log"));
        assert!(!is_managed_file("relay.jsonl"));
        assert!(!is_managed_file(".log"));
        assert!(!is_managed_file("notes.txt"));
    }

    #[test]
    fn backup_names() {
        assert_eq!(error_log_file_name(), "error.log");
        assert_eq!(error_backup_file_name(1), "error.1.log");
        assert_eq!(error_backup_file_name(4), "error.4.log");
    }
}
