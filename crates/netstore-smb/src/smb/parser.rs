//! Parsing of `smbclient` output.
//!
//! `ls` prints one line per entry, indented by two spaces:
//! ```text
//!   .                                   D        0  Mon Jan  8 10:12:01 2024
//!   report.pdf                          A   482133  Tue Feb 13 09:05:11 2024
//!   Old Projects                        D        0  Fri Dec  1 16:40:22 2023
//!
//!         61202244 blocks of size 1024. 25412820 blocks available
//! ```
//! Errors are reported as `NT_STATUS_*` codes on their own lines, and the
//! exit status is not reliable for them. Commands read from stdin echo a
//! `smb: \> ` prompt that may prefix any line.

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use lazy_static::lazy_static;
use netstore_core::paths;
use netstore_core::{EntryKind, RemoteEntry};
use regex::Regex;

lazy_static! {
    static ref LS_LINE: Regex = Regex::new(
        r"(?x)
        ^\x20\x20(?P<name>.+?)\s+                           # name, may contain spaces
        (?P<attrs>[A-Z]*)\s+                                # DOS attribute letters
        (?P<size>\d+)\s+                                    # size in bytes
        (?P<date>\w{3}\s+\w{3}\s+\d{1,2}\s+\d{2}:\d{2}:\d{2}\s+\d{4})\s*$
        "
    )
    .expect("static regex");
    static ref NT_STATUS: Regex = Regex::new(r"NT_STATUS_[A-Z0-9_]+").expect("static regex");
    static ref PROMPT: Regex = Regex::new(r"^(?:smb: \\[^>]*> ?)+").expect("static regex");
}

/// Parse `ls` output for the directory `dir`. Entry paths are built from
/// `dir` the same way callers address them.
pub fn parse_ls(output: &str, dir: &str) -> Vec<RemoteEntry> {
    output
        .lines()
        .filter_map(|line| parse_ls_line(line, dir))
        .filter(|e| e.name != "." && e.name != "..")
        .collect()
}

fn parse_ls_line(line: &str, dir: &str) -> Option<RemoteEntry> {
    let caps = LS_LINE.captures(strip_prompt(line))?;
    let name = caps.name("name")?.as_str().to_string();
    let attrs = caps.name("attrs")?.as_str();
    let size = caps.name("size")?.as_str().parse::<u64>().ok();
    let modified = caps.name("date").and_then(|m| parse_ls_date(m.as_str()));
    let kind = if attrs.contains('D') {
        EntryKind::Directory
    } else {
        EntryKind::File
    };
    Some(RemoteEntry {
        path: paths::canonical_path_to_target(&name, dir),
        name,
        kind,
        size: if kind == EntryKind::Directory { None } else { size },
        modified,
    })
}

/// `Tue Feb 13 09:05:11 2024`, with the day space-padded. The server's
/// local time is taken as UTC.
fn parse_ls_date(raw: &str) -> Option<DateTime<Utc>> {
    let parts: Vec<&str> = raw.split_whitespace().collect();
    let [_weekday, month, day, time, year] = parts.as_slice() else {
        return None;
    };
    let normalised = format!("{month} {day:0>2} {time} {year}");
    NaiveDateTime::parse_from_str(&normalised, "%b %d %H:%M:%S %Y")
        .ok()
        .map(|dt| Utc.from_utc_datetime(&dt))
}

/// Line without the interactive prompt and trailing `\r`.
pub fn strip_prompt(line: &str) -> &str {
    let line = line.trim_end_matches('\r');
    match PROMPT.find(line) {
        Some(m) => &line[m.end()..],
        None => line,
    }
}

/// First `NT_STATUS_*` code in the output, if any. Listing rows are skipped
/// so a file named after a status code is not read as one.
pub fn nt_status(output: &str) -> Option<&str> {
    output
        .lines()
        .map(strip_prompt)
        .filter(|line| !LS_LINE.is_match(line))
        .find_map(|line| NT_STATUS.find(line))
        .map(|m| m.as_str())
}

/// Coarse meaning of an `NT_STATUS_*` code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusClass {
    AuthRejected,
    NotFound,
    PermissionDenied,
    Connectivity,
    NotADirectory,
    Protocol,
}

pub fn classify_status(status: &str) -> StatusClass {
    match status.trim_start_matches("NT_STATUS_") {
        "LOGON_FAILURE" | "WRONG_PASSWORD" | "ACCOUNT_DISABLED" | "ACCOUNT_LOCKED_OUT"
        | "PASSWORD_EXPIRED" | "ACCOUNT_RESTRICTION" | "NO_SUCH_USER" => StatusClass::AuthRejected,
        "OBJECT_NAME_NOT_FOUND" | "OBJECT_PATH_NOT_FOUND" | "NO_SUCH_FILE" | "NOT_FOUND"
        | "BAD_NETWORK_NAME" | "OBJECT_NAME_INVALID" => StatusClass::NotFound,
        "ACCESS_DENIED" | "NETWORK_ACCESS_DENIED" | "SHARING_VIOLATION" => StatusClass::PermissionDenied,
        "CONNECTION_REFUSED" | "IO_TIMEOUT" | "HOST_UNREACHABLE" | "NETWORK_UNREACHABLE"
        | "CONNECTION_RESET" | "CONNECTION_DISCONNECTED" | "BAD_NETWORK_PATH" | "PIPE_BROKEN" => {
            StatusClass::Connectivity
        }
        "NOT_A_DIRECTORY" => StatusClass::NotADirectory,
        _ => StatusClass::Protocol,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Datelike;

    const LISTING: &str = "\
  .                                   D        0  Mon Jan  8 10:12:01 2024
  ..                                  D        0  Mon Jan  8 10:12:01 2024
  report.pdf                          A   482133  Tue Feb 13 09:05:11 2024
  Old Projects                        D        0  Fri Dec  1 16:40:22 2023
  Thumbs.db                         AHS     1024  Sat Mar  2 08:00:00 2024
  .profile                            H       12  Sat Mar  2 08:00:00 2024

\t\t61202244 blocks of size 1024. 25412820 blocks available
";

    #[test]
    fn parses_entries_and_skips_dot_dirs() {
        let entries = parse_ls(LISTING, "CSE");
        let names: Vec<_> = entries.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, ["report.pdf", "Old Projects", "Thumbs.db", ".profile"]);

        let report = &entries[0];
        assert_eq!(report.path, "CSE/report.pdf");
        assert_eq!(report.kind, EntryKind::File);
        assert_eq!(report.size, Some(482133));
        let modified = report.modified.unwrap();
        assert_eq!((modified.year(), modified.month(), modified.day()), (2024, 2, 13));

        let dir = &entries[1];
        assert_eq!(dir.kind, EntryKind::Directory);
        assert_eq!(dir.size, None);
        assert_eq!(dir.path, "CSE/Old Projects");
    }

    #[test]
    fn root_listing_keeps_bare_names() {
        let entries = parse_ls(LISTING, ".");
        assert_eq!(entries[0].path, "report.pdf");
    }

    #[test]
    fn single_digit_days_parse() {
        let dt = parse_ls_date("Fri Dec  1 16:40:22 2023").unwrap();
        assert_eq!(dt.day(), 1);
        assert!(parse_ls_date("garbage").is_none());
    }

    #[test]
    fn ignores_noise_lines() {
        let output = "Try \"help\" to get a list of possible commands.\nDomain=[LAB] OS=[] Server=[]\n";
        assert!(parse_ls(output, ".").is_empty());
    }

    #[test]
    fn prompt_prefixed_rows_parse() {
        let output = "smb: \\> smb: \\>   notes;v2.txt                        A        5  Tue Feb 13 09:05:11 2024\nsmb: \\> ";
        let entries = parse_ls(output, ".");
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].name, "notes;v2.txt");
        assert_eq!(entries[0].size, Some(5));
    }

    #[test]
    fn file_named_like_a_status_is_not_an_error() {
        let output = "\
  .                                   D        0  Mon Jan  8 10:12:01 2024
  NT_STATUS_NOTES.txt                 A       12  Tue Feb 13 09:05:11 2024

\t\t61202244 blocks of size 1024. 25412820 blocks available
";
        assert_eq!(parse_ls(output, ".").len(), 1);
        assert!(nt_status(output).is_none());

        let failed = "smb: \\> NT_STATUS_NO_SUCH_FILE listing \\docs\\*\nsmb: \\> ";
        assert_eq!(nt_status(failed), Some("NT_STATUS_NO_SUCH_FILE"));
    }

    #[test]
    fn finds_and_classifies_status_codes() {
        let output = "session setup failed: NT_STATUS_LOGON_FAILURE\n";
        let status = nt_status(output).unwrap();
        assert_eq!(status, "NT_STATUS_LOGON_FAILURE");
        assert_eq!(classify_status(status), StatusClass::AuthRejected);
        assert_eq!(classify_status("NT_STATUS_OBJECT_NAME_NOT_FOUND"), StatusClass::NotFound);
        assert_eq!(classify_status("NT_STATUS_ACCESS_DENIED"), StatusClass::PermissionDenied);
        assert_eq!(classify_status("NT_STATUS_IO_TIMEOUT"), StatusClass::Connectivity);
        assert_eq!(classify_status("NT_STATUS_INVALID_NETWORK_RESPONSE"), StatusClass::Protocol);
        assert!(nt_status("all good").is_none());
    }
}
