//! Remote path helpers shared by every protocol client.
//!
//! Everything here is pure string handling. These functions are the only
//! place remote paths are normalised before they reach a protocol call, so
//! the traversal check lives here too. Protocol specific name rules belong
//! to the client that needs them.

use crate::error::{NetResult, NetStoreError};

/// Normalise a path handed to a listing call: an empty path means the
/// current directory and a run of leading slashes collapses to one.
pub fn sanitise_list_path(path: &str) -> String {
    if path.is_empty() {
        return ".".to_string();
    }
    let rest = path.trim_start_matches('/');
    if rest.len() == path.len() {
        path.to_string()
    } else {
        format!("/{rest}")
    }
}

/// Path of `file_name` inside `base_dir`, with exactly one separator.
pub fn canonical_path_to_target(file_name: &str, base_dir: &str) -> String {
    if base_dir == "." || base_dir.is_empty() {
        return file_name.to_string();
    }
    if base_dir.ends_with('/') {
        format!("{base_dir}{file_name}")
    } else {
        format!("{base_dir}/{file_name}")
    }
}

/// Last segment of a `/`-separated path.
pub fn file_name_from_full_path(path: &str) -> String {
    path.trim_end_matches('/')
        .rsplit('/')
        .next()
        .unwrap_or_default()
        .to_string()
}

/// Parent directory of a `/`-separated path, `"."` for a bare name.
pub fn parent_path(path: &str) -> String {
    let trimmed = path.trim_end_matches('/');
    match trimmed.rfind('/') {
        Some(0) => "/".to_string(),
        Some(idx) => trimmed[..idx].to_string(),
        None => ".".to_string(),
    }
}

/// Reject anything that could escape a store root. Other characters are
/// left to the protocol: `;`, `"` and `\` are legal in POSIX names.
pub fn check_relative_path(path: &str) -> NetResult<()> {
    let reject = |reason: &'static str| NetStoreError::InvalidPath {
        path: path.to_string(),
        reason,
    };
    if path.chars().any(|c| c.is_control()) {
        return Err(reject("control characters are not allowed"));
    }
    if path.split('/').any(|segment| segment == "..") {
        return Err(reject("parent directory segments are not allowed"));
    }
    Ok(())
}

/// Join a file-store root with a caller supplied path relative to it.
pub fn join_store_path(root: &str, relative: &str) -> NetResult<String> {
    check_relative_path(relative)?;
    let relative = relative
        .split('/')
        .filter(|s| !s.is_empty() && *s != ".")
        .collect::<Vec<_>>()
        .join("/");
    let root = root.trim_end_matches('/');
    Ok(match (root.is_empty() || root == ".", relative.is_empty()) {
        (true, true) => if root.is_empty() { ".".to_string() } else { root.to_string() },
        (true, false) => relative,
        (false, true) => root.to_string(),
        (false, false) => canonical_path_to_target(&relative, root),
    })
}

/// Backslash form used on the SMB command channel, always absolute.
pub fn to_smb_path(path: &str) -> String {
    let segments: Vec<&str> = path
        .split('/')
        .filter(|s| !s.is_empty() && *s != ".")
        .collect();
    format!("\\{}", segments.join("\\"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn sanitise_list_path_cases() {
        assert_eq!(sanitise_list_path(""), ".");
        assert_eq!(sanitise_list_path("/"), "/");
        assert_eq!(sanitise_list_path("//test"), "/test");
        assert_eq!(sanitise_list_path("///a//b"), "/a//b");
        assert_eq!(sanitise_list_path("rel/dir"), "rel/dir");
    }

    #[test]
    fn canonical_path_to_target_cases() {
        assert_eq!(canonical_path_to_target("testFile", "."), "testFile");
        assert_eq!(canonical_path_to_target("testFile", "test"), "test/testFile");
        assert_eq!(canonical_path_to_target("testFile", "test/test2/"), "test/test2/testFile");
        assert_eq!(canonical_path_to_target("testFile", "/"), "/testFile");
    }

    #[test]
    fn file_name_from_full_path_cases() {
        assert_eq!(file_name_from_full_path("csce/testFile.txt"), "testFile.txt");
        assert_eq!(file_name_from_full_path("/csce/testFile.txt"), "testFile.txt");
        assert_eq!(file_name_from_full_path("/csce/dir/"), "dir");
        assert_eq!(file_name_from_full_path("plain"), "plain");
    }

    #[test]
    fn parent_path_cases() {
        assert_eq!(parent_path("/a/b"), "/a");
        assert_eq!(parent_path("/a"), "/");
        assert_eq!(parent_path("a"), ".");
        assert_eq!(parent_path("a/b/"), "a");
    }

    #[test]
    fn join_store_path_cases() {
        assert_eq!(join_store_path("CSE", "test2").unwrap(), "CSE/test2");
        assert_eq!(join_store_path("CSE/", "/test/x/").unwrap(), "CSE/test/x");
        assert_eq!(join_store_path("/data", "").unwrap(), "/data");
        assert_eq!(join_store_path("", "a/./b").unwrap(), "a/b");
        assert_eq!(join_store_path("", "").unwrap(), ".");
        assert_eq!(join_store_path("/", "").unwrap(), "/");
    }

    #[test]
    fn join_store_path_rejects_traversal() {
        for bad in ["../etc", "a/../../b", "docs/..", "a\nb", "a\u{7f}b"] {
            let err = join_store_path("CSE", bad).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::InvalidArgument, "{bad}");
        }
        assert!(join_store_path("CSE", "a..b/c").is_ok());
    }

    #[test]
    fn join_store_path_keeps_unusual_names() {
        assert_eq!(join_store_path("home/alice", "notes;v2.txt").unwrap(), "home/alice/notes;v2.txt");
        assert_eq!(join_store_path("home/alice", "a;b/say \"hi\".txt").unwrap(), "home/alice/a;b/say \"hi\".txt");
        assert_eq!(join_store_path("", "back\\slash").unwrap(), "back\\slash");
    }

    #[test]
    fn smb_path_form() {
        assert_eq!(to_smb_path("."), "\\");
        assert_eq!(to_smb_path("/"), "\\");
        assert_eq!(to_smb_path("CSE/test"), "\\CSE\\test");
        assert_eq!(to_smb_path("/CSE//test/"), "\\CSE\\test");
    }
}
