//! Logical paths and bounded tree building over any [`NetFileClient`].
//!
//! A logical path is `"{fileStoreId}:/{path relative to the store root}"`.
//! Callers above this layer only ever see logical paths; the real remote
//! location is recovered with [`resolve_logic_path`].

use crate::client::{NetFileClient, RemoteEntry};
use crate::error::{NetResult, NetStoreError};
use crate::model::{FileStore, FileStoreId};
use crate::paths;
use chrono::{DateTime, Utc};
use glob::Pattern;
use serde::{Deserialize, Serialize};

/// Limits applied to a recursive listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TreeBounds {
    /// Directory levels listed below the root. `1` lists the root only.
    pub max_depth: usize,
    /// Total nodes added below the root before listing stops.
    pub max_nodes: usize,
    pub include_hidden: bool,
    /// Glob applied to file names. Directories are never filtered.
    pub name_filter: Option<String>,
}

impl Default for TreeBounds {
    fn default() -> Self {
        Self {
            max_depth: 1,
            max_nodes: 5000,
            include_hidden: false,
            name_filter: None,
        }
    }
}

impl TreeBounds {
    pub fn with_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    pub fn with_max_nodes(mut self, max_nodes: usize) -> Self {
        self.max_nodes = max_nodes;
        self
    }

    pub fn with_hidden(mut self, include_hidden: bool) -> Self {
        self.include_hidden = include_hidden;
        self
    }

    pub fn with_name_filter(mut self, filter: impl Into<String>) -> Self {
        self.name_filter = Some(filter.into());
        self
    }

    fn pattern(&self) -> NetResult<Option<Pattern>> {
        self.name_filter
            .as_deref()
            .filter(|f| !f.trim().is_empty())
            .map(|f| Pattern::new(f).map_err(|e| NetStoreError::invalid_option("nameFilter", e.to_string())))
            .transpose()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteTreeNode {
    pub name: String,
    pub remote_path: String,
    pub logic_path: String,
    pub is_directory: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub modified: Option<DateTime<Utc>>,
    #[serde(default)]
    pub children: Vec<RemoteTreeNode>,
    /// Children were listed.
    #[serde(default)]
    pub expanded: bool,
    /// The node budget ran out before this node's children, or the
    /// subdirectories among them, were all listed.
    #[serde(default)]
    pub truncated: bool,
}

impl RemoteTreeNode {
    fn from_entry(entry: &RemoteEntry, file_store: &FileStore) -> Self {
        let is_directory = entry.is_directory();
        Self {
            name: entry.name.clone(),
            remote_path: entry.path.clone(),
            logic_path: calculate_logic_path(&entry.path, file_store),
            is_directory,
            size: if is_directory { None } else { entry.size },
            modified: entry.modified,
            children: Vec::new(),
            expanded: false,
            truncated: false,
        }
    }

    /// Number of nodes in this subtree, the node itself included.
    pub fn node_count(&self) -> usize {
        1 + self.children.iter().map(RemoteTreeNode::node_count).sum::<usize>()
    }

    pub fn find(&self, logic_path: &str) -> Option<&RemoteTreeNode> {
        if self.logic_path == logic_path {
            return Some(self);
        }
        self.children.iter().find_map(|c| c.find(logic_path))
    }
}

/// Map a remote path to its logical path inside `file_store`.
///
/// The store root is stripped only on a segment boundary; a path outside
/// the root keeps its full form after the `"{id}:/"` prefix.
pub fn calculate_logic_path(remote_path: &str, file_store: &FileStore) -> String {
    let sanitised = paths::sanitise_list_path(remote_path);
    let path = sanitised.trim_start_matches('/');
    let root = file_store.path.trim_matches('/');

    let relative = if root.is_empty() || root == "." {
        path
    } else if path == root {
        ""
    } else {
        path.strip_prefix(root)
            .and_then(|rest| rest.strip_prefix('/'))
            .unwrap_or(path)
    };
    let relative = if relative == "." { "" } else { relative };
    format!("{}:/{}", file_store.id, relative.trim_end_matches('/'))
}

/// Inverse of [`calculate_logic_path`]: the remote path a logical path of
/// `file_store` points at.
pub fn resolve_logic_path(logic_path: &str, file_store: &FileStore) -> NetResult<String> {
    let (id, relative) = split_logic_path(logic_path)?;
    if id != file_store.id {
        return Err(NetStoreError::InvalidPath {
            path: logic_path.to_string(),
            reason: "logical path belongs to another file store",
        });
    }
    paths::join_store_path(&file_store.path, relative)
}

/// Split `"{id}:/rest"` into the store id and the relative part.
pub fn split_logic_path(logic_path: &str) -> NetResult<(FileStoreId, &str)> {
    let malformed = || NetStoreError::InvalidPath {
        path: logic_path.to_string(),
        reason: "expected '<fileStoreId>:/<path>'",
    };
    let (id, relative) = logic_path.split_once(':').ok_or_else(malformed)?;
    let id = id.trim().parse::<FileStoreId>().map_err(|_| malformed())?;
    Ok((id, relative))
}

/// Recursively list `root_path` through `client`, bounded by `bounds`.
pub fn build_tree<C: NetFileClient + ?Sized>(
    client: &mut C,
    root_path: &str,
    file_store: &FileStore,
    bounds: &TreeBounds,
) -> NetResult<RemoteTreeNode> {
    let pattern = bounds.pattern()?;
    let root_path = paths::sanitise_list_path(root_path);
    let name = match root_path.as_str() {
        "." | "/" => file_store.name.clone(),
        path => paths::file_name_from_full_path(path),
    };
    let mut root = RemoteTreeNode {
        name,
        logic_path: calculate_logic_path(&root_path, file_store),
        remote_path: root_path,
        is_directory: true,
        size: None,
        modified: None,
        children: Vec::new(),
        expanded: false,
        truncated: false,
    };

    let mut walker = Walker {
        file_store,
        bounds,
        pattern,
        budget: bounds.max_nodes,
    };
    walker.expand(client, &mut root, bounds.max_depth)?;
    log::debug!(
        "built tree for file store {} at '{}' ({} nodes)",
        file_store.id,
        root.remote_path,
        root.node_count()
    );
    Ok(root)
}

struct Walker<'a> {
    file_store: &'a FileStore,
    bounds: &'a TreeBounds,
    pattern: Option<Pattern>,
    budget: usize,
}

impl Walker<'_> {
    fn expand<C: NetFileClient + ?Sized>(
        &mut self,
        client: &mut C,
        node: &mut RemoteTreeNode,
        depth: usize,
    ) -> NetResult<()> {
        if depth == 0 {
            return Ok(());
        }
        let mut entries: Vec<RemoteEntry> = client
            .list(&node.remote_path)?
            .into_iter()
            .filter(|e| self.keep(e))
            .collect();
        sort_entries(&mut entries);

        node.expanded = true;
        for entry in &entries {
            if self.budget == 0 {
                node.truncated = true;
                break;
            }
            self.budget -= 1;
            node.children.push(RemoteTreeNode::from_entry(entry, self.file_store));
        }

        if depth > 1 {
            let mut exhausted = false;
            for child in node.children.iter_mut().filter(|c| c.is_directory) {
                if self.budget == 0 {
                    exhausted = true;
                    break;
                }
                self.expand(client, child, depth - 1)?;
            }
            // some child directories were left unlisted
            if exhausted {
                node.truncated = true;
            }
        }
        Ok(())
    }

    fn keep(&self, entry: &RemoteEntry) -> bool {
        if entry.name == "." || entry.name == ".." {
            return false;
        }
        if !self.bounds.include_hidden && entry.is_hidden() {
            return false;
        }
        match &self.pattern {
            Some(pattern) if !entry.is_directory() => pattern.matches(&entry.name),
            _ => true,
        }
    }
}

/// Directories first, then case-insensitive name.
pub fn sort_entries(entries: &mut [RemoteEntry]) {
    entries.sort_by(|a, b| {
        b.is_directory()
            .cmp(&a.is_directory())
            .then_with(|| a.name.to_lowercase().cmp(&b.name.to_lowercase()))
    });
}
