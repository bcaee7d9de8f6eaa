// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 InfoGarden

//! Plain-text outline of an organization's folders and documents.

use std::collections::{BTreeMap, HashMap, HashSet};

use crate::storage::{Document, DocumentFolder};

const RULE_WIDTH: usize = 80;

/// Folder lookup used to build outlines and staging paths.
pub struct FolderIndex<'a> {
    by_id: HashMap<i64, &'a DocumentFolder>,
    /// Children per parent id, sorted by (name, id)
    children: BTreeMap<i64, Vec<&'a DocumentFolder>>,
}

impl<'a> FolderIndex<'a> {
    pub fn new(folders: &'a [DocumentFolder]) -> Self {
        let by_id: HashMap<i64, &DocumentFolder> = folders.iter().map(|f| (f.id, f)).collect();

        let mut children: BTreeMap<i64, Vec<&DocumentFolder>> = BTreeMap::new();
        for folder in folders {
            if let Some(parent) = folder.parent_id.filter(|p| by_id.contains_key(p)) {
                children.entry(parent).or_default().push(folder);
            }
        }
        for list in children.values_mut() {
            list.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));
        }

        Self { by_id, children }
    }

    pub fn contains(&self, folder_id: i64) -> bool {
        self.by_id.contains_key(&folder_id)
    }

    /// Folders from the root down to `folder_id`.
    ///
    /// A missing parent ends the chain; so does a parent already on it.
    pub fn chain(&self, folder_id: i64) -> Vec<&'a DocumentFolder> {
        let mut chain = Vec::new();
        let mut seen = HashSet::new();
        let mut current = self.by_id.get(&folder_id).copied();
        while let Some(folder) = current {
            if !seen.insert(folder.id) {
                break;
            }
            chain.push(folder);
            current = folder.parent_id.and_then(|p| self.by_id.get(&p).copied());
        }
        chain.reverse();
        chain
    }

    /// Folder names from the root down to `folder_id`.
    pub fn path(&self, folder_id: i64) -> Vec<&'a str> {
        self.chain(folder_id)
            .into_iter()
            .map(|folder| folder.name.as_str())
            .collect()
    }

    /// Folders that start a tree, sorted by (name, id).
    fn roots(&self) -> Vec<&'a DocumentFolder> {
        let mut roots: Vec<&DocumentFolder> = self
            .by_id
            .values()
            .copied()
            .filter(|f| f.parent_id.map_or(true, |p| !self.by_id.contains_key(&p)))
            .collect();
        sort_folders(&mut roots);
        roots
    }

    fn children(&self, folder_id: i64) -> &[&'a DocumentFolder] {
        self.children.get(&folder_id).map(Vec::as_slice).unwrap_or_default()
    }
}

fn sort_folders(folders: &mut [&DocumentFolder]) {
    folders.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));
}

/// Render the outline written to `hierarchy.txt`.
///
/// Folders appear depth-first by name with their documents (by title) one
/// level deeper. Documents with no folder, or whose folder no longer exists,
/// are listed under a trailing `[ROOT DOCUMENTS]` section.
pub fn build_hierarchy(folders: &[DocumentFolder], documents: &[Document]) -> String {
    let index = FolderIndex::new(folders);

    let mut docs_by_folder: HashMap<i64, Vec<&Document>> = HashMap::new();
    let mut root_docs = Vec::new();
    for document in documents {
        match document.folder_id.filter(|id| index.contains(*id)) {
            Some(folder_id) => docs_by_folder.entry(folder_id).or_default().push(document),
            None => root_docs.push(document),
        }
    }
    for list in docs_by_folder.values_mut() {
        sort_documents(list);
    }
    sort_documents(&mut root_docs);

    let rule = "=".repeat(RULE_WIDTH);
    let mut lines = vec![
        rule.clone(),
        "FILE AND FOLDER HIERARCHY".to_string(),
        rule,
        String::new(),
    ];

    let mut visited = HashSet::new();
    let mut outline = Outline {
        index: &index,
        docs_by_folder: &docs_by_folder,
        visited: &mut visited,
        lines: &mut lines,
    };
    for root in index.roots() {
        outline.folder(root, 0);
    }

    // Folders caught in a parent cycle have no root; start from each one
    // that is still unvisited.
    let mut orphans: Vec<&DocumentFolder> = folders
        .iter()
        .filter(|f| !outline.visited.contains(&f.id))
        .collect();
    sort_folders(&mut orphans);
    for folder in orphans {
        if !outline.visited.contains(&folder.id) {
            outline.folder(folder, 0);
        }
    }

    if !root_docs.is_empty() {
        lines.push(String::new());
        lines.push("[ROOT DOCUMENTS]".to_string());
        for document in root_docs {
            lines.push(format!("  [DOC] {}", document.title));
        }
    }

    lines.join("\n")
}

fn sort_documents(documents: &mut [&Document]) {
    documents.sort_by(|a, b| a.title.cmp(&b.title).then(a.id.cmp(&b.id)));
}

struct Outline<'o, 'a> {
    index: &'o FolderIndex<'a>,
    docs_by_folder: &'o HashMap<i64, Vec<&'a Document>>,
    visited: &'o mut HashSet<i64>,
    lines: &'o mut Vec<String>,
}

impl Outline<'_, '_> {
    fn folder(&mut self, folder: &DocumentFolder, depth: usize) {
        if !self.visited.insert(folder.id) {
            return;
        }

        let indent = "  ".repeat(depth);
        let path = self.index.path(folder.id).join("/");
        self.lines.push(format!("{indent}[FOLDER] {path}/"));

        if let Some(documents) = self.docs_by_folder.get(&folder.id) {
            for document in documents {
                self.lines.push(format!("{indent}  [DOC] {}", document.title));
            }
        }

        let index = self.index;
        for child in index.children(folder.id) {
            self.folder(child, depth + 1);
        }
    }
}
