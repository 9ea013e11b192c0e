//! Tree walking context
//!
//! In-process reads of a revision's tree straight from the object database.

use gix::prelude::{Find, FindExt};
use gix::ObjectId;

use crate::error::{MetricsError, Result};
use crate::util::GlobMatcher;

/// Reads one revision's tree
pub struct TreeWalker<'a, S: Find> {
    odb: &'a S,
    revision: &'a str,
    /// Decode buffers handed back after each object read
    spare: Vec<Vec<u8>>,
}

impl<'a, S: Find> TreeWalker<'a, S> {
    pub fn new(odb: &'a S, revision: &'a str) -> Self {
        Self {
            odb,
            revision,
            spare: Vec::new(),
        }
    }

    fn take_buf(&mut self) -> Vec<u8> {
        self.spare.pop().unwrap_or_else(|| Vec::with_capacity(8 * 1024))
    }

    fn return_buf(&mut self, mut buf: Vec<u8>) {
        buf.clear();
        self.spare.push(buf);
    }

    /// Root tree of the walker's revision
    pub fn root_tree(&mut self) -> Result<ObjectId> {
        let commit_oid = ObjectId::from_hex(self.revision.as_bytes())
            .map_err(|e| MetricsError::lookup(self.revision, e))?;
        let mut buf = self.take_buf();
        let tree = self
            .odb
            .find_commit(&commit_oid, &mut buf)
            .map(|commit| commit.tree())
            .map_err(|e| MetricsError::lookup(self.revision, e));
        self.return_buf(buf);
        tree
    }

    /// Every file path (blobs and symlinks) under the revision accepted by `matcher`
    pub fn collect_files(&mut self, matcher: &GlobMatcher) -> Result<Vec<String>> {
        let root = self.root_tree()?;
        let mut out = Vec::new();
        let mut path = Vec::with_capacity(256);
        self.walk_tree(root, &mut path, matcher, &mut out)?;
        out.sort();
        Ok(out)
    }

    fn walk_tree(
        &mut self,
        tree_oid: ObjectId,
        path: &mut Vec<u8>,
        matcher: &GlobMatcher,
        out: &mut Vec<String>,
    ) -> Result<()> {
        let mut buf = self.take_buf();
        let tree = match self.odb.find_tree(&tree_oid, &mut buf) {
            Ok(t) => t,
            Err(e) => {
                self.return_buf(buf);
                return Err(MetricsError::lookup(self.revision, e));
            }
        };

        // Entries are copied out so the buffer is free before recursing
        let entries: Vec<(Vec<u8>, ObjectId, bool, bool)> = tree
            .entries
            .iter()
            .map(|entry| {
                let name: &[u8] = entry.filename.as_ref();
                (
                    name.to_vec(),
                    entry.oid.to_owned(),
                    entry.mode.is_tree(),
                    is_file(entry.mode),
                )
            })
            .collect();
        self.return_buf(buf);

        let base_len = path.len();
        for (name, oid, is_tree, is_file) in entries {
            if !path.is_empty() {
                path.push(b'/');
            }
            path.extend_from_slice(&name);

            if is_tree {
                self.walk_tree(oid, path, matcher, out)?;
            } else if is_file {
                let file = String::from_utf8_lossy(path);
                if matcher.is_match(&file) {
                    out.push(file.into_owned());
                }
            }

            path.truncate(base_len);
        }
        Ok(())
    }

    /// Object id of the file at `path`; `None` when the revision has no such file
    pub fn resolve_file(&mut self, path: &str) -> Result<Option<ObjectId>> {
        let mut current = self.root_tree()?;
        let mut components = path.split('/').filter(|c| !c.is_empty()).peekable();

        while let Some(component) = components.next() {
            let is_last = components.peek().is_none();
            let mut buf = self.take_buf();
            let found = match self.odb.find_tree(&current, &mut buf) {
                Ok(tree) => tree
                    .entries
                    .iter()
                    .find(|entry| {
                        let name: &[u8] = entry.filename.as_ref();
                        name == component.as_bytes()
                    })
                    .map(|entry| (entry.oid.to_owned(), entry.mode.is_tree(), is_file(entry.mode))),
                Err(e) => {
                    self.return_buf(buf);
                    return Err(MetricsError::lookup(self.revision, e));
                }
            };
            self.return_buf(buf);

            match found {
                Some((oid, _, true)) if is_last => return Ok(Some(oid)),
                Some((oid, true, _)) if !is_last => current = oid,
                _ => return Ok(None),
            }
        }
        Ok(None)
    }

    /// Whether the blob `oid` contains `phrase`
    pub fn blob_contains(&mut self, oid: ObjectId, phrase: &str) -> Result<bool> {
        use gix::bstr::ByteSlice;

        let mut buf = self.take_buf();
        let result = self
            .odb
            .find_blob(&oid, &mut buf)
            .map(|blob| blob.data.contains_str(phrase))
            .map_err(|e| MetricsError::lookup(self.revision, e));
        self.return_buf(buf);
        result
    }
}

/// Regular files, executables and symlinks; submodules are not files
fn is_file(mode: gix::objs::tree::EntryMode) -> bool {
    !mode.is_tree() && !mode.is_commit()
}
