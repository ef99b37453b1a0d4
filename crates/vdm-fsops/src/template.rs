//! Template tree traversal and placeholder substitution.
//!
//! A template root holds one top-level directory per collection system. The
//! walker turns one such subtree into an ordered, lazily produced sequence of
//! [`ProvisioningInstruction`]s: for every directory it visits it emits all
//! subdirectory instructions, then all file instructions, and only then
//! descends. A file's parent directory instruction therefore always precedes it.

use std::collections::VecDeque;
use std::fmt;
use std::path::{Path, PathBuf};

use tracing::debug;
use vdm_config::{CRUISE_PLACEHOLDER, CruiseContext, LOWERING_PLACEHOLDER};
use walkdir::WalkDir;

use crate::error::{FsOpsError, FsOpsResult};

const MAX_TEMPLATE_DEPTH: usize = 64;

/// Kind of entry a provisioning instruction creates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeKind {
    /// A directory.
    Directory,
    /// A file copied from the template tree.
    File,
}

/// A resolved, placeholder-free creation step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProvisioningInstruction {
    /// Destination relative to the transfer's source directory.
    pub destination: PathBuf,
    /// Whether a directory or a file is created.
    pub kind: NodeKind,
    /// Template file to copy; `None` for directories.
    pub template_path: Option<PathBuf>,
}

impl ProvisioningInstruction {
    fn directory(destination: PathBuf) -> Self {
        Self {
            destination,
            kind: NodeKind::Directory,
            template_path: None,
        }
    }

    fn file(destination: PathBuf, template_path: PathBuf) -> Self {
        Self {
            destination,
            kind: NodeKind::File,
            template_path: Some(template_path),
        }
    }
}

impl fmt::Display for ProvisioningInstruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            NodeKind::Directory => write!(f, "mkdir {}", self.destination.display()),
            NodeKind::File => write!(f, "put {}", self.destination.display()),
        }
    }
}

/// Identifier values substituted into template paths.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Substitutions {
    cruise_id: String,
    lowering_id: Option<String>,
}

impl Substitutions {
    /// Build the substitution map for a cruise context.
    #[must_use]
    pub fn new(context: &CruiseContext) -> Self {
        Self {
            cruise_id: context.cruise_id().to_string(),
            lowering_id: context.lowering_id().map(str::to_string),
        }
    }

    /// Substitute one path segment.
    ///
    /// Returns `None` when the segment needs a lowering identifier that is not
    /// available; callers skip such nodes together with their subtree.
    #[must_use]
    pub fn segment(&self, segment: &str) -> Option<String> {
        let substituted = segment.replace(CRUISE_PLACEHOLDER, &self.cruise_id);
        if !substituted.contains(LOWERING_PLACEHOLDER) {
            return Some(substituted);
        }
        self.lowering_id
            .as_deref()
            .map(|lowering| substituted.replace(LOWERING_PLACEHOLDER, lowering))
    }

    /// Substitute every placeholder in a path pattern such as a source directory.
    ///
    /// # Errors
    ///
    /// Returns [`FsOpsError::UnresolvedPlaceholder`] when the pattern needs a
    /// lowering identifier that is not available.
    pub fn resolve_pattern(&self, pattern: &str) -> FsOpsResult<String> {
        let substituted = pattern.replace(CRUISE_PLACEHOLDER, &self.cruise_id);
        match (&self.lowering_id, substituted.contains(LOWERING_PLACEHOLDER)) {
            (_, false) => Ok(substituted),
            (Some(lowering), true) => Ok(substituted.replace(LOWERING_PLACEHOLDER, lowering)),
            (None, true) => Err(FsOpsError::UnresolvedPlaceholder {
                placeholder: LOWERING_PLACEHOLDER,
                pattern: pattern.to_string(),
            }),
        }
    }
}

/// Locate the template subtree for a collection system, if one exists.
#[must_use]
pub fn template_subtree(template_root: &Path, system_name: &str) -> Option<PathBuf> {
    if system_name.is_empty() || system_name.contains(['/', '\\']) || system_name == ".." {
        return None;
    }
    let candidate = template_root.join(system_name);
    candidate.is_dir().then_some(candidate)
}

/// Walk the template subtree for `system_name`.
///
/// Yields nothing when the template root has no directory for the system.
#[must_use]
pub fn walk_template(
    template_root: &Path,
    system_name: &str,
    substitutions: Substitutions,
) -> TemplateWalk {
    let mut walk = TemplateWalk {
        substitutions,
        stack: Vec::new(),
        pending: VecDeque::new(),
    };
    if let Some(subtree) = template_subtree(template_root, system_name) {
        walk.stack.push(PendingDir {
            template_dir: subtree,
            destination: PathBuf::new(),
            depth: 0,
        });
    }
    walk
}

struct PendingDir {
    template_dir: PathBuf,
    destination: PathBuf,
    depth: usize,
}

/// Lazy, depth-first sequence of provisioning instructions.
pub struct TemplateWalk {
    substitutions: Substitutions,
    stack: Vec<PendingDir>,
    pending: VecDeque<FsOpsResult<ProvisioningInstruction>>,
}

impl TemplateWalk {
    fn expand(&mut self, dir: PendingDir) -> FsOpsResult<()> {
        if dir.depth >= MAX_TEMPLATE_DEPTH {
            return Err(FsOpsError::invalid_input(
                "template_dir",
                "too_deep",
                dir.template_dir.display().to_string(),
            ));
        }

        let mut subdirs = Vec::new();
        let mut files = Vec::new();
        let listing = WalkDir::new(&dir.template_dir)
            .min_depth(1)
            .max_depth(1)
            .follow_links(true)
            .sort_by_file_name();
        for entry in listing {
            let entry = entry.map_err(|source| {
                FsOpsError::walkdir("template.list", &dir.template_dir, source)
            })?;
            let name = entry.file_name().to_str().ok_or_else(|| {
                FsOpsError::invalid_input(
                    "template_entry",
                    "non_utf8_name",
                    entry.path().display().to_string(),
                )
            })?;
            let Some(resolved) = self.substitutions.segment(name) else {
                debug!(
                    template = %entry.path().display(),
                    "skipping lowering template node without a lowering context"
                );
                continue;
            };
            if resolved.contains(['/', '\\']) || resolved == ".." || resolved == "." {
                return Err(FsOpsError::invalid_input(
                    "template_entry",
                    "unsafe_segment",
                    resolved,
                ));
            }
            let destination = dir.destination.join(resolved);
            if entry.file_type().is_dir() {
                subdirs.push(PendingDir {
                    template_dir: entry.path().to_path_buf(),
                    destination,
                    depth: dir.depth + 1,
                });
            } else {
                files.push(ProvisioningInstruction::file(
                    destination,
                    entry.path().to_path_buf(),
                ));
            }
        }

        self.pending.extend(
            subdirs
                .iter()
                .map(|sub| Ok(ProvisioningInstruction::directory(sub.destination.clone()))),
        );
        self.pending.extend(files.into_iter().map(Ok));
        self.stack.extend(subdirs.into_iter().rev());
        Ok(())
    }
}

impl Iterator for TemplateWalk {
    type Item = FsOpsResult<ProvisioningInstruction>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(item) = self.pending.pop_front() {
                return Some(item);
            }
            let dir = self.stack.pop()?;
            if let Err(err) = self.expand(dir) {
                self.stack.clear();
                return Some(Err(err));
            }
        }
    }
}
