//! Step identity to relative image path

use std::path::PathBuf;

use crate::identity::{StepIdentity, Viewport};

/// Default image extension for captured screenshots
pub const DEFAULT_EXTENSION: &str = "png";

/// Stands in for a feature or scenario title with nothing left after sanitizing
pub const EMPTY_COMPONENT: &str = "_";

/// Renders a [`StepIdentity`] into a filesystem-safe relative path.
///
/// Layout: `<feature>/<scenario>/<index>-<step>.<ext>`, or
/// `<feature>/<scenario>/<index>-<step>/<width>x<height>.<ext>` when a
/// viewport is known. Output depends only on the identity and the namer's
/// settings, so it is stable across processes and runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathNamer {
    viewport: Option<Viewport>,
    extension: String,
}

impl Default for PathNamer {
    fn default() -> Self {
        Self {
            viewport: None,
            extension: DEFAULT_EXTENSION.to_string(),
        }
    }
}

impl PathNamer {
    pub fn new(viewport: Option<Viewport>, extension: impl Into<String>) -> Self {
        Self {
            viewport,
            extension: extension.into(),
        }
    }

    pub fn viewport(&self) -> Option<Viewport> {
        self.viewport
    }

    pub fn extension(&self) -> &str {
        &self.extension
    }

    /// Relative path for the given step
    pub fn name(&self, identity: &StepIdentity) -> PathBuf {
        let step = format!("{}-{}", identity.index, sanitize(&identity.text));

        let mut path = PathBuf::from(component(&identity.feature));
        path.push(component(&identity.scenario));

        match self.viewport {
            Some(viewport) => {
                path.push(step);
                path.push(format!("{}.{}", viewport, self.extension));
            }
            None => path.push(format!("{}.{}", step, self.extension)),
        }

        path
    }
}

/// Directory component for a title; never empty, so the tree depth is fixed
fn component(title: &str) -> String {
    let name = sanitize(title);
    if name.is_empty() {
        EMPTY_COMPONENT.to_string()
    } else {
        name
    }
}

/// Make a title safe for use as a single path component.
///
/// Drops every character that is not an ASCII letter or digit, underscore,
/// whitespace or hyphen, then replaces each maximal run of whitespace and
/// hyphens with one hyphen. Dropped characters do not interrupt a run.
pub fn sanitize(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut in_separator = false;

    for c in input.chars() {
        if c.is_ascii_alphanumeric() || c == '_' {
            out.push(c);
            in_separator = false;
        } else if is_separator(c) {
            if !in_separator {
                out.push('-');
                in_separator = true;
            }
        }
    }

    out
}

fn is_separator(c: char) -> bool {
    // \x0B is vertical tab, not covered by is_ascii_whitespace
    c == '-' || c == '\x0B' || c.is_ascii_whitespace()
}
