use alloc::{string::String, vec::Vec};

/// A canonical absolute path: starts with `'/'`, contains no `"."`, `".."`
/// or repeated slashes. A trailing `'/'` is preserved, because it changes
/// the meaning of the final component (it must then be a directory).
///
/// The parent of the root directory `"/"` is the root itself, so
/// `"/../../.."` collapses to `"/"`.
#[derive(Debug, Clone, Eq, PartialEq, PartialOrd, Ord)]
pub struct Path(String);

impl Path {
    /// Creates a new canonical path. A relative input is taken to be
    /// relative to the root.
    pub fn new(path: &str) -> Self {
        let mut new_path = Self(if path.starts_with('/') {
            String::from(path)
        } else {
            String::from("/") + path
        });
        new_path.canonicalize();
        new_path
    }

    /// Creates a root path.
    pub fn root() -> Self {
        Self::new("/")
    }

    /// Joins `rel` onto `base`; an absolute `rel` replaces `base` entirely.
    pub fn concat(base: &Path, rel: &str) -> Self {
        if rel.starts_with('/') {
            Self::new(rel)
        } else {
            let mut s = String::from(base.as_str());
            if !s.ends_with('/') {
                s.push('/');
            }
            s += rel;
            let mut p = Self(s);
            p.canonicalize();
            p
        }
    }

    /// Extracts a string slice containing the entire `Path`.
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }

    /// Is this the root path?
    pub fn is_root(&self) -> bool {
        self.0.len() == 1
    }

    /// Did the original path name a directory (trailing `'/'`)?
    pub fn has_trailing_slash(&self) -> bool {
        !self.is_root() && self.0.ends_with('/')
    }

    /// Rebuilds the string from the folded components, keeping a trailing
    /// slash if one was present.
    fn canonicalize(&mut self) {
        let trailing = self.0.len() > 1 && self.0.ends_with('/');
        let mut s = self
            .components()
            .iter()
            .fold(String::new(), |path, &item| path + "/" + item);
        if s.is_empty() {
            s.push('/');
        } else if trailing {
            s.push('/');
        }
        self.0 = s;
    }

    /// Splits the path into components, folding `"."` and `".."` away.
    pub fn components(&self) -> Vec<&str> {
        self.0.split('/').fold(Vec::with_capacity(8), |mut v, s| {
            match s {
                "" | "." => {}
                ".." => {
                    // The parent of "/" is "/" itself.
                    v.pop();
                }
                _ => v.push(s),
            }
            v
        })
    }

    /// Gets the last component, if any.
    pub fn last(&self) -> Option<&str> {
        self.components().pop()
    }

    /// The path without its last component ("/" stays "/").
    pub fn parent(&self) -> Path {
        let mut comps = self.components();
        comps.pop();
        let mut s = comps
            .iter()
            .fold(String::new(), |path, &item| path + "/" + item);
        if s.is_empty() {
            s.push('/');
        }
        Self(s)
    }
}

impl From<String> for Path {
    fn from(value: String) -> Self {
        Self::new(&value)
    }
}

impl core::fmt::Display for Path {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}
