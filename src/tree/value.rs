//! Value objects for node names, materialized paths and MIME types.
//!
//! Every constructor validates its input, so an instance that exists is
//! always valid. Lengths are measured in bytes, since paths end up on a
//! filesystem.

use std::fmt;

use thiserror::Error;

/// Maximum length of a folder or file name (in bytes).
pub const MAX_NAME_LENGTH: usize = 128;

/// Maximum length of a materialized path (in bytes).
pub const MAX_PATH_LENGTH: usize = 255;

/// Maximum length of a MIME type (in bytes).
pub const MAX_MIME_TYPE_LENGTH: usize = 64;

/// Characters that may not appear in folder or file names, on top of
/// control characters.
pub const FORBIDDEN_NAME_CHARS: &[char] = &['\\', '/', ':', '*', '?', '"', '<', '>', '|'];

/// Path separator, also the root path.
pub const SEPARATOR: char = '/';

/// Validation errors for value objects.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// Name is empty.
    #[error("name cannot be empty")]
    NameEmpty,

    /// Name is `.` or `..`.
    #[error("name is reserved: {0}")]
    NameReserved(String),

    /// Name contains a forbidden character.
    #[error("name contains invalid characters: {0}")]
    NameInvalidChars(String),

    /// Name is too long.
    #[error("name must be at most {MAX_NAME_LENGTH} bytes")]
    NameTooLong,

    /// Path is too long.
    #[error("path must be at most {MAX_PATH_LENGTH} bytes")]
    PathTooLong,

    /// Path does not follow the materialized path convention.
    #[error("malformed path: {0}")]
    PathMalformed(String),

    /// MIME type is too long.
    #[error("MIME type must be at most {MAX_MIME_TYPE_LENGTH} bytes")]
    MimeTypeTooLong,

    /// MIME type has no `/`.
    #[error("malformed MIME type: {0}")]
    MimeTypeMalformed(String),
}

/// A folder or file name.
///
/// The same character rule applies to folders and files.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Name(String);

impl Name {
    /// Validate and wrap a name.
    pub fn new(name: impl Into<String>) -> Result<Self, ValidationError> {
        let name = name.into();
        if name.is_empty() {
            return Err(ValidationError::NameEmpty);
        }
        if name.len() > MAX_NAME_LENGTH {
            return Err(ValidationError::NameTooLong);
        }
        if name.contains(FORBIDDEN_NAME_CHARS) || name.chars().any(char::is_control) {
            return Err(ValidationError::NameInvalidChars(name));
        }
        if name == "." || name == ".." {
            return Err(ValidationError::NameReserved(name));
        }
        Ok(Self(name))
    }

    /// Get the name as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for Name {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl fmt::Display for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Name {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// A materialized path.
///
/// Folder paths start and end with `/` (the root is `/`); file paths start
/// with `/` and never end with one. The trailing `/` of folder paths is what
/// makes plain string-prefix matching equal to subtree membership: `/foo/`
/// is a prefix of `/foo/bar` but not of `/foobar/`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodePath(String);

impl NodePath {
    /// The root folder path.
    pub fn root() -> Self {
        Self(SEPARATOR.to_string())
    }

    /// Parse any path, folder or file, deciding by the trailing `/`.
    pub fn parse(path: impl Into<String>) -> Result<Self, ValidationError> {
        let path = path.into();
        if path.len() > MAX_PATH_LENGTH {
            return Err(ValidationError::PathTooLong);
        }
        if !path.starts_with(SEPARATOR) {
            return Err(ValidationError::PathMalformed(path));
        }
        if path.len() > 1 {
            let inner = path[1..].strip_suffix(SEPARATOR).unwrap_or(&path[1..]);
            for segment in inner.split(SEPARATOR) {
                Name::new(segment).map_err(|_| ValidationError::PathMalformed(path.clone()))?;
            }
        }
        Ok(Self(path))
    }

    /// Parse a path that must denote a folder.
    pub fn folder(path: impl Into<String>) -> Result<Self, ValidationError> {
        let path = Self::parse(path)?;
        if !path.is_folder() {
            return Err(ValidationError::PathMalformed(path.0));
        }
        Ok(path)
    }

    /// Parse a path that must denote a file.
    pub fn file(path: impl Into<String>) -> Result<Self, ValidationError> {
        let path = Self::parse(path)?;
        if path.is_folder() {
            return Err(ValidationError::PathMalformed(path.0));
        }
        Ok(path)
    }

    /// Whether this is a folder path.
    pub fn is_folder(&self) -> bool {
        self.0.ends_with(SEPARATOR)
    }

    /// Whether this is the root path.
    pub fn is_root(&self) -> bool {
        self.0.len() == 1
    }

    /// Get the path as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The last segment, without separators. Empty for the root.
    pub fn last_segment(&self) -> &str {
        let trimmed = self.0.trim_end_matches(SEPARATOR);
        match trimmed.rfind(SEPARATOR) {
            Some(idx) => &trimmed[idx + 1..],
            None => "",
        }
    }

    /// The folder path that contains this path. `None` for the root.
    pub fn parent(&self) -> Option<NodePath> {
        if self.is_root() {
            return None;
        }
        let trimmed = self.0.trim_end_matches(SEPARATOR);
        trimmed
            .rfind(SEPARATOR)
            .map(|idx| NodePath(trimmed[..=idx].to_string()))
    }

    /// Path of a child folder of this folder.
    pub fn child_folder(&self, name: &Name) -> Result<NodePath, ValidationError> {
        self.require_folder()?;
        Self::folder(format!("{}{}{}", self.0, name, SEPARATOR))
    }

    /// Path of a child file of this folder.
    pub fn child_file(&self, name: &Name) -> Result<NodePath, ValidationError> {
        self.require_folder()?;
        Self::file(format!("{}{}", self.0, name))
    }

    /// The same kind of path with its last segment replaced.
    pub fn with_name(&self, name: &Name) -> Result<NodePath, ValidationError> {
        let parent = self
            .parent()
            .ok_or_else(|| ValidationError::PathMalformed(self.0.clone()))?;
        if self.is_folder() {
            parent.child_folder(name)
        } else {
            parent.child_file(name)
        }
    }

    /// Whether `other` is this folder or lies anywhere below it.
    ///
    /// Always false for file paths.
    pub fn contains(&self, other: &NodePath) -> bool {
        self.is_folder() && other.0.starts_with(&self.0)
    }

    /// Replace the `old` folder prefix of this path with `new`.
    pub fn rebase(&self, old: &NodePath, new: &NodePath) -> Result<NodePath, ValidationError> {
        old.require_folder()?;
        new.require_folder()?;
        let rest = self
            .0
            .strip_prefix(&old.0)
            .ok_or_else(|| ValidationError::PathMalformed(self.0.clone()))?;
        Self::parse(format!("{}{}", new.0, rest))
    }

    /// Reject non-folder paths where a folder prefix key is required.
    pub fn require_folder(&self) -> Result<(), ValidationError> {
        if self.is_folder() {
            Ok(())
        } else {
            Err(ValidationError::PathMalformed(self.0.clone()))
        }
    }
}

impl TryFrom<String> for NodePath {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}

impl fmt::Display for NodePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for NodePath {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// A MIME type such as `text/plain; charset=utf-8`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MimeType(String);

impl MimeType {
    /// Validate and wrap a MIME type.
    pub fn new(mime_type: impl Into<String>) -> Result<Self, ValidationError> {
        let mime_type = mime_type.into();
        if mime_type.len() > MAX_MIME_TYPE_LENGTH {
            return Err(ValidationError::MimeTypeTooLong);
        }
        if !mime_type.contains('/') {
            return Err(ValidationError::MimeTypeMalformed(mime_type));
        }
        Ok(Self(mime_type))
    }

    /// Wrap one of the built-in MIME types known to be valid.
    pub(crate) fn from_static(mime_type: &'static str) -> Self {
        debug_assert!(Self::new(mime_type).is_ok(), "invalid MIME type {mime_type}");
        Self(mime_type.to_string())
    }

    /// Get the MIME type as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for MimeType {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl fmt::Display for MimeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
