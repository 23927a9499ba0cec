use std::path::Path;

pub mod error;

/// name of the reserved tag group every tag falls back to
pub static DEFAULT_GROUP_NAME: &str = "None";
/// color the reserved tag group is seeded with
pub static DEFAULT_GROUP_COLOR: &str = "#808080";

/// a named group of tags, mostly used to color related tags the same way.
/// Group names are unique; the reserved group named [`DEFAULT_GROUP_NAME`] always
/// exists and can never be deleted or renamed
#[derive(Debug, PartialEq, Eq, Hash, Clone)]
pub struct TagGroup {
    /// the display name of the group
    pub name: String,
    /// a `#RRGGBB` color string
    pub color: String,
}

impl TagGroup {
    pub fn new(name: impl Into<String>, color: impl Into<String>) -> TagGroup {
        TagGroup {
            name: name.into(),
            color: color.into(),
        }
    }

    /// the reserved group tags fall back to when none is specified
    pub fn default_group() -> TagGroup {
        TagGroup::new(DEFAULT_GROUP_NAME, DEFAULT_GROUP_COLOR)
    }
}

/// a tag as it exists on a file, or in the tag catalog (where `value` is always `None`).
///
/// The identity of a tag instance on a file is `(name, value)` - a bare tag and a
/// valued tag with the same name may coexist on one file, but the same pair can
/// exist on a file only once. `group` is display metadata and takes no part in
/// identity; `None` means the reserved default group
#[derive(Debug, PartialEq, Eq, Hash, Clone)]
pub struct Tag {
    pub name: String,
    pub value: Option<String>,
    pub group: Option<TagGroup>,
}

impl Tag {
    pub fn new(name: impl Into<String>, value: Option<String>) -> Tag {
        Tag {
            name: name.into(),
            value,
            group: None,
        }
    }

    /// whether `other` refers to the same tag instance on a file
    pub fn same_instance(&self, other: &Tag) -> bool {
        self.name == other.name && self.value == other.value
    }
}

/// a file with a persisted row in the store
#[derive(Debug, PartialEq, Clone)]
pub struct TrackedFile {
    /// absolute path on disk; unique across the whole store
    pub path: String,
    /// the folder row this file belongs to
    pub folder_id: i64,
    /// path of the generated thumbnail, if one could be generated
    pub thumbnail: Option<String>,
    pub description: Option<String>,
    pub tags: Vec<Tag>,
}

impl TrackedFile {
    /// the file's name, derived from the last component of its path
    pub fn name(&self) -> String {
        Path::new(&self.path)
            .file_name()
            .map(|name| name.to_string_lossy().to_string())
            .unwrap_or_default()
    }
}

/// a file seen via filesystem listing only; it carries no persisted metadata
#[derive(Debug, PartialEq, Eq, Hash, Clone)]
pub struct UntrackedFile {
    pub path: String,
    pub name: String,
}

/// a row in the Folder table
#[derive(Debug, PartialEq, Clone)]
pub struct FolderRecord {
    pub id: i64,
    pub path: String,
}

#[cfg(test)]
mod tracked_file_tests {
    use super::TrackedFile;

    #[test]
    fn name_is_last_path_component() {
        let file = TrackedFile {
            path: "/photos/vacation/beach.png".to_string(),
            folder_id: 1,
            thumbnail: None,
            description: None,
            tags: Vec::new(),
        };
        assert_eq!("beach.png", file.name());
    }
}
