use rusqlite::{params, Connection};

use crate::model::{Tag, TagGroup, DEFAULT_GROUP_NAME};
use crate::repository::text_array;

/// upserts the tag row for `tag.name`, attached to its group by name. A missing
/// or unspecified group falls back to the reserved default group
pub fn create_tag(tag: &Tag, con: &Connection) -> Result<(), rusqlite::Error> {
    let group_name = tag
        .group
        .as_ref()
        .map(|group| group.name.as_str())
        .unwrap_or(DEFAULT_GROUP_NAME);
    let mut pst = con.prepare(include_str!("../assets/queries/tag/create_tag.sql"))?;
    pst.execute(params![tag.name, group_name])?;
    Ok(())
}

/// Upserts one file association for the `(name, value)` pair.
///
/// The statement compares `tag_value` with `is`, because sqlite's unique
/// constraint treats null values as distinct and would otherwise let a bare
/// tag onto the same file twice.
pub fn add_tag_to_file(path: &str, tag: &Tag, con: &Connection) -> Result<(), rusqlite::Error> {
    let mut pst = con.prepare(include_str!("../assets/queries/tag/add_tag_to_file.sql"))?;
    pst.execute(params![path, tag.name, tag.value])?;
    Ok(())
}

/// removes the `(name, value)` association from every file whose path appears in `paths`
pub fn remove_tag_from_files(
    tag: &Tag,
    paths: &[String],
    con: &Connection,
) -> Result<(), rusqlite::Error> {
    let mut pst = con.prepare(include_str!(
        "../assets/queries/tag/remove_tag_from_files.sql"
    ))?;
    pst.execute(params![tag.name, tag.value, text_array(paths)])?;
    Ok(())
}

/// deletes every tag with zero file associations left
pub fn delete_unused_tags(con: &Connection) -> Result<(), rusqlite::Error> {
    let mut pst = con.prepare(include_str!(
        "../assets/queries/tag/delete_unused_tags.sql"
    ))?;
    pst.execute([])?;
    Ok(())
}

/// the full tag catalog; catalog tags carry no value
pub fn get_all_tags(con: &Connection) -> Result<Vec<Tag>, rusqlite::Error> {
    let mut pst = con.prepare(include_str!("../assets/queries/tag/get_all_tags.sql"))?;
    let rows = pst.query_map([], |row| {
        Ok(Tag {
            name: row.get(0)?,
            value: None,
            group: Some(TagGroup {
                name: row.get(1)?,
                color: row.get(2)?,
            }),
        })
    })?;
    rows.collect()
}

/// insert-or-ignore by name; returns whether a row was actually inserted
pub fn create_tag_group(group: &TagGroup, con: &Connection) -> Result<bool, rusqlite::Error> {
    let mut pst = con.prepare(include_str!("../assets/queries/tag/create_tag_group.sql"))?;
    let inserted = pst.execute(params![group.name, group.color])?;
    Ok(inserted > 0)
}

/// renames/recolors the row currently named `original_name`; returns whether such a row existed
pub fn update_tag_group(
    original_name: &str,
    updated: &TagGroup,
    con: &Connection,
) -> Result<bool, rusqlite::Error> {
    let mut pst = con.prepare(include_str!("../assets/queries/tag/update_tag_group.sql"))?;
    let updated_rows = pst.execute(params![updated.name, updated.color, original_name])?;
    Ok(updated_rows > 0)
}

pub fn get_tag_groups(con: &Connection) -> Result<Vec<TagGroup>, rusqlite::Error> {
    let mut pst = con.prepare(include_str!("../assets/queries/tag/get_tag_groups.sql"))?;
    let rows = pst.query_map([], |row| {
        Ok(TagGroup {
            name: row.get(0)?,
            color: row.get(1)?,
        })
    })?;
    rows.collect()
}
