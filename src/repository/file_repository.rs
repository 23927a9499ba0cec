use std::collections::HashMap;

use rusqlite::{params, Connection, Rows};

use crate::model::{Tag, TagGroup, TrackedFile};
use crate::repository::text_array;

pub fn create_file(
    path: &str,
    folder_id: i64,
    thumbnail: Option<&str>,
    con: &Connection,
) -> Result<(), rusqlite::Error> {
    let mut pst = con.prepare(include_str!("../assets/queries/file/create_file.sql"))?;
    pst.execute(params![path, folder_id, thumbnail])?;
    Ok(())
}

/// returns the number of rows the update touched, which is 0 for an unknown path
pub fn update_description(
    description: &str,
    path: &str,
    con: &Connection,
) -> Result<usize, rusqlite::Error> {
    let mut pst = con.prepare(include_str!(
        "../assets/queries/file/update_description.sql"
    ))?;
    pst.execute(params![description, path])
}

/// reads a single file's projection without its tag set
pub fn get_file_by_path(
    path: &str,
    con: &Connection,
) -> Result<Option<TrackedFile>, rusqlite::Error> {
    let mut pst = con.prepare(include_str!("../assets/queries/file/get_file_by_path.sql"))?;
    match pst.query_row(params![path], map_file) {
        Ok(file) => Ok(Some(file)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e),
    }
}

/// Retrieves every file (optionally limited to `folders`) with its full tag set.
///
/// The join yields one flat row per `(file, tag)` pair which has to be folded
/// client-side: a file with N tags arrives as N rows collapsing into one record,
/// and a file with zero tags arrives as a single row with null tag columns that
/// must not become a phantom empty tag.
pub fn get_files_with_tags(
    folders: &[String],
    con: &Connection,
) -> Result<Vec<TrackedFile>, rusqlite::Error> {
    let mut pst = if folders.is_empty() {
        con.prepare(include_str!(
            "../assets/queries/file/get_files_with_tags.sql"
        ))?
    } else {
        con.prepare(include_str!(
            "../assets/queries/file/get_files_with_tags_in_folders.sql"
        ))?
    };
    let rows = if folders.is_empty() {
        pst.query([])?
    } else {
        pst.query(params![text_array(folders)])?
    };
    fold_file_rows(rows)
}

fn fold_file_rows(mut rows: Rows) -> Result<Vec<TrackedFile>, rusqlite::Error> {
    let mut files: Vec<TrackedFile> = Vec::new();
    let mut index_by_path: HashMap<String, usize> = HashMap::new();
    while let Some(row) = rows.next()? {
        let path: String = row.get(0)?;
        let index = match index_by_path.get(&path) {
            Some(index) => *index,
            None => {
                files.push(TrackedFile {
                    path: path.clone(),
                    folder_id: row.get(1)?,
                    thumbnail: row.get(2)?,
                    description: row.get(3)?,
                    tags: Vec::new(),
                });
                index_by_path.insert(path, files.len() - 1);
                files.len() - 1
            }
        };
        let tag_name: Option<String> = row.get(4)?;
        if let Some(name) = tag_name {
            files[index].tags.push(Tag {
                name,
                value: row.get(5)?,
                group: Some(TagGroup {
                    name: row.get(6)?,
                    color: row.get(7)?,
                }),
            });
        }
    }
    Ok(files)
}

fn map_file(row: &rusqlite::Row) -> Result<TrackedFile, rusqlite::Error> {
    Ok(TrackedFile {
        path: row.get(0)?,
        folder_id: row.get(1)?,
        thumbnail: row.get(2)?,
        description: row.get(3)?,
        tags: Vec::new(),
    })
}

#[cfg(test)]
mod file_repository_tests {
    use super::*;
    use crate::model::{Tag, DEFAULT_GROUP_NAME};
    use crate::repository::{folder_repository, tag_repository};
    use crate::test::open_memory_connection;

    #[test]
    fn files_with_several_tags_fold_into_one_record() {
        let con = open_memory_connection();
        let folder_id = folder_repository::create_folder("/photos", &con).unwrap();
        create_file("/photos/a.png", folder_id, None, &con).unwrap();
        let rating = Tag::new("rating", Some("5".to_string()));
        let favorite = Tag::new("favorite", None);
        tag_repository::create_tag(&rating, &con).unwrap();
        tag_repository::create_tag(&favorite, &con).unwrap();
        tag_repository::add_tag_to_file("/photos/a.png", &rating, &con).unwrap();
        tag_repository::add_tag_to_file("/photos/a.png", &favorite, &con).unwrap();

        let files = get_files_with_tags(&[], &con).unwrap();
        assert_eq!(1, files.len());
        let file = &files[0];
        assert_eq!("/photos/a.png", file.path);
        assert_eq!(2, file.tags.len());
        let group_names: Vec<&str> = file
            .tags
            .iter()
            .map(|tag| tag.group.as_ref().unwrap().name.as_str())
            .collect();
        assert_eq!(vec![DEFAULT_GROUP_NAME, DEFAULT_GROUP_NAME], group_names);
    }

    #[test]
    fn zero_tag_files_do_not_grow_a_phantom_tag() {
        let con = open_memory_connection();
        let folder_id = folder_repository::create_folder("/photos", &con).unwrap();
        create_file("/photos/b.txt", folder_id, None, &con).unwrap();
        let files = get_files_with_tags(&[], &con).unwrap();
        assert_eq!(1, files.len());
        assert!(files[0].tags.is_empty());
    }

    #[test]
    fn folder_filter_limits_the_result() {
        let con = open_memory_connection();
        let photos = folder_repository::create_folder("/photos", &con).unwrap();
        let music = folder_repository::create_folder("/music", &con).unwrap();
        create_file("/photos/a.png", photos, None, &con).unwrap();
        create_file("/music/song.mp3", music, None, &con).unwrap();
        let files = get_files_with_tags(&["/photos".to_string()], &con).unwrap();
        assert_eq!(1, files.len());
        assert_eq!("/photos/a.png", files[0].path);
    }

    #[test]
    fn update_description_reports_unknown_paths() {
        let con = open_memory_connection();
        let folder_id = folder_repository::create_folder("/photos", &con).unwrap();
        create_file("/photos/a.png", folder_id, None, &con).unwrap();
        assert_eq!(1, update_description("a beach", "/photos/a.png", &con).unwrap());
        assert_eq!(0, update_description("nope", "/photos/missing.png", &con).unwrap());
        let file = get_file_by_path("/photos/a.png", &con).unwrap().unwrap();
        assert_eq!(Some("a beach".to_string()), file.description);
        assert_eq!(None, get_file_by_path("/photos/missing.png", &con).unwrap());
    }
}
