use rusqlite::{params, Connection};

use crate::model::FolderRecord;
use crate::repository::{id_array, text_array};

/// creates a folder record and returns its generated id. This does not check
/// whether the path is already tracked; the unique constraint does
pub fn create_folder(path: &str, con: &Connection) -> Result<i64, rusqlite::Error> {
    let mut pst = con.prepare(include_str!("../assets/queries/folder/create_folder.sql"))?;
    pst.insert(params![path])
}

/// returns the folder rows whose paths appear in `paths`; unknown paths simply yield no row
pub fn get_folders_by_paths(
    paths: &[String],
    con: &Connection,
) -> Result<Vec<FolderRecord>, rusqlite::Error> {
    let mut pst = con.prepare(include_str!(
        "../assets/queries/folder/get_folders_by_paths.sql"
    ))?;
    let rows = pst.query_map(params![text_array(paths)], map_folder)?;
    rows.collect()
}

pub fn delete_folders_by_ids(ids: &[i64], con: &Connection) -> Result<(), rusqlite::Error> {
    let mut pst = con.prepare(include_str!(
        "../assets/queries/folder/delete_folders_by_ids.sql"
    ))?;
    pst.execute(params![id_array(ids)])?;
    Ok(())
}

pub fn get_all_folders(con: &Connection) -> Result<Vec<FolderRecord>, rusqlite::Error> {
    let mut pst = con.prepare(include_str!(
        "../assets/queries/folder/get_all_folders.sql"
    ))?;
    let rows = pst.query_map([], map_folder)?;
    rows.collect()
}

fn map_folder(row: &rusqlite::Row) -> Result<FolderRecord, rusqlite::Error> {
    Ok(FolderRecord {
        id: row.get(0)?,
        path: row.get(1)?,
    })
}
