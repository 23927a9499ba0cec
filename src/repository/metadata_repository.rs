use rusqlite::Connection;

/// reads the schema version row. Errors when the metadata table does not exist
/// yet, which callers use to detect a brand-new database
pub fn get_version(con: &Connection) -> Result<String, rusqlite::Error> {
    let mut pst = con.prepare(include_str!(
        "../assets/queries/metadata/get_version.sql"
    ))?;
    pst.query_row([], |row| row.get(0))
}
