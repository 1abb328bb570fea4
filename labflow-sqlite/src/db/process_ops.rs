// src/db/process_ops.rs

use diesel::prelude::*;
use diesel::result::QueryResult;
use crate::models::process_record::{NewProcessRecord, ProcessRecord};
use crate::schema::process_records;
use crate::ExecutionId;

pub fn create_process_record(conn: &mut SqliteConnection, new_p: &NewProcessRecord) -> QueryResult<ProcessRecord> {
    diesel::insert_into(process_records::table)
        .values(new_p)
        .execute(conn)?;

    process_records::table
        .order(process_records::id.desc())
        .first(conn)
}

pub fn list_for_execution(conn: &mut SqliteConnection, execution_id: ExecutionId) -> QueryResult<Vec<ProcessRecord>> {
    process_records::table
        .filter(process_records::execution_id.eq(execution_id))
        .order(process_records::id.asc())
        .load(conn)
}
