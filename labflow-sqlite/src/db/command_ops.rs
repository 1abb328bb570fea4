// src/db/command_ops.rs

use diesel::prelude::*;
use diesel::result::QueryResult;
use crate::models::command::{Command, NewCommand};
use crate::schema::commands;
use crate::CommandId;

pub fn create_command(
    conn: &mut SqliteConnection,
    name: &str,
    description: &str,
    script: &str,
    outputs: &str,
) -> QueryResult<Command> {
    let new_c = NewCommand {
        name,
        description,
        script,
        outputs,
        created: crate::now(),
    };
    diesel::insert_into(commands::table)
        .values(&new_c)
        .execute(conn)?;

    commands::table
        .order(commands::id.desc())
        .first(conn)
}

pub fn get_command_by_id(conn: &mut SqliteConnection, command_id: CommandId) -> QueryResult<Command> {
    commands::table.find(command_id).first(conn)
}

pub fn find_command(conn: &mut SqliteConnection, command_id: CommandId) -> QueryResult<Option<Command>> {
    commands::table.find(command_id).first(conn).optional()
}

pub fn find_command_by_name(conn: &mut SqliteConnection, name: &str) -> QueryResult<Option<Command>> {
    commands::table
        .filter(commands::name.eq(name))
        .first(conn)
        .optional()
}

pub fn list_commands(conn: &mut SqliteConnection) -> QueryResult<Vec<Command>> {
    commands::table
        .order(commands::name.asc())
        .load(conn)
}
