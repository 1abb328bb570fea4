// src/db/user_ops.rs

use diesel::prelude::*;
use diesel::result::QueryResult;
use crate::models::user::{NewUser, User};
use crate::schema::users;
use crate::UserId;

pub fn create_user(conn: &mut SqliteConnection, username: &str, email: &str) -> QueryResult<User> {
    let new_u = NewUser {
        username,
        email,
        created: crate::now(),
    };
    diesel::insert_into(users::table)
        .values(&new_u)
        .execute(conn)?;

    users::table
        .order(users::id.desc())
        .first(conn)
}

pub fn get_user_by_id(conn: &mut SqliteConnection, user_id: UserId) -> QueryResult<User> {
    users::table.find(user_id).first(conn)
}

pub fn find_user(conn: &mut SqliteConnection, user_id: UserId) -> QueryResult<Option<User>> {
    users::table.find(user_id).first(conn).optional()
}

pub fn find_user_by_username(conn: &mut SqliteConnection, username: &str) -> QueryResult<Option<User>> {
    users::table
        .filter(users::username.eq(username))
        .first(conn)
        .optional()
}

pub fn list_users(conn: &mut SqliteConnection) -> QueryResult<Vec<User>> {
    users::table
        .order(users::username.asc())
        .load(conn)
}
