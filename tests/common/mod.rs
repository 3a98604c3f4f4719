//! Shared helpers for building temporary data directories.

#![allow(dead_code)]

use std::fmt::Write as _;
use std::fs;
use std::path::Path;

use tempfile::TempDir;

use flatbase::auth::hash_password;
use flatbase::store::{Resource, Value};

/// Schema rows for a `books` collection plus the `_users` and
/// `_permissions` system collections, in `_schemas.csv` column order.
pub const SCHEMAS_CSV: &str = "\
s01,1,books,_id,text,0,0,
s02,1,books,_v,number,1,0,
s03,1,books,title,text,0,0,^.+$
s04,1,books,author,text,0,0,
s05,1,books,year,number,0,2100,
s06,1,books,genres,list,0,0,
s07,1,books,owner,text,0,0,
s08,1,books,admins,list,0,0,
s11,1,_users,_id,text,0,0,
s12,1,_users,_v,number,1,0,
s13,1,_users,salt,text,0,0,
s14,1,_users,password,text,0,0,
s15,1,_users,roles,list,0,0,
s21,1,_permissions,_id,text,0,0,
s22,1,_permissions,_v,number,1,0,
s23,1,_permissions,resource,text,0,0,
s24,1,_permissions,action,text,0,0,
s25,1,_permissions,field,text,0,0,
s26,1,_permissions,role,text,0,0,
";

/// Default permission rules: anyone may read books, editors may create, the
/// row's `owner` text field or `admins` list field grants update, and the
/// `admin` role grants everything.
pub const PERMISSIONS_CSV: &str = "\
p1,1,books,read,,
p2,1,books,create,,editor
p3,1,books,update,owner,
p4,1,books,update,admins,
p5,1,books,*,,admin
";

/// Seed books: `book1` owned by bob with alice in `admins`, `book2` with no
/// ownership fields set.
pub const BOOKS_CSV: &str = "\
book1,1,Test Book,Someone,2020,sci-fi,bob,alice
book2,1,1984,George Orwell,1949,,,
";

/// A `_users.csv` body for `(name, password, comma-joined roles)` triples,
/// hashing each password with a fixed per-user salt.
pub fn users_csv(users: &[(&str, &str, &str)]) -> String {
    let mut out = String::new();
    for (name, password, roles) in users {
        let salt = format!("{name}-salt");
        let hash = hash_password(password, &salt);
        let _ = writeln!(out, "{name},1,{salt},{hash},\"{roles}\"");
    }
    out
}

/// Standard test accounts: alice (editor), bob (no roles), admin (admin).
pub fn default_users_csv() -> String {
    users_csv(&[
        ("alice", "alicepass", "editor"),
        ("bob", "bobpass", ""),
        ("admin", "admin123", "admin"),
    ])
}

/// Write one collection file into the data directory.
pub fn write_collection(dir: &Path, name: &str, content: &str) {
    fs::write(dir.join(format!("{name}.csv")), content).unwrap();
}

/// A data directory with the default schemas, users, permissions and books.
pub fn fixture_dir() -> TempDir {
    let dir = TempDir::new().unwrap();
    write_collection(dir.path(), "_schemas", SCHEMAS_CSV);
    write_collection(dir.path(), "_users", &default_users_csv());
    write_collection(dir.path(), "_permissions", PERMISSIONS_CSV);
    write_collection(dir.path(), "books", BOOKS_CSV);
    dir
}

/// Build a resource from field/value pairs.
pub fn resource(fields: &[(&str, Value)]) -> Resource {
    fields
        .iter()
        .map(|(k, v)| (k.to_string(), v.clone()))
        .collect()
}
