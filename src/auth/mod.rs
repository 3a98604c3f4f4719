//! Credential verification and data-driven authorization.
//!
//! Users and permission rules are ordinary resources in the `_users` and
//! `_permissions` collections, stored in the same engine they protect.

pub mod session;

use data_encoding::BASE32;
use sha2::{Digest, Sha256};

use crate::store::{random_id, Error, Resource, Store, Value};

/// Base32 of SHA-256(salt ∥ password). Matching the stored `password` field
/// proves possession; the clear password is never stored.
pub fn hash_password(password: &str, salt: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(salt.as_bytes());
    hasher.update(password.as_bytes());
    BASE32.encode(&hasher.finalize())
}

/// Fresh per-user salt.
pub fn generate_salt() -> String {
    random_id()
}

impl Store {
    /// Verify a username/password pair against the `_users` collection.
    /// The user's `_id` is their name.
    pub fn authenticate(&self, username: &str, password: &str) -> Result<Resource, Error> {
        if username.is_empty() {
            return Err(Error::Unauthenticated);
        }
        let user = match self.get("_users", username) {
            Ok(Some(user)) => user,
            Ok(None) | Err(Error::NotFound) => return Err(Error::Unauthenticated),
            Err(e) => return Err(e),
        };
        let salt = user.get("salt").and_then(Value::as_text).unwrap_or("");
        let stored = user.get("password").and_then(Value::as_text).unwrap_or("");
        if stored == hash_password(password, salt) {
            Ok(user)
        } else {
            Err(Error::Unauthenticated)
        }
    }

    /// Check whether `user` may perform `action` on `collection`, optionally
    /// scoped to the row `id`.
    ///
    /// Rules are evaluated in storage order and the first grant wins. A rule
    /// matches when its `resource` equals the collection and its `action` is
    /// `*` or equals the requested action. A matching rule with empty
    /// `field` and `role` is public. Otherwise a user is required: the rule
    /// grants if its role is `*` or among the user's roles, or — when `id`
    /// is given — if the named field of that row equals or contains the
    /// user's name. Denial is [`Error::Unauthenticated`] when a matching
    /// rule needed a user and none was present, [`Error::Unauthorized`]
    /// otherwise.
    pub fn authorize(
        &self,
        collection: &str,
        id: Option<&str>,
        action: &str,
        user: Option<&Resource>,
    ) -> Result<(), Error> {
        let rules = self.list("_permissions", None)?;
        let mut user_required = false;
        for rule in &rules {
            let resource = rule.get("resource").and_then(Value::as_text).unwrap_or("");
            let rule_action = rule.get("action").and_then(Value::as_text).unwrap_or("");
            if resource != collection || (rule_action != "*" && rule_action != action) {
                continue;
            }
            let field = rule.get("field").and_then(Value::as_text).unwrap_or("");
            let role = rule.get("role").and_then(Value::as_text).unwrap_or("");
            if field.is_empty() && role.is_empty() {
                return Ok(()); // public
            }
            let Some(user) = user else {
                user_required = true;
                continue;
            };
            let username = user.get("_id").and_then(Value::as_text).unwrap_or("");
            let roles = user.get("roles").and_then(Value::as_list).unwrap_or(&[]);
            if role == "*" || roles.iter().any(|r| r.as_str() == role) {
                return Ok(());
            }
            if let Some(id) = id {
                let Some(row) = self.get(collection, id)? else {
                    continue;
                };
                match row.get(field) {
                    Some(Value::Text(owner)) if owner == username => return Ok(()),
                    Some(Value::List(owners))
                        if owners.iter().any(|o| o.as_str() == username) =>
                    {
                        return Ok(())
                    }
                    _ => {}
                }
            }
        }
        if user_required && user.is_none() {
            Err(Error::Unauthenticated)
        } else {
            Err(Error::Unauthorized)
        }
    }
}
