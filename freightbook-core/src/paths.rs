//! Document paths for the shipment store.
//!
//! ```text
//! daily_ships/{date}                              DailyIndex
//! daily_ships/{date}/ships/{shipId}               Shipment header
//! daily_ships/{date}/ships/{shipId}/items/{id}    LineItem
//! daily_ships/{date}/ships/{shipId}/comments/{id} Comment
//! users/{uid}                                     UserProfile
//! credentials/{email}                             Credential
//! ```
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::date::DayKey;
use crate::error::{FreightError, Result};

pub const DAILY_SHIPS: &str = "daily_ships";
pub const USERS: &str = "users";
pub const CREDENTIALS: &str = "credentials";

#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DocPath(String);

#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CollectionPath(String);

fn segment(s: &str) -> Result<&str> {
    if s.is_empty() || s.contains('/') || s.trim() != s {
        return Err(FreightError::ValidationFailure(format!(
            "`{s}` is not a valid identifier"
        )));
    }
    Ok(s)
}

impl CollectionPath {
    pub fn root(name: &str) -> Result<Self> {
        Ok(Self(segment(name)?.to_string()))
    }

    pub fn doc(&self, id: &str) -> Result<DocPath> {
        Ok(DocPath(format!("{}/{}", self.0, segment(id)?)))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl DocPath {
    pub fn collection(&self, name: &str) -> Result<CollectionPath> {
        Ok(CollectionPath(format!("{}/{}", self.0, segment(name)?)))
    }

    /// Last segment of the path.
    pub fn id(&self) -> &str {
        self.0.rsplit('/').next().unwrap_or(&self.0)
    }

    pub fn parent(&self) -> CollectionPath {
        match self.0.rsplit_once('/') {
            Some((parent, _)) => CollectionPath(parent.to_string()),
            None => CollectionPath(String::new()),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DocPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Display for CollectionPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

pub fn daily_ships() -> CollectionPath {
    CollectionPath(DAILY_SHIPS.to_string())
}

pub fn daily_index(date: &DayKey) -> DocPath {
    DocPath(format!("{DAILY_SHIPS}/{date}"))
}

pub fn ship(date: &DayKey, ship_id: &str) -> Result<DocPath> {
    daily_index(date).collection("ships")?.doc(ship_id)
}

pub fn items(date: &DayKey, ship_id: &str) -> Result<CollectionPath> {
    ship(date, ship_id)?.collection("items")
}

pub fn item(date: &DayKey, ship_id: &str, item_id: &str) -> Result<DocPath> {
    items(date, ship_id)?.doc(item_id)
}

pub fn comments(date: &DayKey, ship_id: &str) -> Result<CollectionPath> {
    ship(date, ship_id)?.collection("comments")
}

pub fn comment(date: &DayKey, ship_id: &str, comment_id: &str) -> Result<DocPath> {
    comments(date, ship_id)?.doc(comment_id)
}

pub fn user(uid: &str) -> Result<DocPath> {
    CollectionPath(USERS.to_string()).doc(uid)
}

pub fn users() -> CollectionPath {
    CollectionPath(USERS.to_string())
}

pub fn credential(email: &str) -> Result<DocPath> {
    CollectionPath(CREDENTIALS.to_string()).doc(email)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_nested_paths() {
        let d: DayKey = "2024-03-05".parse().unwrap();
        let p = item(&d, "SHIP1", "abc").unwrap();
        assert_eq!(p.as_str(), "daily_ships/2024-03-05/ships/SHIP1/items/abc");
        assert_eq!(p.id(), "abc");
        assert_eq!(
            p.parent().as_str(),
            "daily_ships/2024-03-05/ships/SHIP1/items"
        );
    }

    #[test]
    fn rejects_slashes_and_blanks() {
        let d: DayKey = "2024-03-05".parse().unwrap();
        assert!(ship(&d, "A/B").is_err());
        assert!(ship(&d, "").is_err());
        assert!(ship(&d, " SHIP1").is_err());
    }
}
