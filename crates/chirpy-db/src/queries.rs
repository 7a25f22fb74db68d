use chrono::Utc;

use crate::Database;
use crate::error::{Result, StoreError};
use crate::models::{Chirp, NewUser, RevokedToken, User, UserUpdate};

impl Database {
    // -- Chirps --

    pub fn create_chirp(&self, body: &str, author_id: u64) -> Result<Chirp> {
        self.with_doc_mut(|doc| {
            let chirp = Chirp {
                id: next_id(doc.chirps.iter().map(|c| c.id))?,
                author_id,
                body: body.to_string(),
            };
            doc.chirps.push(chirp.clone());
            Ok(chirp)
        })
    }

    /// Fails with `Empty` when there are no chirps at all, `NotFound` when
    /// there are chirps but none with this id.
    pub fn get_chirp(&self, id: u64) -> Result<Chirp> {
        self.with_doc(|doc| {
            chirps_or_empty(doc)?
                .iter()
                .find(|c| c.id == id)
                .cloned()
                .ok_or(StoreError::NotFound)
        })
    }

    /// All chirps in insertion order. Fails with `Empty` when there are none.
    pub fn list_chirps(&self) -> Result<Vec<Chirp>> {
        self.with_doc(|doc| Ok(chirps_or_empty(doc)?.to_vec()))
    }

    pub fn list_chirps_by_author(&self, author_id: u64) -> Result<Vec<Chirp>> {
        let chirps: Vec<Chirp> = self
            .list_chirps()?
            .into_iter()
            .filter(|c| c.author_id == author_id)
            .collect();
        if chirps.is_empty() {
            return Err(StoreError::Empty);
        }
        Ok(chirps)
    }

    pub fn delete_chirp(&self, id: u64) -> Result<()> {
        self.with_doc_mut(|doc| {
            let idx = doc
                .chirps
                .iter()
                .position(|c| c.id == id)
                .ok_or(StoreError::NotFound)?;
            doc.chirps.remove(idx);
            Ok(())
        })
    }

    /// Delete a chirp only if `author_id` wrote it. The ownership check and
    /// the removal happen in one transaction.
    pub fn delete_chirp_by_author(&self, id: u64, author_id: u64) -> Result<()> {
        self.with_doc_mut(|doc| {
            let idx = doc
                .chirps
                .iter()
                .position(|c| c.id == id)
                .ok_or(StoreError::NotFound)?;
            if doc.chirps[idx].author_id != author_id {
                return Err(StoreError::NotOwner);
            }
            doc.chirps.remove(idx);
            Ok(())
        })
    }

    // -- Users --

    pub fn create_user(&self, user: &NewUser) -> Result<User> {
        self.with_doc_mut(|doc| {
            if doc.users.iter().any(|u| u.email == user.email) {
                return Err(StoreError::AlreadyExists);
            }
            let created = User {
                id: next_id(doc.users.iter().map(|u| u.id))?,
                email: user.email.clone(),
                password_hash: user.password_hash.clone(),
                is_chirpy_red: false,
            };
            doc.users.push(created.clone());
            Ok(created)
        })
    }

    pub fn get_user_by_email(&self, email: &str) -> Result<User> {
        self.find_user(|u| u.email == email)
    }

    pub fn get_user_by_id(&self, id: u64) -> Result<User> {
        self.find_user(|u| u.id == id)
    }

    /// Replace a user's email and password hash. Both must be non-empty;
    /// partial updates are rejected. The upgrade flag is left alone.
    pub fn update_user(&self, update: &UserUpdate) -> Result<User> {
        if update.email.is_empty() {
            return Err(StoreError::Invalid("email must not be empty"));
        }
        if update.password_hash.is_empty() {
            return Err(StoreError::Invalid("password must not be empty"));
        }

        self.with_doc_mut(|doc| {
            if doc
                .users
                .iter()
                .any(|u| u.email == update.email && u.id != update.id)
            {
                return Err(StoreError::AlreadyExists);
            }
            let user = doc
                .users
                .iter_mut()
                .find(|u| u.id == update.id)
                .ok_or(StoreError::NotFound)?;
            user.email = update.email.clone();
            user.password_hash = update.password_hash.clone();
            Ok(user.clone())
        })
    }

    pub fn upgrade_user(&self, id: u64) -> Result<User> {
        self.with_doc_mut(|doc| {
            let user = doc
                .users
                .iter_mut()
                .find(|u| u.id == id)
                .ok_or(StoreError::NotFound)?;
            user.is_chirpy_red = true;
            Ok(user.clone())
        })
    }

    fn find_user<P>(&self, predicate: P) -> Result<User>
    where
        P: Fn(&User) -> bool,
    {
        self.with_doc(|doc| {
            doc.and_then(|d| d.users.iter().find(|&u| predicate(u)))
                .cloned()
                .ok_or(StoreError::NotFound)
        })
    }

    // -- Revoked tokens --

    /// Add a refresh token to the revocation list. Revoking an already
    /// revoked token returns the existing record.
    pub fn revoke_token(&self, token: &str) -> Result<RevokedToken> {
        self.with_doc_mut(|doc| {
            if let Some(existing) = doc.tokens.iter().find(|t| t.id == token) {
                return Ok(existing.clone());
            }
            let revoked = RevokedToken {
                id: token.to_string(),
                revoked_at: Utc::now(),
            };
            doc.tokens.push(revoked.clone());
            Ok(revoked)
        })
    }

    pub fn is_revoked(&self, token: &str) -> Result<bool> {
        self.with_doc(|doc| Ok(doc.is_some_and(|d| d.tokens.iter().any(|t| t.id == token))))
    }
}

fn chirps_or_empty(doc: Option<&crate::models::Document>) -> Result<&[Chirp]> {
    match doc {
        Some(d) if !d.chirps.is_empty() => Ok(&d.chirps),
        _ => Err(StoreError::Empty),
    }
}

/// Highest existing id plus one, or 1 for an empty collection.
fn next_id(ids: impl Iterator<Item = u64>) -> Result<u64> {
    match ids.max() {
        None => Ok(1),
        Some(max) => max
            .checked_add(1)
            .ok_or(StoreError::Invalid("id space exhausted")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Document;
    use proptest::prelude::*;

    fn temp_db() -> (tempfile::TempDir, Database) {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::open(&dir.path().join("db.json")).unwrap();
        (dir, db)
    }

    fn new_user(email: &str) -> NewUser {
        NewUser {
            email: email.to_string(),
            password_hash: "hash".to_string(),
        }
    }

    #[test]
    fn chirp_ids_start_at_one() {
        let (_dir, db) = temp_db();
        let first = db.create_chirp("hello", 7).unwrap();
        let second = db.create_chirp("again", 7).unwrap();
        assert_eq!(first.id, 1);
        assert_eq!(second.id, 2);
        assert_eq!(db.get_chirp(2).unwrap(), second);
    }

    #[test]
    fn empty_store_reports_empty_for_chirps() {
        let (_dir, db) = temp_db();
        assert!(matches!(db.list_chirps(), Err(StoreError::Empty)));
        assert!(matches!(db.get_chirp(1), Err(StoreError::Empty)));
    }

    #[test]
    fn missing_chirp_is_not_found() {
        let (_dir, db) = temp_db();
        db.create_chirp("hello", 1).unwrap();
        assert!(matches!(db.get_chirp(42), Err(StoreError::NotFound)));
    }

    #[test]
    fn delete_then_get_is_not_found() {
        let (_dir, db) = temp_db();
        db.create_chirp("one", 1).unwrap();
        db.create_chirp("two", 1).unwrap();

        db.delete_chirp(1).unwrap();

        assert!(matches!(db.get_chirp(1), Err(StoreError::NotFound)));
        assert_eq!(db.list_chirps().unwrap().len(), 1);
    }

    #[test]
    fn delete_missing_chirp_is_not_found() {
        let (_dir, db) = temp_db();
        assert!(matches!(db.delete_chirp(1), Err(StoreError::NotFound)));
        db.create_chirp("one", 1).unwrap();
        assert!(matches!(db.delete_chirp(9), Err(StoreError::NotFound)));
    }

    #[test]
    fn ids_follow_max_after_delete() {
        let (_dir, db) = temp_db();
        db.create_chirp("one", 1).unwrap();
        db.create_chirp("two", 1).unwrap();
        db.delete_chirp(1).unwrap();
        assert_eq!(db.create_chirp("three", 1).unwrap().id, 3);
    }

    #[test]
    fn chirps_filter_by_author() {
        let (_dir, db) = temp_db();
        db.create_chirp("a", 1).unwrap();
        db.create_chirp("b", 2).unwrap();
        db.create_chirp("c", 1).unwrap();

        let bodies: Vec<String> = db
            .list_chirps_by_author(1)
            .unwrap()
            .into_iter()
            .map(|c| c.body)
            .collect();
        assert_eq!(bodies, ["a", "c"]);
        assert!(matches!(db.list_chirps_by_author(3), Err(StoreError::Empty)));
    }

    #[test]
    fn creating_users_keeps_chirps() {
        let (_dir, db) = temp_db();
        db.create_chirp("still here", 1).unwrap();
        db.create_user(&new_user("a@example.com")).unwrap();
        db.revoke_token("tok").unwrap();

        assert_eq!(db.list_chirps().unwrap().len(), 1);
        assert_eq!(db.get_user_by_id(1).unwrap().email, "a@example.com");
        assert!(db.is_revoked("tok").unwrap());
    }

    #[test]
    fn duplicate_email_already_exists() {
        let (_dir, db) = temp_db();
        let first = db.create_user(&new_user("a@example.com")).unwrap();
        assert_eq!(first.id, 1);
        assert!(!first.is_chirpy_red);

        assert!(matches!(
            db.create_user(&new_user("a@example.com")),
            Err(StoreError::AlreadyExists)
        ));
        assert_eq!(db.create_user(&new_user("b@example.com")).unwrap().id, 2);
    }

    #[test]
    fn user_lookup() {
        let (_dir, db) = temp_db();
        assert!(matches!(db.get_user_by_email("a@example.com"), Err(StoreError::NotFound)));

        let created = db.create_user(&new_user("a@example.com")).unwrap();
        assert_eq!(db.get_user_by_email("a@example.com").unwrap(), created);
        assert_eq!(db.get_user_by_id(created.id).unwrap(), created);
        assert!(matches!(db.get_user_by_id(99), Err(StoreError::NotFound)));
    }

    #[test]
    fn update_user_replaces_credentials() {
        let (_dir, db) = temp_db();
        let user = db.create_user(&new_user("a@example.com")).unwrap();
        db.upgrade_user(user.id).unwrap();

        let updated = db
            .update_user(&UserUpdate {
                id: user.id,
                email: "new@example.com".into(),
                password_hash: "new-hash".into(),
            })
            .unwrap();

        assert_eq!(updated.email, "new@example.com");
        assert_eq!(updated.password_hash, "new-hash");
        assert!(updated.is_chirpy_red);
        assert!(matches!(db.get_user_by_email("a@example.com"), Err(StoreError::NotFound)));
    }

    #[test]
    fn update_user_rejects_partial_and_unknown() {
        let (_dir, db) = temp_db();
        let user = db.create_user(&new_user("a@example.com")).unwrap();

        let partial = UserUpdate {
            id: user.id,
            email: String::new(),
            password_hash: "x".into(),
        };
        assert!(matches!(db.update_user(&partial), Err(StoreError::Invalid(_))));

        let unknown = UserUpdate {
            id: 99,
            email: "x@example.com".into(),
            password_hash: "x".into(),
        };
        assert!(matches!(db.update_user(&unknown), Err(StoreError::NotFound)));
    }

    #[test]
    fn update_user_cannot_take_another_email() {
        let (_dir, db) = temp_db();
        db.create_user(&new_user("a@example.com")).unwrap();
        let b = db.create_user(&new_user("b@example.com")).unwrap();

        let update = UserUpdate {
            id: b.id,
            email: "a@example.com".into(),
            password_hash: "x".into(),
        };
        assert!(matches!(db.update_user(&update), Err(StoreError::AlreadyExists)));
    }

    #[test]
    fn upgrade_user_sets_flag() {
        let (_dir, db) = temp_db();
        assert!(matches!(db.upgrade_user(1), Err(StoreError::NotFound)));

        let user = db.create_user(&new_user("a@example.com")).unwrap();
        assert!(db.upgrade_user(user.id).unwrap().is_chirpy_red);
        assert!(db.get_user_by_id(user.id).unwrap().is_chirpy_red);
    }

    #[test]
    fn revocation_list() {
        let (_dir, db) = temp_db();
        assert!(!db.is_revoked("tok").unwrap());

        let first = db.revoke_token("tok").unwrap();
        let again = db.revoke_token("tok").unwrap();

        assert_eq!(first, again);
        assert!(db.is_revoked("tok").unwrap());
        assert!(!db.is_revoked("other").unwrap());

        let doc = db.store.read_document().unwrap().unwrap();
        assert_eq!(doc.tokens.len(), 1);
    }

    #[test]
    fn delete_by_author_checks_owner_of_current_record() {
        let (_dir, db) = temp_db();
        db.create_chirp("mine", 1).unwrap();
        db.create_chirp("also mine", 1).unwrap();

        // Chirp 2 goes away and its id is handed out again to user 3.
        db.delete_chirp_by_author(2, 1).unwrap();
        let theirs = db.create_chirp("theirs", 3).unwrap();
        assert_eq!(theirs.id, 2);

        assert!(matches!(
            db.delete_chirp_by_author(2, 1),
            Err(StoreError::NotOwner)
        ));
        assert_eq!(db.get_chirp(2).unwrap(), theirs);

        db.delete_chirp_by_author(2, 3).unwrap();
        assert!(matches!(
            db.delete_chirp_by_author(2, 3),
            Err(StoreError::NotFound)
        ));
    }

    #[test]
    fn delete_by_author_on_empty_store_is_not_found() {
        let (_dir, db) = temp_db();
        assert!(matches!(
            db.delete_chirp_by_author(1, 1),
            Err(StoreError::NotFound)
        ));
    }

    #[test]
    fn exhausted_id_space_is_rejected() {
        let (_dir, db) = temp_db();
        let mut doc = Document::default();
        doc.chirps.push(Chirp {
            id: u64::MAX,
            author_id: 1,
            body: "last".to_string(),
        });
        db.store.write(&doc).unwrap();

        assert!(matches!(
            db.create_chirp("one more", 1),
            Err(StoreError::Invalid(_))
        ));
        assert_eq!(db.list_chirps().unwrap().len(), 1);
    }

    #[test]
    fn clear_resets_ids() {
        let (_dir, db) = temp_db();
        db.create_chirp("one", 1).unwrap();
        db.clear().unwrap();
        assert!(matches!(db.list_chirps(), Err(StoreError::Empty)));
        assert_eq!(db.create_chirp("again", 1).unwrap().id, 1);
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(16))]

        #[test]
        fn ids_strictly_increase_from_one(bodies in prop::collection::vec("[a-z ]{0,16}", 1..10)) {
            let (_dir, db) = temp_db();
            let ids: Vec<u64> = bodies
                .iter()
                .map(|b| db.create_chirp(b, 1).unwrap().id)
                .collect();
            let expected: Vec<u64> = (1..=bodies.len() as u64).collect();
            prop_assert_eq!(ids, expected);

            let stored: Vec<String> = db.list_chirps().unwrap().into_iter().map(|c| c.body).collect();
            prop_assert_eq!(stored, bodies);
        }
    }
}
