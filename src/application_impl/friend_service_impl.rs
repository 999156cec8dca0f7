use super::KeyedLock;
use crate::application_port::{FriendService, RelationError};
use crate::domain_model::*;
use crate::domain_port::{FriendshipRepo, TxManager, UserRepo};
use crate::logger::*;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;

/// Result of one step of the relationship state machine.
#[derive(Debug)]
enum Transition {
    Save(FriendRelationship),
    Remove(FriendRelationship),
}

fn on_add(
    current: Option<FriendRelationship>,
    from: &UserId,
    to: &UserId,
    now: DateTime<Utc>,
) -> FriendRelationship {
    let Some(mut relationship) = current else {
        return FriendRelationship::canonical(
            from,
            to,
            FriendStatus::Subscribed,
            FriendStatus::None,
            now,
        );
    };

    relationship.set_status_of(from, FriendStatus::Subscribed);
    // an ignored requester must be re-accepted explicitly
    if relationship.status_of(to) == FriendStatus::Ignored {
        relationship.set_status_of(to, FriendStatus::Unsubscribed);
    }
    relationship.updated_at = now;
    relationship
}

fn on_mark(
    current: Option<FriendRelationship>,
    from: &UserId,
    status: FriendStatus,
    now: DateTime<Utc>,
) -> Result<FriendRelationship, RelationError> {
    let mut relationship = current.ok_or_else(|| {
        RelationError::BadRequest("no relationship with this user".to_owned())
    })?;
    relationship.set_status_of(from, status);
    relationship.updated_at = now;
    Ok(relationship)
}

fn on_delete(
    current: Option<FriendRelationship>,
    from: &UserId,
    to: &UserId,
    now: DateTime<Utc>,
) -> FriendRelationship {
    let mut relationship = current.unwrap_or_else(|| {
        FriendRelationship::canonical(
            from,
            to,
            FriendStatus::Unsubscribed,
            FriendStatus::Unsubscribed,
            now,
        )
    });
    relationship.status_a = FriendStatus::Unsubscribed;
    relationship.status_b = FriendStatus::Unsubscribed;
    relationship.updated_at = now;
    relationship
}

pub struct RealFriendService {
    user_repo: Arc<dyn UserRepo>,
    friendship_repo: Arc<dyn FriendshipRepo>,
    tx_manager: Arc<dyn TxManager>,
    locks: KeyedLock,
}

impl RealFriendService {
    pub fn new(
        user_repo: Arc<dyn UserRepo>,
        friendship_repo: Arc<dyn FriendshipRepo>,
        tx_manager: Arc<dyn TxManager>,
    ) -> Self {
        Self {
            user_repo,
            friendship_repo,
            tx_manager,
            locks: KeyedLock::new(),
        }
    }

    async fn ensure_counterpart(&self, from: &UserId, to: &UserId) -> Result<(), RelationError> {
        if from == to {
            return Err(RelationError::BadRequest(
                "cannot befriend yourself".to_owned(),
            ));
        }
        if self.user_repo.get(to).await?.is_none() {
            return Err(RelationError::BadRequest(format!("user {to} not found")));
        }
        Ok(())
    }

    /// Runs one read-modify-write of the pair's record under its key lock
    /// and inside a single transaction.
    async fn apply<F>(
        &self,
        from: &UserId,
        to: &UserId,
        step: F,
    ) -> Result<FriendRelationship, RelationError>
    where
        F: FnOnce(Option<FriendRelationship>, DateTime<Utc>) -> Result<Transition, RelationError>
            + Send,
    {
        let pair = UserPair::new(from.clone(), to.clone());
        let id = RelationshipId::of(&pair);
        let _guard = self.locks.lock(&id.0).await;

        let mut tx = self
            .tx_manager
            .begin()
            .await
            .map_err(|e| RelationError::Store(e.to_string()))?;

        let current = self.friendship_repo.get_in_tx(&mut *tx, &id).await?;
        // concatenated ids are ambiguous ("cb"+"a" == "c"+"ba")
        if let Some(existing) = &current {
            if existing.user_a != *pair.greater() || existing.user_b != *pair.lesser() {
                warn!(id = %id, "relationship id belongs to another pair");
                return Err(RelationError::BadRequest(format!(
                    "relationship id {id} collides with another pair"
                )));
            }
        }
        let relationship = match step(current, Utc::now())? {
            Transition::Save(relationship) => {
                self.friendship_repo
                    .save_in_tx(&mut *tx, &relationship)
                    .await?;
                relationship
            }
            Transition::Remove(relationship) => {
                self.friendship_repo.delete_in_tx(&mut *tx, &id).await?;
                relationship
            }
        };

        tx.commit()
            .await
            .map_err(|e| RelationError::Store(e.to_string()))?;

        debug!(
            id = %relationship.id,
            status_a = ?relationship.status_a,
            status_b = ?relationship.status_b,
            "relationship updated"
        );
        Ok(relationship)
    }

    async fn profiles_of(
        &self,
        ids: &[UserId],
    ) -> Result<HashMap<UserId, UserProfile>, RelationError> {
        Ok(self
            .user_repo
            .list_by_ids(ids)
            .await?
            .into_iter()
            .map(|p| (p.id.clone(), p))
            .collect())
    }
}

#[async_trait::async_trait]
impl FriendService for RealFriendService {
    async fn search(&self, keywords: &str) -> Result<FriendInfo, RelationError> {
        let keywords = keywords.trim();
        if keywords.is_empty() {
            return Err(RelationError::BadRequest("empty search keywords".to_owned()));
        }

        self.user_repo
            .precise_search(keywords)
            .await?
            .first()
            .map(UserProfile::to_friend_info)
            .ok_or(RelationError::UserNotFound)
    }

    async fn profile(&self, user_id: &UserId) -> Result<FriendInfo, RelationError> {
        self.user_repo
            .get(user_id)
            .await?
            .map(|p| p.to_friend_info())
            .ok_or(RelationError::UserNotFound)
    }

    async fn my_friend_list(&self, user_id: &UserId) -> Result<Vec<FriendInfo>, RelationError> {
        let counterparts: Vec<UserId> = self
            .friendship_repo
            .list_for_user(user_id)
            .await?
            .iter()
            .filter(|r| r.is_mutual())
            .map(|r| r.counterpart_of(user_id).clone())
            .collect();

        let profiles = self.profiles_of(&counterparts).await?;
        Ok(counterparts
            .iter()
            .filter_map(|id| profiles.get(id))
            .map(UserProfile::to_friend_info)
            .collect())
    }

    async fn quasi_friend_list(
        &self,
        user_id: &UserId,
    ) -> Result<Vec<QuasiFriend>, RelationError> {
        let pending: Vec<FriendRelationship> = self
            .friendship_repo
            .list_for_user(user_id)
            .await?
            .into_iter()
            .filter(|r| !r.is_mutual())
            .collect();

        let counterparts: Vec<UserId> = pending
            .iter()
            .map(|r| r.counterpart_of(user_id).clone())
            .collect();
        let profiles = self.profiles_of(&counterparts).await?;

        Ok(pending
            .into_iter()
            .filter_map(|status| {
                let counterpart = status.counterpart_of(user_id).clone();
                match profiles.get(&counterpart) {
                    Some(profile) => Some(QuasiFriend {
                        info: profile.to_friend_info(),
                        status,
                    }),
                    None => {
                        debug!(%counterpart, "skipping relationship without profile");
                        None
                    }
                }
            })
            .collect())
    }

    async fn add(&self, from: &UserId, to: &UserId) -> Result<FriendRelationship, RelationError> {
        self.ensure_counterpart(from, to).await?;
        self.apply(from, to, |current, now| {
            Ok(Transition::Save(on_add(current, from, to, now)))
        })
        .await
    }

    async fn ignore(
        &self,
        from: &UserId,
        to: &UserId,
    ) -> Result<FriendRelationship, RelationError> {
        self.ensure_counterpart(from, to).await?;
        self.apply(from, to, |current, now| {
            on_mark(current, from, FriendStatus::Ignored, now).map(Transition::Save)
        })
        .await
    }

    async fn refuse(
        &self,
        from: &UserId,
        to: &UserId,
    ) -> Result<FriendRelationship, RelationError> {
        self.ensure_counterpart(from, to).await?;
        self.apply(from, to, |current, now| {
            on_mark(current, from, FriendStatus::Refused, now).map(Transition::Save)
        })
        .await
    }

    async fn delete(
        &self,
        from: &UserId,
        to: &UserId,
    ) -> Result<FriendRelationship, RelationError> {
        self.ensure_counterpart(from, to).await?;
        self.apply(from, to, |current, now| {
            Ok(Transition::Remove(on_delete(current, from, to, now)))
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infra_memory::*;

    fn profile(id: &str, phone: &str) -> UserProfile {
        UserProfile {
            id: id.into(),
            user_name: format!("{id}-name"),
            real_name: id.to_uppercase(),
            avatar: String::new(),
            phone: phone.to_owned(),
            email: String::new(),
            status: UserStatus::Enabled,
        }
    }

    async fn service_with(users: &[&str]) -> (RealFriendService, MemoryStore) {
        let store = MemoryStore::new();
        for (i, id) in users.iter().enumerate() {
            store.insert_user(profile(id, &format!("1380000000{i}"))).await;
        }
        let service = RealFriendService::new(
            Arc::new(MemoryUserRepo::new(store.clone())),
            Arc::new(MemoryFriendshipRepo::new(store.clone())),
            Arc::new(MemoryTxManager::new(store.clone())),
        );
        (service, store)
    }

    fn ids(list: &[FriendInfo]) -> Vec<&str> {
        list.iter().map(|f| f.id.as_str()).collect()
    }

    #[tokio::test]
    async fn mutual_add_makes_friends_on_both_sides() {
        let (service, store) = service_with(&["u1", "u2"]).await;
        let u1: UserId = "u1".into();
        let u2: UserId = "u2".into();

        service.add(&u2, &u1).await.unwrap();
        let relationship = service.add(&u1, &u2).await.unwrap();

        // "u2" sorts after "u1", so it takes the A slot
        assert_eq!(relationship.id.0, "u2u1");
        assert_eq!(relationship.user_a, u2);
        assert_eq!(relationship.status_a, FriendStatus::Subscribed);
        assert_eq!(relationship.status_b, FriendStatus::Subscribed);
        assert_eq!(store.read(|t| t.friendships.len()).await, 1);

        assert_eq!(ids(&service.my_friend_list(&u1).await.unwrap()), ["u2"]);
        assert_eq!(ids(&service.my_friend_list(&u2).await.unwrap()), ["u1"]);
        assert!(service.quasi_friend_list(&u1).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn one_sided_add_is_pending_for_both() {
        let (service, _) = service_with(&["alice", "bob"]).await;
        let alice: UserId = "alice".into();
        let bob: UserId = "bob".into();

        let relationship = service.add(&alice, &bob).await.unwrap();
        assert_eq!(relationship.status_of(&alice), FriendStatus::Subscribed);
        assert_eq!(relationship.status_of(&bob), FriendStatus::None);

        assert!(service.my_friend_list(&alice).await.unwrap().is_empty());
        assert!(service.my_friend_list(&bob).await.unwrap().is_empty());

        let pending = service.quasi_friend_list(&bob).await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].info.id, alice);
        assert_eq!(pending[0].status.status_of(&alice), FriendStatus::Subscribed);
    }

    #[tokio::test]
    async fn readd_after_ignore_requires_explicit_accept() {
        let (service, _) = service_with(&["a", "b"]).await;
        let a: UserId = "a".into();
        let b: UserId = "b".into();

        service.add(&a, &b).await.unwrap();
        let ignored = service.ignore(&b, &a).await.unwrap();
        assert_eq!(ignored.status_of(&b), FriendStatus::Ignored);
        assert_eq!(ignored.status_of(&a), FriendStatus::Subscribed);

        let readded = service.add(&a, &b).await.unwrap();
        assert_eq!(readded.status_of(&b), FriendStatus::Unsubscribed);
        assert!(service.my_friend_list(&a).await.unwrap().is_empty());

        let accepted = service.add(&b, &a).await.unwrap();
        assert!(accepted.is_mutual());
    }

    #[tokio::test]
    async fn refused_slot_survives_readd() {
        let (service, _) = service_with(&["a", "b"]).await;
        let a: UserId = "a".into();
        let b: UserId = "b".into();

        service.add(&a, &b).await.unwrap();
        service.refuse(&b, &a).await.unwrap();
        let readded = service.add(&a, &b).await.unwrap();
        assert_eq!(readded.status_of(&b), FriendStatus::Refused);
    }

    #[tokio::test]
    async fn delete_removes_record_and_reports_reset_state() {
        let (service, store) = service_with(&["a", "b"]).await;
        let a: UserId = "a".into();
        let b: UserId = "b".into();

        service.add(&a, &b).await.unwrap();
        service.add(&b, &a).await.unwrap();
        let deleted = service.delete(&a, &b).await.unwrap();

        assert_eq!(deleted.status_a, FriendStatus::Unsubscribed);
        assert_eq!(deleted.status_b, FriendStatus::Unsubscribed);
        assert!(store.read(|t| t.friendships.is_empty()).await);
        assert!(service.my_friend_list(&b).await.unwrap().is_empty());

        // deleting again is a no-op
        service.delete(&a, &b).await.unwrap();
    }

    #[tokio::test]
    async fn rejects_invalid_pairs() {
        let (service, _) = service_with(&["a", "b"]).await;
        let a: UserId = "a".into();
        let ghost: UserId = "ghost".into();

        let err = service.add(&a, &a).await.unwrap_err();
        assert!(matches!(err, RelationError::BadRequest(_)));

        let err = service.add(&a, &ghost).await.unwrap_err();
        assert!(matches!(err, RelationError::BadRequest(_)));

        let err = service.ignore(&a, &"b".into()).await.unwrap_err();
        assert!(matches!(err, RelationError::BadRequest(_)));
    }

    #[tokio::test]
    async fn delete_rejects_unknown_target() {
        let (service, _) = service_with(&["a"]).await;
        let a: UserId = "a".into();

        let err = service.delete(&a, &"ghost".into()).await.unwrap_err();
        assert!(matches!(err, RelationError::BadRequest(_)));

        let err = service.delete(&a, &a).await.unwrap_err();
        assert!(matches!(err, RelationError::BadRequest(_)));
    }

    #[tokio::test]
    async fn colliding_relationship_ids_do_not_share_a_record() {
        let (service, store) = service_with(&["cb", "a", "c", "ba"]).await;
        let cb: UserId = "cb".into();
        let a: UserId = "a".into();
        let c: UserId = "c".into();
        let ba: UserId = "ba".into();

        service.add(&cb, &a).await.unwrap();
        let friends = service.add(&a, &cb).await.unwrap();
        assert_eq!(friends.id.0, "cba");

        // ("c", "ba") concatenates to the same id
        let err = service.add(&c, &ba).await.unwrap_err();
        assert!(matches!(err, RelationError::BadRequest(_)));
        let err = service.delete(&c, &ba).await.unwrap_err();
        assert!(matches!(err, RelationError::BadRequest(_)));

        let stored = store.read(|t| t.friendships.values().cloned().collect::<Vec<_>>()).await;
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].user_a, cb);
        assert!(stored[0].is_mutual());
        assert_eq!(ids(&service.my_friend_list(&cb).await.unwrap()), ["a"]);
        assert!(service.my_friend_list(&c).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn search_matches_username_or_phone_exactly() {
        let (service, store) = service_with(&["a", "b"]).await;

        let found = service.search("a-name").await.unwrap();
        assert_eq!(found.id.as_str(), "a");

        let found = service.search("13800000001").await.unwrap();
        assert_eq!(found.id.as_str(), "b");

        assert!(matches!(
            service.search("a-na").await,
            Err(RelationError::UserNotFound)
        ));
        assert!(matches!(
            service.search("  ").await,
            Err(RelationError::BadRequest(_))
        ));

        let mut disabled = profile("c", "");
        disabled.status = UserStatus::Disabled;
        store.insert_user(disabled).await;
        assert!(matches!(
            service.search("c-name").await,
            Err(RelationError::UserNotFound)
        ));
    }

    #[tokio::test]
    async fn concurrent_adds_leave_one_mutual_record() {
        let (service, store) = service_with(&["p", "q"]).await;
        let service = Arc::new(service);
        let p: UserId = "p".into();
        let q: UserId = "q".into();

        let first = {
            let service = service.clone();
            let (p, q) = (p.clone(), q.clone());
            tokio::spawn(async move { service.add(&p, &q).await })
        };
        let second = {
            let service = service.clone();
            let (p, q) = (p.clone(), q.clone());
            tokio::spawn(async move { service.add(&q, &p).await })
        };
        first.await.unwrap().unwrap();
        second.await.unwrap().unwrap();

        let records = store
            .read(|t| t.friendships.values().cloned().collect::<Vec<_>>())
            .await;
        assert_eq!(records.len(), 1);
        assert!(records[0].is_mutual());
    }

    #[test]
    fn transitions_are_slot_local() {
        let a: UserId = "a".into();
        let b: UserId = "b".into();
        let now = Utc::now();

        let created = on_add(None, &a, &b, now);
        assert_eq!(created.status_of(&b), FriendStatus::None);

        let marked = on_mark(Some(created.clone()), &b, FriendStatus::Ignored, now).unwrap();
        assert_eq!(marked.status_of(&a), FriendStatus::Subscribed);
        assert!(on_mark(None, &b, FriendStatus::Ignored, now).is_err());

        let reset = on_delete(Some(marked), &a, &b, now);
        assert_eq!(reset.id, created.id);
        assert_eq!(reset.status_of(&a), FriendStatus::Unsubscribed);
    }
}
