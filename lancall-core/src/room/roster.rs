//! Shared membership list
//!
//! On the host this is the single source of truth for who is in the
//! room; every mutation goes through this handle, and the presence
//! broadcaster reads snapshots from it. On a client it is a replica,
//! replaced wholesale by each presence snapshot received.

use std::sync::Arc;

use tokio::sync::RwLock;

use lancall_common::protocol::{Member, Role};

/// Ordered membership list behind a lock
///
/// Insertion order is join order and is preserved on the wire.
#[derive(Debug, Clone, Default)]
pub struct Roster {
    members: Arc<RwLock<Vec<Member>>>,
}

impl Roster {
    /// Create an empty roster
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a member at the end (join order)
    pub async fn add(&self, member: Member) {
        self.members.write().await.push(member);
    }

    /// Append a member unless the username is already taken, ignoring
    /// ASCII case; returns whether it was added
    ///
    /// The check and the insert happen under one write lock, so two
    /// concurrent handshakes for the same name cannot both succeed.
    pub async fn add_if_absent(&self, member: Member) -> bool {
        let mut members = self.members.write().await;
        if members
            .iter()
            .any(|m| m.username.eq_ignore_ascii_case(&member.username))
        {
            return false;
        }
        members.push(member);
        true
    }

    /// Remove one member by username; returns whether it was present
    pub async fn remove(&self, username: &str) -> bool {
        let mut members = self.members.write().await;
        let before = members.len();
        members.retain(|m| m.username != username);
        members.len() != before
    }

    /// Replace the whole list (presence snapshot, room reset)
    pub async fn replace(&self, new_members: Vec<Member>) {
        *self.members.write().await = new_members;
    }

    /// Drop every member
    pub async fn clear(&self) {
        self.members.write().await.clear();
    }

    /// Current membership in join order
    pub async fn snapshot(&self) -> Vec<Member> {
        self.members.read().await.clone()
    }

    /// Whether a username is already taken, ignoring ASCII case
    pub async fn contains(&self, username: &str) -> bool {
        self.members
            .read()
            .await
            .iter()
            .any(|m| m.username.eq_ignore_ascii_case(username))
    }

    /// The host member's username, if the roster has one
    pub async fn host_username(&self) -> Option<String> {
        self.members
            .read()
            .await
            .iter()
            .find(|m| m.role == Role::Host)
            .map(|m| m.username.clone())
    }

    /// Number of members
    pub async fn len(&self) -> usize {
        self.members.read().await.len()
    }

    /// Whether the roster is empty
    pub async fn is_empty(&self) -> bool {
        self.members.read().await.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_add_preserves_join_order() {
        let roster = Roster::new();
        roster.add(Member::host("alice")).await;
        roster.add(Member::client("bob")).await;
        roster.add(Member::client("carol")).await;

        let members = roster.snapshot().await;
        let names: Vec<&str> = members.iter().map(|m| m.username.as_str()).collect();
        assert_eq!(names, vec!["alice", "bob", "carol"]);
    }

    #[tokio::test]
    async fn test_remove_affects_only_that_member() {
        let roster = Roster::new();
        roster.add(Member::host("alice")).await;
        roster.add(Member::client("bob")).await;
        roster.add(Member::client("carol")).await;

        assert!(roster.remove("bob").await);
        assert!(!roster.remove("bob").await);

        let members = roster.snapshot().await;
        assert_eq!(members, vec![Member::host("alice"), Member::client("carol")]);
    }

    #[tokio::test]
    async fn test_replace_is_idempotent() {
        let roster = Roster::new();
        let snapshot = vec![Member::host("alice"), Member::client("bob")];

        roster.replace(snapshot.clone()).await;
        let first = roster.snapshot().await;
        roster.replace(snapshot.clone()).await;
        let second = roster.snapshot().await;

        assert_eq!(first, second);
        assert_eq!(second, snapshot);
    }

    #[tokio::test]
    async fn test_add_if_absent_rejects_taken_name() {
        let roster = Roster::new();
        roster.add(Member::host("alice")).await;

        assert!(roster.add_if_absent(Member::client("bob")).await);
        assert!(!roster.add_if_absent(Member::client("bob")).await);
        assert!(!roster.add_if_absent(Member::client("BOB")).await);
        assert_eq!(roster.len().await, 2);
    }

    #[tokio::test]
    async fn test_contains_ignores_ascii_case() {
        let roster = Roster::new();
        roster.add(Member::host("Alice")).await;
        assert!(roster.contains("alice").await);
        assert!(roster.contains("ALICE").await);
        assert!(!roster.contains("bob").await);
    }

    #[tokio::test]
    async fn test_host_username() {
        let roster = Roster::new();
        assert_eq!(roster.host_username().await, None);
        roster.add(Member::client("bob")).await;
        roster.add(Member::host("alice")).await;
        assert_eq!(roster.host_username().await, Some("alice".to_string()));
    }
}
