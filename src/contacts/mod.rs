use chrono::{DateTime, Duration, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::auth::Account;

/// A user as shown in the UI: the signed-in user or a sidebar contact.
/// Persisted records may predate the presence fields, so they default.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    pub name: String,
    pub email: String,
    pub avatar: String,
    #[serde(default)]
    pub is_online: bool,
    #[serde(default)]
    pub last_seen: Option<DateTime<Utc>>,
}

/// The fixed contact list shown on first load.
pub fn seed_contacts() -> Vec<User> {
    let now = Utc::now();
    let seed = |id: &str, name: &str, email: &str, avatar: &str, online: bool, ago_mins: i64| User {
        id: id.to_string(),
        name: name.to_string(),
        email: email.to_string(),
        avatar: avatar.to_string(),
        is_online: online,
        last_seen: Some(now - Duration::minutes(ago_mins)),
    };

    vec![
        seed("1", "Alice Johnson", "alice@example.com",
            "https://images.unsplash.com/photo-1494790108755-2616b612b786?w=150&h=150&fit=crop&crop=face", true, 0),
        seed("2", "Bob Smith", "bob@example.com",
            "https://images.unsplash.com/photo-1507003211169-0a1dd7228f2d?w=150&h=150&fit=crop&crop=face", false, 30),
        seed("3", "Carol Davis", "carol@example.com",
            "https://images.unsplash.com/photo-1438761681033-6461ffad8d80?w=150&h=150&fit=crop&crop=face", true, 0),
        seed("4", "David Wilson", "david@example.com",
            "https://images.unsplash.com/photo-1472099645785-5658abf4ff4e?w=150&h=150&fit=crop&crop=face", false, 120),
        seed("5", "Emma Brown", "emma@example.com",
            "https://images.unsplash.com/photo-1544005313-94ddf0286df2?w=150&h=150&fit=crop&crop=face", true, 0),
        seed("6", "Frank Miller", "frank@example.com",
            "https://images.unsplash.com/photo-1500648767791-00dcc994a43e?w=150&h=150&fit=crop&crop=face", false, 15),
        seed("7", "Grace Lee", "grace@example.com",
            "https://images.unsplash.com/photo-1534528741775-53994a69daeb?w=150&h=150&fit=crop&crop=face", true, 0),
    ]
}

/// Merge the seed contacts with locally registered accounts.
///
/// Deduped by email, the signed-in user excluded, and every non-seed entry
/// decorated with synthetic presence (coin-flip online flag, last seen
/// somewhere in the past 24 hours).
pub fn build_directory(registered: &[Account], current_user_id: &str) -> Vec<User> {
    let mut rng = rand::thread_rng();
    let mut contacts = seed_contacts();
    contacts.retain(|c| c.id != current_user_id);

    for account in registered {
        if account.id == current_user_id {
            continue;
        }
        if contacts.iter().any(|c| c.email == account.email) {
            continue;
        }
        let mut contact = account.to_user();
        contact.is_online = rng.gen_bool(0.5);
        contact.last_seen = Some(Utc::now() - Duration::seconds(rng.gen_range(0..86_400)));
        contacts.push(contact);
    }

    contacts
}

/// Case-insensitive sidebar search over name and email.
pub fn filter_contacts<'a>(contacts: &'a [User], query: &str) -> Vec<&'a User> {
    let query = query.to_lowercase();
    contacts
        .iter()
        .filter(|c| {
            c.name.to_lowercase().contains(&query) || c.email.to_lowercase().contains(&query)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn account(id: &str, name: &str, email: &str) -> Account {
        Account {
            id: id.to_string(),
            name: name.to_string(),
            email: email.to_string(),
            password: "pw".to_string(),
            avatar: "/placeholder.svg".to_string(),
        }
    }

    #[test]
    fn directory_has_no_duplicate_emails() {
        let registered = vec![
            account("100", "Alice Clone", "alice@example.com"),
            account("101", "Henry Ford", "henry@example.com"),
            account("102", "Henry Again", "henry@example.com"),
        ];
        let directory = build_directory(&registered, "demo-user");

        let mut emails: Vec<&str> = directory.iter().map(|c| c.email.as_str()).collect();
        emails.sort_unstable();
        let before = emails.len();
        emails.dedup();
        assert_eq!(before, emails.len());

        // The seed Alice wins over the registered duplicate.
        let alice = directory.iter().find(|c| c.email == "alice@example.com").unwrap();
        assert_eq!(alice.name, "Alice Johnson");
    }

    #[test]
    fn directory_excludes_current_user() {
        let registered = vec![account("me", "Current", "me@example.com")];
        let directory = build_directory(&registered, "me");
        assert!(directory.iter().all(|c| c.id != "me"));

        // A seed entry matching the current user id is excluded too.
        let directory = build_directory(&[], "1");
        assert!(directory.iter().all(|c| c.id != "1"));
    }

    #[test]
    fn merged_entries_get_presence() {
        let registered = vec![account("100", "Henry Ford", "henry@example.com")];
        let directory = build_directory(&registered, "demo-user");
        let henry = directory.iter().find(|c| c.id == "100").unwrap();
        assert!(henry.last_seen.is_some());
    }

    #[test]
    fn filter_matches_name_or_email() {
        let contacts = seed_contacts();
        let hits = filter_contacts(&contacts, "alice");
        assert_eq!(hits.len(), 1);
        let hits = filter_contacts(&contacts, "BOB@EXAMPLE");
        assert_eq!(hits.len(), 1);
        let hits = filter_contacts(&contacts, "");
        assert_eq!(hits.len(), contacts.len());
    }
}
