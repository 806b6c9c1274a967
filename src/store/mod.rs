use anyhow::Result;
use chrono::{Duration, Utc};
use rand::Rng;
use tokio::sync::mpsc;

use crate::storage::{self, Storage, KEY_MESSAGES};

pub use message::{Message, MessageKind};

mod message;

/// Canned replies for the inbound-reply simulation, picked uniformly.
const REPLY_POOL: [&str; 8] = [
    "Thanks for your message!",
    "That sounds great!",
    "I agree with you.",
    "Let me think about it.",
    "Sure, no problem!",
    "That's interesting.",
    "I'll get back to you on that.",
    "Sounds good to me!",
];

/// Simulated replies arrive between 1 and 3 seconds after sending.
const REPLY_DELAY_MS: std::ops::RangeInclusive<u64> = 1000..=3000;

/// All messages on this device, persisted whole as one JSON list.
/// Every read and write goes through this store.
pub struct MessageStore<S: Storage> {
    messages: Vec<Message>,
    storage: S,
}

impl<S: Storage> MessageStore<S> {
    /// Load the persisted list. A first run (or an unreadable list) starts
    /// from the seed conversation and persists it.
    pub fn open(storage: S) -> Result<Self> {
        let mut store = Self {
            messages: Vec::new(),
            storage,
        };
        let persisted: Option<Vec<Message>> = storage::load(&store.storage, KEY_MESSAGES);
        match persisted {
            Some(messages) => store.messages = messages,
            None => {
                store.messages = seed_messages();
                store.persist()?;
            }
        }
        Ok(store)
    }

    /// Append to the tail and persist the full list.
    pub fn append(&mut self, message: Message) -> Result<()> {
        self.messages.push(message);
        self.persist()
    }

    /// The conversation between `me` and `other`: every message whose
    /// endpoints are exactly that pair, ordered by timestamp ascending.
    pub fn conversation_for(&self, me: &str, other: &str) -> Vec<&Message> {
        let mut conversation: Vec<&Message> = self
            .messages
            .iter()
            .filter(|m| m.involves(me, other))
            .collect();
        conversation.sort_by(|a, b| a.timestamp.cmp(&b.timestamp));
        conversation
    }

    /// Latest message exchanged with `other`, for the sidebar preview.
    pub fn last_message_with(&self, me: &str, other: &str) -> Option<&Message> {
        self.messages
            .iter()
            .filter(|m| m.involves(me, other))
            .max_by_key(|m| m.timestamp)
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    /// Drop every message and persist the empty list.
    pub fn clear(&mut self) -> Result<()> {
        self.messages.clear();
        self.persist()
    }

    fn persist(&mut self) -> Result<()> {
        storage::save(&mut self.storage, KEY_MESSAGES, &self.messages)
    }
}

/// Schedule a canned reply from `sender_id` after a randomized delay.
/// The finished message arrives on `tx` when the timer fires; nothing is
/// shared with the UI loop beyond the channel.
pub fn simulate_reply(sender_id: String, receiver_id: String, tx: mpsc::UnboundedSender<Message>) {
    let delay =
        std::time::Duration::from_millis(rand::thread_rng().gen_range(REPLY_DELAY_MS));

    tokio::spawn(async move {
        tokio::time::sleep(delay).await;
        // The reply, content included, is built when the timer fires.
        let content = REPLY_POOL[rand::thread_rng().gen_range(0..REPLY_POOL.len())];
        // The receiver may be gone if the user logged out; that just means
        // nobody is observing the reply any more.
        let _ = tx.send(Message::text(&sender_id, &receiver_id, content));
    });
}

/// The initial conversation written on first load, mirroring two contacts
/// greeting the demo user.
fn seed_messages() -> Vec<Message> {
    let now = Utc::now();
    let seed = |sender: &str, receiver: &str, content: &str, ago_mins: i64| Message {
        timestamp: now - Duration::minutes(ago_mins),
        ..Message::text(sender, receiver, content)
    };

    vec![
        seed("1", "demo-user", "Hey! How are you doing?", 30),
        seed("demo-user", "1", "I'm doing great! Thanks for asking. How about you?", 25),
        seed("2", "demo-user", "Are we still on for the meeting tomorrow?", 60),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{FileStore, MemoryStore};

    fn at(sender: &str, receiver: &str, content: &str, ago_mins: i64) -> Message {
        Message {
            timestamp: Utc::now() - Duration::minutes(ago_mins),
            ..Message::text(sender, receiver, content)
        }
    }

    #[test]
    fn conversation_is_sorted_ascending() {
        let mut store = MessageStore::open(MemoryStore::default()).unwrap();
        store.clear().unwrap();
        store.append(at("me", "a", "second", 5)).unwrap();
        store.append(at("a", "me", "first", 10)).unwrap();
        store.append(at("me", "a", "third", 1)).unwrap();

        let conversation = store.conversation_for("me", "a");
        let contents: Vec<&str> = conversation.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, ["first", "second", "third"]);
        for pair in conversation.windows(2) {
            assert!(pair[0].timestamp <= pair[1].timestamp);
        }
    }

    #[test]
    fn conversation_excludes_other_pairs() {
        let mut store = MessageStore::open(MemoryStore::default()).unwrap();
        store.clear().unwrap();
        store.append(at("me", "a", "ours", 3)).unwrap();
        store.append(at("b", "me", "different contact", 2)).unwrap();
        store.append(at("a", "b", "not ours at all", 1)).unwrap();

        let conversation = store.conversation_for("me", "a");
        assert_eq!(conversation.len(), 1);
        assert!(conversation
            .iter()
            .all(|m| m.involves("me", "a")));
    }

    #[test]
    fn append_survives_reload() {
        let tmp = tempfile::tempdir().unwrap();
        let open = || {
            MessageStore::open(FileStore::open(tmp.path().to_path_buf()).unwrap()).unwrap()
        };

        let mut store = open();
        store.clear().unwrap();
        store.append(at("me", "a", "hello", 2)).unwrap();
        store.append(at("a", "me", "hi back", 1)).unwrap();
        let before: Vec<String> = store
            .conversation_for("me", "a")
            .iter()
            .map(|m| m.id.clone())
            .collect();
        drop(store);

        let reloaded = open();
        let after: Vec<String> = reloaded
            .conversation_for("me", "a")
            .iter()
            .map(|m| m.id.clone())
            .collect();
        assert_eq!(before, after);
    }

    #[test]
    fn first_open_seeds_and_persists() {
        let tmp = tempfile::tempdir().unwrap();
        let storage = FileStore::open(tmp.path().to_path_buf()).unwrap();
        let store = MessageStore::open(storage).unwrap();
        assert_eq!(store.len(), 3);
        assert_eq!(store.conversation_for("demo-user", "1").len(), 2);

        // Second open reads the persisted seeds instead of reseeding.
        let ids: Vec<String> = store.messages.iter().map(|m| m.id.clone()).collect();
        drop(store);
        let store = MessageStore::open(FileStore::open(tmp.path().to_path_buf()).unwrap()).unwrap();
        let again: Vec<String> = store.messages.iter().map(|m| m.id.clone()).collect();
        assert_eq!(ids, again);
    }

    #[test]
    fn last_message_prefers_latest_timestamp() {
        let mut store = MessageStore::open(MemoryStore::default()).unwrap();
        store.clear().unwrap();
        store.append(at("me", "a", "older", 10)).unwrap();
        store.append(at("a", "me", "newest", 1)).unwrap();
        store.append(at("me", "b", "other pair", 0)).unwrap();

        assert_eq!(store.last_message_with("me", "a").unwrap().content, "newest");
    }

    #[tokio::test]
    async fn simulated_reply_arrives_on_channel() {
        tokio::time::pause();
        let (tx, mut rx) = mpsc::unbounded_channel();
        simulate_reply("a".to_string(), "me".to_string(), tx);

        // Let the reply task register its timer before moving the clock.
        tokio::task::yield_now().await;
        tokio::time::advance(std::time::Duration::from_millis(3001)).await;
        tokio::task::yield_now().await;
        let reply = rx.recv().await.unwrap();
        assert_eq!(reply.sender_id, "a");
        assert_eq!(reply.receiver_id, "me");
        assert!(REPLY_POOL.contains(&reply.content.as_str()));
    }
}
