//! Ordered per-conversation message lists, merged from optimistic sends, live
//! patches, and older pages.

use std::cmp::Ordering;

use chrono::{DateTime, Duration, Utc};
use clack_core::{
    wire::{DirectMessage, RoomMessage},
    EntityId,
};

/// How far apart two otherwise equal messages may be and still count as the same one.
pub const DEDUPE_WINDOW_MS: i64 = 1000;

/// Messages fetched per page when scrolling back.
pub const PAGE_SIZE: usize = 10;

pub trait TimelineEntry: Clone {
    fn id(&self) -> EntityId;
    fn sender_id(&self) -> EntityId;
    fn content(&self) -> &str;
    fn created_at(&self) -> DateTime<Utc>;
    fn client_message_id(&self) -> Option<&str>;
}

macro_rules! timeline_entry {
    ($type:ty) => {
        impl TimelineEntry for $type {
            fn id(&self) -> EntityId {
                self.id
            }

            fn sender_id(&self) -> EntityId {
                self.sender_id
            }

            fn content(&self) -> &str {
                &self.content
            }

            fn created_at(&self) -> DateTime<Utc> {
                self.created_at
            }

            fn client_message_id(&self) -> Option<&str> {
                self.client_message_id.as_deref()
            }
        }
    };
}

timeline_entry!(DirectMessage);
timeline_entry!(RoomMessage);

/// What happened to a message offered to a timeline
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Merge {
    Inserted,
    /// An optimistic entry was swapped for the confirmed one
    Confirmed,
    Duplicate,
}

/// Messages of one conversation or room in creation order.
///
/// Locally staged messages carry a non-positive id until the server confirms them.
#[derive(Debug, Clone)]
pub struct Timeline<M> {
    messages: Vec<M>,
    has_more: bool,
}

impl<M> Default for Timeline<M> {
    fn default() -> Self {
        Self {
            messages: Vec::new(),
            has_more: true,
        }
    }
}

impl<M: TimelineEntry> Timeline<M> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self) -> &[M] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn has_more(&self) -> bool {
        self.has_more
    }

    /// Where the next older page starts, counted back from the newest message.
    pub fn next_offset(&self) -> usize {
        self.messages.iter().filter(|m| m.id() > 0).count()
    }

    /// Adds a message unless the timeline already holds it.
    ///
    /// A message matches an entry with the same id or the same `clientMessageId`.
    /// When either side has no `clientMessageId`, equal content from the same sender
    /// within [DEDUPE_WINDOW_MS] also matches, unless both are confirmed. A confirmed
    /// message matching a staged one takes its place.
    pub fn push(&mut self, message: M) -> Merge {
        if let Some(index) = self.position_of(&message) {
            if self.messages[index].id() <= 0 && message.id() > 0 {
                self.messages.remove(index);
                self.insert_ordered(message);
                return Merge::Confirmed;
            }

            return Merge::Duplicate;
        }

        self.insert_ordered(message);
        Merge::Inserted
    }

    /// Drops a staged message the server refused.
    pub fn discard_staged(&mut self, client_message_id: &str) -> bool {
        let before = self.messages.len();

        self.messages
            .retain(|m| m.id() > 0 || m.client_message_id() != Some(client_message_id));

        self.messages.len() != before
    }

    /// Puts an older page in front of what's loaded. A short page means the start was reached.
    pub fn prepend_page(&mut self, page: Vec<M>, page_size: usize) -> usize {
        self.has_more = page.len() >= page_size && page_size > 0;

        let fresh: Vec<M> = page
            .into_iter()
            .filter(|m| self.position_of(m).is_none())
            .collect();

        let added = fresh.len();

        for message in fresh {
            self.insert_ordered(message);
        }

        added
    }

    /// Confirmed messages sit in `(created_at, id)` order, staged ones after them in the
    /// order they were sent.
    fn insert_ordered(&mut self, message: M) {
        let index = self
            .messages
            .partition_point(|m| creation_order(m, &message) != Ordering::Greater);

        self.messages.insert(index, message);
    }

    fn position_of(&self, message: &M) -> Option<usize> {
        if let Some(index) = self.messages.iter().position(|m| m.id() == message.id()) {
            return Some(index);
        }

        if let Some(client_id) = message.client_message_id() {
            let found = self
                .messages
                .iter()
                .position(|m| m.client_message_id() == Some(client_id));

            if found.is_some() {
                return found;
            }
        }

        let window = Duration::milliseconds(DEDUPE_WINDOW_MS);

        self.messages.iter().position(|m| {
            let both_tagged =
                m.client_message_id().is_some() && message.client_message_id().is_some();
            let both_confirmed = m.id() > 0 && message.id() > 0;

            !both_tagged
                && !both_confirmed
                && m.content() == message.content()
                && m.sender_id() == message.sender_id()
                && (m.created_at() - message.created_at()).abs() < window
        })
    }
}

fn creation_order<M: TimelineEntry>(a: &M, b: &M) -> Ordering {
    match (a.id() > 0, b.id() > 0) {
        (true, true) => (a.created_at(), a.id()).cmp(&(b.created_at(), b.id())),
        (true, false) => Ordering::Less,
        (false, true) => Ordering::Greater,
        (false, false) => Ordering::Equal,
    }
}
