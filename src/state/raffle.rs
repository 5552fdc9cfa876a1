use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

use super::member_database::MemberDatabase;
use crate::error::{BotError, Result};

/// Raffles run by the clan, persisted as JSON.
/// At most one raffle is open at a time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RaffleBook {
    /// Schema version for migrations
    pub version: u32,

    pub last_updated: DateTime<Utc>,

    pub next_id: u64,

    /// Every raffle, oldest first
    pub raffles: Vec<Raffle>,
}

impl Default for RaffleBook {
    fn default() -> Self {
        Self {
            version: 1,
            last_updated: Utc::now(),
            next_id: 1,
            raffles: Vec::new(),
        }
    }
}

/// A single raffle and the tickets bought into it
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Raffle {
    pub id: u64,
    pub name: String,

    /// Ingots per ticket
    pub ticket_price: i64,

    /// Tickets held, by member id
    #[serde(default)]
    pub tickets: BTreeMap<u64, u32>,

    pub started_at: DateTime<Utc>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ended_at: Option<DateTime<Utc>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub winner: Option<u64>,
}

impl Raffle {
    pub fn is_open(&self) -> bool {
        self.ended_at.is_none()
    }

    pub fn total_tickets(&self) -> u64 {
        self.tickets.values().map(|&n| u64::from(n)).sum()
    }

    /// Ingots spent on this raffle so far
    pub fn pot(&self) -> i64 {
        self.ticket_price
            .saturating_mul(i64::try_from(self.total_tickets()).unwrap_or(i64::MAX))
    }

    /// Member holding ticket number `index`, counting through holders in id order
    pub fn ticket_holder(&self, index: u64) -> Option<u64> {
        let mut remaining = index;
        for (&member_id, &count) in &self.tickets {
            let count = u64::from(count);
            if remaining < count {
                return Some(member_id);
            }
            remaining -= count;
        }
        None
    }
}

/// How a raffle ended
#[derive(Debug, Clone, PartialEq)]
pub struct RaffleResult {
    pub raffle_id: u64,
    pub name: String,
    pub total_tickets: u64,
    pub pot: i64,
    /// None when nobody bought a ticket
    pub winner: Option<u64>,
}

impl RaffleBook {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load from a JSON file, or create new if not exists
    pub async fn load(path: &str) -> Result<Self> {
        match tokio::fs::read_to_string(path).await {
            Ok(content) => serde_json::from_str(&content).map_err(|e| BotError::ConfigParse {
                path: path.to_string(),
                source: e,
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::new()),
            Err(e) => Err(BotError::StateLoad {
                path: path.to_string(),
                source: e,
            }),
        }
    }

    /// Save to a JSON file atomically
    pub async fn save(&self, path: &str) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;

        let temp_path = format!("{}.tmp", path);
        tokio::fs::write(&temp_path, &content)
            .await
            .map_err(|e| BotError::StateSave {
                path: path.to_string(),
                source: e,
            })?;

        tokio::fs::rename(&temp_path, path)
            .await
            .map_err(|e| BotError::StateSave {
                path: path.to_string(),
                source: e,
            })?;

        Ok(())
    }

    pub fn active(&self) -> Option<&Raffle> {
        self.raffles.iter().find(|r| r.is_open())
    }

    fn active_mut(&mut self) -> Result<&mut Raffle> {
        self.last_updated = Utc::now();
        self.raffles
            .iter_mut()
            .find(|r| r.is_open())
            .ok_or(BotError::NoActiveRaffle)
    }

    /// Open a new raffle and return its identifier
    pub fn start(&mut self, name: &str, ticket_price: i64) -> Result<u64> {
        if let Some(open) = self.active() {
            return Err(BotError::RaffleAlreadyRunning {
                name: open.name.clone(),
            });
        }
        if ticket_price <= 0 {
            return Err(BotError::Internal {
                message: format!("ticket price must be positive, got {}", ticket_price),
            });
        }

        let id = self.next_id;
        self.next_id += 1;
        self.raffles.push(Raffle {
            id,
            name: name.trim().to_string(),
            ticket_price,
            tickets: BTreeMap::new(),
            started_at: Utc::now(),
            ended_at: None,
            winner: None,
        });
        self.last_updated = Utc::now();
        Ok(id)
    }

    /// Buy tickets in the open raffle, paid from the member's ingots.
    ///
    /// Nothing changes unless the member can pay for every ticket.
    /// Returns how many tickets the member now holds.
    pub fn buy_tickets(
        &mut self,
        members: &mut MemberDatabase,
        nickname: &str,
        count: u32,
    ) -> Result<u32> {
        let raffle = self.active_mut()?;
        let member_id =
            members
                .find_id_by_nickname(nickname)
                .ok_or_else(|| BotError::MemberNotFound {
                    nickname: nickname.to_string(),
                })?;
        let cost = raffle
            .ticket_price
            .checked_mul(i64::from(count))
            .ok_or_else(|| BotError::Internal {
                message: format!("{} tickets cost more ingots than can be counted", count),
            })?;

        members.adjust_ingots(nickname, -cost)?;

        let held = raffle.tickets.entry(member_id).or_insert(0);
        *held = held.saturating_add(count);
        Ok(*held)
    }

    /// Close the open raffle and draw a winner weighted by tickets held
    pub fn end(&mut self) -> Result<RaffleResult> {
        self.end_with(|total| rand::rng().random_range(0..total))
    }

    /// Close the open raffle. `pick` gets the ticket count, which is never zero,
    /// and returns the winning ticket's index.
    pub fn end_with(&mut self, pick: impl FnOnce(u64) -> u64) -> Result<RaffleResult> {
        let raffle = self.active_mut()?;
        let total_tickets = raffle.total_tickets();
        let winner = if total_tickets == 0 {
            None
        } else {
            raffle.ticket_holder(pick(total_tickets) % total_tickets)
        };

        raffle.ended_at = Some(Utc::now());
        raffle.winner = winner;
        Ok(RaffleResult {
            raffle_id: raffle.id,
            name: raffle.name.clone(),
            total_tickets,
            pot: raffle.pot(),
            winner,
        })
    }
}

/// Shared raffle book type
pub type SharedRaffleBook = Arc<tokio::sync::RwLock<RaffleBook>>;

pub fn create_shared_raffle_book(book: RaffleBook) -> SharedRaffleBook {
    Arc::new(tokio::sync::RwLock::new(book))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::MemberDirectory;

    fn members() -> MemberDatabase {
        let mut db = MemberDatabase::new();
        db.create_member("Alice", 1);
        db.create_member("Bob", 1);
        db.adjust_ingots("Alice", 100).unwrap();
        db.adjust_ingots("Bob", 25).unwrap();
        db
    }

    #[test]
    fn test_buy_tickets_charges_ingots() {
        let mut db = members();
        let mut book = RaffleBook::new();
        book.start("Spring raffle", 10).unwrap();

        assert_eq!(book.buy_tickets(&mut db, "alice", 3).unwrap(), 3);
        assert_eq!(book.buy_tickets(&mut db, "Alice", 2).unwrap(), 5);

        assert_eq!(db.get_member_by_nickname("Alice").unwrap().ingots, 50);
        let raffle = book.active().unwrap();
        assert_eq!(raffle.total_tickets(), 5);
        assert_eq!(raffle.pot(), 50);
    }

    #[test]
    fn test_buy_tickets_with_insufficient_ingots() {
        let mut db = members();
        let mut book = RaffleBook::new();
        book.start("Spring raffle", 10).unwrap();

        let result = book.buy_tickets(&mut db, "Bob", 3);
        assert!(matches!(
            result,
            Err(BotError::InsufficientIngots { balance: 25, .. })
        ));
        assert_eq!(db.get_member_by_nickname("Bob").unwrap().ingots, 25);
        assert_eq!(book.active().unwrap().total_tickets(), 0);

        // Two tickets are affordable
        assert_eq!(book.buy_tickets(&mut db, "Bob", 2).unwrap(), 2);
        assert_eq!(db.get_member_by_nickname("Bob").unwrap().ingots, 5);
    }

    #[test]
    fn test_buy_tickets_needs_open_raffle_and_known_member() {
        let mut db = members();
        let mut book = RaffleBook::new();

        assert!(matches!(
            book.buy_tickets(&mut db, "Alice", 1),
            Err(BotError::NoActiveRaffle)
        ));
        assert_eq!(db.get_member_by_nickname("Alice").unwrap().ingots, 100);

        book.start("Spring raffle", 10).unwrap();
        assert!(matches!(
            book.buy_tickets(&mut db, "Nobody", 1),
            Err(BotError::MemberNotFound { .. })
        ));
    }

    #[test]
    fn test_only_one_open_raffle() {
        let mut book = RaffleBook::new();
        let first = book.start("Spring raffle", 10).unwrap();

        assert!(matches!(
            book.start("Summer raffle", 10),
            Err(BotError::RaffleAlreadyRunning { .. })
        ));
        assert!(book.start("Summer raffle", 0).is_err());

        book.end_with(|_| 0).unwrap();
        let second = book.start("Summer raffle", 5).unwrap();
        assert_eq!(second, first + 1);
        assert_eq!(book.active().unwrap().name, "Summer raffle");
    }

    #[test]
    fn test_draw_is_weighted_by_tickets() {
        let mut db = members();
        let alice = db.find_id_by_nickname("Alice").unwrap();
        let bob = db.find_id_by_nickname("Bob").unwrap();

        let mut book = RaffleBook::new();
        book.start("Spring raffle", 5).unwrap();
        book.buy_tickets(&mut db, "Alice", 3).unwrap();
        book.buy_tickets(&mut db, "Bob", 2).unwrap();

        // Tickets 0..3 belong to Alice and 3..5 to Bob
        let raffle = book.active().unwrap();
        assert_eq!(raffle.ticket_holder(0), Some(alice));
        assert_eq!(raffle.ticket_holder(2), Some(alice));
        assert_eq!(raffle.ticket_holder(3), Some(bob));
        assert_eq!(raffle.ticket_holder(4), Some(bob));
        assert_eq!(raffle.ticket_holder(5), None);

        let result = book.end_with(|total| {
            assert_eq!(total, 5);
            3
        });
        let result = result.unwrap();
        assert_eq!(result.winner, Some(bob));
        assert_eq!(result.pot, 25);
        assert!(book.active().is_none());
        assert_eq!(book.raffles[0].winner, Some(bob));
    }

    #[test]
    fn test_end_without_tickets_has_no_winner() {
        let mut book = RaffleBook::new();
        book.start("Quiet raffle", 10).unwrap();

        let result = book.end_with(|_| panic!("nothing to draw")).unwrap();
        assert_eq!(result.winner, None);
        assert_eq!(result.total_tickets, 0);
        assert!(matches!(book.end(), Err(BotError::NoActiveRaffle)));
    }

    #[test]
    fn test_random_draw_picks_a_ticket_holder() {
        let mut db = members();
        let mut book = RaffleBook::new();
        book.start("Spring raffle", 10).unwrap();
        book.buy_tickets(&mut db, "Bob", 1).unwrap();

        let result = book.end().unwrap();
        assert_eq!(result.winner, db.find_id_by_nickname("Bob"));
    }

    #[tokio::test]
    async fn test_save_and_load_round_trip() {
        let path = std::env::temp_dir()
            .join(format!("clanbot-raffles-{}.json", uuid::Uuid::new_v4()))
            .to_string_lossy()
            .to_string();

        let mut db = members();
        let mut book = RaffleBook::new();
        book.start("Spring raffle", 10).unwrap();
        book.buy_tickets(&mut db, "Alice", 4).unwrap();
        book.save(&path).await.unwrap();

        let loaded = RaffleBook::load(&path).await.unwrap();
        assert_eq!(loaded.active().unwrap().total_tickets(), 4);
        assert_eq!(loaded.next_id, 2);

        tokio::fs::remove_file(&path).await.ok();
    }
}
