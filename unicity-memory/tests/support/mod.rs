//! Shared test domain: a uniquely-numbered account aggregate and a plain
//! ledger aggregate for replay counting.

#![allow(dead_code)]

use unicity::{
    Aggregate, AggregateConstructor, AggregateId, BucketId, CommitId, ConflictDetector,
    DomainEvent, NoopBridge, Rehydrate, Repository, UniqueConstraint,
};
use unicity_memory::InMemoryEventStore;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccountEvent {
    Opened {
        id: AggregateId,
        number: String,
        name: String,
    },
    Renamed {
        name: String,
    },
    Closed,
}

impl DomainEvent for AccountEvent {
    fn kind(&self) -> &'static str {
        match self {
            Self::Opened { .. } => "account.opened",
            Self::Renamed { .. } => "account.renamed",
            Self::Closed => "account.closed",
        }
    }
}

/// An account with a globally unique number and a name unique among open
/// accounts (closing an account releases its name).
#[derive(Debug)]
pub struct Account {
    id: Option<AggregateId>,
    version: u64,
    pub number: String,
    pub name: String,
    pub closed: bool,
    uncommitted: Vec<AccountEvent>,
}

impl Account {
    fn shell() -> Self {
        Self {
            id: None,
            version: 0,
            number: String::new(),
            name: String::new(),
            closed: false,
            uncommitted: Vec::new(),
        }
    }

    pub fn open(id: AggregateId, number: &str, name: &str) -> Self {
        let mut account = Self::shell();
        account.raise(AccountEvent::Opened {
            id,
            number: number.to_owned(),
            name: name.to_owned(),
        });
        account
    }

    pub fn rename(&mut self, name: &str) {
        self.raise(AccountEvent::Renamed {
            name: name.to_owned(),
        });
    }

    pub fn close(&mut self) {
        self.raise(AccountEvent::Closed);
    }

    fn raise(&mut self, event: AccountEvent) {
        self.apply(&event);
        self.uncommitted.push(event);
    }
}

impl Aggregate for Account {
    type Event = AccountEvent;

    fn aggregate_type() -> &'static str {
        "account"
    }

    fn id(&self) -> AggregateId {
        self.id.expect("account has an identity")
    }

    fn version(&self) -> u64 {
        self.version
    }

    fn apply(&mut self, event: &AccountEvent) {
        match event {
            AccountEvent::Opened { id, number, name } => {
                self.id = Some(*id);
                self.number = number.clone();
                self.name = name.clone();
            }
            AccountEvent::Renamed { name } => {
                self.name = name.clone();
            }
            AccountEvent::Closed => {
                self.closed = true;
            }
        }
        self.version += 1;
    }

    fn uncommitted_events(&self) -> &[AccountEvent] {
        &self.uncommitted
    }

    fn clear_uncommitted_events(&mut self) {
        self.uncommitted.clear();
    }

    fn unique_constraints(&self) -> Vec<UniqueConstraint> {
        vec![
            UniqueConstraint::field("Number", self.number.as_str()),
            UniqueConstraint::composite([
                UniqueConstraint::field("Name", self.name.as_str()),
                UniqueConstraint::field("Closed", self.closed),
            ]),
        ]
    }
}

impl Rehydrate for Account {
    fn constructor() -> AggregateConstructor<Self> {
        AggregateConstructor::Bare {
            new: Self::shell,
            restore_id: |account, id| account.id = Some(id),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LedgerEvent {
    Opened { id: AggregateId },
    EntryAdded { amount: i64 },
}

impl DomainEvent for LedgerEvent {
    fn kind(&self) -> &'static str {
        match self {
            Self::Opened { .. } => "ledger.opened",
            Self::EntryAdded { .. } => "ledger.entry-added",
        }
    }
}

/// An unconstrained aggregate used to count applied events and balances.
#[derive(Debug)]
pub struct Ledger {
    id: AggregateId,
    version: u64,
    pub balance: i64,
    pub entry_count: u64,
    uncommitted: Vec<LedgerEvent>,
}

impl Ledger {
    fn with_id(id: AggregateId) -> Self {
        Self {
            id,
            version: 0,
            balance: 0,
            entry_count: 0,
            uncommitted: Vec::new(),
        }
    }

    pub fn open(id: AggregateId) -> Self {
        let mut ledger = Self::with_id(id);
        ledger.raise(LedgerEvent::Opened { id });
        ledger
    }

    pub fn add_entry(&mut self, amount: i64) {
        self.raise(LedgerEvent::EntryAdded { amount });
    }

    fn raise(&mut self, event: LedgerEvent) {
        self.apply(&event);
        self.uncommitted.push(event);
    }
}

impl Aggregate for Ledger {
    type Event = LedgerEvent;

    fn aggregate_type() -> &'static str {
        "ledger"
    }

    fn id(&self) -> AggregateId {
        self.id
    }

    fn version(&self) -> u64 {
        self.version
    }

    fn apply(&mut self, event: &LedgerEvent) {
        match event {
            LedgerEvent::Opened { id } => {
                self.id = *id;
            }
            LedgerEvent::EntryAdded { amount } => {
                self.balance += amount;
                self.entry_count += 1;
            }
        }
        self.version += 1;
    }

    fn uncommitted_events(&self) -> &[LedgerEvent] {
        &self.uncommitted
    }

    fn clear_uncommitted_events(&mut self) {
        self.uncommitted.clear();
    }
}

impl Rehydrate for Ledger {
    fn constructor() -> AggregateConstructor<Self> {
        AggregateConstructor::WithId(Self::with_id)
    }
}

/// A repository with no conflict rules: every concurrent pair conflicts.
pub fn strict_repository<E: DomainEvent + 'static>(
    store: &InMemoryEventStore<E>,
) -> Repository<InMemoryEventStore<E>> {
    Repository::new(store.clone(), ConflictDetector::new(), NoopBridge)
}

/// Opens and saves an account, returning its id.
pub async fn save_new_account(
    store: &InMemoryEventStore<AccountEvent>,
    bucket: &BucketId,
    number: &str,
    name: &str,
    closed: bool,
) -> Result<AggregateId, unicity::RepositoryError> {
    let mut repository = strict_repository(store);
    let mut account = Account::open(AggregateId::generate(), number, name);
    if closed {
        account.close();
    }
    let id = account.id();
    repository
        .save(bucket, &mut account, CommitId::new())
        .await?;
    Ok(id)
}
