//! Event-type aliasing: the bridge tags commits with stable names and
//! translates tagged bodies during replay.

mod support;

use support::{strict_repository, Ledger, LedgerEvent};
use unicity::{
    Aggregate, AggregateId, BucketId, CommitId, ConflictDetector, EventTypeBridge, Repository,
};
use unicity_memory::InMemoryEventStore;

/// Bridge for streams written when entries were recorded in whole units;
/// replay converts tagged bodies to cents.
struct CentsUpcaster;

const WHOLE_UNITS_ALIAS: &str = "ledger.entry-added.v1";

impl EventTypeBridge<LedgerEvent> for CentsUpcaster {
    fn resolve_event_name(&self, event: &LedgerEvent) -> Option<String> {
        match event {
            LedgerEvent::EntryAdded { .. } => Some(WHOLE_UNITS_ALIAS.to_owned()),
            LedgerEvent::Opened { .. } => None,
        }
    }

    fn translate(&self, stored: LedgerEvent, alias: &str) -> LedgerEvent {
        match (stored, alias) {
            (LedgerEvent::EntryAdded { amount }, WHOLE_UNITS_ALIAS) => {
                LedgerEvent::EntryAdded {
                    amount: amount * 100,
                }
            }
            (event, _) => event,
        }
    }
}

fn bridged_repository(
    store: &InMemoryEventStore<LedgerEvent>,
) -> Repository<InMemoryEventStore<LedgerEvent>> {
    Repository::new(store.clone(), ConflictDetector::new(), CentsUpcaster)
}

#[tokio::test]
async fn tagged_events_are_translated_during_replay() {
    let store = InMemoryEventStore::<LedgerEvent>::new();
    let bucket = BucketId::default();

    let mut writer = bridged_repository(&store);
    let mut ledger = Ledger::open(AggregateId::generate());
    let id = ledger.id();
    ledger.add_entry(3);
    ledger.add_entry(4);
    writer
        .save(&bucket, &mut ledger, CommitId::new())
        .await
        .unwrap();

    let mut reader = bridged_repository(&store);
    let translated: Ledger = reader.get_latest(&bucket, id).await.unwrap();

    assert_eq!(translated.balance, 700);
    assert_eq!(translated.entry_count, 2);
    assert_eq!(translated.version(), 3);
}

#[tokio::test]
async fn untagged_events_replay_unchanged() {
    let store = InMemoryEventStore::<LedgerEvent>::new();
    let bucket = BucketId::default();

    // Written without a bridge, so no alias headers are stored and the
    // bridged reader has nothing to translate.
    let mut writer = strict_repository(&store);
    let mut ledger = Ledger::open(AggregateId::generate());
    let id = ledger.id();
    ledger.add_entry(3);
    writer
        .save(&bucket, &mut ledger, CommitId::new())
        .await
        .unwrap();

    let mut reader = bridged_repository(&store);
    let loaded: Ledger = reader.get_latest(&bucket, id).await.unwrap();

    assert_eq!(loaded.balance, 3);
}
