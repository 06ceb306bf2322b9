use chyme::unread::UnreadCounter;
use chyme_types::ContactId;

#[test]
fn test_counts_start_at_zero() {
    let counter = UnreadCounter::new();
    assert_eq!(counter.count(ContactId::generate()), 0);
    assert_eq!(counter.total(), 0);
    assert_eq!(counter.open(), None);
}

#[test]
fn test_inbound_increments_when_not_open() {
    let mut counter = UnreadCounter::new();
    let alice = ContactId::generate();
    let bob = ContactId::generate();
    counter.on_inbound_message(alice);
    counter.on_inbound_message(alice);
    counter.on_inbound_message(bob);
    assert_eq!(counter.count(alice), 2);
    assert_eq!(counter.count(bob), 1);
    assert_eq!(counter.total(), 3);
}

#[test]
fn test_open_conversation_absorbs_inbound() {
    let mut counter = UnreadCounter::new();
    let alice = ContactId::generate();
    counter.on_conversation_opened(alice);
    counter.on_inbound_message(alice);
    counter.on_inbound_message(alice);
    assert_eq!(counter.count(alice), 0);
}

#[test]
fn test_open_resets_existing_count() {
    let mut counter = UnreadCounter::new();
    let alice = ContactId::generate();
    counter.on_inbound_message(alice);
    counter.on_inbound_message(alice);
    assert_eq!(counter.count(alice), 2);
    counter.on_conversation_opened(alice);
    assert_eq!(counter.count(alice), 0);
}

#[test]
fn test_close_resumes_counting() {
    let mut counter = UnreadCounter::new();
    let alice = ContactId::generate();
    counter.on_conversation_opened(alice);
    counter.on_inbound_message(alice);
    counter.on_conversation_closed();
    counter.on_inbound_message(alice);
    assert_eq!(counter.count(alice), 1);
}

// Count equals inbound events since the last open for that contact, for any
// interleaving of the two event kinds.
#[test]
fn test_interleavings_hold_invariant() {
    let mut counter = UnreadCounter::new();
    let alice = ContactId::generate();
    let bob = ContactId::generate();
    counter.on_inbound_message(alice);
    counter.on_conversation_opened(bob);
    counter.on_inbound_message(alice);
    counter.on_inbound_message(bob);
    counter.on_conversation_opened(alice);
    counter.on_inbound_message(bob);
    assert_eq!(counter.count(alice), 0);
    // bob's event while bob was open did not count; the one after the
    // switch to alice did.
    assert_eq!(counter.count(bob), 1);
    assert_eq!(counter.total(), 1);
}

#[test]
fn test_seed_replaces_counts_and_respects_open() {
    let mut counter = UnreadCounter::new();
    let alice = ContactId::generate();
    let bob = ContactId::generate();
    counter.on_inbound_message(bob);
    counter.on_conversation_opened(alice);
    counter.seed(vec![alice, bob, bob]);
    assert_eq!(counter.count(alice), 0, "open conversation stays at zero");
    assert_eq!(counter.count(bob), 2);
}
