//! End-to-end tests: publisher book -> field messages -> listeners.
//!
//! A publishing `OrderBook` is mutated programmatically and its recap and
//! delta messages are fed to structured and streaming listeners. The
//! listener books must stay structurally equal to the publisher's under both
//! level pruning policies, and the callbacks must describe what changed.

use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Arc;

use depthcast_book::{
    BasicDelta, BookEntry, DeltaList, LevelSnapshot, OrderBook, PriceLevel, books_equal,
    first_difference,
};
use depthcast_listener::*;
use depthcast_types::*;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rust_decimal::Decimal;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn px(p: i64) -> Decimal {
    Decimal::new(p, 0)
}

fn publisher(pruning: LevelPruning) -> OrderBook {
    let config = BookConfig {
        level_pruning: pruning,
        ..BookConfig::publishing()
    };
    OrderBook::with_config(BookId::new("JMG"), config, Arc::new(BookFields::default()))
}

fn listener(pruning: LevelPruning) -> OrderBookListener {
    let config = ListenerConfig {
        level_pruning: pruning,
        ..ListenerConfig::default()
    };
    OrderBookListener::with_config(BookId::new("JMG"), config, Arc::new(BookFields::default()))
}

fn recap(book: &mut OrderBook) -> FieldMsg {
    let mut msg = FieldMsg::new();
    book.populate_recap(&mut msg).unwrap();
    book.clear_delta_list();
    msg
}

fn delta(book: &mut OrderBook) -> Option<FieldMsg> {
    let mut msg = FieldMsg::new();
    let written = book.populate_delta(&mut msg).unwrap();
    book.clear_delta_list();
    written.then_some(msg)
}

fn assert_same(publisher: &OrderBook, consumer: &OrderBook) {
    assert!(
        books_equal(publisher, consumer),
        "books differ: {:?}",
        first_difference(publisher, consumer)
    );
}

// ---------------------------------------------------------------------------
// Recording handlers
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
enum Event {
    Recap(usize),
    Delta {
        price: Decimal,
        pl_action: BookAction,
        entry_action: Option<BookAction>,
    },
    ComplexDelta(usize),
    Clear,
    Gap(SeqGap),
    Level(Decimal, BookAction),
    Error(String),
    Quality(Quality, Quality),
}

#[derive(Clone, Default)]
struct Recorder(Rc<RefCell<Vec<Event>>>);

impl Recorder {
    fn take(&self) -> Vec<Event> {
        std::mem::take(&mut *self.0.borrow_mut())
    }
}

impl BookHandler for Recorder {
    fn on_book_recap(&mut self, _event: &BookEvent<'_>, book: &OrderBook) {
        self.0.borrow_mut().push(Event::Recap(book.total_num_levels()));
    }

    fn on_book_delta(&mut self, _event: &BookEvent<'_>, delta: &BasicDelta, _book: &OrderBook) {
        self.0.borrow_mut().push(Event::Delta {
            price: delta.level.price,
            pl_action: delta.pl_action,
            entry_action: delta.entry_action,
        });
    }

    fn on_book_complex_delta(
        &mut self,
        _event: &BookEvent<'_>,
        deltas: &DeltaList,
        _book: &OrderBook,
    ) {
        self.0.borrow_mut().push(Event::ComplexDelta(deltas.len()));
    }

    fn on_book_clear(&mut self, _event: &BookEvent<'_>, _book: &OrderBook) {
        self.0.borrow_mut().push(Event::Clear);
    }

    fn on_book_gap(&mut self, _event: &BookEvent<'_>, gap: SeqGap, _book: &OrderBook) {
        self.0.borrow_mut().push(Event::Gap(gap));
    }
}

impl LevelHandler for Recorder {
    fn on_level_delta(&mut self, _event: &BookEvent<'_>, level: &LevelSnapshot) {
        self.0.borrow_mut().push(Event::Level(level.price, level.action));
    }
}

impl ErrorHandler for Recorder {
    fn on_book_error(&mut self, _symbol: &str, error: &DepthcastError) {
        self.0.borrow_mut().push(Event::Error(error.to_string()));
    }
}

impl QualityHandler for Recorder {
    fn on_quality_change(&mut self, _symbol: &str, old: Quality, new: Quality) {
        self.0.borrow_mut().push(Event::Quality(old, new));
    }
}

fn recorded(listener: &mut OrderBookListener) -> Recorder {
    let recorder = Recorder::default();
    listener.add_book_handler(Box::new(recorder.clone()));
    listener.add_error_handler(Box::new(recorder.clone()));
    listener.add_quality_handler(Box::new(recorder.clone()));
    recorder
}

// ---------------------------------------------------------------------------
// Structured listener
// ---------------------------------------------------------------------------

fn add_then_delete(pruning: LevelPruning) {
    init_tracing();
    let mut book = publisher(pruning);
    let mut consumer = listener(pruning);
    let recorder = recorded(&mut consumer);
    consumer.on_msg(&recap(&mut book));
    assert_eq!(recorder.take(), vec![Event::Recap(0)]);

    book.add_entry(Side::Bid, px(100), BookEntry::new("jmg", px(50), None), None)
        .unwrap();
    consumer.on_msg(&delta(&mut book).unwrap());
    assert_same(&book, consumer.book());
    assert_eq!(
        recorder.take(),
        vec![Event::Delta {
            price: px(100),
            pl_action: BookAction::Add,
            entry_action: Some(BookAction::Add),
        }]
    );

    book.delete_entry(Side::Bid, px(100), "jmg", None, None)
        .unwrap();
    consumer.on_msg(&delta(&mut book).unwrap());
    assert_same(&book, consumer.book());
    let expected_level_action = match pruning {
        LevelPruning::Immediate => BookAction::Delete,
        LevelPruning::Retain => BookAction::Update,
    };
    assert_eq!(
        recorder.take(),
        vec![Event::Delta {
            price: px(100),
            pl_action: expected_level_action,
            entry_action: Some(BookAction::Delete),
        }]
    );
    assert_eq!(
        consumer.book().bid_depth(),
        usize::from(pruning == LevelPruning::Retain)
    );
}

#[test]
fn single_entry_add_and_delete_with_pruning() {
    add_then_delete(LevelPruning::Immediate);
}

#[test]
fn single_entry_add_and_delete_when_retaining() {
    add_then_delete(LevelPruning::Retain);
}

#[test]
fn recap_rebuilds_publisher_book() {
    init_tracing();
    let mut book = publisher(LevelPruning::Immediate);
    for (i, price) in [99, 99, 98, 101, 102, 102, 102].into_iter().enumerate() {
        let side = if price < 100 { Side::Bid } else { Side::Ask };
        let entry = BookEntry::new(EntryId::numbered(i), px(10 + price), None).with_status(3);
        book.add_entry(side, px(price), entry, None).unwrap();
    }

    let mut consumer = listener(LevelPruning::Immediate);
    consumer.on_msg(&recap(&mut book));
    assert_same(&book, consumer.book());
    assert_eq!(consumer.book().best_bid(), Some(px(99)));
    assert_eq!(consumer.book().best_ask(), Some(px(101)));
    let resting = consumer.book().find_level(Side::Ask, px(102)).unwrap();
    assert_eq!(resting.num_entries(), 3);
    assert!(resting.entries().iter().all(|e| e.status == 3));
}

#[test]
fn multi_level_update_is_one_complex_delta() {
    let mut book = publisher(LevelPruning::Immediate);
    let mut consumer = listener(LevelPruning::Immediate);
    let recorder = recorded(&mut consumer);
    let levels = recorder.clone();
    consumer.add_level_handler(Box::new(levels));
    consumer.on_msg(&recap(&mut book));
    recorder.take();

    book.add_entry(Side::Bid, px(100), BookEntry::new("a", px(5), None), None)
        .unwrap();
    book.add_entry(Side::Bid, px(100), BookEntry::new("b", px(7), None), None)
        .unwrap();
    book.add_entry(Side::Ask, px(101), BookEntry::new("c", px(9), None), None)
        .unwrap();
    let msg = delta(&mut book).unwrap();
    assert!(msg.contains(&book.fields().price_levels));
    consumer.on_msg(&msg);

    assert_same(&book, consumer.book());
    assert_eq!(
        recorder.take(),
        vec![
            Event::ComplexDelta(3),
            Event::Level(px(100), BookAction::Update),
            Event::Level(px(101), BookAction::Add),
        ]
    );
}

#[test]
fn single_change_is_written_flat() {
    let mut book = publisher(LevelPruning::Immediate);
    book.add_entry(Side::Ask, px(101), BookEntry::new("x", px(3), None), None)
        .unwrap();
    let msg = delta(&mut book).unwrap();
    let fields = BookFields::default();
    assert!(!msg.contains(&fields.price_levels));
    assert!(!msg.contains(&fields.pl_entries));
    assert_eq!(msg.try_decimal(&fields.pl_price).unwrap(), Some(px(101)));
    assert_eq!(msg.try_str(&fields.entry_id).unwrap(), Some("x"));
    assert_eq!(msg.try_u32(&fields.num_levels).unwrap(), Some(1));
}

#[test]
fn gap_leaves_book_unchanged_until_recap() {
    init_tracing();
    let mut book = publisher(LevelPruning::Immediate);
    let mut consumer = listener(LevelPruning::Immediate);
    let recorder = recorded(&mut consumer);
    consumer.on_msg(&recap(&mut book));

    book.add_entry(Side::Bid, px(100), BookEntry::new("a", px(5), None), None)
        .unwrap();
    consumer.on_msg(&delta(&mut book).unwrap());
    recorder.take();
    let before = consumer.book().snapshot();

    // Sequence numbers 3 and 4 are never delivered.
    for id in ["b", "c"] {
        book.add_entry(Side::Bid, px(99), BookEntry::new(id, px(1), None), None)
            .unwrap();
        delta(&mut book).unwrap();
    }
    book.add_entry(Side::Ask, px(101), BookEntry::new("d", px(2), None), None)
        .unwrap();
    consumer.on_msg(&delta(&mut book).unwrap());

    assert_eq!(recorder.take(), vec![Event::Gap(SeqGap { begin: 3, end: 4 })]);
    assert!(!consumer.book().is_consistent());
    assert_same(&before, consumer.book());

    // Later updates are applied but not reported while inconsistent.
    book.update_entry(Side::Bid, px(100), "a", px(8), None)
        .unwrap();
    consumer.on_msg(&delta(&mut book).unwrap());
    assert!(recorder.take().is_empty());
    assert_eq!(consumer.book().find_level(Side::Bid, px(100)).unwrap().size(), px(8));

    consumer.on_msg(&recap(&mut book));
    assert!(consumer.book().is_consistent());
    assert_same(&book, consumer.book());
}

#[test]
fn duplicate_update_is_ignored() {
    let mut book = publisher(LevelPruning::Immediate);
    let mut consumer = listener(LevelPruning::Immediate);
    let recorder = recorded(&mut consumer);
    consumer.on_msg(&recap(&mut book));
    recorder.take();

    book.add_entry(Side::Bid, px(100), BookEntry::new("a", px(5), None), None)
        .unwrap();
    let msg = delta(&mut book).unwrap();
    consumer.on_msg(&msg);
    recorder.take();
    consumer.on_msg(&msg);

    assert!(recorder.take().is_empty());
    assert_same(&book, consumer.book());
}

#[test]
fn update_before_initial_is_reported() {
    let mut book = publisher(LevelPruning::Immediate);
    book.add_entry(Side::Bid, px(100), BookEntry::new("a", px(5), None), None)
        .unwrap();
    let mut consumer = listener(LevelPruning::Immediate);
    let recorder = recorded(&mut consumer);
    consumer.on_msg(&delta(&mut book).unwrap());

    let events = recorder.take();
    assert_eq!(events.len(), 1);
    assert!(matches!(&events[0], Event::Error(e) if e.starts_with("DC_ERR_203")));
    assert!(consumer.book().is_empty());
}

#[test]
fn duplicate_entry_in_recap_is_reported_and_skipped() {
    let fields = BookFields::default();
    let mut first = FieldMsg::new();
    first.add(&fields.entry_id, "x");
    first.add(&fields.entry_size, px(4));
    let second = first.clone();

    let mut msg = FieldMsg::new();
    msg.add(&fields.msg_type, MsgType::Initial.code());
    msg.add(&fields.seq_num, 1u64);
    msg.add(&fields.num_levels, 1u32);
    msg.add(&fields.pl_price, px(100));
    msg.add(&fields.pl_num_attach, 2u32);
    msg.add(&fields.pl_entries, vec![first, second]);

    let mut consumer = listener(LevelPruning::Immediate);
    let recorder = recorded(&mut consumer);
    consumer.on_msg(&msg);

    let events = recorder.take();
    assert_eq!(events.len(), 2);
    assert!(matches!(&events[0], Event::Error(e) if e.starts_with("DC_ERR_102")));
    assert_eq!(events[1], Event::Recap(1));
    let level = consumer.book().find_level(Side::Bid, px(100)).unwrap();
    assert_eq!(level.num_entries(), 1);
    assert_eq!(level.size(), px(4));
}

#[test]
fn stale_book_drops_updates_until_recap() {
    let mut book = publisher(LevelPruning::Immediate);
    let mut consumer = listener(LevelPruning::Immediate);
    let recorder = recorded(&mut consumer);
    consumer.on_msg(&recap(&mut book));
    consumer.set_quality(Quality::Stale);
    recorder.take();

    book.add_entry(Side::Bid, px(100), BookEntry::new("a", px(5), None), None)
        .unwrap();
    consumer.on_msg(&delta(&mut book).unwrap());
    assert!(consumer.book().is_empty());
    assert!(recorder.take().is_empty());

    consumer.on_msg(&recap(&mut book));
    assert_eq!(
        recorder.take(),
        vec![Event::Quality(Quality::Stale, Quality::Ok), Event::Recap(1)]
    );
    assert_same(&book, consumer.book());
}

#[test]
fn clear_message_empties_book() {
    let mut book = publisher(LevelPruning::Immediate);
    let mut consumer = listener(LevelPruning::Immediate);
    let recorder = recorded(&mut consumer);
    book.add_entry(Side::Ask, px(101), BookEntry::new("a", px(5), None), None)
        .unwrap();
    consumer.on_msg(&recap(&mut book));
    recorder.take();

    book.clear();
    let mut msg = FieldMsg::new();
    book.populate_clear(&mut msg).unwrap();
    consumer.on_msg(&msg);

    assert_eq!(recorder.take(), vec![Event::Clear]);
    assert!(consumer.book().is_empty());
}

#[test]
fn ignored_entry_ids_are_not_applied() {
    let mut book = publisher(LevelPruning::Immediate);
    let mut consumer = listener(LevelPruning::Immediate);
    consumer.add_ignore_entry_id("internal");
    consumer.on_msg(&recap(&mut book));

    book.add_entry(Side::Bid, px(100), BookEntry::new("internal", px(5), None), None)
        .unwrap();
    book.add_entry(Side::Bid, px(100), BookEntry::new("public", px(2), None), None)
        .unwrap();
    consumer.on_msg(&delta(&mut book).unwrap());

    let level = consumer.book().find_level(Side::Bid, px(100)).unwrap();
    assert_eq!(level.num_entries(), 1);
    assert_eq!(level.size(), px(2));
}

fn levels_listener(pruning: LevelPruning) -> OrderBookListener {
    let config = ListenerConfig {
        level_pruning: pruning,
        ..ListenerConfig::levels_only()
    };
    OrderBookListener::with_config(BookId::new("JMG"), config, Arc::new(BookFields::default()))
}

fn aggregate_level(side: Side, price: Decimal, size: Decimal, num_entries: u32) -> PriceLevel {
    let mut level = PriceLevel::new(price, side);
    level.set_aggregate(size, num_entries);
    level
}

#[test]
fn level_update_reaches_both_listener_modes() {
    let mut book = publisher(LevelPruning::Immediate);
    let mut entries = listener(LevelPruning::Immediate);
    let mut levels = levels_listener(LevelPruning::Immediate);
    let first = recap(&mut book);
    entries.on_msg(&first);
    levels.on_msg(&first);

    book.add_level(aggregate_level(Side::Bid, px(100), px(10), 2))
        .unwrap();
    let added = delta(&mut book).unwrap();
    entries.on_msg(&added);
    levels.on_msg(&added);

    book.update_level(&aggregate_level(Side::Bid, px(100), px(25), 3))
        .unwrap();
    let updated = delta(&mut book).unwrap();
    entries.on_msg(&updated);
    levels.on_msg(&updated);

    let expected = vec![(px(100), px(25), 3)];
    assert_eq!(aggregates(&book), expected);
    assert_eq!(aggregates(entries.book()), expected);
    assert_eq!(aggregates(levels.book()), expected);
    assert_same(&book, entries.book());
}

#[test]
fn aggregate_level_switches_to_tracked_entries() {
    let mut book = publisher(LevelPruning::Immediate);
    book.add_level(aggregate_level(Side::Ask, px(101), px(10), 3))
        .unwrap();
    let mut consumer = listener(LevelPruning::Immediate);
    let recorder = recorded(&mut consumer);
    consumer.on_msg(&recap(&mut book));
    assert_eq!(aggregates(consumer.book()), vec![(px(101), px(10), 3)]);

    book.add_entry(Side::Ask, px(101), BookEntry::new("a", px(5), None), None)
        .unwrap();
    consumer.on_msg(&delta(&mut book).unwrap());

    assert_same(&book, consumer.book());
    assert_eq!(aggregates(consumer.book()), vec![(px(101), px(5), 1)]);
    assert!(!recorder.take().iter().any(|e| matches!(e, Event::Error(_))));
}

#[test]
fn malformed_entry_leaves_book_untouched() {
    let mut book = publisher(LevelPruning::Immediate);
    book.add_entry(Side::Bid, px(100), BookEntry::new("x", px(1), None), None)
        .unwrap();
    let mut consumer = listener(LevelPruning::Immediate);
    let recorder = recorded(&mut consumer);
    consumer.on_msg(&recap(&mut book));
    recorder.take();
    let before = consumer.book().snapshot();

    let fields = BookFields::default();
    let mut good = FieldMsg::new();
    good.add(&fields.pl_price, px(100));
    good.add(&fields.pl_action, BookAction::Update.code());
    good.add(&fields.entry_id, "a");
    good.add(&fields.entry_size, px(5));
    let mut bad = FieldMsg::new();
    bad.add(&fields.pl_price, px(99));
    bad.add(&fields.entry_id, "b");
    bad.add(&fields.entry_size, "bogus");
    let mut msg = FieldMsg::new();
    msg.add(&fields.msg_type, MsgType::Update.code());
    msg.add(&fields.seq_num, 2u64);
    msg.add(&fields.num_levels, 2u32);
    msg.add(&fields.price_levels, vec![good, bad]);
    consumer.on_msg(&msg);

    let events = recorder.take();
    assert_eq!(events.len(), 1);
    assert!(matches!(&events[0], Event::Error(_)));
    assert_same(&before, consumer.book());
    assert!(consumer.book().find_level(Side::Bid, px(99)).is_none());
}

// ---------------------------------------------------------------------------
// Randomized publisher/consumer agreement
// ---------------------------------------------------------------------------

fn aggregates(book: &OrderBook) -> Vec<(Decimal, Decimal, u32)> {
    book.bid_levels()
        .chain(book.ask_levels())
        .map(|l| (l.price(), l.size(), l.num_entries()))
        .collect()
}

fn random_session(seed: u64, pruning: LevelPruning) {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut book = publisher(pruning);
    let mut entries = listener(pruning);
    let mut levels = OrderBookListener::with_config(
        BookId::new("JMG"),
        ListenerConfig {
            level_pruning: pruning,
            ..ListenerConfig::levels_only()
        },
        Arc::new(BookFields::default()),
    );
    let first = recap(&mut book);
    entries.on_msg(&first);
    levels.on_msg(&first);

    let mut live: Vec<(Side, Decimal, EntryId)> = Vec::new();
    let mut next_id = 0usize;
    for step in 0..600 {
        let roll = rng.gen_range(0..10);
        if roll < 5 || live.is_empty() {
            let side = if rng.gen_bool(0.5) { Side::Bid } else { Side::Ask };
            let price = Decimal::new(rng.gen_range(990..1010), 1);
            let id = EntryId::numbered(next_id);
            next_id += 1;
            let size = px(rng.gen_range(1..100));
            book.add_entry(side, price, BookEntry::new(id.clone(), size, None), None)
                .unwrap();
            live.push((side, price, id));
        } else if roll < 8 {
            let (side, price, id) = &live[rng.gen_range(0..live.len())];
            let size = px(rng.gen_range(1..100));
            book.update_entry(*side, *price, id.as_str(), size, None)
                .unwrap();
        } else {
            let (side, price, id) = live.swap_remove(rng.gen_range(0..live.len()));
            book.delete_entry(side, price, id.as_str(), None, None)
                .unwrap();
        }

        if step % 7 == 6 {
            if let Some(msg) = delta(&mut book) {
                entries.on_msg(&msg);
                levels.on_msg(&msg);
            }
            assert_same(&book, entries.book());
            assert_eq!(aggregates(&book), aggregates(levels.book()), "seed {seed} step {step}");
        }
    }
}

#[test]
fn random_sessions_agree_with_pruning() {
    init_tracing();
    for seed in 0..3 {
        random_session(seed, LevelPruning::Immediate);
    }
}

#[test]
fn random_sessions_agree_when_retaining() {
    for seed in 20..23 {
        random_session(seed, LevelPruning::Retain);
    }
}

fn random_level_session(seed: u64, pruning: LevelPruning) {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut book = publisher(pruning);
    let mut entries = listener(pruning);
    let mut levels = levels_listener(pruning);
    let first = recap(&mut book);
    entries.on_msg(&first);
    levels.on_msg(&first);

    let mut live: Vec<(Side, Decimal)> = Vec::new();
    for step in 0..400 {
        let roll = rng.gen_range(0..10);
        let size = px(rng.gen_range(1..500));
        let count = rng.gen_range(1..20);
        if roll < 4 || live.is_empty() {
            let side = if rng.gen_bool(0.5) { Side::Bid } else { Side::Ask };
            let price = Decimal::new(rng.gen_range(990..1010), 1);
            let level = aggregate_level(side, price, size, count);
            if live.contains(&(side, price)) {
                book.update_level(&level).unwrap();
            } else {
                book.add_level(level).unwrap();
                live.push((side, price));
            }
        } else if roll < 8 {
            let (side, price) = live[rng.gen_range(0..live.len())];
            book.update_level(&aggregate_level(side, price, size, count))
                .unwrap();
        } else {
            let (side, price) = live.swap_remove(rng.gen_range(0..live.len()));
            book.delete_level(side, price).unwrap();
        }

        if step % 5 == 4 {
            if let Some(msg) = delta(&mut book) {
                entries.on_msg(&msg);
                levels.on_msg(&msg);
            }
            let expected = aggregates(&book);
            assert_eq!(expected, aggregates(entries.book()), "seed {seed} step {step}");
            assert_eq!(expected, aggregates(levels.book()), "seed {seed} step {step}");
        }
    }
    assert_same(&book, entries.book());
}

#[test]
fn random_level_sessions_agree() {
    for seed in 40..43 {
        random_level_session(seed, LevelPruning::Immediate);
    }
    random_level_session(60, LevelPruning::Retain);
}

// ---------------------------------------------------------------------------
// Re-publication from a listener-owned book
// ---------------------------------------------------------------------------

#[test]
fn listener_book_republishes_downstream() {
    let mut book = publisher(LevelPruning::Immediate);
    book.add_entry(Side::Bid, px(100), BookEntry::new("a", px(5), None), None)
        .unwrap();
    book.add_entry(Side::Ask, px(102), BookEntry::new("b", px(6), None), None)
        .unwrap();

    let mut relay = listener(LevelPruning::Immediate);
    relay.book_mut().generate_delta_msgs(true);
    let mut downstream = listener(LevelPruning::Immediate);

    relay.on_msg(&recap(&mut book));
    downstream.on_msg(&recap(relay.book_mut()));
    assert_same(&book, downstream.book());

    book.update_entry(Side::Bid, px(100), "a", px(9), None)
        .unwrap();
    book.delete_entry(Side::Ask, px(102), "b", None, None)
        .unwrap();
    book.add_entry(Side::Ask, px(103), BookEntry::new("c", px(1), None), None)
        .unwrap();
    relay.on_msg(&delta(&mut book).unwrap());
    downstream.on_msg(&delta(relay.book_mut()).unwrap());

    assert_same(&book, relay.book());
    assert_same(&book, downstream.book());
}

// ---------------------------------------------------------------------------
// Streaming listener
// ---------------------------------------------------------------------------

#[derive(Default)]
struct LevelTally {
    levels: usize,
    entries: usize,
    entries_at_level: u32,
    size_at_level: Decimal,
    declared: Vec<(u32, Decimal)>,
    seen: Vec<(u32, Decimal)>,
    begins: usize,
    ends: usize,
}

impl LevelTally {
    fn close_level(&mut self) {
        if self.levels > self.seen.len() {
            self.seen.push((self.entries_at_level, self.size_at_level));
        }
    }
}

#[derive(Clone, Default)]
struct Tally(Rc<RefCell<LevelTally>>);

impl AtomicBookHandler for Tally {
    fn on_book_atomic_begin(&mut self, _event: &BookEvent<'_>, is_recap: bool) {
        assert!(is_recap);
        self.0.borrow_mut().begins += 1;
    }

    fn on_book_atomic_end(&mut self, _event: &BookEvent<'_>) {
        let mut tally = self.0.borrow_mut();
        tally.close_level();
        tally.ends += 1;
    }
}

impl AtomicLevelHandler for Tally {
    fn on_atomic_level_recap(&mut self, _event: &BookEvent<'_>, level: &AtomicLevel) {
        let mut tally = self.0.borrow_mut();
        tally.close_level();
        tally.levels += 1;
        tally.entries_at_level = 0;
        tally.size_at_level = Decimal::ZERO;
        tally.declared.push((level.num_entries, level.size));
    }
}

impl AtomicEntryHandler for Tally {
    fn on_atomic_entry_recap(
        &mut self,
        _event: &BookEvent<'_>,
        level: &AtomicLevel,
        entry: &AtomicEntry,
    ) {
        assert_eq!(level.side, Side::Ask);
        assert_eq!(level.price, px(250));
        let mut tally = self.0.borrow_mut();
        tally.entries += 1;
        tally.entries_at_level += 1;
        tally.size_at_level += entry.size;
    }
}

#[test]
fn streaming_recap_of_a_thousand_entries() {
    let mut book = publisher(LevelPruning::Immediate);
    for i in 0..1000 {
        let size = px(i64::try_from(i % 17).unwrap() + 1);
        let entry = BookEntry::new(EntryId::numbered(i), size, None);
        book.add_entry(Side::Ask, px(250), entry, None).unwrap();
    }
    let msg = recap(&mut book);

    let tally = Tally::default();
    let mut consumer = BookAtomicListener::new("JMG");
    consumer.add_book_handler(Box::new(tally.clone()));
    consumer.add_level_handler(Box::new(tally.clone()));
    consumer.add_entry_handler(Box::new(tally.clone()));
    consumer.on_msg(&msg);

    let tally = tally.0.borrow();
    assert_eq!((tally.begins, tally.ends), (1, 1));
    assert_eq!(tally.levels, 1);
    assert_eq!(tally.entries, 1000);
    assert_eq!(tally.declared, tally.seen);
    assert_eq!(tally.seen[0].1, book.find_level(Side::Ask, px(250)).unwrap().size());
}

#[derive(Debug, Clone)]
struct StreamedLevel {
    level: AtomicLevel,
    entries: Vec<AtomicEntry>,
}

impl StreamedLevel {
    fn entry_size(&self) -> Decimal {
        self.entries.iter().map(|e| e.size).sum()
    }
}

#[derive(Clone, Default)]
struct Streamed(Rc<RefCell<Vec<StreamedLevel>>>);

impl Streamed {
    fn level(&self, level: &AtomicLevel) {
        self.0.borrow_mut().push(StreamedLevel {
            level: level.clone(),
            entries: Vec::new(),
        });
    }

    fn entry(&self, level: &AtomicLevel, entry: &AtomicEntry) {
        let mut levels = self.0.borrow_mut();
        let current = levels.last_mut().expect("entry streamed before its level");
        assert_eq!(current.level, *level);
        current.entries.push(entry.clone());
    }
}

impl AtomicLevelHandler for Streamed {
    fn on_atomic_level_recap(&mut self, _event: &BookEvent<'_>, level: &AtomicLevel) {
        self.level(level);
    }

    fn on_atomic_level_delta(&mut self, _event: &BookEvent<'_>, level: &AtomicLevel) {
        self.level(level);
    }
}

impl AtomicEntryHandler for Streamed {
    fn on_atomic_entry_recap(
        &mut self,
        _event: &BookEvent<'_>,
        level: &AtomicLevel,
        entry: &AtomicEntry,
    ) {
        self.entry(level, entry);
    }

    fn on_atomic_entry_delta(
        &mut self,
        _event: &BookEvent<'_>,
        level: &AtomicLevel,
        entry: &AtomicEntry,
    ) {
        self.entry(level, entry);
    }
}

fn stream(msgs: &[&FieldMsg]) -> Vec<StreamedLevel> {
    let streamed = Streamed::default();
    let mut consumer = BookAtomicListener::new("JMG");
    consumer.add_level_handler(Box::new(streamed.clone()));
    consumer.add_entry_handler(Box::new(streamed.clone()));
    for msg in msgs {
        consumer.on_msg(msg);
    }
    streamed.0.take()
}

fn assert_positions(levels: &[StreamedLevel]) {
    for (index, streamed) in levels.iter().enumerate() {
        assert_eq!(streamed.level.position, index + 1);
        assert_eq!(streamed.level.total_levels, levels.len());
    }
}

fn layered_book() -> OrderBook {
    let mut book = publisher(LevelPruning::Immediate);
    let resting = [
        (Side::Bid, 100, "a", 5),
        (Side::Bid, 100, "b", 7),
        (Side::Bid, 99, "c", 3),
        (Side::Ask, 101, "d", 4),
        (Side::Ask, 102, "e", 1),
        (Side::Ask, 102, "f", 2),
        (Side::Ask, 102, "g", 3),
    ];
    for (side, price, id, size) in resting {
        book.add_entry(side, px(price), BookEntry::new(id, px(size), None), None)
            .unwrap();
    }
    book
}

#[test]
fn streaming_recap_reports_every_level() {
    let mut book = layered_book();
    let msg = recap(&mut book);
    let levels = stream(&[&msg]);

    assert_eq!(levels.len(), 4);
    assert_positions(&levels);
    let prices: Vec<_> = levels.iter().map(|l| (l.level.side, l.level.price)).collect();
    assert_eq!(
        prices,
        vec![
            (Side::Bid, px(100)),
            (Side::Bid, px(99)),
            (Side::Ask, px(101)),
            (Side::Ask, px(102)),
        ]
    );
    for streamed in &levels {
        let level = &streamed.level;
        let resting = book.find_level(level.side, level.price).unwrap();
        assert_eq!(level.num_entries, resting.num_entries());
        assert_eq!(level.num_attached, resting.num_entries());
        assert_eq!(streamed.entries.len(), resting.entries().len());
        assert_eq!(level.size, resting.size());
        assert_eq!(streamed.entry_size(), resting.size());
    }
}

#[test]
fn streaming_delta_reports_every_level() {
    let mut book = layered_book();
    let first = recap(&mut book);

    book.add_entry(Side::Bid, px(100), BookEntry::new("h", px(2), None), None)
        .unwrap();
    book.update_entry(Side::Bid, px(99), "c", px(6), None)
        .unwrap();
    book.delete_entry(Side::Ask, px(101), "d", None, None)
        .unwrap();
    book.add_entry(Side::Ask, px(103), BookEntry::new("i", px(9), None), None)
        .unwrap();
    let update = delta(&mut book).unwrap();

    let levels = stream(&[&first, &update]);
    let (recapped, changed) = levels.split_at(4);
    assert_positions(recapped);
    assert_positions(changed);

    let touched: Vec<_> = changed
        .iter()
        .map(|l| (l.level.price, l.level.action, l.entries.len()))
        .collect();
    assert_eq!(
        touched,
        vec![
            (px(100), BookAction::Update, 1),
            (px(99), BookAction::Update, 1),
            (px(101), BookAction::Delete, 1),
            (px(103), BookAction::Add, 1),
        ]
    );
    for streamed in changed {
        let level = &streamed.level;
        assert_eq!(usize::try_from(level.num_attached).unwrap(), streamed.entries.len());
        match book.find_level(level.side, level.price) {
            Some(resting) => {
                assert_eq!(level.size, resting.size());
                assert_eq!(level.num_entries, resting.num_entries());
            }
            None => assert_eq!(level.action, BookAction::Delete),
        }
    }
    assert_eq!(changed[0].entries[0].id, "h");
    assert_eq!(changed[1].entries[0].size, px(6));
    assert_eq!(changed[1].level.size_change, px(3));
    assert_eq!(changed[2].entries[0].action, BookAction::Delete);
    assert_eq!(changed[3].entry_size(), changed[3].level.size);
}
