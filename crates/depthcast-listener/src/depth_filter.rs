//! Depth-limited view of a listener's book.
//!
//! [`BookDepthFilter`] sits between an [`OrderBookListener`] and handlers
//! that only care about the best few levels of each side. It keeps its own
//! copy of the top `depth` levels and forwards book events against that
//! copy:
//!
//! ```text
//! recap / clear / gap -> view rebuilt        -> same event, filtered book
//! delta               -> view rebuilt        -> changes inside the view only
//!                         levels pushed out     -> synthesized Delete
//!                         levels pulled in      -> synthesized Add
//! ```
//!
//! A delta that touches nothing inside the view before or after the change
//! is not forwarded at all.
//!
//! [`OrderBookListener`]: crate::OrderBookListener

use std::collections::HashSet;
use std::sync::Arc;

use depthcast_book::{BasicDelta, DeltaList, OrderBook, PriceLevel};
use depthcast_types::{BookAction, BookConfig, BookId, Side};
use rust_decimal::Decimal;

use crate::handler::{BookEvent, BookHandler};
use crate::sequence::SeqGap;

/// Book handler that re-fires events for the top `depth` levels per side.
pub struct BookDepthFilter {
    depth: usize,
    view: OrderBook,
    deltas: DeltaList,
    handlers: Vec<Box<dyn BookHandler>>,
}

impl BookDepthFilter {
    #[must_use]
    pub fn new(symbol: impl Into<String>, depth: usize) -> Self {
        Self {
            depth,
            view: OrderBook::new(BookId::new(symbol)),
            deltas: DeltaList::new(),
            handlers: Vec::new(),
        }
    }

    pub fn add_handler(&mut self, handler: Box<dyn BookHandler>) {
        self.handlers.push(handler);
    }

    #[must_use]
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// The filtered book as of the last event.
    #[must_use]
    pub fn view(&self) -> &OrderBook {
        &self.view
    }

    fn rebuild(&mut self, book: &OrderBook) {
        let config = BookConfig {
            generate_deltas: false,
            strict_checking: false,
            ..book.config().clone()
        };
        let fields = Arc::clone(book.fields());
        let mut view = OrderBook::with_config(book.id().clone(), config, fields);
        view.set_book_time(book.book_time());
        view.set_quality(book.quality());
        view.set_consistent(book.is_consistent());
        let top = book
            .bid_levels()
            .take(self.depth)
            .chain(book.ask_levels().take(self.depth));
        for level in top {
            if let Err(error) = view.add_level(level.clone()) {
                tracing::debug!(symbol = %book.id(), %error, "level left out of depth view");
            }
        }
        self.view = view;
    }

    /// Rebuild the view and collect the part of `changes` it can see, plus
    /// the levels that crossed the depth boundary without being touched.
    fn filter<'a>(&mut self, book: &OrderBook, changes: impl Iterator<Item = &'a BasicDelta>) {
        let before = std::mem::replace(&mut self.view, OrderBook::new(BookId::new("")));
        self.rebuild(book);
        self.deltas.clear();

        let mut touched: HashSet<(Side, Decimal)> = HashSet::new();
        for delta in changes {
            let (side, price) = delta.level.key();
            if in_view(&before, side, price) || in_view(&self.view, side, price) {
                touched.insert((side, price));
                self.deltas.push(delta.clone());
            }
        }

        for level in top_levels(&self.view) {
            let (side, price) = key(level);
            if !touched.contains(&(side, price)) && !in_view(&before, side, price) {
                self.deltas.push(boundary_delta(level, BookAction::Add));
            }
        }
        for level in top_levels(&before) {
            let (side, price) = key(level);
            if !touched.contains(&(side, price)) && !in_view(&self.view, side, price) {
                self.deltas.push(boundary_delta(level, BookAction::Delete));
            }
        }
    }

    fn forward_deltas(&mut self, event: &BookEvent<'_>) {
        if self.deltas.is_empty() {
            return;
        }
        let simple = self.deltas.simple_delta().filter(|_| self.deltas.is_simple());
        for handler in &mut self.handlers {
            match simple {
                Some(delta) => handler.on_book_delta(event, delta, &self.view),
                None => handler.on_book_complex_delta(event, &self.deltas, &self.view),
            }
        }
    }
}

impl BookHandler for BookDepthFilter {
    fn on_book_recap(&mut self, event: &BookEvent<'_>, book: &OrderBook) {
        self.rebuild(book);
        for handler in &mut self.handlers {
            handler.on_book_recap(event, &self.view);
        }
    }

    fn on_book_delta(&mut self, event: &BookEvent<'_>, delta: &BasicDelta, book: &OrderBook) {
        self.filter(book, std::iter::once(delta));
        self.forward_deltas(event);
    }

    fn on_book_complex_delta(
        &mut self,
        event: &BookEvent<'_>,
        deltas: &DeltaList,
        book: &OrderBook,
    ) {
        self.filter(book, deltas.iter());
        self.forward_deltas(event);
    }

    fn on_book_clear(&mut self, event: &BookEvent<'_>, book: &OrderBook) {
        self.rebuild(book);
        for handler in &mut self.handlers {
            handler.on_book_clear(event, &self.view);
        }
    }

    fn on_book_gap(&mut self, event: &BookEvent<'_>, gap: SeqGap, book: &OrderBook) {
        self.rebuild(book);
        for handler in &mut self.handlers {
            handler.on_book_gap(event, gap, &self.view);
        }
    }
}

impl std::fmt::Debug for BookDepthFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BookDepthFilter")
            .field("book", &self.view.id())
            .field("depth", &self.depth)
            .field("handlers", &self.handlers.len())
            .finish_non_exhaustive()
    }
}

fn in_view(view: &OrderBook, side: Side, price: Decimal) -> bool {
    view.find_level(side, price).is_some()
}

fn key(level: &PriceLevel) -> (Side, Decimal) {
    (level.side(), level.price())
}

fn top_levels(view: &OrderBook) -> impl Iterator<Item = &PriceLevel> {
    view.bid_levels().chain(view.ask_levels())
}

/// A level entering (`Add`) or leaving (`Delete`) the view with its whole
/// size.
fn boundary_delta(level: &PriceLevel, action: BookAction) -> BasicDelta {
    let mut summary = level.summary();
    let change = if action == BookAction::Delete {
        -summary.size
    } else {
        summary.size
    };
    summary.action = action;
    summary.size_change = change;
    BasicDelta::level(summary, change, action)
}
