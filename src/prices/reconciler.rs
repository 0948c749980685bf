//! Per-symbol merge of the stream, broadcast and snapshot channels.
//!
//! Each symbol keeps the newest observation per source. The authoritative
//! price is the held observation of the highest-priority source. Within a
//! source a later `observed_at` always wins, and on an equal `observed_at` the
//! later arrival replaces the held one. Once a live source has reported for a
//! symbol the snapshot slot is dropped and later snapshots for that symbol are
//! ignored.

use crate::prices::types::{
    compare_observations, AuthoritativePrice, ObservationSource, PriceObservation,
};
use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq)]
pub enum ObserveOutcome {
    Updated(AuthoritativePrice),
    Unchanged,
    Discarded,
}

#[derive(Debug, Default)]
struct SymbolBook {
    slots: [Option<PriceObservation>; 3],
    live_seen: bool,
    current: Option<AuthoritativePrice>,
}

impl SymbolBook {
    fn slot(&self, source: ObservationSource) -> Option<&PriceObservation> {
        self.slots[source.index()].as_ref()
    }

    fn live_slots(&self) -> impl Iterator<Item = &PriceObservation> + '_ {
        [ObservationSource::Stream, ObservationSource::Broadcast]
            .into_iter()
            .filter_map(move |source| self.slot(source))
    }

    fn resolve(&self, staleness_window_ms: Option<u64>, now_ms: i64) -> Option<&PriceObservation> {
        if let Some(window_ms) = staleness_window_ms {
            let window_ms = i64::try_from(window_ms).unwrap_or(i64::MAX);
            let fresh = self
                .live_slots()
                .filter(|held| now_ms.saturating_sub(held.observed_at) <= window_ms)
                .max_by(|lhs, rhs| compare_observations(lhs, rhs));
            if fresh.is_some() {
                return fresh;
            }
        }

        self.live_slots()
            .max_by(|lhs, rhs| compare_observations(lhs, rhs))
            .or_else(|| {
                if self.live_seen {
                    None
                } else {
                    self.slot(ObservationSource::Snapshot)
                }
            })
    }
}

#[derive(Debug, Default)]
pub struct PriceReconciler {
    staleness_window_ms: Option<u64>,
    books: HashMap<String, SymbolBook>,
}

impl PriceReconciler {
    pub fn new(staleness_window_ms: Option<u64>) -> Self {
        Self {
            staleness_window_ms,
            books: HashMap::new(),
        }
    }

    pub fn observe(&mut self, observation: PriceObservation, now_ms: i64) -> ObserveOutcome {
        let staleness_window_ms = self.staleness_window_ms;
        let book = self.books.entry(observation.symbol.clone()).or_default();
        let source = observation.source;

        if !source.is_live() && book.live_seen {
            return ObserveOutcome::Discarded;
        }

        if let Some(held) = book.slot(source) {
            if held.observed_at > observation.observed_at {
                return ObserveOutcome::Discarded;
            }
        }

        book.slots[source.index()] = Some(observation);
        if source.is_live() {
            book.live_seen = true;
            book.slots[ObservationSource::Snapshot.index()] = None;
        }

        let next = book
            .resolve(staleness_window_ms, now_ms)
            .map(AuthoritativePrice::from);
        if next == book.current {
            return ObserveOutcome::Unchanged;
        }

        book.current = next.clone();
        match next {
            Some(price) => ObserveOutcome::Updated(price),
            None => ObserveOutcome::Unchanged,
        }
    }

    pub fn authoritative(&self, symbol: &str, now_ms: i64) -> Option<AuthoritativePrice> {
        self.books
            .get(symbol)
            .and_then(|book| book.resolve(self.staleness_window_ms, now_ms))
            .map(AuthoritativePrice::from)
    }

    pub fn snapshot(&self, now_ms: i64) -> Vec<AuthoritativePrice> {
        let mut prices: Vec<AuthoritativePrice> = self
            .books
            .values()
            .filter_map(|book| book.resolve(self.staleness_window_ms, now_ms))
            .map(AuthoritativePrice::from)
            .collect();
        prices.sort_unstable_by(|lhs, rhs| lhs.symbol.cmp(&rhs.symbol));
        prices
    }
}
