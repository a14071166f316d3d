//! Decide/apply traits for the stateful pieces of the ledger.
//!
//! Stock positions are rebuilt from the current product row for every request,
//! so nothing here knows about streams, snapshots or persistence.

/// Something with a stable identity whose state moves forward one recorded
/// entry at a time.
pub trait AggregateRoot {
    type Id: Clone + Eq + core::hash::Hash + core::fmt::Debug;

    fn id(&self) -> &Self::Id;

    /// Number of entries applied since the state was loaded.
    fn version(&self) -> u64;
}

/// Pure decision logic over a loaded state.
///
/// `handle` checks a command against the current state (stock on hand, prices,
/// tenant scope) and returns the entries to record, or why none may be.
/// `apply` folds one accepted entry into the state. Neither touches storage.
pub trait Aggregate: AggregateRoot {
    type Command: Clone + core::fmt::Debug;
    type Event: Clone + core::fmt::Debug;
    type Error: core::fmt::Debug;

    /// Fold one accepted entry into the state. Bumps `version` by one.
    fn apply(&mut self, event: &Self::Event);

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error>;

    /// `handle`, then `apply` every resulting entry. On error the state is
    /// left untouched.
    fn execute(&mut self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        let events = self.handle(command)?;
        for event in &events {
            self.apply(event);
        }
        Ok(events)
    }
}
