//! Tracking store: the identity map behind a session
//!
//! Every instance the session knows about lives here, keyed by its
//! [`Identity`]. An entry pairs the live instance with an optional snapshot
//! of the values last known to be in the database. Classification into
//! new / changed / unchanged / removed is recomputed on every query from the
//! live data, since callers mutate instances between calls.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use crate::errors::Result;
use crate::model::value::Value;
use crate::model::{Entity, Identity};
use crate::schema::SchemaDescriptor;

/// Frozen copy of an instance's persisted values, in column order
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    pub primary_key: Option<i64>,
    pub values: Vec<Value>,
}

impl Snapshot {
    /// Copy the primary key and every declared column out of `entity`
    ///
    /// # Errors
    ///
    /// Returns `UnknownProperty` if the instance cannot supply a column its
    /// schema declares.
    pub fn capture(entity: &dyn Entity, schema: &SchemaDescriptor) -> Result<Self> {
        let values = schema
            .columns
            .iter()
            .map(|column| entity.column_value(&column.name))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            primary_key: entity.key(),
            values,
        })
    }
}

/// Derived classification of a tracking entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntryState {
    /// Live instance, never persisted
    New,
    /// Live instance differing from its snapshot
    Changed,
    /// Live instance equal to its snapshot
    Unchanged,
    /// Snapshot only; the instance was removed and awaits DELETE
    Removed,
}

// At least one of current / snapshot is always present.
enum Slot {
    New(Box<dyn Entity>),
    Tracked {
        current: Box<dyn Entity>,
        snapshot: Snapshot,
    },
    Removed(Snapshot),
}

/// One tracked identity
pub struct TrackingEntry {
    identity: Identity,
    schema: Arc<SchemaDescriptor>,
    slot: Slot,
}

impl TrackingEntry {
    pub fn identity(&self) -> Identity {
        self.identity
    }

    pub fn schema(&self) -> &Arc<SchemaDescriptor> {
        &self.schema
    }

    pub fn current(&self) -> Option<&dyn Entity> {
        match &self.slot {
            Slot::New(current) | Slot::Tracked { current, .. } => Some(current.as_ref()),
            Slot::Removed(_) => None,
        }
    }

    pub fn snapshot(&self) -> Option<&Snapshot> {
        match &self.slot {
            Slot::Tracked { snapshot, .. } | Slot::Removed(snapshot) => Some(snapshot),
            Slot::New(_) => None,
        }
    }

    fn current_mut(&mut self) -> Option<&mut Box<dyn Entity>> {
        match &mut self.slot {
            Slot::New(current) | Slot::Tracked { current, .. } => Some(current),
            Slot::Removed(_) => None,
        }
    }

    /// Classify the entry against the live instance
    ///
    /// An instance whose values cannot be read counts as changed, so the
    /// next flush surfaces the failure instead of skipping the row.
    pub fn state(&self) -> EntryState {
        match &self.slot {
            Slot::New(_) => EntryState::New,
            Slot::Removed(_) => EntryState::Removed,
            Slot::Tracked { current, snapshot } => {
                match Snapshot::capture(current.as_ref(), &self.schema) {
                    Ok(now) if now == *snapshot => EntryState::Unchanged,
                    _ => EntryState::Changed,
                }
            }
        }
    }
}

impl fmt::Debug for TrackingEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TrackingEntry")
            .field("identity", &self.identity)
            .field("table", &self.schema.table)
            .field("current", &self.current())
            .field("snapshot", &self.snapshot())
            .finish()
    }
}

/// Identity map owning every instance of one session
#[derive(Debug, Default)]
pub struct TrackingStore {
    next_identity: u64,
    entries: BTreeMap<Identity, TrackingEntry>,
}

impl TrackingStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Hand out a fresh identity; identities are never reused
    pub fn allocate(&mut self) -> Identity {
        self.next_identity += 1;
        Identity::new(self.next_identity)
    }

    /// Register `entity` as new (no snapshot), replacing any entry for `identity`
    pub fn set_new(
        &mut self,
        identity: Identity,
        entity: Box<dyn Entity>,
        schema: Arc<SchemaDescriptor>,
    ) {
        self.entries.insert(
            identity,
            TrackingEntry {
                identity,
                schema,
                slot: Slot::New(entity),
            },
        );
    }

    /// Register `entity` as tracked, snapshotting its values now
    ///
    /// # Errors
    ///
    /// Returns `UnknownProperty` if the snapshot cannot be captured; the
    /// store is left unchanged in that case.
    pub fn set_tracked(
        &mut self,
        identity: Identity,
        entity: Box<dyn Entity>,
        schema: Arc<SchemaDescriptor>,
    ) -> Result<()> {
        let snapshot = Snapshot::capture(entity.as_ref(), &schema)?;
        self.entries.insert(
            identity,
            TrackingEntry {
                identity,
                schema,
                slot: Slot::Tracked {
                    current: entity,
                    snapshot,
                },
            },
        );
        Ok(())
    }

    /// Register `entity` as persisted with an unknown database state
    ///
    /// The entry keeps the instance's primary key for DELETE but classifies
    /// as changed until the next `retrack`, so a flush upserts every column.
    pub fn set_stale(
        &mut self,
        identity: Identity,
        entity: Box<dyn Entity>,
        schema: Arc<SchemaDescriptor>,
    ) {
        let snapshot = Snapshot {
            primary_key: entity.key(),
            values: Vec::new(),
        };
        self.entries.insert(
            identity,
            TrackingEntry {
                identity,
                schema,
                slot: Slot::Tracked {
                    current: entity,
                    snapshot,
                },
            },
        );
    }

    /// Re-seed the snapshot of a live entry from its current values
    ///
    /// Returns `Ok(false)` when the identity has no live instance.
    ///
    /// # Errors
    ///
    /// Returns `UnknownProperty` if the snapshot cannot be captured.
    pub fn retrack(&mut self, identity: Identity) -> Result<bool> {
        let Some(entry) = self.entries.get_mut(&identity) else {
            return Ok(false);
        };
        let Some(current) = entry.current() else {
            return Ok(false);
        };
        let snapshot = Snapshot::capture(current, &entry.schema)?;
        let slot = std::mem::replace(&mut entry.slot, Slot::Removed(snapshot.clone()));
        entry.slot = match slot {
            Slot::New(current) | Slot::Tracked { current, .. } => {
                Slot::Tracked { current, snapshot }
            }
            removed @ Slot::Removed(_) => removed,
        };
        Ok(true)
    }

    /// Drop the live instance
    ///
    /// A never-persisted entry is purged outright; a tracked one keeps its
    /// snapshot and becomes removed. Returns the instance that was dropped.
    pub fn unset_current(&mut self, identity: Identity) -> Option<Box<dyn Entity>> {
        let entry = self.entries.remove(&identity)?;
        match entry.slot {
            Slot::New(current) => Some(current),
            Slot::Tracked { current, snapshot } => {
                self.entries.insert(
                    identity,
                    TrackingEntry {
                        identity,
                        schema: entry.schema,
                        slot: Slot::Removed(snapshot),
                    },
                );
                Some(current)
            }
            Slot::Removed(snapshot) => {
                self.entries.insert(
                    identity,
                    TrackingEntry {
                        identity,
                        schema: entry.schema,
                        slot: Slot::Removed(snapshot),
                    },
                );
                None
            }
        }
    }

    /// Purge the entry unconditionally
    pub fn clean(&mut self, identity: Identity) -> bool {
        self.entries.remove(&identity).is_some()
    }

    pub fn contains(&self, identity: Identity) -> bool {
        self.entries.contains_key(&identity)
    }

    pub fn get(&self, identity: Identity) -> Option<&TrackingEntry> {
        self.entries.get(&identity)
    }

    pub fn entity(&self, identity: Identity) -> Option<&dyn Entity> {
        self.entries.get(&identity).and_then(TrackingEntry::current)
    }

    pub fn entity_mut(&mut self, identity: Identity) -> Option<&mut dyn Entity> {
        let current = self.entries.get_mut(&identity)?.current_mut()?;
        Some(current.as_mut())
    }

    pub fn state(&self, identity: Identity) -> Option<EntryState> {
        self.entries.get(&identity).map(TrackingEntry::state)
    }

    /// All entries in identity order
    pub fn entries(&self) -> impl Iterator<Item = &TrackingEntry> + '_ {
        self.entries.values()
    }

    fn in_state(&self, state: EntryState) -> impl Iterator<Item = &TrackingEntry> + '_ {
        self.entries.values().filter(move |e| e.state() == state)
    }

    /// Entries awaiting INSERT
    pub fn new_entries(&self) -> impl Iterator<Item = &TrackingEntry> + '_ {
        self.in_state(EntryState::New)
    }

    /// Entries awaiting UPDATE
    pub fn changed_entries(&self) -> impl Iterator<Item = &TrackingEntry> + '_ {
        self.in_state(EntryState::Changed)
    }

    /// Entries awaiting DELETE
    pub fn removed_entries(&self) -> impl Iterator<Item = &TrackingEntry> + '_ {
        self.in_state(EntryState::Removed)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
