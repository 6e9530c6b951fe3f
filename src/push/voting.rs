// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Synchronous vote collection over a set of voters.
//!
//! Every push builds one [`Vote`] that each voter mutates in registration order.
//! How ballots combine (veto, maximum, last writer) is up to the voters; the
//! notificator only guarantees that every voter sees the message exactly once
//! before the result is read.
//!
//! # Examples
//!
//! ```rust
//! use the_conduit::push::VotingNotificator;
//!
//! // Veto: any voter can flip the outcome to `false`
//! let gate = VotingNotificator::<u32, bool>::new("gate", true);
//! gate.add_voter(|_, n: &u32, vote: &mut the_conduit::push::Vote<bool>| {
//!     if *n > 10 {
//!         vote.set(false);
//!     }
//!     Ok(())
//! });
//!
//! assert!(gate.push(&3));
//! assert!(!gate.push(&30));
//! ```

use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use crate::errors::{describe_panic, FlowError};
use crate::observability::messages::push::VoteCollected;
use crate::observability::messages::StructuredLog;
use crate::push::multicast::Multicast;
use crate::traits::{ArrowSender, EventId};

/// The shared decision passed to every voter of one push.
#[derive(Debug, Clone, PartialEq)]
pub struct Vote<V> {
    result: V,
    ballots: usize,
}

impl<V> Vote<V> {
    pub fn new(initial: V) -> Self {
        Self {
            result: initial,
            ballots: 0,
        }
    }

    pub fn result(&self) -> &V {
        &self.result
    }

    pub fn set(&mut self, result: V) {
        self.result = result;
    }

    /// Replace the result with a value derived from the current one.
    pub fn update<F>(&mut self, combine: F)
    where
        F: FnOnce(&V) -> V,
    {
        self.result = combine(&self.result);
    }

    /// Voters that have already run, including ones that failed.
    pub fn ballots(&self) -> usize {
        self.ballots
    }

    pub fn into_result(self) -> V {
        self.result
    }
}

/// A participant in vote collection.
pub trait Voter<T, V>: Send + Sync {
    fn vote(&self, event_id: EventId, message: &T, vote: &mut Vote<V>) -> anyhow::Result<()>;
}

impl<T, V, F> Voter<T, V> for F
where
    F: Fn(EventId, &T, &mut Vote<V>) -> anyhow::Result<()> + Send + Sync,
{
    fn vote(&self, event_id: EventId, message: &T, vote: &mut Vote<V>) -> anyhow::Result<()> {
        self(event_id, message, vote)
    }
}

/// Collects a vote from every voter for each pushed message.
///
/// The result of each vote is also published on the notification channel, and
/// voter faults ([`FlowError::Voting`]) on the exception channel.
pub struct VotingNotificator<T, V> {
    default: V,
    seed: Option<V>,
    voters: RwLock<Vec<Arc<dyn Voter<T, V>>>>,
    outlets: Multicast<V>,
    next_event_id: AtomicU64,
}

impl<T: 'static, V: Clone + 'static> VotingNotificator<T, V> {
    /// `default` is returned when nobody votes, and is also the starting value of
    /// each vote.
    pub fn new(name: impl Into<String>, default: V) -> Self {
        Self {
            default,
            seed: None,
            voters: RwLock::new(Vec::new()),
            outlets: Multicast::new(name),
            next_event_id: AtomicU64::new(1),
        }
    }

    /// Start each vote from `seed` instead of `default`.
    pub fn with_seed(name: impl Into<String>, default: V, seed: V) -> Self {
        let mut notificator = Self::new(name, default);
        notificator.seed = Some(seed);
        notificator
    }

    pub fn name(&self) -> &str {
        self.outlets.owner()
    }

    pub fn add_voter<F>(&self, voter: F)
    where
        F: Fn(EventId, &T, &mut Vote<V>) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.subscribe(Arc::new(voter));
    }

    pub fn subscribe(&self, voter: Arc<dyn Voter<T, V>>) {
        self.voters
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(voter);
    }

    pub fn voter_count(&self) -> usize {
        self.voters
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }

    /// Observe every collected result.
    pub fn on_vote<F>(&self, observer: F)
    where
        F: Fn(EventId, &V) + Send + Sync + 'static,
    {
        self.on_notification(move |event_id, result: &V| {
            observer(event_id, result);
            Ok(())
        });
    }

    /// Run every voter over `message` and return the final result.
    pub fn push(&self, message: &T) -> V {
        let event_id = self.next_event_id.fetch_add(1, Ordering::Relaxed);
        let voters = self
            .voters
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone();
        if voters.is_empty() {
            return self.default.clone();
        }

        let initial = self.seed.as_ref().unwrap_or(&self.default).clone();
        let mut vote = Vote::new(initial);
        let mut faults = 0;

        for (index, voter) in voters.iter().enumerate() {
            let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
                voter.vote(event_id, message, &mut vote)
            }));
            vote.ballots += 1;

            let source = match outcome {
                Ok(Ok(())) => continue,
                Ok(Err(err)) => err,
                Err(payload) => {
                    anyhow::anyhow!("voter {}", describe_panic(payload.as_ref()))
                }
            };
            faults += 1;
            let fault = FlowError::Voting {
                notificator: self.name().to_string(),
                voter: index,
                event_id,
                source,
            };
            self.outlets.raise(event_id, &fault);
        }

        VoteCollected {
            notificator: self.name(),
            event_id,
            ballots: vote.ballots,
            faults,
        }
        .log();

        let result = vote.into_result();
        self.outlets.notify(event_id, &result);
        result
    }
}

impl<T: 'static, V: Clone + 'static> ArrowSender<V> for VotingNotificator<T, V> {
    fn outlets(&self) -> &Multicast<V> {
        &self.outlets
    }
}
