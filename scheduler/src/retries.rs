//! Retry policies, keyed by task address.

use alloc::collections::BTreeMap;
use codec::{Decode, Encode, MaxEncodedLen};
use qp_scheduler::TaskAddress;
use scale_info::TypeInfo;
use sp_runtime::RuntimeDebug;

/// The configuration of the retry mechanism for a given task along with its current state.
#[derive(Clone, Copy, RuntimeDebug, PartialEq, Eq, Encode, Decode, MaxEncodedLen, TypeInfo)]
pub struct RetryConfig<Period> {
	/// Initial amount of retries allowed.
	total_retries: u32,
	/// Amount of retries left.
	remaining: u32,
	/// Period of time between retry attempts.
	period: Period,
}

impl<Period: Copy> RetryConfig<Period> {
	pub fn new(retries: u32, period: Period) -> Self {
		Self { total_retries: retries, remaining: retries, period }
	}

	pub fn total_retries(&self) -> u32 {
		self.total_retries
	}

	pub fn remaining(&self) -> u32 {
		self.remaining
	}

	pub fn period(&self) -> Period {
		self.period
	}

	/// The configuration to attach to the next attempt, or `None` if no retries are left.
	pub fn next(&self) -> Option<Self> {
		self.remaining.checked_sub(1).map(|remaining| Self { remaining, ..*self })
	}
}

/// Retry configurations for items to be executed, indexed by task address.
pub struct RetryTable<BlockNumber> {
	entries: BTreeMap<TaskAddress<BlockNumber>, RetryConfig<BlockNumber>>,
}

impl<BlockNumber> Default for RetryTable<BlockNumber> {
	fn default() -> Self {
		Self { entries: BTreeMap::new() }
	}
}

impl<BlockNumber: Ord + Copy> RetryTable<BlockNumber> {
	/// Attach a fresh policy of `retries` attempts every `period` blocks, replacing any existing
	/// one.
	pub fn set(&mut self, address: TaskAddress<BlockNumber>, retries: u32, period: BlockNumber) {
		self.insert(address, RetryConfig::new(retries, period));
	}

	pub fn insert(&mut self, address: TaskAddress<BlockNumber>, config: RetryConfig<BlockNumber>) {
		self.entries.insert(address, config);
	}

	/// Detach the policy at `address`, returning it.
	pub fn clear(&mut self, address: &TaskAddress<BlockNumber>) -> Option<RetryConfig<BlockNumber>> {
		self.entries.remove(address)
	}

	pub fn get(&self, address: &TaskAddress<BlockNumber>) -> Option<RetryConfig<BlockNumber>> {
		self.entries.get(address).copied()
	}

	pub fn iter(
		&self,
	) -> impl Iterator<Item = (&TaskAddress<BlockNumber>, &RetryConfig<BlockNumber>)> {
		self.entries.iter()
	}

	pub fn len(&self) -> usize {
		self.entries.len()
	}

	pub fn is_empty(&self) -> bool {
		self.entries.is_empty()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn next_counts_down_to_exhaustion() {
		let config = RetryConfig::new(2, 5u64);
		let first = config.next().unwrap();
		assert_eq!((first.total_retries(), first.remaining(), first.period()), (2, 1, 5));
		let second = first.next().unwrap();
		assert_eq!(second.remaining(), 0);
		assert_eq!(second.next(), None);
		assert_eq!(RetryConfig::new(0, 5u64).next(), None);
	}

	#[test]
	fn set_overwrites_existing_policy() {
		let mut retries = RetryTable::<u64>::default();
		retries.set((4, 0), 3, 2);
		retries.insert((4, 0), RetryConfig::new(3, 2).next().unwrap());
		assert_eq!(retries.get(&(4, 0)).map(|c| c.remaining()), Some(2));

		retries.set((4, 0), 10, 1);
		assert_eq!(retries.get(&(4, 0)), Some(RetryConfig::new(10, 1)));
		assert_eq!(retries.len(), 1);

		assert_eq!(retries.clear(&(4, 0)), Some(RetryConfig::new(10, 1)));
		assert_eq!(retries.clear(&(4, 0)), None);
		assert!(retries.is_empty());
	}
}
