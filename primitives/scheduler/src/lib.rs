//! Common primitives for the Quantus scheduler and its collaborators.
//!
//! The scheduler engine only ever talks to the outside world through the traits defined here:
//! a [`CallDispatcher`] that executes encoded calls for an origin, and a [`QueryPreimage`] store
//! that resolves hash-referenced calls. Keeping them in this crate lets runtimes implement the
//! collaborators without depending on the engine itself.
#![cfg_attr(not(feature = "std"), no_std)]

extern crate alloc;

use alloc::vec::Vec;
use codec::{Decode, Encode, MaxEncodedLen};
use frame_support::{dispatch::DispatchResultWithPostInfo, traits::ConstU32, BoundedVec};
use scale_info::TypeInfo;
use sp_runtime::{DispatchError, RuntimeDebug};
use sp_weights::Weight;

/// Priority with which a call is scheduled. Lower values mean higher priority.
pub type Priority = u8;

/// The highest priority.
pub const HIGHEST_PRIORITY: Priority = 0;
/// The lowest priority. Most stuff should be around here.
pub const LOWEST_PRIORITY: Priority = 255;

/// Unique name of a named task.
pub type TaskName = [u8; 32];

/// Information relating to the period of a scheduled task. First item is the length of the
/// period and the second is the number of times it should be executed in total before the task
/// is considered finished and removed.
pub type Period<BlockNumber> = (BlockNumber, u32);

/// The location of a scheduled task that can be used to remove it.
pub type TaskAddress<BlockNumber> = (BlockNumber, u32);

/// Maximum length of a call that is stored inline in the agenda.
pub const MAX_INLINE_LEN: u32 = 128;

/// Encoded call bytes short enough to live inline.
pub type BoundedInline = BoundedVec<u8, ConstU32<MAX_INLINE_LEN>>;

/// The dispatch time of a scheduled task.
#[derive(Encode, Decode, Copy, Clone, PartialEq, Eq, RuntimeDebug, TypeInfo, MaxEncodedLen)]
pub enum DispatchTime<BlockNumber> {
	/// At specified block.
	At(BlockNumber),
	/// After specified number of blocks, counted from the last serviced block.
	After(BlockNumber),
}

/// A call either held inline or referenced by the hash of its preimage.
#[derive(Encode, Decode, Clone, PartialEq, Eq, RuntimeDebug, TypeInfo, MaxEncodedLen)]
pub enum BoundedCall<Hash> {
	/// The encoded call itself.
	Inline(BoundedInline),
	/// A call whose bytes are resolved through the preimage store at execution time.
	Lookup { hash: Hash, len: u32 },
}

impl<Hash> BoundedCall<Hash> {
	/// The hash of the preimage, if the call has to be looked up.
	pub fn lookup_hash(&self) -> Option<&Hash> {
		match self {
			BoundedCall::Inline(_) => None,
			BoundedCall::Lookup { hash, .. } => Some(hash),
		}
	}

	/// The length of the preimage, if the call has to be looked up.
	pub fn lookup_len(&self) -> Option<u32> {
		match self {
			BoundedCall::Inline(_) => None,
			BoundedCall::Lookup { len, .. } => Some(*len),
		}
	}

	/// Length of the encoded call.
	pub fn len(&self) -> u32 {
		match self {
			BoundedCall::Inline(data) => data.len() as u32,
			BoundedCall::Lookup { len, .. } => *len,
		}
	}

	pub fn is_inline(&self) -> bool {
		matches!(self, BoundedCall::Inline(_))
	}
}

/// Executes encoded calls on behalf of the scheduler.
///
/// Dispatch must be synchronous and deterministic: the scheduler meters weight around every
/// call and expects the outcome immediately.
pub trait CallDispatcher<Origin> {
	/// Upper bound of the weight `call` may consume. Used to decide whether the call still fits
	/// into the current block before it is dispatched.
	fn call_weight(&self, call: &[u8]) -> Weight;

	/// Dispatch `call` with `origin`. The post info reports the weight actually used; `None`
	/// means the declared [`CallDispatcher::call_weight`] was used in full.
	fn dispatch(&mut self, origin: Origin, call: &[u8]) -> DispatchResultWithPostInfo;
}

/// Read access to call preimages.
pub trait QueryPreimage {
	type H;

	/// Return the preimage of `hash` if it is known and has length `len`.
	fn fetch(&self, hash: &Self::H, len: u32) -> Option<Vec<u8>>;

	/// Signal that the preimage of `hash` is going to be needed.
	fn request(&mut self, _hash: &Self::H) {}

	/// Release a previous [`QueryPreimage::request`].
	fn unrequest(&mut self, _hash: &Self::H) {}

	/// Resolve a bounded call into its bytes, along with the preimage length if it had to be
	/// looked up.
	fn peek(&self, call: &BoundedCall<Self::H>) -> Result<(Vec<u8>, Option<u32>), DispatchError> {
		match call {
			BoundedCall::Inline(data) => Ok((data.to_vec(), None)),
			BoundedCall::Lookup { hash, len } => self
				.fetch(hash, *len)
				.map(|call| (call, Some(*len)))
				.ok_or(DispatchError::Unavailable),
		}
	}
}

/// Write access to call preimages.
pub trait StorePreimage: QueryPreimage {
	/// Store `bytes` and return their hash.
	fn note(&mut self, bytes: Vec<u8>) -> Self::H;

	/// Turn an encoded call into a [`BoundedCall`], noting it as a preimage if it is too long
	/// to be held inline.
	fn bound(&mut self, bytes: Vec<u8>) -> BoundedCall<Self::H> {
		let len = bytes.len() as u32;
		match BoundedInline::try_from(bytes) {
			Ok(data) => BoundedCall::Inline(data),
			Err(bytes) => BoundedCall::Lookup { hash: self.note(bytes), len },
		}
	}
}

/// A type that can be used as a scheduler of anonymous tasks.
pub trait ScheduleAnon<BlockNumber, Origin, Hash> {
	/// Address type for the scheduled task.
	type Address: Clone + Eq + core::fmt::Debug;

	/// Schedule a task at `when`, optionally repeating it.
	fn schedule(
		&mut self,
		when: DispatchTime<BlockNumber>,
		maybe_periodic: Option<Period<BlockNumber>>,
		priority: Priority,
		origin: Origin,
		call: BoundedCall<Hash>,
	) -> Result<Self::Address, DispatchError>;

	/// Cancel a scheduled task. Only works before the task has been dispatched.
	fn cancel(&mut self, address: Self::Address) -> Result<(), DispatchError>;

	/// Move a scheduled task to a different block.
	fn reschedule(
		&mut self,
		address: Self::Address,
		when: DispatchTime<BlockNumber>,
	) -> Result<Self::Address, DispatchError>;

	/// The block at which the task is going to be dispatched.
	fn next_dispatch_time(&self, address: Self::Address) -> Result<BlockNumber, DispatchError>;
}

/// A type that can be used as a scheduler of named tasks.
pub trait ScheduleNamed<BlockNumber, Origin, Hash> {
	/// Address type for the scheduled task.
	type Address: Clone + Eq + core::fmt::Debug;

	/// Schedule a task with a name, dispatch time, and optional periodicity.
	fn schedule_named(
		&mut self,
		id: TaskName,
		when: DispatchTime<BlockNumber>,
		maybe_periodic: Option<Period<BlockNumber>>,
		priority: Priority,
		origin: Origin,
		call: BoundedCall<Hash>,
	) -> Result<Self::Address, DispatchError>;

	/// Cancel a named task, including all further repetitions of it.
	fn cancel_named(&mut self, id: TaskName) -> Result<(), DispatchError>;

	/// Move a named task to a different block.
	fn reschedule_named(
		&mut self,
		id: TaskName,
		when: DispatchTime<BlockNumber>,
	) -> Result<Self::Address, DispatchError>;

	/// The block at which the named task is going to be dispatched.
	fn next_dispatch_time(&self, id: TaskName) -> Result<BlockNumber, DispatchError>;
}

#[cfg(test)]
mod tests {
	use super::*;
	use alloc::collections::BTreeMap;
	use sp_core::H256;
	use sp_runtime::traits::{BlakeTwo256, Hash};

	#[derive(Default)]
	struct Store(BTreeMap<H256, Vec<u8>>);

	impl QueryPreimage for Store {
		type H = H256;

		fn fetch(&self, hash: &H256, len: u32) -> Option<Vec<u8>> {
			self.0.get(hash).filter(|p| p.len() as u32 == len).cloned()
		}
	}

	impl StorePreimage for Store {
		fn note(&mut self, bytes: Vec<u8>) -> H256 {
			let hash = BlakeTwo256::hash(&bytes);
			self.0.insert(hash, bytes);
			hash
		}
	}

	#[test]
	fn short_calls_are_bound_inline() {
		let mut store = Store::default();
		let call = store.bound(vec![7u8; MAX_INLINE_LEN as usize]);
		assert!(call.is_inline());
		assert_eq!(call.len(), MAX_INLINE_LEN);
		assert_eq!(call.lookup_hash(), None);
		assert!(store.0.is_empty());
		assert_eq!(store.peek(&call), Ok((vec![7u8; MAX_INLINE_LEN as usize], None)));
	}

	#[test]
	fn long_calls_are_noted() {
		let mut store = Store::default();
		let bytes = vec![1u8; MAX_INLINE_LEN as usize + 1];
		let call = store.bound(bytes.clone());
		assert_eq!(call.lookup_hash(), Some(&BlakeTwo256::hash(&bytes)));
		assert_eq!(call.lookup_len(), Some(MAX_INLINE_LEN + 1));
		assert_eq!(store.peek(&call), Ok((bytes, Some(MAX_INLINE_LEN + 1))));
	}

	#[test]
	fn peek_reports_missing_preimage() {
		let store = Store::default();
		let call = BoundedCall::Lookup { hash: H256::repeat_byte(1), len: 300 };
		assert_eq!(store.peek(&call), Err(DispatchError::Unavailable));
	}

	#[test]
	fn peek_checks_preimage_length() {
		let mut store = Store::default();
		let hash = store.note(vec![3u8; 200]);
		let call = BoundedCall::Lookup { hash, len: 199 };
		assert_eq!(store.peek(&call), Err(DispatchError::Unavailable));
	}
}
