//! # Scheduler Engine
//!
//! A block-driven scheduler for deferred calls.
//!
//! ## Overview
//!
//! The engine keeps an agenda of tasks per block number. Tasks may be named or anonymous,
//! periodic, and may carry a retry policy that re-attempts them after a failed dispatch. Calls are
//! held inline or by the hash of their preimage, which is only resolved when the task runs.
//!
//! The engine is driven by calling [`Scheduler::service`] once for every block. Each call drains
//! the agendas that are due against a weight budget of [`Config::MaximumWeight`]; whatever does not
//! fit is picked up again on the next block, oldest agenda first.
//!
//! All state lives in one owned [`Scheduler`] value. Calls are executed through the
//! [`CallDispatcher`] and preimages resolved through the [`QueryPreimage`] store given to
//! [`Scheduler::new`]. Events are buffered until they are drained with
//! [`Scheduler::take_events`].
//!
//! ### Examples
//!
//! 1. Scheduling a call at a specific block.
#![doc = docify::embed!("src/tests.rs", basic_scheduling_works)]
//!
//! 2. Scheduling a preimage hash of a call at a specific block
#![doc = docify::embed!("src/tests.rs", scheduling_with_preimages_works)]

//!
//! ## Warning
//!
//! Scheduled calls run long after they were scheduled. The dispatcher may have changed its
//! interpretation of the encoded call in the meantime; the engine does not check that a call still
//! means what it meant when it was scheduled.

#![cfg_attr(not(feature = "std"), no_std)]

pub mod agenda;
pub mod impls;
pub mod lookup;
#[cfg(test)]
mod mock;
pub mod retries;
mod service;
pub mod weights;

extern crate alloc;

use alloc::vec::Vec;
use codec::{Decode, Encode, MaxEncodedLen};
use core::fmt::Debug;
use frame_support::{ensure, traits::Get};
use scale_info::TypeInfo;
use sp_runtime::{
	traits::{AtLeast32BitUnsigned, Saturating, Zero},
	DispatchError, DispatchResult, RuntimeDebug,
};
use sp_weights::Weight;

pub use agenda::AgendaStore;
pub use lookup::LookupTable;
pub use qp_scheduler::{
	BoundedCall, CallDispatcher, DispatchTime, Period, Priority, QueryPreimage, TaskAddress,
	TaskName, HIGHEST_PRIORITY, LOWEST_PRIORITY,
};
pub use retries::{RetryConfig, RetryTable};
pub use weights::WeightInfo;

pub(crate) const LOG_TARGET: &str = "runtime::scheduler";

/// Information regarding an item to be executed in the future.
#[cfg_attr(any(feature = "std", test), derive(PartialEq, Eq))]
#[derive(Clone, RuntimeDebug, Encode, Decode, TypeInfo)]
pub struct Scheduled<BlockNumber, Hash, Origin> {
	/// The unique identity for this task, if there is one.
	maybe_id: Option<TaskName>,
	/// This task's priority.
	priority: Priority,
	/// The call to be dispatched.
	call: BoundedCall<Hash>,
	/// If the call is periodic, then this points to the information concerning that.
	maybe_periodic: Option<Period<BlockNumber>>,
	/// The origin with which to dispatch the call.
	origin: Origin,
}

impl<BlockNumber, Hash, Origin> Scheduled<BlockNumber, Hash, Origin>
where
	BlockNumber: Copy,
	Hash: Clone,
	Origin: Clone,
{
	/// Create a new task to be used for retry attempts of the original one. The cloned task will
	/// have the same `priority`, `call` and `origin`, but will always be non-periodic and unnamed.
	pub fn as_retry(&self) -> Self {
		Self {
			maybe_id: None,
			priority: self.priority,
			call: self.call.clone(),
			maybe_periodic: None,
			origin: self.origin.clone(),
		}
	}

	pub fn maybe_id(&self) -> Option<&TaskName> {
		self.maybe_id.as_ref()
	}

	pub fn priority(&self) -> Priority {
		self.priority
	}

	pub fn call(&self) -> &BoundedCall<Hash> {
		&self.call
	}

	/// The period and the number of repetitions still to come after the next dispatch.
	pub fn maybe_periodic(&self) -> Option<Period<BlockNumber>> {
		self.maybe_periodic
	}

	pub fn origin(&self) -> &Origin {
		&self.origin
	}
}

pub type ScheduledOf<T> =
	Scheduled<<T as Config>::BlockNumber, <T as Config>::Hash, <T as Config>::Origin>;
pub type TaskAddressOf<T> = TaskAddress<<T as Config>::BlockNumber>;
pub type BoundedCallOf<T> = BoundedCall<<T as Config>::Hash>;
pub type RetryConfigOf<T> = RetryConfig<<T as Config>::BlockNumber>;
pub type EventOf<T> = Event<<T as Config>::BlockNumber>;
type AgendaOf<T> = AgendaStore<
	<T as Config>::BlockNumber,
	ScheduledOf<T>,
	<T as Config>::MaxScheduledPerBlock,
>;

pub(crate) trait MarginalWeightInfo: WeightInfo {
	fn service_task(maybe_lookup_len: Option<usize>, named: bool, periodic: bool) -> Weight {
		let base = Self::service_task_base();
		let mut total = match maybe_lookup_len {
			None => base,
			Some(l) => Self::service_task_fetched(l as u32),
		};
		if named {
			total.saturating_accrue(Self::service_task_named().saturating_sub(base));
		}
		if periodic {
			total.saturating_accrue(Self::service_task_periodic().saturating_sub(base));
		}
		total
	}
}
impl<T: WeightInfo> MarginalWeightInfo for T {}

/// Configuration of a [`Scheduler`].
pub trait Config: 'static {
	/// The unit agendas are keyed by.
	type BlockNumber: AtLeast32BitUnsigned + Copy + Ord + Debug + 'static;

	/// Hash of a call preimage.
	type Hash: Clone + Eq + Debug + 'static;

	/// The caller origin, handed to the dispatcher untouched.
	type Origin: Clone + Debug + 'static;

	/// Executes scheduled calls.
	type Dispatcher: CallDispatcher<Self::Origin>;

	/// Resolves calls that are scheduled by hash.
	type Preimages: QueryPreimage<H = Self::Hash>;

	/// The maximum weight that may be used by one call to [`Scheduler::service`].
	type MaximumWeight: Get<Weight>;

	/// The maximum number of scheduled calls in the agenda of one block.
	type MaxScheduledPerBlock: Get<u32>;

	/// Weight information for the bookkeeping of the engine.
	type WeightInfo: WeightInfo;
}

/// Events emitted by the engine.
#[derive(Clone, RuntimeDebug, PartialEq, Eq, Encode, Decode, TypeInfo)]
pub enum Event<BlockNumber> {
	/// Scheduled some task.
	Scheduled { when: BlockNumber, index: u32 },
	/// Canceled some task.
	Canceled { when: BlockNumber, index: u32 },
	/// Dispatched some task.
	Dispatched { task: TaskAddress<BlockNumber>, id: Option<TaskName>, result: DispatchResult },
	/// Set a retry configuration for some task.
	RetrySet { task: TaskAddress<BlockNumber>, id: Option<TaskName>, period: BlockNumber, retries: u32 },
	/// Cancel a retry configuration for some task.
	RetryCancelled { task: TaskAddress<BlockNumber>, id: Option<TaskName> },
	/// The call for the provided hash was not found so the task has been aborted.
	CallUnavailable { task: TaskAddress<BlockNumber>, id: Option<TaskName> },
	/// The given task was unable to be renewed since the agenda is full at that block.
	PeriodicFailed { task: TaskAddress<BlockNumber>, id: Option<TaskName> },
	/// The given task was unable to be retried since the agenda is full at that block or there
	/// was not enough weight to reschedule it.
	RetryFailed { task: TaskAddress<BlockNumber>, id: Option<TaskName> },
	/// The given task can never be executed since it is overweight.
	PermanentlyOverweight { task: TaskAddress<BlockNumber>, id: Option<TaskName> },
}

/// Reasons a scheduling request can be rejected.
#[derive(Clone, Copy, RuntimeDebug, PartialEq, Eq, Encode, Decode, MaxEncodedLen, TypeInfo)]
#[cfg_attr(feature = "std", derive(thiserror::Error))]
pub enum Error {
	/// A task with the same name is already scheduled.
	#[cfg_attr(feature = "std", error("a task with the same name is already scheduled"))]
	DuplicateId,
	/// Cannot find the scheduled call.
	#[cfg_attr(feature = "std", error("cannot find the scheduled call"))]
	NotFound,
	/// Given target block number is not in the future.
	#[cfg_attr(feature = "std", error("given target block number is not in the future"))]
	TargetBlockElapsed,
	/// The agenda of the target block is full.
	#[cfg_attr(feature = "std", error("the agenda of the target block is full"))]
	AgendaFull,
	/// Reschedule failed because it does not change scheduled time.
	#[cfg_attr(feature = "std", error("reschedule does not change the scheduled time"))]
	RescheduleNoChange,
	/// Attempt to use a non-named function on a named task.
	#[cfg_attr(feature = "std", error("attempt to use a non-named function on a named task"))]
	Named,
}

impl Error {
	fn as_str(&self) -> &'static str {
		match self {
			Error::DuplicateId => "DuplicateId",
			Error::NotFound => "NotFound",
			Error::TargetBlockElapsed => "TargetBlockElapsed",
			Error::AgendaFull => "AgendaFull",
			Error::RescheduleNoChange => "RescheduleNoChange",
			Error::Named => "Named",
		}
	}
}

impl From<Error> for DispatchError {
	fn from(error: Error) -> Self {
		DispatchError::Other(error.as_str())
	}
}

/// The scheduler: the agendas, the name lookup and the retry policies along with the
/// collaborators that execute calls and resolve preimages.
pub struct Scheduler<T: Config> {
	agendas: AgendaOf<T>,
	lookup: LookupTable<T::BlockNumber>,
	retries: RetryTable<T::BlockNumber>,
	/// The oldest block whose agenda still holds work that did not fit into the budget.
	incomplete_since: Option<T::BlockNumber>,
	/// The last block given to [`Scheduler::service`].
	now: T::BlockNumber,
	dispatcher: T::Dispatcher,
	preimages: T::Preimages,
	events: Vec<EventOf<T>>,
}

impl<T: Config> Scheduler<T> {
	pub fn new(dispatcher: T::Dispatcher, preimages: T::Preimages) -> Self {
		Self {
			agendas: Default::default(),
			lookup: Default::default(),
			retries: Default::default(),
			incomplete_since: None,
			now: Zero::zero(),
			dispatcher,
			preimages,
			events: Vec::new(),
		}
	}

	/// The last serviced block.
	pub fn now(&self) -> T::BlockNumber {
		self.now
	}

	pub fn incomplete_since(&self) -> Option<T::BlockNumber> {
		self.incomplete_since
	}

	/// The slots of the agenda at `when`.
	pub fn agenda(&self, when: T::BlockNumber) -> &[Option<ScheduledOf<T>>] {
		self.agendas.get(when)
	}

	pub fn agendas(&self) -> impl Iterator<Item = (T::BlockNumber, &[Option<ScheduledOf<T>>])> {
		self.agendas.iter()
	}

	/// Where the task named `id` is scheduled.
	pub fn lookup(&self, id: &TaskName) -> Option<TaskAddressOf<T>> {
		self.lookup.resolve(id)
	}

	pub fn retry(&self, address: TaskAddressOf<T>) -> Option<RetryConfigOf<T>> {
		self.retries.get(&address)
	}

	pub fn retries(&self) -> impl Iterator<Item = (&TaskAddressOf<T>, &RetryConfigOf<T>)> {
		self.retries.iter()
	}

	pub fn events(&self) -> &[EventOf<T>] {
		&self.events
	}

	/// Drain the events emitted so far.
	pub fn take_events(&mut self) -> Vec<EventOf<T>> {
		core::mem::take(&mut self.events)
	}

	pub fn dispatcher(&self) -> &T::Dispatcher {
		&self.dispatcher
	}

	pub fn dispatcher_mut(&mut self) -> &mut T::Dispatcher {
		&mut self.dispatcher
	}

	pub fn preimages(&self) -> &T::Preimages {
		&self.preimages
	}

	pub fn preimages_mut(&mut self) -> &mut T::Preimages {
		&mut self.preimages
	}

	/// Anonymously schedule a task at block `when`.
	pub fn schedule(
		&mut self,
		when: T::BlockNumber,
		maybe_periodic: Option<Period<T::BlockNumber>>,
		priority: Priority,
		origin: T::Origin,
		call: BoundedCallOf<T>,
	) -> Result<TaskAddressOf<T>, Error> {
		self.do_schedule(None, DispatchTime::At(when), maybe_periodic, priority, origin, call)
	}

	/// Schedule a named task at block `when`.
	pub fn schedule_named(
		&mut self,
		id: TaskName,
		when: T::BlockNumber,
		maybe_periodic: Option<Period<T::BlockNumber>>,
		priority: Priority,
		origin: T::Origin,
		call: BoundedCallOf<T>,
	) -> Result<TaskAddressOf<T>, Error> {
		self.do_schedule(Some(id), DispatchTime::At(when), maybe_periodic, priority, origin, call)
	}

	/// Anonymously schedule a task `after` blocks from the last serviced block.
	pub fn schedule_after(
		&mut self,
		after: T::BlockNumber,
		maybe_periodic: Option<Period<T::BlockNumber>>,
		priority: Priority,
		origin: T::Origin,
		call: BoundedCallOf<T>,
	) -> Result<TaskAddressOf<T>, Error> {
		self.do_schedule(None, DispatchTime::After(after), maybe_periodic, priority, origin, call)
	}

	/// Schedule a named task `after` blocks from the last serviced block.
	pub fn schedule_named_after(
		&mut self,
		id: TaskName,
		after: T::BlockNumber,
		maybe_periodic: Option<Period<T::BlockNumber>>,
		priority: Priority,
		origin: T::Origin,
		call: BoundedCallOf<T>,
	) -> Result<TaskAddressOf<T>, Error> {
		self.do_schedule(Some(id), DispatchTime::After(after), maybe_periodic, priority, origin, call)
	}

	/// Cancel an anonymously scheduled task.
	pub fn cancel(&mut self, (when, index): TaskAddressOf<T>) -> Result<(), Error> {
		let task = self.agendas.take(when, index).ok_or(Error::NotFound)?;
		if let Some(id) = task.maybe_id {
			if self.lookup.resolve(&id) == Some((when, index)) {
				self.lookup.remove(&id);
			}
		}
		self.do_cancel((when, index), task);
		Ok(())
	}

	/// Cancel a named scheduled task.
	pub fn cancel_named(&mut self, id: TaskName) -> Result<(), Error> {
		let (when, index) = self.lookup.remove(&id).ok_or(Error::NotFound)?;
		let task = self.agendas.take(when, index).ok_or(Error::NotFound)?;
		self.do_cancel((when, index), task);
		Ok(())
	}

	/// Set a retry configuration for a task so that, in case its scheduled run fails, it will
	/// be retried after `period` blocks, for a total amount of `retries` retries or until it
	/// succeeds.
	///
	/// Tasks which need to be scheduled for a retry are still subject to weight metering and
	/// agenda space, same as a regular task. A failed periodic task is not renewed; only its
	/// retries run.
	///
	/// Tasks scheduled as a result of a retry are unnamed, non-periodic clones of the original
	/// task. Their retry configuration will be derived from the original task's configuration,
	/// but will have a lower value for `remaining` than the original `total_retries`.
	pub fn set_retry(
		&mut self,
		(when, index): TaskAddressOf<T>,
		retries: u32,
		period: T::BlockNumber,
	) -> Result<(), Error> {
		let id = self.agendas.slot(when, index).ok_or(Error::NotFound)?.maybe_id;
		self.retries.set((when, index), retries, period);
		log::debug!(
			target: LOG_TARGET,
			"retry set for ({:?}, {}): {} retries every {:?}",
			when,
			index,
			retries,
			period
		);
		self.deposit_event(Event::RetrySet { task: (when, index), id, period, retries });
		Ok(())
	}

	/// Set a retry configuration for a named task. See [`Scheduler::set_retry`].
	pub fn set_retry_named(
		&mut self,
		id: TaskName,
		retries: u32,
		period: T::BlockNumber,
	) -> Result<(), Error> {
		let address = self.lookup.resolve(&id).ok_or(Error::NotFound)?;
		self.set_retry(address, retries, period)
	}

	/// Removes the retry configuration of a task.
	pub fn cancel_retry(&mut self, address: TaskAddressOf<T>) -> Result<(), Error> {
		let id = self.agendas.slot(address.0, address.1).ok_or(Error::NotFound)?.maybe_id;
		self.retries.clear(&address);
		self.deposit_event(Event::RetryCancelled { task: address, id });
		Ok(())
	}

	/// Cancel the retry configuration of a named task.
	///
	/// Retry attempts of a named task are unnamed, so this only reaches the policy while the
	/// original task is still scheduled.
	pub fn cancel_retry_named(&mut self, id: TaskName) -> Result<(), Error> {
		let address = self.lookup.resolve(&id).ok_or(Error::NotFound)?;
		self.cancel_retry(address)
	}

	/// Move an anonymous task to a different block. Its retry configuration moves along.
	pub fn reschedule(
		&mut self,
		(when, index): TaskAddressOf<T>,
		new_time: DispatchTime<T::BlockNumber>,
	) -> Result<TaskAddressOf<T>, Error> {
		let new_time = self.resolve_time(new_time)?;
		ensure!(new_time != when, Error::RescheduleNoChange);
		let task = self.agendas.slot(when, index).ok_or(Error::NotFound)?;
		ensure!(task.maybe_id.is_none(), Error::Named);
		self.move_task((when, index), new_time)
	}

	/// Move a named task to a different block. Its retry configuration moves along.
	pub fn reschedule_named(
		&mut self,
		id: TaskName,
		new_time: DispatchTime<T::BlockNumber>,
	) -> Result<TaskAddressOf<T>, Error> {
		let new_time = self.resolve_time(new_time)?;
		let (when, index) = self.lookup.resolve(&id).ok_or(Error::NotFound)?;
		ensure!(new_time != when, Error::RescheduleNoChange);
		self.move_task((when, index), new_time)
	}

	/// The block at which the task at `address` is going to be dispatched.
	pub fn next_dispatch_time(
		&self,
		(when, index): TaskAddressOf<T>,
	) -> Result<T::BlockNumber, Error> {
		self.agendas.slot(when, index).map(|_| when).ok_or(Error::NotFound)
	}

	/// The block at which the task named `id` is going to be dispatched.
	pub fn next_dispatch_time_named(&self, id: TaskName) -> Result<T::BlockNumber, Error> {
		self.lookup.resolve(&id).map(|(when, _)| when).ok_or(Error::NotFound)
	}

	fn resolve_time(&self, when: DispatchTime<T::BlockNumber>) -> Result<T::BlockNumber, Error> {
		let when = match when {
			DispatchTime::At(x) => x,
			DispatchTime::After(x) => self.now.saturating_add(x),
		};

		ensure!(when > self.now, Error::TargetBlockElapsed);

		Ok(when)
	}

	fn place_task(
		&mut self,
		when: T::BlockNumber,
		what: ScheduledOf<T>,
	) -> Result<TaskAddressOf<T>, (Error, ScheduledOf<T>)> {
		let maybe_name = what.maybe_id;
		if maybe_name.as_ref().map_or(false, |name| self.lookup.contains(name)) {
			return Err((Error::DuplicateId, what));
		}
		let index = self.agendas.append(when, what).map_err(|what| (Error::AgendaFull, what))?;
		let address = (when, index);
		if let Some(name) = maybe_name {
			// cannot collide, checked above
			let _ = self.lookup.insert(name, address);
		}
		self.deposit_event(Event::Scheduled { when, index });
		Ok(address)
	}

	fn do_schedule(
		&mut self,
		maybe_id: Option<TaskName>,
		when: DispatchTime<T::BlockNumber>,
		maybe_periodic: Option<Period<T::BlockNumber>>,
		priority: Priority,
		origin: T::Origin,
		call: BoundedCallOf<T>,
	) -> Result<TaskAddressOf<T>, Error> {
		// ensure id it is unique
		if let Some(ref id) = maybe_id {
			ensure!(!self.lookup.contains(id), Error::DuplicateId);
		}

		let when = self.resolve_time(when)?;

		let lookup_hash = call.lookup_hash().cloned();

		// sanitize maybe_periodic
		let maybe_periodic = maybe_periodic
			.filter(|p| p.1 > 1 && !p.0.is_zero())
			// Remove one from the number of repetitions since we will schedule one now.
			.map(|(p, c)| (p, c - 1));
		let task = Scheduled { maybe_id, priority, call, maybe_periodic, origin };
		let address = self.place_task(when, task).map_err(|x| x.0)?;

		if let Some(hash) = lookup_hash {
			// Request the call to be made available.
			self.preimages.request(&hash);
		}

		log::debug!(
			target: LOG_TARGET,
			"scheduled {:?} at ({:?}, {}), periodic: {:?}",
			maybe_id,
			address.0,
			address.1,
			maybe_periodic
		);
		Ok(address)
	}

	/// Drop everything that refers to the task just taken out of `address`.
	fn do_cancel(&mut self, (when, index): TaskAddressOf<T>, task: ScheduledOf<T>) {
		self.release(&task.call);
		self.retries.clear(&(when, index));
		self.agendas.trim_trailing_none(when);
		log::debug!(target: LOG_TARGET, "canceled ({:?}, {})", when, index);
		self.deposit_event(Event::Canceled { when, index });
	}

	fn move_task(
		&mut self,
		(when, index): TaskAddressOf<T>,
		new_time: T::BlockNumber,
	) -> Result<TaskAddressOf<T>, Error> {
		let task = self.agendas.take(when, index).ok_or(Error::NotFound)?;
		if let Some(ref id) = task.maybe_id {
			self.lookup.remove(id);
		}
		match self.place_task(new_time, task) {
			Ok(new_address) => {
				if let Some(retry_config) = self.retries.clear(&(when, index)) {
					self.retries.insert(new_address, retry_config);
				}
				self.agendas.trim_trailing_none(when);
				log::debug!(
					target: LOG_TARGET,
					"moved ({:?}, {}) to ({:?}, {})",
					when,
					index,
					new_address.0,
					new_address.1
				);
				self.deposit_event(Event::Canceled { when, index });
				Ok(new_address)
			},
			Err((error, task)) => {
				// put everything back where it was
				let maybe_id = task.maybe_id;
				self.agendas.set(when, index, Some(task));
				if let Some(id) = maybe_id {
					let _ = self.lookup.insert(id, (when, index));
				}
				Err(error)
			},
		}
	}

	/// Give up the preimage request made when the call was scheduled.
	fn release(&mut self, call: &BoundedCallOf<T>) {
		if let Some(hash) = call.lookup_hash() {
			self.preimages.unrequest(hash);
		}
	}

	fn deposit_event(&mut self, event: EventOf<T>) {
		self.events.push(event);
	}
}
