//! Implementations of the generic scheduling traits for the engine.

use super::*;
use qp_scheduler::{ScheduleAnon, ScheduleNamed};

impl<T: Config> ScheduleAnon<T::BlockNumber, T::Origin, T::Hash> for Scheduler<T> {
	type Address = TaskAddressOf<T>;

	fn schedule(
		&mut self,
		when: DispatchTime<T::BlockNumber>,
		maybe_periodic: Option<Period<T::BlockNumber>>,
		priority: Priority,
		origin: T::Origin,
		call: BoundedCallOf<T>,
	) -> Result<Self::Address, DispatchError> {
		self.do_schedule(None, when, maybe_periodic, priority, origin, call)
			.map_err(map_err_to_dispatch_err)
	}

	fn cancel(&mut self, address: Self::Address) -> Result<(), DispatchError> {
		Scheduler::cancel(self, address).map_err(map_err_to_dispatch_err)
	}

	fn reschedule(
		&mut self,
		address: Self::Address,
		when: DispatchTime<T::BlockNumber>,
	) -> Result<Self::Address, DispatchError> {
		Scheduler::reschedule(self, address, when).map_err(map_err_to_dispatch_err)
	}

	fn next_dispatch_time(&self, address: Self::Address) -> Result<T::BlockNumber, DispatchError> {
		Scheduler::next_dispatch_time(self, address).map_err(map_err_to_dispatch_err)
	}
}

impl<T: Config> ScheduleNamed<T::BlockNumber, T::Origin, T::Hash> for Scheduler<T> {
	type Address = TaskAddressOf<T>;

	fn schedule_named(
		&mut self,
		id: TaskName,
		when: DispatchTime<T::BlockNumber>,
		maybe_periodic: Option<Period<T::BlockNumber>>,
		priority: Priority,
		origin: T::Origin,
		call: BoundedCallOf<T>,
	) -> Result<Self::Address, DispatchError> {
		self.do_schedule(Some(id), when, maybe_periodic, priority, origin, call)
			.map_err(map_err_to_dispatch_err)
	}

	fn cancel_named(&mut self, id: TaskName) -> Result<(), DispatchError> {
		Scheduler::cancel_named(self, id).map_err(map_err_to_dispatch_err)
	}

	fn reschedule_named(
		&mut self,
		id: TaskName,
		when: DispatchTime<T::BlockNumber>,
	) -> Result<Self::Address, DispatchError> {
		Scheduler::reschedule_named(self, id, when).map_err(map_err_to_dispatch_err)
	}

	fn next_dispatch_time(&self, id: TaskName) -> Result<T::BlockNumber, DispatchError> {
		self.next_dispatch_time_named(id).map_err(map_err_to_dispatch_err)
	}
}

/// Maps an engine error to the error callers of the generic traits expect.
fn map_err_to_dispatch_err(err: Error) -> DispatchError {
	match err {
		Error::NotFound => DispatchError::Unavailable,
		err => err.into(),
	}
}
