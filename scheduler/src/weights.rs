//! weights for the scheduler engine

#![cfg_attr(rustfmt, rustfmt_skip)]
#![allow(unused_parens)]

use frame_support::{traits::Get, weights::constants::RocksDbWeight};
use sp_weights::Weight;

/// Weight functions needed for the scheduler engine.
pub trait WeightInfo {
    fn service_agendas_base() -> Weight;
    fn service_agenda_base(s: u32, ) -> Weight;
    fn service_task_base() -> Weight;
    fn service_task_fetched(s: u32, ) -> Weight;
    fn service_task_named() -> Weight;
    fn service_task_periodic() -> Weight;
    fn execute_dispatch() -> Weight;
    fn schedule_retry(s: u32, ) -> Weight;
}

// Reference weights, also used by tests
impl WeightInfo for () {
    // Reads IncompleteSince, writes IncompleteSince
    fn service_agendas_base() -> Weight {
        Weight::from_parts(3_000_000, 0)
            .saturating_add(RocksDbWeight::get().reads(1_u64))
            .saturating_add(RocksDbWeight::get().writes(1_u64))
    }

    // Reads and writes one agenda of `s` slots
    fn service_agenda_base(s: u32, ) -> Weight {
        Weight::from_parts(4_000_000, 0)
            .saturating_add(Weight::from_parts(350_000, 0).saturating_mul(s.into()))
            .saturating_add(RocksDbWeight::get().reads(1_u64))
            .saturating_add(RocksDbWeight::get().writes(1_u64))
    }

    fn service_task_base() -> Weight {
        Weight::from_parts(3_500_000, 0)
    }

    // Reads one preimage of `s` bytes
    fn service_task_fetched(s: u32, ) -> Weight {
        Weight::from_parts(17_000_000, 0)
            .saturating_add(Weight::from_parts(1_200, 0).saturating_mul(s.into()))
            .saturating_add(RocksDbWeight::get().reads(1_u64))
            .saturating_add(RocksDbWeight::get().writes(2_u64))
    }

    // Removes or rewrites one lookup entry
    fn service_task_named() -> Weight {
        Weight::from_parts(5_000_000, 0)
            .saturating_add(RocksDbWeight::get().writes(1_u64))
    }

    fn service_task_periodic() -> Weight {
        Weight::from_parts(3_400_000, 0)
    }

    fn execute_dispatch() -> Weight {
        Weight::from_parts(4_500_000, 0)
    }

    // Reads the agenda at the retry block, writes it and the retry entry
    fn schedule_retry(s: u32, ) -> Weight {
        Weight::from_parts(9_000_000, 0)
            .saturating_add(Weight::from_parts(420_000, 0).saturating_mul(s.into()))
            .saturating_add(RocksDbWeight::get().reads(1_u64))
            .saturating_add(RocksDbWeight::get().writes(2_u64))
    }
}
