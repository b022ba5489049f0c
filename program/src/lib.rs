//! The Stake Rewards program.
//!
//! Lets holders of an SPL token stake it into a pool and distributes lamport
//! rewards deposited by an authorized depositor among the current stakers, in
//! proportion to each staker's share of the total stake at the moment the
//! rewards arrive.

pub mod constants;
#[cfg(all(target_os = "solana", feature = "bpf-entrypoint"))]
mod entrypoint;
pub mod error;
pub mod instruction;
pub mod ledger;
pub mod processor;
pub mod state;

solana_program::declare_id!("41GvEoqzR8P4U34VsuSAF46g6eQSHZDzn74gjRGQEPeG");
