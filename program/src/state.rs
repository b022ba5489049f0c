//! Program state types.
//!
//! The reward pool tracks a single accumulator, the rewards earned by one
//! staked token since the pool was created. It only moves when rewards are
//! deposited, by the deposit divided by the total stake at that moment.
//!
//! Each participant record stores what that accumulator was the last time the
//! participant was settled. Whatever the accumulator has gained since then,
//! multiplied by the participant's stake, is what the participant has earned
//! and not yet had credited.
//!
//! Settling a participant before their stake changes is what keeps the
//! distribution fair: the movement that already happened is credited at the
//! old stake, and only future movement is credited at the new one.
//!
//! ```text
//!
//! -- Legend --
//!
//!     `rate`:         Reward per staked token, `reward_per_token_stored`.
//!     `paid`:         The rate as of the participant's last settlement.
//!     `accrued`:      Settled rewards waiting to be claimed.
//!     `earned`:       accrued + stake * (rate - paid).
//! --
//!
//! --> Alice stakes 7000.
//!
//! Pool:   total_staked:   7000        Alice:  stake:      7000
//!         rate:           0                   paid:       0
//!                                             earned:     0
//!
//! --> 100 rewards are deposited.
//!
//! The rate grows by 100 / 7000.
//!
//! Pool:   total_staked:   7000        Alice:  stake:      7000
//!         rate:           1/70                paid:       0
//!                                             earned:     100
//!
//! --> Bob stakes 3000.
//!
//! Bob is settled first. He has no stake yet, so he is credited nothing, but
//! his `paid` snapshot moves up to the current rate. Alice is untouched.
//!
//! Pool:   total_staked:   10000       Alice:  stake:      7000
//!         rate:           1/70                paid:       0
//!                                             earned:     100
//!
//!                                     Bob:    stake:      3000
//!                                             paid:       1/70
//!                                             earned:     0
//!
//! --> 100 rewards are deposited.
//!
//! The rate grows by 100 / 10000 = 1/100.
//!
//! Alice is eligible for 7000 * (1/70 + 1/100 - 0) = 170.
//! Bob is eligible for 3000 * (1/70 + 1/100 - 1/70) = 30.
//!
//! Pool:   total_staked:   10000       Alice:  stake:      7000
//!         rate:           1/70+1/100          paid:       0
//!                                             earned:     170
//!
//!                                     Bob:    stake:      3000
//!                                             paid:       1/70
//!                                             earned:     30
//!
//! The outstanding claims total 170 + 30 = 200, exactly what was deposited.
//! ```
//!
//! The rate is stored in fixed point, scaled by
//! [REWARD_PER_TOKEN_SCALING_FACTOR](../constants/constant.REWARD_PER_TOKEN_SCALING_FACTOR.html),
//! so every division truncates. The truncated remainder (dust) stays in the
//! pool and is never paid out.

use {
    crate::{
        constants::{SEED_PREFIX_PARTICIPANT, SEED_PREFIX_REWARD_POOL},
        ledger,
    },
    bytemuck::{Pod, Zeroable},
    shank::ShankAccount,
    solana_program::{program_error::ProgramError, pubkey::Pubkey},
};

/// Derive the address of a reward pool account.
pub fn get_reward_pool_address(stake_mint_address: &Pubkey) -> Pubkey {
    get_reward_pool_address_and_bump_seed(stake_mint_address).0
}

/// Derive the address of a reward pool account, with bump seed.
pub fn get_reward_pool_address_and_bump_seed(stake_mint_address: &Pubkey) -> (Pubkey, u8) {
    Pubkey::find_program_address(
        &collect_reward_pool_seeds(stake_mint_address),
        &crate::id(),
    )
}

pub(crate) fn collect_reward_pool_seeds(stake_mint_address: &Pubkey) -> [&[u8]; 2] {
    [SEED_PREFIX_REWARD_POOL, stake_mint_address.as_ref()]
}

pub(crate) fn collect_reward_pool_signer_seeds<'a>(
    stake_mint_address: &'a Pubkey,
    bump_seed: &'a [u8],
) -> [&'a [u8]; 3] {
    [
        SEED_PREFIX_REWARD_POOL,
        stake_mint_address.as_ref(),
        bump_seed,
    ]
}

/// Derive the address of a participant record account.
pub fn get_participant_record_address(
    reward_pool_address: &Pubkey,
    owner_address: &Pubkey,
) -> Pubkey {
    get_participant_record_address_and_bump_seed(reward_pool_address, owner_address).0
}

/// Derive the address of a participant record account, with bump seed.
pub fn get_participant_record_address_and_bump_seed(
    reward_pool_address: &Pubkey,
    owner_address: &Pubkey,
) -> (Pubkey, u8) {
    Pubkey::find_program_address(
        &collect_participant_record_seeds(reward_pool_address, owner_address),
        &crate::id(),
    )
}

pub(crate) fn collect_participant_record_seeds<'a>(
    reward_pool_address: &'a Pubkey,
    owner_address: &'a Pubkey,
) -> [&'a [u8]; 3] {
    [
        SEED_PREFIX_PARTICIPANT,
        reward_pool_address.as_ref(),
        owner_address.as_ref(),
    ]
}

pub(crate) fn collect_participant_record_signer_seeds<'a>(
    reward_pool_address: &'a Pubkey,
    owner_address: &'a Pubkey,
    bump_seed: &'a [u8],
) -> [&'a [u8]; 4] {
    [
        SEED_PREFIX_PARTICIPANT,
        reward_pool_address.as_ref(),
        owner_address.as_ref(),
        bump_seed,
    ]
}

/// Tracks the total stake and the reward accumulator for one stake mint.
///
/// Deposited rewards are held as lamports directly on this account, above its
/// rent-exempt minimum.
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, ShankAccount, Zeroable)]
#[repr(C)]
pub struct RewardPool {
    /// The current rewards per token exchange rate.
    ///
    /// Stored as a `u128`, which includes a scaling factor of `1e18` to
    /// represent the exchange rate with 18 decimal places of precision.
    pub reward_per_token_stored: u128,
    /// Sum of the staked balances of every participant.
    pub total_staked: u64,
    /// Running counter of all rewards deposited into the pool.
    pub total_rewards_deposited: u64,
    /// Running counter of all rewards paid out to participants.
    pub total_rewards_claimed: u64,
    pub _padding: u64,
    /// The mint of the token staked in this pool.
    pub stake_mint: Pubkey,
    /// The only address allowed to deposit rewards.
    pub authorized_depositor: Pubkey,
}

impl RewardPool {
    /// Creates a new, empty [RewardPool](struct.RewardPool.html).
    pub fn new(stake_mint: Pubkey, authorized_depositor: Pubkey) -> Self {
        Self {
            stake_mint,
            authorized_depositor,
            ..Self::default()
        }
    }

    pub fn total_staked(&self) -> u64 {
        self.total_staked
    }

    pub fn total_rewards_deposited(&self) -> u64 {
        self.total_rewards_deposited
    }

    pub fn total_rewards_claimed(&self) -> u64 {
        self.total_rewards_claimed
    }
}

/// Tracks one participant's stake and the rewards owed to them.
///
/// Created the first time the owner stakes and never closed, so a participant
/// whose stake drops to zero picks up from the right rate when they stake
/// again.
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, ShankAccount, Zeroable)]
#[repr(C)]
pub struct ParticipantRecord {
    /// The rewards per token exchange rate when this participant was last
    /// settled.
    ///
    /// Stored as a `u128`, which includes a scaling factor of `1e18` to
    /// represent the exchange rate with 18 decimal places of precision.
    pub reward_per_token_paid: u128,
    /// The amount of stake tokens held in escrow for this participant.
    pub staked_balance: u64,
    /// Settled rewards, in lamports, that have not been claimed yet.
    pub accrued_reward: u64,
    /// The wallet this record belongs to.
    pub owner: Pubkey,
}

impl ParticipantRecord {
    /// Creates a new [ParticipantRecord](struct.ParticipantRecord.html) with
    /// no stake, settled at the provided rate.
    pub fn new(owner: Pubkey, reward_per_token_paid: u128) -> Self {
        Self {
            reward_per_token_paid,
            staked_balance: 0,
            accrued_reward: 0,
            owner,
        }
    }

    pub fn balance_of(&self) -> u64 {
        self.staked_balance
    }

    /// Rewards this participant could claim right now.
    pub fn earned(&self, pool: &RewardPool) -> Result<u64, ProgramError> {
        ledger::earned(pool, self)
    }
}
