#![allow(non_local_definitions)]
//! Program error types.
use {
    num_derive::FromPrimitive,
    solana_program::{
        decode_error::DecodeError,
        msg,
        program_error::{PrintProgramError, ProgramError},
    },
    thiserror::Error,
};

/// Errors that can be returned by the Stake Rewards program.
#[derive(Error, Clone, Copy, Debug, Eq, PartialEq, FromPrimitive)]
pub enum StakeRewardsError {
    /// 0 - Amount must be greater than zero.
    #[error("Amount must be greater than zero")]
    ZeroAmount,
    /// 1 - Withdraw amount exceeds the participant's staked balance.
    #[error("Withdraw amount exceeds staked balance")]
    InsufficientStake,
    /// 2 - Caller is not the pool's authorized reward depositor.
    #[error("Caller is not the authorized depositor")]
    Unauthorized,
    /// 3 - Participant has no accrued rewards to claim.
    #[error("No rewards to claim")]
    NoRewardsToClaim,
    /// 4 - Rewards cannot be deposited while nothing is staked.
    #[error("No stakers to reward")]
    NoStakersToReward,
    /// 5 - Moving tokens or lamports through a collaborator failed.
    #[error("Transfer failed")]
    TransferFailure,
    /// 6 - Incorrect reward pool address.
    #[error("Incorrect reward pool address")]
    IncorrectRewardPoolAddress,
    /// 7 - Incorrect participant record address.
    #[error("Incorrect participant record address")]
    IncorrectParticipantRecordAddress,
    /// 8 - Incorrect escrow token account address.
    #[error("Incorrect escrow address")]
    IncorrectEscrowAddress,
    /// 9 - Mint does not match the pool's stake mint.
    #[error("Stake mint mismatch")]
    StakeMintMismatch,
    /// 10 - Participant record belongs to a different owner.
    #[error("Participant mismatch")]
    ParticipantMismatch,
    /// 11 - Claimed rewards exceed deposited rewards, or the vault cannot
    /// cover what has been accrued. The pool refuses further mutation.
    #[error("Reward conservation violated")]
    ConservationViolated,
    /// 12 - Token account is not for the pool's stake mint.
    #[error("Token account mint mismatch")]
    TokenAccountMintMismatch,
    /// 13 - Stake mint carries an extension that lets escrow drift from the
    /// staked total.
    #[error("Unsupported stake mint extension")]
    UnsupportedStakeMint,
}

impl PrintProgramError for StakeRewardsError {
    fn print<E>(&self) {
        msg!(&self.to_string());
    }
}

impl From<StakeRewardsError> for ProgramError {
    fn from(e: StakeRewardsError) -> Self {
        ProgramError::Custom(e as u32)
    }
}

impl<T> DecodeError<T> for StakeRewardsError {
    fn type_of() -> &'static str {
        "StakeRewardsError"
    }
}
