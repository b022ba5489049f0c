//! Program instruction types.

use {
    shank::ShankInstruction,
    solana_program::{
        instruction::{AccountMeta, Instruction},
        program_error::ProgramError,
        pubkey::Pubkey,
        system_program,
    },
};

/// Instructions supported by the Stake Rewards program.
#[rustfmt::skip]
#[derive(Clone, Copy, Debug, PartialEq, ShankInstruction)]
pub enum StakeRewardsInstruction {
    /// Creates the reward pool for a stake mint, along with the escrow token
    /// account that holds staked tokens.
    ///
    /// The provided address becomes the only account allowed to deposit
    /// rewards into the pool.
    ///
    /// Accounts expected by this instruction:
    ///
    /// 0. `[w]` Reward pool account.
    /// 1. `[w]` Escrow token account.
    /// 2. `[ ]` Stake token mint.
    /// 3. `[w, s]` Payer.
    /// 4. `[ ]` Token program.
    /// 5. `[ ]` Associated token account program.
    /// 6. `[ ]` System program.
    #[account(
        0,
        writable,
        name = "reward_pool",
        desc = "Reward pool account."
    )]
    #[account(
        1,
        writable,
        name = "escrow",
        desc = "Escrow token account."
    )]
    #[account(
        2,
        name = "stake_mint",
        desc = "Stake token mint.",
    )]
    #[account(
        3,
        writable,
        signer,
        name = "payer",
        desc = "Payer.",
    )]
    #[account(
        4,
        name = "token_program",
        desc = "Token program.",
    )]
    #[account(
        5,
        name = "associated_token_program",
        desc = "Associated token account program.",
    )]
    #[account(
        6,
        name = "system_program",
        desc = "System program.",
    )]
    InitializePool(Pubkey),
    /// Moves tokens from the owner's token account into escrow and credits
    /// them to the owner's participant record.
    ///
    /// The participant record is created on the first stake, with rent paid
    /// by the owner.
    ///
    /// Accounts expected by this instruction:
    ///
    /// 0. `[w]` Reward pool account.
    /// 1. `[w]` Participant record account.
    /// 2. `[w]` Owner token account.
    /// 3. `[w]` Escrow token account.
    /// 4. `[ ]` Stake token mint.
    /// 5. `[w, s]` Owner.
    /// 6. `[ ]` Token program.
    /// 7. `[ ]` System program.
    #[account(
        0,
        writable,
        name = "reward_pool",
        desc = "Reward pool account."
    )]
    #[account(
        1,
        writable,
        name = "participant_record",
        desc = "Participant record account.",
    )]
    #[account(
        2,
        writable,
        name = "owner_token_account",
        desc = "Owner token account.",
    )]
    #[account(
        3,
        writable,
        name = "escrow",
        desc = "Escrow token account.",
    )]
    #[account(
        4,
        name = "stake_mint",
        desc = "Stake token mint.",
    )]
    #[account(
        5,
        writable,
        signer,
        name = "owner",
        desc = "Owner.",
    )]
    #[account(
        6,
        name = "token_program",
        desc = "Token program.",
    )]
    #[account(
        7,
        name = "system_program",
        desc = "System program.",
    )]
    Stake(u64),
    /// Moves staked tokens from escrow back to the owner's token account.
    ///
    /// Accounts expected by this instruction:
    ///
    /// 0. `[w]` Reward pool account.
    /// 1. `[w]` Participant record account.
    /// 2. `[w]` Owner token account.
    /// 3. `[w]` Escrow token account.
    /// 4. `[ ]` Stake token mint.
    /// 5. `[s]` Owner.
    /// 6. `[ ]` Token program.
    #[account(
        0,
        writable,
        name = "reward_pool",
        desc = "Reward pool account."
    )]
    #[account(
        1,
        writable,
        name = "participant_record",
        desc = "Participant record account.",
    )]
    #[account(
        2,
        writable,
        name = "owner_token_account",
        desc = "Owner token account.",
    )]
    #[account(
        3,
        writable,
        name = "escrow",
        desc = "Escrow token account.",
    )]
    #[account(
        4,
        name = "stake_mint",
        desc = "Stake token mint.",
    )]
    #[account(
        5,
        signer,
        name = "owner",
        desc = "Owner.",
    )]
    #[account(
        6,
        name = "token_program",
        desc = "Token program.",
    )]
    Withdraw(u64),
    /// Moves lamports from the authorized depositor into the reward pool and
    /// distributes them across everything currently staked.
    ///
    /// Accounts expected by this instruction:
    ///
    /// 0. `[w]` Reward pool account.
    /// 1. `[w, s]` Authorized depositor.
    /// 2. `[ ]` System program.
    #[account(
        0,
        writable,
        name = "reward_pool",
        desc = "Reward pool account."
    )]
    #[account(
        1,
        writable,
        signer,
        name = "depositor",
        desc = "Authorized depositor.",
    )]
    #[account(
        2,
        name = "system_program",
        desc = "System program.",
    )]
    DepositReward(u64),
    /// Moves every lamport the owner has earned from the reward pool to the
    /// owner.
    ///
    /// Accounts expected by this instruction:
    ///
    /// 0. `[w]` Reward pool account.
    /// 1. `[w]` Participant record account.
    /// 2. `[w, s]` Owner.
    #[account(
        0,
        writable,
        name = "reward_pool",
        desc = "Reward pool account."
    )]
    #[account(
        1,
        writable,
        name = "participant_record",
        desc = "Participant record account.",
    )]
    #[account(
        2,
        writable,
        signer,
        name = "owner",
        desc = "Owner.",
    )]
    ClaimRewards,
    /// Writes the lamports a participant could claim right now to the
    /// program's return data, as a little-endian `u64`.
    ///
    /// Accounts expected by this instruction:
    ///
    /// 0. `[ ]` Reward pool account.
    /// 1. `[ ]` Participant record account.
    /// 2. `[ ]` Owner.
    #[account(
        0,
        name = "reward_pool",
        desc = "Reward pool account."
    )]
    #[account(
        1,
        name = "participant_record",
        desc = "Participant record account.",
    )]
    #[account(
        2,
        name = "owner",
        desc = "Owner.",
    )]
    GetEarned,
}

fn unpack_amount(rest: &[u8]) -> Result<u64, ProgramError> {
    rest.get(..8)
        .and_then(|bytes| bytes.try_into().ok())
        .map(u64::from_le_bytes)
        .ok_or(ProgramError::InvalidInstructionData)
}

fn pack_amount(tag: u8, amount: u64) -> Vec<u8> {
    let mut data = Vec::with_capacity(9);
    data.push(tag);
    data.extend_from_slice(&amount.to_le_bytes());
    data
}

impl StakeRewardsInstruction {
    /// Packs a
    /// [StakeRewardsInstruction](enum.StakeRewardsInstruction.html)
    /// into a byte buffer.
    pub fn pack(&self) -> Vec<u8> {
        match self {
            StakeRewardsInstruction::InitializePool(authorized_depositor) => {
                let mut data = Vec::with_capacity(33);
                data.push(0);
                data.extend_from_slice(authorized_depositor.as_ref());
                data
            }
            StakeRewardsInstruction::Stake(amount) => pack_amount(1, *amount),
            StakeRewardsInstruction::Withdraw(amount) => pack_amount(2, *amount),
            StakeRewardsInstruction::DepositReward(amount) => pack_amount(3, *amount),
            StakeRewardsInstruction::ClaimRewards => vec![4],
            StakeRewardsInstruction::GetEarned => vec![5],
        }
    }

    /// Unpacks a byte buffer into a
    /// [StakeRewardsInstruction](enum.StakeRewardsInstruction.html).
    pub fn unpack(input: &[u8]) -> Result<Self, ProgramError> {
        match input.split_first() {
            Some((&0, rest)) => {
                let authorized_depositor = rest
                    .get(..32)
                    .map(bytemuck::from_bytes::<Pubkey>)
                    .ok_or(ProgramError::InvalidInstructionData)?;
                Ok(StakeRewardsInstruction::InitializePool(*authorized_depositor))
            }
            Some((&1, rest)) => Ok(StakeRewardsInstruction::Stake(unpack_amount(rest)?)),
            Some((&2, rest)) => Ok(StakeRewardsInstruction::Withdraw(unpack_amount(rest)?)),
            Some((&3, rest)) => Ok(StakeRewardsInstruction::DepositReward(unpack_amount(rest)?)),
            Some((&4, _)) => Ok(StakeRewardsInstruction::ClaimRewards),
            Some((&5, _)) => Ok(StakeRewardsInstruction::GetEarned),
            _ => Err(ProgramError::InvalidInstructionData),
        }
    }
}

/// Creates an [InitializePool](enum.StakeRewardsInstruction.html)
/// instruction.
pub fn initialize_pool(
    reward_pool_address: &Pubkey,
    escrow_address: &Pubkey,
    stake_mint_address: &Pubkey,
    payer_address: &Pubkey,
    token_program_id: &Pubkey,
    authorized_depositor: Pubkey,
) -> Instruction {
    let accounts = vec![
        AccountMeta::new(*reward_pool_address, false),
        AccountMeta::new(*escrow_address, false),
        AccountMeta::new_readonly(*stake_mint_address, false),
        AccountMeta::new(*payer_address, true),
        AccountMeta::new_readonly(*token_program_id, false),
        AccountMeta::new_readonly(spl_associated_token_account::id(), false),
        AccountMeta::new_readonly(system_program::id(), false),
    ];
    let data = StakeRewardsInstruction::InitializePool(authorized_depositor).pack();
    Instruction::new_with_bytes(crate::id(), &data, accounts)
}

/// Creates a [Stake](enum.StakeRewardsInstruction.html) instruction.
#[allow(clippy::too_many_arguments)]
pub fn stake(
    reward_pool_address: &Pubkey,
    participant_record_address: &Pubkey,
    owner_token_account_address: &Pubkey,
    escrow_address: &Pubkey,
    stake_mint_address: &Pubkey,
    owner_address: &Pubkey,
    token_program_id: &Pubkey,
    amount: u64,
) -> Instruction {
    let accounts = vec![
        AccountMeta::new(*reward_pool_address, false),
        AccountMeta::new(*participant_record_address, false),
        AccountMeta::new(*owner_token_account_address, false),
        AccountMeta::new(*escrow_address, false),
        AccountMeta::new_readonly(*stake_mint_address, false),
        AccountMeta::new(*owner_address, true),
        AccountMeta::new_readonly(*token_program_id, false),
        AccountMeta::new_readonly(system_program::id(), false),
    ];
    let data = StakeRewardsInstruction::Stake(amount).pack();
    Instruction::new_with_bytes(crate::id(), &data, accounts)
}

/// Creates a [Withdraw](enum.StakeRewardsInstruction.html) instruction.
#[allow(clippy::too_many_arguments)]
pub fn withdraw(
    reward_pool_address: &Pubkey,
    participant_record_address: &Pubkey,
    owner_token_account_address: &Pubkey,
    escrow_address: &Pubkey,
    stake_mint_address: &Pubkey,
    owner_address: &Pubkey,
    token_program_id: &Pubkey,
    amount: u64,
) -> Instruction {
    let accounts = vec![
        AccountMeta::new(*reward_pool_address, false),
        AccountMeta::new(*participant_record_address, false),
        AccountMeta::new(*owner_token_account_address, false),
        AccountMeta::new(*escrow_address, false),
        AccountMeta::new_readonly(*stake_mint_address, false),
        AccountMeta::new_readonly(*owner_address, true),
        AccountMeta::new_readonly(*token_program_id, false),
    ];
    let data = StakeRewardsInstruction::Withdraw(amount).pack();
    Instruction::new_with_bytes(crate::id(), &data, accounts)
}

/// Creates a [DepositReward](enum.StakeRewardsInstruction.html) instruction.
pub fn deposit_reward(
    reward_pool_address: &Pubkey,
    depositor_address: &Pubkey,
    amount: u64,
) -> Instruction {
    let accounts = vec![
        AccountMeta::new(*reward_pool_address, false),
        AccountMeta::new(*depositor_address, true),
        AccountMeta::new_readonly(system_program::id(), false),
    ];
    let data = StakeRewardsInstruction::DepositReward(amount).pack();
    Instruction::new_with_bytes(crate::id(), &data, accounts)
}

/// Creates a [ClaimRewards](enum.StakeRewardsInstruction.html) instruction.
pub fn claim_rewards(
    reward_pool_address: &Pubkey,
    participant_record_address: &Pubkey,
    owner_address: &Pubkey,
) -> Instruction {
    let accounts = vec![
        AccountMeta::new(*reward_pool_address, false),
        AccountMeta::new(*participant_record_address, false),
        AccountMeta::new(*owner_address, true),
    ];
    let data = StakeRewardsInstruction::ClaimRewards.pack();
    Instruction::new_with_bytes(crate::id(), &data, accounts)
}

/// Creates a [GetEarned](enum.StakeRewardsInstruction.html) instruction.
pub fn get_earned(
    reward_pool_address: &Pubkey,
    participant_record_address: &Pubkey,
    owner_address: &Pubkey,
) -> Instruction {
    let accounts = vec![
        AccountMeta::new_readonly(*reward_pool_address, false),
        AccountMeta::new_readonly(*participant_record_address, false),
        AccountMeta::new_readonly(*owner_address, false),
    ];
    let data = StakeRewardsInstruction::GetEarned.pack();
    Instruction::new_with_bytes(crate::id(), &data, accounts)
}
