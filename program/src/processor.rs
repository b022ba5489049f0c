//! Program processor.

use {
    crate::{
        error::StakeRewardsError,
        instruction::StakeRewardsInstruction,
        ledger::{self, RewardVault, TokenCustody},
        state::{
            collect_participant_record_signer_seeds, collect_reward_pool_signer_seeds,
            get_participant_record_address, get_participant_record_address_and_bump_seed,
            get_reward_pool_address_and_bump_seed, ParticipantRecord, RewardPool,
        },
    },
    bytemuck::Pod,
    solana_program::{
        account_info::{next_account_info, AccountInfo},
        entrypoint::ProgramResult,
        msg,
        program::{invoke, invoke_signed, set_return_data},
        program_error::ProgramError,
        pubkey::Pubkey,
        rent::Rent,
        system_instruction,
        sysvar::Sysvar,
    },
    spl_associated_token_account::{
        get_associated_token_address_with_program_id,
        instruction::create_associated_token_account_idempotent,
    },
    spl_token_2022::{
        extension::{BaseStateWithExtensions, ExtensionType, StateWithExtensions},
        state::{Account, Mint},
    },
};

fn load_state<T: Pod>(account_info: &AccountInfo) -> Result<T, ProgramError> {
    let data = account_info.try_borrow_data()?;
    bytemuck::try_pod_read_unaligned::<T>(&data).map_err(|_| ProgramError::InvalidAccountData)
}

fn store_state<T: Pod>(account_info: &AccountInfo, state: &T) -> ProgramResult {
    let mut data = account_info.try_borrow_mut_data()?;
    let bytes = bytemuck::bytes_of(state);
    if data.len() != bytes.len() {
        return Err(ProgramError::InvalidAccountData);
    }
    data.copy_from_slice(bytes);
    Ok(())
}

/// Maps a failed CPI into `TransferFailure`. On-chain a failing CPI aborts the
/// whole transaction, so anything the token program would reject is checked
/// before the call.
fn transfer_failure(err: ProgramError) -> ProgramError {
    msg!("Transfer failed: {}", err);
    StakeRewardsError::TransferFailure.into()
}

fn get_token_account_balance_checked(
    mint: &Pubkey,
    token_account_info: &AccountInfo,
) -> Result<u64, ProgramError> {
    let token_account_data = token_account_info.try_borrow_data()?;
    let token_account = StateWithExtensions::<Account>::unpack(&token_account_data)?;

    // Ensure the provided token account is for the mint.
    if !token_account.base.mint.eq(mint) {
        return Err(StakeRewardsError::TokenAccountMintMismatch.into());
    }

    if token_account.base.is_frozen() {
        msg!("Token account {} is frozen", token_account_info.key);
        return Err(StakeRewardsError::TransferFailure.into());
    }

    Ok(token_account.base.amount)
}

/// Rejects mints whose transfers can move a different amount than requested,
/// or move escrowed tokens without the pool's signature.
fn check_stake_mint_extensions(mint: &StateWithExtensions<Mint>) -> ProgramResult {
    for extension_type in mint.get_extension_types()? {
        if matches!(
            extension_type,
            ExtensionType::TransferFeeConfig
                | ExtensionType::PermanentDelegate
                | ExtensionType::TransferHook
                | ExtensionType::NonTransferable
        ) {
            msg!("Stake mint has unsupported extension {:?}", extension_type);
            return Err(StakeRewardsError::UnsupportedStakeMint.into());
        }
    }
    Ok(())
}

/// Loads the reward pool, returning it with the bump seed of its address.
fn load_pool(
    program_id: &Pubkey,
    reward_pool_info: &AccountInfo,
) -> Result<(RewardPool, u8), ProgramError> {
    // Ensure the reward pool is owned by the Stake Rewards program.
    if !reward_pool_info.owner.eq(program_id) {
        return Err(ProgramError::InvalidAccountOwner);
    }

    let pool_state = load_state::<RewardPool>(reward_pool_info)?;

    // Ensure the provided reward pool address is the correct address
    // derived from the stake mint.
    let (reward_pool_address, bump_seed) =
        get_reward_pool_address_and_bump_seed(&pool_state.stake_mint);
    if !reward_pool_info.key.eq(&reward_pool_address) {
        return Err(StakeRewardsError::IncorrectRewardPoolAddress.into());
    }

    Ok((pool_state, bump_seed))
}

/// Loads a participant record, or `None` if the owner has never staked.
fn load_participant_record(
    program_id: &Pubkey,
    reward_pool_address: &Pubkey,
    owner_address: &Pubkey,
    participant_record_info: &AccountInfo,
) -> Result<Option<ParticipantRecord>, ProgramError> {
    // Ensure the provided participant record address is the correct address
    // derived from the pool and the owner.
    if !participant_record_info
        .key
        .eq(&get_participant_record_address(reward_pool_address, owner_address))
    {
        return Err(StakeRewardsError::IncorrectParticipantRecordAddress.into());
    }

    if participant_record_info.data_len() == 0 {
        return Ok(None);
    }

    // Ensure the participant record is owned by the Stake Rewards program.
    if !participant_record_info.owner.eq(program_id) {
        return Err(ProgramError::InvalidAccountOwner);
    }

    load_state::<ParticipantRecord>(participant_record_info).map(Some)
}

/// Validates the token accounts of a stake or withdraw against the pool and
/// returns the stake mint's decimals.
fn check_stake_accounts(
    pool_state: &RewardPool,
    reward_pool_address: &Pubkey,
    stake_mint_info: &AccountInfo,
    escrow_info: &AccountInfo,
    token_program_info: &AccountInfo,
) -> Result<u8, ProgramError> {
    if !stake_mint_info.key.eq(&pool_state.stake_mint) {
        return Err(StakeRewardsError::StakeMintMismatch.into());
    }

    spl_token_2022::check_spl_token_program_account(token_program_info.key)?;
    if !stake_mint_info.owner.eq(token_program_info.key) {
        return Err(ProgramError::IncorrectProgramId);
    }

    if !escrow_info.key.eq(&get_associated_token_address_with_program_id(
        reward_pool_address,
        stake_mint_info.key,
        token_program_info.key,
    )) {
        return Err(StakeRewardsError::IncorrectEscrowAddress.into());
    }

    let mint_data = stake_mint_info.try_borrow_data()?;
    let mint = StateWithExtensions::<Mint>::unpack(&mint_data)?;
    Ok(mint.base.decimals)
}

/// Funds, allocates and assigns a PDA owned by this program.
fn create_program_account<'a>(
    program_id: &Pubkey,
    payer_info: &AccountInfo<'a>,
    account_info: &AccountInfo<'a>,
    space: usize,
    signer_seeds: &[&[u8]],
) -> ProgramResult {
    let rent = <Rent as Sysvar>::get()?;
    let required_lamports = rent
        .minimum_balance(space)
        .saturating_sub(account_info.lamports());

    if required_lamports > 0 {
        invoke(
            &system_instruction::transfer(payer_info.key, account_info.key, required_lamports),
            &[payer_info.clone(), account_info.clone()],
        )?;
    }

    // Allocate & assign.
    invoke_signed(
        &system_instruction::allocate(account_info.key, space as u64),
        &[account_info.clone()],
        &[signer_seeds],
    )?;
    invoke_signed(
        &system_instruction::assign(account_info.key, program_id),
        &[account_info.clone()],
        &[signer_seeds],
    )
}

/// Token custody over the pool's escrow token account.
///
/// Deposits are signed by the owner, withdrawals by the reward pool PDA.
struct EscrowTokenCustody<'a, 'info> {
    token_program_info: &'a AccountInfo<'info>,
    stake_mint_info: &'a AccountInfo<'info>,
    owner_token_account_info: &'a AccountInfo<'info>,
    escrow_info: &'a AccountInfo<'info>,
    owner_info: &'a AccountInfo<'info>,
    reward_pool_info: &'a AccountInfo<'info>,
    reward_pool_signer_seeds: [&'a [u8]; 3],
    decimals: u8,
}

impl TokenCustody for EscrowTokenCustody<'_, '_> {
    fn transfer_in(&mut self, from: &Pubkey, amount: u64) -> ProgramResult {
        if !self.owner_info.key.eq(from) {
            return Err(StakeRewardsError::ParticipantMismatch.into());
        }

        let balance = get_token_account_balance_checked(
            self.stake_mint_info.key,
            self.owner_token_account_info,
        )?;
        if amount > balance {
            msg!("Owner token account holds {}, {} requested", balance, amount);
            return Err(StakeRewardsError::TransferFailure.into());
        }

        let instruction = spl_token_2022::instruction::transfer_checked(
            self.token_program_info.key,
            self.owner_token_account_info.key,
            self.stake_mint_info.key,
            self.escrow_info.key,
            from,
            &[],
            amount,
            self.decimals,
        )?;
        invoke(
            &instruction,
            &[
                self.owner_token_account_info.clone(),
                self.stake_mint_info.clone(),
                self.escrow_info.clone(),
                self.owner_info.clone(),
                self.token_program_info.clone(),
            ],
        )
        .map_err(transfer_failure)
    }

    fn transfer_out(&mut self, to: &Pubkey, amount: u64) -> ProgramResult {
        if !self.owner_info.key.eq(to) {
            return Err(StakeRewardsError::ParticipantMismatch.into());
        }

        get_token_account_balance_checked(self.stake_mint_info.key, self.owner_token_account_info)?;

        // Escrow backs every staked token, so a shortfall means the ledger
        // and the custody account have drifted apart.
        let escrow_balance =
            get_token_account_balance_checked(self.stake_mint_info.key, self.escrow_info)?;
        if amount > escrow_balance {
            msg!("Escrow holds {}, {} owed", escrow_balance, amount);
            return Err(StakeRewardsError::ConservationViolated.into());
        }

        let instruction = spl_token_2022::instruction::transfer_checked(
            self.token_program_info.key,
            self.escrow_info.key,
            self.stake_mint_info.key,
            self.owner_token_account_info.key,
            self.reward_pool_info.key,
            &[],
            amount,
            self.decimals,
        )?;
        invoke_signed(
            &instruction,
            &[
                self.escrow_info.clone(),
                self.stake_mint_info.clone(),
                self.owner_token_account_info.clone(),
                self.reward_pool_info.clone(),
                self.token_program_info.clone(),
            ],
            &[&self.reward_pool_signer_seeds],
        )
        .map_err(transfer_failure)
    }
}

/// Reward vault backed by the lamports the reward pool holds above its
/// rent-exempt minimum.
struct PoolLamportVault<'a, 'info> {
    reward_pool_info: &'a AccountInfo<'info>,
    counterparty_info: &'a AccountInfo<'info>,
}

impl RewardVault for PoolLamportVault<'_, '_> {
    fn receive_deposit(&mut self, amount: u64) -> ProgramResult {
        if amount > self.counterparty_info.lamports() {
            msg!(
                "Depositor holds {} lamports, {} requested",
                self.counterparty_info.lamports(),
                amount
            );
            return Err(StakeRewardsError::TransferFailure.into());
        }

        invoke(
            &system_instruction::transfer(
                self.counterparty_info.key,
                self.reward_pool_info.key,
                amount,
            ),
            &[
                self.counterparty_info.clone(),
                self.reward_pool_info.clone(),
            ],
        )
        .map_err(transfer_failure)
    }

    fn release(&mut self, to: &Pubkey, amount: u64) -> ProgramResult {
        if !self.counterparty_info.key.eq(to) {
            return Err(StakeRewardsError::ParticipantMismatch.into());
        }

        // Every lamport owed was deposited first, so the pool must be able
        // to cover it without dipping into its rent-exempt reserve.
        let pool_excess_lamports = {
            let rent = <Rent as Sysvar>::get()?;
            let rent_exempt_lamports = rent.minimum_balance(std::mem::size_of::<RewardPool>());
            self.reward_pool_info
                .lamports()
                .saturating_sub(rent_exempt_lamports)
        };
        if amount > pool_excess_lamports {
            msg!(
                "Reward pool holds {} lamports, {} owed",
                pool_excess_lamports,
                amount
            );
            return Err(StakeRewardsError::ConservationViolated.into());
        }

        // Move the amount from the reward pool to the recipient.
        let new_reward_pool_lamports = self
            .reward_pool_info
            .lamports()
            .checked_sub(amount)
            .ok_or(ProgramError::ArithmeticOverflow)?;
        let new_recipient_lamports = self
            .counterparty_info
            .lamports()
            .checked_add(amount)
            .ok_or(ProgramError::ArithmeticOverflow)?;
        **self.reward_pool_info.try_borrow_mut_lamports()? = new_reward_pool_lamports;
        **self.counterparty_info.try_borrow_mut_lamports()? = new_recipient_lamports;

        Ok(())
    }
}

/// Processes an [InitializePool](enum.StakeRewardsInstruction.html)
/// instruction.
fn process_initialize_pool(
    program_id: &Pubkey,
    accounts: &[AccountInfo],
    authorized_depositor: Pubkey,
) -> ProgramResult {
    let accounts_iter = &mut accounts.iter();

    let reward_pool_info = next_account_info(accounts_iter)?;
    let escrow_info = next_account_info(accounts_iter)?;
    let stake_mint_info = next_account_info(accounts_iter)?;
    let payer_info = next_account_info(accounts_iter)?;
    let token_program_info = next_account_info(accounts_iter)?;
    let associated_token_program_info = next_account_info(accounts_iter)?;
    let system_program_info = next_account_info(accounts_iter)?;

    // Ensure the payer is a signer.
    if !payer_info.is_signer {
        return Err(ProgramError::MissingRequiredSignature);
    }

    // Run checks on the mint.
    {
        spl_token_2022::check_spl_token_program_account(token_program_info.key)?;
        if !stake_mint_info.owner.eq(token_program_info.key) {
            return Err(ProgramError::IncorrectProgramId);
        }
        let mint_data = stake_mint_info.try_borrow_data()?;
        let mint = StateWithExtensions::<Mint>::unpack(&mint_data)?;
        check_stake_mint_extensions(&mint)?;
    }

    let (reward_pool_address, bump_seed) =
        get_reward_pool_address_and_bump_seed(stake_mint_info.key);

    // Ensure the provided reward pool address is the correct address derived
    // from the mint.
    if !reward_pool_info.key.eq(&reward_pool_address) {
        return Err(StakeRewardsError::IncorrectRewardPoolAddress.into());
    }

    // Ensure the reward pool account has not already been initialized.
    if reward_pool_info.data_len() != 0 {
        return Err(ProgramError::AccountAlreadyInitialized);
    }

    if !escrow_info.key.eq(&get_associated_token_address_with_program_id(
        &reward_pool_address,
        stake_mint_info.key,
        token_program_info.key,
    )) {
        return Err(StakeRewardsError::IncorrectEscrowAddress.into());
    }

    // Initialize the reward pool account.
    {
        let bump_seed = [bump_seed];
        let reward_pool_signer_seeds =
            collect_reward_pool_signer_seeds(stake_mint_info.key, &bump_seed);

        create_program_account(
            program_id,
            payer_info,
            reward_pool_info,
            std::mem::size_of::<RewardPool>(),
            &reward_pool_signer_seeds,
        )?;

        store_state(
            reward_pool_info,
            &RewardPool::new(*stake_mint_info.key, authorized_depositor),
        )?;
    }

    // Initialize the escrow token account, owned by the reward pool.
    invoke(
        &create_associated_token_account_idempotent(
            payer_info.key,
            &reward_pool_address,
            stake_mint_info.key,
            token_program_info.key,
        ),
        &[
            payer_info.clone(),
            escrow_info.clone(),
            reward_pool_info.clone(),
            stake_mint_info.clone(),
            system_program_info.clone(),
            token_program_info.clone(),
            associated_token_program_info.clone(),
        ],
    )?;

    Ok(())
}

/// Processes a [Stake](enum.StakeRewardsInstruction.html) instruction.
fn process_stake(program_id: &Pubkey, accounts: &[AccountInfo], amount: u64) -> ProgramResult {
    let accounts_iter = &mut accounts.iter();

    let reward_pool_info = next_account_info(accounts_iter)?;
    let participant_record_info = next_account_info(accounts_iter)?;
    let owner_token_account_info = next_account_info(accounts_iter)?;
    let escrow_info = next_account_info(accounts_iter)?;
    let stake_mint_info = next_account_info(accounts_iter)?;
    let owner_info = next_account_info(accounts_iter)?;
    let token_program_info = next_account_info(accounts_iter)?;
    let _system_program_info = next_account_info(accounts_iter)?;

    // Ensure the owner is a signer.
    if !owner_info.is_signer {
        return Err(ProgramError::MissingRequiredSignature);
    }

    let (mut pool_state, pool_bump_seed) = load_pool(program_id, reward_pool_info)?;
    let decimals = check_stake_accounts(
        &pool_state,
        reward_pool_info.key,
        stake_mint_info,
        escrow_info,
        token_program_info,
    )?;

    let existing_record = load_participant_record(
        program_id,
        reward_pool_info.key,
        owner_info.key,
        participant_record_info,
    )?;
    let is_new_record = existing_record.is_none();
    let mut record = existing_record.unwrap_or_else(|| {
        ParticipantRecord::new(*owner_info.key, pool_state.reward_per_token_stored)
    });

    let stake_mint = pool_state.stake_mint;
    let pool_bump_seed = [pool_bump_seed];
    let mut custody = EscrowTokenCustody {
        token_program_info,
        stake_mint_info,
        owner_token_account_info,
        escrow_info,
        owner_info,
        reward_pool_info,
        reward_pool_signer_seeds: collect_reward_pool_signer_seeds(&stake_mint, &pool_bump_seed),
        decimals,
    };

    ledger::stake(
        &mut pool_state,
        &mut record,
        owner_info.key,
        amount,
        &mut custody,
    )?;

    if is_new_record {
        let (_, bump_seed) =
            get_participant_record_address_and_bump_seed(reward_pool_info.key, owner_info.key);
        let bump_seed = [bump_seed];
        let participant_record_signer_seeds = collect_participant_record_signer_seeds(
            reward_pool_info.key,
            owner_info.key,
            &bump_seed,
        );
        create_program_account(
            program_id,
            owner_info,
            participant_record_info,
            std::mem::size_of::<ParticipantRecord>(),
            &participant_record_signer_seeds,
        )?;
    }

    store_state(reward_pool_info, &pool_state)?;
    store_state(participant_record_info, &record)?;

    Ok(())
}

/// Processes a [Withdraw](enum.StakeRewardsInstruction.html) instruction.
fn process_withdraw(program_id: &Pubkey, accounts: &[AccountInfo], amount: u64) -> ProgramResult {
    let accounts_iter = &mut accounts.iter();

    let reward_pool_info = next_account_info(accounts_iter)?;
    let participant_record_info = next_account_info(accounts_iter)?;
    let owner_token_account_info = next_account_info(accounts_iter)?;
    let escrow_info = next_account_info(accounts_iter)?;
    let stake_mint_info = next_account_info(accounts_iter)?;
    let owner_info = next_account_info(accounts_iter)?;
    let token_program_info = next_account_info(accounts_iter)?;

    // Ensure the owner is a signer.
    if !owner_info.is_signer {
        return Err(ProgramError::MissingRequiredSignature);
    }

    let (mut pool_state, pool_bump_seed) = load_pool(program_id, reward_pool_info)?;
    let decimals = check_stake_accounts(
        &pool_state,
        reward_pool_info.key,
        stake_mint_info,
        escrow_info,
        token_program_info,
    )?;

    // A participant that never staked has nothing to withdraw; the ledger
    // rejects it against an empty record.
    let mut record = load_participant_record(
        program_id,
        reward_pool_info.key,
        owner_info.key,
        participant_record_info,
    )?
    .unwrap_or_else(|| ParticipantRecord::new(*owner_info.key, pool_state.reward_per_token_stored));

    let stake_mint = pool_state.stake_mint;
    let pool_bump_seed = [pool_bump_seed];
    let mut custody = EscrowTokenCustody {
        token_program_info,
        stake_mint_info,
        owner_token_account_info,
        escrow_info,
        owner_info,
        reward_pool_info,
        reward_pool_signer_seeds: collect_reward_pool_signer_seeds(&stake_mint, &pool_bump_seed),
        decimals,
    };

    ledger::withdraw(
        &mut pool_state,
        &mut record,
        owner_info.key,
        amount,
        &mut custody,
    )?;

    store_state(reward_pool_info, &pool_state)?;
    store_state(participant_record_info, &record)?;

    Ok(())
}

/// Processes a [DepositReward](enum.StakeRewardsInstruction.html)
/// instruction.
fn process_deposit_reward(
    program_id: &Pubkey,
    accounts: &[AccountInfo],
    amount: u64,
) -> ProgramResult {
    let accounts_iter = &mut accounts.iter();

    let reward_pool_info = next_account_info(accounts_iter)?;
    let depositor_info = next_account_info(accounts_iter)?;
    let _system_program_info = next_account_info(accounts_iter)?;

    // Ensure the depositor is a signer.
    if !depositor_info.is_signer {
        return Err(ProgramError::MissingRequiredSignature);
    }

    let (mut pool_state, _) = load_pool(program_id, reward_pool_info)?;

    let mut vault = PoolLamportVault {
        reward_pool_info,
        counterparty_info: depositor_info,
    };
    ledger::deposit_reward(&mut pool_state, depositor_info.key, amount, &mut vault)?;

    store_state(reward_pool_info, &pool_state)
}

/// Processes a [ClaimRewards](enum.StakeRewardsInstruction.html)
/// instruction.
fn process_claim_rewards(program_id: &Pubkey, accounts: &[AccountInfo]) -> ProgramResult {
    let accounts_iter = &mut accounts.iter();

    let reward_pool_info = next_account_info(accounts_iter)?;
    let participant_record_info = next_account_info(accounts_iter)?;
    let owner_info = next_account_info(accounts_iter)?;

    // Ensure the owner is a signer.
    if !owner_info.is_signer {
        return Err(ProgramError::MissingRequiredSignature);
    }

    let (mut pool_state, _) = load_pool(program_id, reward_pool_info)?;
    let mut record = load_participant_record(
        program_id,
        reward_pool_info.key,
        owner_info.key,
        participant_record_info,
    )?
    .ok_or(StakeRewardsError::NoRewardsToClaim)?;

    let mut vault = PoolLamportVault {
        reward_pool_info,
        counterparty_info: owner_info,
    };
    let claimed = ledger::claim_rewards(&mut pool_state, &mut record, owner_info.key, &mut vault)?;
    msg!("Claimed {} lamports", claimed);

    store_state(reward_pool_info, &pool_state)?;
    store_state(participant_record_info, &record)?;

    Ok(())
}

/// Processes a [GetEarned](enum.StakeRewardsInstruction.html) instruction.
fn process_get_earned(program_id: &Pubkey, accounts: &[AccountInfo]) -> ProgramResult {
    let accounts_iter = &mut accounts.iter();

    let reward_pool_info = next_account_info(accounts_iter)?;
    let participant_record_info = next_account_info(accounts_iter)?;
    let owner_info = next_account_info(accounts_iter)?;

    let (pool_state, _) = load_pool(program_id, reward_pool_info)?;

    let earned = match load_participant_record(
        program_id,
        reward_pool_info.key,
        owner_info.key,
        participant_record_info,
    )? {
        Some(record) => record.earned(&pool_state)?,
        None => 0,
    };

    set_return_data(&earned.to_le_bytes());

    Ok(())
}

/// Processes a
/// [StakeRewardsInstruction](enum.StakeRewardsInstruction.html).
pub fn process(program_id: &Pubkey, accounts: &[AccountInfo], input: &[u8]) -> ProgramResult {
    let instruction = StakeRewardsInstruction::unpack(input)?;
    match instruction {
        StakeRewardsInstruction::InitializePool(authorized_depositor) => {
            msg!("Instruction: InitializePool");
            process_initialize_pool(program_id, accounts, authorized_depositor)
        }
        StakeRewardsInstruction::Stake(amount) => {
            msg!("Instruction: Stake");
            process_stake(program_id, accounts, amount)
        }
        StakeRewardsInstruction::Withdraw(amount) => {
            msg!("Instruction: Withdraw");
            process_withdraw(program_id, accounts, amount)
        }
        StakeRewardsInstruction::DepositReward(amount) => {
            msg!("Instruction: DepositReward");
            process_deposit_reward(program_id, accounts, amount)
        }
        StakeRewardsInstruction::ClaimRewards => {
            msg!("Instruction: ClaimRewards");
            process_claim_rewards(program_id, accounts)
        }
        StakeRewardsInstruction::GetEarned => {
            msg!("Instruction: GetEarned");
            process_get_earned(program_id, accounts)
        }
    }
}
