//! Reward accounting core.
//!
//! Every function here works on plain [RewardPool](../state/struct.RewardPool.html)
//! and [ParticipantRecord](../state/struct.ParticipantRecord.html) values and
//! touches the outside world only through the [TokenCustody] and [RewardVault]
//! collaborators. State is committed only once the collaborator call has
//! succeeded, so a failed operation leaves both values exactly as they were.

use {
    crate::{
        constants::REWARD_PER_TOKEN_SCALING_FACTOR,
        error::StakeRewardsError,
        state::{ParticipantRecord, RewardPool},
    },
    solana_program::{entrypoint::ProgramResult, program_error::ProgramError, pubkey::Pubkey},
};

/// Moves the stake token between participants and the pool escrow.
pub trait TokenCustody {
    /// Moves `amount` tokens from `from` into escrow.
    fn transfer_in(&mut self, from: &Pubkey, amount: u64) -> ProgramResult;
    /// Moves `amount` tokens from escrow back to `to`.
    fn transfer_out(&mut self, to: &Pubkey, amount: u64) -> ProgramResult;
}

/// Holds the reward asset on behalf of the pool.
pub trait RewardVault {
    /// Takes custody of `amount` newly deposited rewards.
    fn receive_deposit(&mut self, amount: u64) -> ProgramResult;
    /// Pays `amount` rewards out to `to`.
    fn release(&mut self, to: &Pubkey, amount: u64) -> ProgramResult;
}

pub(crate) fn calculate_rewards_per_token(
    rewards: u64,
    total_staked: u64,
) -> Result<u128, ProgramError> {
    // Calculation: rewards / total_staked
    //
    // Scaled by 1e18 to store 18 decimal places of precision.
    (rewards as u128)
        .checked_mul(REWARD_PER_TOKEN_SCALING_FACTOR)
        .and_then(|product| product.checked_div(total_staked as u128))
        .ok_or(ProgramError::ArithmeticOverflow)
}

pub(crate) fn calculate_reward_share(
    current_reward_per_token: u128,
    last_reward_per_token: u128,
    staked_balance: u64,
) -> Result<u64, ProgramError> {
    // Calculation: staked_balance * (current - last) / 1e18
    //
    // Multiply before dividing so the scaled precision is kept.
    let marginal_rate = current_reward_per_token
        .checked_sub(last_reward_per_token)
        .ok_or(StakeRewardsError::ConservationViolated)?;
    if marginal_rate == 0 || staked_balance == 0 {
        return Ok(0);
    }
    marginal_rate
        .checked_mul(staked_balance as u128)
        .map(|product| product / REWARD_PER_TOKEN_SCALING_FACTOR)
        .and_then(|share| share.try_into().ok())
        .ok_or(ProgramError::ArithmeticOverflow)
}

fn check_conservation(pool: &RewardPool) -> ProgramResult {
    if pool.total_rewards_claimed > pool.total_rewards_deposited {
        return Err(StakeRewardsError::ConservationViolated.into());
    }
    Ok(())
}

fn check_participant(record: &ParticipantRecord, participant: &Pubkey) -> ProgramResult {
    if !record.owner.eq(participant) {
        return Err(StakeRewardsError::ParticipantMismatch.into());
    }
    Ok(())
}

/// Credits `record` with everything it earned since it was last settled, and
/// moves its snapshot up to the pool's current rate.
///
/// Must run before the record's staked balance changes.
pub fn settle(pool: &RewardPool, record: &mut ParticipantRecord) -> ProgramResult {
    let owed = calculate_reward_share(
        pool.reward_per_token_stored,
        record.reward_per_token_paid,
        record.staked_balance,
    )?;
    record.accrued_reward = record
        .accrued_reward
        .checked_add(owed)
        .ok_or(ProgramError::ArithmeticOverflow)?;
    record.reward_per_token_paid = pool.reward_per_token_stored;
    Ok(())
}

/// Rewards the participant could claim right now, without settling.
pub fn earned(pool: &RewardPool, record: &ParticipantRecord) -> Result<u64, ProgramError> {
    calculate_reward_share(
        pool.reward_per_token_stored,
        record.reward_per_token_paid,
        record.staked_balance,
    )?
    .checked_add(record.accrued_reward)
    .ok_or(ProgramError::ArithmeticOverflow)
}

/// Stakes `amount` tokens for `participant`.
pub fn stake<C: TokenCustody>(
    pool: &mut RewardPool,
    record: &mut ParticipantRecord,
    participant: &Pubkey,
    amount: u64,
    custody: &mut C,
) -> ProgramResult {
    if amount == 0 {
        return Err(StakeRewardsError::ZeroAmount.into());
    }
    check_conservation(pool)?;
    check_participant(record, participant)?;

    let mut new_record = *record;
    let mut new_pool = *pool;

    settle(&new_pool, &mut new_record)?;

    new_record.staked_balance = new_record
        .staked_balance
        .checked_add(amount)
        .ok_or(ProgramError::ArithmeticOverflow)?;
    new_pool.total_staked = new_pool
        .total_staked
        .checked_add(amount)
        .ok_or(ProgramError::ArithmeticOverflow)?;

    custody.transfer_in(participant, amount)?;

    *record = new_record;
    *pool = new_pool;

    Ok(())
}

/// Withdraws `amount` staked tokens back to `participant`.
pub fn withdraw<C: TokenCustody>(
    pool: &mut RewardPool,
    record: &mut ParticipantRecord,
    participant: &Pubkey,
    amount: u64,
    custody: &mut C,
) -> ProgramResult {
    if amount == 0 {
        return Err(StakeRewardsError::ZeroAmount.into());
    }
    check_conservation(pool)?;
    check_participant(record, participant)?;
    if amount > record.staked_balance {
        return Err(StakeRewardsError::InsufficientStake.into());
    }

    let mut new_record = *record;
    let mut new_pool = *pool;

    settle(&new_pool, &mut new_record)?;

    new_record.staked_balance -= amount;
    new_pool.total_staked = new_pool
        .total_staked
        .checked_sub(amount)
        .ok_or(StakeRewardsError::ConservationViolated)?;

    custody.transfer_out(participant, amount)?;

    *record = new_record;
    *pool = new_pool;

    Ok(())
}

/// Distributes `amount` rewards across everything currently staked.
pub fn deposit_reward<V: RewardVault>(
    pool: &mut RewardPool,
    caller: &Pubkey,
    amount: u64,
    vault: &mut V,
) -> ProgramResult {
    if !pool.authorized_depositor.eq(caller) {
        return Err(StakeRewardsError::Unauthorized.into());
    }
    if amount == 0 {
        return Err(StakeRewardsError::ZeroAmount.into());
    }
    check_conservation(pool)?;
    if pool.total_staked == 0 {
        return Err(StakeRewardsError::NoStakersToReward.into());
    }

    let mut new_pool = *pool;

    // Calculate the new rewards per token by first calculating the rewards
    // per token on the provided rewards amount, then adding that rate to
    // the old rate.
    let marginal_rate = calculate_rewards_per_token(amount, new_pool.total_staked)?;
    new_pool.reward_per_token_stored = new_pool
        .reward_per_token_stored
        .checked_add(marginal_rate)
        .ok_or(ProgramError::ArithmeticOverflow)?;
    new_pool.total_rewards_deposited = new_pool
        .total_rewards_deposited
        .checked_add(amount)
        .ok_or(ProgramError::ArithmeticOverflow)?;

    vault.receive_deposit(amount)?;

    *pool = new_pool;

    Ok(())
}

/// Pays out everything `participant` has earned. Returns the amount paid.
pub fn claim_rewards<V: RewardVault>(
    pool: &mut RewardPool,
    record: &mut ParticipantRecord,
    participant: &Pubkey,
    vault: &mut V,
) -> Result<u64, ProgramError> {
    check_conservation(pool)?;
    check_participant(record, participant)?;

    let mut new_record = *record;
    let mut new_pool = *pool;

    settle(&new_pool, &mut new_record)?;

    let amount = new_record.accrued_reward;
    if amount == 0 {
        return Err(StakeRewardsError::NoRewardsToClaim.into());
    }

    new_record.accrued_reward = 0;
    new_pool.total_rewards_claimed = new_pool
        .total_rewards_claimed
        .checked_add(amount)
        .ok_or(ProgramError::ArithmeticOverflow)?;
    check_conservation(&new_pool)?;

    // The accrual is zeroed before the vault pays out, so nothing reached
    // from `release` can claim the same rewards twice.
    let previous_record = std::mem::replace(record, new_record);
    let previous_pool = std::mem::replace(pool, new_pool);

    if let Err(err) = vault.release(participant, amount) {
        *record = previous_record;
        *pool = previous_pool;
        return Err(err);
    }

    Ok(amount)
}

#[cfg(test)]
mod tests {
    use {
        super::*,
        proptest::prelude::*,
        std::collections::{BTreeMap, HashMap},
        test_case::test_case,
    };

    const LAMPORTS: u64 = 1_000_000_000;

    #[derive(Default)]
    struct MockCustody {
        escrow: u64,
        balances: HashMap<Pubkey, u64>,
        fail: bool,
    }

    impl TokenCustody for MockCustody {
        fn transfer_in(&mut self, from: &Pubkey, amount: u64) -> ProgramResult {
            if self.fail {
                return Err(StakeRewardsError::TransferFailure.into());
            }
            *self.balances.entry(*from).or_default() -= amount;
            self.escrow += amount;
            Ok(())
        }

        fn transfer_out(&mut self, to: &Pubkey, amount: u64) -> ProgramResult {
            if self.fail {
                return Err(StakeRewardsError::TransferFailure.into());
            }
            self.escrow -= amount;
            *self.balances.entry(*to).or_default() += amount;
            Ok(())
        }
    }

    #[derive(Default)]
    struct MockVault {
        balance: u64,
        paid: HashMap<Pubkey, u64>,
        fail: bool,
    }

    impl RewardVault for MockVault {
        fn receive_deposit(&mut self, amount: u64) -> ProgramResult {
            if self.fail {
                return Err(StakeRewardsError::TransferFailure.into());
            }
            self.balance += amount;
            Ok(())
        }

        fn release(&mut self, to: &Pubkey, amount: u64) -> ProgramResult {
            if self.fail || amount > self.balance {
                return Err(StakeRewardsError::TransferFailure.into());
            }
            self.balance -= amount;
            *self.paid.entry(*to).or_default() += amount;
            Ok(())
        }
    }

    /// A pool plus a map of lazily created participant records, driven the
    /// same way the processor drives accounts.
    struct Ledger {
        pool: RewardPool,
        records: BTreeMap<Pubkey, ParticipantRecord>,
        custody: MockCustody,
        vault: MockVault,
        depositor: Pubkey,
    }

    impl Ledger {
        fn new() -> Self {
            let depositor = Pubkey::new_unique();
            Self {
                pool: RewardPool::new(Pubkey::new_unique(), depositor),
                records: BTreeMap::new(),
                custody: MockCustody::default(),
                vault: MockVault::default(),
                depositor,
            }
        }

        fn record(&mut self, participant: &Pubkey) -> ParticipantRecord {
            let rate = self.pool.reward_per_token_stored;
            *self
                .records
                .entry(*participant)
                .or_insert_with(|| ParticipantRecord::new(*participant, rate))
        }

        fn stake(&mut self, participant: &Pubkey, amount: u64) -> ProgramResult {
            *self.custody.balances.entry(*participant).or_default() += amount;
            let mut record = self.record(participant);
            stake(
                &mut self.pool,
                &mut record,
                participant,
                amount,
                &mut self.custody,
            )?;
            self.records.insert(*participant, record);
            Ok(())
        }

        fn withdraw(&mut self, participant: &Pubkey, amount: u64) -> ProgramResult {
            let mut record = self.record(participant);
            withdraw(
                &mut self.pool,
                &mut record,
                participant,
                amount,
                &mut self.custody,
            )?;
            self.records.insert(*participant, record);
            Ok(())
        }

        fn deposit(&mut self, amount: u64) -> ProgramResult {
            let depositor = self.depositor;
            deposit_reward(&mut self.pool, &depositor, amount, &mut self.vault)
        }

        fn claim(&mut self, participant: &Pubkey) -> Result<u64, ProgramError> {
            let mut record = self.record(participant);
            let claimed = claim_rewards(&mut self.pool, &mut record, participant, &mut self.vault)?;
            self.records.insert(*participant, record);
            Ok(claimed)
        }

        fn earned(&self, participant: &Pubkey) -> u64 {
            self.records
                .get(participant)
                .map(|record| earned(&self.pool, record).unwrap())
                .unwrap_or(0)
        }

        fn total_earned(&self) -> u64 {
            self.records
                .values()
                .map(|record| earned(&self.pool, record).unwrap())
                .sum()
        }

        fn sum_of_stakes(&self) -> u64 {
            self.records.values().map(|r| r.staked_balance).sum()
        }
    }

    #[test]
    fn scenario_two_stakers_two_deposits() {
        let mut ledger = Ledger::new();
        let alice = Pubkey::new_unique();
        let bob = Pubkey::new_unique();

        ledger.stake(&alice, 7_000 * LAMPORTS).unwrap();
        assert_eq!(
            ledger.claim(&alice),
            Err(StakeRewardsError::NoRewardsToClaim.into())
        );

        ledger.deposit(100 * LAMPORTS).unwrap();
        ledger.stake(&bob, 3_000 * LAMPORTS).unwrap();
        assert_eq!(ledger.pool.total_staked(), 10_000 * LAMPORTS);

        // 100 / 7000 does not divide evenly; one lamport of dust is left.
        assert_eq!(ledger.earned(&alice), 100 * LAMPORTS - 1);
        assert_eq!(ledger.earned(&bob), 0);

        ledger.deposit(100 * LAMPORTS).unwrap();
        assert_eq!(ledger.earned(&alice), 170 * LAMPORTS - 1);
        assert_eq!(ledger.earned(&bob), 30 * LAMPORTS);

        assert_eq!(ledger.claim(&alice), Ok(170 * LAMPORTS - 1));
        assert_eq!(ledger.claim(&bob), Ok(30 * LAMPORTS));
        assert_eq!(ledger.earned(&alice), 0);
        assert_eq!(ledger.earned(&bob), 0);
        assert_eq!(ledger.vault.paid[&alice], 170 * LAMPORTS - 1);
        assert_eq!(ledger.vault.paid[&bob], 30 * LAMPORTS);
        assert_eq!(ledger.vault.balance, 1);

        ledger.withdraw(&alice, 7_000 * LAMPORTS).unwrap();
        ledger.withdraw(&bob, 3_000 * LAMPORTS).unwrap();
        assert_eq!(ledger.records[&alice].balance_of(), 0);
        assert_eq!(ledger.records[&bob].balance_of(), 0);
        assert_eq!(ledger.pool.total_staked(), 0);
        assert_eq!(ledger.custody.escrow, 0);
        assert_eq!(ledger.custody.balances[&alice], 7_000 * LAMPORTS);
    }

    #[test]
    fn scenario_in_whole_units_keeps_the_dust() {
        let mut ledger = Ledger::new();
        let alice = Pubkey::new_unique();
        let bob = Pubkey::new_unique();

        ledger.stake(&alice, 7_000).unwrap();
        ledger.deposit(100).unwrap();
        ledger.stake(&bob, 3_000).unwrap();
        ledger.deposit(100).unwrap();

        assert_eq!(ledger.earned(&alice), 169);
        assert_eq!(ledger.earned(&bob), 30);
        assert_eq!(ledger.pool.total_rewards_deposited(), 200);
    }

    #[test_case(0, 0, StakeRewardsError::ZeroAmount; "zero withdraw")]
    #[test_case(1_000, 1_001, StakeRewardsError::InsufficientStake; "one over balance")]
    #[test_case(0, 1, StakeRewardsError::InsufficientStake; "never staked")]
    fn withdraw_rejected_leaves_state_unchanged(
        staked: u64,
        requested: u64,
        expected: StakeRewardsError,
    ) {
        let mut ledger = Ledger::new();
        let alice = Pubkey::new_unique();
        if staked > 0 {
            ledger.stake(&alice, staked).unwrap();
            ledger.deposit(500).unwrap();
        }
        let pool_before = ledger.pool;
        let record_before = ledger.record(&alice);

        assert_eq!(ledger.withdraw(&alice, requested), Err(expected.into()));
        assert_eq!(ledger.pool, pool_before);
        assert_eq!(ledger.records[&alice], record_before);
    }

    #[test]
    fn zero_stake_is_rejected() {
        let mut ledger = Ledger::new();
        assert_eq!(
            ledger.stake(&Pubkey::new_unique(), 0),
            Err(StakeRewardsError::ZeroAmount.into())
        );
        assert_eq!(ledger.pool.total_staked(), 0);
    }

    #[test]
    fn deposit_without_stakers_is_rejected() {
        let mut ledger = Ledger::new();
        assert_eq!(
            ledger.deposit(100),
            Err(StakeRewardsError::NoStakersToReward.into())
        );
        assert_eq!(ledger.pool.total_rewards_deposited(), 0);
        assert_eq!(ledger.vault.balance, 0);

        // Once stake exists the same deposit goes through.
        ledger.stake(&Pubkey::new_unique(), 10).unwrap();
        ledger.deposit(100).unwrap();
        assert_eq!(ledger.pool.total_rewards_deposited(), 100);
    }

    #[test_case(false, 100, StakeRewardsError::Unauthorized; "wrong caller")]
    #[test_case(false, 0, StakeRewardsError::Unauthorized; "wrong caller and zero amount")]
    #[test_case(true, 0, StakeRewardsError::ZeroAmount; "zero amount")]
    fn deposit_rejections(authorized: bool, amount: u64, expected: StakeRewardsError) {
        let mut ledger = Ledger::new();
        ledger.stake(&Pubkey::new_unique(), 1_000).unwrap();
        let caller = if authorized {
            ledger.depositor
        } else {
            Pubkey::new_unique()
        };
        let pool_before = ledger.pool;

        assert_eq!(
            deposit_reward(&mut ledger.pool, &caller, amount, &mut ledger.vault),
            Err(expected.into())
        );
        assert_eq!(ledger.pool, pool_before);
    }

    #[test]
    fn claim_twice_fails_the_second_time() {
        let mut ledger = Ledger::new();
        let alice = Pubkey::new_unique();
        ledger.stake(&alice, 1_000).unwrap();
        ledger.deposit(250).unwrap();

        assert_eq!(ledger.claim(&alice), Ok(250));
        assert_eq!(
            ledger.claim(&alice),
            Err(StakeRewardsError::NoRewardsToClaim.into())
        );
        assert_eq!(ledger.pool.total_staked(), 1_000);
        assert_eq!(ledger.pool.total_rewards_claimed(), 250);
    }

    #[test]
    fn late_staker_does_not_earn_earlier_rewards() {
        let mut ledger = Ledger::new();
        let alice = Pubkey::new_unique();
        let bob = Pubkey::new_unique();

        ledger.stake(&alice, 1_000).unwrap();
        ledger.deposit(1_000).unwrap();
        ledger.stake(&bob, 1_000_000).unwrap();

        assert_eq!(ledger.earned(&alice), 1_000);
        assert_eq!(ledger.earned(&bob), 0);
    }

    #[test]
    fn settlement_credits_old_balance_before_withdraw() {
        let mut ledger = Ledger::new();
        let alice = Pubkey::new_unique();
        let bob = Pubkey::new_unique();

        ledger.stake(&alice, 500).unwrap();
        ledger.stake(&bob, 500).unwrap();
        ledger.deposit(1_000).unwrap();

        // Alice leaves entirely; what she earned while staked is kept.
        ledger.withdraw(&alice, 500).unwrap();
        assert_eq!(ledger.records[&alice].accrued_reward, 500);
        assert_eq!(ledger.earned(&alice), 500);

        // Later rewards go to Bob alone.
        ledger.deposit(1_000).unwrap();
        assert_eq!(ledger.earned(&alice), 500);
        assert_eq!(ledger.earned(&bob), 1_500);
    }

    #[test]
    fn record_resumes_after_returning_to_zero() {
        let mut ledger = Ledger::new();
        let alice = Pubkey::new_unique();
        let bob = Pubkey::new_unique();

        ledger.stake(&alice, 100).unwrap();
        ledger.stake(&bob, 100).unwrap();
        ledger.deposit(200).unwrap();
        ledger.withdraw(&alice, 100).unwrap();

        // Deposited while Alice held nothing.
        ledger.deposit(300).unwrap();
        ledger.stake(&alice, 100).unwrap();
        ledger.deposit(200).unwrap();

        assert_eq!(ledger.earned(&alice), 100 + 100);
        assert_eq!(ledger.earned(&bob), 100 + 300 + 100);
    }

    #[test]
    fn failed_stake_transfer_rolls_back() {
        let mut ledger = Ledger::new();
        let alice = Pubkey::new_unique();
        ledger.stake(&alice, 100).unwrap();
        ledger.deposit(50).unwrap();
        let pool_before = ledger.pool;
        let record_before = ledger.records[&alice];

        ledger.custody.fail = true;
        assert_eq!(
            ledger.stake(&alice, 100),
            Err(StakeRewardsError::TransferFailure.into())
        );
        assert_eq!(ledger.pool, pool_before);
        assert_eq!(ledger.records[&alice], record_before);
    }

    #[test]
    fn failed_withdraw_transfer_rolls_back() {
        let mut ledger = Ledger::new();
        let alice = Pubkey::new_unique();
        ledger.stake(&alice, 100).unwrap();
        ledger.deposit(50).unwrap();
        let pool_before = ledger.pool;
        let record_before = ledger.records[&alice];

        ledger.custody.fail = true;
        assert_eq!(
            ledger.withdraw(&alice, 40),
            Err(StakeRewardsError::TransferFailure.into())
        );
        assert_eq!(ledger.pool, pool_before);
        assert_eq!(ledger.records[&alice], record_before);
        assert_eq!(ledger.custody.escrow, 100);
    }

    #[test]
    fn failed_release_restores_accrual() {
        let mut ledger = Ledger::new();
        let alice = Pubkey::new_unique();
        ledger.stake(&alice, 100).unwrap();
        ledger.deposit(50).unwrap();
        let pool_before = ledger.pool;
        let record_before = ledger.records[&alice];

        ledger.vault.fail = true;
        assert_eq!(
            ledger.claim(&alice),
            Err(StakeRewardsError::TransferFailure.into())
        );
        assert_eq!(ledger.pool, pool_before);
        assert_eq!(ledger.records[&alice], record_before);
        assert_eq!(ledger.earned(&alice), 50);

        ledger.vault.fail = false;
        assert_eq!(ledger.claim(&alice), Ok(50));
    }

    #[test]
    fn failed_deposit_leaves_rate_unchanged() {
        let mut ledger = Ledger::new();
        ledger.stake(&Pubkey::new_unique(), 100).unwrap();
        let pool_before = ledger.pool;

        ledger.vault.fail = true;
        assert_eq!(
            ledger.deposit(50),
            Err(StakeRewardsError::TransferFailure.into())
        );
        assert_eq!(ledger.pool, pool_before);
    }

    #[test]
    fn record_of_another_participant_is_rejected() {
        let mut ledger = Ledger::new();
        let alice = Pubkey::new_unique();
        let mallory = Pubkey::new_unique();
        ledger.stake(&alice, 100).unwrap();
        ledger.deposit(50).unwrap();
        let mut record = ledger.records[&alice];

        assert_eq!(
            claim_rewards(&mut ledger.pool, &mut record, &mallory, &mut ledger.vault),
            Err(StakeRewardsError::ParticipantMismatch.into())
        );
        assert_eq!(
            withdraw(
                &mut ledger.pool,
                &mut record,
                &mallory,
                100,
                &mut ledger.custody
            ),
            Err(StakeRewardsError::ParticipantMismatch.into())
        );
        assert_eq!(record, ledger.records[&alice]);
    }

    #[test]
    fn broken_conservation_halts_mutation() {
        let mut ledger = Ledger::new();
        let alice = Pubkey::new_unique();
        ledger.stake(&alice, 100).unwrap();
        ledger.deposit(50).unwrap();

        ledger.pool.total_rewards_claimed = ledger.pool.total_rewards_deposited + 1;

        let halted: ProgramError = StakeRewardsError::ConservationViolated.into();
        assert_eq!(ledger.stake(&alice, 1), Err(halted.clone()));
        assert_eq!(ledger.withdraw(&alice, 1), Err(halted.clone()));
        assert_eq!(ledger.deposit(1), Err(halted.clone()));
        assert_eq!(ledger.claim(&alice), Err(halted));
    }

    #[test]
    fn rate_behind_snapshot_is_detected() {
        let pool = RewardPool::new(Pubkey::new_unique(), Pubkey::new_unique());
        let mut record = ParticipantRecord::new(Pubkey::new_unique(), 10);
        record.staked_balance = 1;
        assert_eq!(
            settle(&pool, &mut record),
            Err(StakeRewardsError::ConservationViolated.into())
        );
    }

    #[test_case(1, 1, REWARD_PER_TOKEN_SCALING_FACTOR; "one per token")]
    #[test_case(100, 7_000, 14_285_714_285_714_285; "truncates")]
    #[test_case(u64::MAX, 1, u64::MAX as u128 * REWARD_PER_TOKEN_SCALING_FACTOR; "largest deposit")]
    fn rewards_per_token(rewards: u64, total_staked: u64, expected: u128) {
        assert_eq!(calculate_rewards_per_token(rewards, total_staked), Ok(expected));
    }

    #[test]
    fn reward_share_overflow_is_reported() {
        assert_eq!(
            calculate_reward_share(u128::MAX, 0, u64::MAX),
            Err(ProgramError::ArithmeticOverflow)
        );
    }

    #[derive(Clone, Debug)]
    enum Op {
        Stake(usize, u64),
        Withdraw(usize, u64),
        Deposit(u64),
        Claim(usize),
    }

    fn op_strategy(participants: usize) -> impl Strategy<Value = Op> {
        prop_oneof![
            (0..participants, 1..1_000_000_000u64).prop_map(|(who, amount)| Op::Stake(who, amount)),
            (0..participants, 1..1_000_000_000u64)
                .prop_map(|(who, amount)| Op::Withdraw(who, amount)),
            (1..1_000_000_000_000u64).prop_map(Op::Deposit),
            (0..participants).prop_map(Op::Claim),
        ]
    }

    proptest! {
        #[test]
        fn rewards_are_conserved(ops in proptest::collection::vec(op_strategy(4), 1..64)) {
            let mut ledger = Ledger::new();
            let participants: Vec<Pubkey> = (0..4).map(|_| Pubkey::new_unique()).collect();
            let mut last_rate = 0;

            for (applied, op) in ops.iter().enumerate() {
                let result = match *op {
                    Op::Stake(who, amount) => ledger.stake(&participants[who], amount),
                    Op::Withdraw(who, amount) => {
                        let balance = ledger.record(&participants[who]).staked_balance;
                        ledger.withdraw(&participants[who], amount.min(balance.max(1)))
                    }
                    Op::Deposit(amount) => ledger.deposit(amount),
                    Op::Claim(who) => ledger.claim(&participants[who]).map(|_| ()),
                };
                // Only the documented rejections may occur.
                if let Err(err) = result {
                    prop_assert!(
                        [
                            StakeRewardsError::InsufficientStake,
                            StakeRewardsError::NoStakersToReward,
                            StakeRewardsError::NoRewardsToClaim,
                        ]
                        .iter()
                        .any(|e| ProgramError::from(*e) == err),
                        "unexpected error {:?}",
                        err
                    );
                }

                let owed = ledger.total_earned() + ledger.pool.total_rewards_claimed();
                let deposited = ledger.pool.total_rewards_deposited();
                prop_assert!(owed <= deposited);
                // Dust: under one unit per deposit, per settlement and per
                // outstanding record.
                prop_assert!(deposited - owed <= (applied as u64 + 1) + participants.len() as u64);

                prop_assert_eq!(ledger.pool.total_staked(), ledger.sum_of_stakes());
                prop_assert_eq!(ledger.pool.total_staked(), ledger.custody.escrow);
                prop_assert!(ledger.pool.reward_per_token_stored >= last_rate);
                prop_assert!(ledger.vault.balance >= ledger.total_earned());
                last_rate = ledger.pool.reward_per_token_stored;
            }
        }

        #[test]
        fn rewards_are_proportional_to_stake(
            s1 in 1..1_000_000_000_000u64,
            s2 in 1..1_000_000_000_000u64,
            deposits in proptest::collection::vec(1..1_000_000_000_000u64, 1..16),
        ) {
            let mut ledger = Ledger::new();
            let alice = Pubkey::new_unique();
            let bob = Pubkey::new_unique();
            ledger.stake(&alice, s1).unwrap();
            ledger.stake(&bob, s2).unwrap();
            for amount in deposits {
                ledger.deposit(amount).unwrap();
            }

            let e1 = ledger.earned(&alice) as i128;
            let e2 = ledger.earned(&bob) as i128;
            let cross = (e1 * s2 as i128 - e2 * s1 as i128).abs();
            prop_assert!(cross < s1.max(s2) as i128);
        }

        #[test]
        fn staking_order_does_not_change_distribution(
            s1 in 1..1_000_000_000u64,
            s2 in 1..1_000_000_000u64,
            deposits in proptest::collection::vec(1..1_000_000_000u64, 1..8),
        ) {
            let alice = Pubkey::new_unique();
            let bob = Pubkey::new_unique();

            let run = |alice_first: bool| {
                let mut ledger = Ledger::new();
                if alice_first {
                    ledger.stake(&alice, s1).unwrap();
                    ledger.stake(&bob, s2).unwrap();
                } else {
                    ledger.stake(&bob, s2).unwrap();
                    ledger.stake(&alice, s1).unwrap();
                }
                for amount in &deposits {
                    ledger.deposit(*amount).unwrap();
                }
                let claimed_bob = ledger.claim(&bob).unwrap_or(0);
                let claimed_alice = ledger.claim(&alice).unwrap_or(0);
                (claimed_alice, claimed_bob)
            };

            prop_assert_eq!(run(true), run(false));
        }
    }
}
