/// Scaling factor applied to the reward-per-token accumulator, giving the
/// exchange rate 18 decimal places of precision.
pub const REWARD_PER_TOKEN_SCALING_FACTOR: u128 = 1_000_000_000_000_000_000;

/// The seed prefix (`"reward_pool"`) in bytes used to derive the address of a
/// mint's reward pool account.
/// Seeds: `"reward_pool" + stake_mint_address`.
pub const SEED_PREFIX_REWARD_POOL: &[u8] = b"reward_pool";

/// The seed prefix (`"participant"`) in bytes used to derive the address of a
/// participant record account.
/// Seeds: `"participant" + reward_pool_address + owner_address`.
pub const SEED_PREFIX_PARTICIPANT: &[u8] = b"participant";
