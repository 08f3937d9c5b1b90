pub const ARITY: u32 = 3;
pub const SEED_BYTE_LEN: usize = 32;
pub const KEY_BYTE_LEN: usize = 32;
pub const MAX_SEGMENT_LENGTH: u32 = 1 << 18;
pub const MIN_PLAINTEXT_MODULO: u64 = 256;
pub const MAX_PLAINTEXT_MODULO: u64 = 1 << 32;
pub const MAX_CREATE_ATTEMPT_COUNT: usize = 100;
