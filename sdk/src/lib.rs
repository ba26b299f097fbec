//! Client-side codec and instruction builders for the Ponzimon farming program.
//!
//! Everything here is pure: account buffers in, typed records out, and typed
//! intents in, `Instruction`s out. Submitting and confirming is left to callers.

pub mod consts;
pub mod error;
pub mod instruction;
pub mod pda;
pub mod reader;
pub mod rewards;
pub mod state;

pub use error::{BuildError, DecodeError, ProgramErrorCode};
pub use instruction::{build_instruction, InstructionKind};
pub use pda::PlayerAccounts;
pub use rewards::pending_rewards;
pub use state::{
    check_discriminator, decode_global_state, decode_player_account, Card, CardView, Farm,
    FilteredPosition, GlobalState, PlayerAccount, RawIndex,
};
