pub mod approve_transfer_command;
pub mod create_transfer_command;

pub use approve_transfer_command::{
    try_settle, ApproveTransferCommand, ApproveTransferResult, SettlementOutcome,
};
pub use create_transfer_command::CreateTransferCommand;
