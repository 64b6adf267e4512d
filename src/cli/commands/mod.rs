//! Command implementations

pub mod checkout;
pub mod deinit;
pub mod edit;
pub mod foreach;
pub mod info;
pub mod init;
pub mod manifest_cmd;
pub mod tag;
pub mod update;
