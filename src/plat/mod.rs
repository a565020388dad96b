pub mod pm;
pub mod utils;
pub mod transact;
