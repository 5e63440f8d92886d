mod command_dispatcher;
mod command_error;
mod command_handler;
pub mod echo;
pub mod get;
pub mod incr;
pub mod info;
pub mod ping;
pub mod psync;
pub mod replconf;
pub mod set;
pub mod stream_utils;
pub mod transactions;
pub mod type_command;
pub mod xadd;
pub mod xrange;
pub mod xread;

pub use command_dispatcher::CommandDispatcher;
pub use command_error::CommandError;
pub use command_handler::CommandHandler;
