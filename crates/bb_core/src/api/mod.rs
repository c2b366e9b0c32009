pub mod command_json;

pub use command_json::{execute_command, execute_command_json, ApiError, ApiResponse, CommandRequest};
