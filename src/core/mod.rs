//! Core process state shared across commands.

mod state;

pub use state::{
    arm_shutdown, is_connected, is_shutdown, set_connected, setup_shutdown_handler,
    wait_for_shutdown,
};
