//! User input.
//!
//! A single button drives the client: the first press while disconnected
//! starts advertising, later presses toggle time notifications. Presses
//! reach the client through a coalescing [`trigger::UserTrigger`] drained by
//! one worker task.

#[cfg(feature = "embedded")]
pub mod buttons;
pub mod trigger;
