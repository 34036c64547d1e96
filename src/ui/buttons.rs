//! GPIO button input with async debouncing.
//!
//! One physical button (active-low with internal pull-up). Each debounced
//! press fires the [`UserTrigger`]; what it does depends on the client state
//! when the worker gets to it.

use embassy_nrf::gpio::{AnyPin, Input, Pull};
use embassy_sync::blocking_mutex::raw::RawMutex;
use embassy_time::{Duration, Timer};

use crate::config::BUTTON_DEBOUNCE_MS;
use crate::ui::trigger::UserTrigger;

/// Run the button polling loop.
///
/// Waits for the pin to go low (pressed), debounces, fires the trigger,
/// then waits for release before repeating.
pub async fn button_task<M: RawMutex>(pin: AnyPin, trigger: &UserTrigger<M>) -> ! {
    let mut btn = Input::new(pin, Pull::Up);

    loop {
        // Wait for falling edge (button press, active-low).
        btn.wait_for_falling_edge().await;

        // Debounce: wait and re-check.
        Timer::after(Duration::from_millis(BUTTON_DEBOUNCE_MS)).await;

        if btn.is_low() {
            debug!("Button pressed");
            trigger.fire();

            // Wait for release to avoid repeat triggers.
            btn.wait_for_rising_edge().await;
            Timer::after(Duration::from_millis(BUTTON_DEBOUNCE_MS)).await;
        }
    }
}
