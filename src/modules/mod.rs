/*!
 * Framework Modules
 * Modules provided with the framework itself
 */

mod event_info_setter;
mod prescale;
mod progress;

pub use event_info_setter::EventInfoSetter;
pub use prescale::Prescale;
pub use progress::Progress;
