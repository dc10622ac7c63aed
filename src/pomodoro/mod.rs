pub mod controller;
pub mod countdown;
#[allow(clippy::module_inception)]
pub mod pomodoro;
