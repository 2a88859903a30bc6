pub mod screen;
pub mod terminal;
pub mod views;
