pub mod controls;
pub mod grid;
pub mod history;
pub mod marquee;
pub mod tools;
