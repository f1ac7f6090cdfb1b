pub mod capabilities;
pub mod events;
pub mod runs;
pub mod tasks;
