pub mod proposal;
pub mod reference;
pub mod rule;
pub mod step;
pub mod user;
