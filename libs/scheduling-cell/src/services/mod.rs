pub mod gateway;
pub mod reservation;
pub mod rules;
pub mod selection;
