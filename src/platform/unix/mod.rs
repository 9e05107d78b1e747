pub mod kill;
pub mod notify;
pub mod ports;
