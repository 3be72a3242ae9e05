pub mod serial_motor;
pub mod simulated_motor;
