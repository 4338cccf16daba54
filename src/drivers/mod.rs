pub mod analog;
pub mod filter;
pub mod imu;
pub mod pi;
pub mod radio;
pub mod servo;
