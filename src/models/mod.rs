pub mod attendance;
pub mod pass;
pub mod student;
