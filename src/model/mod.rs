pub mod attendance;
pub mod role;
pub mod standard;
pub mod student;
pub mod teacher_profile;
pub mod user;
