pub mod direct_session_test;
pub mod room_session_test;
