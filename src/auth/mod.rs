pub mod login;
pub mod password;
pub mod sessions;
pub mod token;
pub mod verification;
