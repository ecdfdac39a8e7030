pub mod health;
pub mod holders;
