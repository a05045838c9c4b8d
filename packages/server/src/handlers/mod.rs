pub mod avatar;
pub mod blob;
pub mod health;
