mod auth;
mod avatar;
mod batch;
mod blob;
mod identity;
mod upload_url;
