mod helpers;
mod mocks;

mod admin;
mod status;
mod webhook;
