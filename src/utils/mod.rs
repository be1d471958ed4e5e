pub mod text;
pub mod threads;
