pub mod order;
pub mod stream;
pub mod wallet;
pub mod ws;
