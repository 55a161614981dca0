pub mod block;
pub mod ubi;
